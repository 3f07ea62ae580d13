/// Consumer-side state for the feed and compose screens
///
/// Holds the last result of a service call plus loading and error flags.
/// Rendering is up to the caller.
use crate::error::{FeedError, PublishError};
use crate::models::{Post, PublishDraft};
use crate::services::{FeedReader, PostWriter, Visibility};
use tokio::sync::watch;

#[derive(Debug, Default)]
pub struct FeedView {
    pub posts: Vec<Post>,
    pub is_loading: bool,
    /// Set when the last load failed; `posts` is then empty
    pub error: Option<String>,
}

impl FeedView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn load_feed(&mut self, reader: &FeedReader, visibility: Visibility) {
        self.is_loading = true;
        let result = reader.fetch_feed(visibility, reader.first_page()).await;
        self.apply(result);
    }

    pub async fn load_user_posts(&mut self, reader: &FeedReader, author_id: &str) {
        self.is_loading = true;
        let result = reader.fetch_user_posts(author_id).await;
        self.apply(result);
    }

    pub fn apply(&mut self, result: Result<Vec<Post>, FeedError>) {
        self.is_loading = false;
        match result {
            Ok(posts) => {
                self.posts = posts;
                self.error = None;
            }
            Err(e) => {
                self.posts.clear();
                self.error = Some(e.to_string());
            }
        }
    }

    /// Loaded successfully and there is nothing to show
    pub fn is_empty_success(&self) -> bool {
        !self.is_loading && self.error.is_none() && self.posts.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct PublishView {
    pub progress: f64,
    pub is_loading: bool,
    pub created_post_id: Option<String>,
    pub error_message: Option<String>,
    /// Whether offering "retry" makes sense for the last failure
    pub can_retry: bool,
}

impl PublishView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a publish, mirroring progress into `progress_tx` when given
    pub async fn submit(
        &mut self,
        writer: &PostWriter,
        draft: &mut PublishDraft,
        progress_tx: Option<&watch::Sender<f64>>,
    ) {
        self.is_loading = true;
        self.error_message = None;
        let result = writer.publish_with(draft, progress_tx, None).await;
        self.progress = draft.progress();
        self.apply(result);
    }

    pub fn apply(&mut self, result: Result<String, PublishError>) {
        self.is_loading = false;
        match result {
            Ok(post_id) => {
                self.created_post_id = Some(post_id);
                self.error_message = None;
                self.can_retry = false;
            }
            Err(e) => {
                self.created_post_id = None;
                self.can_retry = e.is_retryable();
                self.error_message = Some(e.user_message());
            }
        }
    }
}
