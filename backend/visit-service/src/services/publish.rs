/// Post writer - the three-stage publish of a restaurant visit
///
/// Stages run strictly in order: media upload, restaurant resolution, post
/// creation. Each stage needs the previous stage's output. There is no
/// cross-resource transaction, so a failure leaves earlier stages in place
/// (an orphaned media object, or a restaurant nobody posted about yet).
///
/// The post insert carries the draft's id as `client_request_id`. Retrying
/// the same draft after a lost response therefore returns the post that was
/// already stored instead of creating a second one.
use crate::auth::AuthProvider;
use crate::db::{encode_row, row_id, Filter, TableApi, POSTS};
use crate::error::{BackendError, BackendResult, PublishError, PublishResult, PublishStage, StorageError};
use crate::models::{NewPost, PublishDraft};
use crate::services::RestaurantCatalog;
use crate::storage::{MediaLocator, MediaStore};
use bytes::Bytes;
use resilience::with_deadline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const PROGRESS_MEDIA_UPLOADED: f64 = 0.5;
pub const PROGRESS_RESTAURANT_RESOLVED: f64 = 0.8;
pub const PROGRESS_POST_CREATED: f64 = 1.0;

pub struct PostWriter {
    table: Arc<dyn TableApi>,
    media: Arc<dyn MediaStore>,
    locator: MediaLocator,
    catalog: Arc<RestaurantCatalog>,
    auth: Arc<dyn AuthProvider>,
    upload_timeout: Duration,
    query_timeout: Duration,
}

impl PostWriter {
    pub fn new(
        table: Arc<dyn TableApi>,
        media: Arc<dyn MediaStore>,
        locator: MediaLocator,
        catalog: Arc<RestaurantCatalog>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            table,
            media,
            locator,
            catalog,
            auth,
            upload_timeout: resilience::object_storage_config().duration,
            query_timeout: resilience::table_api_config().duration,
        }
    }

    pub fn with_timeouts(mut self, upload_timeout: Duration, query_timeout: Duration) -> Self {
        self.upload_timeout = upload_timeout;
        self.query_timeout = query_timeout;
        self
    }

    /// Publish `draft` as the signed-in user and return the new post id
    pub async fn publish(&self, draft: &mut PublishDraft) -> PublishResult<String> {
        self.publish_with(draft, None, None).await
    }

    /// Publish with an optional progress channel and cancellation signal.
    ///
    /// Cancellation is observed before each stage starts. A stage already
    /// running completes and is never undone.
    pub async fn publish_with(
        &self,
        draft: &mut PublishDraft,
        progress: Option<&watch::Sender<f64>>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PublishResult<String> {
        // Validation and auth happen before any I/O.
        draft.validate().map_err(PublishError::Validation)?;
        let author_id = self
            .auth
            .current_user_id()
            .ok_or(PublishError::NotAuthenticated)?;

        let draft_id = draft.draft_id();
        let result = self.run_stages(draft, &author_id, progress, cancel).await;

        match &result {
            Ok(post_id) => {
                tracing::info!(%post_id, %draft_id, user_id = %author_id, "Post published");
            }
            Err(e) => {
                tracing::warn!(
                    %draft_id,
                    stage = ?e.stage(),
                    progress = draft.progress(),
                    error = %e,
                    "Publish failed"
                );
            }
        }
        result
    }

    async fn run_stages(
        &self,
        draft: &mut PublishDraft,
        author_id: &str,
        progress: Option<&watch::Sender<f64>>,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PublishResult<String> {
        ensure_not_cancelled(cancel, PublishStage::MediaUpload)?;
        let media_url = self
            .upload_media(draft)
            .await
            .map_err(PublishError::MediaUpload)?;
        report(draft, progress, PROGRESS_MEDIA_UPLOADED);

        ensure_not_cancelled(cancel, PublishStage::RestaurantResolution)?;
        let restaurant_id = self
            .catalog
            .resolve(&draft.restaurant_name, &draft.restaurant_area, draft.address())
            .await
            .map_err(PublishError::RestaurantResolution)?;
        report(draft, progress, PROGRESS_RESTAURANT_RESOLVED);

        ensure_not_cancelled(cancel, PublishStage::PostCreation)?;
        let post = NewPost {
            user_id: author_id.to_string(),
            restaurant_id,
            media_url,
            media_type: draft.media_kind(),
            caption: draft.caption_text().map(str::to_string),
            rating: draft.rating,
            client_request_id: draft.draft_id(),
        };
        let post_id = self
            .insert_post(&post)
            .await
            .map_err(PublishError::PostCreation)?;
        report(draft, progress, PROGRESS_POST_CREATED);

        Ok(post_id)
    }

    /// Upload the draft's payload under a fresh key and return its public URL
    async fn upload_media(&self, draft: &PublishDraft) -> Result<String, StorageError> {
        let payload = match (draft.image(), draft.video()) {
            (Some(image), _) => image.clone(),
            (None, Some(path)) => Bytes::from(tokio::fs::read(path).await?),
            (None, None) => {
                return Err(StorageError::Read(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "draft has no media payload",
                )))
            }
        };

        let kind = draft.media_kind();
        let key = self.locator.object_key(kind);
        let size = payload.len();

        with_deadline(
            self.upload_timeout,
            self.media.upload(&key, payload, kind.content_type()),
        )
        .await?;

        tracing::debug!(%key, size, media_type = kind.as_str(), "Media uploaded");
        Ok(self.locator.public_url(&key))
    }

    async fn insert_post(&self, post: &NewPost) -> BackendResult<String> {
        let row = encode_row(post)?;
        match with_deadline(self.query_timeout, self.table.insert_returning(POSTS, row)).await {
            Ok(stored) => row_id(&stored),
            Err(BackendError::Conflict(message)) => {
                tracing::info!(
                    client_request_id = %post.client_request_id,
                    %message,
                    "Post already stored for this draft"
                );
                let filters = [Filter::eq(
                    "client_request_id",
                    post.client_request_id.to_string(),
                )];
                match with_deadline(self.query_timeout, self.table.select_single(POSTS, &filters))
                    .await
                {
                    Ok(existing) => row_id(&existing),
                    // the conflict was on some other unique key
                    Err(BackendError::NotFound(_)) => Err(BackendError::Conflict(message)),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        }
    }
}

fn ensure_not_cancelled(
    cancel: Option<&watch::Receiver<bool>>,
    next: PublishStage,
) -> PublishResult<()> {
    match cancel {
        Some(rx) if *rx.borrow() => {
            tracing::info!(stage = %next, "Publish cancelled");
            Err(PublishError::Cancelled { before: next })
        }
        _ => Ok(()),
    }
}

fn report(draft: &mut PublishDraft, progress: Option<&watch::Sender<f64>>, to: f64) {
    let value = draft.advance_progress(to);
    if let Some(tx) = progress {
        tx.send_replace(value);
    }
}
