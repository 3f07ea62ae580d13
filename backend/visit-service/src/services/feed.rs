/// Feed reader - assembles posts with their author and restaurant
///
/// Two read paths:
/// - `fetch_feed`: base query, then per-post lookups of author and
///   restaurant. A failed lookup leaves that relation empty; the post is
///   always kept.
/// - `fetch_user_posts`: one query with both relations joined inline. Any
///   failure fails the whole call.
use crate::db::{
    decode_row, decode_rows, Embed, Filter, OrderBy, OrderedQuery, Page, TableApi, POSTS,
    RESTAURANTS, USER_PROFILES,
};
use crate::error::{BackendResult, FeedResult};
use crate::models::{sort_newest_first, Post, Restaurant, UserProfile};
use resilience::{gather_bounded, with_deadline};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    /// Only posts flagged `is_public`
    #[default]
    Public,
    /// Every post the backend lets the caller read
    Any,
}

pub struct FeedReader {
    table: Arc<dyn TableApi>,
    query_timeout: Duration,
    enrichment_concurrency: usize,
    page_size: usize,
}

impl FeedReader {
    pub fn new(table: Arc<dyn TableApi>) -> Self {
        Self {
            table,
            query_timeout: resilience::table_api_config().duration,
            enrichment_concurrency: 8,
            page_size: 50,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    pub fn with_enrichment_concurrency(mut self, limit: usize) -> Self {
        self.enrichment_concurrency = limit.max(1);
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// First page at the configured page size
    pub fn first_page(&self) -> Page {
        Page::first(self.page_size)
    }

    /// Newest posts first, each enriched best-effort.
    ///
    /// Returns exactly the posts the base query matched.
    pub async fn fetch_feed(&self, visibility: Visibility, page: Page) -> FeedResult<Vec<Post>> {
        let mut query = OrderedQuery::new(OrderBy::desc("created_at")).page(page);
        if visibility == Visibility::Public {
            query = query.filter(Filter::eq("is_public", true));
        }

        let rows = with_deadline(self.query_timeout, self.table.select_ordered(POSTS, &query))
            .await?;
        let posts: Vec<Post> = decode_rows(rows)?;
        let matched = posts.len();

        let mut posts = gather_bounded(posts, self.enrichment_concurrency, |post| {
            self.enrich(post)
        })
        .await;
        sort_newest_first(&mut posts);

        let partial = posts.iter().filter(|p| !p.is_fully_enriched()).count();
        tracing::debug!(posts = matched, partial, ?visibility, "Feed page assembled");
        Ok(posts)
    }

    /// All posts by `author_id`, newest first, with relations joined
    pub async fn fetch_user_posts(&self, author_id: &str) -> FeedResult<Vec<Post>> {
        let query = OrderedQuery::new(OrderBy::desc("created_at"))
            .filter(Filter::eq("user_id", author_id))
            .embed(Embed::inner(USER_PROFILES, "user_id"))
            .embed(Embed::inner(RESTAURANTS, "restaurant_id"));

        let rows = with_deadline(self.query_timeout, self.table.select_ordered(POSTS, &query))
            .await?;
        let mut posts: Vec<Post> = decode_rows(rows)?;
        sort_newest_first(&mut posts);

        tracing::debug!(user_id = %author_id, posts = posts.len(), "User posts fetched");
        Ok(posts)
    }

    async fn enrich(&self, mut post: Post) -> Post {
        let (author, restaurant) = tokio::join!(
            self.lookup::<UserProfile>(USER_PROFILES, &post.user_id),
            self.lookup::<Restaurant>(RESTAURANTS, &post.restaurant_id),
        );

        match author {
            Ok(profile) => post.user = Some(profile),
            Err(e) => {
                tracing::warn!(post_id = %post.id, user_id = %post.user_id, error = %e, "Author enrichment failed");
            }
        }
        match restaurant {
            Ok(restaurant) => post.restaurant = Some(restaurant),
            Err(e) => {
                tracing::warn!(post_id = %post.id, restaurant_id = %post.restaurant_id, error = %e, "Restaurant enrichment failed");
            }
        }

        post
    }

    async fn lookup<T: DeserializeOwned>(&self, table: &str, id: &str) -> BackendResult<T> {
        let filters = [Filter::eq("id", id)];
        let row = with_deadline(self.query_timeout, self.table.select_single(table, &filters))
            .await?;
        decode_row(row)
    }
}
