/// Error types for visit-service
///
/// One enum per concern. Stage failures of the publish pipeline keep the
/// underlying backend error as their source so callers can see both which
/// stage failed and why.
use resilience::TimeoutError;
use std::time::Duration;
use thiserror::Error;

/// Failures of the table API (REST or SQL backend)
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Backend rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("No row found in {0}")]
    NotFound(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Backend call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => BackendError::Rejected {
                status: status.as_u16(),
                message: err.to_string(),
            },
            None => BackendError::Transport(err.to_string()),
        }
    }
}

impl From<sqlx::Error> for BackendError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            // 23505 = unique_violation
            if db_err.code().as_deref() == Some("23505") {
                return BackendError::Conflict(db_err.message().to_string());
            }
        }
        BackendError::Database(err)
    }
}

impl From<TimeoutError> for BackendError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Elapsed(d) => BackendError::Timeout(d),
        }
    }
}

/// Failures of the media store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to read media payload: {0}")]
    Read(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Upload rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Upload timed out after {0:?}")]
    Timeout(Duration),
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Upload(err.to_string())
    }
}

impl From<TimeoutError> for StorageError {
    fn from(err: TimeoutError) -> Self {
        match err {
            TimeoutError::Elapsed(d) => StorageError::Timeout(d),
        }
    }
}

/// Failures of restaurant resolution
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid restaurant lookup: {0}")]
    InvalidInput(String),

    #[error("Restaurant catalog error: {0}")]
    Backend(#[from] BackendError),
}

/// Stages of the publish transaction, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PublishStage {
    MediaUpload,
    RestaurantResolution,
    PostCreation,
}

impl std::fmt::Display for PublishStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PublishStage::MediaUpload => write!(f, "media upload"),
            PublishStage::RestaurantResolution => write!(f, "restaurant resolution"),
            PublishStage::PostCreation => write!(f, "post creation"),
        }
    }
}

/// Draft preconditions checked before any I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DraftIssue {
    #[error("select a photo or a video")]
    MediaMissing,

    #[error("select either a photo or a video, not both")]
    MediaConflict,

    #[error("media kind does not match the selected payload")]
    MediaKindMismatch,

    #[error("restaurant name is required")]
    RestaurantNameMissing,

    #[error("restaurant area is required")]
    RestaurantAreaMissing,

    #[error("rating must be between 1 and 5 (got {0})")]
    RatingOutOfRange(u8),
}

/// Failures of `PostWriter::publish`
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Validation error: {0}")]
    Validation(DraftIssue),

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Media upload failed: {0}")]
    MediaUpload(#[source] StorageError),

    #[error("Restaurant resolution failed: {0}")]
    RestaurantResolution(#[source] CatalogError),

    #[error("Post creation failed: {0}")]
    PostCreation(#[source] BackendError),

    #[error("Publish cancelled before {before}")]
    Cancelled { before: PublishStage },
}

impl PublishError {
    /// Stage that failed, if the failure happened inside the transaction
    pub fn stage(&self) -> Option<PublishStage> {
        match self {
            PublishError::MediaUpload(_) => Some(PublishStage::MediaUpload),
            PublishError::RestaurantResolution(_) => Some(PublishStage::RestaurantResolution),
            PublishError::PostCreation(_) => Some(PublishStage::PostCreation),
            PublishError::Cancelled { before } => Some(*before),
            PublishError::Validation(_) | PublishError::NotAuthenticated => None,
        }
    }

    /// Whether re-invoking publish with the same draft can succeed without
    /// the user changing anything first.
    ///
    /// Nothing is rolled back, so a retry is always safe modulo an extra
    /// media object or restaurant row.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            PublishError::Validation(_) | PublishError::NotAuthenticated
        )
    }

    /// Single human-readable message for the compose screen
    pub fn user_message(&self) -> String {
        match self {
            PublishError::Validation(issue) => format!("Please fix the post: {issue}."),
            PublishError::NotAuthenticated => "Please sign in to post.".to_string(),
            PublishError::MediaUpload(_) => "Uploading your photo or video failed.".to_string(),
            PublishError::RestaurantResolution(_) => {
                "We couldn't save the restaurant for this post.".to_string()
            }
            PublishError::PostCreation(_) => "Your post couldn't be saved.".to_string(),
            PublishError::Cancelled { .. } => "Posting was cancelled.".to_string(),
        }
    }
}

/// Failures of `FeedReader` queries
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("Feed query failed: {0}")]
    Query(#[from] BackendError),
}

/// Failures of the favorites toggle
#[derive(Error, Debug)]
pub enum FavoriteError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Favorite update failed: {0}")]
    Backend(#[from] BackendError),
}

/// Failures while wiring services from configuration
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Table backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Media store error: {0}")]
    Storage(#[from] StorageError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;
pub type PublishResult<T> = std::result::Result<T, PublishError>;
pub type FeedResult<T> = std::result::Result<T, FeedError>;
