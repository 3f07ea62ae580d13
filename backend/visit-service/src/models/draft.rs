/// Compose-screen state of one publish attempt, and the rows it produces
use super::MediaKind;
use crate::error::DraftIssue;
use bytes::Bytes;
use serde::Serialize;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Working state of a single in-flight publication.
///
/// Owned by exactly one publish attempt; `PostWriter::publish` takes it by
/// `&mut` and advances `progress` as stages complete. Never persisted.
/// Not `Clone`: a copy would share the idempotency key, see `duplicate`.
#[derive(Debug)]
pub struct PublishDraft {
    draft_id: Uuid,
    image: Option<Bytes>,
    video: Option<PathBuf>,
    media_kind: MediaKind,
    pub restaurant_name: String,
    pub restaurant_area: String,
    pub restaurant_address: String,
    /// 0 = unset, 1..=5 valid for submission
    pub rating: u8,
    pub caption: String,
    progress: f64,
}

impl Default for PublishDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishDraft {
    pub fn new() -> Self {
        Self {
            draft_id: Uuid::new_v4(),
            image: None,
            video: None,
            media_kind: MediaKind::Photo,
            restaurant_name: String::new(),
            restaurant_area: String::new(),
            restaurant_address: String::new(),
            rating: 0,
            caption: String::new(),
            progress: 0.0,
        }
    }

    /// Client-generated key sent with the post insert; stable across retries
    /// of this draft.
    pub fn draft_id(&self) -> Uuid {
        self.draft_id
    }

    /// Copy of the draft's content as a new post: fresh `draft_id`, no
    /// progress. Publishing the copy never resolves to this draft's post.
    pub fn duplicate(&self) -> Self {
        Self {
            draft_id: Uuid::new_v4(),
            image: self.image.clone(),
            video: self.video.clone(),
            media_kind: self.media_kind,
            restaurant_name: self.restaurant_name.clone(),
            restaurant_area: self.restaurant_area.clone(),
            restaurant_address: self.restaurant_address.clone(),
            rating: self.rating,
            caption: self.caption.clone(),
            progress: 0.0,
        }
    }

    /// Select photo bytes, replacing any video selection
    pub fn select_image(&mut self, bytes: impl Into<Bytes>) {
        self.image = Some(bytes.into());
        self.video = None;
        self.media_kind = MediaKind::Photo;
    }

    /// Select a video file, replacing any photo selection
    pub fn select_video(&mut self, path: impl Into<PathBuf>) {
        self.video = Some(path.into());
        self.image = None;
        self.media_kind = MediaKind::Video;
    }

    /// Raw setters for callers that manage the fields themselves; `validate`
    /// rejects inconsistent combinations.
    pub fn set_image(&mut self, bytes: Option<Bytes>) {
        self.image = bytes;
    }

    pub fn set_video(&mut self, path: Option<PathBuf>) {
        self.video = path;
    }

    pub fn set_media_kind(&mut self, kind: MediaKind) {
        self.media_kind = kind;
    }

    pub fn image(&self) -> Option<&Bytes> {
        self.image.as_ref()
    }

    pub fn video(&self) -> Option<&Path> {
        self.video.as_deref()
    }

    pub fn media_kind(&self) -> MediaKind {
        self.media_kind
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    /// Progress never moves backwards.
    pub(crate) fn advance_progress(&mut self, to: f64) -> f64 {
        self.progress = self.progress.max(to.clamp(0.0, 1.0));
        self.progress
    }

    /// Equivalent of the compose screen's "can post" check
    pub fn can_publish(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), DraftIssue> {
        match (&self.image, &self.video) {
            (None, None) => return Err(DraftIssue::MediaMissing),
            (Some(_), Some(_)) => return Err(DraftIssue::MediaConflict),
            (Some(_), None) if self.media_kind != MediaKind::Photo => {
                return Err(DraftIssue::MediaKindMismatch)
            }
            (None, Some(_)) if self.media_kind != MediaKind::Video => {
                return Err(DraftIssue::MediaKindMismatch)
            }
            _ => {}
        }

        if self.restaurant_name.trim().is_empty() {
            return Err(DraftIssue::RestaurantNameMissing);
        }
        if self.restaurant_area.trim().is_empty() {
            return Err(DraftIssue::RestaurantAreaMissing);
        }
        if !(1..=5).contains(&self.rating) {
            return Err(DraftIssue::RatingOutOfRange(self.rating));
        }

        Ok(())
    }

    /// Address to store, `None` when left blank
    pub fn address(&self) -> Option<&str> {
        non_blank(&self.restaurant_address)
    }

    /// Caption to store, `None` when left blank
    pub fn caption_text(&self) -> Option<&str> {
        non_blank(&self.caption)
    }
}

fn non_blank(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

/// Row inserted into `restaurants`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewRestaurant {
    pub name: String,
    pub area: String,
    pub address: Option<String>,
}

/// Row inserted into `posts`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewPost {
    pub user_id: String,
    pub restaurant_id: String,
    pub media_url: String,
    pub media_type: MediaKind,
    pub caption: Option<String>,
    pub rating: u8,
    pub client_request_id: Uuid,
}

/// Row inserted into `favorites`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewFavorite {
    pub restaurant_id: String,
    pub user_id: String,
}
