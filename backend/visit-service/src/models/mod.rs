/// Data models for visit-service
///
/// This module defines structures for:
/// - Post: a restaurant visit with photo/video, rating and caption
/// - Restaurant: a place posts refer to, deduplicated by (name, area)
/// - UserProfile: read-only author metadata
/// - PublishDraft: the in-memory compose state of one publish attempt
///
/// Field names follow the backend column names so rows decode directly.
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

mod draft;

pub use draft::{NewFavorite, NewPost, NewRestaurant, PublishDraft};

pub const UNKNOWN_AUTHOR_LABEL: &str = "Unknown user";
pub const UNKNOWN_RESTAURANT_LABEL: &str = "Unknown restaurant";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Photo,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            MediaKind::Photo => "image/jpeg",
            MediaKind::Video => "video/mp4",
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
        }
    }
}

/// Author profile, keyed by the auth subject id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Restaurant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub area: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub google_place_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A persisted post plus the read-time enrichment fields.
///
/// `user`, `restaurant` and the engagement fields are attached when the post
/// is read and are never written back. Each may be absent independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub user_id: String,
    pub restaurant_id: String,
    pub media_url: String,
    #[serde(default, deserialize_with = "deserialize_media_kind")]
    pub media_type: MediaKind,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(deserialize_with = "deserialize_rating")]
    pub rating: f64,
    #[serde(default)]
    pub visit_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,

    #[serde(default, rename = "user_profiles", skip_serializing)]
    pub user: Option<UserProfile>,
    #[serde(default, rename = "restaurants", skip_serializing)]
    pub restaurant: Option<Restaurant>,
    #[serde(default, skip_serializing)]
    pub like_count: i64,
    #[serde(default, skip_serializing)]
    pub save_count: i64,
    #[serde(default, skip_serializing)]
    pub is_liked_by_me: bool,
    #[serde(default, skip_serializing)]
    pub is_saved_by_me: bool,
}

impl Post {
    /// Name to render for the author, falling back when the profile is missing
    pub fn author_label(&self) -> &str {
        match &self.user {
            Some(profile) => profile
                .display_name
                .as_deref()
                .filter(|name| !name.trim().is_empty())
                .unwrap_or(&profile.username),
            None => UNKNOWN_AUTHOR_LABEL,
        }
    }

    /// Name to render for the restaurant, falling back when it is missing
    pub fn restaurant_label(&self) -> &str {
        self.restaurant
            .as_ref()
            .map(|r| r.name.as_str())
            .unwrap_or(UNKNOWN_RESTAURANT_LABEL)
    }

    pub fn is_fully_enriched(&self) -> bool {
        self.user.is_some() && self.restaurant.is_some()
    }
}

/// Ratings outside [0, 5] are clamped rather than rejected so one bad row
/// never drops a post from a page.
fn deserialize_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.clamp(0.0, 5.0))
}

/// Unknown or null media types read as a photo, for the same reason.
fn deserialize_media_kind<'de, D>(deserializer: D) -> Result<MediaKind, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw.as_deref() {
        Some("video") => MediaKind::Video,
        _ => MediaKind::Photo,
    })
}

/// Newest first; ties keep their existing relative order.
pub(crate) fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
}
