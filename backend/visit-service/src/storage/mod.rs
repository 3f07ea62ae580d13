/// Media storage
///
/// A `MediaStore` only stores opaque bytes under a key. Keys and public
/// URLs are derived locally by `MediaLocator`, never returned by the store.
use crate::error::StorageError;
use crate::models::MediaKind;
use async_trait::async_trait;
use bytes::Bytes;
use uuid::Uuid;

pub mod s3;
pub mod supabase;

pub use s3::S3MediaStore;
pub use supabase::SupabaseStorage;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` under `key`. Overwrites are not expected; every key is
    /// freshly generated.
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError>;
}

/// Derives object keys and their public URLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator {
    public_base_url: String,
    key_prefix: String,
}

impl MediaLocator {
    pub fn new(public_base_url: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        let public_base_url = public_base_url.into().trim_end_matches('/').to_string();
        let key_prefix = key_prefix.into().trim_matches('/').to_string();
        Self {
            public_base_url,
            key_prefix,
        }
    }

    /// Globally unique key, e.g. `posts/4f1c...e2.jpg`
    pub fn object_key(&self, kind: MediaKind) -> String {
        let file = format!("{}.{}", Uuid::new_v4(), kind.file_extension());
        if self.key_prefix.is_empty() {
            file
        } else {
            format!("{}/{}", self.key_prefix, file)
        }
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }
}
