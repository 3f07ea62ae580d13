/// Hosted object storage (`/storage/v1/object/{bucket}/{key}`)
use super::MediaStore;
use crate::auth::AuthProvider;
use crate::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client as HttpClient;
use reqwest::RequestBuilder;
use std::sync::Arc;
use std::time::Duration;

const HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct SupabaseStorage {
    http: HttpClient,
    storage_url: String,
    bucket: String,
    api_key: String,
    session: Option<Arc<dyn AuthProvider>>,
}

impl SupabaseStorage {
    pub fn new(project_url: &str, api_key: &str, bucket: &str) -> Result<Self, StorageError> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| StorageError::Upload(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            storage_url: format!("{}/storage/v1", project_url.trim_end_matches('/')),
            bucket: bucket.to_string(),
            api_key: api_key.to_string(),
            session: None,
        })
    }

    /// Upload as whoever is signed in at upload time so bucket policies
    /// apply to them
    pub fn with_session(mut self, session: Arc<dyn AuthProvider>) -> Self {
        self.session = Some(session);
        self
    }

    /// Public object URL base for this bucket
    pub fn public_base_url(&self) -> String {
        format!("{}/object/public/{}", self.storage_url, self.bucket)
    }

    fn upload_request(&self, key: &str, bytes: Bytes, content_type: &str) -> RequestBuilder {
        let bearer = self
            .session
            .as_ref()
            .and_then(|s| s.access_token())
            .unwrap_or_else(|| self.api_key.clone());

        self.http
            .post(self.object_url(key))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(bytes)
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/object/{}/{}",
            self.storage_url,
            self.bucket,
            key.trim_start_matches('/')
        )
    }
}

#[async_trait]
impl MediaStore for SupabaseStorage {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        let size = bytes.len();
        let response = self
            .upload_request(key, bytes, content_type)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            tracing::warn!(key, status = status.as_u16(), %message, "Object upload rejected");
            return Err(StorageError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        tracing::debug!(key, size, bucket = %self.bucket, "Object uploaded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionStore;

    #[test]
    fn test_urls() {
        let storage =
            SupabaseStorage::new("https://demo.supabase.co/", "anon", "user-uploads").unwrap();
        assert_eq!(
            storage.object_url("posts/a.jpg"),
            "https://demo.supabase.co/storage/v1/object/user-uploads/posts/a.jpg"
        );
        assert_eq!(
            storage.public_base_url(),
            "https://demo.supabase.co/storage/v1/object/public/user-uploads"
        );
    }

    #[tokio::test]
    async fn test_unreachable_host_is_upload_error() {
        let storage = SupabaseStorage::new("http://127.0.0.1:9", "anon", "user-uploads").unwrap();
        let result = storage
            .upload("posts/a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await;
        assert!(matches!(result, Err(StorageError::Upload(_))));
    }

    #[test]
    fn test_upload_uses_current_session_token() {
        let session = Arc::new(SessionStore::new());
        let storage = SupabaseStorage::new("https://demo.supabase.co", "anon", "user-uploads")
            .unwrap()
            .with_session(session.clone());
        let bearer = |storage: &SupabaseStorage| {
            let request = storage
                .upload_request("posts/a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
                .build()
                .unwrap();
            request.headers()["authorization"].to_str().unwrap().to_string()
        };

        assert_eq!(bearer(&storage), "Bearer anon");
        session.sign_in("u1", Some("user-jwt".into()));
        assert_eq!(bearer(&storage), "Bearer user-jwt");
    }
}
