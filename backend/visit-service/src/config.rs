/// Configuration management for visit-service
///
/// All settings come from environment variables with development defaults.
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application environment (development, staging, production)
    pub env: String,
    /// Table API backend
    pub backend: BackendConfig,
    /// Media storage
    pub storage: StorageConfig,
    /// Per-call deadlines
    pub timeouts: TimeoutsConfig,
    /// Feed paging and enrichment
    pub feed: FeedConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableBackend {
    Postgrest,
    Postgres,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Supabase,
    S3,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub kind: TableBackend,
    /// Project root URL of the hosted backend
    pub project_url: String,
    /// Public (anon) API key
    pub anon_key: String,
    /// Used when `kind` is `Postgres`
    pub database_url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub kind: MediaBackend,
    pub bucket: String,
    pub key_prefix: String,
    /// Object URLs are `{public_base_url}/{key}`
    pub public_base_url: String,
    /// S3-compatible endpoint override
    pub s3_endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    pub upload_ms: u64,
    pub query_ms: u64,
}

impl TimeoutsConfig {
    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }

    pub fn query(&self) -> Duration {
        Duration::from_millis(self.query_ms)
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            upload_ms: resilience::object_storage_config().duration.as_millis() as u64,
            query_ms: resilience::table_api_config().duration.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: usize,
    /// Posts enriched concurrently
    pub enrichment_concurrency: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            enrichment_concurrency: 8,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, String> {
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_source<F>(var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = var("APP_ENV").unwrap_or_else(|| "development".to_string());
        let production = env.eq_ignore_ascii_case("production");

        let project_url = var("SUPABASE_URL")
            .unwrap_or_else(|| "http://localhost:54321".to_string())
            .trim_end_matches('/')
            .to_string();

        let anon_key = match var("SUPABASE_ANON_KEY") {
            Some(key) if !key.trim().is_empty() => key,
            _ if production => return Err("SUPABASE_ANON_KEY must be set in production".to_string()),
            _ => String::new(),
        };

        let backend = BackendConfig {
            kind: match var("TABLE_BACKEND").as_deref() {
                None | Some("postgrest") => TableBackend::Postgrest,
                Some("postgres") => TableBackend::Postgres,
                Some(other) => return Err(format!("Unknown TABLE_BACKEND '{}'", other)),
            },
            project_url,
            anon_key,
            database_url: var("DATABASE_URL")
                .unwrap_or_else(|| "postgresql://localhost/visits".to_string()),
            max_connections: parse_or_default(&var, "DATABASE_MAX_CONNECTIONS", 10)?,
        };

        let bucket = var("MEDIA_BUCKET").unwrap_or_else(|| "user-uploads".to_string());
        let storage = StorageConfig {
            kind: match var("MEDIA_BACKEND").as_deref() {
                None | Some("supabase") => MediaBackend::Supabase,
                Some("s3") => MediaBackend::S3,
                Some(other) => return Err(format!("Unknown MEDIA_BACKEND '{}'", other)),
            },
            public_base_url: var("MEDIA_PUBLIC_BASE_URL").unwrap_or_else(|| {
                format!(
                    "{}/storage/v1/object/public/{}",
                    backend.project_url, bucket
                )
            }),
            key_prefix: var("MEDIA_KEY_PREFIX").unwrap_or_else(|| "posts".to_string()),
            s3_endpoint: var("S3_ENDPOINT").filter(|e| !e.trim().is_empty()),
            bucket,
        };

        let defaults = TimeoutsConfig::default();
        let timeouts = TimeoutsConfig {
            upload_ms: parse_or_default(&var, "UPLOAD_TIMEOUT_MS", defaults.upload_ms)?,
            query_ms: parse_or_default(&var, "QUERY_TIMEOUT_MS", defaults.query_ms)?,
        };

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            page_size: parse_or_default(&var, "FEED_PAGE_SIZE", defaults.page_size)?,
            enrichment_concurrency: parse_or_default(
                &var,
                "FEED_ENRICHMENT_CONCURRENCY",
                defaults.enrichment_concurrency,
            )?,
        };

        if timeouts.upload_ms == 0 || timeouts.query_ms == 0 {
            return Err("Timeouts must be greater than zero".to_string());
        }

        Ok(Config {
            env,
            backend,
            storage,
            timeouts,
            feed,
        })
    }

    pub fn is_production(&self) -> bool {
        self.env.eq_ignore_ascii_case("production")
    }
}

fn parse_or_default<F, T>(var: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(val) => val
            .parse()
            .map_err(|e| format!("Failed to parse {}='{}': {}", key, val, e)),
        None => Ok(default),
    }
}
