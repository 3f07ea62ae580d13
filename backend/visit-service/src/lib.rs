/// Visit Service Library
///
/// Publishing and reading restaurant-visit posts: a photo or video with a
/// rating, tied to a restaurant, shown in a feed with author and restaurant
/// details.
///
/// # Modules
///
/// - `services`: publish pipeline, restaurant catalog, feed reader, favorites
/// - `db`: the table API and its PostgREST and Postgres adapters
/// - `storage`: media stores and object key/URL derivation
/// - `models`: posts, restaurants, profiles and the publish draft
/// - `auth`: current-user collaborator
/// - `view`: consumer-side screen state
/// - `error`: error types
/// - `config`: configuration management
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;
pub mod view;

pub use config::Config;
pub use error::{FeedError, InitError, PublishError, PublishStage};

use auth::{AuthProvider, SessionStore};
use config::{MediaBackend, TableBackend};
use db::{PgTable, PostgrestTable, TableApi};
use services::{FavoriteService, FeedReader, PostWriter, RestaurantCatalog};
use std::sync::Arc;
use storage::{MediaLocator, MediaStore, S3MediaStore, SupabaseStorage};

/// Services wired against one backend
pub struct ServiceContext {
    pub catalog: Arc<RestaurantCatalog>,
    pub writer: PostWriter,
    pub feed: FeedReader,
    pub favorites: FavoriteService,
}

impl ServiceContext {
    /// Assemble services from explicit collaborators
    pub fn new(
        config: &Config,
        table: Arc<dyn TableApi>,
        media: Arc<dyn MediaStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        let query_timeout = config.timeouts.query();
        let locator = MediaLocator::new(
            config.storage.public_base_url.clone(),
            config.storage.key_prefix.clone(),
        );

        let catalog =
            Arc::new(RestaurantCatalog::new(table.clone()).with_timeout(query_timeout));
        let writer = PostWriter::new(
            table.clone(),
            media,
            locator,
            catalog.clone(),
            auth.clone(),
        )
        .with_timeouts(config.timeouts.upload(), query_timeout);
        let feed = FeedReader::new(table.clone())
            .with_timeout(query_timeout)
            .with_page_size(config.feed.page_size)
            .with_enrichment_concurrency(config.feed.enrichment_concurrency);
        let favorites = FavoriteService::new(table, auth).with_timeout(query_timeout);

        Self {
            catalog,
            writer,
            feed,
            favorites,
        }
    }

    /// Build the configured table and media backends.
    ///
    /// Hosted backends read the session's access token on every request, so
    /// signing in or out later takes effect without rebuilding the context.
    /// Anonymous requests use the anon key.
    pub async fn from_config(
        config: &Config,
        session: Arc<SessionStore>,
    ) -> Result<Self, InitError> {
        let table: Arc<dyn TableApi> = match config.backend.kind {
            TableBackend::Postgrest => Arc::new(
                PostgrestTable::new(&config.backend.project_url, &config.backend.anon_key)?
                    .with_session(session.clone()),
            ),
            TableBackend::Postgres => {
                let table = PgTable::connect(
                    &config.backend.database_url,
                    config.backend.max_connections,
                )
                .await?;
                table.migrate().await?;
                Arc::new(table)
            }
        };

        let media: Arc<dyn MediaStore> = match config.storage.kind {
            MediaBackend::Supabase => Arc::new(
                SupabaseStorage::new(
                    &config.backend.project_url,
                    &config.backend.anon_key,
                    &config.storage.bucket,
                )?
                .with_session(session.clone()),
            ),
            MediaBackend::S3 => Arc::new(
                S3MediaStore::from_env(
                    config.storage.bucket.clone(),
                    config.storage.s3_endpoint.as_deref(),
                )
                .await,
            ),
        };

        tracing::info!(
            table_backend = ?config.backend.kind,
            media_backend = ?config.storage.kind,
            env = %config.env,
            "Visit services initialized"
        );

        Ok(Self::new(config, table, media, session))
    }
}
