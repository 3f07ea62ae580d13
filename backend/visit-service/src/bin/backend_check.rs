use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use visit_service::auth::SessionStore;
use visit_service::services::Visibility;
use visit_service::{Config, InitError, ServiceContext};

/// Backend connectivity check.
///
/// - Loads `.env` and the service configuration.
/// - Fetches the first public feed page with per-post enrichment.
/// - Reports how many posts came back and how many lack author or
///   restaurant details.
///
/// Set `CHECK_USER_ID` to also run the joined per-author query.
#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("visit_service=info".parse()?)
                .add_directive("backend_check=info".parse()?),
        )
        .init();

    let config = Config::from_env().map_err(InitError::Config)?;
    let session = Arc::new(SessionStore::new());
    let services = ServiceContext::from_config(&config, session)
        .await
        .context("Failed to initialize services")?;

    let posts = services
        .feed
        .fetch_feed(Visibility::Public, services.feed.first_page())
        .await
        .context("Feed query failed")?;

    let missing_author = posts.iter().filter(|p| p.user.is_none()).count();
    let missing_restaurant = posts.iter().filter(|p| p.restaurant.is_none()).count();
    tracing::info!(
        posts = posts.len(),
        missing_author,
        missing_restaurant,
        "Feed reachable"
    );

    for post in posts.iter().take(5) {
        tracing::info!(
            post_id = %post.id,
            author = post.author_label(),
            restaurant = post.restaurant_label(),
            rating = post.rating,
            created_at = %post.created_at,
            "Sample post"
        );
    }

    if let Ok(user_id) = std::env::var("CHECK_USER_ID") {
        let user_posts = services
            .feed
            .fetch_user_posts(&user_id)
            .await
            .context("User posts query failed")?;
        tracing::info!(%user_id, posts = user_posts.len(), "User posts reachable");
    }

    Ok(())
}
