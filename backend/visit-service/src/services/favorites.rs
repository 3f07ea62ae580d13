/// Favorite restaurants - toggle for the signed-in user
use crate::auth::AuthProvider;
use crate::db::{encode_row, Filter, TableApi, FAVORITES};
use crate::error::FavoriteError;
use crate::models::NewFavorite;
use resilience::with_deadline;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FavoriteToggle {
    Added,
    Removed,
}

pub struct FavoriteService {
    table: Arc<dyn TableApi>,
    auth: Arc<dyn AuthProvider>,
    query_timeout: Duration,
}

impl FavoriteService {
    pub fn new(table: Arc<dyn TableApi>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            table,
            auth,
            query_timeout: resilience::table_api_config().duration,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Add the restaurant to the user's favorites, or remove it if present
    pub async fn toggle(&self, restaurant_id: &str) -> Result<FavoriteToggle, FavoriteError> {
        let user_id = self
            .auth
            .current_user_id()
            .ok_or(FavoriteError::NotAuthenticated)?;

        let filters = [
            Filter::eq("restaurant_id", restaurant_id),
            Filter::eq("user_id", user_id.as_str()),
        ];
        let existing = with_deadline(
            self.query_timeout,
            self.table.select_where(FAVORITES, &filters),
        )
        .await?;

        if existing.is_empty() {
            let row = encode_row(&NewFavorite {
                restaurant_id: restaurant_id.to_string(),
                user_id: user_id.clone(),
            })?;
            with_deadline(self.query_timeout, self.table.insert_returning(FAVORITES, row))
                .await?;
            tracing::info!(%user_id, restaurant_id, "Favorite added");
            Ok(FavoriteToggle::Added)
        } else {
            with_deadline(self.query_timeout, self.table.delete_where(FAVORITES, &filters))
                .await?;
            tracing::info!(%user_id, restaurant_id, "Favorite removed");
            Ok(FavoriteToggle::Removed)
        }
    }

    /// Whether the signed-in user has favorited the restaurant
    pub async fn is_favorite(&self, restaurant_id: &str) -> Result<bool, FavoriteError> {
        let Some(user_id) = self.auth.current_user_id() else {
            return Ok(false);
        };
        let filters = [
            Filter::eq("restaurant_id", restaurant_id),
            Filter::eq("user_id", user_id),
        ];
        let rows = with_deadline(
            self.query_timeout,
            self.table.select_where(FAVORITES, &filters),
        )
        .await?;
        Ok(!rows.is_empty())
    }
}
