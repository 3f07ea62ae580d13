/// Restaurant catalog - resolves a (name, area) pair to a restaurant id
///
/// Dedup is a client-side exact match on (name, area). Nothing in the
/// schema enforces it, so two concurrent resolves of a new pair can both
/// insert.
use crate::db::{decode_row, encode_row, Filter, TableApi, RESTAURANTS};
use crate::error::{CatalogError, BackendResult};
use crate::models::{NewRestaurant, Restaurant};
use resilience::with_deadline;
use std::sync::Arc;
use std::time::Duration;

pub struct RestaurantCatalog {
    table: Arc<dyn TableApi>,
    query_timeout: Duration,
}

impl RestaurantCatalog {
    pub fn new(table: Arc<dyn TableApi>) -> Self {
        Self {
            table,
            query_timeout: resilience::table_api_config().duration,
        }
    }

    pub fn with_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Id of the restaurant named `name` in `area`, creating it if absent.
    ///
    /// When several rows match, the first one the backend returns wins.
    pub async fn resolve(
        &self,
        name: &str,
        area: &str,
        address: Option<&str>,
    ) -> Result<String, CatalogError> {
        let name = name.trim();
        let area = area.trim();
        if name.is_empty() {
            return Err(CatalogError::InvalidInput("name must not be empty".to_string()));
        }
        if area.is_empty() {
            return Err(CatalogError::InvalidInput("area must not be empty".to_string()));
        }

        if let Some(existing) = self.find(name, area).await? {
            tracing::debug!(restaurant_id = %existing.id, name, area, "Restaurant matched");
            return Ok(existing.id);
        }

        let row = NewRestaurant {
            name: name.to_string(),
            area: area.to_string(),
            address: address
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .map(str::to_string),
        };
        let created: Restaurant = with_deadline(self.query_timeout, async {
            let stored = self.table.insert_returning(RESTAURANTS, encode_row(&row)?).await?;
            decode_row(stored)
        })
        .await?;

        tracing::info!(restaurant_id = %created.id, name, area, "Restaurant created");
        Ok(created.id)
    }

    async fn find(&self, name: &str, area: &str) -> BackendResult<Option<Restaurant>> {
        let filters = [Filter::eq("name", name), Filter::eq("area", area)];
        let rows = with_deadline(
            self.query_timeout,
            self.table.select_where(RESTAURANTS, &filters),
        )
        .await?;

        match rows.into_iter().next() {
            Some(row) => Ok(Some(decode_row(row)?)),
            None => Ok(None),
        }
    }
}
