/// Table API: the narrow set of query shapes the services depend on
///
/// Services never build SQL or REST URLs themselves. They talk to a
/// `TableApi`, which offers exactly five shapes:
/// - equality-filtered select
/// - ordered select (optionally paged, optionally embedding related rows)
/// - single-row select
/// - insert returning the stored row
/// - delete by filter
///
/// Two adapters exist: `PostgrestTable` for the hosted REST backend and
/// `PgTable` for direct Postgres access.
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub mod pg;
pub mod postgrest;

pub use pg::PgTable;
pub use postgrest::PostgrestTable;

pub const POSTS: &str = "posts";
pub const RESTAURANTS: &str = "restaurants";
pub const USER_PROFILES: &str = "user_profiles";
pub const FAVORITES: &str = "favorites";

/// A backend row as a JSON object keyed by column name
pub type Row = serde_json::Map<String, Value>;

/// `column = value`
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// Value as the backend's text form, `None` for JSON null
    pub(crate) fn value_text(&self) -> Option<String> {
        match &self.value {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: true,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            descending: false,
        }
    }
}

/// A related row fetched inline with the base row.
///
/// The related row is attached under the key `table`. With `inner`, base
/// rows whose relation is missing are dropped by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Embed {
    pub table: String,
    pub foreign_key: String,
    pub inner: bool,
}

impl Embed {
    pub fn inner(table: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            foreign_key: foreign_key.into(),
            inner: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Page {
    pub limit: Option<usize>,
    pub offset: usize,
}

impl Page {
    pub fn first(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderedQuery {
    pub filters: Vec<Filter>,
    pub order: OrderBy,
    pub page: Page,
    pub embeds: Vec<Embed>,
}

impl OrderedQuery {
    pub fn new(order: OrderBy) -> Self {
        Self {
            filters: Vec::new(),
            order,
            page: Page::default(),
            embeds: Vec::new(),
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn embed(mut self, embed: Embed) -> Self {
        self.embeds.push(embed);
        self
    }
}

/// Structured-query backend shared by all services.
///
/// Implementations must be safe to call concurrently; no call holds state
/// that another call depends on.
#[async_trait]
pub trait TableApi: Send + Sync {
    /// All rows matching every filter, in backend order
    async fn select_where(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>>;

    async fn select_ordered(&self, table: &str, query: &OrderedQuery) -> BackendResult<Vec<Row>>;

    /// Exactly one row; `NotFound` when nothing matches
    async fn select_single(&self, table: &str, filters: &[Filter]) -> BackendResult<Row>;

    /// Insert and return the stored row including server-assigned columns.
    /// A unique-constraint violation is reported as `Conflict`.
    async fn insert_returning(&self, table: &str, row: Row) -> BackendResult<Row>;

    /// Number of rows deleted
    async fn delete_where(&self, table: &str, filters: &[Filter]) -> BackendResult<u64>;
}

pub fn encode_row<T: Serialize>(value: &T) -> BackendResult<Row> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidQuery(format!(
            "expected an object row, got {other}"
        ))),
    }
}

pub fn decode_row<T: DeserializeOwned>(row: Row) -> BackendResult<T> {
    Ok(serde_json::from_value(Value::Object(row))?)
}

pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Row>) -> BackendResult<Vec<T>> {
    rows.into_iter().map(decode_row).collect()
}

/// Table and column names are interpolated into URLs and SQL, so only plain
/// lowercase identifiers are accepted.
pub(crate) fn identifier(name: &str) -> BackendResult<&str> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(name)
    } else {
        Err(BackendError::InvalidQuery(format!(
            "invalid identifier: {name:?}"
        )))
    }
}

/// Server-assigned `id` of a returned row
pub fn row_id(row: &Row) -> BackendResult<String> {
    match row.get("id") {
        Some(Value::String(id)) => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(BackendError::InvalidQuery(
            "returned row has no id column".to_string(),
        )),
    }
}
