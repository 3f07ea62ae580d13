//! Shared fakes for visit-service integration tests
//!
//! `InMemoryTable` behaves like the hosted table API closely enough for the
//! services: equality filters, ordering, embedding, single-row selects,
//! server-assigned ids and timestamps, and a unique `client_request_id` on
//! posts. Every call is counted, and failures can be injected per table,
//! per operation or per looked-up id.
#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::{json, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use visit_service::auth::SessionStore;
use visit_service::db::{Filter, OrderedQuery, Row, TableApi, POSTS, RESTAURANTS, USER_PROFILES};
use visit_service::error::{BackendError, BackendResult, StorageError};
use visit_service::storage::MediaStore;
use visit_service::{Config, ServiceContext};

type MakeError = Arc<dyn Fn() -> BackendError + Send + Sync>;

#[derive(Clone)]
struct Failure {
    op: &'static str,
    table: String,
    id: Option<String>,
    error: Option<MakeError>,
}

/// In-memory table API with call counting and failure injection
#[derive(Default)]
pub struct InMemoryTable {
    tables: Mutex<HashMap<String, Vec<Row>>>,
    calls: Mutex<Vec<(&'static str, String)>>,
    failures: Mutex<Vec<Failure>>,
    lost_insert_responses: Mutex<Vec<String>>,
    next_id: Mutex<u64>,
}

impl InMemoryTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a row as-is, bypassing call counting
    pub fn seed(&self, table: &str, row: Value) {
        let Value::Object(row) = row else {
            panic!("seed rows must be objects");
        };
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row);
    }

    pub fn seed_profile(&self, id: &str, username: &str) {
        self.seed(USER_PROFILES, json!({"id": id, "username": username}));
    }

    pub fn seed_restaurant(&self, id: &str, name: &str, area: &str) {
        self.seed(RESTAURANTS, json!({"id": id, "name": name, "area": area}));
    }

    pub fn seed_post(&self, id: &str, user_id: &str, restaurant_id: &str, created_at: &str) {
        self.seed(
            POSTS,
            json!({
                "id": id,
                "user_id": user_id,
                "restaurant_id": restaurant_id,
                "media_url": format!("https://cdn.example/posts/{id}.jpg"),
                "media_type": "photo",
                "caption": null,
                "rating": 4,
                "is_public": true,
                "created_at": created_at
            }),
        );
    }

    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.rows(table).len()
    }

    /// Fail every `op` on `table`
    pub fn fail(&self, op: &'static str, table: &str) {
        self.failures.lock().unwrap().push(Failure {
            op,
            table: table.to_string(),
            id: None,
            error: None,
        });
    }

    /// Fail every `op` on `table` with the error `make` builds
    pub fn fail_with(
        &self,
        op: &'static str,
        table: &str,
        make: impl Fn() -> BackendError + Send + Sync + 'static,
    ) {
        self.failures.lock().unwrap().push(Failure {
            op,
            table: table.to_string(),
            id: None,
            error: Some(Arc::new(make)),
        });
    }

    /// Fail `select_single` on `table` for the row with this id
    pub fn fail_lookup(&self, table: &str, id: &str) {
        self.failures.lock().unwrap().push(Failure {
            op: "select_single",
            table: table.to_string(),
            id: Some(id.to_string()),
            error: None,
        });
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    /// Store the next insert into `table` but report a transport error
    pub fn lose_next_insert_response(&self, table: &str) {
        self.lost_insert_responses
            .lock()
            .unwrap()
            .push(table.to_string());
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn call_count(&self, op: &str, table: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, t)| *o == op && t == table)
            .count()
    }

    fn record(&self, op: &'static str, table: &str, filters: &[Filter]) -> BackendResult<()> {
        self.calls.lock().unwrap().push((op, table.to_string()));

        let looked_up = filters
            .iter()
            .find(|f| f.column == "id")
            .and_then(|f| text(&f.value));
        let failure = self
            .failures
            .lock()
            .unwrap()
            .iter()
            .find(|f| {
                f.op == op && f.table == table && (f.id.is_none() || f.id == looked_up)
            })
            .cloned();
        match failure {
            Some(Failure {
                error: Some(make), ..
            }) => Err(make()),
            Some(_) => Err(BackendError::Transport(format!(
                "injected {op} failure on {table}"
            ))),
            None => Ok(()),
        }
    }

    fn matching(&self, table: &str, filters: &[Filter]) -> Vec<Row> {
        self.rows(table)
            .into_iter()
            .filter(|row| matches(row, filters))
            .collect()
    }

    fn next_id(&self, table: &str) -> String {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        format!("{table}-{next}")
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn matches(row: &Row, filters: &[Filter]) -> bool {
    filters
        .iter()
        .all(|f| text(row.get(&f.column).unwrap_or(&Value::Null)) == text(&f.value))
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.unwrap_or(&Value::Null);
    let b = b.unwrap_or(&Value::Null);
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

#[async_trait]
impl TableApi for InMemoryTable {
    async fn select_where(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>> {
        self.record("select_where", table, filters)?;
        Ok(self.matching(table, filters))
    }

    async fn select_ordered(&self, table: &str, query: &OrderedQuery) -> BackendResult<Vec<Row>> {
        self.record("select_ordered", table, &query.filters)?;

        let mut rows = self.matching(table, &query.filters);
        rows.sort_by(|a, b| {
            let ord = compare(a.get(&query.order.column), b.get(&query.order.column));
            if query.order.descending {
                ord.reverse()
            } else {
                ord
            }
        });

        let mut joined = Vec::with_capacity(rows.len());
        'rows: for mut row in rows {
            for embed in &query.embeds {
                let related = row
                    .get(&embed.foreign_key)
                    .and_then(text)
                    .and_then(|id| {
                        self.matching(&embed.table, &[Filter::eq("id", id)])
                            .into_iter()
                            .next()
                    });
                match related {
                    Some(related) => {
                        row.insert(embed.table.clone(), Value::Object(related));
                    }
                    None if embed.inner => continue 'rows,
                    None => {
                        row.insert(embed.table.clone(), Value::Null);
                    }
                }
            }
            joined.push(row);
        }

        let offset = query.page.offset;
        let limit = query.page.limit.unwrap_or(usize::MAX);
        Ok(joined.into_iter().skip(offset).take(limit).collect())
    }

    async fn select_single(&self, table: &str, filters: &[Filter]) -> BackendResult<Row> {
        self.record("select_single", table, filters)?;
        let mut rows = self.matching(table, filters);
        match rows.len() {
            0 => Err(BackendError::NotFound(table.to_string())),
            1 => Ok(rows.remove(0)),
            _ => Err(BackendError::Rejected {
                status: 406,
                message: "multiple rows".to_string(),
            }),
        }
    }

    async fn insert_returning(&self, table: &str, mut row: Row) -> BackendResult<Row> {
        self.record("insert_returning", table, &[])?;

        if table == POSTS {
            if let Some(key) = row.get("client_request_id").and_then(text) {
                let taken = !self
                    .matching(POSTS, &[Filter::eq("client_request_id", key)])
                    .is_empty();
                if taken {
                    return Err(BackendError::Conflict(
                        "duplicate key value violates unique constraint \"posts_client_request_id_key\""
                            .to_string(),
                    ));
                }
            }
            row.entry("is_public").or_insert(Value::Bool(true));
        }

        if !row.contains_key("id") {
            row.insert("id".to_string(), Value::String(self.next_id(table)));
        }
        if !row.contains_key("created_at") {
            let seq = *self.next_id.lock().unwrap() as i64;
            let created_at = Utc::now() + Duration::milliseconds(seq);
            row.insert(
                "created_at".to_string(),
                Value::String(created_at.to_rfc3339_opts(SecondsFormat::Micros, true)),
            );
        }

        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        let mut lost = self.lost_insert_responses.lock().unwrap();
        if let Some(pos) = lost.iter().position(|t| t == table) {
            lost.remove(pos);
            return Err(BackendError::Transport("connection reset after insert".to_string()));
        }

        Ok(row)
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> BackendResult<u64> {
        self.record("delete_where", table, filters)?;
        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(table.to_string()).or_default();
        let before = rows.len();
        rows.retain(|row| !matches(row, filters));
        Ok((before - rows.len()) as u64)
    }
}

/// Recorded upload
#[derive(Debug, Clone, PartialEq)]
pub struct Upload {
    pub key: String,
    pub size: usize,
    pub content_type: String,
}

/// Media store that records uploads, optionally failing them
#[derive(Default)]
pub struct FakeMediaStore {
    uploads: Mutex<Vec<Upload>>,
    upload_call_count: Mutex<usize>,
    fail_with: Mutex<Option<String>>,
    delay: Mutex<Option<std::time::Duration>>,
}

impl FakeMediaStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing(message: &str) -> Arc<Self> {
        let store = Self::default();
        *store.fail_with.lock().unwrap() = Some(message.to_string());
        Arc::new(store)
    }

    pub fn set_delay(&self, delay: std::time::Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_call_count(&self) -> usize {
        *self.upload_call_count.lock().unwrap()
    }
}

#[async_trait]
impl MediaStore for FakeMediaStore {
    async fn upload(&self, key: &str, bytes: Bytes, content_type: &str) -> Result<(), StorageError> {
        *self.upload_call_count.lock().unwrap() += 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.fail_with.lock().unwrap().clone() {
            return Err(StorageError::Upload(message));
        }

        self.uploads.lock().unwrap().push(Upload {
            key: key.to_string(),
            size: bytes.len(),
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

/// Default configuration with a fixed public media base URL
pub fn test_config() -> Config {
    Config::from_source(|key| match key {
        "MEDIA_PUBLIC_BASE_URL" => Some("https://cdn.example/user-uploads".to_string()),
        _ => None,
    })
    .expect("default config loads")
}

/// Services over the given fakes; `user` signs a user in
pub fn services(
    table: Arc<InMemoryTable>,
    media: Arc<FakeMediaStore>,
    user: Option<&str>,
) -> ServiceContext {
    let session = match user {
        Some(user_id) => SessionStore::signed_in(user_id),
        None => SessionStore::new(),
    };
    ServiceContext::new(&test_config(), table, media, Arc::new(session))
}
