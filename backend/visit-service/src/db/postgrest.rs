/// Table API over the hosted PostgREST endpoint (`/rest/v1`)
///
/// Query shapes map onto PostgREST's URL dialect:
/// - filters: `?name=eq.Trattoria%20Bella&area=eq.Shibuya`
/// - ordering: `order=created_at.desc`
/// - embedding: `select=*,user_profiles!inner(*)`
use super::{identifier, Filter, OrderedQuery, Row, TableApi};
use crate::auth::AuthProvider;
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use reqwest::{Client as HttpClient, RequestBuilder, Response};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

/// Transport-level ceiling; services apply their own, shorter deadlines.
const HTTP_TIMEOUT_SECS: u64 = 120;

#[derive(Clone)]
pub struct PostgrestTable {
    http: HttpClient,
    rest_url: String,
    api_key: String,
    session: Option<Arc<dyn AuthProvider>>,
}

impl PostgrestTable {
    /// `project_url` is the project root, e.g. `https://xyz.supabase.co`
    pub fn new(project_url: &str, api_key: &str) -> BackendResult<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::Transport(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            rest_url: format!("{}/rest/v1", project_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            session: None,
        })
    }

    /// Authenticate each request with the session's current access token so
    /// row-level security applies to whoever is signed in at that moment.
    /// Anonymous requests fall back to the anon key.
    pub fn with_session(mut self, session: Arc<dyn AuthProvider>) -> Self {
        self.session = Some(session);
        self
    }

    fn bearer(&self) -> String {
        self.session
            .as_ref()
            .and_then(|s| s.access_token())
            .unwrap_or_else(|| self.api_key.clone())
    }

    fn request(&self, method: reqwest::Method, table: &str) -> BackendResult<RequestBuilder> {
        let url = format!("{}/{}", self.rest_url, identifier(table)?);
        Ok(self
            .http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer()))
    }

    async fn fetch_rows(&self, request: RequestBuilder, table: &str) -> BackendResult<Vec<Row>> {
        let response = check_status(request.send().await?, table).await?;
        Ok(response.json::<Vec<Row>>().await?)
    }
}

pub(crate) fn filter_params(filters: &[Filter]) -> BackendResult<Vec<(String, String)>> {
    filters
        .iter()
        .map(|f| {
            let column = identifier(&f.column)?.to_string();
            let op = match f.value_text() {
                Some(text) => format!("eq.{text}"),
                None => "is.null".to_string(),
            };
            Ok((column, op))
        })
        .collect()
}

pub(crate) fn select_param(query: &OrderedQuery) -> BackendResult<String> {
    let mut select = String::from("*");
    for embed in &query.embeds {
        let table = identifier(&embed.table)?;
        if embed.inner {
            select.push_str(&format!(",{table}!inner(*)"));
        } else {
            select.push_str(&format!(",{table}(*)"));
        }
    }
    Ok(select)
}

pub(crate) fn order_param(query: &OrderedQuery) -> BackendResult<String> {
    let column = identifier(&query.order.column)?;
    let direction = if query.order.descending { "desc" } else { "asc" };
    Ok(format!("{column}.{direction}"))
}

/// Error body PostgREST sends with non-2xx responses
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

// 23505 = unique_violation; 409 also covers foreign key and exclusion failures
const UNIQUE_VIOLATION: &str = "23505";

async fn check_status(response: Response, table: &str) -> BackendResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::debug!(table, status = status.as_u16(), %body, "PostgREST request rejected");
    Err(status_error(status.as_u16(), &body, table))
}

pub(crate) fn status_error(status: u16, body: &str, table: &str) -> BackendError {
    let parsed = serde_json::from_str::<ErrorBody>(body).ok();
    let code = parsed.as_ref().and_then(|b| b.code.as_deref());
    let message = match parsed.as_ref().and_then(|b| b.message.as_deref()) {
        Some(message) => match code {
            Some(code) => format!("{code}: {message}"),
            None => message.to_string(),
        },
        None => body.to_string(),
    };

    match status {
        404 => BackendError::NotFound(table.to_string()),
        409 if code == Some(UNIQUE_VIOLATION) => BackendError::Conflict(message),
        other => BackendError::Rejected {
            status: other,
            message,
        },
    }
}

#[async_trait]
impl TableApi for PostgrestTable {
    async fn select_where(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>> {
        let request = self
            .request(reqwest::Method::GET, table)?
            .query(&[("select", "*")])
            .query(&filter_params(filters)?);

        self.fetch_rows(request, table).await
    }

    async fn select_ordered(&self, table: &str, query: &OrderedQuery) -> BackendResult<Vec<Row>> {
        let mut request = self
            .request(reqwest::Method::GET, table)?
            .query(&[("select", select_param(query)?), ("order", order_param(query)?)])
            .query(&filter_params(&query.filters)?);

        if let Some(limit) = query.page.limit {
            request = request.query(&[("limit", limit)]);
        }
        if query.page.offset > 0 {
            request = request.query(&[("offset", query.page.offset)]);
        }

        self.fetch_rows(request, table).await
    }

    async fn select_single(&self, table: &str, filters: &[Filter]) -> BackendResult<Row> {
        // limit 2 so "more than one" is distinguishable from "exactly one"
        let request = self
            .request(reqwest::Method::GET, table)?
            .query(&[("select", "*"), ("limit", "2")])
            .query(&filter_params(filters)?);

        let mut rows = self.fetch_rows(request, table).await?;
        match rows.len() {
            0 => Err(BackendError::NotFound(table.to_string())),
            1 => Ok(rows.remove(0)),
            _ => Err(BackendError::Rejected {
                status: 406,
                message: format!("multiple rows in {table} match a single-row select"),
            }),
        }
    }

    async fn insert_returning(&self, table: &str, row: Row) -> BackendResult<Row> {
        let request = self
            .request(reqwest::Method::POST, table)?
            .header("Prefer", "return=representation")
            .json(&row);

        let mut rows = self.fetch_rows(request, table).await?;
        if rows.is_empty() {
            return Err(BackendError::Rejected {
                status: 201,
                message: format!("insert into {table} returned no row"),
            });
        }
        Ok(rows.remove(0))
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> BackendResult<u64> {
        if filters.is_empty() {
            return Err(BackendError::InvalidQuery(format!(
                "refusing unfiltered delete on {table}"
            )));
        }

        let request = self
            .request(reqwest::Method::DELETE, table)?
            .header("Prefer", "return=representation")
            .query(&filter_params(filters)?);

        let rows = self.fetch_rows(request, table).await?;
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::SessionStore;
    use crate::db::{Embed, OrderBy, Page, POSTS, RESTAURANTS, USER_PROFILES};
    use serde_json::Value;

    fn authorization(table: &PostgrestTable) -> String {
        let request = table
            .request(reqwest::Method::GET, POSTS)
            .unwrap()
            .build()
            .unwrap();
        request.headers()["authorization"].to_str().unwrap().to_string()
    }

    #[test]
    fn test_filter_params() {
        let params = filter_params(&[
            Filter::eq("name", "Trattoria Bella"),
            Filter::eq("is_public", true),
            Filter::eq("area", Value::Null),
        ])
        .unwrap();

        assert_eq!(
            params,
            vec![
                ("name".to_string(), "eq.Trattoria Bella".to_string()),
                ("is_public".to_string(), "eq.true".to_string()),
                ("area".to_string(), "is.null".to_string()),
            ]
        );
    }

    #[test]
    fn test_filter_params_reject_bad_column() {
        assert!(filter_params(&[Filter::eq("name;--", "x")]).is_err());
    }

    #[test]
    fn test_select_and_order_params() {
        let query = OrderedQuery::new(OrderBy::desc("created_at"))
            .embed(Embed::inner(USER_PROFILES, "user_id"))
            .embed(Embed::inner(RESTAURANTS, "restaurant_id"))
            .page(Page::first(10));

        assert_eq!(
            select_param(&query).unwrap(),
            "*,user_profiles!inner(*),restaurants!inner(*)"
        );
        assert_eq!(order_param(&query).unwrap(), "created_at.desc");
    }

    #[test]
    fn test_rest_url() {
        let table = PostgrestTable::new("https://demo.supabase.co/", "anon").unwrap();
        assert_eq!(table.rest_url, "https://demo.supabase.co/rest/v1");
        assert!(table.request(reqwest::Method::GET, POSTS).is_ok());
        assert!(table.request(reqwest::Method::GET, "../auth").is_err());
    }

    #[tokio::test]
    async fn test_unfiltered_delete_refused() {
        let table = PostgrestTable::new("http://127.0.0.1:9", "anon").unwrap();
        let result = table.delete_where(POSTS, &[]).await;
        assert!(matches!(result, Err(BackendError::InvalidQuery(_))));
    }

    #[test]
    fn test_unique_violation_is_conflict() {
        let err = status_error(
            409,
            r#"{"code":"23505","message":"duplicate key value violates unique constraint \"posts_client_request_id_key\""}"#,
            POSTS,
        );
        match err {
            BackendError::Conflict(message) => {
                assert!(message.starts_with("23505: "));
                assert!(message.contains("posts_client_request_id_key"));
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn test_foreign_key_violation_is_rejected() {
        let err = status_error(
            409,
            r#"{"code":"23503","details":"Key is not present in table \"user_profiles\".","message":"insert or update on table \"posts\" violates foreign key constraint \"posts_user_id_fkey\""}"#,
            POSTS,
        );
        match err {
            BackendError::Rejected { status, message } => {
                assert_eq!(status, 409);
                assert!(message.starts_with("23503: "));
                assert!(message.contains("posts_user_id_fkey"));
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_unparsable_conflict_body_is_rejected_verbatim() {
        let err = status_error(409, "conflict", POSTS);
        assert!(matches!(
            err,
            BackendError::Rejected { status: 409, ref message } if message == "conflict"
        ));
    }

    #[test]
    fn test_other_statuses() {
        assert!(matches!(
            status_error(404, "", RESTAURANTS),
            BackendError::NotFound(ref t) if t == RESTAURANTS
        ));
        assert!(matches!(
            status_error(401, r#"{"code":"PGRST301","message":"JWT expired"}"#, POSTS),
            BackendError::Rejected { status: 401, ref message } if message == "PGRST301: JWT expired"
        ));
    }

    #[test]
    fn test_bearer_follows_session() {
        let session = Arc::new(SessionStore::new());
        let table = PostgrestTable::new("https://demo.supabase.co", "anon")
            .unwrap()
            .with_session(session.clone());
        assert_eq!(authorization(&table), "Bearer anon");

        session.sign_in("u1", Some("user-jwt".into()));
        assert_eq!(authorization(&table), "Bearer user-jwt");

        session.sign_out();
        assert_eq!(authorization(&table), "Bearer anon");
    }
}
