/// Table API over a direct Postgres connection
///
/// Rows travel as `jsonb` (`to_jsonb(t)`) so the same serde models decode
/// rows from either adapter. Filter values are bound as text and compared
/// against `column::text`.
use super::{identifier, Filter, OrderedQuery, Row, TableApi};
use crate::error::{BackendError, BackendResult};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Clone)]
pub struct PgTable {
    pool: PgPool,
}

impl PgTable {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> BackendResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Postgres table backend connected");
        Ok(Self { pool })
    }

    /// Apply the schema in `migrations/`
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_json(&self, sql: &str, binds: Vec<String>) -> BackendResult<Vec<Row>> {
        let mut query = sqlx::query_scalar::<_, Value>(sql);
        for value in binds {
            query = query.bind(value);
        }

        query
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(into_row)
            .collect()
    }
}

fn into_row(value: Value) -> BackendResult<Row> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(BackendError::InvalidQuery(format!(
            "expected a jsonb object row, got {other}"
        ))),
    }
}

/// `WHERE` clause over alias `t`, with placeholders numbered from `$1`
pub(crate) fn where_clause(filters: &[Filter]) -> BackendResult<(String, Vec<String>)> {
    let mut conditions = Vec::with_capacity(filters.len());
    let mut binds = Vec::new();

    for filter in filters {
        let column = identifier(&filter.column)?;
        match filter.value_text() {
            Some(text) => {
                binds.push(text);
                conditions.push(format!("t.{column}::text = ${}", binds.len()));
            }
            None => conditions.push(format!("t.{column} IS NULL")),
        }
    }

    if conditions.is_empty() {
        Ok((String::new(), binds))
    } else {
        Ok((format!(" WHERE {}", conditions.join(" AND ")), binds))
    }
}

pub(crate) fn ordered_select_sql(table: &str, query: &OrderedQuery) -> BackendResult<(String, Vec<String>)> {
    let table = identifier(table)?;
    let mut projection = String::from("to_jsonb(t)");
    let mut joins = String::new();

    for (i, embed) in query.embeds.iter().enumerate() {
        let related = identifier(&embed.table)?;
        let foreign_key = identifier(&embed.foreign_key)?;
        let join = if embed.inner { "JOIN" } else { "LEFT JOIN" };
        joins.push_str(&format!(
            " {join} {related} e{i} ON e{i}.id = t.{foreign_key}"
        ));
        projection.push_str(&format!(
            " || jsonb_build_object('{related}', CASE WHEN e{i}.id IS NULL THEN 'null'::jsonb ELSE to_jsonb(e{i}) END)"
        ));
    }

    let (filter_sql, binds) = where_clause(&query.filters)?;
    let order_column = identifier(&query.order.column)?;
    let direction = if query.order.descending { "DESC" } else { "ASC" };

    let mut sql = format!(
        "SELECT {projection} FROM {table} t{joins}{filter_sql} ORDER BY t.{order_column} {direction}"
    );
    if let Some(limit) = query.page.limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
    if query.page.offset > 0 {
        sql.push_str(&format!(" OFFSET {}", query.page.offset));
    }

    Ok((sql, binds))
}

pub(crate) fn insert_sql(table: &str, row: &Row) -> BackendResult<String> {
    let table = identifier(table)?;
    if row.is_empty() {
        return Err(BackendError::InvalidQuery(format!(
            "insert into {table} has no columns"
        )));
    }

    let columns = row
        .keys()
        .map(|k| identifier(k).map(str::to_string))
        .collect::<BackendResult<Vec<_>>>()?
        .join(", ");

    // Only the supplied columns are written so column defaults (id,
    // created_at, is_public) still apply.
    Ok(format!(
        "INSERT INTO {table} AS t ({columns}) \
         SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
         RETURNING to_jsonb(t)"
    ))
}

#[async_trait]
impl TableApi for PgTable {
    async fn select_where(&self, table: &str, filters: &[Filter]) -> BackendResult<Vec<Row>> {
        let table = identifier(table)?;
        let (filter_sql, binds) = where_clause(filters)?;
        let sql = format!("SELECT to_jsonb(t) FROM {table} t{filter_sql}");
        self.fetch_json(&sql, binds).await
    }

    async fn select_ordered(&self, table: &str, query: &OrderedQuery) -> BackendResult<Vec<Row>> {
        let (sql, binds) = ordered_select_sql(table, query)?;
        self.fetch_json(&sql, binds).await
    }

    async fn select_single(&self, table: &str, filters: &[Filter]) -> BackendResult<Row> {
        let table = identifier(table)?;
        let (filter_sql, binds) = where_clause(filters)?;
        let sql = format!("SELECT to_jsonb(t) FROM {table} t{filter_sql} LIMIT 2");

        let mut rows = self.fetch_json(&sql, binds).await?;
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
        let sql = insert_sql(table, &row)?;
        let value = sqlx::query_scalar::<_, Value>(&sql)
            .bind(Value::Object(row))
            .fetch_one(&self.pool)
            .await?;

        into_row(value)
    }

    async fn delete_where(&self, table: &str, filters: &[Filter]) -> BackendResult<u64> {
        let table = identifier(table)?;
        if filters.is_empty() {
            return Err(BackendError::InvalidQuery(format!(
                "refusing unfiltered delete on {table}"
            )));
        }

        let (filter_sql, binds) = where_clause(filters)?;
        let sql = format!("DELETE FROM {table} t{filter_sql}");

        let mut query = sqlx::query(&sql);
        for value in binds {
            query = query.bind(value);
        }
        let result = query.execute(&self.pool).await?;

        Ok(result.rows_affected())
    }
}
