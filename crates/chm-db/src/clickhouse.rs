//! ClickHouse backend over the HTTP interface
//!
//! Every call is a single POST: the statement travels in the request body,
//! the database and output format travel as URL settings.

use crate::error::{DbError, DbResult};
use crate::traits::{Database, Row};
use async_trait::async_trait;
use chm_core::sql_utils::quote_literal;
use chm_core::{ClickHouseConnection, DbType};
use reqwest::{Client, RequestBuilder};

/// Output format requested for row-returning queries
const ROW_FORMAT: &str = "JSONEachRow";

/// ClickHouse database backend
pub struct ClickHouseBackend {
    conn: ClickHouseConnection,
    client: Client,
}

impl ClickHouseBackend {
    /// Create a backend for `conn`. No request is sent until first use.
    pub fn new(conn: ClickHouseConnection) -> DbResult<Self> {
        let client = Client::builder().build().map_err(|e| {
            DbError::ConnectionError(format!("Failed to create HTTP client: {}", e))
        })?;
        Ok(Self { conn, client })
    }

    fn request(&self) -> RequestBuilder {
        self.client
            .post(self.conn.base_url())
            .basic_auth(&self.conn.user, Some(&self.conn.password))
            .query(&[("database", self.conn.database.as_str())])
    }

    /// Send a request and return the response body, mapping non-2xx
    /// responses to execution errors carrying the server's message.
    async fn send(&self, request: RequestBuilder, sql: &str) -> DbResult<String> {
        log::debug!("clickhouse: {}", sql);
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(DbError::ExecutionError(format!(
                "{} (HTTP {}): {}",
                body.trim(),
                status.as_u16(),
                sql
            )));
        }
        Ok(body)
    }
}

/// Parse a `JSONEachRow` response body: one JSON object per line.
pub fn parse_json_each_row(body: &str) -> DbResult<Vec<Row>> {
    body.lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str::<Row>(line)
                .map_err(|e| DbError::DecodeError(format!("{}: {}", e, line)))
        })
        .collect()
}

#[async_trait]
impl Database for ClickHouseBackend {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.send(self.request().body(sql.to_string()), sql).await?;
        Ok(())
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        let request = self
            .request()
            .query(&[("default_format", ROW_FORMAT)])
            .body(sql.to_string());
        let body = self.send(request, sql).await?;
        parse_json_each_row(&body)
    }

    async fn insert_row(&self, table: &str, row: &Row) -> DbResult<()> {
        let insert = format!("INSERT INTO {} FORMAT {}", table, ROW_FORMAT);
        let data = serde_json::to_string(row).map_err(|e| DbError::DecodeError(e.to_string()))?;
        let request = self.request().query(&[("query", insert.as_str())]).body(data);
        self.send(request, &insert).await?;
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        let sql = format!(
            "SELECT 1 FROM system.tables WHERE database = currentDatabase() AND name = {}",
            quote_literal(name, DbType::ClickHouse)
        );
        Ok(!self.query(&sql).await?.is_empty())
    }

    fn db_type(&self) -> DbType {
        DbType::ClickHouse
    }
}

#[cfg(test)]
#[path = "clickhouse_test.rs"]
mod tests;
