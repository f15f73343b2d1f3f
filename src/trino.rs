//! Query engine adapter speaking the Trino client REST protocol.
//!
//! A statement is `POST`ed to `/v1/statement`; the engine answers with a page
//! of results and a `nextUri` to poll until the query finishes.

use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::config::DbConfig;
use crate::connector::{Connection, Connector, QueryResult};
use crate::data::model::Value;
use crate::error::{Result, ScoringError};

const PREPARED_NAME: &str = "stmt";

/// Opens a new HTTP session per connection.
#[derive(Debug, Clone)]
pub struct TrinoConnector {
    db: DbConfig,
}

impl TrinoConnector {
    pub fn new(db: DbConfig) -> Self {
        Self { db }
    }
}

impl Connector for TrinoConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        let client = Client::builder()
            .build()
            .map_err(|e| ScoringError::connectivity(self.db.address(), e))?;
        log::debug!("opened connection to {} as {}", self.db.address(), self.db.user);
        Ok(Box::new(TrinoConnection {
            db: self.db.clone(),
            client,
            pending: None,
        }))
    }
}

pub struct TrinoConnection {
    db: DbConfig,
    client: Client,
    /// `nextUri` of a query that has not been drained.
    pending: Option<String>,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResults {
    next_uri: Option<String>,
    columns: Option<Vec<ColumnInfo>>,
    data: Option<Vec<Vec<JsonValue>>>,
    error: Option<QueryErrorInfo>,
}

#[derive(Debug, Deserialize)]
struct ColumnInfo {
    name: String,
    #[serde(rename = "type")]
    type_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryErrorInfo {
    message: String,
    error_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

impl TrinoConnection {
    fn statement_url(&self) -> String {
        format!("http://{}/v1/statement", self.db.address())
    }

    fn submit(&self, sql: &str, params: &[Value]) -> Result<QueryResults> {
        let mut request = self
            .client
            .post(self.statement_url())
            .header("X-Trino-User", &self.db.user)
            .header("X-Trino-Catalog", &self.db.catalog)
            .header("X-Trino-Schema", &self.db.schema)
            .header("X-Trino-Source", env!("CARGO_PKG_NAME"));

        let body = if params.is_empty() {
            sql.to_string()
        } else {
            request = request.header(
                "X-Trino-Prepared-Statement",
                format!("{PREPARED_NAME}={}", urlencoding::encode(sql)),
            );
            execute_statement(params)
        };

        self.read_page(request.body(body))
    }

    fn read_page(&self, request: reqwest::blocking::RequestBuilder) -> Result<QueryResults> {
        let address = self.db.address();
        let request = request
            .build()
            .map_err(|e| ScoringError::connectivity(&address, e))?;
        let method = request.method().clone();
        let url = request.url().clone();
        let response = self
            .client
            .execute(request)
            .map_err(|e| ScoringError::connectivity(&address, e))?;

        let status = response.status();
        log::debug!("{method} {url} -> {status}");
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                    ScoringError::connectivity(&address, format!("HTTP {status}: {detail}"))
                }
                s if s.is_server_error() => {
                    ScoringError::connectivity(&address, format!("HTTP {status}: {detail}"))
                }
                _ => ScoringError::Query(format!("HTTP {status}: {detail}")),
            });
        }

        let text = response
            .text()
            .map_err(|e| ScoringError::connectivity(&address, e))?;
        parse_page(&text)
    }
}

impl Connection for TrinoConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        log::debug!("execute: {sql} ({} params)", params.len());
        let mut page = self.submit(sql, params)?;
        let mut columns: Option<Vec<ColumnInfo>> = None;
        let mut rows = Vec::new();

        loop {
            self.pending = page.next_uri.clone();
            if let Some(err) = page.error {
                return Err(query_error(err));
            }
            if columns.is_none() {
                columns = page.columns;
            }
            if let Some(data) = page.data {
                let types = columns.as_deref().ok_or_else(|| {
                    ScoringError::Query("result data arrived before column descriptors".to_string())
                })?;
                for raw in data {
                    rows.push(convert_row(raw, types)?);
                }
            }

            match page.next_uri {
                Some(next) => page = self.read_page(self.client.get(next))?,
                None => break,
            }
        }

        Ok(QueryResult {
            columns: columns
                .unwrap_or_default()
                .into_iter()
                .map(|c| c.name)
                .collect(),
            rows,
        })
    }

    fn close(&mut self) -> Result<()> {
        if let Some(next) = self.pending.take() {
            log::debug!("cancelling unfinished query at {next}");
            self.client
                .delete(&next)
                .send()
                .map_err(|e| ScoringError::connectivity(self.db.address(), e))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_page(text: &str) -> Result<QueryResults> {
    serde_json::from_str(text)
        .map_err(|e| ScoringError::Query(format!("unreadable response from query engine: {e}")))
}

fn query_error(err: QueryErrorInfo) -> ScoringError {
    match err.error_name {
        Some(name) => ScoringError::Query(format!("{name}: {}", err.message)),
        None => ScoringError::Query(err.message),
    }
}

fn execute_statement(params: &[Value]) -> String {
    let literals: Vec<String> = params.iter().map(sql_literal).collect();
    format!("EXECUTE {PREPARED_NAME} USING {}", literals.join(", "))
}

/// Render a parameter as a SQL literal for `EXECUTE ... USING`.
pub fn sql_literal(value: &Value) -> String {
    match value {
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) if f.is_nan() => "nan()".to_string(),
        Value::Float(f) if f.is_infinite() && *f > 0.0 => "infinity()".to_string(),
        Value::Float(f) if f.is_infinite() => "-infinity()".to_string(),
        Value::Float(f) => format!("{f:e}"),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Date(d) => format!("DATE '{}'", d.replace('\'', "''")),
        Value::Null => "NULL".to_string(),
    }
}

fn convert_row(raw: Vec<JsonValue>, columns: &[ColumnInfo]) -> Result<Vec<Value>> {
    if raw.len() != columns.len() {
        return Err(ScoringError::Query(format!(
            "row has {} values but the result has {} columns",
            raw.len(),
            columns.len()
        )));
    }
    Ok(raw
        .iter()
        .zip(columns)
        .map(|(cell, col)| json_to_value(cell, &col.type_name))
        .collect())
}

/// Convert one JSON cell using the column's engine type.
fn json_to_value(cell: &JsonValue, type_name: &str) -> Value {
    let base_type = type_name.split('(').next().unwrap_or(type_name);
    match (cell, base_type) {
        (JsonValue::Null, _) => Value::Null,
        (JsonValue::String(s), "date") => Value::Date(s.clone()),
        (JsonValue::String(s), "decimal") => s
            .parse::<f64>()
            .map(Value::Float)
            .unwrap_or_else(|_| Value::String(s.clone())),
        (JsonValue::String(s), "double" | "real") => match s.as_str() {
            "NaN" => Value::Float(f64::NAN),
            "Infinity" => Value::Float(f64::INFINITY),
            "-Infinity" => Value::Float(f64::NEG_INFINITY),
            _ => Value::String(s.clone()),
        },
        (JsonValue::String(s), _) => Value::String(s.clone()),
        (JsonValue::Number(n), _) => {
            if let Some(i) = n.as_i64() {
                if matches!(base_type, "double" | "real") {
                    Value::Float(i as f64)
                } else {
                    Value::Integer(i)
                }
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        (JsonValue::Bool(b), _) => Value::Bool(*b),
        (other, _) => Value::String(other.to_string()),
    }
}
