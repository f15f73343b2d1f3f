use std::path::PathBuf;

use crate::config::ObjectStoreConfig;
use crate::connector::{Connector, ScopedConnection};
use crate::data::format::encode_for_key;
use crate::data::model::{Table, Value};
use crate::error::{Result, ScoringError};

// ---------------------------------------------------------------------------
// Object store
// ---------------------------------------------------------------------------

/// Write-only blob storage addressed by bucket and key.
pub trait ObjectStore {
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;
}

/// Serialize `table` (format chosen by the key's extension) and store it at
/// `bucket/key` as a single object. No retry.
pub fn upload(store: &dyn ObjectStore, table: &Table, bucket: &str, key: &str) -> Result<()> {
    let encoded = encode_for_key(table, key)?;
    log::info!(
        "uploading {} rows ({} bytes, {}) to {bucket}/{key}",
        table.len(),
        encoded.body.len(),
        encoded.content_type
    );
    store.put(bucket, key, encoded.body, encoded.content_type)
}

/// Build the store selected by configuration.
pub fn store_from_config(config: &ObjectStoreConfig) -> Result<Box<dyn ObjectStore>> {
    let store: Box<dyn ObjectStore> = match config {
        ObjectStoreConfig::Filesystem { root } => Box::new(FsObjectStore::new(root)),
        ObjectStoreConfig::Http { endpoint, token } => {
            Box::new(HttpObjectStore::new(endpoint, token.clone())?)
        }
    };
    Ok(store)
}

/// Buckets as directories under a local root.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn object_path(&self, bucket: &str, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| !part.is_empty())
            .fold(self.root.join(bucket), |path, part| path.join(part))
    }
}

impl ObjectStore for FsObjectStore {
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, _content_type: &str) -> Result<()> {
        let path = self.object_path(bucket, key);
        let target = format!("{bucket}/{key}");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ScoringError::write(&target, e))?;
        }
        std::fs::write(&path, body).map_err(|e| ScoringError::write(&target, e))?;
        log::debug!("wrote {}", path.display());
        Ok(())
    }
}

/// S3-compatible endpoint accepting `PUT {endpoint}/{bucket}/{key}`.
pub struct HttpObjectStore {
    endpoint: url::Url,
    token: Option<String>,
    client: reqwest::blocking::Client,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, token: Option<String>) -> Result<Self> {
        let endpoint = url::Url::parse(endpoint)
            .map_err(|e| ScoringError::Config(format!("invalid object store endpoint '{endpoint}': {e}")))?;
        let client = reqwest::blocking::Client::builder()
            .build()
            .map_err(|e| ScoringError::connectivity(endpoint.as_str(), e))?;
        Ok(Self {
            endpoint,
            token,
            client,
        })
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> Result<url::Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| ScoringError::Config(format!("endpoint {} cannot be a base URL", self.endpoint)))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/').filter(|part| !part.is_empty()));
        Ok(url)
    }
}

impl ObjectStore for HttpObjectStore {
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let url = self.object_url(bucket, key)?;
        let target = format!("{bucket}/{key}");

        let mut request = self
            .client
            .put(url.clone())
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .map_err(|e| ScoringError::connectivity(url.as_str(), e))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(ScoringError::write(target, format!("HTTP {status}: {detail}")));
        }
        log::debug!("PUT {url} -> {status}");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Relational sink
// ---------------------------------------------------------------------------

/// `INSERT INTO t (a, b) VALUES (?, ?)` with the table's column names used
/// verbatim as identifiers.
pub fn insert_statement(table: &Table, table_name: &str) -> String {
    let columns = table.column_names().join(", ");
    let placeholders = vec!["?"; table.width()].join(", ");
    format!("INSERT INTO {table_name} ({columns}) VALUES ({placeholders})")
}

/// Insert every row of `table` into `table_name`, one parameterized statement
/// per row, in table order, over a single connection.
///
/// The first failing row aborts the loop; rows already inserted stay. The
/// connection is released on every path.
pub fn insert(connector: &dyn Connector, table: &Table, table_name: &str) -> Result<()> {
    let statement = insert_statement(table, table_name);
    log::info!("inserting {} rows into {table_name}", table.len());

    let mut conn = ScopedConnection::open(connector)?;
    for (row_no, row) in table.rows().enumerate() {
        let params: Vec<Value> = row.into_iter().cloned().collect();
        log::debug!("insert row {row_no}");
        conn.execute(&statement, &params).map_err(|e| match e {
            ScoringError::Query(message) => {
                ScoringError::write(table_name, format!("row {row_no}: {message}"))
            }
            other => other,
        })?;
    }
    conn.close()
}
