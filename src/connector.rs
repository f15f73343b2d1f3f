//! Connection capability shared by the data source and the relational sink.
//!
//! Every operation opens its own connection through a [`Connector`] and holds
//! it in a [`ScopedConnection`], which releases it on every exit path.

use crate::data::model::Value;
use crate::error::Result;

/// Column names and row-major data returned by one statement.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// An open session with a query engine.
pub trait Connection {
    /// Run one statement, binding `params` to its `?` placeholders, and fetch
    /// all of its rows.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Release server-side resources. Must be safe to call more than once.
    fn close(&mut self) -> Result<()>;
}

/// Opens fresh connections; no pooling.
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// Connection closed on drop unless [`ScopedConnection::close`] already ran.
pub struct ScopedConnection {
    inner: Box<dyn Connection>,
    closed: bool,
}

impl ScopedConnection {
    pub fn open(connector: &dyn Connector) -> Result<Self> {
        Ok(Self {
            inner: connector.connect()?,
            closed: false,
        })
    }

    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.inner.execute(sql, params)
    }

    /// Close explicitly so the caller sees close errors on the success path.
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.inner.close()
    }
}

impl Drop for ScopedConnection {
    fn drop(&mut self) {
        if !self.closed {
            if let Err(e) = self.inner.close() {
                log::warn!("closing connection after failure: {e}");
            }
        }
    }
}
