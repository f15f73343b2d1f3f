//! Batch scoring: fetch a table from a query engine, apply a registered
//! classifier, and write the scored table to an object store and back to the
//! engine.

pub mod config;
pub mod connector;
pub mod data;
pub mod error;
pub mod pipeline;
pub mod predictor;
pub mod registry;
pub mod sink;
pub mod source;
pub mod trino;

#[cfg(test)]
mod testing;
