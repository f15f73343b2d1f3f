//! Fixed-sequence scoring run:
//!
//! ```text
//!   FETCH ─► LOAD_MODEL ─► PREDICT ─► AUGMENT ─► FAN_OUT_WRITE (object store, then table) ─► DONE
//! ```
//!
//! Any failure ends the run. Completed steps are not undone, so a failed
//! insert leaves an already uploaded object in place.

use std::fmt;

use crate::config::ScoringConfig;
use crate::connector::Connector;
use crate::data::model::Table;
use crate::error::Result;
use crate::predictor::predict;
use crate::registry::ModelRegistry;
use crate::sink::{insert, upload, ObjectStore};
use crate::source::{query, INPUT_QUERY};

/// Name of the column the predictions are written to.
pub const PREDICTION_COLUMN: &str = "prediction";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Fetch,
    LoadModel,
    Predict,
    Augment,
    FanOutWrite,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Fetch => "FETCH",
            Stage::LoadModel => "LOAD_MODEL",
            Stage::Predict => "PREDICT",
            Stage::Augment => "AUGMENT",
            Stage::FanOutWrite => "FAN_OUT_WRITE",
            Stage::Done => "DONE",
        };
        f.write_str(name)
    }
}

/// The external systems a run talks to.
pub struct Collaborators<'a> {
    pub source: &'a dyn Connector,
    pub registry: &'a dyn ModelRegistry,
    pub store: &'a dyn ObjectStore,
    pub sink: &'a dyn Connector,
}

/// A scoring run that failed, and where.
#[derive(Debug, thiserror::Error)]
#[error("{stage} failed: {source}")]
pub struct RunError {
    pub stage: Stage,
    #[source]
    pub source: crate::error::ScoringError,
}

fn step<T>(stage: Stage, f: impl FnOnce() -> Result<T>) -> std::result::Result<T, RunError> {
    log::info!("[{stage}]");
    f().map_err(|source| {
        log::error!("[{stage}] {} error: {source}", source.kind());
        RunError { stage, source }
    })
}

/// Execute one scoring run and return the augmented table.
pub fn run(config: &ScoringConfig, io: &Collaborators<'_>) -> std::result::Result<Table, RunError> {
    let mut table = step(Stage::Fetch, || query(io.source, INPUT_QUERY))?;

    let model = step(Stage::LoadModel, || {
        let model_ref = config.model.resolve()?;
        io.registry
            .load(&model_ref.name, &model_ref.environment, &model_ref.version)
    })?;

    let predictions = step(Stage::Predict, || predict(model.as_ref(), &table))?;
    drop(model);

    step(Stage::Augment, || table.set_column(PREDICTION_COLUMN, predictions))?;

    step(Stage::FanOutWrite, || {
        let bucket = config.bucket()?;
        upload(io.store, &table, bucket, &config.key)?;
        insert(io.sink, &table, &config.output_table)
    })?;

    log::info!("[{}] scored {} rows", Stage::Done, table.len());
    Ok(table)
}
