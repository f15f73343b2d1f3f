use anyhow::{Context, Result};

use batch_scorer::config::ScoringConfig;
use batch_scorer::pipeline::{self, Collaborators};
use batch_scorer::registry::FsModelRegistry;
use batch_scorer::sink::store_from_config;
use batch_scorer::trino::TrinoConnector;

fn main() -> Result<()> {
    env_logger::init();

    let config = ScoringConfig::from_env().context("reading configuration")?;
    log::info!(
        "scoring against {} (catalog {}, schema {})",
        config.db.address(),
        config.db.catalog,
        config.db.schema
    );

    let engine = TrinoConnector::new(config.db.clone());
    let registry = FsModelRegistry::new(&config.registry_path);
    let store = store_from_config(&config.object_store).context("configuring object store")?;

    let io = Collaborators {
        source: &engine,
        registry: &registry,
        store: store.as_ref(),
        sink: &engine,
    };

    let table = pipeline::run(&config, &io).context("scoring run failed")?;
    log::info!("done: {} rows written", table.len());
    Ok(())
}
