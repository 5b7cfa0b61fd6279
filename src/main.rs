use anyhow::Context;
use log::info;
use std::sync::Arc;

use exam_scheduler::config::AppConfig;
use exam_scheduler::data::Dataset;
use exam_scheduler::notify::LogNotifier;
use exam_scheduler::server::{self, AppState};
use exam_scheduler::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::load().context("loading configuration")?;

    let store = match &config.dataset_path {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading dataset {}", path.display()))?;
            let dataset: Dataset = serde_json::from_str(&raw)
                .with_context(|| format!("parsing dataset {}", path.display()))?;
            info!("Loaded dataset from {}", path.display());
            InMemoryStore::from_dataset(dataset).context("seeding store")?
        }
        None => InMemoryStore::new(),
    };

    let state = AppState::new(Arc::new(store), Arc::new(LogNotifier), config.scheduling);
    server::run_server(&config.bind_address, state).await?;

    Ok(())
}
