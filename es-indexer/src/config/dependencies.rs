//! Dependency initialization and wiring for the indexer.

use std::sync::Arc;

use tracing::info;

use super::file::{load_config, resolve_config_path};
use super::settings::InvocationSettings;
use crate::IndexingError;
use es_indexer_pipeline::Orchestrator;
use es_indexer_repository::{MySqlSource, OpenSearchClient};

/// Container for all initialized dependencies.
pub struct Dependencies {
    /// The configured orchestrator ready to run.
    pub orchestrator: Orchestrator,
    /// The database source, kept to close its connection after the run.
    pub database: Arc<MySqlSource>,
}

impl Dependencies {
    /// Load the configuration of the invoked index and wire the pipeline.
    ///
    /// No connection is opened here; the database connects on first use and
    /// the search client per request.
    ///
    /// # Returns
    ///
    /// * `Ok(Dependencies)` - Initialized dependencies
    /// * `Err(IndexingError)` - If the configuration is missing or invalid
    pub fn new(settings: &InvocationSettings) -> Result<Self, IndexingError> {
        let path = resolve_config_path(
            &settings.config_dir,
            &settings.index_name,
            settings.config_file.as_deref(),
        )?;
        let config = load_config(&path)?;

        info!(
            index = %settings.index_name,
            config = %path.display(),
            rds_endpoint = %config.rds.endpoint,
            es_endpoint = %config.es.endpoint,
            "Initializing dependencies"
        );

        let database = Arc::new(MySqlSource::new(&config.rds)?);
        let search_client = OpenSearchClient::new(&config.es)?;

        let orchestrator = Orchestrator::new(
            &config,
            settings.run_options(),
            database.clone(),
            Arc::new(search_client),
        )?;

        Ok(Self {
            orchestrator,
            database,
        })
    }
}
