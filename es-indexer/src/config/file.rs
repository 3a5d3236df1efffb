//! Locating and parsing the per-index configuration document.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use url::Url;

use crate::IndexingError;
use es_indexer_shared::IndexerConfig;

/// Resolve the configuration file of `index_name`.
///
/// `locator` is a directory path or a `file://` URL pointing at one. The
/// file name defaults to `<index_name>.json` unless `file_name` is given.
pub fn resolve_config_path(
    locator: &str,
    index_name: &str,
    file_name: Option<&str>,
) -> Result<PathBuf, IndexingError> {
    let directory = if locator.starts_with("file:") {
        let url = Url::parse(locator)
            .map_err(|e| IndexingError::config(format!("invalid config locator {}: {}", locator, e)))?;
        url.to_file_path()
            .map_err(|_| IndexingError::config(format!("config locator {} is not a local path", locator)))?
    } else {
        PathBuf::from(locator)
    };

    let file_name = match file_name.map(str::trim).filter(|name| !name.is_empty()) {
        Some(name) => name.to_string(),
        None => format!("{}.json", index_name),
    };

    Ok(directory.join(file_name))
}

/// Read and parse the configuration document at `path`.
pub fn load_config(path: &Path) -> Result<IndexerConfig, IndexingError> {
    debug!(path = %path.display(), "Loading configuration");

    let text = fs::read_to_string(path).map_err(|e| {
        IndexingError::config(format!("cannot read config file {}: {}", path.display(), e))
    })?;

    serde_json::from_str(&text).map_err(|e| {
        IndexingError::config(format!("config file {} is not valid: {}", path.display(), e))
    })
}
