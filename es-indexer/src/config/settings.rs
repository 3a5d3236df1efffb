//! Invocation parameters read from the environment.

use std::env;

use crate::IndexingError;
use es_indexer_pipeline::orchestrator::{RunOptions, DEFAULT_BATCH_LIMIT};

/// Directory searched when `INDEXER_CONFIG_DIR` is not set.
const DEFAULT_CONFIG_DIR: &str = ".";

/// Parameters of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationSettings {
    pub config_dir: String,
    pub config_file: Option<String>,
    pub index_name: String,
    pub batch_limit: usize,
    pub offset: Option<u64>,
    pub dry_run: bool,
    pub update_watermark: bool,
    pub exclude_failed_documents: bool,
    pub debug: bool,
}

impl InvocationSettings {
    /// Read the settings from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `INDEX_NAME`: target index (required)
    /// - `INDEXER_CONFIG_DIR`: directory or `file://` URL holding the config (default: .)
    /// - `INDEXER_CONFIG_FILE`: config file name (default: `<INDEX_NAME>.json`)
    /// - `BULK_LIMIT`: rows per run, clamped to 1..=5000 (default: 1000)
    /// - `FULL_INDEX_OFFSET`: start a full reindex at this offset
    /// - `DRY_RUN`: map only, submit nothing (default: false)
    /// - `UPDATE_WATERMARK`: reset watermarks after submitting (default: true)
    /// - `EXCLUDE_FAILED_DOCUMENTS`: keep watermarks of rejected documents (default: false)
    /// - `INDEXER_DEBUG`: capture query and payload, log at debug level (default: false)
    pub fn from_env() -> Result<Self, IndexingError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the settings through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, IndexingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let index_name = get("INDEX_NAME")
            .ok_or_else(|| IndexingError::config("missing environment variable: INDEX_NAME"))?;

        let batch_limit = match get("BULK_LIMIT") {
            Some(value) => value.parse::<i64>().map_err(|e| {
                IndexingError::config(format!("BULK_LIMIT must be an integer, got {}: {}", value, e))
            })?,
            None => DEFAULT_BATCH_LIMIT as i64,
        };

        let offset = get("FULL_INDEX_OFFSET")
            .map(|value| {
                value.parse::<u64>().map_err(|e| {
                    IndexingError::config(format!(
                        "FULL_INDEX_OFFSET must be a non-negative integer, got {}: {}",
                        value, e
                    ))
                })
            })
            .transpose()?;

        Ok(Self {
            config_dir: get("INDEXER_CONFIG_DIR").unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string()),
            config_file: get("INDEXER_CONFIG_FILE"),
            index_name,
            batch_limit: batch_limit.max(0) as usize,
            offset,
            dry_run: flag(get("DRY_RUN"), "DRY_RUN", false)?,
            update_watermark: flag(get("UPDATE_WATERMARK"), "UPDATE_WATERMARK", true)?,
            exclude_failed_documents: flag(
                get("EXCLUDE_FAILED_DOCUMENTS"),
                "EXCLUDE_FAILED_DOCUMENTS",
                false,
            )?,
            debug: flag(get("INDEXER_DEBUG"), "INDEXER_DEBUG", false)?,
        })
    }

    /// Pipeline options for this invocation.
    pub fn run_options(&self) -> RunOptions {
        RunOptions::new(self.index_name.clone())
            .with_batch_limit(self.batch_limit)
            .with_offset(self.offset)
            .with_dry_run(self.dry_run)
            .with_update_watermark(self.update_watermark)
            .with_exclude_failed_documents(self.exclude_failed_documents)
            .with_debug(self.debug)
    }
}

fn flag(value: Option<String>, key: &str, default: bool) -> Result<bool, IndexingError> {
    match value.map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("1" | "true" | "yes" | "on") => Ok(true),
        Some("0" | "false" | "no" | "off") => Ok(false),
        Some(other) => Err(IndexingError::config(format!(
            "{} must be a boolean, got {}",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<InvocationSettings, IndexingError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        InvocationSettings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[("INDEX_NAME", "products")]).unwrap();

        assert_eq!(settings.config_dir, ".");
        assert_eq!(settings.batch_limit, DEFAULT_BATCH_LIMIT);
        assert!(settings.update_watermark);
        assert!(!settings.dry_run);
        assert_eq!(settings.offset, None);
    }

    #[test]
    fn test_index_name_is_required() {
        assert!(matches!(
            settings(&[("BULK_LIMIT", "10")]),
            Err(IndexingError::ConfigError(_))
        ));
    }

    #[test]
    fn test_batch_limit_is_clamped_in_run_options() {
        let high = settings(&[("INDEX_NAME", "p"), ("BULK_LIMIT", "9000")]).unwrap();
        assert_eq!(high.run_options().batch_limit, 5000);

        let negative = settings(&[("INDEX_NAME", "p"), ("BULK_LIMIT", "-4")]).unwrap();
        assert_eq!(negative.run_options().batch_limit, 1);

        assert!(settings(&[("INDEX_NAME", "p"), ("BULK_LIMIT", "many")]).is_err());
    }

    #[test]
    fn test_flags_and_offset() {
        let settings = settings(&[
            ("INDEX_NAME", "products"),
            ("DRY_RUN", "yes"),
            ("UPDATE_WATERMARK", "0"),
            ("INDEXER_DEBUG", "TRUE"),
            ("FULL_INDEX_OFFSET", "2500"),
        ])
        .unwrap();

        let options = settings.run_options();
        assert!(options.dry_run);
        assert!(!options.update_watermark);
        assert!(options.debug);
        assert_eq!(options.offset, Some(2500));
    }

    #[test]
    fn test_invalid_flag_is_rejected() {
        assert!(settings(&[("INDEX_NAME", "p"), ("DRY_RUN", "perhaps")]).is_err());
        assert!(settings(&[("INDEX_NAME", "p"), ("FULL_INDEX_OFFSET", "-1")]).is_err());
    }
}
