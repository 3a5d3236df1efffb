//! NDJSON bulk payload with a byte ceiling.

use std::fmt;

use serde_json::Value;

use crate::errors::PipelineError;

/// Largest payload the bulk endpoint accepts from the indexer (5 MiB).
pub const MAX_BULK_BYTES: usize = 5 * 1024 * 1024;

/// Action/document line pairs ready for `/_bulk`.
#[derive(Debug, Clone)]
pub struct BulkBatch {
    payload: Vec<u8>,
    documents: usize,
    max_bytes: usize,
}

impl Default for BulkBatch {
    fn default() -> Self {
        Self::new()
    }
}

impl BulkBatch {
    pub fn new() -> Self {
        Self::with_max_bytes(MAX_BULK_BYTES)
    }

    pub fn with_max_bytes(max_bytes: usize) -> Self {
        Self {
            payload: Vec::new(),
            documents: 0,
            max_bytes,
        }
    }

    /// Append one action line and its document line.
    ///
    /// Returns `Ok(false)` and leaves the batch untouched when the pair,
    /// newlines included, would push the payload over the ceiling.
    pub fn try_push(&mut self, action: &Value, document: &Value) -> Result<bool, PipelineError> {
        let action = serde_json::to_vec(action)
            .map_err(|e| PipelineError::mapping(format!("cannot encode action line: {}", e)))?;
        let document = serde_json::to_vec(document)
            .map_err(|e| PipelineError::mapping(format!("cannot encode document: {}", e)))?;

        let needed = action.len() + document.len() + 2;
        if self.payload.len() + needed > self.max_bytes {
            return Ok(false);
        }

        self.payload.reserve(needed);
        self.payload.extend_from_slice(&action);
        self.payload.push(b'\n');
        self.payload.extend_from_slice(&document);
        self.payload.push(b'\n');
        self.documents += 1;
        Ok(true)
    }

    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents == 0
    }

    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.payload
    }
}

impl fmt::Display for BulkBatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.payload))
    }
}
