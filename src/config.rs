//! Subsystem settings
//!
//! Settings are validated once at backend init; invalid settings are fatal to
//! subsystem startup, never to individual operations.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest writer heap the engine will accept
const MIN_WRITER_HEAP_BYTES: usize = 15_000_000;

const DEFAULT_WRITER_HEAP_BYTES: usize = 50_000_000;

/// Configuration for the search subsystem
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Message headers that are indexed under their own name; all other
    /// headers are dropped from header build keys
    pub indexed_headers: Vec<String>,
    /// Heap given to the engine's index writer, in bytes
    pub writer_heap_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            indexed_headers: ["From", "To", "Cc", "Bcc", "Subject"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            writer_heap_bytes: DEFAULT_WRITER_HEAP_BYTES,
        }
    }
}

impl Settings {
    /// Check the settings for use; called at backend init.
    pub fn validate(&self) -> Result<()> {
        if self.indexed_headers.is_empty() {
            return Err(Error::Config("no indexed headers configured".to_string()));
        }
        if self.writer_heap_bytes < MIN_WRITER_HEAP_BYTES {
            return Err(Error::Config(format!(
                "writer heap {} below minimum {}",
                self.writer_heap_bytes, MIN_WRITER_HEAP_BYTES
            )));
        }
        Ok(())
    }

    /// Is this header indexed under its own name?
    pub fn want_indexed(&self, header: &str) -> bool {
        self.indexed_headers
            .iter()
            .any(|h| h.eq_ignore_ascii_case(header))
    }
}
