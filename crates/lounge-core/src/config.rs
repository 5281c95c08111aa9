//! Engine configuration

use serde::{Deserialize, Serialize};

use crate::registry::RegistryBuilder;

/// Tunables for save and fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoungeConfig {
    /// Maximum documents per store write batch (default: 64)
    pub write_batch_size: usize,
    /// Default eager population depth; `None` follows references until the
    /// graph is exhausted (default: `None`)
    pub populate_depth: Option<usize>,
    /// Separator between model name and id in default keys (default: "::")
    pub key_delimiter: String,
}

impl Default for LoungeConfig {
    fn default() -> Self {
        Self {
            write_batch_size: 64,
            populate_depth: None,
            key_delimiter: "::".to_string(),
        }
    }
}

impl LoungeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch size is clamped to at least one document.
    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size.max(1);
        self
    }

    pub fn with_populate_depth(mut self, depth: Option<usize>) -> Self {
        self.populate_depth = depth;
        self
    }

    pub fn with_key_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.key_delimiter = delimiter.into();
        self
    }

    /// Registry builder using this configuration's key delimiter.
    pub fn registry_builder(&self) -> RegistryBuilder {
        RegistryBuilder::new().key_delimiter(self.key_delimiter.clone())
    }

    /// Create from environment variables
    ///
    /// Reads (all optional):
    /// - LOUNGE_WRITE_BATCH_SIZE (default: 64)
    /// - LOUNGE_POPULATE_DEPTH (default: unbounded; "unbounded" or a number)
    /// - LOUNGE_KEY_DELIMITER (default: "::")
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> std::result::Result<Self, String> {
        let mut config = Self::default();

        if let Some(size) = lookup("LOUNGE_WRITE_BATCH_SIZE") {
            let size = size
                .trim()
                .parse::<usize>()
                .map_err(|e| format!("LOUNGE_WRITE_BATCH_SIZE: {e}"))?;
            config = config.with_write_batch_size(size);
        }

        if let Some(depth) = lookup("LOUNGE_POPULATE_DEPTH") {
            let depth = depth.trim();
            config.populate_depth = if depth.is_empty() || depth.eq_ignore_ascii_case("unbounded")
            {
                None
            } else {
                Some(
                    depth
                        .parse::<usize>()
                        .map_err(|e| format!("LOUNGE_POPULATE_DEPTH: {e}"))?,
                )
            };
        }

        if let Some(delimiter) = lookup("LOUNGE_KEY_DELIMITER") {
            config.key_delimiter = delimiter;
        }

        Ok(config)
    }
}
