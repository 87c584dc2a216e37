use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

/// Boots the engine against a base directory, with the two knobs the
/// storage layer exposes: how many rows live in a chunk before a new one
/// is started, and how many inserts accumulate before a table's metadata
/// sidecar gets flushed eagerly rather than lazily (§4.1/§4.4.1).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    pub base_dir: Utf8PathBuf,
    pub chunk_size: usize,
    pub metadata_flush_interval: usize,
}

impl EngineConfig {
    pub fn new(base_dir: Utf8PathBuf) -> Self {
        Self {
            base_dir,
            chunk_size: 50_000,
            metadata_flush_interval: 1_000,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(common::default_data_dir())
    }
}
