use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Settings of a [`crate::FileObjectRepository`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the object fan-out directories.
    pub root: PathBuf,
    /// Upper bound of bytes accepted by one sink write, unbounded when `None`.
    pub max_write_chunk: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { root: PathBuf::from("lfs/objects"), max_write_chunk: None }
    }
}
