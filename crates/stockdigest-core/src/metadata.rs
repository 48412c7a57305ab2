//! `cache_metadata.json`: a human-readable mirror of budget state and cache
//! bookkeeping. The warehouse stays the source of truth; the file is rewritten
//! after every budget mutation and cleanup.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use stockdigest_warehouse::Warehouse;

use crate::budget::SourceBudgetState;
use crate::error::CoreError;

pub const METADATA_FILE_NAME: &str = "cache_metadata.json";

/// Warehouse metadata key holding the cache creation timestamp.
pub const CACHE_CREATED_KEY: &str = "cache_created";
/// Warehouse metadata key holding the last cleanup timestamp.
pub const LAST_CLEANUP_KEY: &str = "last_cache_cleanup";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub cache_created: Option<String>,
    pub last_cache_cleanup: Option<String>,
    /// Budget state keyed by source name.
    #[serde(flatten)]
    pub sources: BTreeMap<String, SourceBudgetState>,
}

impl CacheMetadata {
    pub fn read(path: &Path) -> Result<Self, CoreError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

#[derive(Clone)]
pub struct MetadataMirror {
    warehouse: Warehouse,
    path: PathBuf,
}

impl MetadataMirror {
    pub fn new(warehouse: Warehouse) -> Self {
        let path = warehouse.config().cache_dir().join(METADATA_FILE_NAME);
        Self { warehouse, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current metadata as held by the warehouse.
    pub fn snapshot(&self) -> Result<CacheMetadata, CoreError> {
        let sources = self
            .warehouse
            .budget_rows()?
            .iter()
            .map(|row| (row.source.clone(), SourceBudgetState::from_row(row)))
            .collect();

        Ok(CacheMetadata {
            cache_created: self.warehouse.metadata_value(CACHE_CREATED_KEY)?,
            last_cache_cleanup: self.warehouse.metadata_value(LAST_CLEANUP_KEY)?,
            sources,
        })
    }

    /// Rewrite the mirror file; the previous file is replaced atomically.
    pub fn write(&self) -> Result<(), CoreError> {
        let metadata = self.snapshot()?;
        let json = serde_json::to_string_pretty(&metadata)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)?;
        fs::rename(&staging, &self.path)?;
        Ok(())
    }

    /// [`write`](Self::write), logging instead of failing.
    pub fn refresh(&self) {
        if let Err(error) = self.write() {
            tracing::warn!(path = %self.path.display(), error = %error, "failed to write cache metadata");
        }
    }
}
