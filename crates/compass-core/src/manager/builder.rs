//! Builder for creating and configuring ProgressManager instances.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use super::ProgressManager;
use crate::error::{ProgressError, Result};
use crate::persistence::{PersistenceConfig, ProgressPersistence};
use crate::store::ProgressStore;

/// Builder for creating and configuring ProgressManager instances.
#[derive(Debug, Clone, Default)]
pub struct ProgressManagerBuilder {
    persistence_root: Option<PathBuf>,
    persistence_config: Option<PersistenceConfig>,
}

impl ProgressManagerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the project root under which snapshots are persisted.
    ///
    /// Without a root the manager runs purely in memory: no snapshots are
    /// written and restore operations return nothing.
    pub fn with_persistence_root<P: AsRef<Path>>(mut self, root: P) -> Self {
        self.persistence_root = Some(root.as_ref().to_path_buf());
        self
    }

    /// Overrides the persistence configuration (snapshot directory, auto-save
    /// behavior, debounce delay).
    pub fn with_persistence_config(mut self, config: PersistenceConfig) -> Self {
        self.persistence_config = Some(config);
        self
    }

    /// Builds the configured manager instance.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Configuration` if a persistence root was given
    /// but does not exist.
    pub async fn build(self) -> Result<ProgressManager> {
        let store = Arc::new(Mutex::new(ProgressStore::new()));

        let persistence = match self.persistence_root {
            Some(root) => {
                if !root.is_dir() {
                    return Err(ProgressError::configuration(format!(
                        "persistence root '{}' is not a directory",
                        root.display()
                    )));
                }
                let config = self.persistence_config.unwrap_or_default();
                let persistence = Arc::new(ProgressPersistence::new(root, config));
                persistence.enable_auto_save(&store).await;
                Some(persistence)
            }
            None => None,
        };

        Ok(ProgressManager::new(store, persistence))
    }
}
