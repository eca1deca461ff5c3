use compass_core::{PersistenceConfig, ProgressManager, ProgressManagerBuilder};
use tempfile::TempDir;

/// Helper function to create a manager persisting into a temp directory
pub async fn create_test_manager() -> (TempDir, ProgressManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ProgressManagerBuilder::new()
        .with_persistence_root(temp_dir.path())
        .build()
        .await
        .expect("Failed to create manager");
    (temp_dir, manager)
}

/// Helper for tests that need control over the debounce window
pub async fn create_test_manager_with_delay(delay_ms: u64) -> (TempDir, ProgressManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let manager = ProgressManagerBuilder::new()
        .with_persistence_root(temp_dir.path())
        .with_persistence_config(PersistenceConfig {
            auto_save_delay_ms: delay_ms,
            ..PersistenceConfig::default()
        })
        .build()
        .await
        .expect("Failed to create manager");
    (temp_dir, manager)
}
