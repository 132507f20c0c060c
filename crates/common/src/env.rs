//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::warn;

/// Ensure the parent directory of `data_file` exists; warn when the file itself is missing.
pub async fn ensure_data_dir(data_file: &Path) -> anyhow::Result<()> {
    if let Some(dir) = data_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", dir.display()))?;
    }
    if tokio::fs::metadata(data_file).await.is_err() {
        warn!(data_file = %data_file.display(), "data file not found; starting from seed or empty");
    }
    Ok(())
}
