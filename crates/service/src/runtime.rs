//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` to keep binary crates importing
//! `service::runtime::ensure_env` without depending directly on `common`.

use std::path::Path;

/// Ensure the directory holding `data_file` exists.
pub async fn ensure_env(data_file: &Path) -> anyhow::Result<()> {
    common::env::ensure_data_dir(data_file).await
}
