use std::path::PathBuf;

use eyre::{Context, Result};
use futures::future::join_all;
use tokio::fs::create_dir_all;

/// `_<index>` for series swept over a secondary parameter, empty otherwise
pub fn index_suffix(index: Option<i64>) -> String {
    index.map(|i| format!("_{i}")).unwrap_or_default()
}

pub async fn ensure_dirs(dirs: &[PathBuf]) -> Result<()> {
    let create_jobs = dirs.iter().map(create_dir_all);
    for (res, dir) in join_all(create_jobs).await.into_iter().zip(dirs) {
        res.wrap_err_with(|| format!("Create {}", dir.display()))?;
    }
    Ok(())
}
