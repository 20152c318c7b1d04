use std::fs::create_dir_all;
use std::fs::File;
use std::fs::OpenOptions;
use std::path::Path;

use serde::de::DeserializeOwned;
use tracing::debug;
use tracing::error;

use crate::Result;

/// Creates the parent directory of `path` when it does not exist yet.
pub fn create_parent_dir_if_not_exist(path: &Path) -> Result<()> {
    if let Some(parent_dir) = path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            if let Err(e) = create_dir_all(parent_dir) {
                error!("Failed to create directory {:?}: {:?}", parent_dir, e);
                return Err(e.into());
            }
            debug!("created directory: {:?}", parent_dir);
        }
    }
    Ok(())
}

pub fn open_file_for_append(path: &Path) -> Result<File> {
    create_parent_dir_if_not_exist(path)?;
    let file = OpenOptions::new().append(true).create(true).open(path)?;
    Ok(file)
}

/// Reads a whole JSON document from `path`.
pub async fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = tokio::fs::read(path).await?;
    let value = serde_json::from_slice(&bytes)?;
    Ok(value)
}
