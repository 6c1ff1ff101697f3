use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

#[derive(Error, Debug)]
pub enum OutputError {
    #[error("output path exists but is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("failed to create directory {path}: {source}")]
    Create {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Ensure the given output directory exists. Creates missing parent directories as needed.
///
/// Creating a directory that already exists is not an error, so concurrent or
/// repeated runs over the same output tree are fine.
pub async fn ensure_output_dir<P: AsRef<Path>>(output_path: P) -> Result<(), OutputError> {
    let path = output_path.as_ref();
    match fs::metadata(path).await {
        Ok(meta) if meta.is_dir() => return Ok(()),
        Ok(_) => return Err(OutputError::NotADirectory(path.to_path_buf())),
        Err(_) => {}
    }
    fs::create_dir_all(path).await.map_err(|source| OutputError::Create {
        path: path.to_path_buf(),
        source,
    })
}
