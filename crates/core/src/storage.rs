use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use tokio::sync::RwLock;
use url::Url;

static INVALID_FILE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(\.+$)|([<>:"/\\|?*\x00-\x1f]+)"#).unwrap());

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("failed to create {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Keeps a copy of every page, asset and map fetched while scanning a page.
#[async_trait::async_trait]
pub trait AssetStorage: Send + Sync {
    /// Store `content` under a name derived from `url` and return that name.
    async fn save(&self, url: &Url, content: &str) -> Result<String, StorageError>;
    async fn get(&self, url: &Url) -> Option<String>;
}

/// Flat file name for a fetched URL: its last path segment, `index.html` for
/// directory URLs, invalid characters replaced with `_`, and `.html` appended
/// when there is no extension.
pub fn file_name_for_url(url: &Url) -> String {
    let last = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");
    let name = if last.trim().is_empty() { "index.html" } else { last };

    let mut name = INVALID_FILE_NAME_RE.replace_all(name, "_").into_owned();
    let has_extension = name
        .rfind('.')
        .is_some_and(|idx| idx + 1 < name.len());
    if !has_extension {
        name.push_str(".html");
    }
    name
}

/// Writes every document into one output directory.
pub struct DiskStorage {
    dir: PathBuf,
}

impl DiskStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, url: &Url) -> PathBuf {
        self.dir.join(file_name_for_url(url))
    }
}

#[async_trait::async_trait]
impl AssetStorage for DiskStorage {
    async fn save(&self, url: &Url, content: &str) -> Result<String, StorageError> {
        let path = self.path_for(url);
        info!("Creating {}.", path.display());
        if let Err(source) = tokio::fs::write(&path, content).await {
            error!("Failed to create {}: {}", path.display(), source);
            return Err(StorageError::Io { path, source });
        }
        Ok(path.display().to_string())
    }

    async fn get(&self, url: &Url) -> Option<String> {
        tokio::fs::read_to_string(self.path_for(url)).await.ok()
    }
}

/// In-memory storage – useful for testing.
#[derive(Default)]
pub struct MemoryStorage {
    inner: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs of every stored document, sorted.
    pub async fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.inner.read().await.keys().cloned().collect();
        urls.sort();
        urls
    }
}

#[async_trait::async_trait]
impl AssetStorage for MemoryStorage {
    async fn save(&self, url: &Url, content: &str) -> Result<String, StorageError> {
        self.inner
            .write()
            .await
            .insert(url.as_str().to_owned(), content.to_owned());
        Ok(file_name_for_url(url))
    }

    async fn get(&self, url: &Url) -> Option<String> {
        self.inner.read().await.get(url.as_str()).cloned()
    }
}
