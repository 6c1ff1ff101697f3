use serde::{Deserialize, Deserializer};
use thiserror::Error;

/// The only source map revision this tool has been exercised against.
pub const SUPPORTED_VERSION: i64 = 3;

#[derive(Error, Debug)]
pub enum SourcemapError {
    #[error("invalid JSON or sourcemap: {0}")]
    Parse(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("no sources found")]
    EmptySources,
    #[error("no source content found")]
    EmptySourcesContent,
}

/// The three fields of a source map that extraction needs. Everything else
/// in the document (`mappings`, `names`, `sourceRoot`, ...) is ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMapDocument {
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: i64,
    #[serde(default, deserialize_with = "nullable_sources")]
    pub sources: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sources_content: Vec<Option<String>>,
}

impl SourceMapDocument {
    pub fn is_untested_version(&self) -> bool {
        self.version != SUPPORTED_VERSION
    }

    /// Content for `sources[index]`, or `None` when the content list is
    /// shorter than the source list or holds `null` at that position.
    pub fn content_at(&self, index: usize) -> Option<&str> {
        self.sources_content.get(index).and_then(|c| c.as_deref())
    }

    pub fn lengths_match(&self) -> bool {
        self.sources.len() == self.sources_content.len()
    }
}

/// Parse a sourcemap JSON string into a `SourceMapDocument`.
pub fn parse_sourcemap(json: &str) -> Result<SourceMapDocument, SourcemapError> {
    Ok(serde_json::from_str(json)?)
}

/// Reject documents that have nothing to extract. A version other than 3 is
/// not a validation failure.
pub fn validate(doc: &SourceMapDocument) -> Result<(), ValidationError> {
    if doc.sources.is_empty() {
        return Err(ValidationError::EmptySources);
    }
    if doc.sources_content.is_empty() {
        return Err(ValidationError::EmptySourcesContent);
    }
    Ok(())
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// A `null` entry becomes an empty path, which the sanitizer turns into a
// per-entry failure instead of rejecting the whole document.
fn nullable_sources<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Option<String>>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect())
}
