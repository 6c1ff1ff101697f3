use std::path::{Path, PathBuf};

use chrono::Local;
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::fs;
use tokio_util::sync::CancellationToken;

use crate::output::{ensure_output_dir, OutputError};
use crate::path_reconstruct::{fallback_directory_name, reconstruct_paths, top_directory_name, Platform};
use crate::sm_parse::{parse_sourcemap, validate, SourceMapDocument, SourcemapError, ValidationError};

/// Reasons a whole document is skipped. None of these are fatal to a run.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error(transparent)]
    Parse(#[from] SourcemapError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    OutputDir(#[from] OutputError),
}

#[derive(Error, Debug)]
pub enum EntryError {
    #[error("source path {0:?} does not name a file")]
    NoPath(String),
    #[error("error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to the entries of one source map.
#[derive(Debug, Default)]
pub struct ExtractSummary {
    pub base_dir: PathBuf,
    pub written: Vec<PathBuf>,
    pub failed: Vec<EntryError>,
    /// Entries without a matching `sourcesContent` value.
    pub skipped: usize,
    pub cancelled: bool,
}

/// Parse a source map document and write every embedded source below
/// `output_dir`, using the filename rules of the running platform.
pub async fn extract(
    document: &str,
    source_url: &str,
    output_dir: &Path,
    create_top_directory: bool,
    cancel: &CancellationToken,
) -> Result<ExtractSummary, ExtractError> {
    extract_for_platform(document, source_url, output_dir, create_top_directory, Platform::current(), cancel).await
}

pub async fn extract_for_platform(
    document: &str,
    source_url: &str,
    output_dir: &Path,
    create_top_directory: bool,
    platform: Platform,
    cancel: &CancellationToken,
) -> Result<ExtractSummary, ExtractError> {
    let doc = parse_sourcemap(document).map_err(|e| {
        error!("Failed to retrieve sourcemap from {source_url}: {e}");
        e
    })?;

    info!(
        "Retrieved sourcemap with version {}, containing {} entries.",
        doc.version,
        doc.sources.len()
    );

    if let Err(reason) = validate(&doc) {
        warn!("{}.", capitalize(&reason.to_string()));
        return Err(reason.into());
    }

    if doc.is_untested_version() {
        warn!("[!] Sourcemap is not version 3. This is untested!");
    }
    if !doc.lengths_match() {
        warn!(
            "Sourcemap lists {} sources but {} contents; sources without content are skipped.",
            doc.sources.len(),
            doc.sources_content.len()
        );
    }

    ensure_output_dir(output_dir).await.map_err(|e| {
        error!("Failed to create directory: {e}");
        e
    })?;

    let base_dir = if create_top_directory {
        let name = top_directory_name(source_url, platform).unwrap_or_else(|| {
            let name = fallback_directory_name(Local::now());
            warn!("Failed to parse filename from URL, creating temporary directory {name}.");
            name
        });
        let dir = output_dir.join(name);
        ensure_output_dir(&dir).await.map_err(|e| {
            error!("Failed to create directory: {e}");
            e
        })?;
        dir
    } else {
        output_dir.to_path_buf()
    };

    Ok(write_entries(&doc, base_dir, platform, cancel).await)
}

async fn write_entries(
    doc: &SourceMapDocument,
    base_dir: PathBuf,
    platform: Platform,
    cancel: &CancellationToken,
) -> ExtractSummary {
    let mut summary = ExtractSummary {
        base_dir,
        ..Default::default()
    };

    let destinations = reconstruct_paths(&summary.base_dir, doc, platform);
    for (idx, (raw, dest)) in doc.sources.iter().zip(destinations).enumerate() {
        if cancel.is_cancelled() {
            summary.cancelled = true;
            break;
        }

        let Some(content) = doc.content_at(idx) else {
            warn!("No source content for {raw}, skipping.");
            summary.skipped += 1;
            continue;
        };

        let Some(dest) = dest else {
            let err = EntryError::NoPath(raw.clone());
            error!("{err}");
            summary.failed.push(err);
            continue;
        };

        debug!("{raw} -> {}", dest.display());
        match write_file(&dest, content).await {
            Ok(()) => summary.written.push(dest),
            Err(source) => {
                let err = EntryError::Io { path: dest, source };
                error!("{err}");
                summary.failed.push(err);
            }
        }
    }

    summary
}

async fn write_file(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    info!("Creating {}.", path.display());
    fs::write(path, content).await
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
