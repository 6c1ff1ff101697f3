use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Local};
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::sm_parse::SourceMapDocument;

static WINDOWS_ILLEGAL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"[?%*|:"<>]"#).unwrap());

/// Filename rules applied when sanitizing source paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Unix,
    /// Restricted character set: `? % * | : " < >` are replaced with `-`.
    Windows,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Unix
        }
    }
}

/// Rewrite an untrusted `sources` entry so it can be joined under an output
/// directory.
///
/// The entry is rooted with a leading `/`, every `/..` is removed outright and,
/// on Windows, characters that are illegal in file names become `-`. The result
/// is still untrusted text: pass it through [`destination_path`], which drops
/// whatever parent references survive.
pub fn sanitize(raw_path: &str, platform: Platform) -> String {
    let rooted = format!("/{raw_path}");
    let stripped = rooted.replace("/..", "");
    match platform {
        Platform::Windows => WINDOWS_ILLEGAL_RE.replace_all(&stripped, "-").into_owned(),
        Platform::Unix => stripped,
    }
}

/// Join a sanitized path onto `base`.
///
/// Both `/` and `\` separate segments. Only segments that form a single
/// ordinary path component are pushed: empty, `.`, `..`, roots and drive or
/// UNC prefixes are dropped, so the result is always `base` or below it.
/// Returns `None` when nothing is left to name a file.
pub fn destination_path(base: &Path, sanitized: &str) -> Option<PathBuf> {
    let mut dest = base.to_path_buf();
    let mut pushed = false;
    for segment in sanitized.split(['/', '\\']) {
        if is_plain_component(segment) {
            dest.push(segment);
            pushed = true;
        }
    }
    pushed.then_some(dest)
}

fn is_plain_component(segment: &str) -> bool {
    if segment.is_empty() || segment == "." || segment == ".." {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Compute the destination for every `sources` entry in order. Entries that
/// sanitize to nothing map to `None`.
pub fn reconstruct_paths(base_dir: &Path, doc: &SourceMapDocument, platform: Platform) -> Vec<Option<PathBuf>> {
    doc.sources
        .iter()
        .map(|src| destination_path(base_dir, &sanitize(src, platform)))
        .collect()
}

/// Directory name derived from the filename of a source map URL, without its
/// last extension: `https://example.com/static/app.js.map` gives `app.js`.
///
/// Returns `None` when the URL has no usable filename.
pub fn top_directory_name(url: &str, platform: Platform) -> Option<String> {
    let file_name = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or("")
            .to_string(),
        Err(_) => url.rsplit(['/', '\\']).next().unwrap_or("").to_string(),
    };

    let stem = match file_name.rfind('.') {
        Some(idx) => &file_name[..idx],
        None => file_name.as_str(),
    };

    let name = match platform {
        Platform::Windows => WINDOWS_ILLEGAL_RE.replace_all(stem, "-").into_owned(),
        Platform::Unix => stem.to_string(),
    };

    if name.trim().is_empty() || !is_plain_component(&name) || name.contains('\\') {
        return None;
    }
    Some(name)
}

/// Name used when a top directory cannot be derived from the URL.
pub fn fallback_directory_name(now: DateTime<Local>) -> String {
    format!("sourcemap_{}", now.format("%Y%m%d_%H%M%S"))
}
