use std::path::Path;

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::discover::{discover_assets, Asset};
use crate::extract::{extract, ExtractError};
use crate::fetch::{Fetcher, ACCEPT_HTML, ACCEPT_JSON};
use crate::output::{ensure_output_dir, OutputError};
use crate::sourcemap::{decode_inline_sourcemap, find_sourcemap_reference, resolve_sourcemap_url};
use crate::storage::{AssetStorage, StorageError};

/// Subdirectory of the output directory that page scans extract into.
pub const EXTRACT_DIR: &str = "extract";

#[derive(thiserror::Error, Debug)]
pub enum CLIError {
    #[error(transparent)]
    Fetch(#[from] crate::FetchError),
    #[error("invalid url: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    Output(#[from] OutputError),
    #[error("{0}")]
    Other(String),
}

/// Outcome of one command run. Failures are kept per URL so the binary can
/// decide its exit code.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Source maps that were retrieved.
    pub maps: usize,
    /// Source maps whose entries were written (possibly partially).
    pub extracted: usize,
    /// Entries that could not be written, across all maps.
    pub entry_failures: usize,
    pub failures: Vec<(String, CLIError)>,
    pub cancelled: bool,
}

impl RunReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.entry_failures == 0
    }

    fn fail(&mut self, url: impl Into<String>, err: impl Into<CLIError>) {
        let url = url.into();
        let err = err.into();
        error!("{url}: {err}");
        self.failures.push((url, err));
    }

    async fn extract_into(
        &mut self,
        document: &str,
        map_url: &str,
        output: &Path,
        create_top_directory: bool,
        cancel: &CancellationToken,
    ) {
        match extract(document, map_url, output, create_top_directory, cancel).await {
            Ok(summary) => {
                info!(
                    "Extracted {} of {} files into {}",
                    summary.written.len(),
                    summary.written.len() + summary.failed.len() + summary.skipped,
                    summary.base_dir.display()
                );
                self.extracted += 1;
                self.entry_failures += summary.failed.len();
                self.cancelled |= summary.cancelled;
            }
            Err(e) => self.fail(map_url, e),
        }
    }
}

/// Fetch each source map URL in turn and extract it into `output`.
pub async fn run_extract<F>(
    fetcher: &F,
    urls: &[String],
    output: &Path,
    create_top_directory: bool,
    cancel: &CancellationToken,
) -> RunReport
where
    F: Fetcher + ?Sized,
{
    let mut report = RunReport::default();

    for url in urls {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }
        info!("Processing url: {url}");

        let document = match fetcher.fetch(url, ACCEPT_JSON).await {
            Ok(doc) => doc,
            Err(e) => {
                report.fail(url.as_str(), e);
                continue;
            }
        };
        report.maps += 1;
        report.extract_into(&document, url, output, create_top_directory, cancel).await;
    }

    report.cancelled |= cancel.is_cancelled();
    report
}

/// Scan an HTML page for linked scripts and stylesheets, download them and
/// their source maps into storage and, when `extract_maps` is set, extract
/// every map into `<output>/extract`.
pub async fn run_all<F, S>(
    fetcher: &F,
    store: &S,
    page_url: &str,
    output: &Path,
    extract_maps: bool,
    create_top_directory: bool,
    cancel: &CancellationToken,
) -> RunReport
where
    F: Fetcher + ?Sized,
    S: AssetStorage + ?Sized,
{
    let mut report = RunReport::default();

    if let Err(e) = ensure_output_dir(output).await {
        report.fail(output.display().to_string(), e);
        return report;
    }

    let page = match Url::parse(page_url) {
        Ok(u) => u,
        Err(e) => {
            report.fail(page_url, e);
            return report;
        }
    };

    let html = match fetcher.fetch(page.as_str(), ACCEPT_HTML).await {
        Ok(html) => html,
        Err(e) => {
            report.fail(page.as_str(), e);
            return report;
        }
    };
    if let Err(e) = store.save(&page, &html).await {
        report.fail(page.as_str(), e);
    }

    let assets = discover_assets(&html, &page);
    info!("Found {} linked scripts and stylesheets", assets.len());
    let extract_dir = output.join(EXTRACT_DIR);

    for asset in assets {
        if cancel.is_cancelled() {
            report.cancelled = true;
            break;
        }

        let (map_url, document) = match fetch_asset_map(fetcher, store, &asset).await {
            Ok(Some(found)) => found,
            Ok(None) => continue,
            Err(e) => {
                report.fail(asset.url.as_str(), e);
                continue;
            }
        };
        report.maps += 1;

        if extract_maps {
            info!("Extracting source map: {map_url}");
            report
                .extract_into(&document, &map_url, &extract_dir, create_top_directory, cancel)
                .await;
        }
    }

    report.cancelled |= cancel.is_cancelled();
    report
}

/// Download one asset and the map it references. `Ok(None)` means the asset
/// carries no sourcemap reference.
async fn fetch_asset_map<F, S>(fetcher: &F, store: &S, asset: &Asset) -> Result<Option<(String, String)>, CLIError>
where
    F: Fetcher + ?Sized,
    S: AssetStorage + ?Sized,
{
    let accept = asset.kind.accept();
    let content = fetcher.fetch(asset.url.as_str(), accept).await?;
    store.save(&asset.url, &content).await?;

    let Some(reference) = find_sourcemap_reference(&content, asset.kind) else {
        warn!("Failed to find sourcemap url in {}", asset.url);
        return Ok(None);
    };

    if let Some(inline) = decode_inline_sourcemap(&reference) {
        let map_url = inline_map_url(&asset.url);
        store.save(&map_url, &inline).await?;
        return Ok(Some((map_url.to_string(), inline)));
    }
    if reference.starts_with("data:") {
        return Err(CLIError::Other(format!("undecodable inline sourcemap in {}", asset.url)));
    }

    let map_url = resolve_sourcemap_url(&asset.url, &reference)?;
    let document = fetcher.fetch(map_url.as_str(), accept).await?;
    store.save(&map_url, &document).await?;
    Ok(Some((map_url.to_string(), document)))
}

/// Storage name for a map embedded in `asset_url`: the asset path with `.map`
/// appended, query and fragment dropped.
pub fn inline_map_url(asset_url: &Url) -> Url {
    let mut map_url = asset_url.clone();
    map_url.set_query(None);
    map_url.set_fragment(None);
    let path = format!("{}.map", map_url.path());
    map_url.set_path(&path);
    map_url
}
