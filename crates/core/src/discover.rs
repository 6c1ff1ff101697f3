use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static SCRIPT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("script[src]").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("link[rel][href]").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Script,
    Stylesheet,
}

impl AssetKind {
    /// Media type sent in the `Accept` header when fetching the asset and its map.
    pub fn accept(self) -> &'static str {
        match self {
            AssetKind::Script => crate::fetch::ACCEPT_JAVASCRIPT,
            AssetKind::Stylesheet => crate::fetch::ACCEPT_CSS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub url: Url,
    pub kind: AssetKind,
}

/// List the scripts (`<script src>`) and then the stylesheets
/// (`<link rel="stylesheet" href>`) linked from an HTML page, resolved
/// against `base`. Links that cannot be resolved are dropped.
pub fn discover_assets(html: &str, base: &Url) -> Vec<Asset> {
    let document = Html::parse_document(html);
    let mut assets = Vec::new();

    for element in document.select(&SCRIPT_SELECTOR) {
        if let Some(src) = element.value().attr("src") {
            if let Ok(url) = base.join(src.trim()) {
                assets.push(Asset { url, kind: AssetKind::Script });
            }
        }
    }

    for element in document.select(&LINK_SELECTOR) {
        let el = element.value();
        let is_stylesheet = el
            .attr("rel")
            .is_some_and(|rel| rel.split_ascii_whitespace().any(|t| t.eq_ignore_ascii_case("stylesheet")));
        if !is_stylesheet {
            continue;
        }
        if let Some(href) = el.attr("href") {
            if let Ok(url) = base.join(href.trim()) {
                assets.push(Asset { url, kind: AssetKind::Stylesheet });
            }
        }
    }

    assets
}

/// Asset URLs only, for callers that do not care about the kind.
pub fn discover_asset_urls(html: &str, base: &Url) -> Vec<Url> {
    discover_assets(html, base).into_iter().map(|a| a.url).collect()
}
