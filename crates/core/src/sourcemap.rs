use base64::{engine::general_purpose::STANDARD, Engine};
use url::Url;

use crate::discover::AssetKind;

const SCRIPT_MARKER: &str = "//# sourceMappingURL=";
const STYLE_MARKER: &str = "/*# sourceMappingURL=";

/// Extract the raw sourcemap reference from a fetched asset.
///
/// Scripts use `//# sourceMappingURL=` and the reference runs to the end of
/// that line. Stylesheets use `/*# sourceMappingURL=` and the reference runs
/// to the closing `*/`. When a file carries several markers the last one
/// wins, since bundlers append their annotation after any concatenated input.
pub fn find_sourcemap_reference(content: &str, kind: AssetKind) -> Option<String> {
    let marker = match kind {
        AssetKind::Script => SCRIPT_MARKER,
        AssetKind::Stylesheet => STYLE_MARKER,
    };
    let start = content.rfind(marker)? + marker.len();
    let rest = &content[start..];

    let reference = match kind {
        AssetKind::Script => rest.lines().next().unwrap_or(""),
        AssetKind::Stylesheet => rest.find("*/").map_or(rest, |end| &rest[..end]),
    }
    .trim();

    (!reference.is_empty()).then(|| reference.to_string())
}

/// Resolve a reference against the URL of the asset it was found in.
/// Absolute references are returned unchanged.
pub fn resolve_sourcemap_url(asset_url: &Url, reference: &str) -> Result<Url, url::ParseError> {
    asset_url.join(reference)
}

/// Decode an inline `data:` sourcemap reference.
///
/// Accepts `data:application/json;base64,<data>` with optional parameters
/// such as `charset=utf-8` before `;base64`.
pub fn decode_inline_sourcemap(reference: &str) -> Option<String> {
    let data = reference.strip_prefix("data:")?;
    let (_, payload) = data.split_once(";base64,")?;
    let decoded = STANDARD.decode(payload.trim()).ok()?;
    String::from_utf8(decoded).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_reference_stops_at_line_end() {
        let js = "console.log(1);\n//# sourceMappingURL=app.js.map\n";
        assert_eq!(find_sourcemap_reference(js, AssetKind::Script).as_deref(), Some("app.js.map"));
    }

    #[test]
    fn style_reference_stops_at_comment_end() {
        let css = "body{color:red}\n/*# sourceMappingURL=main.css.map */";
        assert_eq!(find_sourcemap_reference(css, AssetKind::Stylesheet).as_deref(), Some("main.css.map"));
    }

    #[test]
    fn last_marker_wins() {
        let js = "//# sourceMappingURL=vendor.js.map\nvendor();\n//# sourceMappingURL=app.js.map\n";
        assert_eq!(find_sourcemap_reference(js, AssetKind::Script).as_deref(), Some("app.js.map"));
    }

    #[test]
    fn marker_kind_must_match() {
        let css = "/*# sourceMappingURL=main.css.map */";
        assert_eq!(find_sourcemap_reference(css, AssetKind::Script), None);
        assert_eq!(find_sourcemap_reference("function test() {}", AssetKind::Script), None);
        assert_eq!(find_sourcemap_reference("//# sourceMappingURL=  \n", AssetKind::Script), None);
    }

    #[test]
    fn inline_reference_decoded() {
        // {"version":3}
        let data_url = "data:application/json;charset=utf-8;base64,eyJ2ZXJzaW9uIjozfQ==";
        assert_eq!(decode_inline_sourcemap(data_url).as_deref(), Some(r#"{"version":3}"#));
        assert_eq!(decode_inline_sourcemap("app.js.map"), None);
    }
}
