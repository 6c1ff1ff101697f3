pub mod cli_ops;
pub mod discover;
pub mod extract;
pub mod fetch;
pub mod output;
pub mod path_reconstruct;
pub mod sm_parse;
pub mod sourcemap;
pub mod storage;

pub use cli_ops::{inline_map_url, run_all, run_extract, CLIError, RunReport};
pub use discover::{discover_asset_urls, discover_assets, Asset, AssetKind};
pub use extract::{extract, extract_for_platform, EntryError, ExtractError, ExtractSummary};
pub use fetch::{parse_header, FetchError, FetchOptions, Fetcher, HttpFetcher};
pub use output::{ensure_output_dir, OutputError};
pub use path_reconstruct::{destination_path, reconstruct_paths, sanitize, top_directory_name, Platform};
pub use sm_parse::{parse_sourcemap, validate, SourceMapDocument, SourcemapError, ValidationError};
pub use sourcemap::{decode_inline_sourcemap, find_sourcemap_reference, resolve_sourcemap_url};
pub use storage::{AssetStorage, DiskStorage, MemoryStorage, StorageError};
