use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use sourcemapper_core::{parse_header, run_all, run_extract, DiskStorage, FetchOptions, HttpFetcher, RunReport};
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Parser)]
#[command(name = "sourcemapper", version, about = "Extract original sources from JavaScript and CSS source maps")]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract source maps from the given URLs
    Extract {
        /// URL of a source map file. Can be given multiple times
        #[arg(long = "map-url", value_name = "URL", required = true)]
        map_urls: Vec<String>,

        #[command(flatten)]
        shared: SharedArgs,
    },
    /// Download a page with its linked scripts, stylesheets and their source maps
    All {
        /// URL of the web page
        #[arg(short, long, value_name = "PAGE_URL")]
        url: String,

        /// Extract the source maps into <OUTPUT>/extract
        #[arg(short, long)]
        extract: bool,

        #[command(flatten)]
        shared: SharedArgs,
    },
}

#[derive(Args)]
struct SharedArgs {
    /// Directory the files are written to
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Accept invalid TLS certificates
    #[arg(long)]
    ignore_certificate_errors: bool,

    /// Proxy URL used for every request
    #[arg(long, value_name = "URL")]
    proxy: Option<String>,

    /// Extra request header. Can be given multiple times
    #[arg(long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// Extract each source map into a directory named after its file
    #[arg(long)]
    create_top_directory: bool,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS", default_value_t = 30)]
    timeout: u64,

    /// Retries for network errors and 5xx responses
    #[arg(long, default_value_t = 2)]
    retries: u32,
}

impl SharedArgs {
    fn fetch_options(&self) -> Result<FetchOptions, String> {
        let proxy = match &self.proxy {
            Some(raw) => Some(Url::parse(raw).map_err(|_| "Failed to parse proxy URL.".to_string())?),
            None => None,
        };
        let headers = self
            .headers
            .iter()
            .map(|h| parse_header(h))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| e.to_string())?;

        Ok(FetchOptions {
            headers,
            proxy,
            insecure: self.ignore_certificate_errors,
            timeout: Duration::from_secs(self.timeout),
            retries: self.retries,
        })
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_target(false)
        .format_timestamp(None)
        .init();
}

fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Canceling...");
            cancel.cancel();
        }
    });
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!("sourcemapper {}", env!("CARGO_PKG_VERSION"));
    println!("Start with --help to see all available configuration options.");
    println!();

    let shared = match &cli.command {
        Command::Extract { shared, .. } | Command::All { shared, .. } => shared,
    };
    let options = match shared.fetch_options() {
        Ok(o) => o,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    let fetcher = match HttpFetcher::new(&options) {
        Ok(f) => f,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let report = match &cli.command {
        Command::Extract { map_urls, shared } => {
            run_extract(&fetcher, map_urls, &shared.output, shared.create_top_directory, &cancel).await
        }
        Command::All { url, extract, shared } => {
            let store = DiskStorage::new(shared.output.clone());
            run_all(&fetcher, &store, url, &shared.output, *extract, shared.create_top_directory, &cancel).await
        }
    };

    exit_code(&report)
}

fn exit_code(report: &RunReport) -> ExitCode {
    if report.cancelled {
        return ExitCode::from(130);
    }
    info!("Done");
    if report.is_clean() {
        ExitCode::SUCCESS
    } else {
        warn!(
            "{} of the requested items failed, {} files could not be written",
            report.failures.len(),
            report.entry_failures
        );
        ExitCode::FAILURE
    }
}
