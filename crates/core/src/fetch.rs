use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::{Client, Proxy, Url};
use thiserror::Error;

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";

pub const ACCEPT_JSON: &str = "application/json";
pub const ACCEPT_HTML: &str = "text/html";
pub const ACCEPT_JAVASCRIPT: &str = "application/javascript";
pub const ACCEPT_CSS: &str = "text/css";

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    UrlParse(#[from] url::ParseError),
    #[error("unsupported url scheme: {0}")]
    UnsupportedScheme(String),
    #[error("invalid header {0:?}, expected NAME: VALUE")]
    InvalidHeader(String),
    #[error("invalid proxy {0}")]
    InvalidProxy(String),
    #[error("HTTP status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Network(#[from] reqwest::Error),
}

impl FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::HttpStatus(code) => *code >= 500,
            FetchError::Network(_) => true,
            _ => false,
        }
    }
}

/// Retrieves the body of a URL as text. `accept` is the media type the caller
/// expects back.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, accept: &str) -> Result<String, FetchError>;
}

/// Request settings shared by every fetch of a run.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub headers: Vec<(String, String)>,
    pub proxy: Option<Url>,
    /// Accept invalid TLS certificates.
    pub insecure: bool,
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            proxy: None,
            insecure: false,
            timeout: Duration::from_secs(30),
            retries: 2,
        }
    }
}

/// Split a `NAME: VALUE` header argument on its first colon.
pub fn parse_header(raw: &str) -> Result<(String, String), FetchError> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| FetchError::InvalidHeader(raw.to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(FetchError::InvalidHeader(raw.to_string()));
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// `Fetcher` backed by a reqwest client.
pub struct HttpFetcher {
    client: Client,
    retries: u32,
}

impl HttpFetcher {
    pub fn new(options: &FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &options.headers {
            let invalid = || FetchError::InvalidHeader(format!("{name}: {value}"));
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
            let value = HeaderValue::from_str(value).map_err(|_| invalid())?;
            headers.append(name, value);
        }

        let mut builder = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(reqwest::redirect::Policy::limited(10))
            .danger_accept_invalid_certs(options.insecure);

        if let Some(proxy) = &options.proxy {
            let proxy = Proxy::all(proxy.as_str()).map_err(|_| FetchError::InvalidProxy(proxy.to_string()))?;
            builder = builder.proxy(proxy);
        }

        Ok(Self {
            client: builder.build()?,
            retries: options.retries,
        })
    }

    async fn fetch_once(&self, url: Url, accept: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).header(ACCEPT, accept).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }
        Ok(response.text().await?)
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, accept: &str) -> Result<String, FetchError> {
        let url = Url::parse(url)?;
        match url.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let mut attempt = 0;
        loop {
            match self.fetch_once(url.clone(), accept).await {
                Ok(body) => {
                    debug!("Fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    warn!("Retry {attempt} for {url}: {e}");
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
