//! Fetch collaborator used to populate new cache slots
//!
//! The cache core only needs a byte stream for a URL. `DefaultFetcher`
//! covers `http(s)://` through a ureq agent and `file://` for local
//! sources; anything else can be plugged in by implementing [`Fetch`].

use crate::config::schema::FetchConfig;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors reported by a fetch collaborator
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("server responded with HTTP status {status}")]
    Status { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unsupported URL scheme in {0}")]
    UnsupportedScheme(String),

    #[error("reading response body: {0}")]
    Io(#[from] std::io::Error),
}

impl From<ureq::Error> for FetchError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(status) => Self::Status { status },
            ureq::Error::Io(e) => Self::Io(e),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Byte stream producer for a URL
pub trait Fetch: Send + Sync {
    /// Open a stream over the content at `url`
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError>;
}

/// HTTP(S) transport backed by a shared ureq agent
pub struct HttpFetcher {
    agent: ureq::Agent,
    user_agent: String,
}

impl HttpFetcher {
    /// Create a fetcher from the `[fetch]` config section
    pub fn new(config: &FetchConfig) -> Self {
        let timeout = match config.timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        };
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(timeout)
            .build()
            .into();

        Self {
            agent,
            user_agent: config.user_agent.clone(),
        }
    }
}

impl Fetch for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        debug!("GET {}", url);
        let response = self
            .agent
            .get(url)
            .header("User-Agent", self.user_agent.as_str())
            .call()?;

        Ok(Box::new(response.into_body().into_reader()))
    }
}

/// Dispatches on URL scheme: HTTP(S) over the network, `file://` locally
pub struct DefaultFetcher {
    http: HttpFetcher,
}

impl DefaultFetcher {
    pub fn new(config: &FetchConfig) -> Self {
        Self {
            http: HttpFetcher::new(config),
        }
    }
}

impl Fetch for DefaultFetcher {
    fn fetch(&self, url: &str) -> Result<Box<dyn Read + Send>, FetchError> {
        if let Some(path) = local_path(url) {
            debug!("Opening local source {}", path.display());
            return Ok(Box::new(File::open(path)?));
        }

        if url.starts_with("http://") || url.starts_with("https://") {
            return self.http.fetch(url);
        }

        Err(FetchError::UnsupportedScheme(url.to_string()))
    }
}

/// Path named by a `file://` URL, if that is what `url` is
fn local_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("file://")?;
    // file://localhost/path is the long form of file:///path
    let rest = rest.strip_prefix("localhost").unwrap_or(rest);
    if rest.is_empty() {
        return None;
    }
    Some(PathBuf::from(rest))
}
