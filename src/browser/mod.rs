mod http;
#[cfg(test)]
pub(crate) mod mock;

pub use http::HttpBrowser;

use scraper::{Html, Selector};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("No element matches {0}")]
    NotFound(String),

    #[error("Invalid selector {0}")]
    InvalidSelector(String),

    #[error("Unsupported interaction: {0}")]
    Unsupported(String),

    #[error("HTTP error")]
    Http(#[from] reqwest::Error),

    #[error("Cannot serialize session")]
    Snapshot(#[from] serde_json::Error),
}

/// Opaque browsing-context state (cookies and the like) that lets a later run
/// reuse an earlier login. Only the engine that produced it interprets it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionSnapshot(pub serde_json::Value);

#[async_trait::async_trait]
pub trait Page: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<(), PageError>;

    fn url(&self) -> Option<String>;

    async fn content(&self) -> Result<String, PageError>;

    async fn click(&mut self, selector: &str) -> Result<(), PageError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError>;

    /// Waits until `selector` matches, failing with [`PageError::Timeout`]
    /// once `timeout` has passed.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<(), PageError>;

    async fn snapshot(&self) -> Result<SessionSnapshot, PageError>;

    async fn exists(&self, selector: &str) -> Result<bool, PageError> {
        let html = self.content().await?;
        Ok(count_matches(&html, selector)? > 0)
    }
}

#[async_trait::async_trait]
pub trait Browser: Send + Sync {
    async fn new_page(&self, session: Option<SessionSnapshot>)
        -> Result<Box<dyn Page>, PageError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pacing {
    enabled: bool,
}

impl Pacing {
    pub const fn new() -> Pacing {
        Pacing { enabled: true }
    }

    pub const fn disabled() -> Pacing {
        Pacing { enabled: false }
    }

    pub async fn settle(&self, millis: u64) {
        if self.enabled {
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::new()
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, PageError> {
    Selector::parse(selector).map_err(|_| PageError::InvalidSelector(selector.to_string()))
}

pub(crate) fn count_matches(html: &str, selector: &str) -> Result<usize, PageError> {
    let selector = parse_selector(selector)?;
    Ok(Html::parse_document(html).select(&selector).count())
}

/// Resolves `href` against the page it was found on, like `anchor.href` does
/// in a browser.
pub(crate) fn resolve_href(base: Option<&str>, href: &str) -> String {
    let href = href.trim();
    base.and_then(|base| reqwest::Url::parse(base).ok())
        .and_then(|base| base.join(href).ok())
        .map(|url| url.to_string())
        .unwrap_or_else(|| href.to_string())
}
