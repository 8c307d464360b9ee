use chrono::{DateTime, FixedOffset};

pub mod browser;
pub mod company;
pub mod config;
pub mod crawl;
pub mod export;
pub mod pagination;
pub mod persistent;
pub mod session;
pub mod sites;

mod data;
mod error;
mod utils;

pub use crawl::{run_crawler, should_skip, CrawlConfig, CrawlSummary};
pub use data::Table;
pub use error::CrawlerError;
pub use persistent::{CompanySiteRecord, ExportRow, Persistent};
pub use utils::{calendar_days_between, get_now};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub site: String,
    pub company_id: String,
    pub title: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResultsInfo {
    pub total_results: usize,
    pub pages: usize,
    pub results: Vec<SearchResult>,
}

/// Durable record of which company was searched on which site, and of what
/// was found. Callers `lookup` before `record_search`; the store refuses a
/// second record for the same pair instead of overwriting it.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn lookup(
        &self,
        company_id: &str,
        site: &str,
    ) -> Result<Option<CompanySiteRecord>, CrawlerError>;

    async fn record_search(
        &self,
        company_name: &str,
        company_id: &str,
        site: &str,
        search_phrase: &str,
    ) -> Result<(), CrawlerError>;

    async fn touch_searched(
        &self,
        company_id: &str,
        site: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<(), CrawlerError>;

    async fn append_result(
        &self,
        company_id: &str,
        site: &str,
        url: &str,
        title: &str,
        timestamp: DateTime<FixedOffset>,
    ) -> Result<(), CrawlerError>;

    async fn export_results(&self) -> Result<Vec<ExportRow>, CrawlerError>;
}
