use crate::{
    browser::Pacing,
    crawl::CrawlConfig,
    sites::{Credentials, SiteCredentials, SiteDefinition},
};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tracing::warn;
use tracing_error::ErrorLayer;
use tracing_subscriber::prelude::*;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

const DEFAULT_LOG_FILTER: &str =
    "info,html5ever=error,selectors=error,hyper=warn,reqwest=info,sqlx=warn";

/// Logs to stdout, filtered by `LOG_LEVEL`.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_env("LOG_LEVEL")
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(ErrorLayer::default())
        .init();
}

#[derive(Debug, Parser)]
#[command(name = "discovery-crawler", about = "Search discovery sites for a list of companies")]
pub struct CrawlArgs {
    /// CSV file with a "Company name" column.
    pub input: Option<PathBuf>,

    #[arg(long, env = "CRAWLER_DATABASE", default_value = "database.db")]
    pub database: PathBuf,

    /// Directory holding the per-site session snapshots.
    #[arg(long, env = "CRAWLER_SESSION_DIR", default_value = ".")]
    pub session_dir: PathBuf,

    /// Days during which a searched company is not searched again.
    #[arg(long, default_value_t = 7)]
    pub freshness_days: i64,

    /// Number of companies, from the top of the input, searched per site.
    #[arg(long, default_value_t = 51)]
    pub max_companies: usize,

    /// Pause between two searches.
    #[arg(long, default_value_t = 10)]
    pub delay_secs: u64,

    /// Only crawl these sites. Repeat for several.
    #[arg(long = "site")]
    pub sites: Vec<String>,

    #[arg(long, env = "INTRAFISH_USERNAME", default_value = "")]
    pub intrafish_username: String,

    #[arg(long, env = "INTRAFISH_PASSWORD", default_value = "", hide_env_values = true)]
    pub intrafish_password: String,

    #[arg(long, env = "NEXIS_USERNAME", default_value = "")]
    pub nexis_username: String,

    #[arg(long, env = "NEXIS_PASSWORD", default_value = "", hide_env_values = true)]
    pub nexis_password: String,

    #[arg(long, env = "CRAWLER_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,
}

impl CrawlArgs {
    pub fn crawl_config(&self) -> CrawlConfig {
        CrawlConfig {
            freshness_days: self.freshness_days,
            max_companies: self.max_companies,
            request_delay: Duration::from_secs(self.delay_secs),
            pacing: Pacing::new(),
        }
    }

    pub fn credentials(&self) -> SiteCredentials {
        SiteCredentials {
            intrafish: Credentials {
                username: self.intrafish_username.clone(),
                password: self.intrafish_password.clone(),
            },
            nexis_uni: Credentials {
                username: self.nexis_username.clone(),
                password: self.nexis_password.clone(),
            },
        }
    }

    /// Narrows `sites` to the ones asked for with `--site`, keeping crawl
    /// order. Everything is kept when none were asked for.
    pub fn select_sites(&self, sites: Vec<SiteDefinition>) -> Vec<SiteDefinition> {
        if self.sites.is_empty() {
            return sites;
        }
        for name in &self.sites {
            if !sites.iter().any(|s| s.key == name.as_str()) {
                warn!("Unknown site {}", name);
            }
        }
        sites
            .into_iter()
            .filter(|s| self.sites.iter().any(|name| name.as_str() == s.key))
            .collect()
    }
}

#[derive(Debug, Parser)]
#[command(name = "export", about = "Write all stored search results to a dated CSV file")]
pub struct ExportArgs {
    #[arg(long, env = "CRAWLER_DATABASE", default_value = "database.db")]
    pub database: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,
}
