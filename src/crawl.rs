use crate::{
    browser::{Browser, Pacing, Page},
    company::Company,
    error::CrawlerError,
    session::SessionStore,
    sites::SiteDefinition,
    utils::{calendar_days_between, get_now},
    SearchResultsInfo, Storage,
};
use chrono::{DateTime, FixedOffset};
use std::time::Duration;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlConfig {
    pub freshness_days: i64,
    pub max_companies: usize,
    pub request_delay: Duration,
    pub pacing: Pacing,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            freshness_days: 7,
            max_companies: 51,
            request_delay: Duration::from_secs(10),
            pacing: Pacing::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CrawlSummary {
    pub sites: usize,
    pub searched: usize,
    pub skipped: usize,
    pub failed: usize,
    pub results: usize,
}

/// Whether a pair last searched at `last_searched` is still fresh at `now`.
/// A pair that was never searched is always due.
pub fn should_skip(
    last_searched: Option<DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
    freshness_days: i64,
) -> bool {
    match last_searched {
        Some(last) => calendar_days_between(now, last) <= freshness_days,
        None => false,
    }
}

/// Site-level trouble is logged and never stops the run; store errors do.
pub async fn run_crawler<B, S>(
    browser: &B,
    storage: &S,
    sessions: &SessionStore,
    sites: &[SiteDefinition],
    companies: &[Company],
    config: CrawlConfig,
) -> Result<CrawlSummary, CrawlerError>
where
    B: Browser + ?Sized,
    S: Storage + ?Sized,
{
    let mut summary = CrawlSummary::default();

    for site in sites {
        info!("Crawling {}", site.key);
        let session = sessions.load(site.key).await;
        let mut page = match browser.new_page(session).await {
            Ok(page) => page,
            Err(e) => {
                error!("Cannot open a page for {}: {}", site.key, e);
                continue;
            }
        };
        summary.sites += 1;

        let logged_in = site.login(page.as_mut()).await;
        config.pacing.settle(2000).await;
        let ready = site.setup(page.as_mut()).await;
        if !(logged_in && ready) {
            warn!(
                "Continuing {} degraded (logged in: {}, ready: {})",
                site.key, logged_in, ready
            );
        }

        for company in companies.iter().take(config.max_companies) {
            match storage.lookup(&company.id, site.key).await? {
                None => {
                    storage
                        .record_search(&company.name, &company.id, site.key, &company.search_text)
                        .await?;
                }
                Some(record)
                    if should_skip(record.last_searched_date, get_now(), config.freshness_days) =>
                {
                    info!("Skipping {} ({}) on {}", company.name, company.id, site.key);
                    summary.skipped += 1;
                    continue;
                }
                Some(_) => {}
            }

            let info = match search(site, company, page.as_mut()).await {
                Some(info) => info,
                None => {
                    summary.failed += 1;
                    SearchResultsInfo::default()
                }
            };

            let searched_at = get_now();
            storage
                .touch_searched(&company.id, site.key, searched_at)
                .await?;
            for result in &info.results {
                storage
                    .append_result(&company.id, site.key, &result.url, &result.title, searched_at)
                    .await?;
            }
            info!(
                "{} on {}: {} results over {} pages",
                company.name, site.key, info.total_results, info.pages
            );
            summary.searched += 1;
            summary.results += info.total_results;

            if !config.request_delay.is_zero() {
                tokio::time::sleep(config.request_delay).await;
            }
        }

        if logged_in && ready {
            match page.snapshot().await {
                Ok(snapshot) => {
                    if let Err(e) = sessions.save(site.key, &snapshot).await {
                        warn!("Cannot save session for {}: {}", site.key, e);
                    }
                }
                Err(e) => warn!("Cannot snapshot session for {}: {}", site.key, e),
            }
        }
    }

    info!(
        "Done: {} searched, {} skipped, {} failed, {} results",
        summary.searched, summary.skipped, summary.failed, summary.results
    );
    Ok(summary)
}

async fn search(
    site: &SiteDefinition,
    company: &Company,
    page: &mut dyn Page,
) -> Option<SearchResultsInfo> {
    let url = site.search_url(&company.search_text);
    info!("Searching {} ({}) at {}", company.name, company.id, url);
    if let Err(e) = page.goto(&url).await {
        warn!("Search for {} on {} failed: {}", company.name, site.key, e);
        return None;
    }
    Some(site.extract(&company.id, page).await)
}
