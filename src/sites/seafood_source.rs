use super::{Cursor, Extract, QueryEncoding, SearchTarget, SiteDefinition};
use crate::{
    browser::{Pacing, Page},
    pagination::{self, Paginator, ResultLayout, TitleSource},
    SearchResult,
};
use lazy_static::lazy_static;
use scraper::Selector;
use std::time::Duration;
use tracing::{debug, warn};

pub const KEY: &str = "seafood_source";

/// Search on this site is fuzzy and keeps offering pages long after the
/// relevant hits.
const MAX_PAGES: usize = 10;
const HITS_TIMEOUT: Duration = Duration::from_secs(10);

const E: &str = "Invalid selector";
lazy_static! {
    static ref HIT: Selector = Selector::parse(".ais-Hits-item").expect(E);
    static ref LINK: Selector = Selector::parse("a").expect(E);
    static ref HEADING: Selector = Selector::parse("h3").expect(E);
    static ref NEXT: Selector = Selector::parse(".ais-Pagination-item--nextPage").expect(E);
}

pub fn definition(pacing: Pacing) -> SiteDefinition {
    SiteDefinition {
        key: KEY,
        search: SearchTarget::Template {
            prefix: "https://www.seafoodsource.com/search?query=",
            encoding: QueryEncoding::Component,
        },
        login: None,
        setup: None,
        context_file: "seafoodsource_context.json",
        extractor: Box::new(SeafoodExtract { pacing }),
    }
}

struct SeafoodExtract {
    pacing: Pacing,
}

impl Extract for SeafoodExtract {
    fn paginate(&self, company_id: &str) -> Box<dyn Paginator> {
        Box::new(SeafoodPages {
            company_id: company_id.to_string(),
            pacing: self.pacing,
            cursor: Cursor::Start,
            viewed: 0,
        })
    }
}

struct SeafoodPages {
    company_id: String,
    pacing: Pacing,
    cursor: Cursor,
    viewed: usize,
}

#[async_trait::async_trait]
impl Paginator for SeafoodPages {
    async fn next_batch(&mut self, page: &mut dyn Page) -> Option<Vec<SearchResult>> {
        match self.cursor {
            Cursor::Done => return None,
            Cursor::Advance => {
                if let Err(e) = page.click(".ais-Pagination-item--nextPage a").await {
                    warn!("Could not open next results page: {}", e);
                    self.cursor = Cursor::Done;
                    return None;
                }
            }
            Cursor::Start => {}
        }

        self.pacing.settle(2000).await;
        if let Err(e) = page.wait_for(".ais-Hits", HITS_TIMEOUT).await {
            warn!("Results never rendered: {}", e);
            self.cursor = Cursor::Done;
            return Some(Vec::new());
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read results page: {}", e);
                self.cursor = Cursor::Done;
                return Some(Vec::new());
            }
        };

        let layout = ResultLayout {
            container: &HIT,
            link: &LINK,
            title: TitleSource::Within(&HEADING),
        };
        let results = layout.scrape(&html, page.url().as_deref(), KEY, &self.company_id);
        self.viewed += 1;

        let has_next = pagination::is_enabled(&html, &NEXT, &["ais-Pagination-item--disabled"]);
        self.cursor = if !has_next {
            Cursor::Done
        } else if self.viewed >= MAX_PAGES {
            debug!("Stopping {} after {} pages", KEY, MAX_PAGES);
            Cursor::Done
        } else {
            Cursor::Advance
        };
        Some(results)
    }
}
