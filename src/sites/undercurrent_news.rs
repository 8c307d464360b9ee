use super::{Cursor, Extract, QueryEncoding, SearchTarget, SiteDefinition};
use crate::{
    browser::Page,
    pagination::{self, Paginator, ResultLayout, TitleSource},
    SearchResult,
};
use lazy_static::lazy_static;
use scraper::{Html, Selector};
use tracing::{debug, warn};

pub const KEY: &str = "undercurrent_news";

const E: &str = "Invalid selector";
lazy_static! {
    static ref ENTRY: Selector = Selector::parse(".ucn-search-entry").expect(E);
    static ref BOOKMARK: Selector = Selector::parse(r#"a[rel="bookmark"]"#).expect(E);
    static ref MESSAGE: Selector = Selector::parse(".search-msg").expect(E);
    static ref NEXT: Selector = Selector::parse(".page-numbers.next").expect(E);
}

const NOTHING_FOUND: &str = "nothing found for";

pub fn definition() -> SiteDefinition {
    SiteDefinition {
        key: KEY,
        search: SearchTarget::Custom(search_url),
        login: None,
        setup: None,
        context_file: "undercurrentnews_context.json",
        extractor: Box::new(UndercurrentExtract),
    }
}

/// The whole quoted phrase is escaped, quotes included.
fn search_url(search_phrase: &str) -> String {
    format!(
        "https://www.undercurrentnews.com/?s={}",
        QueryEncoding::Component.encode(&format!(r#""{}""#, search_phrase))
    )
}

fn nothing_found(html: &str) -> bool {
    Html::parse_document(html)
        .select(&MESSAGE)
        .any(|el| {
            el.text()
                .collect::<String>()
                .to_lowercase()
                .contains(NOTHING_FOUND)
        })
}

struct UndercurrentExtract;

impl Extract for UndercurrentExtract {
    fn paginate(&self, company_id: &str) -> Box<dyn Paginator> {
        Box::new(UndercurrentPages {
            company_id: company_id.to_string(),
            cursor: Cursor::Start,
        })
    }
}

struct UndercurrentPages {
    company_id: String,
    cursor: Cursor,
}

#[async_trait::async_trait]
impl Paginator for UndercurrentPages {
    async fn next_batch(&mut self, page: &mut dyn Page) -> Option<Vec<SearchResult>> {
        match self.cursor {
            Cursor::Done => return None,
            Cursor::Advance => {
                if let Err(e) = page.click(".page-numbers.next").await {
                    warn!("Could not open next results page: {}", e);
                    self.cursor = Cursor::Done;
                    return None;
                }
            }
            Cursor::Start => {}
        }

        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read results page: {}", e);
                self.cursor = Cursor::Done;
                return None;
            }
        };

        if nothing_found(&html) {
            debug!("No results for {} on {}", self.company_id, KEY);
            self.cursor = Cursor::Done;
            return Some(Vec::new());
        }

        let layout = ResultLayout {
            container: &ENTRY,
            link: &BOOKMARK,
            title: TitleSource::LinkAttr("title"),
        };
        let results = layout.scrape(&html, page.url().as_deref(), KEY, &self.company_id);
        self.cursor = if pagination::contains(&html, &NEXT) {
            Cursor::Advance
        } else {
            Cursor::Done
        };
        Some(results)
    }
}
