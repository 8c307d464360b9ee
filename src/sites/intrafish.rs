use super::{
    ConsentDialog, Credentials, Cursor, Extract, Login, LoginStep, QueryEncoding, SearchTarget,
    SetupStep, SiteDefinition,
};
use crate::{
    browser::{Pacing, Page},
    pagination::{self, Paginator, ResultLayout, TitleSource},
    SearchResult,
};
use lazy_static::lazy_static;
use scraper::Selector;
use tracing::{debug, warn};

pub const KEY: &str = "intrafish";

const E: &str = "Invalid selector";
lazy_static! {
    static ref TEASER: Selector = Selector::parse(".teaser-title").expect(E);
    static ref CARD_LINK: Selector = Selector::parse(".card-link").expect(E);
    static ref PAGINATION: Selector = Selector::parse(".pagination").expect(E);
    static ref NEXT: Selector = Selector::parse(".pagination .next").expect(E);
}

fn layout() -> ResultLayout {
    ResultLayout {
        container: &TEASER,
        link: &CARD_LINK,
        title: TitleSource::LinkText,
    }
}

const LOGGED_IN: [&str; 2] = [".logout-form", ".button-login-status"];

pub fn definition(credentials: Credentials, pacing: Pacing) -> SiteDefinition {
    SiteDefinition {
        key: KEY,
        search: SearchTarget::Template {
            prefix: "https://www.intrafish.com/archive?mode=phrase&q=",
            encoding: QueryEncoding::Component,
        },
        login: Some(LoginStep {
            url: "https://www.intrafish.com/auth/user/login",
            handler: Box::new(IntrafishLogin {
                credentials,
                pacing,
            }),
        }),
        setup: Some(SetupStep {
            url: "https://www.intrafish.com/",
            handler: Box::new(ConsentDialog {
                banner: "#onetrust-banner-sdk",
                clicks: &["#onetrust-pc-btn-handler", ".save-preference-btn-handler"],
                pause_millis: 2000,
                pacing,
            }),
        }),
        context_file: "intrafish_context.json",
        extractor: Box::new(IntrafishExtract { pacing }),
    }
}

struct IntrafishLogin {
    credentials: Credentials,
    pacing: Pacing,
}

impl IntrafishLogin {
    async fn is_logged_in(&self, page: &mut dyn Page) -> bool {
        for indicator in LOGGED_IN {
            if matches!(page.exists(indicator).await, Ok(true)) {
                return true;
            }
        }
        false
    }
}

#[async_trait::async_trait]
impl Login for IntrafishLogin {
    async fn login(&self, page: &mut dyn Page, url: &str) -> bool {
        if let Err(e) = page.goto(url).await {
            warn!("Could not open login page: {}", e);
            return false;
        }
        self.pacing.settle(2000).await;

        if self.is_logged_in(page).await {
            debug!("Already logged in to {}", KEY);
            return true;
        }

        let submitted = async {
            page.fill(r#"input[name="username"]"#, &self.credentials.username)
                .await?;
            page.fill(r#"input[name="password"]"#, &self.credentials.password)
                .await?;
            page.click(r#"button[type="submit"]"#).await
        };
        if let Err(e) = submitted.await {
            warn!("Login form on {} failed: {}", KEY, e);
            return false;
        }
        self.pacing.settle(2000).await;

        matches!(page.exists(LOGGED_IN[0]).await, Ok(true))
    }
}

struct IntrafishExtract {
    pacing: Pacing,
}

impl Extract for IntrafishExtract {
    fn paginate(&self, company_id: &str) -> Box<dyn Paginator> {
        Box::new(IntrafishPages {
            company_id: company_id.to_string(),
            pacing: self.pacing,
            cursor: Cursor::Start,
        })
    }
}

struct IntrafishPages {
    company_id: String,
    pacing: Pacing,
    cursor: Cursor,
}

#[async_trait::async_trait]
impl Paginator for IntrafishPages {
    async fn next_batch(&mut self, page: &mut dyn Page) -> Option<Vec<SearchResult>> {
        match self.cursor {
            Cursor::Done => return None,
            Cursor::Advance => {
                if let Err(e) = page.click(".pagination .next").await {
                    warn!("Could not open next results page: {}", e);
                    self.cursor = Cursor::Done;
                    return None;
                }
            }
            Cursor::Start => {}
        }

        self.pacing.settle(4000).await;
        let html = match page.content().await {
            Ok(html) => html,
            Err(e) => {
                warn!("Could not read results page: {}", e);
                self.cursor = Cursor::Done;
                return None;
            }
        };

        let results = layout().scrape(&html, page.url().as_deref(), KEY, &self.company_id);
        let has_next = pagination::contains(&html, &PAGINATION)
            && pagination::is_enabled(&html, &NEXT, &["d-none"]);
        self.cursor = if has_next { Cursor::Advance } else { Cursor::Done };
        Some(results)
    }
}
