use super::{
    ConsentDialog, Credentials, Extract, Login, LoginStep, QueryEncoding, SearchTarget, SetupStep,
    SiteDefinition,
};
use crate::{
    browser::{Pacing, Page, PageError},
    pagination::{self, Paginator, ResultLayout, TitleSource},
    SearchResult,
};
use lazy_static::lazy_static;
use scraper::Selector;
use std::time::Duration;
use tracing::{debug, warn};

pub const KEY: &str = "nexis_uni";

/// Result categories searched in turn. The first one is what the search
/// lands on; the others are opened through their tab button.
const TABS: [Option<&str>; 3] = [
    None,
    Some(r#"button[data-id="urn:hlct:6"]"#),
    Some(r#"button[data-id="urn:hlct:5"]"#),
];

const APP_HOST: &str = "advance.lexis.com";
const NEXT_PAGE: &str = r#".pagination a[data-action="nextpage"]"#;
const LOGIN_TIMEOUT: Duration = Duration::from_secs(5);
const RESULTS_TIMEOUT: Duration = Duration::from_secs(10);

const E: &str = "Invalid selector";
lazy_static! {
    static ref DOC_TITLE: Selector = Selector::parse(".doc-title").expect(E);
    static ref TITLE_LINK: Selector = Selector::parse(r#"a[data-action="title"]"#).expect(E);
    static ref NEXT: Selector = Selector::parse(NEXT_PAGE).expect(E);
}

pub fn definition(credentials: Credentials, pacing: Pacing) -> SiteDefinition {
    SiteDefinition {
        key: KEY,
        search: SearchTarget::Template {
            prefix: "https://advance.lexis.com/search/?pdtypeofsearch=searchboxclick&pdsearchtype=SearchBox&pdoriginatingpage=search&pdsearchterms=",
            encoding: QueryEncoding::PlusSpaces,
        },
        login: Some(LoginStep {
            url: "http://nexisuni.com/",
            handler: Box::new(NexisLogin { credentials }),
        }),
        setup: Some(SetupStep {
            url: "https://www.lexisnexis.com/en-us/professional/academic/nexis-uni.page",
            handler: Box::new(ConsentDialog {
                banner: "#onetrust-banner-sdk",
                clicks: &[
                    "#onetrust-pc-btn-handler",
                    "#ot-group-id-2",
                    "#ot-group-id-3",
                    "#ot-group-id-4",
                    ".save-preference-btn-handler",
                ],
                pause_millis: 1000,
                pacing,
            }),
        }),
        context_file: "nexisuni_context.json",
        extractor: Box::new(NexisExtract { pacing }),
    }
}

/// The user id and the password are asked for on two consecutive forms.
struct NexisLogin {
    credentials: Credentials,
}

impl NexisLogin {
    async fn submit(&self, page: &mut dyn Page) -> Result<(), PageError> {
        page.wait_for(r#"input[name="userid"]"#, LOGIN_TIMEOUT).await?;
        page.fill(r#"input[name="userid"]"#, &self.credentials.username)
            .await?;
        page.click(r#"input[type="submit"]"#).await?;
        page.fill(r#"input[name="password"]"#, &self.credentials.password)
            .await?;
        page.click(r#"input[type="submit"]"#).await
    }
}

#[async_trait::async_trait]
impl Login for NexisLogin {
    async fn login(&self, page: &mut dyn Page, url: &str) -> bool {
        if let Err(e) = page.goto(url).await {
            warn!("Could not open login page: {}", e);
            return false;
        }
        if on_app(page) {
            debug!("Already signed in to {}", KEY);
            return true;
        }
        match self.submit(page).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Login form on {} failed: {}", KEY, e);
                false
            }
        }
    }
}

/// A live session sends the sign-in page straight on to the application.
fn on_app(page: &dyn Page) -> bool {
    page.url()
        .and_then(|url| reqwest::Url::parse(&url).ok())
        .map_or(false, |url| url.host_str() == Some(APP_HOST))
}

struct NexisExtract {
    pacing: Pacing,
}

impl Extract for NexisExtract {
    fn paginate(&self, company_id: &str) -> Box<dyn Paginator> {
        Box::new(NexisPages {
            company_id: company_id.to_string(),
            pacing: self.pacing,
            tab: 0,
            step: Step::Enter,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Enter,
    Scrape,
    Advance,
}

struct NexisPages {
    company_id: String,
    pacing: Pacing,
    tab: usize,
    step: Step,
}

impl NexisPages {
    fn next_tab(&mut self) {
        self.tab += 1;
        self.step = Step::Enter;
    }
}

#[async_trait::async_trait]
impl Paginator for NexisPages {
    async fn next_batch(&mut self, page: &mut dyn Page) -> Option<Vec<SearchResult>> {
        while self.tab < TABS.len() {
            match self.step {
                Step::Enter => match TABS[self.tab] {
                    None => self.step = Step::Scrape,
                    Some(tab) => match page.click(tab).await {
                        Ok(()) => {
                            self.pacing.settle(4000).await;
                            self.step = Step::Scrape;
                        }
                        Err(e) => {
                            warn!("Could not open result tab {}: {}", tab, e);
                            self.next_tab();
                        }
                    },
                },
                Step::Advance => {
                    let pacing = self.pacing;
                    let advanced = async {
                        page.click(NEXT_PAGE).await?;
                        pacing.settle(3000).await;
                        page.wait_for(".doc-title", RESULTS_TIMEOUT).await
                    };
                    match advanced.await {
                        Ok(()) => self.step = Step::Scrape,
                        Err(e) => {
                            warn!("Could not open next results page: {}", e);
                            self.next_tab();
                        }
                    }
                }
                Step::Scrape => {
                    let html = match page.content().await {
                        Ok(html) => html,
                        Err(e) => {
                            warn!("Could not read results page: {}", e);
                            self.next_tab();
                            continue;
                        }
                    };

                    let layout = ResultLayout {
                        container: &DOC_TITLE,
                        link: &TITLE_LINK,
                        title: TitleSource::LinkText,
                    };
                    let results =
                        layout.scrape(&html, page.url().as_deref(), KEY, &self.company_id);
                    if pagination::contains(&html, &NEXT) {
                        self.step = Step::Advance;
                    } else {
                        debug!("Last page of tab {}", self.tab);
                        self.next_tab();
                    }
                    return Some(results);
                }
            }
        }
        None
    }
}
