use super::{count_matches, parse_selector, resolve_href, Browser, Page, PageError, SessionSnapshot};
use scraper::Html;
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

#[derive(Debug, Clone, Default)]
pub(crate) struct MockPage {
    pages: HashMap<String, String>,
    transitions: HashMap<(String, String), String>,
    redirects: HashMap<String, String>,
    failing: HashSet<String>,
    current: Option<String>,
    session: Option<SessionSnapshot>,
    log: Arc<Mutex<Vec<String>>>,
}

impl MockPage {
    pub(crate) fn new() -> MockPage {
        MockPage::default()
    }

    pub(crate) fn page(mut self, url: &str, html: &str) -> MockPage {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Clicking `selector` while on `from` loads `to`.
    pub(crate) fn transition(mut self, from: &str, selector: &str, to: &str) -> MockPage {
        self.transitions
            .insert((from.to_string(), selector.to_string()), to.to_string());
        self
    }

    /// Navigating to `from` ends up on `to`.
    pub(crate) fn redirect(mut self, from: &str, to: &str) -> MockPage {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    pub(crate) fn failing(mut self, url: &str) -> MockPage {
        self.failing.insert(url.to_string());
        self
    }

    /// Starts the page on `url` without logging a navigation.
    pub(crate) fn at(mut self, url: &str) -> MockPage {
        self.current = Some(url.to_string());
        self
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().map(|l| l.clone()).unwrap_or_default()
    }

    fn record(&self, entry: String) {
        if let Ok(mut log) = self.log.lock() {
            log.push(entry);
        }
    }

    fn html(&self) -> Result<&String, PageError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .ok_or_else(|| PageError::Navigation("no document loaded".to_string()))
    }

    fn load(&mut self, url: &str) -> Result<(), PageError> {
        let url = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        let url = url.as_str();
        if self.failing.contains(url) || !self.pages.contains_key(url) {
            return Err(PageError::Navigation(url.to_string()));
        }
        self.current = Some(url.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl Page for MockPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        self.record(format!("goto {}", url));
        self.load(url)
    }

    fn url(&self) -> Option<String> {
        self.current.clone()
    }

    async fn content(&self) -> Result<String, PageError> {
        self.html().cloned()
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        self.record(format!("click {}", selector));
        let current = self.current.clone().unwrap_or_default();
        if let Some(to) = self.transitions.get(&(current.clone(), selector.to_string())) {
            let to = to.clone();
            return self.load(&to);
        }

        let href = {
            let parsed = parse_selector(selector)?;
            let document = Html::parse_document(self.html()?);
            let element = document
                .select(&parsed)
                .next()
                .ok_or_else(|| PageError::NotFound(selector.to_string()))?;
            element.value().attr("href").map(ToString::to_string)
        };
        match href {
            Some(href) => {
                let to = resolve_href(Some(&current), &href);
                self.load(&to)
            }
            None => Err(PageError::Unsupported(format!("click on {}", selector))),
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        if count_matches(self.html()?, selector)? == 0 {
            return Err(PageError::NotFound(selector.to_string()));
        }
        self.record(format!("fill {} {}", selector, value));
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<(), PageError> {
        if count_matches(self.html()?, selector)? > 0 {
            Ok(())
        } else {
            Err(PageError::Timeout(selector.to_string()))
        }
    }

    async fn snapshot(&self) -> Result<SessionSnapshot, PageError> {
        Ok(SessionSnapshot(serde_json::json!({
            "mock": self.current,
            "restored": self.session.is_some(),
        })))
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct MockBrowser {
    template: MockPage,
    sessions: Arc<Mutex<Vec<Option<SessionSnapshot>>>>,
}

impl MockBrowser {
    pub(crate) fn new(template: MockPage) -> MockBrowser {
        MockBrowser {
            template,
            sessions: Arc::default(),
        }
    }

    pub(crate) fn log(&self) -> Vec<String> {
        self.template.log()
    }

    pub(crate) fn sessions(&self) -> Vec<Option<SessionSnapshot>> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Browser for MockBrowser {
    async fn new_page(
        &self,
        session: Option<SessionSnapshot>,
    ) -> Result<Box<dyn Page>, PageError> {
        if let Ok(mut sessions) = self.sessions.lock() {
            sessions.push(session.clone());
        }
        let mut page = self.template.clone();
        page.session = session;
        Ok(Box::new(page))
    }
}
