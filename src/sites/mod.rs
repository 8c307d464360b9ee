mod consent;
mod intrafish;
mod nexis_uni;
mod seafood_source;
mod undercurrent_news;

pub use consent::ConsentDialog;

use crate::{
    browser::{Pacing, Page},
    pagination::{self, Paginator},
    SearchResultsInfo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEncoding {
    Component,
    PlusSpaces,
}

impl QueryEncoding {
    pub fn encode(&self, phrase: &str) -> String {
        let encoded = urlencoding::encode(phrase);
        match self {
            QueryEncoding::Component => encoded.into_owned(),
            QueryEncoding::PlusSpaces => encoded.replace("%20", "+"),
        }
    }
}

pub enum SearchTarget {
    /// `prefix` followed by the encoded phrase in double quotes.
    Template {
        prefix: &'static str,
        encoding: QueryEncoding,
    },
    Custom(fn(&str) -> String),
}

impl SearchTarget {
    pub fn url(&self, search_phrase: &str) -> String {
        match self {
            SearchTarget::Template { prefix, encoding } => {
                format!(r#"{}"{}""#, prefix, encoding.encode(search_phrase))
            }
            SearchTarget::Custom(build) => build(search_phrase),
        }
    }
}

#[async_trait::async_trait]
pub trait Login: Send + Sync {
    /// Signs in at `url`. Succeeds straight away when the page already shows
    /// a signed-in state; failures are reported as `false`, never raised.
    async fn login(&self, page: &mut dyn Page, url: &str) -> bool;
}

#[async_trait::async_trait]
pub trait Setup: Send + Sync {
    async fn setup(&self, page: &mut dyn Page, url: &str) -> bool;
}

pub trait Extract: Send + Sync {
    fn paginate(&self, company_id: &str) -> Box<dyn Paginator>;
}

pub struct LoginStep {
    pub url: &'static str,
    pub handler: Box<dyn Login>,
}

pub struct SetupStep {
    pub url: &'static str,
    pub handler: Box<dyn Setup>,
}

pub struct SiteDefinition {
    pub key: &'static str,
    pub search: SearchTarget,
    pub login: Option<LoginStep>,
    pub setup: Option<SetupStep>,
    pub context_file: &'static str,
    pub extractor: Box<dyn Extract>,
}

impl SiteDefinition {
    pub fn search_url(&self, search_phrase: &str) -> String {
        self.search.url(search_phrase)
    }

    /// Sites without a login step count as signed in.
    pub async fn login(&self, page: &mut dyn Page) -> bool {
        match &self.login {
            Some(step) => step.handler.login(page, step.url).await,
            None => true,
        }
    }

    pub async fn setup(&self, page: &mut dyn Page) -> bool {
        match &self.setup {
            Some(step) => step.handler.setup(page, step.url).await,
            None => true,
        }
    }

    pub async fn extract(&self, company_id: &str, page: &mut dyn Page) -> SearchResultsInfo {
        pagination::collect(self.extractor.paginate(company_id), page).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteCredentials {
    pub intrafish: Credentials,
    pub nexis_uni: Credentials,
}

pub fn registry(credentials: &SiteCredentials, pacing: Pacing) -> Vec<SiteDefinition> {
    vec![
        intrafish::definition(credentials.intrafish.clone(), pacing),
        undercurrent_news::definition(),
        seafood_source::definition(pacing),
        nexis_uni::definition(credentials.nexis_uni.clone(), pacing),
    ]
}

/// Shared walk over a paginated result list with a "next" control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Cursor {
    Start,
    Advance,
    Done,
}
