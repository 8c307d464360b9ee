use crate::{browser::Page, utils::normalize_text, SearchResult, SearchResultsInfo};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

#[async_trait::async_trait]
pub trait Paginator: Send {
    /// Results of the next page, or `None` once the sequence is exhausted.
    /// Calling again after `None` keeps returning `None`.
    async fn next_batch(&mut self, page: &mut dyn Page) -> Option<Vec<SearchResult>>;
}

pub async fn collect(mut pages: Box<dyn Paginator>, page: &mut dyn Page) -> SearchResultsInfo {
    let mut info = SearchResultsInfo::default();
    while let Some(batch) = pages.next_batch(page).await {
        info.pages += 1;
        debug!("Page {}: {} results", info.pages, batch.len());
        info.results.extend(batch);
    }
    info.total_results = info.results.len();
    info
}

/// Where a result's title is read from, relative to its container.
#[derive(Debug, Clone, Copy)]
pub enum TitleSource {
    LinkText,
    LinkAttr(&'static str),
    Within(&'static Selector),
}

#[derive(Debug, Clone, Copy)]
pub struct ResultLayout {
    pub container: &'static Selector,
    pub link: &'static Selector,
    pub title: TitleSource,
}

impl ResultLayout {
    /// Scrapes every container that holds a link with an `href`; containers
    /// without one are skipped rather than failing the page.
    pub fn scrape(
        &self,
        html: &str,
        base_url: Option<&str>,
        site: &str,
        company_id: &str,
    ) -> Vec<SearchResult> {
        let document = Html::parse_document(html);
        document
            .select(self.container)
            .filter_map(|container| {
                let link = container.select(self.link).next()?;
                let href = link.value().attr("href")?;
                Some(SearchResult {
                    site: site.to_string(),
                    company_id: company_id.to_string(),
                    title: self.title_of(&container, &link),
                    url: crate::browser::resolve_href(base_url, href),
                })
            })
            .collect()
    }

    fn title_of(&self, container: &ElementRef, link: &ElementRef) -> String {
        let text = || normalize_text(&link.text().collect::<String>());
        match self.title {
            TitleSource::LinkText => text(),
            TitleSource::LinkAttr(attr) => link
                .value()
                .attr(attr)
                .map(normalize_text)
                .filter(|t| !t.is_empty())
                .unwrap_or_else(text),
            TitleSource::Within(selector) => container
                .select(selector)
                .next()
                .map(|el| normalize_text(&el.text().collect::<String>()))
                .filter(|t| !t.is_empty())
                .unwrap_or_else(text),
        }
    }
}

/// Whether the element matched by `selector` in `html` exists and carries
/// none of `disabled_classes`.
pub(crate) fn is_enabled(html: &str, selector: &Selector, disabled_classes: &[&str]) -> bool {
    let document = Html::parse_document(html);
    let found = document.select(selector).next();
    match found {
        Some(el) => !el
            .value()
            .classes()
            .any(|class| disabled_classes.contains(&class)),
        None => false,
    }
}

pub(crate) fn contains(html: &str, selector: &Selector) -> bool {
    Html::parse_document(html).select(selector).next().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::mock::MockPage;
    use lazy_static::lazy_static;
    use pretty_assertions::assert_eq;

    const E: &str = "Invalid selector";
    lazy_static! {
        static ref ENTRY: Selector = Selector::parse(".entry").expect(E);
        static ref LINK: Selector = Selector::parse("a.title").expect(E);
        static ref HEADING: Selector = Selector::parse("h3").expect(E);
        static ref NEXT: Selector = Selector::parse(".next").expect(E);
    }

    const PAGE: &str = r#"
        <div class="entry"><a class="title" href="/a" title=" Attr  A ">Text
            A</a></div>
        <div class="entry"><h3>Heading B</h3><a class="title" href="https://x.example/b">Text B</a></div>
        <div class="entry"><span>no link here</span></div>
        <div class="entry"><a class="title">no href</a></div>
        <div class="entry"><a class="title" href="/c"></a></div>
    "#;

    fn layout(title: TitleSource) -> ResultLayout {
        ResultLayout {
            container: &ENTRY,
            link: &LINK,
            title,
        }
    }

    #[test]
    fn scrape_skips_containers_without_links() {
        let results = layout(TitleSource::LinkText).scrape(
            PAGE,
            Some("https://site.example/search?q=1"),
            "site",
            "c1",
        );

        assert_eq!(
            results,
            vec![
                SearchResult {
                    site: "site".to_string(),
                    company_id: "c1".to_string(),
                    title: "Text A".to_string(),
                    url: "https://site.example/a".to_string(),
                },
                SearchResult {
                    site: "site".to_string(),
                    company_id: "c1".to_string(),
                    title: "Text B".to_string(),
                    url: "https://x.example/b".to_string(),
                },
                SearchResult {
                    site: "site".to_string(),
                    company_id: "c1".to_string(),
                    title: "".to_string(),
                    url: "https://site.example/c".to_string(),
                },
            ]
        );
    }

    #[test]
    fn titles_fall_back_to_link_text() {
        let titles = |source| {
            layout(source)
                .scrape(PAGE, None, "site", "c1")
                .into_iter()
                .map(|r| r.title)
                .collect::<Vec<_>>()
        };

        assert_eq!(titles(TitleSource::LinkAttr("title")), vec!["Attr A", "Text B", ""]);
        assert_eq!(titles(TitleSource::Within(&HEADING)), vec!["Text A", "Heading B", ""]);
    }

    #[test]
    fn next_control_state() {
        assert!(is_enabled(r#"<li class="next">n</li>"#, &NEXT, &["d-none"]));
        assert!(!is_enabled(r#"<li class="next d-none">n</li>"#, &NEXT, &["d-none"]));
        assert!(!is_enabled(r#"<li class="prev">p</li>"#, &NEXT, &["d-none"]));
    }

    struct Countdown(usize);

    #[async_trait::async_trait]
    impl Paginator for Countdown {
        async fn next_batch(&mut self, _page: &mut dyn Page) -> Option<Vec<SearchResult>> {
            if self.0 == 0 {
                return None;
            }
            self.0 -= 1;
            Some(vec![
                SearchResult {
                    site: "site".to_string(),
                    company_id: "c1".to_string(),
                    title: format!("t{}", self.0),
                    url: format!("https://site.example/{}", self.0),
                };
                2
            ])
        }
    }

    #[tokio::test]
    async fn collect_flattens_batches() {
        let mut page = MockPage::new();
        let info = collect(Box::new(Countdown(3)), &mut page).await;
        assert_eq!(info.pages, 3);
        assert_eq!(info.total_results, 6);
        assert_eq!(info.results[0].title, "t2");
        assert_eq!(info.results[5].title, "t0");

        let info = collect(Box::new(Countdown(0)), &mut page).await;
        assert_eq!(info, SearchResultsInfo::default());
    }
}
