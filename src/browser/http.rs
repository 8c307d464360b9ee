use super::{count_matches, parse_selector, Browser, Page, PageError, SessionSnapshot};
use lazy_static::lazy_static;
use reqwest::{
    cookie::Jar,
    header::{GetAll, HeaderValue, LOCATION, SET_COOKIE},
    redirect, Method, StatusCode, Url,
};
use scraper::{ElementRef, Html, Selector};
use std::{collections::HashMap, sync::Arc, time::Duration};
use tracing::{debug, warn};

const MAX_REDIRECTS: usize = 10;

const E: &str = "Invalid selector";
lazy_static! {
    static ref ANCHOR: Selector = Selector::parse("a[href]").expect(E);
    static ref FORM_FIELDS: Selector =
        Selector::parse("input[name], select[name], textarea[name]").expect(E);
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredCookie {
    url: String,
    value: String,
}

impl StoredCookie {
    fn name(&self) -> &str {
        self.value.split('=').next().unwrap_or_default().trim()
    }
}

#[derive(Debug, Default, serde::Serialize, serde::Deserialize)]
struct CookieSnapshot {
    cookies: Vec<StoredCookie>,
}

/// Fetches documents with `reqwest` and never runs scripts. Clicks follow
/// links and submit forms.
pub struct HttpBrowser {
    user_agent: String,
    timeout: Duration,
}

impl HttpBrowser {
    pub fn new<S: Into<String>>(user_agent: S) -> HttpBrowser {
        HttpBrowser {
            user_agent: user_agent.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> HttpBrowser {
        self.timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Browser for HttpBrowser {
    async fn new_page(
        &self,
        session: Option<SessionSnapshot>,
    ) -> Result<Box<dyn Page>, PageError> {
        let cookies = match session {
            Some(SessionSnapshot(value)) => match serde_json::from_value::<CookieSnapshot>(value) {
                Ok(snapshot) => snapshot.cookies,
                Err(e) => {
                    warn!("Ignoring unreadable session: {}", e);
                    vec![]
                }
            },
            None => vec![],
        };

        let jar = Arc::new(Jar::default());
        for cookie in &cookies {
            if let Ok(url) = Url::parse(&cookie.url) {
                jar.add_cookie_str(&cookie.value, &url);
            }
        }
        debug!("Restored {} cookies", cookies.len());

        let client = reqwest::Client::builder()
            .cookie_provider(jar)
            .redirect(redirect::Policy::none())
            .user_agent(self.user_agent.as_str())
            .timeout(self.timeout)
            .build()?;

        Ok(Box::new(HttpPage {
            client,
            cookies,
            url: None,
            html: String::new(),
            fields: HashMap::new(),
        }))
    }
}

enum ClickAction {
    Follow(Url),
    Submit {
        method: Method,
        url: Url,
        fields: Vec<(String, String)>,
    },
}

pub struct HttpPage {
    client: reqwest::Client,
    cookies: Vec<StoredCookie>,
    url: Option<Url>,
    html: String,
    fields: HashMap<String, String>,
}

impl HttpPage {
    async fn request(
        &mut self,
        mut method: Method,
        mut url: Url,
        mut fields: Vec<(String, String)>,
    ) -> Result<(), PageError> {
        for _ in 0..=MAX_REDIRECTS {
            debug!("{} {}", method, url);
            let request = if method == Method::POST {
                self.client.post(url.clone()).form(&fields)
            } else if fields.is_empty() {
                self.client.get(url.clone())
            } else {
                self.client.get(url.clone()).query(&fields)
            };

            let response = request.send().await?;
            self.remember_cookies(response.url(), response.headers().get_all(SET_COOKIE));

            let status = response.status();
            if status.is_redirection() {
                let next = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|l| l.to_str().ok())
                    .and_then(|l| url.join(l).ok())
                    .ok_or_else(|| {
                        PageError::Navigation(format!("{} redirected nowhere ({})", url, status))
                    })?;
                if !matches!(
                    status,
                    StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
                ) {
                    method = Method::GET;
                    fields.clear();
                }
                url = next;
                continue;
            }
            if !status.is_success() {
                return Err(PageError::Navigation(format!("{} answered {}", url, status)));
            }

            self.url = Some(response.url().clone());
            self.html = response.text().await?;
            self.fields.clear();
            return Ok(());
        }
        Err(PageError::Navigation(format!("too many redirects ending at {}", url)))
    }

    fn remember_cookies(&mut self, url: &Url, headers: GetAll<'_, HeaderValue>) {
        let origin = url.origin().ascii_serialization();
        for value in headers.iter().filter_map(|h| h.to_str().ok()) {
            let cookie = StoredCookie {
                url: origin.clone(),
                value: value.to_string(),
            };
            self.cookies
                .retain(|c| !(c.url == cookie.url && c.name() == cookie.name()));
            self.cookies.push(cookie);
        }
    }

    fn current_url(&self) -> Result<&Url, PageError> {
        self.url
            .as_ref()
            .ok_or_else(|| PageError::Navigation("no document loaded".to_string()))
    }
}

#[async_trait::async_trait]
impl Page for HttpPage {
    async fn goto(&mut self, url: &str) -> Result<(), PageError> {
        let url = Url::parse(url).map_err(|_| PageError::Navigation(url.to_string()))?;
        self.request(Method::GET, url, vec![]).await
    }

    fn url(&self) -> Option<String> {
        self.url.as_ref().map(Url::to_string)
    }

    async fn content(&self) -> Result<String, PageError> {
        Ok(self.html.clone())
    }

    async fn click(&mut self, selector: &str) -> Result<(), PageError> {
        let action = resolve_click(&self.html, self.current_url()?, selector, &self.fields)?;
        match action {
            ClickAction::Follow(url) => self.request(Method::GET, url, vec![]).await,
            ClickAction::Submit {
                method,
                url,
                fields,
            } => self.request(method, url, fields).await,
        }
    }

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), PageError> {
        let name = field_name(&self.html, selector)?;
        self.fields.insert(name, value.to_string());
        Ok(())
    }

    async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<(), PageError> {
        // Fetched documents never change.
        if count_matches(&self.html, selector)? > 0 {
            Ok(())
        } else {
            Err(PageError::Timeout(selector.to_string()))
        }
    }

    async fn snapshot(&self) -> Result<SessionSnapshot, PageError> {
        let snapshot = CookieSnapshot {
            cookies: self.cookies.clone(),
        };
        Ok(SessionSnapshot(serde_json::to_value(snapshot)?))
    }
}

fn field_name(html: &str, selector: &str) -> Result<String, PageError> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| PageError::NotFound(selector.to_string()))?;
    element
        .value()
        .attr("name")
        .map(ToString::to_string)
        .ok_or_else(|| PageError::Unsupported(format!("fill on unnamed field {}", selector)))
}

fn resolve_click(
    html: &str,
    base: &Url,
    selector: &str,
    filled: &HashMap<String, String>,
) -> Result<ClickAction, PageError> {
    let parsed = parse_selector(selector)?;
    let document = Html::parse_document(html);
    let element = document
        .select(&parsed)
        .next()
        .ok_or_else(|| PageError::NotFound(selector.to_string()))?;

    if let Some(href) = element.value().attr("href") {
        return follow(base, href);
    }

    if is_submit(&element) {
        let form = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "form");
        if let Some(form) = form {
            return Ok(submit(&form, base, filled));
        }
    }

    // Styled wrappers such as `<li class="next"><a href=..>` act like their link.
    if let Some(href) = element.select(&ANCHOR).find_map(|a| a.value().attr("href")) {
        return follow(base, href);
    }

    Err(PageError::Unsupported(format!("click on {}", selector)))
}

fn follow(base: &Url, href: &str) -> Result<ClickAction, PageError> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return Err(PageError::Unsupported(format!("scripted link {}", href)));
    }
    base.join(href)
        .map(ClickAction::Follow)
        .map_err(|_| PageError::Navigation(href.to_string()))
}

fn is_submit(element: &ElementRef) -> bool {
    let kind = element.value().attr("type").map(str::to_ascii_lowercase);
    match element.value().name() {
        "button" => matches!(kind.as_deref(), None | Some("submit")),
        "input" => matches!(kind.as_deref(), Some("submit") | Some("image")),
        _ => false,
    }
}

fn submit(form: &ElementRef, base: &Url, filled: &HashMap<String, String>) -> ClickAction {
    let url = form
        .value()
        .attr("action")
        .and_then(|action| base.join(action.trim()).ok())
        .unwrap_or_else(|| base.clone());
    let method = match form.value().attr("method") {
        Some(m) if m.eq_ignore_ascii_case("post") => Method::POST,
        _ => Method::GET,
    };

    let mut fields: Vec<(String, String)> = vec![];
    for field in form.select(&FORM_FIELDS) {
        let kind = field.value().attr("type").unwrap_or_default();
        if ["submit", "button", "image", "reset"]
            .iter()
            .any(|k| kind.eq_ignore_ascii_case(k))
        {
            continue;
        }
        let Some(name) = field.value().attr("name") else {
            continue;
        };
        let value = filled
            .get(name)
            .cloned()
            .or_else(|| field.value().attr("value").map(ToString::to_string))
            .unwrap_or_default();
        fields.push((name.to_string(), value));
    }
    for (name, value) in filled {
        if !fields.iter().any(|(n, _)| n == name) {
            fields.push((name.clone(), value.clone()));
        }
    }

    ClickAction::Submit {
        method,
        url,
        fields,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
    };

    /// Serves `/login` as a redirect that sets `sid`, and `/home` as a
    /// signed-in page only when `sid` comes back.
    async fn serve_login() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                tokio::spawn(async move {
                    let mut buf = vec![0u8; 8192];
                    let n = socket.read(&mut buf).await.unwrap_or(0);
                    let request = String::from_utf8_lossy(&buf[..n]).to_ascii_lowercase();
                    let response = if request.starts_with("get /login ") {
                        "HTTP/1.1 302 Found\r\nLocation: /home\r\nSet-Cookie: sid=abc; Path=/\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    } else {
                        let body = if request.contains("cookie: sid=abc") {
                            r#"<form class="logout-form"></form>"#
                        } else {
                            r#"<a class="button-login">Log in</a>"#
                        };
                        format!(
                            "HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            body.len(),
                            body
                        )
                    };
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        format!("http://{}", addr)
    }

    fn base() -> Url {
        Url::parse("https://www.intrafish.com/auth/user/login").unwrap()
    }

    const LOGIN: &str = r#"
        <form action="/auth/user/session" method="post">
            <input type="hidden" name="csrf" value="t0k3n">
            <input name="username">
            <input type="password" name="password">
            <button type="submit">Log in</button>
        </form>
        <ul class="pagination"><li class="next"><a href="?page=2">Next</a></li></ul>
        <a class="js" href="javascript:void(0)">Menu</a>
        <div id="onetrust-pc-btn-handler">Preferences</div>
    "#;

    #[test]
    fn click_on_submit_posts_form_with_filled_values() {
        let mut filled = HashMap::new();
        filled.insert("username".to_string(), "reader".to_string());
        filled.insert("password".to_string(), "secret".to_string());

        let ClickAction::Submit { method, url, fields } =
            resolve_click(LOGIN, &base(), r#"button[type="submit"]"#, &filled).unwrap()
        else {
            panic!("expected a form submission")
        };

        assert_eq!(method, Method::POST);
        assert_eq!(url.as_str(), "https://www.intrafish.com/auth/user/session");
        assert_eq!(
            fields,
            vec![
                ("csrf".to_string(), "t0k3n".to_string()),
                ("username".to_string(), "reader".to_string()),
                ("password".to_string(), "secret".to_string()),
            ]
        );
    }

    #[test]
    fn click_on_wrapper_follows_inner_link() {
        let ClickAction::Follow(url) =
            resolve_click(LOGIN, &base(), ".pagination .next", &HashMap::new()).unwrap()
        else {
            panic!("expected navigation")
        };
        assert_eq!(url.as_str(), "https://www.intrafish.com/auth/user/login?page=2");
    }

    #[test]
    fn unsupported_clicks_are_errors() {
        assert!(matches!(
            resolve_click(LOGIN, &base(), "a.js", &HashMap::new()),
            Err(PageError::Unsupported(_))
        ));
        assert!(matches!(
            resolve_click(LOGIN, &base(), "#onetrust-pc-btn-handler", &HashMap::new()),
            Err(PageError::Unsupported(_))
        ));
        assert!(matches!(
            resolve_click(LOGIN, &base(), "#missing", &HashMap::new()),
            Err(PageError::NotFound(_))
        ));
    }

    #[test]
    fn fill_needs_named_field() {
        assert_eq!(
            field_name(LOGIN, r#"input[type="password"]"#).unwrap(),
            "password"
        );
        assert!(matches!(
            field_name(LOGIN, "li.next"),
            Err(PageError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn snapshot_round_trips_cookies() {
        let browser = HttpBrowser::new("test-agent");
        let session = SessionSnapshot(serde_json::json!({
            "cookies": [
                {"url": "https://www.intrafish.com", "value": "sid=abc; Path=/"}
            ]
        }));

        let page = browser.new_page(Some(session.clone())).await.unwrap();
        assert_eq!(page.snapshot().await.unwrap(), session);
        assert_eq!(page.url(), None);
    }

    #[tokio::test]
    async fn unreadable_session_starts_fresh() {
        let browser = HttpBrowser::new("test-agent");
        let page = browser
            .new_page(Some(SessionSnapshot(serde_json::json!("garbage"))))
            .await
            .unwrap();
        assert_eq!(
            page.snapshot().await.unwrap(),
            SessionSnapshot(serde_json::json!({ "cookies": [] }))
        );
    }

    #[tokio::test]
    async fn cookies_set_on_redirect_are_kept() {
        let origin = serve_login().await;
        let browser = HttpBrowser::new("test-agent");

        let mut page = browser.new_page(None).await.unwrap();
        page.goto(&format!("{}/login", origin)).await.unwrap();
        assert_eq!(page.url(), Some(format!("{}/home", origin)));
        assert!(page.exists(".logout-form").await.unwrap());

        let snapshot = page.snapshot().await.unwrap();
        assert_eq!(
            snapshot,
            SessionSnapshot(serde_json::json!({
                "cookies": [{"url": origin, "value": "sid=abc; Path=/"}]
            }))
        );

        let mut restored = browser.new_page(Some(snapshot)).await.unwrap();
        restored.goto(&format!("{}/home", origin)).await.unwrap();
        assert!(restored.exists(".logout-form").await.unwrap());
    }

    #[tokio::test]
    async fn fresh_page_is_not_signed_in() {
        let origin = serve_login().await;
        let mut page = HttpBrowser::new("test-agent").new_page(None).await.unwrap();
        page.goto(&format!("{}/home", origin)).await.unwrap();
        assert!(!page.exists(".logout-form").await.unwrap());
    }
}
