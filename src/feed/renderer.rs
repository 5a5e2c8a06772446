use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::error::{AppError, Result};

const USER_AGENT_STRING: &str =
    "Mozilla/5.0 (Linux; Android 10; K) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Mobile Safari/537.36";
const NEXT_PAGE_SELECTOR: &str = "#objects_container section + a";

/// A page-at-a-time view of the feed, owned by one sync pass.
///
/// `start` must be paired with `close`; callers release the session on
/// every exit path.
#[async_trait]
pub trait FeedRenderer: Send + Sync {
    /// Establish the (possibly authenticated) session.
    async fn start(&mut self) -> Result<()>;

    async fn open(&mut self, url: &str) -> Result<()>;

    async fn current_markup(&self) -> Result<String>;

    /// Move to the next feed page. `Ok(false)` when there is none.
    async fn advance_to_next_page(&mut self) -> Result<bool>;

    async fn close(&mut self) -> Result<()>;
}

/// Renderer for the basic-HTML mobile site, driven over plain HTTP with a
/// cookie-holding client.
pub struct HttpRenderer {
    client: Client,
    login_url: Url,
    credentials: Option<(String, String)>,
    page: Option<Page>,
}

struct Page {
    url: Url,
    markup: String,
}

impl HttpRenderer {
    pub fn new(login_url: &str, credentials: Option<(String, String)>) -> Result<Self> {
        Ok(Self {
            client: build_client()?,
            login_url: Url::parse(login_url)?,
            credentials,
            page: None,
        })
    }

    async fn load(&mut self, url: Url) -> Result<()> {
        tracing::debug!("Fetching {}", url);
        let response = self.client.get(url.clone()).send().await?;

        if !response.status().is_success() {
            return Err(AppError::Renderer(format!(
                "HTTP {} for {}",
                response.status(),
                url
            )));
        }

        let url = response.url().clone();
        let markup = response.text().await?;
        self.page = Some(Page { url, markup });
        Ok(())
    }

    async fn login(&mut self, login: &str, password: &str) -> Result<()> {
        tracing::info!("Logging in as {}", login);
        self.load(self.login_url.clone()).await?;

        let (action, mut fields) = {
            let page = self.page.as_ref().ok_or_else(no_page)?;
            login_form(&page.markup, &page.url)
                .ok_or_else(|| AppError::Renderer("login form not found".into()))?
        };
        fields.push(("email".to_string(), login.to_string()));
        fields.push(("pass".to_string(), password.to_string()));

        let response = self.client.post(action).form(&fields).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Renderer(format!(
                "login failed with HTTP {}",
                response.status()
            )));
        }

        let markup = response.text().await?;
        if has_password_field(&markup) {
            return Err(AppError::Renderer("login was rejected".into()));
        }

        tracing::info!("Logged in");
        Ok(())
    }
}

#[async_trait]
impl FeedRenderer for HttpRenderer {
    async fn start(&mut self) -> Result<()> {
        match self.credentials.clone() {
            Some((login, password)) => self.login(&login, &password).await,
            None => {
                tracing::debug!("No credentials configured, browsing anonymously");
                Ok(())
            }
        }
    }

    async fn open(&mut self, url: &str) -> Result<()> {
        let url = Url::parse(url)?;
        self.load(url).await
    }

    async fn current_markup(&self) -> Result<String> {
        self.page
            .as_ref()
            .map(|page| page.markup.clone())
            .ok_or_else(no_page)
    }

    async fn advance_to_next_page(&mut self) -> Result<bool> {
        let next = {
            let page = self.page.as_ref().ok_or_else(no_page)?;
            match next_page_href(&page.markup) {
                Some(href) => page.url.join(&href)?,
                None => {
                    tracing::info!("No link to next page");
                    return Ok(false);
                }
            }
        };

        tracing::info!("Getting next page of feed");
        self.load(next).await?;
        Ok(true)
    }

    async fn close(&mut self) -> Result<()> {
        // A fresh client drops the session cookies.
        self.client = build_client()?;
        self.page = None;
        tracing::debug!("Render session closed");
        Ok(())
    }
}

fn build_client() -> Result<Client> {
    let client = Client::builder()
        .timeout(Duration::from_secs(30))
        .connect_timeout(Duration::from_secs(10))
        .user_agent(USER_AGENT_STRING)
        .cookie_store(true)
        .build()?;
    Ok(client)
}

fn no_page() -> AppError {
    AppError::Renderer("no page is open".into())
}

/// Target of the "more posts" link that follows the feed section.
pub fn next_page_href(markup: &str) -> Option<String> {
    let document = Html::parse_document(markup);
    let selector = Selector::parse(NEXT_PAGE_SELECTOR).ok()?;
    document
        .select(&selector)
        .find_map(|link| link.value().attr("href"))
        .map(|href| href.to_string())
}

fn has_password_field(markup: &str) -> bool {
    let document = Html::parse_document(markup);
    Selector::parse(r#"input[name="pass"]"#)
        .map(|selector| document.select(&selector).next().is_some())
        .unwrap_or(false)
}

/// Locate the form holding the password input; return its resolved action
/// and the hidden/submit fields it carries.
fn login_form(markup: &str, base: &Url) -> Option<(Url, Vec<(String, String)>)> {
    let document = Html::parse_document(markup);
    let form_selector = Selector::parse("form").ok()?;
    let password_selector = Selector::parse(r#"input[name="pass"]"#).ok()?;
    let input_selector = Selector::parse("input[name]").ok()?;

    let form: ElementRef = document
        .select(&form_selector)
        .find(|form| form.select(&password_selector).next().is_some())?;

    let action = match form.value().attr("action") {
        Some(action) if !action.is_empty() => base.join(action).ok()?,
        _ => base.clone(),
    };

    let fields = form
        .select(&input_selector)
        .filter(|input| {
            matches!(
                input.value().attr("type").unwrap_or("text"),
                "hidden" | "submit"
            )
        })
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect();

    Some((action, fields))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_link_following_the_feed_section() {
        let markup = r#"<div id="objects_container"><section><article>a</article></section><a href="/stories.php?cursor=abc">See more stories</a></div>"#;
        assert_eq!(
            next_page_href(markup).as_deref(),
            Some("/stories.php?cursor=abc")
        );
    }

    #[test]
    fn no_link_means_last_page() {
        let markup = r#"<div id="objects_container"><section><article>a</article></section><div>end</div></div>"#;
        assert_eq!(next_page_href(markup), None);

        let outside = r#"<section></section><a href="/elsewhere">x</a>"#;
        assert_eq!(next_page_href(outside), None);
    }

    #[test]
    fn login_form_collects_hidden_fields() {
        let markup = r#"
            <form method="get" action="/search"><input name="q" type="text"></form>
            <form method="post" action="/login/device-based/regular/login/?refsrc=x" id="login_form">
                <input type="hidden" name="lsd" value="AVq">
                <input type="hidden" name="jazoest" value="2961">
                <input type="text" name="email" id="m_login_email">
                <input type="password" name="pass">
                <input type="submit" name="login" value="Log In">
            </form>"#;
        let base = Url::parse("https://d.facebook.com/").unwrap();

        let (action, fields) = login_form(markup, &base).unwrap();

        assert_eq!(
            action.as_str(),
            "https://d.facebook.com/login/device-based/regular/login/?refsrc=x"
        );
        assert_eq!(
            fields,
            vec![
                ("lsd".to_string(), "AVq".to_string()),
                ("jazoest".to_string(), "2961".to_string()),
                ("login".to_string(), "Log In".to_string()),
            ]
        );
    }

    #[test]
    fn password_field_detection() {
        assert!(has_password_field(r#"<form><input name="pass" type="password"></form>"#));
        assert!(!has_password_field("<div>Welcome back</div>"));
    }

    #[tokio::test]
    async fn markup_requires_an_open_page() {
        let renderer = HttpRenderer::new("https://d.facebook.com/", None).unwrap();
        assert!(matches!(
            renderer.current_markup().await,
            Err(AppError::Renderer(_))
        ));
    }
}
