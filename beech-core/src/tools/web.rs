// beech-core/src/tools/web.rs

//! Fetches a web page and extracts its readable structure.

use crate::config::WebConfig;
use anyhow::{anyhow, Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

lazy_static! {
    static ref SCRIPT: Regex = Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    static ref STYLE: Regex = Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    static ref COMMENT: Regex = Regex::new(r"(?s)<!--.*?-->").unwrap();
    static ref TITLE: Regex = Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap();
    static ref META_DESCRIPTION: Regex =
        Regex::new(r#"(?is)<meta[^>]*name=["']description["'][^>]*content=["']([^"']*?)["']"#).unwrap();
    static ref HEADING: Regex = Regex::new(r"(?is)<h([1-6])[^>]*>(.*?)</h[1-6]>").unwrap();
    static ref PARAGRAPH: Regex = Regex::new(r"(?is)<p[^>]*>(.*?)</p>").unwrap();
    static ref LINK: Regex = Regex::new(r#"(?is)<a[^>]*href=["']([^"']*?)["'][^>]*>(.*?)</a>"#).unwrap();
    static ref BODY: Regex = Regex::new(r"(?is)<body[^>]*>(.*?)</body>").unwrap();
    static ref TAG: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref ENTITY: Regex = Regex::new(r"&[#\w]+;").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// Paragraphs this short are navigation crumbs, not content.
const MIN_PARAGRAPH_CHARS: usize = 20;

const ERROR_PAGE_MARKERS: &[&str] = &["Internal Server Error", "Error 500", "500 Internal"];

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Link {
    pub text: String,
    pub href: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebsiteContent {
    pub url: String,
    pub title: String,
    pub meta_description: String,
    pub headings: Vec<Heading>,
    pub paragraphs: Vec<String>,
    pub links: Vec<Link>,
    /// Whitespace-collapsed body text.
    pub content: String,
}

pub struct WebFetcher {
    http_client: Client,
    max_content_chars: usize,
}

impl WebFetcher {
    pub fn new(config: &WebConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client for web fetcher")?;
        Ok(Self {
            http_client,
            max_content_chars: config.max_content_chars,
        })
    }

    pub async fn fetch(&self, raw_url: &str) -> Result<WebsiteContent> {
        let url = normalize_url(raw_url)?;
        debug!(url = %url, "Fetching website content.");

        let response = self
            .http_client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(describe_send_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("HTTP {}", status));
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !content_type.contains("text/html") && !content_type.contains("application/xhtml") {
            return Err(anyhow!("Expected HTML content but got {}", content_type));
        }

        let html = response.text().await.map_err(describe_send_error)?;
        if html.trim().is_empty() {
            return Err(anyhow!("Received empty response"));
        }
        if ERROR_PAGE_MARKERS.iter().any(|marker| html.contains(marker)) {
            return Err(anyhow!("Server returned an error page"));
        }

        Ok(parse_html_content(&url, &html, self.max_content_chars))
    }
}

/// Prepends `https://` when no scheme is given.
pub fn normalize_url(raw: &str) -> Result<Url> {
    let raw = raw.trim();
    let full = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };
    Url::parse(&full).map_err(|_| anyhow!("Invalid URL format: {}", raw))
}

fn describe_send_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        anyhow!("Request timed out. The website may be slow or unreachable.")
    } else if error.is_connect() {
        anyhow!("Could not connect to the website. Please check the URL and try again.")
    } else {
        anyhow!(error)
    }
}

pub fn parse_html_content(url: &Url, html: &str, max_content_chars: usize) -> WebsiteContent {
    let clean = SCRIPT.replace_all(html, "");
    let clean = STYLE.replace_all(&clean, "");
    let clean = COMMENT.replace_all(&clean, "").into_owned();

    let title = TITLE
        .captures(&clean)
        .map(|c| strip_html(&c[1]))
        .unwrap_or_default();
    let meta_description = META_DESCRIPTION
        .captures(&clean)
        .map(|c| c[1].trim().to_string())
        .unwrap_or_default();

    let headings = HEADING
        .captures_iter(&clean)
        .filter_map(|c| {
            let text = strip_html(&c[2]);
            let level = c[1].parse().ok()?;
            (!text.is_empty()).then_some(Heading { level, text })
        })
        .collect();

    let paragraphs = PARAGRAPH
        .captures_iter(&clean)
        .map(|c| strip_html(&c[1]))
        .filter(|text| text.chars().count() > MIN_PARAGRAPH_CHARS)
        .collect();

    let links = LINK
        .captures_iter(&clean)
        .filter_map(|c| {
            let text = strip_html(&c[2]);
            let href = absolute_href(url, c[1].trim())?;
            (!text.is_empty()).then_some(Link { text, href })
        })
        .collect();

    let body = BODY
        .captures(&clean)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
        .unwrap_or(clean.as_str());
    let content: String = strip_html(body).chars().take(max_content_chars).collect();

    WebsiteContent {
        url: url.to_string(),
        title,
        meta_description,
        headings,
        paragraphs,
        links,
        content,
    }
}

/// Resolves `href` against the page URL. Only http(s) targets are kept.
fn absolute_href(base: &Url, href: &str) -> Option<String> {
    if href.is_empty() || href.starts_with('#') || href.starts_with("mailto:") {
        return None;
    }
    match base.join(href) {
        Ok(resolved) if matches!(resolved.scheme(), "http" | "https") => Some(resolved.to_string()),
        Ok(_) => None,
        Err(e) => {
            warn!(href = %href, error = %e, "Skipping unresolvable link.");
            None
        }
    }
}

/// Removes tags, decodes the common entities and collapses whitespace.
fn strip_html(html: &str) -> String {
    let text = TAG.replace_all(html, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");
    let text = ENTITY.replace_all(&text, " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
