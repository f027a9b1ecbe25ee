//! Page fetching and HTML-to-markdown extraction.
//!
//! A crawl is a single GET bounded by the configured timeout. The body is rendered to plain
//! markdown-like text with `html2text`; pages that render to nothing are treated as failures so
//! an empty page never reaches the summarizer.

use crate::config::Config;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url, header::CONTENT_TYPE};
use thiserror::Error;

const RENDER_WIDTH: usize = 200;
const USER_AGENT: &str = concat!("sitebrief/", env!("CARGO_PKG_VERSION"));

/// Errors raised while fetching or extracting a page.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// URL failed to parse or used a scheme other than http(s).
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// URL supplied by the caller.
        url: String,
        /// Parser or validation message.
        reason: String,
    },
    /// Network failure or timeout before a response arrived.
    #[error("Failed to fetch page: {0}")]
    Http(#[from] reqwest::Error),
    /// Target answered with a non-success status.
    #[error("Page returned {status}: {url}")]
    UnexpectedStatus {
        /// Status returned by the target site.
        status: StatusCode,
        /// URL that was fetched.
        url: String,
    },
    /// Target served something other than HTML or plain text.
    #[error("Unsupported content type '{0}'")]
    UnsupportedContentType(String),
    /// HTML could not be rendered to text.
    #[error("Failed to extract page text: {0}")]
    Conversion(String),
    /// Page rendered to no usable text.
    #[error("No content extracted from {0}")]
    EmptyContent(String),
}

/// Source of page text for the summarization pipeline.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch `url` and return its extracted markdown text.
    async fn fetch_markdown(&self, url: &str) -> Result<String, CrawlError>;
}

/// HTTP crawler backed by `reqwest` and `html2text`.
pub struct HttpCrawler {
    http: Client,
}

impl HttpCrawler {
    /// Build a crawler using the configured fetch timeout.
    pub fn new(config: &Config) -> Result<Self, CrawlError> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.crawl_timeout())
            .build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl PageFetcher for HttpCrawler {
    async fn fetch_markdown(&self, url: &str) -> Result<String, CrawlError> {
        let target = parse_target(url)?;
        tracing::debug!(url = %target, "Fetching page");

        let response = self.http.get(target.clone()).send().await?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url = %target, %status, "Page fetch returned error status");
            return Err(CrawlError::UnexpectedStatus {
                status,
                url: target.to_string(),
            });
        }

        let kind = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(classify_content_type)
            .unwrap_or(ContentKind::Html);
        let body = response.bytes().await?;

        let text = match kind {
            ContentKind::Html => html_to_markdown(&body)?,
            ContentKind::PlainText => String::from_utf8_lossy(&body).into_owned(),
            ContentKind::Unsupported(mime) => {
                return Err(CrawlError::UnsupportedContentType(mime));
            }
        };

        let markdown = normalize_whitespace(&text);
        if markdown.is_empty() {
            tracing::warn!(url = %target, "Page produced no text");
            return Err(CrawlError::EmptyContent(target.to_string()));
        }

        tracing::info!(url = %target, chars = markdown.chars().count(), "Page extracted");
        Ok(markdown)
    }
}

#[derive(Debug, PartialEq, Eq)]
enum ContentKind {
    Html,
    PlainText,
    Unsupported(String),
}

fn classify_content_type(header: &str) -> ContentKind {
    let mime = header
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase();
    match mime.as_str() {
        "" | "text/html" | "application/xhtml+xml" => ContentKind::Html,
        "text/plain" | "text/markdown" => ContentKind::PlainText,
        _ => ContentKind::Unsupported(mime),
    }
}

fn parse_target(url: &str) -> Result<Url, CrawlError> {
    let parsed = Url::parse(url.trim()).map_err(|err| CrawlError::InvalidUrl {
        url: url.to_string(),
        reason: err.to_string(),
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(CrawlError::InvalidUrl {
            url: url.to_string(),
            reason: format!("unsupported scheme '{other}'"),
        }),
    }
}

/// Render an HTML document to markdown-like text.
pub fn html_to_markdown(html: &[u8]) -> Result<String, CrawlError> {
    html2text::from_read(html, RENDER_WIDTH).map_err(|err| CrawlError::Conversion(err.to_string()))
}

/// Trim trailing whitespace per line and collapse runs of blank lines to one.
pub(crate) fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;
    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push('\n');
            if blank_run > 0 {
                out.push('\n');
            }
        }
        blank_run = 0;
        out.push_str(line);
    }
    out
}
