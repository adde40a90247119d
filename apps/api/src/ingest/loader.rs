//! URL loader: fetches a page over HTTP and reduces it to text segments.
//!
//! HTML is parsed with `scraper` and walked in document order. Each block
//! element (heading, paragraph, list item, table cell, quote) becomes one
//! segment. Text sitting outside those blocks, such as the counters in a
//! `<div>` widget, is gathered into runs that break at every non-inline
//! element. Segments are joined with blank lines so the splitter can keep
//! them apart. Anything that is not HTML is passed through as one segment.

use std::time::Duration;

use async_trait::async_trait;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::ingest::Document;

const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Block-level elements whose text becomes one segment each.
const BLOCK_SELECTOR: &str = "title, h1, h2, h3, h4, h5, h6, p, li, td, th, blockquote, pre";

/// Elements whose text joins the surrounding run instead of breaking it.
const INLINE_TAGS: [&str; 16] = [
    "a", "abbr", "b", "br", "code", "em", "font", "i", "label", "mark", "small", "span",
    "strong", "sub", "sup", "u",
];

/// Elements whose text is never content.
const SKIPPED_TAGS: [&str; 5] = ["script", "style", "noscript", "template", "svg"];

/// Loads the text of a URL. Carried by the pipeline as `Arc<dyn DocumentLoader>`.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<Vec<Document>, AppError>;
}

/// HTTP loader using reqwest + scraper.
pub struct UrlLoader {
    client: reqwest::Client,
}

impl UrlLoader {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch(&self, url: &str) -> Result<(String, bool), AppError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Fetch(format!("HTTP {status} for {url}")));
        }

        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("html"))
            .unwrap_or(true);

        let body = response
            .text()
            .await
            .map_err(|e| AppError::Fetch(format!("Failed to read body of {url}: {e}")))?;

        Ok((body, is_html))
    }
}

#[async_trait]
impl DocumentLoader for UrlLoader {
    async fn load(&self, url: &str) -> Result<Vec<Document>, AppError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| AppError::Fetch(format!("Invalid URL '{url}': {e}")))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(AppError::Fetch(format!(
                "Unsupported URL scheme '{}' in '{url}'",
                parsed.scheme()
            )));
        }

        debug!(url = %url, "Fetching document");
        let (body, is_html) = self.fetch(url).await?;

        let segments = if is_html {
            html_segments(&body)
        } else {
            vec![collapse_whitespace(&body)]
        };
        let text = segments
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");

        if text.trim().is_empty() {
            warn!(url = %url, "Page has no text content");
            return Err(AppError::Fetch(format!(
                "no text content extracted from {url}"
            )));
        }

        info!(url = %url, chars = text.len(), "Document loaded");
        Ok(vec![Document {
            source: url.to_string(),
            text,
        }])
    }
}

/// Extracts whitespace-collapsed text segments in document order.
fn html_segments(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse(BLOCK_SELECTOR) else {
        return Vec::new();
    };

    let mut walker = SegmentWalker {
        blocks: &selector,
        segments: Vec::new(),
        run: String::new(),
    };
    walker.visit(document.root_element());
    walker.flush();
    walker.segments
}

struct SegmentWalker<'s> {
    blocks: &'s Selector,
    segments: Vec<String>,
    /// Loose text collected since the last break.
    run: String,
}

impl SegmentWalker<'_> {
    fn visit(&mut self, el: ElementRef) {
        let name = el.value().name();
        if SKIPPED_TAGS.contains(&name) {
            return;
        }
        let inline = INLINE_TAGS.contains(&name);
        if !inline {
            self.flush();
        }

        // Nested blocks (a <p> inside an <li>) are covered by their innermost element
        if self.blocks.matches(&el) && !has_block_descendant(&el, self.blocks) {
            self.push(&visible_text(el));
            return;
        }

        for child in el.children() {
            match child.value() {
                Node::Text(text) => {
                    self.run.push_str(text);
                    self.run.push(' ');
                }
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child);
                    }
                }
                _ => {}
            }
        }

        if !inline {
            self.flush();
        }
    }

    fn flush(&mut self) {
        let run = std::mem::take(&mut self.run);
        self.push(&run);
    }

    fn push(&mut self, text: &str) {
        let text = collapse_whitespace(text);
        if !text.is_empty() {
            self.segments.push(text);
        }
    }
}

fn has_block_descendant(el: &ElementRef, selector: &Selector) -> bool {
    el.select(selector).any(|d| d.id() != el.id())
}

/// Text of an element, excluding script/style subtrees.
fn visible_text(el: ElementRef) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Node::Text(text) = node.value() {
            let skipped = node
                .ancestors()
                .filter_map(ElementRef::wrap)
                .any(|a| SKIPPED_TAGS.contains(&a.value().name()));
            if !skipped {
                out.push_str(text);
                out.push(' ');
            }
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
