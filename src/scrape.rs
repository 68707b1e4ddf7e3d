//! Article scraping.
//!
//! Fetches a page, drops `script` and `style` content, and flattens the rest
//! to a single line of text. Failures never propagate: a page that cannot be
//! fetched is replaced by a placeholder naming its URL, so downstream prompts
//! degrade instead of the whole pipeline failing.

use reqwest::Client;
use scraper::{Html, Node};
use tracing::{debug, instrument, warn};

/// User-Agent string for article requests.
const USER_AGENT: &str = concat!("genoplan/", env!("CARGO_PKG_VERSION"));

/// Prefix of the text substituted for a page that failed to load.
pub const EMPTY_PAGE_PREFIX: &str = "EMPTY WEBPAGE FROM ";

/// Placeholder text for a page that failed to load.
pub fn placeholder(url: &str) -> String {
    format!("{}{}", EMPTY_PAGE_PREFIX, url)
}

/// Sequential article fetcher. No retries, no rate limiting, library-default timeouts.
#[derive(Debug, Clone)]
pub struct Scraper {
    client: Client,
}

impl Scraper {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder().user_agent(USER_AGENT).build()?;
        Ok(Self { client })
    }

    /// Fetch `url` and return its visible text, or the placeholder on any
    /// transport failure or non-success status.
    #[instrument(skip(self))]
    pub async fn scrape_page(&self, url: &str) -> String {
        match self.fetch(url).await {
            Ok(html) => {
                let text = extract_text(&html);
                debug!(chars = text.len(), "scraped page");
                text
            }
            Err(e) => {
                warn!(error = %e, "failed to scrape page");
                placeholder(url)
            }
        }
    }

    async fn fetch(&self, url: &str) -> reqwest::Result<String> {
        self.client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }

    /// Scrape every URL in order and concatenate the results, each followed
    /// by a blank line.
    pub async fn build_content(&self, urls: &[String]) -> String {
        let mut content = String::new();
        for url in urls {
            content.push_str(&self.scrape_page(url).await);
            content.push_str("\n\n");
        }
        content
    }
}

/// Visible text of an HTML document with whitespace collapsed.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut raw = String::new();

    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| matches!(el.name(), "script" | "style"))
        });
        if !hidden {
            raw.push_str(text);
        }
    }

    collapse_whitespace(&raw)
}

/// Trim every line, break lines on runs of two spaces, and join the
/// non-empty fragments with single spaces.
fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .flat_map(|line| line.split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_extract_text_drops_script_and_style() {
        let html = r#"<html><head>
            <title>Hyrox Basics</title>
            <style>body { color: red; }</style>
            <script>var tracking = true;</script>
        </head><body>
            <h1>Compromised running</h1>
            <p>Run between   stations.</p>
            <script type="text/javascript">alert("x")</script>
        </body></html>"#;
        let text = extract_text(html);
        assert_eq!(text, "Hyrox Basics Compromised running Run between stations.");
        assert!(!text.contains("tracking"));
        assert!(!text.contains("color"));
    }

    #[test]
    fn test_extract_text_keeps_inline_words_together() {
        let text = extract_text("<p>Sled<b>push</b> and <i>pull</i></p>");
        assert_eq!(text, "Sledpush and pull");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a  \n\n\t b   c \n"), "a b c");
        assert_eq!(collapse_whitespace("\n \n"), "");
    }

    #[tokio::test]
    async fn test_scrape_page_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/guide"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<html><body><p>Wall balls</p></body></html>"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let scraper = Scraper::new().unwrap();
        let text = scraper.scrape_page(&format!("{}/guide", server.uri())).await;
        assert_eq!(text, "Wall balls");
    }

    #[tokio::test]
    async fn test_scrape_page_error_status_yields_placeholder() {
        let server = MockServer::start().await;
        Mock::given(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/gone", server.uri());
        let text = Scraper::new().unwrap().scrape_page(&url).await;
        assert_eq!(text, format!("EMPTY WEBPAGE FROM {}", url));
    }

    #[tokio::test]
    async fn test_scrape_page_transport_error_yields_placeholder() {
        // Nothing listens on port 1.
        let url = "http://127.0.0.1:1/article";
        let text = Scraper::new().unwrap().scrape_page(url).await;
        assert_eq!(text, "EMPTY WEBPAGE FROM http://127.0.0.1:1/article");
    }

    #[tokio::test]
    async fn test_build_content_concatenates_in_order() {
        let server = MockServer::start().await;
        Mock::given(path("/one"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>first</p>"))
            .mount(&server)
            .await;
        Mock::given(path("/two"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let urls = vec![format!("{}/one", server.uri()), format!("{}/two", server.uri())];
        let content = Scraper::new().unwrap().build_content(&urls).await;
        assert_eq!(
            content,
            format!("first\n\nEMPTY WEBPAGE FROM {}/two\n\n", server.uri())
        );
    }

    #[tokio::test]
    async fn test_build_content_empty_list() {
        let content = Scraper::new().unwrap().build_content(&[]).await;
        assert!(content.is_empty());
    }
}
