use crate::textprep::truncate_chars;
use copytrace_core::{ContentFetcher, Error, Result};
use std::time::Duration;

/// Candidate pages are commodity input; anything slower than this is not
/// worth waiting for.
const FETCH_TIMEOUT: Duration = Duration::from_secs(8);

/// Byte cap on the downloaded body. Paragraph text beyond the prose cap
/// below never survives anyway, so there is no reason to pull megabytes.
const MAX_BODY_BYTES: usize = 1 << 20;

/// Character cap on the extracted prose handed downstream to the scorer.
const MAX_PROSE_CHARS: usize = 2000;

/// Some sites serve bot-detection pages to unknown clients; present a
/// browser-style identity instead of the default client UA.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (compatible; research-fetch)";

/// Concatenated text of every `<p>` element in document order, joined by
/// single spaces. Boilerplate-heavy pages (nav, cookie banners) mostly live
/// outside `<p>`, which is what makes this cheap heuristic usable.
pub fn paragraphs_text(html: &str) -> String {
    let doc = html_scraper::Html::parse_document(html);
    let Some(sel) = html_scraper::Selector::parse("p").ok() else {
        return String::new();
    };
    let mut out = String::new();
    for p in doc.select(&sel) {
        for t in p.text() {
            let t = t.trim();
            if t.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(t);
        }
    }
    out
}

/// Fetches a candidate URL and reduces it to bounded prose text.
#[derive(Debug, Clone)]
pub struct HttpContentFetcher {
    client: reqwest::Client,
}

impl HttpContentFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_prose(&self, url: &str) -> Result<String> {
        let url = url::Url::parse(url).map_err(|e| Error::Fetch(e.to_string()))?;
        let resp = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, BROWSER_USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Fetch(format!("page fetch HTTP {status}")));
        }

        let mut bytes = Vec::new();
        let mut stream = resp.bytes_stream();
        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| Error::Fetch(e.to_string()))?;
            let can_take = MAX_BODY_BYTES.saturating_sub(bytes.len());
            if chunk.len() >= can_take {
                bytes.extend_from_slice(&chunk[..can_take]);
                break;
            }
            bytes.extend_from_slice(&chunk);
        }

        let html = String::from_utf8_lossy(&bytes);
        Ok(truncate_chars(&paragraphs_text(&html), MAX_PROSE_CHARS))
    }
}

#[async_trait::async_trait]
impl ContentFetcher for HttpContentFetcher {
    async fn page_text(&self, url: &str) -> String {
        match self.fetch_prose(url).await {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(url, error = %e, "candidate page fetch degraded to empty");
                String::new()
            }
        }
    }
}
