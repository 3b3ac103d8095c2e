use copytrace_core::{Error, Result, SearchHit, SearchProvider};
use serde::Deserialize;
use std::time::Duration;

/// Providers can hang well past usefulness; a chunk whose search stalls is
/// cheaper to skip than to wait for.
const SEARCH_TIMEOUT: Duration = Duration::from_secs(10);

fn serper_api_key_from_env() -> Option<String> {
    std::env::var("COPYTRACE_SERPER_API_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("SERPER_API_KEY")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn serper_endpoint_from_env() -> Option<String> {
    std::env::var("COPYTRACE_SERPER_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Web search via the Serper front-end to Google.
#[derive(Debug, Clone)]
pub struct SerperSearchProvider {
    client: reqwest::Client,
    api_key: String,
}

impl SerperSearchProvider {
    pub fn new(client: reqwest::Client, api_key: String) -> Self {
        Self { client, api_key }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let api_key = serper_api_key_from_env().ok_or_else(|| {
            Error::NotConfigured("missing COPYTRACE_SERPER_API_KEY (or SERPER_API_KEY)".to_string())
        })?;
        Ok(Self { client, api_key })
    }

    fn endpoint() -> String {
        // Docs: https://serper.dev (POST https://google.serper.dev/search)
        //
        // Allow override for testing/debugging (do not include secrets here).
        serper_endpoint_from_env()
            .unwrap_or_else(|| "https://google.serper.dev/search".to_string())
    }
}

#[derive(Debug, Deserialize)]
struct SerperSearchResponse {
    organic: Option<Vec<SerperOrganicResult>>,
}

#[derive(Debug, Deserialize)]
struct SerperOrganicResult {
    link: Option<String>,
    title: Option<String>,
}

#[async_trait::async_trait]
impl SearchProvider for SerperSearchProvider {
    fn name(&self) -> &'static str {
        "serper"
    }

    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>> {
        let body = serde_json::json!({
            "q": query,
            "num": max_results,
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header("X-API-KEY", &self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(SEARCH_TIMEOUT)
            .send()
            .await
            .map_err(|e| Error::Search(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Search(format!("serper search HTTP {status}")));
        }

        let parsed: SerperSearchResponse =
            resp.json().await.map_err(|e| Error::Search(e.to_string()))?;

        let mut out = Vec::new();
        if let Some(results) = parsed.organic {
            for r in results.into_iter().take(max_results) {
                let Some(url) = r.link else { continue };
                out.push(SearchHit { url, title: r.title });
            }
        }
        Ok(out)
    }
}
