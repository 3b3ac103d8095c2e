use crate::textprep::truncate_chars;
use copytrace_core::SimilarityScorer;
use std::time::Duration;

/// Inference can legitimately take a while when the model is cold even with
/// the wait directive; keep this looser than the other provider timeouts.
const SCORE_TIMEOUT: Duration = Duration::from_secs(30);

/// Fixed pause between retry attempts after a transport failure.
const RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// Transport failures worth a second attempt (cold model, flaky route).
const DEFAULT_RETRIES: u32 = 2;

/// Character cap on each fragment sent to the scoring backend.
const MAX_FRAGMENT_CHARS: usize = 1000;

fn hf_token_from_env() -> Option<String> {
    std::env::var("COPYTRACE_HF_TOKEN")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            std::env::var("HF_TOKEN")
                .ok()
                .filter(|v| !v.trim().is_empty())
        })
}

fn hf_endpoint_from_env() -> Option<String> {
    std::env::var("COPYTRACE_HF_ENDPOINT")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Why a single attempt produced no score.
#[derive(Debug)]
enum AttemptError {
    /// Timeout or connection failure; the backend may simply not be warm
    /// yet, so the attempt is worth repeating.
    Transient(String),
    /// A well-formed answer that is still unusable (HTTP error status,
    /// payload we cannot parse). Retrying would get the same answer.
    Terminal(String),
}

/// Sentence similarity via the Hugging Face inference router.
#[derive(Debug, Clone)]
pub struct HfSimilarityScorer {
    client: reqwest::Client,
    token: String,
    retries: u32,
    backoff: Duration,
    request_timeout: Duration,
}

impl HfSimilarityScorer {
    pub fn new(client: reqwest::Client, token: String) -> Self {
        Self {
            client,
            token,
            retries: DEFAULT_RETRIES,
            backoff: RETRY_BACKOFF,
            request_timeout: SCORE_TIMEOUT,
        }
    }

    pub fn from_env(client: reqwest::Client) -> copytrace_core::Result<Self> {
        let token = hf_token_from_env().ok_or_else(|| {
            copytrace_core::Error::NotConfigured(
                "missing COPYTRACE_HF_TOKEN (or HF_TOKEN)".to_string(),
            )
        })?;
        Ok(Self::new(client, token))
    }

    /// Override the retry budget and timings. Production keeps the defaults;
    /// tests shrink them so retry behavior is observable without real waits.
    pub fn with_retry_policy(
        mut self,
        retries: u32,
        backoff: Duration,
        request_timeout: Duration,
    ) -> Self {
        self.retries = retries;
        self.backoff = backoff;
        self.request_timeout = request_timeout;
        self
    }

    fn endpoint() -> String {
        // Docs: https://huggingface.co/docs/api-inference (sentence-similarity task)
        //
        // Allow override for testing/debugging (do not include secrets here).
        hf_endpoint_from_env().unwrap_or_else(|| {
            "https://router.huggingface.co/hf-inference/models/sentence-transformers/all-MiniLM-L6-v2"
                .to_string()
        })
    }

    async fn attempt(&self, source: &str, candidate: &str) -> Result<f64, AttemptError> {
        let body = serde_json::json!({
            "inputs": {
                "source_sentence": source,
                "sentences": [candidate],
            },
            // A cold model otherwise answers 503 with an estimated load
            // time; ask the backend to hold the request open instead.
            "options": { "wait_for_model": true },
        });

        let resp = self
            .client
            .post(Self::endpoint())
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.token),
            )
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(&body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    AttemptError::Transient(e.to_string())
                } else {
                    AttemptError::Terminal(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AttemptError::Terminal(format!(
                "similarity backend HTTP {status}"
            )));
        }

        let scores: Vec<f64> = resp
            .json()
            .await
            .map_err(|e| AttemptError::Terminal(format!("malformed score payload: {e}")))?;
        scores
            .first()
            .copied()
            .ok_or_else(|| AttemptError::Terminal("empty score payload".to_string()))
    }
}

#[async_trait::async_trait]
impl SimilarityScorer for HfSimilarityScorer {
    /// Similarity of `candidate` to `source` in [0, 1]; 0.0 whenever no
    /// usable score could be obtained within the retry budget.
    async fn score(&self, source: &str, candidate: &str) -> f64 {
        let source = truncate_chars(source, MAX_FRAGMENT_CHARS);
        let candidate = truncate_chars(candidate, MAX_FRAGMENT_CHARS);

        let mut budget = self.retries;
        loop {
            match self.attempt(&source, &candidate).await {
                Ok(raw) => return raw.clamp(0.0, 1.0),
                Err(AttemptError::Transient(e)) if budget > 0 => {
                    budget -= 1;
                    tracing::warn!(
                        error = %e,
                        remaining = budget,
                        "similarity attempt failed, backing off"
                    );
                    tokio::time::sleep(self.backoff).await;
                }
                Err(AttemptError::Transient(e)) => {
                    tracing::warn!(error = %e, "similarity retry budget exhausted");
                    return 0.0;
                }
                Err(AttemptError::Terminal(e)) => {
                    tracing::warn!(error = %e, "similarity backend answered unusably");
                    return 0.0;
                }
            }
        }
    }
}
