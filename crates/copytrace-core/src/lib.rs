use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("extraction failed: {0}")]
    Extract(String),
    #[error("search failed: {0}")]
    Search(String),
    #[error("fetch failed: {0}")]
    Fetch(String),
    #[error("scoring failed: {0}")]
    Score(String),
    #[error("store error: {0}")]
    Store(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("render failed: {0}")]
    Render(String),
    #[error("not configured: {0}")]
    NotConfigured(String),
    #[error("not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Lifecycle of one analysis row. Stored as the lowercase label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisStatus {
    Reading,
    Searching,
    Reporting,
    Done,
    Error,
}

impl AnalysisStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisStatus::Reading => "reading",
            AnalysisStatus::Searching => "searching",
            AnalysisStatus::Reporting => "reporting",
            AnalysisStatus::Done => "done",
            AnalysisStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for AnalysisStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the `analyses` table, as read back from the record store.
/// Only the columns the pipeline consumes are declared; unknown columns
/// are ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub id: String,
    /// Storage path of the uploaded document, relative to the bucket root.
    /// Nullable upstream: a row can exist before its upload completes.
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
}

impl Analysis {
    /// Storage path of the document, `""` when the column is null.
    pub fn storage_path(&self) -> &str {
        self.file_path.as_deref().unwrap_or("")
    }

    /// Human-facing document name: the stored file name when present,
    /// otherwise the storage path.
    pub fn display_name(&self) -> &str {
        match &self.file_name {
            Some(n) if !n.is_empty() => n,
            _ => self.storage_path(),
        }
    }
}

/// Partial update for an `analyses` row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnalysisUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AnalysisStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plagiarism_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_path: Option<String>,
}

impl AnalysisUpdate {
    pub fn stage(status: AnalysisStatus, progress: u8) -> Self {
        Self {
            status: Some(status),
            progress: Some(progress),
            ..Self::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
}

/// One flagged source for one chunk, persisted to `analysis_results`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub analysis_id: String,
    pub url: String,
    pub title: Option<String>,
    pub similarity_score: f64,
    /// Leading slice of the chunk that matched, capped at 500 chars.
    pub matching_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub user_id: String,
    pub title: String,
    pub message: String,
    pub read: bool,
}

/// A deduplicated source as it appears in the rendered report.
#[derive(Debug, Clone)]
pub struct ReportedSource {
    pub url: String,
    pub title: Option<String>,
    pub similarity: f64,
}

impl ReportedSource {
    /// Display label: title when present, otherwise the bare URL.
    pub fn label(&self) -> &str {
        match &self.title {
            Some(t) if !t.is_empty() => t,
            _ => &self.url,
        }
    }
}

#[async_trait::async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &'static str;
    async fn search(&self, query: &str, max_results: usize) -> Result<Vec<SearchHit>>;
}

/// Fetches a page and reduces it to comparable prose. Every failure mode
/// (network, non-HTML, selector misses) degrades to an empty string so a
/// dead link never aborts an analysis.
#[async_trait::async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn page_text(&self, url: &str) -> String;
}

/// Scores how close a candidate passage is to the source passage, as a
/// fraction in [0, 1]. Implementations absorb their own transient failures
/// (bounded retry inside) and return 0.0 when no score could be obtained.
#[async_trait::async_trait]
pub trait SimilarityScorer: Send + Sync {
    async fn score(&self, source: &str, candidate: &str) -> f64;
}

#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn analysis(&self, id: &str) -> Result<Analysis>;
    async fn update_analysis(&self, id: &str, update: &AnalysisUpdate) -> Result<()>;
    async fn insert_match(&self, rec: &MatchRecord) -> Result<()>;
    async fn insert_notification(&self, rec: &NotificationRecord) -> Result<()>;
}

#[async_trait::async_trait]
pub trait BlobStore: Send + Sync {
    async fn download(&self, path: &str) -> Result<Vec<u8>>;
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}
