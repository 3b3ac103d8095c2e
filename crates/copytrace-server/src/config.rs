//! Process-wide wiring of the external collaborators.
//!
//! Everything the pipeline talks to over the network is reached through the
//! trait objects collected here. The context is assembled once from the
//! environment before the server starts accepting work, then shared by
//! every spawned run; no client is constructed mid-run.

use copytrace_core::{BlobStore, ContentFetcher, RecordStore, Result, SearchProvider, SimilarityScorer};
use copytrace_local::scrape::HttpContentFetcher;
use copytrace_local::search::SerperSearchProvider;
use copytrace_local::similarity::HfSimilarityScorer;
use copytrace_local::supabase::SupabaseStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppContext {
    pub records: Arc<dyn RecordStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub search: Arc<dyn SearchProvider>,
    pub fetcher: Arc<dyn ContentFetcher>,
    pub scorer: Arc<dyn SimilarityScorer>,
}

impl AppContext {
    /// Required environment: `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`,
    /// `COPYTRACE_SERPER_API_KEY` (or `SERPER_API_KEY`), `COPYTRACE_HF_TOKEN`
    /// (or `HF_TOKEN`). Missing settings fail startup rather than the first
    /// run that needs them.
    pub fn from_env() -> Result<Self> {
        let client = copytrace_local::http_client()?;
        let store = Arc::new(SupabaseStore::from_env(client.clone())?);
        Ok(Self {
            records: store.clone(),
            blobs: store,
            search: Arc::new(SerperSearchProvider::from_env(client.clone())?),
            fetcher: Arc::new(HttpContentFetcher::new(client.clone())),
            scorer: Arc::new(HfSimilarityScorer::from_env(client)?),
        })
    }
}
