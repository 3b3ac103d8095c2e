//! Record and blob storage over the Supabase REST surface.
//!
//! One client covers both contracts: the `analyses` / `analysis_results` /
//! `notifications` tables through PostgREST, and document/report blobs
//! through the storage object API. Store failures are the only provider
//! failures that abort a run, so unlike the search/fetch/score clients this
//! one propagates every error.

use copytrace_core::{
    Analysis, AnalysisUpdate, BlobStore, Error, MatchRecord, NotificationRecord, RecordStore,
    Result,
};
use std::time::Duration;

/// Store round-trips carry the whole run's state; give them a generous
/// budget before declaring the backend gone.
const STORE_TIMEOUT: Duration = Duration::from_secs(60);

fn supabase_url_from_env() -> Option<String> {
    std::env::var("SUPABASE_URL")
        .ok()
        .map(|s| s.trim().trim_end_matches('/').to_string())
        .filter(|s| !s.is_empty())
}

fn supabase_key_from_env() -> Option<String> {
    std::env::var("SUPABASE_SERVICE_ROLE_KEY")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

fn supabase_bucket_from_env() -> String {
    std::env::var("SUPABASE_BUCKET")
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "documents".to_string())
}

#[derive(Debug, Clone)]
pub struct SupabaseStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    bucket: String,
}

impl SupabaseStore {
    pub fn new(client: reqwest::Client, base_url: String, api_key: String, bucket: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            bucket,
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self> {
        let base_url = supabase_url_from_env()
            .ok_or_else(|| Error::NotConfigured("missing SUPABASE_URL".to_string()))?;
        let api_key = supabase_key_from_env()
            .ok_or_else(|| Error::NotConfigured("missing SUPABASE_SERVICE_ROLE_KEY".to_string()))?;
        Ok(Self::new(client, base_url, api_key, supabase_bucket_from_env()))
    }

    /// `{base}/rest/v1/{table}` with the analysis id filter when given.
    /// The filter alone: PostgREST rejects `limit` on a PATCH unless the
    /// request also orders on a unique column, so reads that want a bound
    /// append it themselves.
    fn table_url(&self, table: &str, id_filter: Option<&str>) -> Result<url::Url> {
        let mut u = url::Url::parse(&self.base_url).map_err(|e| Error::Store(e.to_string()))?;
        u.path_segments_mut()
            .map_err(|_| Error::Store("supabase base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["rest", "v1", table]);
        if let Some(id) = id_filter {
            u.query_pairs_mut().append_pair("id", &format!("eq.{id}"));
        }
        Ok(u)
    }

    /// `{base}/storage/v1/object/{bucket}/{path}` with each path segment
    /// percent-encoded, so ids with spaces or slashes in file names survive.
    fn object_url(&self, path: &str) -> Result<url::Url> {
        let mut u = url::Url::parse(&self.base_url).map_err(|e| Error::Storage(e.to_string()))?;
        u.path_segments_mut()
            .map_err(|_| Error::Storage("supabase base url cannot hold a path".to_string()))?
            .pop_if_empty()
            .extend(["storage", "v1", "object", &self.bucket])
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(u)
    }

    fn authed(&self, rb: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        rb.header("apikey", &self.api_key)
            .header(
                reqwest::header::AUTHORIZATION,
                format!("Bearer {}", self.api_key),
            )
            .timeout(STORE_TIMEOUT)
    }

    async fn insert_row<T: serde::Serialize + ?Sized>(&self, table: &str, row: &T) -> Result<()> {
        let resp = self
            .authed(self.client.post(self.table_url(table, None)?))
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Store(format!("insert into {table} HTTP {status}")));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecordStore for SupabaseStore {
    async fn analysis(&self, id: &str) -> Result<Analysis> {
        let mut u = self.table_url("analyses", Some(id))?;
        u.query_pairs_mut().append_pair("limit", "1");
        let resp = self
            .authed(self.client.get(u))
            .send()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Store(format!("read analysis HTTP {status}")));
        }
        // PostgREST answers a (possibly empty) array for a filtered select.
        let mut rows: Vec<Analysis> = resp.json().await.map_err(|e| Error::Store(e.to_string()))?;
        if rows.is_empty() {
            return Err(Error::NotFound(format!("analysis {id}")));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update_analysis(&self, id: &str, update: &AnalysisUpdate) -> Result<()> {
        let resp = self
            .authed(self.client.patch(self.table_url("analyses", Some(id))?))
            .header("Prefer", "return=minimal")
            .json(update)
            .send()
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Store(format!("update analysis HTTP {status}")));
        }
        Ok(())
    }

    async fn insert_match(&self, rec: &MatchRecord) -> Result<()> {
        self.insert_row("analysis_results", rec).await
    }

    async fn insert_notification(&self, rec: &NotificationRecord) -> Result<()> {
        self.insert_row("notifications", rec).await
    }
}

#[async_trait::async_trait]
impl BlobStore for SupabaseStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>> {
        let resp = self
            .authed(self.client.get(self.object_url(path)?))
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Storage(format!("download {path} HTTP {status}")));
        }
        let bytes = resp.bytes().await.map_err(|e| Error::Storage(e.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let resp = self
            .authed(self.client.post(self.object_url(path)?))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            // Re-running an analysis replaces its report instead of failing
            // on the existing object.
            .header("x-upsert", "true")
            .body(bytes)
            .send()
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Storage(format!("upload {path} HTTP {status}")));
        }
        Ok(())
    }
}
