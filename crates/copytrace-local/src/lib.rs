use copytrace_core::{Error, Result};
use std::time::Duration;

pub mod chunk;
pub mod extract;
pub mod scrape;
pub mod search;
pub mod similarity;
pub mod supabase;
pub mod textprep;

/// Shared HTTP client for all outbound providers.
///
/// Safety defaults: avoid "hang forever" on DNS/TLS/body stalls. Providers
/// still set their own per-request timeouts, which override the total cap
/// where a call needs a tighter or looser budget.
pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("copytrace/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(10))
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Fetch(e.to_string()))
}
