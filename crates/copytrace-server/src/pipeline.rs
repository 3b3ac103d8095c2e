//! The analysis pipeline: one stored document in, one persisted verdict out.
//!
//! A run owns its analysis row exclusively. Status and progress move only
//! forward (`reading` 10, `searching` 10..80, `reporting` 90, `done` 100)
//! until a terminal state; a fatal error resets to `error`/0/0. Provider
//! failures along the way (search, fetch, scoring) degrade to empty results
//! and never abort the run; only record/blob store failures and report
//! rendering are fatal.

use crate::{config::AppContext, notify, report};
use copytrace_core::{
    Analysis, AnalysisStatus, AnalysisUpdate, MatchRecord, ReportedSource, Result,
};
use copytrace_local::chunk::split_words;
use copytrace_local::extract::document_text;
use copytrace_local::textprep::truncate_chars;
use std::collections::HashSet;
use std::sync::Arc;

/// Unit of independent web comparison, in whitespace words.
pub const CHUNK_WORDS: usize = 500;
/// Leading slice of a chunk used as the search query.
const QUERY_CHARS: usize = 300;
/// Candidate sources requested per chunk.
const SOURCES_PER_CHUNK: usize = 3;
/// Pages at or under this many characters of prose are boilerplate shells,
/// not worth a scoring round-trip.
const MIN_PAGE_CHARS: usize = 100;
/// A candidate above this similarity (percent) is persisted as a match.
pub const RELEVANCE_THRESHOLD: f64 = 15.0;
/// Cap on the matched-page excerpt stored with each match row.
const MATCHING_TEXT_CHARS: usize = 500;

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Document-level score: mean of each chunk's best candidate similarity,
/// zero for chunks that found nothing.
pub fn aggregate_score(chunk_maxima: &[f64]) -> f64 {
    if chunk_maxima.is_empty() {
        return 0.0;
    }
    round2(chunk_maxima.iter().sum::<f64>() / chunk_maxima.len() as f64)
}

/// Entry point for one spawned run. Never returns an error: every failure
/// is absorbed here into the `error` terminal state.
pub async fn run_analysis(ctx: Arc<AppContext>, id: String) {
    let analysis = match ctx.records.analysis(&id).await {
        Ok(a) => a,
        Err(e) => {
            tracing::error!(id = %id, error = %e, "cannot load analysis row");
            mark_failed(&ctx, &id, None).await;
            return;
        }
    };
    match run_pipeline(&ctx, &analysis).await {
        Ok(score) => tracing::info!(id = %id, score, "analysis finished"),
        Err(e) => {
            tracing::error!(id = %id, error = %e, "analysis failed");
            mark_failed(&ctx, &id, Some(&analysis)).await;
        }
    }
}

async fn mark_failed(ctx: &AppContext, id: &str, analysis: Option<&Analysis>) {
    let update = AnalysisUpdate {
        status: Some(AnalysisStatus::Error),
        progress: Some(0),
        plagiarism_score: Some(0.0),
        report_path: None,
    };
    if let Err(e) = ctx.records.update_analysis(id, &update).await {
        tracing::warn!(id = %id, error = %e, "could not record the error state");
    }
    if let Some(analysis) = analysis {
        notify::analysis_failed(ctx.records.as_ref(), analysis).await;
    }
}

async fn run_pipeline(ctx: &AppContext, analysis: &Analysis) -> Result<f64> {
    let id = &analysis.id;
    ctx.records
        .update_analysis(id, &AnalysisUpdate::stage(AnalysisStatus::Reading, 10))
        .await?;

    let bytes = ctx.blobs.download(analysis.storage_path()).await?;
    let text = document_text(&bytes);
    if text.trim().is_empty() {
        // Nothing to compare: terminal success with a zero score, no
        // searches, no report.
        tracing::info!(id = %id, "document has no extractable text");
        let update = AnalysisUpdate {
            status: Some(AnalysisStatus::Done),
            progress: Some(100),
            plagiarism_score: Some(0.0),
            report_path: None,
        };
        ctx.records.update_analysis(id, &update).await?;
        notify::analysis_done(ctx.records.as_ref(), analysis, 0.0).await;
        return Ok(0.0);
    }

    let chunks = split_words(&text, CHUNK_WORDS);
    let total = chunks.len();
    ctx.records
        .update_analysis(id, &AnalysisUpdate::stage(AnalysisStatus::Searching, 10))
        .await?;

    let mut chunk_maxima = Vec::with_capacity(total);
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut sources: Vec<ReportedSource> = Vec::new();
    for (i, chunk) in chunks.iter().enumerate() {
        let max = analyze_chunk(ctx, analysis, chunk, &mut seen_urls, &mut sources).await?;
        chunk_maxima.push(max);
        let progress = (10 + (i + 1) * 70 / total) as u8;
        ctx.records
            .update_analysis(id, &AnalysisUpdate::progress(progress))
            .await?;
        tracing::debug!(id = %id, chunk = i, max, progress, "chunk analyzed");
    }
    let score = aggregate_score(&chunk_maxima);

    ctx.records
        .update_analysis(id, &AnalysisUpdate::stage(AnalysisStatus::Reporting, 90))
        .await?;
    sources.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    sources.truncate(report::MAX_REPORTED_SOURCES);
    let input = report::ReportInput {
        analysis_id: id,
        document_name: analysis.display_name(),
        score,
        sources: &sources,
        text: &text,
    };
    let report_path = report::generate_and_store(ctx.blobs.as_ref(), &input).await?;

    let update = AnalysisUpdate {
        status: Some(AnalysisStatus::Done),
        progress: Some(100),
        plagiarism_score: Some(score),
        report_path: Some(report_path),
    };
    ctx.records.update_analysis(id, &update).await?;
    notify::analysis_done(ctx.records.as_ref(), analysis, score).await;
    Ok(score)
}

/// Compare one chunk against its web candidates. Returns the chunk's best
/// similarity on the 0-100 scale; records matches and first-seen sources.
async fn analyze_chunk(
    ctx: &AppContext,
    analysis: &Analysis,
    chunk: &str,
    seen_urls: &mut HashSet<String>,
    sources: &mut Vec<ReportedSource>,
) -> Result<f64> {
    let query = truncate_chars(chunk, QUERY_CHARS);
    let hits = match ctx.search.search(&query, SOURCES_PER_CHUNK).await {
        Ok(hits) => hits,
        Err(e) => {
            tracing::warn!(analysis = %analysis.id, error = %e, "chunk search degraded to no candidates");
            Vec::new()
        }
    };

    let mut chunk_max = 0.0_f64;
    for hit in hits {
        let page = ctx.fetcher.page_text(&hit.url).await;
        if page.trim().chars().count() <= MIN_PAGE_CHARS {
            tracing::debug!(analysis = %analysis.id, url = %hit.url, "candidate page too thin, skipped");
            continue;
        }

        let similarity = ctx.scorer.score(chunk, &page).await;
        let score = round2(similarity * 100.0);
        if score > chunk_max {
            chunk_max = score;
        }
        if score > RELEVANCE_THRESHOLD {
            // Every qualifying occurrence becomes a match row; the report
            // list keeps only the first sighting of a URL.
            ctx.records
                .insert_match(&MatchRecord {
                    analysis_id: analysis.id.clone(),
                    url: hit.url.clone(),
                    title: hit.title.clone(),
                    similarity_score: score,
                    matching_text: truncate_chars(&page, MATCHING_TEXT_CHARS),
                })
                .await?;
            if seen_urls.insert(hit.url.clone()) {
                sources.push(ReportedSource {
                    url: hit.url,
                    title: hit.title,
                    similarity: score,
                });
            }
        }
    }
    Ok(chunk_max)
}
