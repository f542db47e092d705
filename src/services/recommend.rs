//! Request orchestration.
//!
//! One recommendation request flows through here: intent extraction and
//! normalization, candidate gathering, exclusion filtering, pick selection,
//! and result assembly, with the pool-empty and total-failure fallbacks that
//! guarantee a 200 response always carries at least one result.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{Candidate, HistoryItem, Intent, ResultItem, WatchedItem},
    services::{
        assemble::Assembler,
        exclude, gather, intent, llm,
        picks::{self, clamp_mood},
    },
    state::AppState,
};

/// Everything the pipeline needs from one inbound request
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct RecommendInput {
    pub prompt: String,
    pub mood: Option<u8>,
    pub local_hour: Option<u8>,
    pub liked: Vec<HistoryItem>,
    pub disliked: Vec<HistoryItem>,
    pub watched: Vec<WatchedItem>,
    pub exclude_ids: Vec<u64>,
    pub region: Option<String>,
    pub refresh_token: Option<String>,
    pub provider_include: Vec<String>,
    pub provider_exclude: Vec<String>,
}

/// Response body for a recommendation request
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendOutput {
    pub results: Vec<ResultItem>,
    pub intent: Intent,
    pub provider_include: Vec<String>,
    pub provider_exclude: Vec<String>,
}

/// Runs the full recommendation pipeline for one request
pub async fn recommend(state: &AppState, input: RecommendInput) -> AppResult<RecommendOutput> {
    let prompt = input.prompt.trim();
    if prompt.is_empty() {
        return Err(AppError::InvalidInput("prompt is required".to_string()));
    }

    let mood = clamp_mood(input.mood.unwrap_or(3));
    let region = input
        .region
        .clone()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| state.default_region.clone());
    let refresh_token = input.refresh_token.clone().unwrap_or_default();

    let raw = llm::extract_intent(state.model.as_ref(), prompt, mood, input.local_hour).await;
    let intent = intent::normalize(raw, prompt);

    let provider_include = merge_names(&input.provider_include, &intent.provider_include);
    let provider_exclude = merge_names(&input.provider_exclude, &intent.provider_exclude);

    let mut pool = gather::gather(
        state.media.clone(),
        &intent,
        &region,
        &refresh_token,
        mood,
        &input.disliked,
        &state.tuning,
    )
    .await?;

    let excluded =
        exclude::exclusion_ids(state.media.as_ref(), &input.disliked, &input.exclude_ids).await;
    pool.retain(|candidate| !excluded.contains(&candidate.id));

    if pool.is_empty() {
        tracing::warn!("Candidate pool empty, substituting trending/popular listings");
        pool = listing_fallback(state, &excluded).await?;
    }

    let picks = picks::select_picks(
        state.model.as_ref(),
        prompt,
        mood,
        &pool,
        &input.liked,
        &input.watched,
    )
    .await;

    let assembler = Assembler {
        media: state.media.as_ref(),
        intent: &intent,
        provider_include: &provider_include,
        provider_exclude: &provider_exclude,
        region: &region,
        image_base_url: &state.image_base_url,
    };
    let mut results = assembler.assemble(&picks, &pool).await;

    if results.is_empty() {
        tracing::error!("No data obtainable from any source, returning placeholder");
        results.push(placeholder_result());
    }

    tracing::info!(
        result_count = results.len(),
        pool_size = pool.len(),
        "Recommendation request completed"
    );

    Ok(RecommendOutput {
        results,
        intent,
        provider_include,
        provider_exclude,
    })
}

/// Trending, then popular, normalized and filtered the same way as the pool
async fn listing_fallback(
    state: &AppState,
    excluded: &HashSet<u64>,
) -> AppResult<Vec<Candidate>> {
    let pool = normalize_listing(state.media.trending().await?, excluded);
    if !pool.is_empty() {
        return Ok(pool);
    }
    Ok(normalize_listing(state.media.popular().await?, excluded))
}

fn normalize_listing(
    listing: Vec<crate::models::tmdb::ListingItem>,
    excluded: &HashSet<u64>,
) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    listing
        .into_iter()
        .filter_map(|item| item.into_candidate(None))
        .filter(|candidate| !excluded.contains(&candidate.id))
        .filter(|candidate| seen.insert(candidate.key()))
        .collect()
}

/// Union of request-level and intent-level provider names, first mention wins
fn merge_names(from_request: &[String], from_intent: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    from_request
        .iter()
        .chain(from_intent.iter())
        .filter(|name| !name.trim().is_empty())
        .filter(|name| seen.insert(name.to_lowercase()))
        .cloned()
        .collect()
}

/// The response contract guarantees at least one item even in a total outage
fn placeholder_result() -> ResultItem {
    ResultItem {
        id: 0,
        title: "Recommendations are unavailable right now".to_string(),
        overview: Some(
            "Our catalog sources did not return any titles for this request. Please try again in a few minutes.".to_string(),
        ),
        media_type: crate::models::MediaType::Movie,
        vote_average: 0.0,
        release_date: None,
        poster_path: None,
        providers: Vec::new(),
        reason: "Upstream data was temporarily unavailable".to_string(),
    }
}
