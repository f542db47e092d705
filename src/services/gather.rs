//! Candidate gathering.
//!
//! Builds the per-request candidate pool: deterministic page seeding, text
//! search plus constrained discovery fan-out, media-type normalization,
//! (media_type, id) deduplication, hard filters, and weighted scoring with a
//! pool cap. Fan-out calls run as spawned tasks but merge in fixed task
//! order, so the pool is deterministic for a fixed seed and upstream data.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{Candidate, HistoryItem, Intent, MediaType, ANIMATION_GENRE},
    services::enrich::gb_max_cert_from_age,
    services::tmdb::{DiscoverFilters, MediaSource, SearchScope},
};

/// Genres never surfaced in kids mode
const KID_DENY_GENRES: [u32; 4] = [27, 53, 80, 10752]; // horror, thriller, crime, war

const MAX_SEARCH_QUERIES: usize = 5;
const SEARCH_PAGES: u32 = 3;
const DISCOVERY_PAGES: u64 = 5;

/// Heuristic constants preserved from the reference behavior. Kept in one
/// injectable struct rather than scattered literals; the defaults are the
/// shipped values.
#[derive(Debug, Clone)]
pub struct Tuning {
    /// Weight on vote_average in the candidate score
    pub vote_weight: f64,
    /// Divisor damping raw popularity in the candidate score
    pub popularity_damp: f64,
    /// Dislikes of a genre within the window before it becomes a hard avoid
    pub dislike_threshold: usize,
    /// How many recent dislikes the aversion heuristic inspects
    pub dislike_window: usize,
    /// Cap on merged genre exclusions sent to discovery
    pub max_genre_exclusions: usize,
    /// Candidate pool cap after scoring
    pub pool_cap: usize,
    /// Discovery vote-count floor
    pub vote_count_floor: u64,
    /// Lowered discovery vote-count floor in niche mode
    pub niche_vote_count_floor: u64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            vote_weight: 2.2,
            popularity_damp: 140.0,
            dislike_threshold: 6,
            dislike_window: 60,
            max_genre_exclusions: 10,
            pool_cap: 750,
            vote_count_floor: 200,
            niche_vote_count_floor: 20,
        }
    }
}

/// Polynomial hash of the query set, refresh token, and mood, mod 100 000.
///
/// Refreshing (a new token) deterministically shifts which result pages are
/// explored without introducing randomness that would defeat caching.
pub fn page_seed(queries: &[String], refresh_token: &str, mood: u8) -> u64 {
    let material = format!("{}{}{}", queries.join(","), refresh_token, mood);
    let mut hash: u64 = 0;
    for byte in material.bytes() {
        hash = hash.wrapping_mul(31).wrapping_add(byte as u64);
    }
    hash % 100_000
}

/// First search page derived from the seed, in 1..=10
pub fn page_start(seed: u64) -> u32 {
    (seed % 10 + 1) as u32
}

/// Discovery page indices spread across the result space, each in 1..=20
pub fn discovery_pages(seed: u64) -> Vec<u32> {
    (0..DISCOVERY_PAGES)
        .map(|i| ((seed + i * 7) % 20 + 1) as u32)
        .collect()
}

/// Weighted relevance score: favors well-reviewed, well-known titles and
/// lets damped popularity break ties.
pub fn score(candidate: &Candidate, tuning: &Tuning) -> f64 {
    candidate.vote_average * tuning.vote_weight
        + ((candidate.vote_count + 1) as f64).log10()
        + candidate.popularity / tuning.popularity_damp
}

/// Genres to exclude from discovery: the intent's own exclusions, the kids
/// denylist when active, and learned aversions from recent dislikes. A genre
/// explicitly requested in `with_genres` is never excluded, and the merged
/// set is capped.
pub fn merged_genre_exclusions(
    intent: &Intent,
    disliked: &[HistoryItem],
    tuning: &Tuning,
) -> Vec<u32> {
    let requested: HashSet<u32> = intent.with_genres.iter().copied().collect();
    let mut merged: Vec<u32> = Vec::new();
    let mut push = |genre: u32| {
        if !requested.contains(&genre) && !merged.contains(&genre) {
            merged.push(genre);
        }
    };

    for &genre in &intent.without_genres {
        push(genre);
    }
    if intent.kids_mode {
        for genre in KID_DENY_GENRES {
            push(genre);
        }
    }

    let mut counts: HashMap<u32, usize> = HashMap::new();
    for item in disliked.iter().rev().take(tuning.dislike_window) {
        for &genre in &item.genre_ids {
            *counts.entry(genre).or_default() += 1;
        }
    }
    let mut learned: Vec<(u32, usize)> = counts
        .into_iter()
        .filter(|&(_, count)| count >= tuning.dislike_threshold)
        .collect();
    learned.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    for (genre, _) in learned {
        push(genre);
    }

    merged.truncate(tuning.max_genre_exclusions);
    merged
}

/// Discovery constraints derived from the intent
fn discover_filters(
    intent: &Intent,
    region: &str,
    without_genres: Vec<u32>,
    person_id: Option<u64>,
    keyword_ids: Vec<u64>,
    tuning: &Tuning,
) -> DiscoverFilters {
    let (certification_country, certification_max) = if intent.kids_mode {
        let age = intent.kids_max_age.unwrap_or(11);
        (
            Some(region.to_string()),
            Some(gb_max_cert_from_age(age).to_string()),
        )
    } else {
        (None, None)
    };

    let (year_min, year_max) = match intent.year_exact {
        Some(year) => (Some(year), Some(year)),
        None => (intent.year_min, intent.year_max),
    };

    DiscoverFilters {
        certification_country,
        certification_max,
        with_genres: intent.with_genres.clone(),
        without_genres,
        year_min,
        year_max,
        min_vote_count: if intent.niche_mode {
            tuning.niche_vote_count_floor
        } else {
            tuning.vote_count_floor
        },
        sort_ascending: intent.niche_mode,
        with_cast: person_id,
        with_keywords: keyword_ids,
    }
}

/// Gathers the deduplicated, filtered, scored candidate pool for a request
pub async fn gather(
    media: Arc<dyn MediaSource>,
    intent: &Intent,
    region: &str,
    refresh_token: &str,
    mood: u8,
    disliked: &[HistoryItem],
    tuning: &Tuning,
) -> AppResult<Vec<Candidate>> {
    let seed = page_seed(&intent.search_queries, refresh_token, mood);
    let start = page_start(seed);

    let person_id = match &intent.actor_name {
        Some(name) => media.person_id(name).await,
        None => None,
    };
    let mut keyword_ids = Vec::new();
    for word in intent.theme_keywords.iter().take(3) {
        if let Some(id) = media.keyword_id(word).await {
            keyword_ids.push(id);
        }
    }

    let without_genres = merged_genre_exclusions(intent, disliked, tuning);
    let filters = discover_filters(intent, region, without_genres, person_id, keyword_ids, tuning);

    let scope = match intent.media_type {
        t if t.wants_movies() && t.wants_tv() => SearchScope::Multi,
        t if t.wants_tv() => SearchScope::Tv,
        _ => SearchScope::Movie,
    };

    // Fan out: one task per (query, page) search and per (kind, page)
    // discovery call. Tasks are joined in spawn order so the merge is
    // deterministic for a fixed seed.
    let mut tasks = Vec::new();

    for query in intent.search_queries.iter().take(MAX_SEARCH_QUERIES) {
        for page in start..start + SEARCH_PAGES {
            let media = media.clone();
            let query = query.clone();
            tasks.push(tokio::spawn(async move {
                let items = media.search(scope, &query, page).await?;
                Ok::<_, crate::error::AppError>((scope.implied_kind(), items))
            }));
        }
    }

    let mut discovery_kinds = Vec::new();
    if intent.media_type.wants_movies() {
        discovery_kinds.push(MediaType::Movie);
    }
    if intent.media_type.wants_tv() {
        discovery_kinds.push(MediaType::Tv);
    }
    for kind in discovery_kinds {
        for page in discovery_pages(seed) {
            let media = media.clone();
            let filters = filters.clone();
            tasks.push(tokio::spawn(async move {
                let items = media.discover(kind, &filters, page).await?;
                Ok((Some(kind), items))
            }));
        }
    }

    let mut seen: HashSet<(MediaType, u64)> = HashSet::new();
    let mut pool: Vec<Candidate> = Vec::new();

    for task in tasks {
        let (kind_hint, items) = task
            .await
            .map_err(|e| crate::error::AppError::Internal(e.to_string()))??;
        for item in items {
            let Some(candidate) = item.into_candidate(kind_hint) else {
                continue;
            };
            if !seen.insert(candidate.key()) {
                continue;
            }
            if !passes_hard_filters(&candidate, intent) {
                continue;
            }
            pool.push(candidate);
        }
    }

    pool.sort_by(|a, b| score(b, tuning).total_cmp(&score(a, tuning)));
    pool.truncate(tuning.pool_cap);

    tracing::info!(
        pool_size = pool.len(),
        seed = seed,
        page_start = start,
        "Candidate pool gathered"
    );

    Ok(pool)
}

/// Hard constraints applied while the pool is built: an exact-year mismatch
/// (when the year is known) and the forced-animation genre requirement.
fn passes_hard_filters(candidate: &Candidate, intent: &Intent) -> bool {
    if let (Some(required), Some(year)) = (intent.year_exact, candidate.year()) {
        if year != required {
            return false;
        }
    }
    if intent.forced_animation && !candidate.genre_ids.contains(&ANIMATION_GENRE) {
        return false;
    }
    true
}
