//! Pick selection.
//!
//! The top of the candidate pool is summarized into a ranking instruction
//! for the language model, along with history and mood guidance. The model's
//! reply is untrusted; when it is unavailable, unparsable, or empty, the top
//! pool candidates stand in deterministically.

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::models::{Candidate, HistoryItem, Pick, WatchedItem};
use crate::services::llm::{parse_json, ChatModel};

/// How many pool candidates are summarized into the ranking payload
const RANK_WINDOW: usize = 230;
/// Fallback pick count when the model gives nothing usable
const FALLBACK_PICKS: usize = 12;
/// Reason attached to heuristic fallback picks
pub const FALLBACK_REASON: &str = "A strong match for what you asked for";

/// Clamps the five-point mood scale
pub fn clamp_mood(mood: u8) -> u8 {
    mood.clamp(1, 5)
}

/// Guidance text for the ranking call. Advisory only, never enforced
/// programmatically.
pub fn mood_guidance(mood: u8) -> &'static str {
    match clamp_mood(mood) {
        1 | 2 => "Prefer warm, comforting titles with gentle pacing; avoid anything relentless or stressful.",
        3 => "No particular mood bias.",
        4 => "Prefer titles with energy and momentum; avoid slow burns.",
        _ => "Prefer intense, high-stakes, fast-paced titles; avoid anything sleepy.",
    }
}

/// Minimized candidate fields sent to the ranking call
#[derive(Serialize)]
struct CandidateSummary<'a> {
    id: u64,
    media_type: String,
    title: &'a str,
    year: Option<i32>,
    vote_average: f64,
    overview: Option<&'a str>,
}

impl<'a> CandidateSummary<'a> {
    fn from(candidate: &'a Candidate) -> Self {
        Self {
            id: candidate.id,
            media_type: candidate.media_type.to_string(),
            title: &candidate.title,
            year: candidate.year(),
            vote_average: candidate.vote_average,
            overview: candidate.overview.as_deref().map(|o| clip(o, 160)),
        }
    }
}

/// Truncates on a char boundary so summaries stay valid UTF-8
fn clip(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Model reply shape; ids tolerated as numbers or numeric strings
#[derive(Deserialize)]
struct PicksReply {
    #[serde(default)]
    picks: Vec<RawPick>,
}

#[derive(Deserialize)]
struct RawPick {
    id: serde_json::Value,
    #[serde(default)]
    reason: Option<String>,
}

/// Produces the ordered, id-unique pick list for the request
pub async fn select_picks(
    model: &dyn ChatModel,
    prompt: &str,
    mood: u8,
    pool: &[Candidate],
    liked: &[HistoryItem],
    watched: &[WatchedItem],
) -> Vec<Pick> {
    if pool.is_empty() {
        return Vec::new();
    }

    let summaries: Vec<CandidateSummary> = pool.iter().take(RANK_WINDOW).map(CandidateSummary::from).collect();
    let liked_titles: Vec<&str> = liked.iter().map(|item| item.title.as_str()).collect();
    let watched_summary: Vec<String> = watched
        .iter()
        .map(|w| match w.rating {
            Some(rating) => format!("{} ({}/10)", w.item.title, rating),
            None => w.item.title.clone(),
        })
        .collect();

    let instruction = format!(
        r#"You rank movie/TV candidates for a user request. Respond with ONLY JSON:
{{"picks": [{{"id": <candidate id>, "reason": "<one short sentence for the user>"}}]}}
Order picks best-first, at most 12, ids strictly from the candidate list.

Request: {prompt}
Mood guidance: {guidance}
Liked before: {liked}
Watched: {watched}
Candidates: {candidates}"#,
        guidance = mood_guidance(mood),
        liked = json!(liked_titles),
        watched = json!(watched_summary),
        candidates = serde_json::to_string(&summaries).unwrap_or_default(),
    );

    let ranked = match model.complete(&instruction).await {
        Some(reply) => parse_json::<PicksReply>(&reply)
            .map(coerce_picks)
            .unwrap_or_default(),
        None => Vec::new(),
    };

    if ranked.is_empty() {
        tracing::debug!("Ranking unavailable, falling back to score order");
        return fallback_picks(pool);
    }

    dedup_picks(ranked)
}

fn coerce_picks(reply: PicksReply) -> Vec<Pick> {
    reply
        .picks
        .into_iter()
        .filter_map(|raw| {
            let id = match &raw.id {
                serde_json::Value::Number(n) => n.as_u64(),
                serde_json::Value::String(s) => s.parse().ok(),
                _ => None,
            }?;
            Some(Pick {
                id,
                reason: raw
                    .reason
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| FALLBACK_REASON.to_string()),
            })
        })
        .collect()
}

/// Top pool candidates in score order, each with the generic reason
fn fallback_picks(pool: &[Candidate]) -> Vec<Pick> {
    pool.iter()
        .take(FALLBACK_PICKS)
        .map(|candidate| Pick {
            id: candidate.id,
            reason: FALLBACK_REASON.to_string(),
        })
        .collect()
}

/// Keeps the first occurrence of each id; earlier means higher rank
fn dedup_picks(picks: Vec<Pick>) -> Vec<Pick> {
    let mut seen = std::collections::HashSet::new();
    picks.into_iter().filter(|pick| seen.insert(pick.id)).collect()
}
