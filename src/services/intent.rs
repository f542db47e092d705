//! Intent normalization.
//!
//! The language model's JSON output is untrusted: it may be absent, partially
//! filled, or mistyped. This module turns whatever came back into a valid
//! [`Intent`], applying defaults and safety-net heuristics. It cannot fail
//! the request; every malformed input degrades to a safe default.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{Intent, TargetMedia, ANIMATION_GENRE};

/// Default age ceiling applied when kids mode is forced by the prompt
const DEFAULT_KIDS_MAX_AGE: u8 = 11;
const MAX_SEARCH_QUERIES: usize = 6;
const MAX_THEME_KEYWORDS: usize = 3;

/// Intent-shaped JSON as the language model produced it. Fields that must be
/// list-shaped are kept as raw values and coerced during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawIntent {
    pub media_type: Option<String>,
    pub search_hint: Option<String>,
    pub search_queries: Value,
    pub kids_mode: Option<bool>,
    pub kids_max_age: Option<u8>,
    pub niche_mode: Option<bool>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub year_exact: Option<i32>,
    pub actor_name: Option<String>,
    pub with_genres: Value,
    pub without_genres: Value,
    pub theme_keywords: Value,
    pub provider_include: Value,
    pub provider_exclude: Value,
}

/// Builds a valid [`Intent`] from raw model output and the original prompt.
///
/// `None` (model unavailable or unparsable) yields the default intent:
/// media type `any`, search queries `[prompt]`.
pub fn normalize(raw: Option<RawIntent>, prompt: &str) -> Intent {
    let raw = raw.unwrap_or_default();

    let media_type = match raw.media_type.as_deref().map(str::to_lowercase).as_deref() {
        Some("movie") => TargetMedia::Movie,
        Some("tv") => TargetMedia::Tv,
        _ => TargetMedia::Any,
    };

    let search_hint = raw
        .search_hint
        .filter(|hint| !hint.trim().is_empty())
        .unwrap_or_else(|| prompt.to_string());

    let mut search_queries: Vec<String> = string_list(&raw.search_queries)
        .into_iter()
        .filter(|q| !q.trim().is_empty())
        .take(MAX_SEARCH_QUERIES)
        .collect();
    if search_queries.is_empty() {
        search_queries.push(search_hint.clone());
    }

    let mut with_genres = dedup(genre_list(&raw.with_genres));
    let without_genres = dedup(genre_list(&raw.without_genres));

    let theme_keywords: Vec<String> = string_list(&raw.theme_keywords)
        .into_iter()
        .filter(|k| !k.trim().is_empty())
        .take(MAX_THEME_KEYWORDS)
        .collect();

    let lowered = prompt.to_lowercase();

    let mut kids_mode = raw.kids_mode.unwrap_or(false);
    let mut kids_max_age = raw.kids_max_age;
    if !kids_mode && mentions_kids(&lowered) {
        kids_mode = true;
        tracing::debug!("Prompt mentions children, forcing kids mode");
    }
    if kids_mode && kids_max_age.is_none() {
        kids_max_age = Some(DEFAULT_KIDS_MAX_AGE);
    }

    let forced_animation = mentions_animation(&lowered);
    if forced_animation && !with_genres.contains(&ANIMATION_GENRE) {
        with_genres.push(ANIMATION_GENRE);
    }

    Intent {
        media_type,
        search_hint,
        search_queries,
        kids_mode,
        kids_max_age,
        niche_mode: raw.niche_mode.unwrap_or(false),
        year_min: raw.year_min,
        year_max: raw.year_max,
        year_exact: raw.year_exact,
        actor_name: raw.actor_name.filter(|a| !a.trim().is_empty()),
        with_genres,
        without_genres,
        theme_keywords,
        provider_include: string_list(&raw.provider_include),
        provider_exclude: string_list(&raw.provider_exclude),
        forced_animation,
        raw_prompt: prompt.to_string(),
    }
}

fn mentions_kids(lowered_prompt: &str) -> bool {
    ["kid", "child", "children"]
        .iter()
        .any(|word| lowered_prompt.contains(word))
}

fn mentions_animation(lowered_prompt: &str) -> bool {
    ["cartoon", "animation", "animated"]
        .iter()
        .any(|word| lowered_prompt.contains(word))
}

/// Coerces a raw value to a list of strings; anything non-list-shaped is empty
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    }
}

/// Coerces a raw value to genre ids, accepting numbers or numeric strings
fn genre_list(value: &Value) -> Vec<u32> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Number(n) => n.as_u64().map(|id| id as u32),
                Value::String(s) => s.parse().ok(),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dedup(ids: Vec<u32>) -> Vec<u32> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw_from(value: serde_json::Value) -> RawIntent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn absent_raw_yields_default_intent() {
        let intent = normalize(None, "something cozy for tonight");

        assert_eq!(intent.media_type, TargetMedia::Any);
        assert_eq!(intent.search_hint, "something cozy for tonight");
        assert_eq!(intent.search_queries, vec!["something cozy for tonight"]);
        assert!(!intent.kids_mode);
        assert!(!intent.niche_mode);
        assert!(intent.with_genres.is_empty());
    }

    #[test]
    fn invalid_media_type_coerces_to_any() {
        let raw = raw_from(json!({"mediaType": "documentary"}));
        assert_eq!(normalize(Some(raw), "p").media_type, TargetMedia::Any);

        let raw = raw_from(json!({"mediaType": "TV"}));
        assert_eq!(normalize(Some(raw), "p").media_type, TargetMedia::Tv);
    }

    #[test]
    fn blank_search_hint_defaults_to_prompt() {
        let raw = raw_from(json!({"searchHint": "  "}));
        assert_eq!(normalize(Some(raw), "space operas").search_hint, "space operas");
    }

    #[test]
    fn empty_queries_default_to_hint() {
        let raw = raw_from(json!({"searchHint": "heist thrillers", "searchQueries": []}));
        let intent = normalize(Some(raw), "p");
        assert_eq!(intent.search_queries, vec!["heist thrillers"]);
    }

    #[test]
    fn queries_are_capped_at_six() {
        let raw = raw_from(json!({
            "searchQueries": ["a", "b", "c", "d", "e", "f", "g", "h"]
        }));
        assert_eq!(normalize(Some(raw), "p").search_queries.len(), 6);
    }

    #[test]
    fn non_list_shaped_fields_coerce_to_empty() {
        let raw = raw_from(json!({
            "withGenres": "35",
            "withoutGenres": {"id": 27},
            "themeKeywords": 42
        }));
        let intent = normalize(Some(raw), "p");
        assert!(intent.with_genres.is_empty());
        assert!(intent.without_genres.is_empty());
        assert!(intent.theme_keywords.is_empty());
    }

    #[test]
    fn genre_lists_accept_numeric_strings_and_dedupe() {
        let raw = raw_from(json!({"withGenres": [35, "18", 35, "junk"]}));
        assert_eq!(normalize(Some(raw), "p").with_genres, vec![35, 18]);
    }

    #[test]
    fn theme_keywords_capped_at_three() {
        let raw = raw_from(json!({"themeKeywords": ["w", "x", "y", "z"]}));
        assert_eq!(normalize(Some(raw), "p").theme_keywords.len(), 3);
    }

    #[test]
    fn kids_prompt_forces_kids_mode_with_default_age() {
        let intent = normalize(None, "Something for the kids tonight");
        assert!(intent.kids_mode);
        assert_eq!(intent.kids_max_age, Some(11));
    }

    #[test]
    fn explicit_kids_age_survives_safety_net() {
        let raw = raw_from(json!({"kidsMode": false, "kidsMaxAge": 7}));
        let intent = normalize(Some(raw), "my child loves dinosaurs");
        assert!(intent.kids_mode);
        assert_eq!(intent.kids_max_age, Some(7));
    }

    #[test]
    fn kids_mode_untouched_without_trigger_words() {
        let intent = normalize(None, "gritty noir for adults");
        assert!(!intent.kids_mode);
        assert_eq!(intent.kids_max_age, None);
    }

    #[test]
    fn cartoon_prompt_forces_animation_genre() {
        let intent = normalize(None, "a fun animated adventure");
        assert!(intent.forced_animation);
        assert!(intent.with_genres.contains(&ANIMATION_GENRE));
    }

    #[test]
    fn animation_genre_not_duplicated_when_already_requested() {
        let raw = raw_from(json!({"withGenres": [16]}));
        let intent = normalize(Some(raw), "a cartoon about cats");
        assert_eq!(
            intent
                .with_genres
                .iter()
                .filter(|&&g| g == ANIMATION_GENRE)
                .count(),
            1
        );
    }

    #[test]
    fn actor_name_blank_is_dropped() {
        let raw = raw_from(json!({"actorName": " "}));
        assert_eq!(normalize(Some(raw), "p").actor_name, None);
    }
}
