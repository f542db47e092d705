use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod tmdb;

/// Catalog media kind. Movies and series share the same numeric id space,
/// so a candidate is only unique per (media_type, id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Tv => write!(f, "tv"),
        }
    }
}

/// What the user asked for: movies, series, or either
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetMedia {
    Movie,
    Tv,
    #[default]
    Any,
}

impl TargetMedia {
    pub fn wants_movies(&self) -> bool {
        matches!(self, TargetMedia::Movie | TargetMedia::Any)
    }

    pub fn wants_tv(&self) -> bool {
        matches!(self, TargetMedia::Tv | TargetMedia::Any)
    }
}

/// TMDB genre id for Animation, forced into the intent when the prompt
/// explicitly asks for cartoons
pub const ANIMATION_GENRE: u32 = 16;

/// Structured interpretation of the free-text prompt.
///
/// Built once per request by [`Intent::normalize`](crate::services::intent)
/// from raw language-model output merged with defaults and safety nets;
/// immutable afterwards and echoed back to the client in the response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Intent {
    pub media_type: TargetMedia,
    pub search_hint: String,
    pub search_queries: Vec<String>,
    pub kids_mode: bool,
    pub kids_max_age: Option<u8>,
    pub niche_mode: bool,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub year_exact: Option<i32>,
    pub actor_name: Option<String>,
    pub with_genres: Vec<u32>,
    pub without_genres: Vec<u32>,
    pub theme_keywords: Vec<String>,
    pub provider_include: Vec<String>,
    pub provider_exclude: Vec<String>,
    /// True when the animation genre was injected by the cartoon safety net,
    /// which turns it into a hard genre requirement downstream. Internal
    /// bookkeeping, not part of the response shape.
    #[serde(skip)]
    pub forced_animation: bool,
    pub raw_prompt: String,
}

/// A catalog item eligible for recommendation. Exists in memory for the
/// duration of one request; never persisted server-side.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub id: u64,
    pub media_type: MediaType,
    pub title: String,
    pub overview: Option<String>,
    pub genre_ids: Vec<u32>,
    pub vote_average: f64,
    pub vote_count: u64,
    pub popularity: f64,
    /// Release date (movies) or first air date (series), "YYYY-MM-DD"
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
}

impl Candidate {
    pub fn key(&self) -> (MediaType, u64) {
        (self.media_type, self.id)
    }

    /// Release year parsed from the date prefix, if resolvable
    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .and_then(|d| d.get(..4))
            .and_then(|y| y.parse().ok())
    }
}

/// A ranked (candidate id, reason) selection. Index 0 is the top pick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pick {
    pub id: u64,
    pub reason: String,
}

/// The externally returned result shape
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultItem {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub media_type: MediaType,
    pub vote_average: f64,
    pub release_date: Option<String>,
    /// Absolute poster URL, or null when the catalog has no poster
    pub poster_path: Option<String>,
    pub providers: Vec<String>,
    pub reason: String,
}

/// Normalized history record persisted client-side and read back as request
/// input. The service never mutates these lists.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HistoryItem {
    pub id: u64,
    #[serde(default)]
    pub title: String,
    pub media_type: Option<MediaType>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

/// Watched-history record; carries the originating prompt and a 1-10 rating
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WatchedItem {
    #[serde(flatten)]
    pub item: HistoryItem,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(date: Option<&str>) -> Candidate {
        Candidate {
            id: 1,
            media_type: MediaType::Movie,
            title: "Test".to_string(),
            overview: None,
            genre_ids: vec![],
            vote_average: 0.0,
            vote_count: 0,
            popularity: 0.0,
            release_date: date.map(str::to_string),
            poster_path: None,
        }
    }

    #[test]
    fn year_parses_date_prefix() {
        assert_eq!(candidate(Some("1994-06-23")).year(), Some(1994));
        assert_eq!(candidate(Some("2020")).year(), Some(2020));
    }

    #[test]
    fn year_is_none_for_missing_or_garbage_dates() {
        assert_eq!(candidate(None).year(), None);
        assert_eq!(candidate(Some("")).year(), None);
        assert_eq!(candidate(Some("n/a")).year(), None);
    }

    #[test]
    fn media_type_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&MediaType::Movie).unwrap(), r#""movie""#);
        assert_eq!(serde_json::to_string(&MediaType::Tv).unwrap(), r#""tv""#);
    }

    #[test]
    fn target_media_scope_flags() {
        assert!(TargetMedia::Any.wants_movies() && TargetMedia::Any.wants_tv());
        assert!(TargetMedia::Movie.wants_movies() && !TargetMedia::Movie.wants_tv());
        assert!(TargetMedia::Tv.wants_tv() && !TargetMedia::Tv.wants_movies());
    }

    #[test]
    fn intent_serialization_omits_internal_flags() {
        let intent = Intent {
            media_type: TargetMedia::Any,
            search_hint: "cartoons".to_string(),
            search_queries: vec!["cartoons".to_string()],
            kids_mode: false,
            kids_max_age: None,
            niche_mode: false,
            year_min: None,
            year_max: None,
            year_exact: None,
            actor_name: None,
            with_genres: vec![ANIMATION_GENRE],
            without_genres: vec![],
            theme_keywords: vec![],
            provider_include: vec![],
            provider_exclude: vec![],
            forced_animation: true,
            raw_prompt: "cartoons".to_string(),
        };

        let json = serde_json::to_value(&intent).unwrap();
        assert!(json.get("forcedAnimation").is_none());
        assert_eq!(json["mediaType"], "any");
        assert_eq!(json["withGenres"], serde_json::json!([ANIMATION_GENRE]));
    }

    #[test]
    fn watched_item_flattens_history_fields() {
        let json = r#"{"id": 603, "title": "The Matrix", "media_type": "movie", "rating": 9}"#;
        let watched: WatchedItem = serde_json::from_str(json).unwrap();
        assert_eq!(watched.item.id, 603);
        assert_eq!(watched.item.media_type, Some(MediaType::Movie));
        assert_eq!(watched.rating, Some(9));
    }
}
