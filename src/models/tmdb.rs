//! Raw TMDB wire types.
//!
//! Listing endpoints (search/discover/trending/popular) all share the same
//! paged envelope; detail endpoints have their own shapes. Everything is
//! deserialized leniently: missing numeric fields default to zero rather
//! than failing the whole page.

use serde::{Deserialize, Serialize};

use super::{Candidate, MediaType};

/// Paged listing envelope returned by search/discover/trending/popular
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ListingResponse {
    #[serde(default)]
    pub results: Vec<ListingItem>,
}

/// One row of a listing response. Movies carry `title`/`release_date`,
/// series carry `name`/`first_air_date`; multi search additionally carries
/// an explicit `media_type` discriminator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ListingItem {
    pub id: u64,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub genre_ids: Vec<u32>,
    #[serde(default)]
    pub vote_average: f64,
    #[serde(default)]
    pub vote_count: u64,
    #[serde(default)]
    pub popularity: f64,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl ListingItem {
    /// Resolves this row into a [`Candidate`] with an explicit media type.
    ///
    /// Resolution order: the row's own `media_type` discriminator, then the
    /// kind implied by the endpoint it came from, then inference from which
    /// title field is present. Rows resolving to neither (e.g. `person`
    /// rows in multi search) are dropped.
    pub fn into_candidate(self, endpoint_kind: Option<MediaType>) -> Option<Candidate> {
        let media_type = match self.media_type.as_deref() {
            Some("movie") => Some(MediaType::Movie),
            Some("tv") => Some(MediaType::Tv),
            Some(_) => None,
            None => endpoint_kind.or(match (&self.title, &self.name) {
                (Some(_), None) => Some(MediaType::Movie),
                (None, Some(_)) => Some(MediaType::Tv),
                _ => None,
            }),
        }?;

        let title = match media_type {
            MediaType::Movie => self.title.or(self.name),
            MediaType::Tv => self.name.or(self.title),
        }?;

        Some(Candidate {
            id: self.id,
            media_type,
            title,
            overview: self.overview.filter(|o| !o.is_empty()),
            genre_ids: self.genre_ids,
            vote_average: self.vote_average,
            vote_count: self.vote_count,
            popularity: self.popularity,
            release_date: match media_type {
                MediaType::Movie => self.release_date.or(self.first_air_date),
                MediaType::Tv => self.first_air_date.or(self.release_date),
            }
            .filter(|d| !d.is_empty()),
            poster_path: self.poster_path,
        })
    }
}

/// GET /movie/{id}/release_dates
#[derive(Debug, Deserialize, Default)]
pub struct ReleaseDatesResponse {
    #[serde(default)]
    pub results: Vec<RegionReleaseDates>,
}

#[derive(Debug, Deserialize)]
pub struct RegionReleaseDates {
    pub iso_3166_1: String,
    #[serde(default)]
    pub release_dates: Vec<ReleaseDate>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseDate {
    #[serde(default)]
    pub certification: String,
}

impl ReleaseDatesResponse {
    /// First non-empty certification string for the target region
    pub fn certification_for(&self, region: &str) -> Option<String> {
        self.results
            .iter()
            .find(|r| r.iso_3166_1 == region)?
            .release_dates
            .iter()
            .map(|rd| rd.certification.trim())
            .find(|c| !c.is_empty())
            .map(str::to_string)
    }
}

/// GET /tv/{id}/content_ratings
#[derive(Debug, Deserialize, Default)]
pub struct ContentRatingsResponse {
    #[serde(default)]
    pub results: Vec<RegionContentRating>,
}

#[derive(Debug, Deserialize)]
pub struct RegionContentRating {
    pub iso_3166_1: String,
    #[serde(default)]
    pub rating: String,
}

impl ContentRatingsResponse {
    pub fn rating_for(&self, region: &str) -> Option<String> {
        self.results
            .iter()
            .find(|r| r.iso_3166_1 == region)
            .map(|r| r.rating.clone())
            .filter(|r| !r.is_empty())
    }
}

/// GET /{movie|tv}/{id}/watch/providers
#[derive(Debug, Deserialize, Default)]
pub struct WatchProvidersResponse {
    #[serde(default)]
    pub results: std::collections::HashMap<String, RegionProviders>,
}

#[derive(Debug, Deserialize, Default)]
pub struct RegionProviders {
    #[serde(default)]
    pub flatrate: Vec<ProviderEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ProviderEntry {
    pub provider_name: String,
}

impl WatchProvidersResponse {
    /// Subscription ("flatrate") provider names for the target region
    pub fn flatrate_for(&self, region: &str) -> Vec<String> {
        self.results
            .get(region)
            .map(|r| r.flatrate.iter().map(|p| p.provider_name.clone()).collect())
            .unwrap_or_default()
    }
}

/// GET /search/person and /search/keyword share this shape for our purposes
#[derive(Debug, Deserialize, Default)]
pub struct IdSearchResponse {
    #[serde(default)]
    pub results: Vec<IdSearchResult>,
}

#[derive(Debug, Deserialize)]
pub struct IdSearchResult {
    pub id: u64,
}
