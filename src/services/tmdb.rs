//! TMDB adapter.
//!
//! Wraps the catalog API behind the [`MediaSource`] trait so the pipeline can
//! run against a mock in tests. Listing endpoints read through the short-TTL
//! cache; per-title lookups (certification, ratings, providers, similar) and
//! id resolution (person, keyword) read through the long-TTL cache.
//!
//! Failure model: a 5xx from the catalog soft-fails to empty data for that
//! one call, a 4xx aborts the request. Per-title lookups never fail at all;
//! any error degrades to absent data for that title.

use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;

use crate::{
    cache::{CacheKey, TtlCache},
    cached,
    config::Config,
    error::{AppError, AppResult},
    models::{
        tmdb::{
            ContentRatingsResponse, IdSearchResponse, ListingItem, ListingResponse,
            ReleaseDatesResponse, WatchProvidersResponse,
        },
        MediaType,
    },
};

/// Which text-search endpoint to hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchScope {
    Movie,
    Tv,
    Multi,
}

impl SearchScope {
    fn path(&self) -> &'static str {
        match self {
            SearchScope::Movie => "search/movie",
            SearchScope::Tv => "search/tv",
            SearchScope::Multi => "search/multi",
        }
    }

    /// Media type implied by the endpoint, when it only returns one kind
    pub fn implied_kind(&self) -> Option<MediaType> {
        match self {
            SearchScope::Movie => Some(MediaType::Movie),
            SearchScope::Tv => Some(MediaType::Tv),
            SearchScope::Multi => None,
        }
    }
}

/// Constraints for a discovery (filtered listing) query
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiscoverFilters {
    pub certification_country: Option<String>,
    /// Inclusive certification ceiling, e.g. "PG"
    pub certification_max: Option<String>,
    pub with_genres: Vec<u32>,
    pub without_genres: Vec<u32>,
    pub year_min: Option<i32>,
    pub year_max: Option<i32>,
    pub min_vote_count: u64,
    /// Ascending popularity surfaces less mainstream titles (niche mode)
    pub sort_ascending: bool,
    pub with_cast: Option<u64>,
    pub with_keywords: Vec<u64>,
}

/// Catalog access used by the recommendation pipeline
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MediaSource: Send + Sync {
    /// Text search, one page of raw listing rows
    async fn search(&self, scope: SearchScope, query: &str, page: u32)
        -> AppResult<Vec<ListingItem>>;

    /// Constrained discovery, one page of raw listing rows
    async fn discover(
        &self,
        kind: MediaType,
        filters: &DiscoverFilters,
        page: u32,
    ) -> AppResult<Vec<ListingItem>>;

    /// Cross-media trending listing (pool-empty fallback)
    async fn trending(&self) -> AppResult<Vec<ListingItem>>;

    /// Popular movies listing (pool-empty fallback after trending)
    async fn popular(&self) -> AppResult<Vec<ListingItem>>;

    /// Best-effort person name -> catalog person id
    async fn person_id(&self, name: &str) -> Option<u64>;

    /// Best-effort keyword text -> catalog keyword id
    async fn keyword_id(&self, word: &str) -> Option<u64>;

    /// Best-effort similar-title ids for one catalog item
    async fn similar_ids(&self, kind: MediaType, id: u64) -> Vec<u64>;

    /// Regional movie certification, None when unresolvable
    async fn movie_certification(&self, id: u64, region: &str) -> Option<String>;

    /// Regional TV content rating, None when unresolvable
    async fn tv_content_rating(&self, id: u64, region: &str) -> Option<String>;

    /// Regional subscription provider names, empty on any failure
    async fn watch_providers(&self, kind: MediaType, id: u64, region: &str) -> Vec<String>;
}

/// [`MediaSource`] implementation backed by the TMDB v3 API
#[derive(Clone)]
pub struct TmdbClient {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    listing_cache: TtlCache,
    lookup_cache: TtlCache,
}

impl TmdbClient {
    pub fn new(config: &Config, listing_cache: TtlCache, lookup_cache: TtlCache) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key: config.tmdb_api_key.clone(),
            api_url: config.tmdb_api_url.clone(),
            listing_cache,
            lookup_cache,
        }
    }

    /// Issues a GET and decodes the body.
    ///
    /// Returns `Ok(None)` on a server error (soft fail) and
    /// `Err(AppError::Upstream)` on any other non-success status.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<Option<T>> {
        let url = format!("{}/{}", self.api_url, path);

        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() {
            tracing::warn!(path = %path, status = %status, "Catalog server error, degrading to empty");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(path = %path, status = %status, body = %body, "Catalog request failed");
            return Err(AppError::Upstream(format!(
                "catalog returned status {}",
                status
            )));
        }

        let value = response.json::<T>().await.map_err(|e| {
            AppError::Upstream(format!("catalog response decode failed: {}", e))
        })?;
        Ok(Some(value))
    }

    /// Cached listing fetch; the cache key is the path plus query pairs
    async fn listing(&self, path: &str, params: &[(&str, String)]) -> AppResult<Vec<ListingItem>> {
        let mut key = path.to_string();
        for (name, value) in params {
            key.push_str(&format!("&{}={}", name, value));
        }
        let key = CacheKey::Listing(key);

        cached!(self.listing_cache, key, async {
            let response: Option<ListingResponse> = self.fetch(path, params).await?;
            Ok::<_, AppError>(response.unwrap_or_default().results)
        })
    }

    /// Cached lookup that swallows every failure into the default value.
    /// Only resolved outcomes are cached; a transient error is retried on
    /// the next request rather than pinning absent data for the full TTL.
    async fn lookup<T, F>(&self, key: CacheKey, fetch: F) -> T
    where
        T: serde::Serialize + DeserializeOwned + Default,
        F: std::future::Future<Output = AppResult<Option<T>>>,
    {
        if let Ok(Some(cached)) = self.lookup_cache.get::<T>(&key).await {
            return cached;
        }

        let value = match fetch.await {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Lookup failed, treating as absent");
                return T::default();
            }
        };

        self.lookup_cache.set(&key, &value).await;
        value
    }

    fn discover_params(kind: MediaType, filters: &DiscoverFilters, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("page", page.to_string()),
            (
                "sort_by",
                if filters.sort_ascending {
                    "popularity.asc".to_string()
                } else {
                    "popularity.desc".to_string()
                },
            ),
            ("vote_count.gte", filters.min_vote_count.to_string()),
        ];

        if !filters.with_genres.is_empty() {
            params.push(("with_genres", join_ids(&filters.with_genres)));
        }
        if !filters.without_genres.is_empty() {
            params.push(("without_genres", join_ids(&filters.without_genres)));
        }
        if !filters.with_keywords.is_empty() {
            params.push(("with_keywords", join_ids(&filters.with_keywords)));
        }

        let (date_min, date_max) = match kind {
            MediaType::Movie => ("primary_release_date.gte", "primary_release_date.lte"),
            MediaType::Tv => ("first_air_date.gte", "first_air_date.lte"),
        };
        if let Some(year) = filters.year_min {
            params.push((date_min, format!("{}-01-01", year)));
        }
        if let Some(year) = filters.year_max {
            params.push((date_max, format!("{}-12-31", year)));
        }

        // Certification and cast filters are only honored for movie discovery
        if kind == MediaType::Movie {
            if let (Some(country), Some(max)) = (
                filters.certification_country.as_ref(),
                filters.certification_max.as_ref(),
            ) {
                params.push(("certification_country", country.clone()));
                params.push(("certification.lte", max.clone()));
            }
            if let Some(person) = filters.with_cast {
                params.push(("with_cast", person.to_string()));
            }
        }

        params
    }
}

fn join_ids<T: ToString>(ids: &[T]) -> String {
    ids.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait::async_trait]
impl MediaSource for TmdbClient {
    async fn search(
        &self,
        scope: SearchScope,
        query: &str,
        page: u32,
    ) -> AppResult<Vec<ListingItem>> {
        self.listing(
            scope.path(),
            &[
                ("query", query.to_string()),
                ("page", page.to_string()),
                ("include_adult", "false".to_string()),
            ],
        )
        .await
    }

    async fn discover(
        &self,
        kind: MediaType,
        filters: &DiscoverFilters,
        page: u32,
    ) -> AppResult<Vec<ListingItem>> {
        let path = match kind {
            MediaType::Movie => "discover/movie",
            MediaType::Tv => "discover/tv",
        };
        self.listing(path, &Self::discover_params(kind, filters, page))
            .await
    }

    async fn trending(&self) -> AppResult<Vec<ListingItem>> {
        self.listing("trending/all/week", &[]).await
    }

    async fn popular(&self) -> AppResult<Vec<ListingItem>> {
        self.listing("movie/popular", &[]).await
    }

    async fn person_id(&self, name: &str) -> Option<u64> {
        let key = CacheKey::Person(name.to_string());
        let ids: Vec<u64> = self
            .lookup(key, async {
                let response: Option<IdSearchResponse> = self
                    .fetch("search/person", &[("query", name.to_string())])
                    .await?;
                Ok(response.map(|r| r.results.into_iter().map(|p| p.id).take(1).collect()))
            })
            .await;
        ids.first().copied()
    }

    async fn keyword_id(&self, word: &str) -> Option<u64> {
        let key = CacheKey::Keyword(word.to_string());
        let ids: Vec<u64> = self
            .lookup(key, async {
                let response: Option<IdSearchResponse> = self
                    .fetch("search/keyword", &[("query", word.to_string())])
                    .await?;
                Ok(response.map(|r| r.results.into_iter().map(|k| k.id).take(1).collect()))
            })
            .await;
        ids.first().copied()
    }

    async fn similar_ids(&self, kind: MediaType, id: u64) -> Vec<u64> {
        let key = CacheKey::Similar {
            kind: kind.to_string(),
            id,
        };
        self.lookup(key, async {
            let path = format!("{}/{}/similar", kind, id);
            let response: Option<ListingResponse> = self.fetch(&path, &[]).await?;
            Ok(response.map(|r| r.results.into_iter().map(|item| item.id).collect()))
        })
        .await
    }

    async fn movie_certification(&self, id: u64, region: &str) -> Option<String> {
        let key = CacheKey::Certification {
            region: region.to_string(),
            id,
        };
        self.lookup(key, async {
            let path = format!("movie/{}/release_dates", id);
            let response: Option<ReleaseDatesResponse> = self.fetch(&path, &[]).await?;
            Ok(response.map(|r| r.certification_for(region)))
        })
        .await
    }

    async fn tv_content_rating(&self, id: u64, region: &str) -> Option<String> {
        let key = CacheKey::TvRating {
            region: region.to_string(),
            id,
        };
        self.lookup(key, async {
            let path = format!("tv/{}/content_ratings", id);
            let response: Option<ContentRatingsResponse> = self.fetch(&path, &[]).await?;
            Ok(response.map(|r| r.rating_for(region)))
        })
        .await
    }

    async fn watch_providers(&self, kind: MediaType, id: u64, region: &str) -> Vec<String> {
        let key = CacheKey::Providers {
            kind: kind.to_string(),
            region: region.to_string(),
            id,
        };
        self.lookup(key, async {
            let path = format!("{}/{}/watch/providers", kind, id);
            let response: Option<WatchProvidersResponse> = self.fetch(&path, &[]).await?;
            Ok(response.map(|r| r.flatrate_for(region)))
        })
        .await
    }
}
