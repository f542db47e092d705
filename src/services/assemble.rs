//! Result assembly.
//!
//! Maps ranked picks onto enriched candidates under the request constraints,
//! with an explicit fallback ladder:
//!
//! 1. strict pass — provider filters enforced
//! 2. relaxed pass — when the strict pass yields under three results, the
//!    same walk re-runs without provider filters; relaxed-only items are
//!    tagged in their reason
//! 3. backfill — when both passes yield nothing, the top-scored pool
//!    candidates go out verbatim
//!
//! Pool-empty and total-failure fallbacks live one level up, in the
//! orchestrator. Given a non-empty pool, this module always returns
//! at least one result.

use std::collections::HashMap;

use crate::models::{Candidate, Intent, MediaType, Pick, ResultItem, ANIMATION_GENRE};
use crate::services::enrich::{gb_max_cert_from_age, kid_safe};
use crate::services::tmdb::MediaSource;

pub const MAX_RESULTS: usize = 6;
const MAX_ATTEMPTS: usize = 25;
/// Below this strict-pass yield, the relaxed pass kicks in
const RELAX_THRESHOLD: usize = 3;

pub const RELAXED_SUFFIX: &str = " (Provider filter relaxed)";
pub const BACKFILL_REASON: &str = "Closest match we could find for your prompt";

/// Per-request assembly context
pub struct Assembler<'a> {
    pub media: &'a dyn MediaSource,
    pub intent: &'a Intent,
    pub provider_include: &'a [String],
    pub provider_exclude: &'a [String],
    pub region: &'a str,
    pub image_base_url: &'a str,
}

impl<'a> Assembler<'a> {
    /// Builds up to [`MAX_RESULTS`] result items from ranked picks
    pub async fn assemble(&self, picks: &[Pick], pool: &[Candidate]) -> Vec<ResultItem> {
        // First occurrence wins: the pool is in score order and ids can
        // repeat across media types
        let mut by_id: HashMap<u64, &Candidate> = HashMap::new();
        for candidate in pool {
            by_id.entry(candidate.id).or_insert(candidate);
        }

        let strict = self.run_pass(picks, &by_id, true).await;
        if strict.len() >= RELAX_THRESHOLD {
            return strict;
        }

        tracing::debug!(
            strict_count = strict.len(),
            "Strict pass came up short, relaxing provider filters"
        );
        let relaxed = self.run_pass(picks, &by_id, false).await;
        let merged = merge_passes(strict, relaxed);
        if !merged.is_empty() {
            return merged;
        }

        tracing::debug!("Both passes empty, backfilling from pool head");
        self.backfill(pool)
    }

    /// One walk over the picks in rank order, skipping anything that fails a
    /// retained constraint. `enforce_providers` is the only difference
    /// between the strict and relaxed passes.
    async fn run_pass(
        &self,
        picks: &[Pick],
        by_id: &HashMap<u64, &Candidate>,
        enforce_providers: bool,
    ) -> Vec<ResultItem> {
        let mut results = Vec::new();

        for pick in picks.iter().take(MAX_ATTEMPTS) {
            if results.len() >= MAX_RESULTS {
                break;
            }
            let Some(&candidate) = by_id.get(&pick.id) else {
                continue;
            };

            if let (Some(required), Some(year)) = (self.intent.year_exact, candidate.year()) {
                if year != required {
                    continue;
                }
            }
            if self.intent.forced_animation && !candidate.genre_ids.contains(&ANIMATION_GENRE) {
                continue;
            }
            if self.intent.kids_mode {
                let max_cert = gb_max_cert_from_age(self.intent.kids_max_age.unwrap_or(11));
                if !kid_safe(self.media, candidate, max_cert, self.region).await {
                    continue;
                }
            }

            let providers = self
                .media
                .watch_providers(candidate.media_type, candidate.id, self.region)
                .await;
            if enforce_providers
                && !providers_pass(&providers, self.provider_include, self.provider_exclude)
            {
                continue;
            }

            results.push(self.result_item(candidate, providers, pick.reason.clone()));
        }

        results
    }

    /// Last resort for a non-empty pool: its top-scored candidates verbatim
    fn backfill(&self, pool: &[Candidate]) -> Vec<ResultItem> {
        pool.iter()
            .take(MAX_RESULTS)
            .map(|candidate| {
                self.result_item(candidate, Vec::new(), BACKFILL_REASON.to_string())
            })
            .collect()
    }

    fn result_item(
        &self,
        candidate: &Candidate,
        providers: Vec<String>,
        reason: String,
    ) -> ResultItem {
        ResultItem {
            id: candidate.id,
            title: candidate.title.clone(),
            overview: candidate.overview.clone(),
            media_type: candidate.media_type,
            vote_average: candidate.vote_average,
            release_date: candidate.release_date.clone(),
            poster_path: candidate
                .poster_path
                .as_deref()
                .map(|path| format!("{}{}", self.image_base_url, path)),
            providers,
            reason,
        }
    }
}

/// Include is permitting (any provider matches any included name), exclude
/// is vetoing (any provider matches any excluded name). Both checked
/// independently, both must pass. Matching is case-insensitive.
pub fn providers_pass(providers: &[String], include: &[String], exclude: &[String]) -> bool {
    let matches = |provider: &str, name: &str| provider.eq_ignore_ascii_case(name);

    if !include.is_empty()
        && !providers
            .iter()
            .any(|p| include.iter().any(|name| matches(p, name)))
    {
        return false;
    }

    !providers
        .iter()
        .any(|p| exclude.iter().any(|name| matches(p, name)))
}

/// Merges strict and relaxed results by (media_type, id); relaxed-only items
/// get the relaxation suffix exactly once.
fn merge_passes(strict: Vec<ResultItem>, relaxed: Vec<ResultItem>) -> Vec<ResultItem> {
    let mut seen: std::collections::HashSet<(MediaType, u64)> = strict
        .iter()
        .map(|item| (item.media_type, item.id))
        .collect();
    let mut merged = strict;

    for mut item in relaxed {
        if merged.len() >= MAX_RESULTS {
            break;
        }
        if !seen.insert((item.media_type, item.id)) {
            continue;
        }
        if !item.reason.ends_with(RELAXED_SUFFIX) {
            item.reason.push_str(RELAXED_SUFFIX);
        }
        merged.push(item);
    }

    merged.truncate(MAX_RESULTS);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TargetMedia;
    use crate::services::tmdb::MockMediaSource;

    fn intent() -> Intent {
        Intent {
            media_type: TargetMedia::Any,
            search_hint: "h".to_string(),
            search_queries: vec!["h".to_string()],
            kids_mode: false,
            kids_max_age: None,
            niche_mode: false,
            year_min: None,
            year_max: None,
            year_exact: None,
            actor_name: None,
            with_genres: vec![],
            without_genres: vec![],
            theme_keywords: vec![],
            provider_include: vec![],
            provider_exclude: vec![],
            forced_animation: false,
            raw_prompt: "h".to_string(),
        }
    }

    fn candidate(id: u64) -> Candidate {
        Candidate {
            id,
            media_type: MediaType::Movie,
            title: format!("Movie {}", id),
            overview: None,
            genre_ids: vec![],
            vote_average: 7.0,
            vote_count: 100,
            popularity: 10.0,
            release_date: Some("2005-03-01".to_string()),
            poster_path: Some("/poster.jpg".to_string()),
        }
    }

    fn picks(ids: &[u64]) -> Vec<Pick> {
        ids.iter()
            .map(|&id| Pick {
                id,
                reason: format!("reason {}", id),
            })
            .collect()
    }

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn provider_include_is_permitting_and_case_insensitive() {
        let providers = strings(&["NETFLIX", "Now TV"]);
        assert!(providers_pass(&providers, &strings(&["netflix"]), &[]));
        assert!(!providers_pass(&providers, &strings(&["Disney+"]), &[]));
        // no include constraint passes anything
        assert!(providers_pass(&providers, &[], &[]));
    }

    #[test]
    fn provider_exclude_is_vetoing() {
        let providers = strings(&["Netflix", "Disney+"]);
        assert!(!providers_pass(&providers, &[], &strings(&["disney+"])));
        assert!(!providers_pass(
            &providers,
            &strings(&["Netflix"]),
            &strings(&["Disney+"])
        ));
        assert!(providers_pass(&providers, &[], &strings(&["Apple TV+"])));
    }

    #[test]
    fn relaxation_suffix_is_appended_exactly_once() {
        let strict = vec![];
        let mut item = ResultItem {
            id: 1,
            title: "T".to_string(),
            overview: None,
            media_type: MediaType::Movie,
            vote_average: 7.0,
            release_date: None,
            poster_path: None,
            providers: vec![],
            reason: format!("already tagged{}", RELAXED_SUFFIX),
        };
        let merged = merge_passes(strict, vec![item.clone()]);
        assert_eq!(merged[0].reason.matches(RELAXED_SUFFIX).count(), 1);

        item.reason = "fresh".to_string();
        let merged = merge_passes(vec![], vec![item]);
        assert_eq!(merged[0].reason, format!("fresh{}", RELAXED_SUFFIX));
    }

    #[test]
    fn merge_dedupes_by_media_type_and_id() {
        let strict = vec![ResultItem {
            id: 1,
            title: "A".to_string(),
            overview: None,
            media_type: MediaType::Movie,
            vote_average: 7.0,
            release_date: None,
            poster_path: None,
            providers: vec![],
            reason: "strict".to_string(),
        }];
        let relaxed = vec![
            strict[0].clone(),
            ResultItem {
                id: 1,
                media_type: MediaType::Tv,
                ..strict[0].clone()
            },
        ];
        let merged = merge_passes(strict, relaxed);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].reason, "strict");
        assert!(merged[1].reason.ends_with(RELAXED_SUFFIX));
    }

    #[tokio::test]
    async fn strict_pass_enforces_provider_include() {
        let mut media = MockMediaSource::new();
        media
            .expect_watch_providers()
            .returning(|_, id, _| match id {
                1 => vec!["Disney+".to_string()],
                _ => vec!["Netflix".to_string()],
            });

        let intent = intent();
        let include = strings(&["Netflix"]);
        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &include,
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let pool: Vec<Candidate> = (1..=5).map(candidate).collect();
        let results = assembler.assemble(&picks(&[1, 2, 3, 4]), &pool).await;

        // Candidate 1 is Disney+-only and fails strict; 2-4 pass
        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.id != 1));
    }

    #[tokio::test]
    async fn relaxed_pass_recovers_provider_mismatches_with_tag() {
        let mut media = MockMediaSource::new();
        media
            .expect_watch_providers()
            .returning(|_, _, _| vec!["Disney+".to_string()]);

        let intent = intent();
        let include = strings(&["Netflix"]);
        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &include,
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let pool: Vec<Candidate> = (1..=3).map(candidate).collect();
        let results = assembler.assemble(&picks(&[1, 2]), &pool).await;

        assert_eq!(results.len(), 2);
        for item in &results {
            assert_eq!(item.reason.matches(RELAXED_SUFFIX).count(), 1);
        }
    }

    #[tokio::test]
    async fn kids_mode_excludes_over_certified_movies_in_both_passes() {
        let mut media = MockMediaSource::new();
        media
            .expect_movie_certification()
            .returning(|id, _| match id {
                1 => Some("15".to_string()),
                2 => None, // unresolved certification passes
                _ => Some("U".to_string()),
            });
        media.expect_watch_providers().returning(|_, _, _| vec![]);

        let mut intent = intent();
        intent.kids_mode = true;
        intent.kids_max_age = Some(10);

        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &[],
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let pool: Vec<Candidate> = (1..=3).map(candidate).collect();
        let results = assembler.assemble(&picks(&[1, 2, 3]), &pool).await;

        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn exact_year_mismatch_is_skipped_but_unknown_year_passes() {
        let mut media = MockMediaSource::new();
        media.expect_watch_providers().returning(|_, _, _| vec![]);

        let mut intent = intent();
        intent.year_exact = Some(1994);

        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &[],
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let mut pool = vec![candidate(1), candidate(2)];
        pool[0].release_date = Some("1995-01-01".to_string());
        pool[1].release_date = None;

        let results = assembler.assemble(&picks(&[1, 2]), &pool).await;
        let ids: Vec<u64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2]);
    }

    #[tokio::test]
    async fn backfill_returns_pool_head_when_no_pick_lands() {
        let media = MockMediaSource::new();
        let intent = intent();
        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &[],
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let pool: Vec<Candidate> = (1..=10).map(candidate).collect();
        // None of the pick ids exist in the pool
        let results = assembler.assemble(&picks(&[900, 901]), &pool).await;

        assert_eq!(results.len(), MAX_RESULTS);
        assert_eq!(results[0].id, 1);
        assert!(results.iter().all(|r| r.reason == BACKFILL_REASON));
        assert!(results.iter().all(|r| r.providers.is_empty()));
    }

    #[tokio::test]
    async fn poster_paths_resolve_to_absolute_urls() {
        let mut media = MockMediaSource::new();
        media.expect_watch_providers().returning(|_, _, _| vec![]);

        let intent = intent();
        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &[],
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test/w500",
        };

        let pool = vec![candidate(1)];
        let results = assembler.assemble(&picks(&[1]), &pool).await;
        assert_eq!(
            results[0].poster_path.as_deref(),
            Some("https://img.test/w500/poster.jpg")
        );
    }

    #[tokio::test]
    async fn results_are_capped_at_six() {
        let mut media = MockMediaSource::new();
        media.expect_watch_providers().returning(|_, _, _| vec![]);

        let intent = intent();
        let assembler = Assembler {
            media: &media,
            intent: &intent,
            provider_include: &[],
            provider_exclude: &[],
            region: "GB",
            image_base_url: "https://img.test",
        };

        let pool: Vec<Candidate> = (1..=20).map(candidate).collect();
        let ids: Vec<u64> = (1..=20).collect();
        let results = assembler.assemble(&picks(&ids), &pool).await;
        assert_eq!(results.len(), MAX_RESULTS);
    }
}
