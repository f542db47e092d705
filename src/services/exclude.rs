//! Exclusion expansion.
//!
//! Disliked titles are excluded directly, and each one is expanded through
//! the catalog's similar-titles listing so close relatives disappear too.
//! Expansion is best-effort: a failed lookup for one disliked item simply
//! contributes no expansions.

use std::collections::HashSet;

use crate::models::{HistoryItem, MediaType};
use crate::services::tmdb::MediaSource;

const MAX_DISLIKED: usize = 25;
const MAX_SIMILAR_PER_ITEM: usize = 12;

/// Builds the set of catalog ids to keep out of the pool: explicit request
/// exclusions, disliked ids, and each disliked item's similar-title ids.
pub async fn exclusion_ids(
    media: &dyn MediaSource,
    disliked: &[HistoryItem],
    request_excludes: &[u64],
) -> HashSet<u64> {
    let mut excluded: HashSet<u64> = request_excludes.iter().copied().collect();

    for item in disliked.iter().take(MAX_DISLIKED) {
        excluded.insert(item.id);

        let kind = item.media_type.unwrap_or(MediaType::Movie);
        let similar = media.similar_ids(kind, item.id).await;
        excluded.extend(similar.into_iter().take(MAX_SIMILAR_PER_ITEM));
    }

    excluded
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::tmdb::MockMediaSource;

    fn disliked(id: u64, kind: Option<MediaType>) -> HistoryItem {
        HistoryItem {
            id,
            media_type: kind,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn includes_disliked_similar_and_request_ids() {
        let mut media = MockMediaSource::new();
        media
            .expect_similar_ids()
            .returning(|_, id| if id == 10 { vec![101, 102] } else { vec![] });

        let excluded = exclusion_ids(
            &media,
            &[disliked(10, Some(MediaType::Movie)), disliked(20, None)],
            &[555],
        )
        .await;

        for id in [10, 20, 101, 102, 555] {
            assert!(excluded.contains(&id), "missing {}", id);
        }
    }

    #[tokio::test]
    async fn similar_expansion_is_capped_per_item() {
        let mut media = MockMediaSource::new();
        media
            .expect_similar_ids()
            .returning(|_, _| (1000..1100).collect());

        let excluded = exclusion_ids(&media, &[disliked(1, Some(MediaType::Tv))], &[]).await;

        // 12 similar ids plus the disliked id itself
        assert_eq!(excluded.len(), 13);
    }

    #[tokio::test]
    async fn disliked_list_is_capped() {
        let mut media = MockMediaSource::new();
        media.expect_similar_ids().times(25).returning(|_, _| vec![]);

        let many: Vec<HistoryItem> = (0..40).map(|i| disliked(i, None)).collect();
        let excluded = exclusion_ids(&media, &many, &[]).await;

        assert_eq!(excluded.len(), 25);
    }

    #[tokio::test]
    async fn failed_lookup_contributes_nothing_but_keeps_the_id() {
        // The adapter contract maps failures to an empty list
        let mut media = MockMediaSource::new();
        media.expect_similar_ids().returning(|_, _| vec![]);

        let excluded = exclusion_ids(&media, &[disliked(7, Some(MediaType::Movie))], &[]).await;
        assert!(excluded.contains(&7));
        assert_eq!(excluded.len(), 1);
    }
}
