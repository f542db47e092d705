//! Regional enrichment: certification and content-rating checks.
//!
//! Certification comparisons run on the fixed GB classification ladder.
//! Unknown certifications are permissively allowed: absence of a rating is
//! never grounds for exclusion, only a known-too-high rating is.

use crate::models::{Candidate, MediaType};
use crate::services::tmdb::MediaSource;

/// GB classification ladder, mildest first
const CERT_LADDER: [&str; 6] = ["U", "PG", "12A", "12", "15", "18"];

/// Mature TV ratings rejected in kids mode, matched case-insensitively as
/// substrings against the region's rating string
const TV_MATURE_MARKERS: [&str; 6] = ["TV-MA", "NC-17", "R", "18", "MA15+", "M"];

/// Maps an age ceiling onto the strictest certification still allowed
pub fn gb_max_cert_from_age(age: u8) -> &'static str {
    match age {
        0..=7 => "U",
        8..=11 => "PG",
        12..=13 => "12A",
        14 => "12",
        15..=16 => "15",
        _ => "18",
    }
}

/// Whether a certification is at or below the ceiling on the ladder.
/// Certifications not on the ladder are allowed.
pub fn cert_allowed(cert: &str, max_cert: &str) -> bool {
    let position = |c: &str| CERT_LADDER.iter().position(|&step| step == c);
    match (position(cert), position(max_cert)) {
        (Some(cert_pos), Some(max_pos)) => cert_pos <= max_pos,
        _ => true,
    }
}

/// Whether a TV content rating is acceptable in kids mode. A missing rating
/// is treated as allowed.
pub fn tv_rating_allowed(rating: Option<&str>) -> bool {
    match rating {
        Some(rating) => {
            let upper = rating.to_uppercase();
            !TV_MATURE_MARKERS.iter().any(|marker| upper.contains(marker))
        }
        None => true,
    }
}

/// Resolves whether a candidate passes the kid-safety check for the region.
/// Lookup failures count as "no rating" and therefore pass.
pub async fn kid_safe(
    media: &dyn MediaSource,
    candidate: &Candidate,
    max_cert: &str,
    region: &str,
) -> bool {
    match candidate.media_type {
        MediaType::Movie => {
            let cert = media.movie_certification(candidate.id, region).await;
            match cert {
                Some(cert) => cert_allowed(&cert, max_cert),
                None => true,
            }
        }
        MediaType::Tv => {
            let rating = media.tv_content_rating(candidate.id, region).await;
            tv_rating_allowed(rating.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_ladder_matches_gb_classifications() {
        assert_eq!(gb_max_cert_from_age(5), "U");
        assert_eq!(gb_max_cert_from_age(7), "U");
        assert_eq!(gb_max_cert_from_age(10), "PG");
        assert_eq!(gb_max_cert_from_age(11), "PG");
        assert_eq!(gb_max_cert_from_age(13), "12A");
        assert_eq!(gb_max_cert_from_age(14), "12");
        assert_eq!(gb_max_cert_from_age(16), "15");
        assert_eq!(gb_max_cert_from_age(17), "18");
        assert_eq!(gb_max_cert_from_age(40), "18");
    }

    #[test]
    fn cert_allowed_compares_ladder_positions() {
        assert!(cert_allowed("U", "PG"));
        assert!(cert_allowed("PG", "PG"));
        assert!(!cert_allowed("12A", "PG"));
        assert!(!cert_allowed("15", "PG"));
        assert!(!cert_allowed("18", "15"));
    }

    #[test]
    fn unknown_certifications_are_permissively_allowed() {
        assert!(cert_allowed("G", "PG"));
        assert!(cert_allowed("TBC", "U"));
        assert!(cert_allowed("PG", "unrated"));
    }

    #[test]
    fn tv_rating_denylist_is_substring_and_case_insensitive() {
        assert!(!tv_rating_allowed(Some("TV-MA")));
        assert!(!tv_rating_allowed(Some("tv-ma")));
        assert!(!tv_rating_allowed(Some("MA15+")));
        assert!(!tv_rating_allowed(Some("18")));
        assert!(!tv_rating_allowed(Some("R")));
    }

    #[test]
    fn tv_rating_absent_or_mild_is_allowed() {
        assert!(tv_rating_allowed(None));
        assert!(tv_rating_allowed(Some("TV-PG")));
        assert!(tv_rating_allowed(Some("TV-Y7")));
        assert!(tv_rating_allowed(Some("U")));
    }

    mod lookups {
        use super::*;
        use crate::models::Candidate;
        use crate::services::tmdb::MockMediaSource;

        fn candidate(media_type: MediaType) -> Candidate {
            Candidate {
                id: 100,
                media_type,
                title: "T".to_string(),
                overview: None,
                genre_ids: vec![],
                vote_average: 0.0,
                vote_count: 0,
                popularity: 0.0,
                release_date: None,
                poster_path: None,
            }
        }

        #[tokio::test]
        async fn movie_over_ceiling_is_rejected() {
            let mut media = MockMediaSource::new();
            media
                .expect_movie_certification()
                .returning(|_, _| Some("15".to_string()));
            assert!(!kid_safe(&media, &candidate(MediaType::Movie), "PG", "GB").await);
        }

        #[tokio::test]
        async fn movie_without_certification_is_allowed() {
            let mut media = MockMediaSource::new();
            media.expect_movie_certification().returning(|_, _| None);
            assert!(kid_safe(&media, &candidate(MediaType::Movie), "PG", "GB").await);
        }

        #[tokio::test]
        async fn mature_tv_rating_is_rejected() {
            let mut media = MockMediaSource::new();
            media
                .expect_tv_content_rating()
                .returning(|_, _| Some("TV-MA".to_string()));
            assert!(!kid_safe(&media, &candidate(MediaType::Tv), "PG", "GB").await);
        }
    }
}
