use std::sync::Arc;

use crate::{
    config::Config,
    services::{gather::Tuning, llm::ChatModel, tmdb::MediaSource},
};

/// Shared application state: the two external collaborators behind their
/// trait seams, plus the request-independent knobs the pipeline needs.
/// Nothing in here is mutated by requests.
#[derive(Clone)]
pub struct AppState {
    pub media: Arc<dyn MediaSource>,
    pub model: Arc<dyn ChatModel>,
    pub tuning: Tuning,
    pub image_base_url: String,
    pub default_region: String,
}

impl AppState {
    pub fn new(media: Arc<dyn MediaSource>, model: Arc<dyn ChatModel>, config: &Config) -> Self {
        Self {
            media,
            model,
            tuning: Tuning::default(),
            image_base_url: config.image_base_url.clone(),
            default_region: config.default_region.clone(),
        }
    }

    #[cfg(test)]
    pub fn for_tests(media: Arc<dyn MediaSource>, model: Arc<dyn ChatModel>) -> Self {
        Self {
            media,
            model,
            tuning: Tuning::default(),
            image_base_url: "https://img.test/w500".to_string(),
            default_region: "GB".to_string(),
        }
    }
}
