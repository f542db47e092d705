//! Language-model access.
//!
//! Both model-backed steps (intent extraction, pick ranking) go through the
//! [`ChatModel`] trait so the pipeline never depends on a live model. The
//! model is treated as untrusted and unreliable: any transport failure or
//! unparsable output surfaces as `None`, and callers map `None` onto their
//! heuristic defaults.

use rig::completion::Chat;
use rig::prelude::*;

use crate::config::Config;
use crate::services::intent::RawIntent;

/// A text-in, text-out completion model
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ChatModel: Send + Sync {
    /// Single-turn completion; `None` on any failure or when disabled
    async fn complete(&self, prompt: &str) -> Option<String>;
}

/// [`ChatModel`] backed by OpenRouter. When no API key is configured the
/// model is disabled and every completion returns `None`, leaving the
/// heuristic fallbacks in charge.
pub struct OpenRouterModel {
    agent: Option<rig::agent::Agent<rig::providers::openrouter::CompletionModel>>,
}

impl OpenRouterModel {
    pub fn from_config(config: &Config) -> Self {
        let agent = match &config.openrouter_api_key {
            Some(api_key) => {
                let client = rig::providers::openrouter::Client::new(api_key);
                Some(client.agent(&config.llm_model).build())
            }
            None => {
                tracing::warn!("No OpenRouter API key configured, LLM features disabled");
                None
            }
        };
        Self { agent }
    }
}

#[async_trait::async_trait]
impl ChatModel for OpenRouterModel {
    async fn complete(&self, prompt: &str) -> Option<String> {
        let agent = self.agent.as_ref()?;
        match agent.chat(prompt, vec![]).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::warn!(error = %e, "LLM completion failed");
                None
            }
        }
    }
}

/// Parses a JSON object out of model output, tolerating code fences and
/// surrounding prose. `None` when no object can be decoded.
pub fn parse_json<T: serde::de::DeserializeOwned>(text: &str) -> Option<T> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Asks the model to turn the free-text prompt into Intent-shaped JSON
pub async fn extract_intent(
    model: &dyn ChatModel,
    prompt: &str,
    mood: u8,
    local_hour: Option<u8>,
) -> Option<RawIntent> {
    let hour = local_hour
        .map(|h| h.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let instruction = format!(
        r#"You turn a movie/TV request into strict JSON. Respond with ONLY a JSON object, no prose, with these fields:
mediaType ("movie"|"tv"|"any"), searchHint (string), searchQueries (1-6 strings),
kidsMode (bool), kidsMaxAge (int or null), nicheMode (bool),
yearMin, yearMax, yearExact (ints or null), actorName (string or null),
withGenres, withoutGenres (TMDB genre id arrays), themeKeywords (up to 3 strings),
providerInclude, providerExclude (streaming service name arrays).

User mood on a 1-5 scale: {mood}. Local hour: {hour}.
Request: {prompt}"#
    );

    let reply = model.complete(&instruction).await?;
    let raw = parse_json::<RawIntent>(&reply);
    if raw.is_none() {
        tracing::warn!("Intent extraction output was unparsable, using defaults");
    }
    raw
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn parse_json_handles_bare_object() {
        let parsed: Option<Value> = parse_json(r#"{"a": 1}"#);
        assert_eq!(parsed.unwrap()["a"], 1);
    }

    #[test]
    fn parse_json_strips_code_fences_and_prose() {
        let text = "Sure! Here you go:\n```json\n{\"picks\": []}\n```\nHope that helps.";
        let parsed: Option<Value> = parse_json(text);
        assert!(parsed.unwrap()["picks"].as_array().unwrap().is_empty());
    }

    #[test]
    fn parse_json_rejects_non_json() {
        let parsed: Option<Value> = parse_json("no json here");
        assert!(parsed.is_none());
    }

    #[test]
    fn parse_json_rejects_mismatched_braces() {
        let parsed: Option<Value> = parse_json("} backwards {");
        assert!(parsed.is_none());
    }

    #[tokio::test]
    async fn extract_intent_maps_unavailable_model_to_none() {
        let mut model = MockChatModel::new();
        model.expect_complete().returning(|_| None);
        let raw = extract_intent(&model, "anything", 3, None).await;
        assert!(raw.is_none());
    }

    #[tokio::test]
    async fn extract_intent_parses_fenced_reply() {
        let mut model = MockChatModel::new();
        model.expect_complete().returning(|_| {
            Some("```json\n{\"mediaType\": \"tv\", \"searchQueries\": [\"slow tv\"]}\n```".to_string())
        });
        let raw = extract_intent(&model, "anything", 3, Some(22)).await.unwrap();
        assert_eq!(raw.media_type.as_deref(), Some("tv"));
    }
}
