//! crates/shadowcore_core/src/models.rs
//!
//! The fixed catalog of AI models a user may pick as their preference.

use serde::Serialize;

pub const DEFAULT_MODEL_ID: &str = "claude-opus-4.5";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Anthropic,
    OpenAi,
    Google,
    Meta,
    Mistral,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "anthropic",
            ModelProvider::OpenAi => "openai",
            ModelProvider::Google => "google",
            ModelProvider::Meta => "meta",
            ModelProvider::Mistral => "mistral",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Premium,
    Standard,
    Economy,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Premium => "premium",
            ModelTier::Standard => "standard",
            ModelTier::Economy => "economy",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AiModel {
    pub id: &'static str,
    pub name: &'static str,
    pub provider: ModelProvider,
    pub tier: ModelTier,
    pub context_window: u32,
    pub is_default: bool,
}

pub const AI_MODELS: &[AiModel] = &[
    AiModel {
        id: DEFAULT_MODEL_ID,
        name: "Claude Opus 4.5",
        provider: ModelProvider::Anthropic,
        tier: ModelTier::Premium,
        context_window: 200_000,
        is_default: true,
    },
    AiModel {
        id: "claude-sonnet-4.5",
        name: "Claude Sonnet 4.5",
        provider: ModelProvider::Anthropic,
        tier: ModelTier::Standard,
        context_window: 200_000,
        is_default: false,
    },
    AiModel {
        id: "gpt-5.2",
        name: "GPT-5.2",
        provider: ModelProvider::OpenAi,
        tier: ModelTier::Standard,
        context_window: 128_000,
        is_default: false,
    },
    AiModel {
        id: "o3",
        name: "O3",
        provider: ModelProvider::OpenAi,
        tier: ModelTier::Premium,
        context_window: 128_000,
        is_default: false,
    },
    AiModel {
        id: "gemini-3-pro",
        name: "Gemini 3 Pro",
        provider: ModelProvider::Google,
        tier: ModelTier::Standard,
        context_window: 1_000_000,
        is_default: false,
    },
    AiModel {
        id: "o4-mini",
        name: "O4 Mini",
        provider: ModelProvider::OpenAi,
        tier: ModelTier::Economy,
        context_window: 128_000,
        is_default: false,
    },
];

pub fn find_model(id: &str) -> Option<&'static AiModel> {
    AI_MODELS.iter().find(|m| m.id == id)
}

pub fn is_known_model(id: &str) -> bool {
    find_model(id).is_some()
}

pub fn default_model() -> &'static AiModel {
    // The catalog always carries exactly one default entry.
    AI_MODELS.iter().find(|m| m.is_default).unwrap_or(&AI_MODELS[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_has_single_default_matching_constant() {
        let defaults: Vec<_> = AI_MODELS.iter().filter(|m| m.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(default_model().id, DEFAULT_MODEL_ID);
    }

    #[test]
    fn unknown_ids_are_rejected() {
        assert!(is_known_model("o4-mini"));
        assert!(!is_known_model("not-a-real-model"));
        assert!(!is_known_model(""));
    }

    #[test]
    fn labels_match_serialized_names() {
        for model in AI_MODELS {
            assert_eq!(
                serde_json::to_value(model.provider).unwrap(),
                serde_json::json!(model.provider.as_str())
            );
            assert_eq!(
                serde_json::to_value(model.tier).unwrap(),
                serde_json::json!(model.tier.as_str())
            );
        }
    }
}
