//! Generator interfaces for external text generation.
//!
//! The compliance engine only needs `prompt in, text out`. Generators wrap
//! the external capability (the Fabric CLI or an HTTP chat-completions API)
//! behind one async trait.

pub mod fabric;
pub mod openrouter;

use std::collections::BTreeSet;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::config::{BrandParams, GeneratorBackend, GeneratorConfig};
use crate::domain::SinKind;

pub use fabric::FabricGenerator;
pub use openrouter::OpenRouterGenerator;

/// Sampling temperature when none is configured
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// One regeneration request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    /// Platform the text is written for
    pub platform: String,

    /// Full prompt, including the text to revise
    pub prompt: String,

    /// Sampling temperature
    pub temperature: f64,
}

impl GenerationRequest {
    pub fn new(platform: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            prompt: prompt.into(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }
}

/// Generation errors. The engine keeps the previous text on any of these.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("Generator '{generator}' timed out after {seconds}s")]
    Timeout { generator: String, seconds: u64 },

    #[error("Generator '{generator}' failed: {message}")]
    Failed { generator: String, message: String },

    #[error("Generator '{generator}' returned empty output")]
    Empty { generator: String },
}

/// External text generator
#[async_trait]
pub trait Generator: Send + Sync {
    /// Human-readable generator name
    fn name(&self) -> &str;

    /// Produce revised text for the request
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// Build the configured generator backend
pub fn generator_from_config(config: &GeneratorConfig) -> Result<Box<dyn Generator>> {
    Ok(match config.backend {
        GeneratorBackend::Fabric => Box::new(FabricGenerator::new(config.pattern.clone())),
        GeneratorBackend::Openrouter => Box::new(OpenRouterGenerator::from_env(
            config.model.clone(),
            config.max_retries,
        )?),
    })
}

/// Prompt asking for a rewrite free of the residual patterns
pub fn build_revision_prompt(text: &str, residual: &BTreeSet<SinKind>, brand: &BrandParams) -> String {
    let mut prompt = String::from(
        "Rewrite the following marketing copy so it reads as natural human writing.\n\n",
    );

    if !residual.is_empty() {
        prompt.push_str("It still contains these banned patterns:\n");
        for kind in residual {
            prompt.push_str(&format!("- {}: {}\n", kind.as_str(), kind.description()));
        }
        prompt.push('\n');
    }

    prompt.push_str("Rules:\n");
    prompt.push_str("- Never use em dashes; use commas, periods or separate sentences.\n");
    prompt.push_str("- Never frame a claim as \"not X, but Y\" or \"it's not X; it's Y\". State the claim directly.\n");
    prompt.push_str("- Avoid mirrored phrasing and slogan-style taglines.\n");
    prompt.push_str("- Keep the meaning, facts and length roughly the same.\n");

    if !brand.vocabulary.is_empty() {
        prompt.push_str(&format!("- Keep the brand vocabulary where it fits: {}.\n", brand.vocabulary.join(", ")));
    }

    prompt.push_str("\nReturn only the rewritten text.\n\n---\n");
    prompt.push_str(text);
    prompt.push_str("\n---\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revision_prompt_names_residual_kinds() {
        let residual: BTreeSet<_> = [SinKind::Chiasmus, SinKind::EmDash].into_iter().collect();
        let brand = BrandParams {
            vocabulary: vec!["calm".to_string(), "rigor".to_string()],
            ..BrandParams::default()
        };

        let prompt = build_revision_prompt("Some copy.", &residual, &brand);

        assert!(prompt.contains("- em_dash: Em dash usage creates robotic pauses"));
        assert!(prompt.contains("- chiasmus: Chiasmus creates contrived parallelism"));
        assert!(prompt.find("em_dash:").unwrap() < prompt.find("chiasmus:").unwrap());
        assert!(prompt.contains("calm, rigor"));
        assert!(prompt.contains("---\nSome copy.\n---"));
    }

    #[test]
    fn test_revision_prompt_without_residual() {
        let prompt = build_revision_prompt("x", &BTreeSet::new(), &BrandParams::default());
        assert!(!prompt.contains("banned patterns:"));
        assert!(!prompt.contains("brand vocabulary"));
    }

    #[test]
    fn test_fabric_backend_from_config() {
        let generator = generator_from_config(&GeneratorConfig::default()).unwrap();
        assert_eq!(generator.name(), "fabric");
    }
}
