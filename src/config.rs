//! @ai:module:intent Configuration structs for the evaluation harness
//! @ai:module:layer infrastructure
//! @ai:module:public_api EvalConfig, ApiConfig, RunConfig, PathConfig, LlmConfig, Provider, ModelPricing
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// @ai:intent Main configuration for the evaluation harness
/// @ai:effects pure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalConfig {
    #[serde(default)]
    pub llm: ApiConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathConfig,
}

/// @ai:intent LLM provider selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    Anthropic,
    OpenAi,
}

impl Provider {
    /// @ai:intent Get string representation
    /// @ai:effects pure
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }

    /// @ai:intent Model used when neither the config nor the comparator names one
    /// @ai:effects pure
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-sonnet-4-20250514",
            Provider::OpenAi => "gpt-4o-mini",
        }
    }

    /// @ai:intent Environment variable the CLI reads the API key from
    /// @ai:effects pure
    pub fn api_key_env(&self) -> &'static str {
        match self {
            Provider::Anthropic => "ANTHROPIC_API_KEY",
            Provider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            other => anyhow::bail!("unknown provider: {}", other),
        }
    }
}

/// @ai:intent USD price per million tokens for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPricing {
    /// @ai:intent Create pricing from per-million-token USD prices
    /// @ai:effects pure
    pub fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    /// @ai:intent Look up list prices for well-known models
    /// @ai:effects pure
    pub fn for_model(model: &str) -> Option<Self> {
        let pricing = match model {
            "claude-sonnet-4-20250514" | "claude-3-7-sonnet-20250219" => Self::new(3.0, 15.0),
            "claude-3-5-haiku-20241022" => Self::new(0.8, 4.0),
            "claude-opus-4-20250514" => Self::new(15.0, 75.0),
            "gpt-4o" => Self::new(2.5, 10.0),
            "gpt-4o-mini" => Self::new(0.15, 0.6),
            _ => return None,
        };
        Some(pricing)
    }

    /// @ai:intent Calculate USD cost for a token count
    /// @ai:post result >= 0 for non-negative prices
    /// @ai:effects pure
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_million
            + output_tokens as f64 * self.output_per_million)
            / 1_000_000.0
    }
}

/// @ai:intent API configuration for the LLM client
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default = "default_rate_limit")]
    pub requests_per_minute: u32,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub pricing: Option<ModelPricing>,
}

/// @ai:intent Run configuration for evaluation execution
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Maximum number of test cases evaluated at once
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub dry_run: bool,
}

/// @ai:intent Path configuration for output directories
/// @ai:effects pure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            requests_per_minute: default_rate_limit(),
            base_url: None,
            pricing: None,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            dry_run: false,
        }
    }
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            results_dir: default_results_dir(),
        }
    }
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_rate_limit() -> u32 {
    60
}

fn default_concurrency() -> usize {
    4
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

impl EvalConfig {
    /// @ai:intent Load configuration from a TOML file
    /// @ai:pre path exists and is readable
    /// @ai:effects fs:read
    pub fn load(path: &std::path::Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// @ai:intent Save configuration to a TOML file
    /// @ai:effects fs:write
    pub fn save(&self, path: &std::path::Path) -> anyhow::Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

impl ApiConfig {
    /// @ai:intent Build the run-scoped LLM configuration from file settings and a key
    /// @ai:effects pure
    pub fn to_llm_config(&self, api_key: impl Into<String>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.into(),
            provider: self.provider,
            model: self.model.clone(),
            pricing: self.pricing,
        }
    }
}

/// @ai:intent Credentials and model selection threaded into every LLM call of a run
///
/// Supplied by the caller; the library never reads the environment.
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub provider: Provider,
    pub model: Option<String>,
    pub pricing: Option<ModelPricing>,
}

impl LlmConfig {
    /// @ai:intent Create a configuration with provider defaults
    /// @ai:effects pure
    pub fn new(api_key: impl Into<String>, provider: Provider) -> Self {
        Self {
            api_key: api_key.into(),
            provider,
            model: None,
            pricing: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_pricing(mut self, pricing: ModelPricing) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// @ai:intent Resolve the model, preferring an explicit override
    /// @ai:effects pure
    pub fn model<'a>(&'a self, override_model: Option<&'a str>) -> &'a str {
        override_model
            .or(self.model.as_deref())
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// @ai:intent Resolve pricing for a model
    ///
    /// Explicit pricing covers the configured model only; overrides such as a
    /// cheaper judge model are priced from the list-price table.
    /// @ai:effects pure
    pub fn pricing_for(&self, model: &str) -> Option<ModelPricing> {
        match self.pricing {
            Some(pricing) if model == self.model(None) => Some(pricing),
            _ => ModelPricing::for_model(model),
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"<redacted>")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("pricing", &self.pricing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_toml() {
        let config: EvalConfig = toml::from_str("").unwrap();
        assert_eq!(config.llm.provider, Provider::Anthropic);
        assert_eq!(config.llm.max_tokens, 1024);
        assert_eq!(config.run.concurrency, 4);
        assert_eq!(config.paths.results_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_parse_openai_section() {
        let config: EvalConfig = toml::from_str(
            r#"
[llm]
provider = "openai"
model = "gpt-4o"

[llm.pricing]
input_per_million = 1.0
output_per_million = 2.0

[run]
concurrency = 2
"#,
        )
        .unwrap();
        assert_eq!(config.llm.provider, Provider::OpenAi);
        assert_eq!(config.run.concurrency, 2);

        let llm = config.llm.to_llm_config("sk-test");
        assert_eq!(llm.model(None), "gpt-4o");
        assert_eq!(llm.pricing_for("gpt-4o"), Some(ModelPricing::new(1.0, 2.0)));
    }

    #[test]
    fn test_explicit_pricing_covers_configured_model_only() {
        let llm = LlmConfig::new("key", Provider::Anthropic).with_pricing(ModelPricing::new(1.0, 2.0));
        assert_eq!(
            llm.pricing_for("claude-sonnet-4-20250514"),
            Some(ModelPricing::new(1.0, 2.0))
        );
        assert_eq!(
            llm.pricing_for("claude-3-5-haiku-20241022"),
            Some(ModelPricing::new(0.8, 4.0))
        );
        assert_eq!(llm.pricing_for("in-house-judge"), None);

        let llm = llm.with_model("gpt-4o");
        assert_eq!(llm.pricing_for("gpt-4o"), Some(ModelPricing::new(1.0, 2.0)));
        assert_eq!(llm.pricing_for("claude-sonnet-4-20250514"), Some(ModelPricing::new(3.0, 15.0)));
    }

    #[test]
    fn test_model_resolution_order() {
        let llm = LlmConfig::new("key", Provider::Anthropic);
        assert_eq!(llm.model(None), "claude-sonnet-4-20250514");
        assert_eq!(llm.model(Some("claude-3-5-haiku-20241022")), "claude-3-5-haiku-20241022");

        let llm = llm.with_model("claude-opus-4-20250514");
        assert_eq!(llm.model(None), "claude-opus-4-20250514");
    }

    #[test]
    fn test_pricing_cost() {
        let pricing = ModelPricing::new(3.0, 15.0);
        let cost = pricing.cost(1_000, 200);
        assert!((cost - 0.006).abs() < 1e-12);
        assert_eq!(ModelPricing::for_model("unknown-model"), None);
    }

    #[test]
    fn test_debug_redacts_api_key() {
        let llm = LlmConfig::new("sk-secret", Provider::OpenAi);
        let debug = format!("{:?}", llm);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("redacted"));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert!("mistral".parse::<Provider>().is_err());
    }
}
