//! @ai:module:intent LLM-judged semantic comparison of one field
//! @ai:module:layer application
//! @ai:module:public_api LlmCompare, LlmComparator, default_judge_prompt
//! @ai:module:stateless true

use crate::config::LlmConfig;
use crate::metrics::Verdict;
use crate::runner::client::{extract_json, LlmClientTrait, LlmRequest, LlmResponse};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// @ai:intent Prompt settings of an LLM comparator
///
/// Holds no credentials; the run's `LlmConfig` is supplied when the comparator is invoked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmCompare {
    #[serde(default = "default_judge_prompt")]
    pub system_prompt: String,
    /// Overrides the run's model for this comparator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for LlmCompare {
    fn default() -> Self {
        Self {
            system_prompt: default_judge_prompt(),
            model: None,
        }
    }
}

impl LlmCompare {
    pub fn with_prompt(system_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// @ai:intent Default system prompt for semantic equivalence judgments
/// @ai:effects pure
pub fn default_judge_prompt() -> String {
    "You are grading the output of a document extraction system. Decide whether the \
     actual value carries the same meaning as the expected value for the named field. \
     Ignore differences in formatting, casing, abbreviation and word order that do not \
     change the meaning. Treat missing or contradicting information as a failure."
        .to_string()
}

/// @ai:intent Structured judgment returned by the model
#[derive(Debug, Deserialize)]
struct Judgment {
    passed: bool,
    #[serde(default)]
    rationale: String,
}

/// @ai:intent Adapter that turns a model call into a verdict
pub struct LlmComparator<'a, C: LlmClientTrait> {
    client: &'a C,
    config: &'a LlmConfig,
}

impl<'a, C: LlmClientTrait> LlmComparator<'a, C> {
    /// @ai:intent Bind a client and run-scoped credentials
    /// @ai:effects pure
    pub fn new(client: &'a C, config: &'a LlmConfig) -> Self {
        Self { client, config }
    }

    /// @ai:intent Build the user message carrying the field path and both values
    /// @ai:effects pure
    fn build_prompt(path: &str, expected: &Value, actual: &Value) -> String {
        format!(
            "## Field\n{}\n\n## Expected value\n{}\n\n## Actual value\n{}\n\n\
             Respond ONLY with valid JSON in this exact format:\n\
             {{\"passed\": <true|false>, \"rationale\": \"<one sentence>\"}}",
            path,
            pretty(expected),
            pretty(actual)
        )
    }

    /// @ai:intent Parse the model's reply into a judgment
    /// @ai:effects pure
    fn parse_judgment(content: &str) -> Result<Judgment> {
        let json = extract_json(content)?;
        Ok(serde_json::from_str(json)?)
    }

    /// @ai:intent USD cost of one response under the configured pricing
    /// @ai:effects pure
    fn response_cost(&self, model: &str, response: &LlmResponse) -> f64 {
        match self.config.pricing_for(model) {
            Some(pricing) => pricing.cost(response.usage.input_tokens, response.usage.output_tokens),
            None => {
                tracing::warn!("No pricing known for model {}; recording zero cost", model);
                0.0
            }
        }
    }

    /// @ai:intent Judge one field; never returns an error
    /// @ai:post transport or parse failures yield passed == false with a rationale
    /// @ai:effects network
    pub async fn compare(
        &self,
        settings: &LlmCompare,
        path: &str,
        expected: &Value,
        actual: &Value,
    ) -> Verdict {
        let model = self.config.model(settings.model.as_deref()).to_string();
        let request = LlmRequest::new(model.clone(), Self::build_prompt(path, expected, actual))
            .with_system(settings.system_prompt.clone());

        let response = match self.client.complete(request, self.config).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("LLM comparator call failed for {}: {:#}", path, e);
                return Verdict::fail(expected, actual, format!("llm comparator error: {:#}", e));
            }
        };

        let cost = self.response_cost(&model, &response);
        tracing::debug!("LLM judgment for {}: {}", path, response.content);

        match Self::parse_judgment(&response.content) {
            Ok(judgment) => {
                let verdict = if judgment.passed {
                    Verdict::pass(expected, actual)
                } else {
                    Verdict::fail(expected, actual, "")
                };
                let rationale = if judgment.rationale.is_empty() {
                    "no rationale given".to_string()
                } else {
                    judgment.rationale
                };
                verdict.with_rationale(rationale).with_cost(cost)
            }
            Err(e) => {
                tracing::warn!("Malformed LLM judgment for {}: {:#}", path, e);
                Verdict::fail(
                    expected,
                    actual,
                    format!("malformed llm judgment: {:#}", e),
                )
                .with_cost(cost)
            }
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ModelPricing, Provider};
    use crate::runner::client::MockLlmClient;
    use serde_json::json;

    fn config() -> LlmConfig {
        LlmConfig::new("test-key", Provider::Anthropic).with_pricing(ModelPricing::new(1.0, 2.0))
    }

    // 100 input and 200 output tokens from the mock at $1/$2 per million
    const MOCK_CALL_COST: f64 = 0.0005;

    #[tokio::test]
    async fn test_passing_judgment() {
        let client = MockLlmClient::new(
            r#"Sure. {"passed": true, "rationale": "Same street, abbreviated."}"#,
        );
        let config = config();
        let verdict = LlmComparator::new(&client, &config)
            .compare(
                &LlmCompare::default(),
                "address.street",
                &json!("123 Main Street"),
                &json!("123 Main St."),
            )
            .await;

        assert!(verdict.passed);
        assert_eq!(verdict.rationale.as_deref(), Some("Same street, abbreviated."));
        assert!((verdict.cost - MOCK_CALL_COST).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_failing_judgment_keeps_rationale() {
        let client = MockLlmClient::new(r#"{"passed": false, "rationale": "Different city."}"#);
        let config = config();
        let verdict = LlmComparator::new(&client, &config)
            .compare(&LlmCompare::default(), "city", &json!("Paris"), &json!("Lyon"))
            .await;

        assert!(!verdict.passed);
        assert_eq!(verdict.rationale.as_deref(), Some("Different city."));
    }

    #[tokio::test]
    async fn test_malformed_reply_fails_closed_with_cost() {
        let client = MockLlmClient::new("I think they match!");
        let config = config();
        let verdict = LlmComparator::new(&client, &config)
            .compare(&LlmCompare::default(), "note", &json!("a"), &json!("a"))
            .await;

        assert!(!verdict.passed);
        assert!(verdict
            .rationale
            .unwrap()
            .starts_with("malformed llm judgment"));
        assert!((verdict.cost - MOCK_CALL_COST).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_transport_error_fails_closed_without_cost() {
        let client = MockLlmClient::failing("connection refused");
        let config = config();
        let verdict = LlmComparator::new(&client, &config)
            .compare(&LlmCompare::default(), "note", &json!("a"), &json!("a"))
            .await;

        assert!(!verdict.passed);
        assert!(verdict.rationale.unwrap().contains("connection refused"));
        assert_eq!(verdict.cost, 0.0);
    }

    #[tokio::test]
    async fn test_request_uses_prompt_and_model_override() {
        let client = MockLlmClient::from_fn(|request| {
            assert_eq!(request.model, "claude-3-5-haiku-20241022");
            assert_eq!(request.system.as_deref(), Some("be strict"));
            assert!(request.prompt.contains("line_items[0].description"));
            assert!(request.prompt.contains("\"Widget\""));
            Ok(r#"{"passed": true, "rationale": "ok"}"#.to_string())
        });
        let config = config();
        let settings = LlmCompare::with_prompt("be strict").with_model("claude-3-5-haiku-20241022");

        let verdict = LlmComparator::new(&client, &config)
            .compare(
                &settings,
                "line_items[0].description",
                &json!("Widget"),
                &json!("widget"),
            )
            .await;

        assert!(verdict.passed);
        assert_eq!(client.calls(), 1);
        // the override is priced at haiku list prices, not the run's explicit pricing
        assert!((verdict.cost - (100.0 * 0.8 + 200.0 * 4.0) / 1_000_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_settings_default_prompt_from_toml() {
        let settings: LlmCompare = toml::from_str("model = \"gpt-4o\"").unwrap();
        assert_eq!(settings.system_prompt, default_judge_prompt());
        assert_eq!(settings.model.as_deref(), Some("gpt-4o"));
    }
}
