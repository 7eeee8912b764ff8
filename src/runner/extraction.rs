//! @ai:module:intent Built-in LLM document extraction workflow and token pricing
//! @ai:module:layer application
//! @ai:module:public_api ExtractionWorkflow, PricingCostMapper, default_extraction_prompt

use crate::config::{LlmConfig, ModelPricing};
use crate::runner::client::{extract_json, LlmClientTrait, LlmRequest, TokenUsage};
use crate::runner::executor::{CostMapperTrait, WorkflowRun, WorkflowTrait};
use anyhow::{Context, Result};
use regex::Regex;
use serde_json::Value;
use std::sync::Arc;

/// @ai:intent Default system prompt for structured extraction
/// @ai:effects pure
pub fn default_extraction_prompt() -> String {
    "You extract structured data from business documents. Return a single JSON object \
     with the requested fields. Use null for values that are not present in the document. \
     Do not invent values and do not add commentary."
        .to_string()
}

/// @ai:intent Sends a document to the model and parses the JSON object it returns
pub struct ExtractionWorkflow<C: LlmClientTrait> {
    client: Arc<C>,
    system_prompt: String,
    model: Option<String>,
    fence_regex: Regex,
}

impl<C: LlmClientTrait> ExtractionWorkflow<C> {
    /// @ai:intent Create a workflow using the default extraction prompt
    /// @ai:effects pure
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            system_prompt: default_extraction_prompt(),
            model: None,
            // ```json ... ``` around the object
            fence_regex: Regex::new(r"```(?:json)?\s*\n([\s\S]*?)```").expect("fence pattern is valid"),
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = system_prompt.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// @ai:intent Model this workflow calls under a run configuration
    /// @ai:effects pure
    pub fn model<'a>(&'a self, llm: &'a LlmConfig) -> &'a str {
        llm.model(self.model.as_deref())
    }

    /// @ai:intent Build the user message for a document
    /// @ai:effects pure
    fn build_prompt(document: &str) -> String {
        format!(
            "## Document\n{}\n\nRespond ONLY with the extracted JSON object.",
            document
        )
    }

    /// @ai:intent Parse the JSON object out of a reply, preferring a fenced block
    /// @ai:effects pure
    fn parse_output(&self, content: &str) -> Result<Value> {
        let body = self
            .fence_regex
            .captures(content)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .unwrap_or(content);

        let json = extract_json(body)?;
        let value: Value = serde_json::from_str(json).context("Extraction reply is not valid JSON")?;
        Ok(value)
    }
}

impl<C: LlmClientTrait> WorkflowTrait for ExtractionWorkflow<C> {
    type Input = String;
    type Output = Value;
    type Usage = TokenUsage;

    async fn run(&self, document: &String, llm: Option<&LlmConfig>) -> Result<WorkflowRun<Value, TokenUsage>> {
        let llm = llm.context("Extraction workflow requires an llm configuration")?;
        let request = LlmRequest::new(self.model(llm), Self::build_prompt(document))
            .with_system(self.system_prompt.clone());

        let response = self.client.complete(request, llm).await?;
        let output = self.parse_output(&response.content)?;

        Ok(WorkflowRun::new(output).with_usage(response.usage))
    }
}

/// @ai:intent Prices token usage with a fixed per-million rate
#[derive(Debug, Clone, Copy)]
pub struct PricingCostMapper {
    pricing: ModelPricing,
}

impl PricingCostMapper {
    pub fn new(pricing: ModelPricing) -> Self {
        Self { pricing }
    }

    /// @ai:intent Resolve pricing for a model under a run configuration
    /// @ai:effects pure
    pub fn for_model(llm: &LlmConfig, model: &str) -> Option<Self> {
        llm.pricing_for(model).map(Self::new)
    }
}

impl CostMapperTrait<TokenUsage> for PricingCostMapper {
    fn map_cost(&self, usage: &TokenUsage) -> f64 {
        self.pricing.cost(usage.input_tokens, usage.output_tokens)
    }
}
