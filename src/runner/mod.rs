//! @ai:module:intent Workflow execution, LLM provider client and rate limiting
//! @ai:module:layer infrastructure
//! @ai:module:public_api Executor, WorkflowTrait, CostMapperTrait, ExtractionWorkflow, HttpLlmClient, MockLlmClient, RateLimiter

pub mod client;
pub mod executor;
pub mod extraction;
pub mod rate_limiter;

pub use client::{
    HttpLlmClient, LlmClientTrait, LlmRequest, LlmResponse, MockLlmClient, TokenUsage,
};
pub use executor::{
    CostMapperTrait, Execution, Executor, FnWorkflow, MeteredFnWorkflow, WorkflowRun, WorkflowTrait,
};
pub use extraction::{default_extraction_prompt, ExtractionWorkflow, PricingCostMapper};
pub use rate_limiter::{RateLimiter, RateLimiterTrait};
