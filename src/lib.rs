//! @ai:module:intent Field-level evaluation harness for LLM extraction workflows
//! @ai:module:layer application
//! @ai:module:public_api comparator, config, corpus, error, evaluator, metrics, report, runner

pub mod comparator;
pub mod config;
pub mod corpus;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod report;
pub mod runner;

pub use comparator::Comparator;
pub use config::{EvalConfig, LlmConfig, Provider};
pub use corpus::{SuiteLoader, TestCase};
pub use error::EvalError;
pub use evaluator::{EvalRequest, Evaluator};
pub use metrics::{EvalReport, FieldResult, TestCaseResult, Verdict};
pub use report::ReportGenerator;
pub use runner::{Executor, ExtractionWorkflow, FnWorkflow, HttpLlmClient, LlmClientTrait, WorkflowTrait};
