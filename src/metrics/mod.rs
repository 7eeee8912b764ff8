//! @ai:module:intent Verdicts, field paths, per-test-case results and run-level aggregation
//! @ai:module:layer application
//! @ai:module:public_api Verdict, FieldPath, FieldResult, TestCaseResult, EvalReport, MetricsAggregator

pub mod aggregator;
pub mod path;
pub mod types;

pub use aggregator::{MetricsAggregator, MetricsAggregatorTrait};
pub use path::{FieldPath, PathSegment};
pub use types::{EvalReport, FieldResult, TestCaseResult, Verdict};
