//! @ai:module:intent Fold per-test-case results into run-level totals
//! @ai:module:layer application
//! @ai:module:public_api MetricsAggregator
//! @ai:module:stateless true

use crate::metrics::types::{EvalReport, TestCaseResult};

/// @ai:intent Trait for metrics aggregation
pub trait MetricsAggregatorTrait: Send + Sync {
    /// @ai:intent Aggregate test case results into an evaluation report
    fn aggregate(&self, results: Vec<TestCaseResult>, duration_ms: u64) -> EvalReport;
}

/// @ai:intent Folds immutable per-test-case results after every task has completed
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// @ai:intent Create a new metrics aggregator
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// @ai:intent Calculate average of an iterator of f64
/// @ai:effects pure
fn average<I: Iterator<Item = f64>>(iter: I) -> f64 {
    let (sum, count) = iter.fold((0.0, 0u32), |(s, c), v| (s + v, c + 1));

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

impl MetricsAggregatorTrait for MetricsAggregator {
    /// @ai:intent Aggregate results into a report
    /// @ai:post report.total == results.len()
    /// @ai:effects pure
    fn aggregate(&self, results: Vec<TestCaseResult>, duration_ms: u64) -> EvalReport {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();

        let success_rate = if total == 0 {
            0.0
        } else {
            passed as f64 / total as f64
        };

        let avg_pass_rate = average(results.iter().map(|r| r.pass_rate));
        let cost = results.iter().map(|r| r.cost).sum();
        let comparator_cost = results
            .iter()
            .flat_map(|r| r.fields.iter())
            .map(|f| f.verdict.cost)
            .sum();

        EvalReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            duration_ms,
            test_cases: results,
            total,
            passed,
            success_rate,
            avg_pass_rate,
            cost,
            comparator_cost,
        }
    }
}
