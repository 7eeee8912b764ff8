//! @ai:module:intent Drive a workflow over a test suite and score every output field by field
//! @ai:module:layer application
//! @ai:module:public_api Evaluator, EvalRequest, preflight, PreparedCase, Dispatcher

pub mod dispatcher;

pub use dispatcher::{check_comparator, expected_leaf_count, Dispatcher};

use crate::comparator::Comparator;
use crate::config::LlmConfig;
use crate::corpus::TestCase;
use crate::error::{EvalError, Result};
use crate::metrics::types::describe_case;
use crate::metrics::{EvalReport, MetricsAggregator, MetricsAggregatorTrait, TestCaseResult};
use crate::runner::client::LlmClientTrait;
use crate::runner::executor::{Executor, WorkflowTrait};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Fan-out used when the caller does not choose one
pub const DEFAULT_CONCURRENCY: usize = 4;

/// @ai:intent Everything one evaluation run needs
pub struct EvalRequest<'a, W: WorkflowTrait> {
    pub executor: &'a Executor<W>,
    pub test_cases: &'a [TestCase<W::Input, W::Output>],
    pub comparators: &'a Comparator,
    /// Threaded into the workflow and every LLM comparator; read-only
    pub llm_config: Option<&'a LlmConfig>,
}

/// @ai:intent A test case that passed pre-flight validation
#[derive(Debug, Clone)]
pub struct PreparedCase {
    pub expected: Value,
    /// Verdicts a fully matching output would produce
    pub leaf_count: usize,
}

/// @ai:intent Validate configuration against every test case before any workflow runs
/// @ai:post Ok(cases) has one entry per test case, each with leaf_count > 0
/// @ai:effects pure
pub fn preflight<I, O: Serialize>(
    test_cases: &[TestCase<I, O>],
    comparators: &Comparator,
    llm_config: Option<&LlmConfig>,
) -> Result<Vec<PreparedCase>> {
    if test_cases.is_empty() {
        return Err(EvalError::InvalidConfig("no test cases to evaluate".to_string()));
    }

    check_comparator(comparators, llm_config.is_some())?;

    test_cases
        .iter()
        .enumerate()
        .map(|(index, case)| {
            let label = describe_case(index, case.name.as_deref());
            let expected = serde_json::to_value(&case.expected).map_err(|e| {
                EvalError::InvalidConfig(format!(
                    "expected value of test case {} cannot be represented as JSON: {}",
                    label, e
                ))
            })?;

            let leaf_count = expected_leaf_count(comparators, &expected).inspect_err(|e| {
                tracing::error!("Test case {} does not fit the comparators: {}", label, e);
            })?;

            if leaf_count == 0 {
                return Err(EvalError::NoScorableFields { test_case: label });
            }

            Ok(PreparedCase {
                expected,
                leaf_count,
            })
        })
        .collect()
}

/// @ai:intent Evaluation orchestrator
///
/// Test cases run concurrently up to the configured bound. Per-case results
/// are immutable and folded into the report once every case has finished,
/// in input order.
pub struct Evaluator<C: LlmClientTrait> {
    client: Arc<C>,
    concurrency: usize,
    aggregator: MetricsAggregator,
}

impl<C: LlmClientTrait> Evaluator<C> {
    /// @ai:intent Create an evaluator whose LLM comparators call `client`
    /// @ai:effects pure
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            concurrency: DEFAULT_CONCURRENCY,
            aggregator: MetricsAggregator::new(),
        }
    }

    /// @ai:intent Bound the number of test cases in flight
    /// @ai:post self.concurrency >= 1
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// @ai:intent Run the whole suite and build the report
    /// @ai:effects network (through the workflow and LLM comparators)
    pub async fn evaluate<W>(&self, request: EvalRequest<'_, W>) -> Result<EvalReport>
    where
        W: WorkflowTrait,
        W::Output: Serialize,
    {
        self.evaluate_with_cancel(request, &CancellationToken::new())
            .await
    }

    /// @ai:intent Run the whole suite unless `cancel` fires first
    /// @ai:post cancellation returns EvalError::Cancelled and no report
    /// @ai:effects network (through the workflow and LLM comparators)
    pub async fn evaluate_with_cancel<W>(
        &self,
        request: EvalRequest<'_, W>,
        cancel: &CancellationToken,
    ) -> Result<EvalReport>
    where
        W: WorkflowTrait,
        W::Output: Serialize,
    {
        let prepared = preflight(request.test_cases, request.comparators, request.llm_config)?;
        let start = Instant::now();

        tracing::info!(
            "Evaluating {} test cases (concurrency {})",
            request.test_cases.len(),
            self.concurrency
        );

        let run = stream::iter(request.test_cases.iter().zip(prepared).enumerate())
            .map(|(index, (case, prepared))| self.evaluate_case(&request, index, case, prepared))
            .buffered(self.concurrency)
            .try_collect::<Vec<_>>();

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::warn!("Evaluation cancelled");
                return Err(EvalError::Cancelled);
            }
            results = run => results?,
        };

        let report = self
            .aggregator
            .aggregate(results, start.elapsed().as_millis() as u64);

        tracing::info!(
            "Evaluation complete: {}/{} test cases passed, cost ${:.4} + ${:.4} comparators",
            report.passed,
            report.total,
            report.cost,
            report.comparator_cost
        );

        Ok(report)
    }

    /// @ai:intent Execute and score one test case; workflow failures become failed results
    /// @ai:effects network
    async fn evaluate_case<W>(
        &self,
        request: &EvalRequest<'_, W>,
        index: usize,
        case: &TestCase<W::Input, W::Output>,
        prepared: PreparedCase,
    ) -> Result<TestCaseResult>
    where
        W: WorkflowTrait,
        W::Output: Serialize,
    {
        let start = Instant::now();
        let label = describe_case(index, case.name.as_deref());
        let elapsed = || start.elapsed().as_millis() as u64;

        let execution = match request.executor.execute(&case.input, request.llm_config).await {
            Ok(execution) => execution,
            Err(e) => {
                tracing::warn!("Workflow failed for test case {}: {:#}", label, e);
                return Ok(TestCaseResult::workflow_failure(
                    index,
                    case.name.clone(),
                    prepared.leaf_count,
                    format!("{:#}", e),
                    elapsed(),
                ));
            }
        };

        let actual = match serde_json::to_value(&execution.output) {
            Ok(actual) => actual,
            Err(e) => {
                tracing::warn!("Workflow output of test case {} is not JSON: {}", label, e);
                let mut result = TestCaseResult::workflow_failure(
                    index,
                    case.name.clone(),
                    prepared.leaf_count,
                    format!("workflow output cannot be represented as JSON: {}", e),
                    elapsed(),
                );
                result.cost = execution.cost;
                return Ok(result);
            }
        };

        let fields = Dispatcher::new(self.client.as_ref(), request.llm_config)
            .dispatch(request.comparators, &prepared.expected, &actual)
            .await;

        let result =
            TestCaseResult::from_fields(index, case.name.clone(), fields, execution.cost, elapsed())?;

        tracing::info!(
            "Test case {}: {}/{} fields passed",
            label,
            result.passed_fields,
            result.total_fields
        );
        for field in result.failed_fields() {
            tracing::debug!(
                "  {} failed: {}",
                field.path,
                field.verdict.rationale.as_deref().unwrap_or("no rationale")
            );
        }

        Ok(result)
    }
}
