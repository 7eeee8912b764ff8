//! @ai:module:intent Verdict and report types produced by an evaluation run
//! @ai:module:layer domain
//! @ai:module:public_api Verdict, FieldResult, TestCaseResult, EvalReport
//! @ai:module:stateless true

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// @ai:intent Outcome of comparing one expected value against one actual value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub passed: bool,
    pub expected: Value,
    pub actual: Value,
    /// Set by LLM comparators, and by deterministic comparators when they fail
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// USD spent producing this verdict; non-zero only for model calls
    #[serde(default)]
    pub cost: f64,
}

impl Verdict {
    /// @ai:intent Create a passing verdict
    /// @ai:effects pure
    pub fn pass(expected: &Value, actual: &Value) -> Self {
        Self {
            passed: true,
            expected: expected.clone(),
            actual: actual.clone(),
            rationale: None,
            cost: 0.0,
        }
    }

    /// @ai:intent Create a failing verdict with an explanation
    /// @ai:effects pure
    pub fn fail(expected: &Value, actual: &Value, rationale: impl Into<String>) -> Self {
        Self {
            passed: false,
            expected: expected.clone(),
            actual: actual.clone(),
            rationale: Some(rationale.into()),
            cost: 0.0,
        }
    }

    /// @ai:intent Attach a rationale regardless of outcome
    /// @ai:effects pure
    pub fn with_rationale(mut self, rationale: impl Into<String>) -> Self {
        self.rationale = Some(rationale.into());
        self
    }

    /// @ai:intent Attach the cost of the model call that produced this verdict
    /// @ai:pre cost is finite
    /// @ai:post self.cost >= 0
    /// @ai:effects pure
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = cost.max(0.0);
        self
    }
}

/// @ai:intent A verdict attached to a rendered field path such as `line_items[0].amount`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldResult {
    pub path: String,
    #[serde(flatten)]
    pub verdict: Verdict,
}

impl FieldResult {
    pub fn new(path: impl Into<String>, verdict: Verdict) -> Self {
        Self {
            path: path.into(),
            verdict,
        }
    }

    pub fn passed(&self) -> bool {
        self.verdict.passed
    }
}

/// @ai:intent Field-level scoring of one test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestCaseResult {
    /// Position of the test case in the input suite
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub passed: bool,
    pub pass_rate: f64,
    pub passed_fields: usize,
    pub total_fields: usize,
    pub fields: Vec<FieldResult>,
    /// Workflow execution cost in USD
    pub cost: f64,
    /// Sum of comparator costs over `fields`
    pub comparator_cost: f64,
    pub duration_ms: u64,
    /// Workflow failure message; when set, no fields were scored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TestCaseResult {
    /// @ai:intent Build a result from the leaf verdicts of a successful workflow run
    /// @ai:pre fields is non-empty
    /// @ai:post passed == (passed_fields == total_fields)
    /// @ai:effects pure
    pub fn from_fields(
        index: usize,
        name: Option<String>,
        fields: Vec<FieldResult>,
        cost: f64,
        duration_ms: u64,
    ) -> Result<Self, EvalError> {
        if fields.is_empty() {
            return Err(EvalError::NoScorableFields {
                test_case: describe_case(index, name.as_deref()),
            });
        }

        let total_fields = fields.len();
        let passed_fields = fields.iter().filter(|f| f.passed()).count();
        let comparator_cost = fields.iter().map(|f| f.verdict.cost).sum();

        Ok(Self {
            index,
            name,
            passed: passed_fields == total_fields,
            pass_rate: passed_fields as f64 / total_fields as f64,
            passed_fields,
            total_fields,
            fields,
            cost,
            comparator_cost,
            duration_ms,
            error: None,
        })
    }

    /// @ai:intent Build a failed result for a workflow that errored
    /// @ai:pre total_fields > 0
    /// @ai:effects pure
    pub fn workflow_failure(
        index: usize,
        name: Option<String>,
        total_fields: usize,
        error: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            index,
            name,
            passed: false,
            pass_rate: 0.0,
            passed_fields: 0,
            total_fields,
            fields: Vec::new(),
            cost: 0.0,
            comparator_cost: 0.0,
            duration_ms,
            error: Some(error.into()),
        }
    }

    /// @ai:intent Find the verdict for a rendered field path
    /// @ai:effects pure
    pub fn field(&self, path: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|f| f.path == path)
    }

    /// @ai:intent Iterate over the failing fields
    /// @ai:effects pure
    pub fn failed_fields(&self) -> impl Iterator<Item = &FieldResult> {
        self.fields.iter().filter(|f| !f.passed())
    }

    /// @ai:intent Human readable label for logs and reports
    /// @ai:effects pure
    pub fn label(&self) -> String {
        describe_case(self.index, self.name.as_deref())
    }
}

pub(crate) fn describe_case(index: usize, name: Option<&str>) -> String {
    match name {
        Some(name) => format!("#{} ({})", index, name),
        None => format!("#{}", index),
    }
}

/// @ai:intent Run-level report over every test case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvalReport {
    pub timestamp: String,
    pub duration_ms: u64,
    /// Mirrors the input order of the suite
    pub test_cases: Vec<TestCaseResult>,
    pub total: usize,
    pub passed: usize,
    pub success_rate: f64,
    /// Mean field pass rate across test cases
    pub avg_pass_rate: f64,
    /// Sum of workflow execution costs in USD
    pub cost: f64,
    /// Sum of comparator costs in USD
    pub comparator_cost: f64,
}

impl EvalReport {
    /// @ai:intent Total spend of the run
    /// @ai:effects pure
    pub fn total_cost(&self) -> f64 {
        self.cost + self.comparator_cost
    }

    pub fn failed(&self) -> usize {
        self.total - self.passed
    }
}
