//! @ai:module:intent JSON report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api JsonReporter
//! @ai:module:stateless true

use crate::metrics::EvalReport;
use anyhow::{Context, Result};
use std::path::Path;

/// @ai:intent Trait for JSON report generation
pub trait JsonReporterTrait: Send + Sync {
    /// @ai:intent Write the full report, every field verdict included
    fn generate(&self, report: &EvalReport, output_path: &Path) -> Result<()>;
}

/// @ai:intent Writes an evaluation report as pretty-printed JSON
pub struct JsonReporter;

impl JsonReporter {
    /// @ai:intent Create a new JSON reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl JsonReporterTrait for JsonReporter {
    /// @ai:effects fs:write
    fn generate(&self, report: &EvalReport, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(output_path, json)
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{FieldResult, TestCaseResult, Verdict};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_generate_json_report() {
        let reporter = JsonReporter::new();
        let temp = TempDir::new().unwrap();
        let output = temp.path().join("results.json");

        let case = TestCaseResult::from_fields(
            0,
            Some("acme".to_string()),
            vec![FieldResult::new(
                "vendor",
                Verdict::fail(&json!("Acme"), &json!("Apex"), "values differ"),
            )],
            0.002,
            15,
        )
        .unwrap();
        let report = EvalReport {
            timestamp: "2026-01-19T00:00:00Z".to_string(),
            duration_ms: 20,
            test_cases: vec![case],
            total: 1,
            passed: 0,
            success_rate: 0.0,
            avg_pass_rate: 0.0,
            cost: 0.002,
            comparator_cost: 0.0,
        };

        reporter.generate(&report, &output).unwrap();

        let content: Value = serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(content["total"], json!(1));
        assert_eq!(content["test_cases"][0]["name"], json!("acme"));
        assert_eq!(content["test_cases"][0]["fields"][0]["path"], json!("vendor"));
        assert_eq!(content["test_cases"][0]["fields"][0]["rationale"], json!("values differ"));
    }
}
