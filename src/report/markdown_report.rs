//! @ai:module:intent Markdown report generation
//! @ai:module:layer infrastructure
//! @ai:module:public_api MarkdownReporter
//! @ai:module:stateless true

use crate::metrics::{EvalReport, FieldResult, TestCaseResult};
use anyhow::{Context, Result};
use serde_json::Value;
use std::fmt::Write as FmtWrite;
use std::path::Path;

/// @ai:intent Trait for Markdown report generation
pub trait MarkdownReporterTrait: Send + Sync {
    /// @ai:intent Render a report for a human reviewer
    fn render(&self, report: &EvalReport, title: &str) -> String;

    /// @ai:intent Render and write a report
    fn generate(&self, report: &EvalReport, title: &str, output_path: &Path) -> Result<()>;
}

/// @ai:intent Generates Markdown reports: summary, per-case table, every failing field
pub struct MarkdownReporter;

impl MarkdownReporter {
    /// @ai:intent Create a new Markdown reporter
    /// @ai:effects pure
    pub fn new() -> Self {
        Self
    }

    /// @ai:intent Format a 0..1 ratio as a percentage
    /// @ai:effects pure
    fn format_rate(rate: f64) -> String {
        format!("{:.1}%", rate * 100.0)
    }

    /// @ai:intent Render a value inline, escaping table pipes
    /// @ai:effects pure
    fn format_value(value: &Value) -> String {
        let text = match value {
            Value::Null => "(missing)".to_string(),
            Value::String(s) => format!("\"{}\"", s),
            other => other.to_string(),
        };
        truncate(&text.replace('|', "\\|").replace('\n', " "), 80)
    }

    /// @ai:intent Generate overall summary section
    /// @ai:effects pure
    fn generate_summary(report: &EvalReport, title: &str) -> String {
        let mut output = String::new();

        writeln!(output, "# Extraction Eval: {}", title).unwrap();
        writeln!(output).unwrap();
        writeln!(output, "**Date:** {}", report.timestamp).unwrap();
        writeln!(output, "**Duration:** {:.1}s", report.duration_ms as f64 / 1000.0).unwrap();
        writeln!(output).unwrap();

        writeln!(output, "## Summary").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Test cases | {} |", report.total).unwrap();
        writeln!(output, "| Passed | {} |", report.passed).unwrap();
        writeln!(output, "| Failed | {} |", report.failed()).unwrap();
        writeln!(output, "| Success rate | {} |", Self::format_rate(report.success_rate)).unwrap();
        writeln!(
            output,
            "| Avg field pass rate | {} |",
            Self::format_rate(report.avg_pass_rate)
        )
        .unwrap();
        writeln!(output, "| Workflow cost | ${:.4} |", report.cost).unwrap();
        writeln!(output, "| Comparator cost | ${:.4} |", report.comparator_cost).unwrap();
        writeln!(output, "| Total cost | ${:.4} |", report.total_cost()).unwrap();
        writeln!(output).unwrap();

        output
    }

    /// @ai:intent Generate the per-test-case table
    /// @ai:effects pure
    fn generate_case_table(report: &EvalReport) -> String {
        let mut output = String::new();

        writeln!(output, "## Test Cases").unwrap();
        writeln!(output).unwrap();
        writeln!(output, "| # | Name | Result | Fields | Pass Rate | Cost |").unwrap();
        writeln!(output, "|---|------|--------|--------|-----------|------|").unwrap();

        for case in &report.test_cases {
            let result = if case.error.is_some() {
                "ERROR"
            } else if case.passed {
                "PASS"
            } else {
                "FAIL"
            };
            writeln!(
                output,
                "| {} | {} | {} | {}/{} | {} | ${:.4} |",
                case.index,
                case.name.as_deref().unwrap_or("-").replace('|', "\\|"),
                result,
                case.passed_fields,
                case.total_fields,
                Self::format_rate(case.pass_rate),
                case.cost + case.comparator_cost
            )
            .unwrap();
        }

        writeln!(output).unwrap();
        output
    }

    /// @ai:intent Describe one failing field
    /// @ai:effects pure
    fn format_failed_field(field: &FieldResult) -> String {
        format!(
            "- `{}`: expected {}, got {} ({})",
            field.path,
            Self::format_value(&field.verdict.expected),
            Self::format_value(&field.verdict.actual),
            field.verdict.rationale.as_deref().unwrap_or("no rationale")
        )
    }

    /// @ai:intent Generate the failure details of one test case
    /// @ai:effects pure
    fn generate_case_failures(case: &TestCaseResult) -> String {
        let mut output = String::new();

        writeln!(output, "### {}", case.label()).unwrap();
        writeln!(output).unwrap();

        if let Some(error) = &case.error {
            writeln!(output, "**Workflow error:** {}", error).unwrap();
        } else {
            for field in case.failed_fields() {
                writeln!(output, "{}", Self::format_failed_field(field)).unwrap();
            }
        }

        writeln!(output).unwrap();
        output
    }

    /// @ai:intent Generate the failures section
    /// @ai:effects pure
    fn generate_failures(report: &EvalReport) -> String {
        let failed: Vec<_> = report.test_cases.iter().filter(|c| !c.passed).collect();
        if failed.is_empty() {
            return "## Failures\n\nNone.\n".to_string();
        }

        let mut output = String::new();
        writeln!(output, "## Failures").unwrap();
        writeln!(output).unwrap();
        for case in failed {
            output.push_str(&Self::generate_case_failures(case));
        }
        output
    }
}

/// @ai:intent Truncate on a character boundary
/// @ai:effects pure
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}

impl Default for MarkdownReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownReporterTrait for MarkdownReporter {
    /// @ai:effects pure
    fn render(&self, report: &EvalReport, title: &str) -> String {
        let mut output = Self::generate_summary(report, title);
        output.push_str(&Self::generate_case_table(report));
        output.push_str(&Self::generate_failures(report));
        output
    }

    /// @ai:effects fs:write
    fn generate(&self, report: &EvalReport, title: &str, output_path: &Path) -> Result<()> {
        std::fs::write(output_path, self.render(report, title))
            .with_context(|| format!("Failed to write {}", output_path.display()))?;
        Ok(())
    }
}
