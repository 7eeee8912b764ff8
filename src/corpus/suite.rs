//! @ai:module:intent Extraction test suite definitions as stored on disk
//! @ai:module:layer domain
//! @ai:module:public_api Suite, SuiteFile, SuiteMetadata, CaseFile, EXAMPLE_SUITE

use crate::comparator::{Comparator, FieldComparators};
use crate::corpus::case::TestCase;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// @ai:intent A loaded suite: documents to extract from and the values expected from each
#[derive(Debug, Clone)]
pub struct Suite {
    pub name: String,
    pub description: String,
    /// Overrides the default extraction prompt
    pub system_prompt: Option<String>,
    /// Overrides the configured model for the extraction workflow
    pub model: Option<String>,
    pub comparators: Comparator,
    pub cases: Vec<TestCase<String, Value>>,
    pub path: PathBuf,
}

/// @ai:intent Raw suite structure from a TOML or JSON file
#[derive(Debug, Serialize, Deserialize)]
pub struct SuiteFile {
    pub suite: SuiteMetadata,
    pub comparators: FieldComparators,
    #[serde(default)]
    pub cases: Vec<CaseFile>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuiteMetadata {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// @ai:intent One case as written: the document inline or in a file next to the suite
#[derive(Debug, Serialize, Deserialize)]
pub struct CaseFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,
    pub expected: Value,
}

impl CaseFile {
    /// @ai:intent Resolve the document text, reading `input_file` relative to `base_dir`
    /// @ai:effects fs:read
    fn into_test_case(self, index: usize, base_dir: &Path) -> Result<TestCase<String, Value>> {
        let label = self
            .name
            .clone()
            .unwrap_or_else(|| format!("#{}", index));

        let input = match (self.input, self.input_file) {
            (Some(input), None) => input,
            (None, Some(file)) => {
                let path = base_dir.join(&file);
                std::fs::read_to_string(&path).with_context(|| {
                    format!("Failed to read input of case {}: {}", label, path.display())
                })?
            }
            (Some(_), Some(_)) => {
                anyhow::bail!("Case {} sets both input and input_file", label)
            }
            (None, None) => anyhow::bail!("Case {} needs input or input_file", label),
        };

        Ok(TestCase {
            name: self.name,
            input,
            expected: self.expected,
        })
    }
}

impl Suite {
    /// @ai:intent Build a suite from its file form
    /// @ai:pre path is the file the suite was read from
    /// @ai:effects fs:read
    pub fn from_file(file: SuiteFile, path: &Path) -> Result<Self> {
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let cases = file
            .cases
            .into_iter()
            .enumerate()
            .map(|(index, case)| case.into_test_case(index, base_dir))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            name: file.suite.name,
            description: file.suite.description,
            system_prompt: file.suite.system_prompt,
            model: file.suite.model,
            comparators: Comparator::Fields(file.comparators),
            cases,
            path: path.to_path_buf(),
        })
    }

    /// @ai:intent Cases whose input is their position, for replaying recorded outputs
    ///
    /// The same document may appear in several cases with different labels,
    /// so replay is keyed by index rather than by document text.
    /// @ai:effects pure
    pub fn replay_cases(&self) -> Vec<TestCase<usize, Value>> {
        self.cases
            .iter()
            .enumerate()
            .map(|(index, case)| TestCase {
                name: case.name.clone(),
                input: index,
                expected: case.expected.clone(),
            })
            .collect()
    }
}

/// Starter suite written by `extraction-eval init`
pub const EXAMPLE_SUITE: &str = r#"[suite]
name = "invoices"
description = "Header fields and line items from supplier invoices"

[comparators]
invoice_number = "exact"
vendor = "name"
payment_terms = "name"
total = { numeric = { absolute = 0.01 } }
notes = "llm"

[comparators.line_items.unordered]
sku = "exact"
description = "llm"
amount = "numeric"

[[cases]]
name = "acme-001"
input = """
ACME Corp.
Invoice INV-001
Terms: Net 30

SKU    Description            Amount
A-100  Steel bolts, 100 pcs   $12.50
B-200  Hex nuts, 50 pcs        $4.00

Total due: $16.50
Notes: deliver to the loading dock
"""

[cases.expected]
invoice_number = "INV-001"
vendor = "ACME Corp"
payment_terms = "Net 30"
total = 16.50
notes = "Deliver to loading dock"
line_items = [
    { sku = "A-100", description = "Steel bolts (100)", amount = 12.50 },
    { sku = "B-200", description = "Hex nuts (50)", amount = 4.00 },
]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_example_suite_parses() {
        let file: SuiteFile = toml::from_str(EXAMPLE_SUITE).unwrap();
        let suite = Suite::from_file(file, Path::new("suites/invoices.toml")).unwrap();

        assert_eq!(suite.name, "invoices");
        assert_eq!(suite.cases.len(), 1);
        assert_eq!(suite.cases[0].name.as_deref(), Some("acme-001"));
        assert!(suite.cases[0].input.contains("Invoice INV-001"));
        assert_eq!(suite.cases[0].expected["line_items"][1]["sku"], json!("B-200"));
        assert!(suite.comparators.contains_llm());
    }

    fn duplicate_document_suite() -> Suite {
        Suite {
            name: "dupes".to_string(),
            description: String::new(),
            system_prompt: None,
            model: None,
            comparators: Comparator::fields([("total", Comparator::numeric())]),
            cases: vec![
                TestCase::named("first", "same invoice".to_string(), json!({"total": 10})),
                TestCase::named("second", "same invoice".to_string(), json!({"total": 12})),
            ],
            path: PathBuf::from("dupes.toml"),
        }
    }

    #[test]
    fn test_replay_cases_are_keyed_by_position() {
        let replay = duplicate_document_suite().replay_cases();

        assert_eq!(replay.len(), 2);
        assert_eq!((replay[0].input, replay[1].input), (0, 1));
        assert_eq!(replay[1].name.as_deref(), Some("second"));
        assert_eq!(replay[1].expected, json!({"total": 12}));
    }

    #[tokio::test]
    async fn test_replay_passes_when_documents_repeat() {
        use crate::evaluator::{EvalRequest, Evaluator};
        use crate::runner::{Executor, FnWorkflow, MockLlmClient};
        use std::sync::Arc;

        let suite = duplicate_document_suite();
        let replay = suite.replay_cases();
        let recorded: Arc<Vec<Value>> = Arc::new(suite.cases.iter().map(|c| c.expected.clone()).collect());
        let executor = Executor::new(FnWorkflow::new(move |index: usize| {
            let recorded = recorded.clone();
            async move { Ok(recorded[index].clone()) }
        }));

        let report = Evaluator::new(Arc::new(MockLlmClient::failing("unused")))
            .evaluate(EvalRequest {
                executor: &executor,
                test_cases: &replay,
                comparators: &suite.comparators,
                llm_config: None,
            })
            .await
            .unwrap();

        assert_eq!(report.passed, 2);
    }

    #[test]
    fn test_case_needs_exactly_one_input() {
        let both = CaseFile {
            name: Some("x".to_string()),
            input: Some("doc".to_string()),
            input_file: Some(PathBuf::from("doc.txt")),
            expected: json!({}),
        };
        let err = both.into_test_case(0, Path::new(".")).unwrap_err();
        assert_eq!(err.to_string(), "Case x sets both input and input_file");

        let neither = CaseFile {
            name: None,
            input: None,
            input_file: None,
            expected: json!({}),
        };
        let err = neither.into_test_case(3, Path::new(".")).unwrap_err();
        assert_eq!(err.to_string(), "Case #3 needs input or input_file");
    }
}
