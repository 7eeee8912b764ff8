//! @ai:module:intent Walk a comparator tree against expected/actual values, producing leaf verdicts
//! @ai:module:layer application
//! @ai:module:public_api Dispatcher, expected_leaf_count, check_comparator

use crate::comparator::unordered::{best_pairing, score_matrix};
use crate::comparator::{
    exact, json_type_name, name, numeric, Comparator, FieldComparators, LlmCompare, LlmComparator,
};
use crate::config::LlmConfig;
use crate::error::{EvalError, Result};
use crate::metrics::{FieldPath, FieldResult, Verdict};
use crate::runner::client::LlmClientTrait;
use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;

const NO_MATCH: &str = "no matching actual element";
const UNEXPECTED: &str = "unexpected actual element";

static NULL: Value = Value::Null;

/// @ai:intent Recursive comparator dispatch for one test case
///
/// Results come out in a stable order: map keys in key order, list elements
/// by expected index, then surplus actual elements.
pub struct Dispatcher<'a, C: LlmClientTrait> {
    client: &'a C,
    llm_config: Option<&'a LlmConfig>,
}

impl<'a, C: LlmClientTrait> Dispatcher<'a, C> {
    pub fn new(client: &'a C, llm_config: Option<&'a LlmConfig>) -> Self {
        Self { client, llm_config }
    }

    /// @ai:intent Compare an actual value against the expected one
    /// @ai:post one FieldResult per leaf verdict; never fails
    /// @ai:effects network (llm leaves only)
    pub async fn dispatch(
        &self,
        comparator: &Comparator,
        expected: &Value,
        actual: &Value,
    ) -> Vec<FieldResult> {
        self.walk(comparator, FieldPath::root(), expected, actual).await
    }

    fn walk<'b>(
        &'b self,
        comparator: &'b Comparator,
        path: FieldPath,
        expected: &'b Value,
        actual: &'b Value,
    ) -> BoxFuture<'b, Vec<FieldResult>> {
        async move {
            let verdict = match comparator {
                Comparator::Fields(map) => return self.walk_fields(map, path, expected, actual).await,
                Comparator::Unordered(map) => {
                    return self.walk_unordered(map, path, expected, actual).await
                }
                Comparator::Llm(settings) => self.judge(settings, &path, expected, actual).await,
                Comparator::Exact => exact(expected, actual),
                Comparator::Numeric(tolerance) => numeric(expected, actual, tolerance),
                Comparator::Name => name(expected, actual),
            };
            vec![FieldResult::new(path.to_string(), verdict)]
        }
        .boxed()
    }

    fn walk_fields<'b>(
        &'b self,
        map: &'b FieldComparators,
        path: FieldPath,
        expected: &'b Value,
        actual: &'b Value,
    ) -> BoxFuture<'b, Vec<FieldResult>> {
        async move {
            let Value::Object(expected_fields) = expected else {
                let rationale = format!("expected value is a {}, not an object", json_type_name(expected));
                return vec![FieldResult::new(path.to_string(), Verdict::fail(expected, actual, rationale))];
            };
            let Value::Object(actual_fields) = actual else {
                let rationale = format!(
                    "field missing from actual: expected object, got {}",
                    json_type_name(actual)
                );
                return missing_map(map, &path, expected_fields, &rationale);
            };

            let mut results = Vec::new();
            for (key, comparator) in map {
                let child = path.key(key);
                match (expected_fields.get(key), actual_fields.get(key)) {
                    (Some(e), Some(a)) => results.extend(self.walk(comparator, child, e, a).await),
                    (None, a) => results.push(FieldResult::new(
                        child.to_string(),
                        Verdict::fail(&NULL, a.unwrap_or(&NULL), "field missing from expected"),
                    )),
                    (Some(e), None) => results.push(FieldResult::new(
                        child.to_string(),
                        Verdict::fail(e, &NULL, "field missing from actual"),
                    )),
                }
            }
            results
        }
        .boxed()
    }

    async fn walk_unordered(
        &self,
        map: &FieldComparators,
        path: FieldPath,
        expected: &Value,
        actual: &Value,
    ) -> Vec<FieldResult> {
        let Value::Array(expected_items) = expected else {
            let rationale = format!("expected value is a {}, not an array", json_type_name(expected));
            return vec![FieldResult::new(path.to_string(), Verdict::fail(expected, actual, rationale))];
        };

        let Value::Array(actual_items) = actual else {
            let rationale = format!("type mismatch: expected array, got {}", json_type_name(actual));
            return expected_items
                .iter()
                .enumerate()
                .flat_map(|(i, item)| unmatched_expected(map, &path.index(i), item, &rationale))
                .collect();
        };

        let scores = score_matrix(map, expected_items, actual_items);
        let pairing = best_pairing(&scores, expected_items.len(), actual_items.len());
        tracing::debug!(
            "Paired {} of {} expected elements at {} (score {})",
            pairing.pairs.len(),
            expected_items.len(),
            path,
            pairing.score
        );

        let mut results = Vec::new();
        for (i, item) in expected_items.iter().enumerate() {
            let element_path = path.index(i);
            match pairing.actual_for(i) {
                Some(j) => {
                    results.extend(self.walk_fields(map, element_path, item, &actual_items[j]).await)
                }
                None => results.extend(unmatched_expected(map, &element_path, item, NO_MATCH)),
            }
        }
        for &j in &pairing.unmatched_actual {
            results.extend(surplus_actual(map, &path.extra(j), &actual_items[j]));
        }
        results
    }

    async fn judge(
        &self,
        settings: &LlmCompare,
        path: &FieldPath,
        expected: &Value,
        actual: &Value,
    ) -> Verdict {
        match self.llm_config {
            Some(config) => {
                LlmComparator::new(self.client, config)
                    .compare(settings, &path.to_string(), expected, actual)
                    .await
            }
            None => Verdict::fail(expected, actual, "llm comparator has no llm configuration"),
        }
    }
}

fn unmatched_expected(
    map: &FieldComparators,
    path: &FieldPath,
    element: &Value,
    rationale: &str,
) -> Vec<FieldResult> {
    match element {
        Value::Object(fields) => missing_map(map, path, fields, rationale),
        other => missing_leaves(&Comparator::Exact, path, other, rationale),
    }
}

/// @ai:intent Fail every leaf an expected subtree would score, mirroring `expected_leaf_count`
/// @ai:effects pure
fn missing_leaves(
    comparator: &Comparator,
    path: &FieldPath,
    expected: &Value,
    rationale: &str,
) -> Vec<FieldResult> {
    match (comparator, expected) {
        (Comparator::Fields(map), Value::Object(fields)) => missing_map(map, path, fields, rationale),
        (Comparator::Unordered(map), Value::Array(items)) => items
            .iter()
            .enumerate()
            .flat_map(|(i, item)| unmatched_expected(map, &path.index(i), item, rationale))
            .collect(),
        _ => vec![FieldResult::new(path.to_string(), Verdict::fail(expected, &NULL, rationale))],
    }
}

fn missing_map(
    map: &FieldComparators,
    path: &FieldPath,
    fields: &serde_json::Map<String, Value>,
    rationale: &str,
) -> Vec<FieldResult> {
    map.iter()
        .flat_map(|(key, sub)| {
            let child = path.key(key);
            match fields.get(key) {
                Some(value) => missing_leaves(sub, &child, value, rationale),
                None => vec![FieldResult::new(child.to_string(), Verdict::fail(&NULL, &NULL, rationale))],
            }
        })
        .collect()
}

fn surplus_actual(map: &FieldComparators, path: &FieldPath, element: &Value) -> Vec<FieldResult> {
    map.keys()
        .map(|key| {
            let actual = element.get(key).unwrap_or(&NULL);
            FieldResult::new(path.key(key).to_string(), Verdict::fail(&NULL, actual, UNEXPECTED))
        })
        .collect()
}

/// @ai:intent Check comparator settings and LLM requirements across the whole tree
/// @ai:effects pure
pub fn check_comparator(comparator: &Comparator, has_llm_config: bool) -> Result<()> {
    check_at(comparator, &FieldPath::root(), has_llm_config)
}

fn check_at(comparator: &Comparator, path: &FieldPath, has_llm_config: bool) -> Result<()> {
    comparator
        .validate()
        .map_err(|msg| EvalError::InvalidConfig(format!("{} at {}", msg, path)))?;

    match comparator {
        Comparator::Llm(_) if !has_llm_config => Err(EvalError::MissingLlmConfig {
            path: path.to_string(),
        }),
        Comparator::Fields(map) => map
            .iter()
            .try_for_each(|(key, sub)| check_at(sub, &path.key(key), has_llm_config)),
        Comparator::Unordered(map) => {
            let element = path.each();
            map.iter()
                .try_for_each(|(key, sub)| check_at(sub, &element.key(key), has_llm_config))
        }
        _ => Ok(()),
    }
}

/// @ai:intent Verify the expected value fits the comparator shape and count its leaves
///
/// The count is the number of verdicts a walk of `expected` against itself
/// would produce. It sizes `total_fields` for test cases whose workflow failed.
/// @ai:effects pure
pub fn expected_leaf_count(comparator: &Comparator, expected: &Value) -> Result<usize> {
    count_at(comparator, &FieldPath::root(), expected)
}

fn count_at(comparator: &Comparator, path: &FieldPath, expected: &Value) -> Result<usize> {
    match comparator {
        Comparator::Fields(map) => {
            let Value::Object(fields) = expected else {
                return Err(shape_mismatch(path, "object", expected));
            };
            count_map(map, path, fields)
        }
        Comparator::Unordered(map) => {
            let Value::Array(items) = expected else {
                return Err(shape_mismatch(path, "array of objects", expected));
            };
            items.iter().enumerate().try_fold(0, |total, (i, item)| {
                let element_path = path.index(i);
                let Value::Object(fields) = item else {
                    return Err(shape_mismatch(&element_path, "object", item));
                };
                Ok(total + count_map(map, &element_path, fields)?)
            })
        }
        _ => Ok(1),
    }
}

fn count_map(
    map: &FieldComparators,
    path: &FieldPath,
    fields: &serde_json::Map<String, Value>,
) -> Result<usize> {
    map.iter().try_fold(0, |total, (key, sub)| {
        let count = match fields.get(key) {
            Some(value) => count_at(sub, &path.key(key), value)?,
            // a missing expected key still yields one failing verdict
            None => 1,
        };
        Ok(total + count)
    })
}

fn shape_mismatch(path: &FieldPath, expected_shape: &'static str, found: &Value) -> EvalError {
    EvalError::ShapeMismatch {
        path: path.to_string(),
        expected_shape,
        found: json_type_name(found).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::Tolerance;
    use crate::config::{ModelPricing, Provider};
    use crate::runner::client::MockLlmClient;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn no_llm() -> MockLlmClient {
        MockLlmClient::failing("no model calls expected")
    }

    fn paths(results: &[FieldResult]) -> Vec<(&str, bool)> {
        results.iter().map(|r| (r.path.as_str(), r.passed())).collect()
    }

    fn line_items() -> Comparator {
        Comparator::fields([(
            "line_items",
            Comparator::unordered([("sku", Comparator::Exact), ("amount", Comparator::numeric())]),
        )])
    }

    #[tokio::test]
    async fn test_leaf_at_root() {
        let client = no_llm();
        let results = Dispatcher::new(&client, None)
            .dispatch(&Comparator::Name, &json!("Net 30"), &json!("NET30"))
            .await;
        assert_eq!(paths(&results), vec![("$", true)]);
    }

    #[tokio::test]
    async fn test_nested_fields_and_missing_keys() {
        let client = no_llm();
        let comparator = Comparator::fields([
            ("invoice_number", Comparator::Exact),
            ("total", Comparator::numeric()),
            ("po_number", Comparator::Exact),
            (
                "vendor",
                Comparator::fields([("name", Comparator::Name), ("city", Comparator::Name)]),
            ),
        ]);
        let expected = json!({
            "invoice_number": "INV-1",
            "total": 100.0,
            "po_number": "PO-7",
            "vendor": {"name": "Acme, Inc.", "city": "Paris"}
        });
        let actual = json!({
            "invoice_number": "INV-1",
            "total": "$100.00",
            "vendor": {"name": "ACME Inc"},
            "ignored": true
        });

        let results = Dispatcher::new(&client, None)
            .dispatch(&comparator, &expected, &actual)
            .await;

        assert_eq!(
            paths(&results),
            vec![
                ("invoice_number", true),
                ("po_number", false),
                ("total", true),
                ("vendor.city", false),
                ("vendor.name", true),
            ]
        );
        assert_eq!(
            results[1].verdict.rationale.as_deref(),
            Some("field missing from actual")
        );
        assert_eq!(results[3].verdict.expected, json!("Paris"));
        assert_eq!(results[3].verdict.actual, Value::Null);
    }

    #[tokio::test]
    async fn test_actual_not_object_fails_every_expected_leaf() {
        let client = no_llm();
        let comparator = Comparator::fields([("a", Comparator::Exact), ("b", Comparator::Exact)]);
        let results = Dispatcher::new(&client, None)
            .dispatch(&comparator, &json!({"a": 1, "b": 2}), &json!("oops"))
            .await;

        assert_eq!(paths(&results), vec![("a", false), ("b", false)]);
        assert_eq!(
            results[0].verdict.rationale.as_deref(),
            Some("field missing from actual: expected object, got string")
        );
        assert_eq!(results[1].verdict.expected, json!(2));
        assert_eq!(results[1].verdict.actual, Value::Null);
    }

    #[tokio::test]
    async fn test_malformed_output_scores_as_many_fields_as_expected() {
        let client = no_llm();
        let comparator = Comparator::fields([
            ("id", Comparator::Exact),
            ("vendor", Comparator::fields([("name", Comparator::Name), ("city", Comparator::Name)])),
            (
                "line_items",
                Comparator::unordered([("sku", Comparator::Exact), ("amount", Comparator::numeric())]),
            ),
        ]);
        let expected = json!({
            "id": 1,
            "vendor": {"name": "Acme", "city": "Paris"},
            "line_items": [{"sku": "A", "amount": 1}, {"sku": "B", "amount": 2}]
        });
        let leaves = expected_leaf_count(&comparator, &expected).unwrap();

        for actual in [json!(null), json!([1, 2]), json!({"id": 1, "vendor": "Acme", "line_items": 3})] {
            let results = Dispatcher::new(&client, None)
                .dispatch(&comparator, &expected, &actual)
                .await;
            assert_eq!(results.len(), leaves, "leaf count differs for {}", actual);
        }
    }

    #[tokio::test]
    async fn test_unordered_pairs_permuted_elements() {
        let client = no_llm();
        let expected = json!({"line_items": [
            {"sku": "A", "amount": 10},
            {"sku": "B", "amount": 20}
        ]});
        let actual = json!({"line_items": [
            {"sku": "B", "amount": 20.0},
            {"sku": "A", "amount": 10.001}
        ]});

        let results = Dispatcher::new(&client, None)
            .dispatch(&line_items(), &expected, &actual)
            .await;

        assert_eq!(
            paths(&results),
            vec![
                ("line_items[0].amount", true),
                ("line_items[0].sku", true),
                ("line_items[1].amount", true),
                ("line_items[1].sku", true),
            ]
        );
    }

    #[tokio::test]
    async fn test_unordered_reports_both_surplus_sides() {
        let client = no_llm();
        let expected = json!({"line_items": [
            {"sku": "A", "amount": 10},
            {"sku": "B", "amount": 20}
        ]});
        let actual = json!({"line_items": [
            {"sku": "B", "amount": 20},
            {"sku": "C", "amount": 5},
            {"sku": "D", "amount": 7}
        ]});

        let results = Dispatcher::new(&client, None)
            .dispatch(&line_items(), &expected, &actual)
            .await;

        // A pairs with a zero-score element rather than staying unmatched
        assert_eq!(
            paths(&results),
            vec![
                ("line_items[0].amount", false),
                ("line_items[0].sku", false),
                ("line_items[1].amount", true),
                ("line_items[1].sku", true),
                ("line_items[+2].amount", false),
                ("line_items[+2].sku", false),
            ]
        );
        assert_eq!(
            results[4].verdict.rationale.as_deref(),
            Some("unexpected actual element")
        );
        assert_eq!(results[5].verdict.actual, json!("D"));
    }

    #[tokio::test]
    async fn test_unordered_missing_actual_elements() {
        let client = no_llm();
        let expected = json!({"line_items": [{"sku": "A", "amount": 10}]});

        let results = Dispatcher::new(&client, None)
            .dispatch(&line_items(), &expected, &json!({"line_items": []}))
            .await;
        assert_eq!(
            paths(&results),
            vec![("line_items[0].amount", false), ("line_items[0].sku", false)]
        );
        assert_eq!(
            results[0].verdict.rationale.as_deref(),
            Some("no matching actual element")
        );

        let results = Dispatcher::new(&client, None)
            .dispatch(&line_items(), &expected, &json!({"line_items": "none"}))
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(
            results[1].verdict.rationale.as_deref(),
            Some("type mismatch: expected array, got string")
        );
    }

    #[tokio::test]
    async fn test_llm_leaf_uses_run_config() {
        let client = MockLlmClient::from_fn(|request| {
            assert!(request.prompt.contains("notes"));
            Ok(r#"{"passed": true, "rationale": "same meaning"}"#.to_string())
        });
        let config = LlmConfig::new("key", Provider::Anthropic).with_pricing(ModelPricing::new(1.0, 2.0));
        let comparator = Comparator::fields([("notes", Comparator::llm()), ("id", Comparator::Exact)]);

        let results = Dispatcher::new(&client, Some(&config))
            .dispatch(
                &comparator,
                &json!({"notes": "Deliver by Friday", "id": 1}),
                &json!({"notes": "Delivery due Friday", "id": 1}),
            )
            .await;

        assert_eq!(paths(&results), vec![("id", true), ("notes", true)]);
        assert_eq!(results[1].verdict.rationale.as_deref(), Some("same meaning"));
        assert!(results[1].verdict.cost > 0.0);
        assert_eq!(results[0].verdict.cost, 0.0);
        assert_eq!(client.calls(), 1);
    }

    #[tokio::test]
    async fn test_pairing_never_calls_llm() {
        let client = MockLlmClient::new(r#"{"passed": true, "rationale": "ok"}"#);
        let config = LlmConfig::new("key", Provider::Anthropic);
        let comparator = Comparator::unordered([
            ("sku", Comparator::Exact),
            ("description", Comparator::llm()),
        ]);
        let expected = json!([
            {"sku": "A", "description": "bolt"},
            {"sku": "B", "description": "nut"}
        ]);
        let actual = json!([
            {"sku": "B", "description": "hex nut"},
            {"sku": "A", "description": "steel bolt"}
        ]);

        let results = Dispatcher::new(&client, Some(&config))
            .dispatch(&comparator, &expected, &actual)
            .await;

        // one call per paired element only
        assert_eq!(client.calls(), 2);
        assert!(results.iter().all(|r| r.passed()));
        assert_eq!(results[0].path, "$[0].description");
    }

    #[test]
    fn test_leaf_count_includes_nested_and_list_fields() {
        let comparator = Comparator::fields([
            ("id", Comparator::Exact),
            ("missing", Comparator::Exact),
            (
                "line_items",
                Comparator::unordered([("sku", Comparator::Exact), ("amount", Comparator::numeric())]),
            ),
        ]);
        let expected = json!({"id": 1, "line_items": [{"sku": "A", "amount": 1}, {"sku": "B"}]});
        assert_eq!(expected_leaf_count(&comparator, &expected).unwrap(), 6);
    }

    #[test]
    fn test_leaf_count_rejects_shape_mismatch() {
        let err = expected_leaf_count(&line_items(), &json!({"line_items": [{"sku": "A"}, 3]})).unwrap_err();
        assert_eq!(
            err,
            EvalError::ShapeMismatch {
                path: "line_items[1]".to_string(),
                expected_shape: "object",
                found: "number".to_string(),
            }
        );

        let err = expected_leaf_count(&line_items(), &json!([])).unwrap_err();
        assert!(matches!(err, EvalError::ShapeMismatch { expected_shape: "object", .. }));
    }

    #[test]
    fn test_leaf_count_of_empty_list_is_zero() {
        assert_eq!(expected_leaf_count(&line_items(), &json!({"line_items": []})).unwrap(), 0);
    }

    #[test]
    fn test_check_comparator_requires_llm_config() {
        let comparator = Comparator::fields([(
            "line_items",
            Comparator::unordered([("description", Comparator::llm())]),
        )]);
        assert_eq!(
            check_comparator(&comparator, false).unwrap_err(),
            EvalError::MissingLlmConfig {
                path: "line_items[*].description".to_string()
            }
        );
        assert!(check_comparator(&comparator, true).is_ok());
    }

    #[test]
    fn test_check_comparator_rejects_bad_settings() {
        let comparator = Comparator::fields([("total", Comparator::Numeric(Tolerance::absolute(-1.0)))]);
        let err = check_comparator(&comparator, false).unwrap_err();
        assert!(matches!(err, EvalError::InvalidConfig(msg) if msg.ends_with("at total")));
    }
}
