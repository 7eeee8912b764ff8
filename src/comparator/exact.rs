//! @ai:module:intent Structural deep equality over JSON values
//! @ai:module:layer domain
//! @ai:module:public_api exact, values_equal
//! @ai:module:stateless true

use crate::comparator::json_type_name;
use crate::metrics::Verdict;
use serde_json::Value;

/// @ai:intent Compare two values for deep equality
/// @ai:effects pure
pub fn exact(expected: &Value, actual: &Value) -> Verdict {
    if values_equal(expected, actual) {
        return Verdict::pass(expected, actual);
    }

    let expected_type = json_type_name(expected);
    let actual_type = json_type_name(actual);
    let rationale = if expected_type != actual_type {
        format!("type mismatch: expected {}, got {}", expected_type, actual_type)
    } else {
        "values differ".to_string()
    };

    Verdict::fail(expected, actual, rationale)
}

/// @ai:intent Recursive equality: arrays are order-sensitive, objects key-set-sensitive,
///            numbers compare by value so `10` equals `10.0`
/// @ai:effects pure
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (as_integer(x), as_integer(y)) {
            // f64 cannot tell integers above 2^53 apart
            (Some(x), Some(y)) => x == y,
            _ => matches!((x.as_f64(), y.as_f64()), (Some(x), Some(y)) if x == y),
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(key, x)| ys.get(key).is_some_and(|y| values_equal(x, y)))
        }
        _ => a == b,
    }
}

fn as_integer(n: &serde_json::Number) -> Option<i128> {
    n.as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_values_pass() {
        let values = [
            json!(null),
            json!(true),
            json!(42),
            json!("Acme"),
            json!([1, 2, 3]),
            json!({"a": {"b": [1, {"c": "d"}]}}),
        ];
        for v in &values {
            assert!(exact(v, v).passed, "{} should equal itself", v);
        }
    }

    #[test]
    fn test_integer_and_float_are_equal() {
        assert!(exact(&json!(10), &json!(10.0)).passed);
    }

    #[test]
    fn test_large_integers_compare_exactly() {
        let verdict = exact(&json!(9007199254740993u64), &json!(9007199254740992u64));
        assert!(!verdict.passed);
        assert_eq!(verdict.rationale.as_deref(), Some("values differ"));

        assert!(exact(&json!(u64::MAX), &json!(u64::MAX)).passed);
        assert!(!exact(&json!(-1), &json!(u64::MAX)).passed);
        assert!(exact(&json!(-3), &json!(-3.0)).passed);
    }

    #[test]
    fn test_array_order_matters() {
        let verdict = exact(&json!([1, 2]), &json!([2, 1]));
        assert!(!verdict.passed);
        assert_eq!(verdict.rationale.as_deref(), Some("values differ"));
    }

    #[test]
    fn test_object_key_set_matters() {
        assert!(!exact(&json!({"a": 1}), &json!({"a": 1, "b": 2})).passed);
        assert!(!exact(&json!({"a": 1, "b": 2}), &json!({"a": 1, "c": 2})).passed);
    }

    #[test]
    fn test_type_mismatch_rationale() {
        let verdict = exact(&json!("10"), &json!(10));
        assert!(!verdict.passed);
        assert_eq!(
            verdict.rationale.as_deref(),
            Some("type mismatch: expected string, got number")
        );
        assert_eq!(verdict.cost, 0.0);
    }
}
