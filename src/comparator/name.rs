//! @ai:module:intent Noise-tolerant comparison of names and short labels
//! @ai:module:layer domain
//! @ai:module:public_api name, normalize_name
//! @ai:module:stateless true

use crate::comparator::exact::exact;
use crate::metrics::Verdict;
use serde_json::Value;

/// @ai:intent Normalize a name: lowercase, then drop whitespace and separator punctuation
///
/// Absorbs case, punctuation and spacing differences ("Acme, Inc." / "ACME Inc",
/// "Net 30" / "NET30"). Letters, digits and symbols such as `+`, `#` or `&`
/// stay significant, so "C++" and "C" remain distinct.
/// @ai:effects pure
pub fn normalize_name(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .filter(|&c| !is_separator(c))
        .collect()
}

fn is_separator(c: char) -> bool {
    c.is_whitespace()
        || matches!(
            c,
            '.' | ',' | ';' | ':' | '!' | '?' | '\'' | '"' | '`' | '-' | '_' | '/' | '\\' | '(' | ')'
                | '[' | ']' | '\u{2018}' | '\u{2019}' | '\u{201C}' | '\u{201D}' | '\u{2013}' | '\u{2014}'
        )
}

/// @ai:intent Compare two strings after name normalization; non-strings fall back to exact equality
/// @ai:effects pure
pub fn name(expected: &Value, actual: &Value) -> Verdict {
    let (Value::String(e), Value::String(a)) = (expected, actual) else {
        return exact(expected, actual);
    };

    let normalized_expected = normalize_name(e);
    let normalized_actual = normalize_name(a);

    // nothing left to compare: "!!!" must not match ""
    if normalized_expected.is_empty() || normalized_actual.is_empty() {
        return if e.trim() == a.trim() {
            Verdict::pass(expected, actual)
        } else {
            Verdict::fail(expected, actual, "names differ")
        };
    }

    if normalized_expected == normalized_actual {
        Verdict::pass(expected, actual)
    } else {
        Verdict::fail(
            expected,
            actual,
            format!(
                "normalized names differ: \"{}\" vs \"{}\"",
                normalized_expected, normalized_actual
            ),
        )
    }
}
