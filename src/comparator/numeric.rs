//! @ai:module:intent Numeric comparison within an explicit tolerance
//! @ai:module:layer domain
//! @ai:module:public_api Tolerance, numeric, parse_number
//! @ai:module:stateless true

use crate::metrics::Verdict;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// @ai:intent Allowed difference between expected and actual numbers
///
/// A pair passes when `|actual - expected| <= max(absolute, relative * |expected|)`.
/// The default is an absolute tolerance of one cent and no relative tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    #[serde(default = "default_absolute")]
    pub absolute: f64,
    #[serde(default)]
    pub relative: f64,
}

fn default_absolute() -> f64 {
    0.01
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            absolute: default_absolute(),
            relative: 0.0,
        }
    }
}

impl Tolerance {
    /// @ai:intent Absolute tolerance only
    /// @ai:effects pure
    pub fn absolute(absolute: f64) -> Self {
        Self {
            absolute,
            relative: 0.0,
        }
    }

    /// @ai:intent Relative tolerance only, as a fraction of the expected magnitude
    /// @ai:effects pure
    pub fn relative(relative: f64) -> Self {
        Self {
            absolute: 0.0,
            relative,
        }
    }

    /// @ai:intent Largest difference accepted for an expected value
    /// @ai:effects pure
    pub fn allowed(&self, expected: f64) -> f64 {
        self.absolute.max(self.relative * expected.abs())
    }

    /// @ai:intent Reject negative or non-finite tolerances
    /// @ai:effects pure
    pub fn validate(&self) -> Result<(), String> {
        for (label, value) in [("absolute", self.absolute), ("relative", self.relative)] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!(
                    "{} tolerance must be a non-negative finite number, got {}",
                    label, value
                ));
            }
        }
        Ok(())
    }
}

/// @ai:intent Compare two values as numbers
/// @ai:effects pure
pub fn numeric(expected: &Value, actual: &Value, tolerance: &Tolerance) -> Verdict {
    let Some(e) = parse_number(expected) else {
        return Verdict::fail(expected, actual, "expected value is not a number");
    };
    let Some(a) = parse_number(actual) else {
        return Verdict::fail(expected, actual, "actual value is not a number");
    };

    let diff = (a - e).abs();
    let allowed = tolerance.allowed(e);
    // absorb representation error so 10.01 vs 10.00 sits on the boundary, not past it
    let slack = f64::EPSILON * e.abs().max(a.abs()).max(1.0) * 4.0;

    if diff <= allowed + slack {
        Verdict::pass(expected, actual)
    } else {
        Verdict::fail(
            expected,
            actual,
            format!("difference {} exceeds tolerance {}", diff, allowed),
        )
    }
}

/// @ai:intent Parse a JSON number, or a string such as "$1,234.50"
/// @ai:effects pure
pub fn parse_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_str(s),
        _ => None,
    }
}

fn parse_numeric_str(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negative, rest) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let rest = rest
        .strip_prefix(['$', '€', '£', '¥'])
        .unwrap_or(rest)
        .trim_start();

    let cleaned: String = rest.chars().filter(|c| *c != ',' && *c != '_').collect();
    if cleaned.is_empty() || cleaned.starts_with(['-', '+']) {
        return None;
    }

    let parsed: f64 = cleaned.parse().ok()?;
    if !parsed.is_finite() {
        return None;
    }

    Some(if negative { -parsed } else { parsed })
}
