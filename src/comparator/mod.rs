//! @ai:module:intent Comparator specifications and the leaf comparators they name
//! @ai:module:layer domain
//! @ai:module:public_api Comparator, FieldComparators, json_type_name
//! @ai:module:stateless true

pub mod exact;
pub mod llm;
pub mod name;
pub mod numeric;
pub mod unordered;

pub use exact::{exact, values_equal};
pub use llm::{default_judge_prompt, LlmCompare, LlmComparator};
pub use name::{name, normalize_name};
pub use numeric::{numeric, parse_number, Tolerance};
pub use unordered::{best_pairing, Pairing};

use crate::metrics::Verdict;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Comparator per key of an object, iterated in key order
pub type FieldComparators = BTreeMap<String, Comparator>;

/// @ai:intent How an expected value is compared with an actual value
///
/// Leaves (`Exact`, `Numeric`, `Name`, `Llm`) produce one verdict each.
/// `Fields` recurses into the keys of an object and `Unordered` pairs the
/// elements of two arrays of objects before recursing into each pair.
///
/// In TOML or JSON a leaf without settings may be written as a bare string:
///
/// ```toml
/// invoice_number = "exact"
/// total = { numeric = { absolute = 0.5 } }
/// line_items = { unordered = { sku = "exact", description = "llm" } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "ComparatorRepr")]
pub enum Comparator {
    Exact,
    Numeric(Tolerance),
    Name,
    Llm(LlmCompare),
    Unordered(FieldComparators),
    Fields(FieldComparators),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ComparatorRepr {
    Short(ShortComparator),
    Tagged(TaggedComparator),
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum ShortComparator {
    Exact,
    Numeric,
    Name,
    Llm,
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum TaggedComparator {
    Numeric(Tolerance),
    Llm(LlmCompare),
    Unordered(FieldComparators),
    Fields(FieldComparators),
}

impl From<ComparatorRepr> for Comparator {
    fn from(repr: ComparatorRepr) -> Self {
        match repr {
            ComparatorRepr::Short(ShortComparator::Exact) => Comparator::Exact,
            ComparatorRepr::Short(ShortComparator::Numeric) => Comparator::numeric(),
            ComparatorRepr::Short(ShortComparator::Name) => Comparator::Name,
            ComparatorRepr::Short(ShortComparator::Llm) => Comparator::llm(),
            ComparatorRepr::Tagged(TaggedComparator::Numeric(t)) => Comparator::Numeric(t),
            ComparatorRepr::Tagged(TaggedComparator::Llm(settings)) => Comparator::Llm(settings),
            ComparatorRepr::Tagged(TaggedComparator::Unordered(map)) => Comparator::Unordered(map),
            ComparatorRepr::Tagged(TaggedComparator::Fields(map)) => Comparator::Fields(map),
        }
    }
}

impl Comparator {
    /// @ai:intent Numeric comparator with the default tolerance
    pub fn numeric() -> Self {
        Comparator::Numeric(Tolerance::default())
    }

    /// @ai:intent LLM comparator with the default judge prompt
    pub fn llm() -> Self {
        Comparator::Llm(LlmCompare::default())
    }

    /// @ai:intent Build a `Fields` comparator from key/comparator pairs
    pub fn fields<K: Into<String>>(entries: impl IntoIterator<Item = (K, Comparator)>) -> Self {
        Comparator::Fields(collect_map(entries))
    }

    /// @ai:intent Build an `Unordered` comparator from the per-element key/comparator pairs
    pub fn unordered<K: Into<String>>(entries: impl IntoIterator<Item = (K, Comparator)>) -> Self {
        Comparator::Unordered(collect_map(entries))
    }

    /// @ai:intent Check this level's own settings; nested comparators are not visited
    /// @ai:effects pure
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Comparator::Numeric(tolerance) => tolerance.validate(),
            Comparator::Unordered(map) if map.is_empty() => {
                Err("unordered comparator needs at least one element field".to_string())
            }
            Comparator::Fields(map) if map.is_empty() => {
                Err("fields comparator needs at least one field".to_string())
            }
            _ => Ok(()),
        }
    }

    /// @ai:intent Whether any leaf below this comparator is an LLM comparator
    /// @ai:effects pure
    pub fn contains_llm(&self) -> bool {
        match self {
            Comparator::Llm(_) => true,
            Comparator::Unordered(map) | Comparator::Fields(map) => {
                map.values().any(Comparator::contains_llm)
            }
            _ => false,
        }
    }

    /// @ai:intent Run a deterministic leaf comparator
    /// @ai:post None for `Llm` and composite comparators
    /// @ai:effects pure
    pub fn compare_deterministic(&self, expected: &Value, actual: &Value) -> Option<Verdict> {
        match self {
            Comparator::Exact => Some(exact(expected, actual)),
            Comparator::Numeric(tolerance) => Some(numeric(expected, actual, tolerance)),
            Comparator::Name => Some(name(expected, actual)),
            _ => None,
        }
    }
}

fn collect_map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Comparator)>) -> FieldComparators {
    entries.into_iter().map(|(k, v)| (k.into(), v)).collect()
}

/// @ai:intent JSON type name for rationales and shape errors
/// @ai:effects pure
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
