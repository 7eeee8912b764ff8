//! @ai:module:intent A labeled input/expected-output pair
//! @ai:module:layer domain
//! @ai:module:public_api TestCase
//! @ai:module:stateless true

use serde::{Deserialize, Serialize};

/// @ai:intent One test case: the workflow input and the output it should produce
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase<I, O> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub input: I,
    pub expected: O,
}

impl<I, O> TestCase<I, O> {
    pub fn new(input: I, expected: O) -> Self {
        Self {
            name: None,
            input,
            expected,
        }
    }

    pub fn named(name: impl Into<String>, input: I, expected: O) -> Self {
        Self {
            name: Some(name.into()),
            input,
            expected,
        }
    }
}
