//! @ai:module:intent Test cases, suite definitions and loading
//! @ai:module:layer domain
//! @ai:module:public_api TestCase, Suite, SuiteLoader

pub mod case;
pub mod loader;
pub mod suite;

pub use case::TestCase;
pub use loader::{SuiteLoader, SuiteLoaderTrait};
pub use suite::{CaseFile, Suite, SuiteFile, SuiteMetadata, EXAMPLE_SUITE};
