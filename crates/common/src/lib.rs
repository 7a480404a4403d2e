//! swiftcheck common library
//!
//! Shared by the conformance runner: the immutable test corpus that describes
//! the transliteration service's expected behavior, and the harness
//! configuration (endpoint, page contract, timing policy).

pub mod config;
pub mod corpus;
pub mod error;

pub use config::{HarnessConfig, SutConfig, Timings};
pub use corpus::{CaseFilter, CaseTags, Corpus, Expectation, LengthClass, Partition, TestCase};
pub use error::{Error, Result};

/// swiftcheck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
