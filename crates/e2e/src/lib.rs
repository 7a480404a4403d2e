//! swiftcheck E2E conformance harness
//!
//! Validates a hosted transliteration page as a black box: it drives the
//! page through a browser, infers when the asynchronous rendering has
//! settled, and compares the output with the corpus in `swiftcheck-common`.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Conformance runner (Rust)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  TestRunner<F: DriverFactory>                               │
//! │    ├── one Session per partition (factory-injected driver)  │
//! │    ├── Executor::run_partition(cases) -> PartitionResult    │
//! │    │     clear → submit → detect → read → compare → cool    │
//! │    ├── check_determinism(id)                                │
//! │    └── write_results() -> conformance-results.json          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Session<D: PageDriver>                                     │
//! │    open / clear_input / submit / submit_incremental /       │
//! │    read_output                                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  CompletionDetector                                         │
//! │    input-exclusion selection + poll_stable(settle, bound)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  PlaywrightDriver: Node bridge, JSON lines over stdio       │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod detector;
pub mod driver;
pub mod error;
pub mod executor;
pub mod playwright;
pub mod runner;

pub use detector::{CompletionDetector, PollPolicy};
pub use driver::{DriverFactory, PageDriver, Region, Session};
pub use error::{E2eError, E2eResult, FailureKind};
pub use executor::{CaseResult, CaseState, CaseStatus, Executor, PartitionResult};
pub use runner::{SuiteResult, TestRunner};
