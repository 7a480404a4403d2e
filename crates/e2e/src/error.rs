//! Error types for conformance runs

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Input control error: {0}")]
    Input(String),

    #[error("Timeout waiting for: {what} (after {waited_ms} ms)")]
    Timeout { what: String, waited_ms: u64 },

    #[error("Output mismatch at char {position}: expected {expected:?}, got {actual:?}")]
    Mismatch {
        expected: String,
        actual: String,
        position: usize,
    },

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Browser bridge error: {0}")]
    Bridge(String),

    #[error("Invalid case state transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Corpus/config error: {0}")]
    Common(#[from] swiftcheck_common::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;

/// Case-level failure classes; these never abort a partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Input,
    Timeout,
    Mismatch,
}

impl E2eError {
    /// `Some` for errors that fail only the current case
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            E2eError::Input(_) => Some(FailureKind::Input),
            E2eError::Timeout { .. } => Some(FailureKind::Timeout),
            E2eError::Mismatch { .. } => Some(FailureKind::Mismatch),
            _ => None,
        }
    }

    /// Errors that invalidate the session and stop the remaining cases
    pub fn is_session_fatal(&self) -> bool {
        self.failure_kind().is_none()
    }
}
