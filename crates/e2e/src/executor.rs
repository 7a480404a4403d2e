//! Sequential case execution against one session

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use swiftcheck_common::{Expectation, LengthClass, Partition, TestCase};
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use crate::detector::CompletionDetector;
use crate::driver::{PageDriver, Session};
use crate::error::{E2eError, E2eResult, FailureKind};

/// Per-case lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseState {
    Idle,
    Cleared,
    Submitted,
    Polling,
    Stable,
    TimedOut,
    Compared,
}

impl fmt::Display for CaseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Tracks and validates lifecycle transitions of one case
#[derive(Debug, Clone)]
pub struct Lifecycle {
    current: CaseState,
    visited: Vec<CaseState>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            current: CaseState::Idle,
            visited: vec![CaseState::Idle],
        }
    }
}

impl Lifecycle {
    pub fn current(&self) -> CaseState {
        self.current
    }

    pub fn visited(&self) -> &[CaseState] {
        &self.visited
    }

    pub fn advance(&mut self, next: CaseState) -> E2eResult<()> {
        use CaseState::*;

        let allowed = matches!(
            (self.current, next),
            (Idle, Cleared)
                | (Cleared, Submitted)
                | (Submitted, Polling)
                | (Polling, Stable)
                | (Polling, TimedOut)
                | (Stable, Compared)
                // second stage of a staged case
                | (Stable, Submitted)
        );
        if !allowed {
            return Err(E2eError::InvalidTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }

        debug!("case state {} -> {}", self.current, next);
        self.current = next;
        self.visited.push(next);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Passed,
    Failed,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseFailure {
    /// `None` when the case was skipped or hit a session-level error
    pub kind: Option<FailureKind>,
    pub message: String,
}

/// Reportable outcome of one case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseResult {
    pub id: String,
    pub name: String,
    pub partition: Partition,
    pub category: String,
    pub grammar: String,
    pub length_class: LengthClass,
    pub input: String,
    pub expected: String,
    pub actual: Option<String>,
    pub status: CaseStatus,
    pub failure: Option<CaseFailure>,
    pub states: Vec<CaseState>,
    pub polls: u32,
    pub duration_ms: u64,
}

impl CaseResult {
    fn for_case(case: &TestCase) -> Self {
        Self {
            id: case.id.clone(),
            name: case.name.clone(),
            partition: case.partition,
            category: case.tags.category.clone(),
            grammar: case.tags.grammar.clone(),
            length_class: case.tags.length_class,
            input: case.input.clone(),
            expected: case.expectation.final_output().to_string(),
            actual: None,
            status: CaseStatus::Skipped,
            failure: None,
            states: vec![CaseState::Idle],
            polls: 0,
            duration_ms: 0,
        }
    }

    /// Placeholder for a case that never ran because its session failed
    pub fn skipped(case: &TestCase, reason: &str) -> Self {
        Self {
            failure: Some(CaseFailure {
                kind: None,
                message: reason.to_string(),
            }),
            ..Self::for_case(case)
        }
    }

    /// The case that was running when its session failed
    pub fn session_failure(case: &TestCase, reason: &str) -> Self {
        Self {
            status: CaseStatus::Failed,
            ..Self::skipped(case, reason)
        }
    }

    pub fn passed(&self) -> bool {
        self.status == CaseStatus::Passed
    }
}

/// Outcome of one partition run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionResult {
    pub partition: Partition,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Session-level error that stopped the partition
    pub aborted: Option<String>,
    pub duration_ms: u64,
    pub cases: Vec<CaseResult>,
}

impl PartitionResult {
    pub fn new(partition: Partition) -> Self {
        Self {
            partition,
            passed: 0,
            failed: 0,
            skipped: 0,
            aborted: None,
            duration_ms: 0,
            cases: Vec::new(),
        }
    }

    pub fn push(&mut self, result: CaseResult) {
        match result.status {
            CaseStatus::Passed => self.passed += 1,
            CaseStatus::Failed => self.failed += 1,
            CaseStatus::Skipped => self.skipped += 1,
        }
        self.cases.push(result);
    }

    /// Record every case of an aborted partition as skipped
    pub fn abort<'a>(&mut self, reason: &str, remaining: impl IntoIterator<Item = &'a TestCase>) {
        warn!("Partition {} aborted: {}", self.partition, reason);
        self.aborted = Some(reason.to_string());
        for case in remaining {
            self.push(CaseResult::skipped(case, reason));
        }
    }
}

/// Compare trimmed output against the trimmed expectation
pub fn compare(expected: &str, actual: &str) -> E2eResult<()> {
    let expected = expected.trim();
    let actual = actual.trim();
    if expected == actual {
        return Ok(());
    }

    let position = expected
        .chars()
        .zip(actual.chars())
        .take_while(|(e, a)| e == a)
        .count();
    Err(E2eError::Mismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
        position,
    })
}

/// Drives one session through cases, strictly one after another
pub struct Executor<'s, D: PageDriver> {
    session: &'s mut Session<D>,
    detector: CompletionDetector,
    keystroke_delay: Duration,
    cooldown: Duration,
}

impl<'s, D: PageDriver> Executor<'s, D> {
    pub fn new(session: &'s mut Session<D>) -> Self {
        let timings = session.config().timings.clone();
        Self {
            session,
            detector: CompletionDetector::new(&timings),
            keystroke_delay: timings.keystroke_delay(),
            cooldown: timings.cooldown(),
        }
    }

    pub fn with_detector(mut self, detector: CompletionDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Run cases in order; case failures are recorded, session failures abort
    pub async fn run_partition(&mut self, partition: Partition, cases: &[&TestCase]) -> PartitionResult {
        let start = Instant::now();
        let mut result = PartitionResult::new(partition);

        info!("Running {} {} case(s)...", cases.len(), partition);

        for (index, case) in cases.iter().enumerate() {
            match self.run_case(case).await {
                Ok(case_result) => {
                    result.push(case_result);
                    sleep(self.cooldown).await;
                }
                Err(e) => {
                    error!("✗ {} - session error: {}", case.id, e);
                    let reason = e.to_string();
                    result.push(CaseResult::session_failure(case, &reason));
                    result.abort(&reason, cases[index + 1..].iter().copied());
                    break;
                }
            }
        }

        result.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "{}: {} passed, {} failed, {} skipped ({} ms)",
            partition, result.passed, result.failed, result.skipped, result.duration_ms
        );
        result
    }

    /// Run one case; `Err` only for session-level errors
    pub async fn run_case(&mut self, case: &TestCase) -> E2eResult<CaseResult> {
        let start = Instant::now();
        let mut lifecycle = Lifecycle::default();
        let mut result = CaseResult::for_case(case);
        let mut polls = 0u32;

        let outcome = self.execute(case, &mut lifecycle, &mut polls).await;

        result.states = lifecycle.visited().to_vec();
        result.polls = polls;
        result.duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(actual) => {
                result.actual = Some(actual);
                result.status = CaseStatus::Passed;
                info!("✓ {} ({} ms)", case.id, result.duration_ms);
            }
            Err(e) => match e.failure_kind() {
                Some(kind) => {
                    if let E2eError::Mismatch { actual, .. } = &e {
                        result.actual = Some(actual.clone());
                    }
                    error!("✗ {} - {}", case.id, e);
                    result.status = CaseStatus::Failed;
                    result.failure = Some(CaseFailure {
                        kind: Some(kind),
                        message: e.to_string(),
                    });
                }
                None => return Err(e),
            },
        }

        Ok(result)
    }

    async fn execute(
        &mut self,
        case: &TestCase,
        lifecycle: &mut Lifecycle,
        polls: &mut u32,
    ) -> E2eResult<String> {
        self.session.clear_input().await?;
        lifecycle.advance(CaseState::Cleared)?;

        match &case.expectation {
            Expectation::Exact { .. } => {
                self.session.submit(&case.input).await?;
                lifecycle.advance(CaseState::Submitted)?;
            }
            Expectation::Staged { partial_input, .. } => {
                let remaining = case.remaining_input().ok_or_else(|| {
                    E2eError::Input(format!("{}: partial input is not a prefix", case.id))
                })?;

                self.session
                    .submit_incremental(partial_input, self.keystroke_delay)
                    .await?;
                lifecycle.advance(CaseState::Submitted)?;

                lifecycle.advance(CaseState::Polling)?;
                match self.detector.await_presence(&mut *self.session).await {
                    Ok(obs) => {
                        *polls += obs.polls;
                        debug!("{} partial output: {:?}", case.id, obs.value);
                        lifecycle.advance(CaseState::Stable)?;
                    }
                    Err(e) => {
                        if matches!(e, E2eError::Timeout { .. }) {
                            lifecycle.advance(CaseState::TimedOut)?;
                        }
                        return Err(e);
                    }
                }

                self.session
                    .submit_incremental(remaining, self.keystroke_delay)
                    .await?;
                lifecycle.advance(CaseState::Submitted)?;
            }
        }

        lifecycle.advance(CaseState::Polling)?;
        match self.detector.await_stable(&mut *self.session).await {
            Ok(obs) => {
                *polls += obs.polls;
                lifecycle.advance(CaseState::Stable)?;
            }
            Err(e) => {
                if matches!(e, E2eError::Timeout { .. }) {
                    lifecycle.advance(CaseState::TimedOut)?;
                }
                return Err(e);
            }
        }

        let actual = self.session.read_output().await?;
        lifecycle.advance(CaseState::Compared)?;
        compare(case.expectation.final_output(), &actual)?;
        Ok(actual)
    }
}
