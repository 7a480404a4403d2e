//! Completion detection
//!
//! The page gives no "done" signal. It renders incrementally behind a
//! debounce, and its output region carries the same presentation selector
//! as the input control. Completion is therefore inferred:
//!
//! 1. enumerate regions matching the output selector and drop every region
//!    that can accept input,
//! 2. the first remaining region with non-empty trimmed text qualifies,
//! 3. once something qualifies, keep re-checking for a settle window so
//!    trailing re-renders land before the content is trusted,
//! 4. the appearance phase is bounded; no qualifying output within the bound
//!    is a `Timeout`, never a hang.
//!
//! ```text
//!            probe() == None            probe() == Some
//!   Polling ───────────────▶ Polling ─────────────────▶ Settling
//!      │   (sleep, backoff)                                 │
//!      │ deadline passed                 predicate held for │ settle
//!      ▼                                                    ▼
//!   TimedOut ◀──── deadline passed ◀── predicate dropped   Stable
//! ```

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swiftcheck_common::Timings;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::driver::Region;
use crate::error::{E2eError, E2eResult};

/// Something that can be asked whether the awaited condition holds
#[async_trait]
pub trait Probe: Send {
    type Output: Send;

    /// `Some` when the condition holds, carrying the observed value
    async fn probe(&mut self) -> E2eResult<Option<Self::Output>>;
}

/// Parameters of the bounded poll
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollPolicy {
    /// First sleep between probes, also the probe cadence while settling
    pub interval: Duration,

    /// Ceiling for the backed-off interval
    pub max_interval: Duration,

    /// Interval multiplier after each miss
    pub backoff: f64,

    /// How long the condition must keep holding before it is trusted
    pub settle: Duration,

    /// Bound on the appearance phase
    pub timeout: Duration,
}

impl PollPolicy {
    /// Full stabilization, for final output
    pub fn stable(timings: &Timings) -> Self {
        Self {
            interval: timings.poll_interval(),
            max_interval: timings.poll_max_interval(),
            backoff: timings.poll_backoff,
            settle: timings.settle(),
            timeout: timings.detect_timeout(),
        }
    }

    /// Presence only, for mid-typing output
    pub fn presence(timings: &Timings) -> Self {
        Self {
            settle: Duration::ZERO,
            ..Self::stable(timings)
        }
    }

    fn next_interval(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff)
            .map_or(self.max_interval, |d| d.min(self.max_interval))
    }
}

/// A value the probe reported once the condition settled
#[derive(Debug, Clone, PartialEq)]
pub struct Observation<T> {
    pub value: T,
    /// Total probes issued
    pub polls: u32,
    /// Time from the first probe until the value was accepted
    pub elapsed: Duration,
}

/// Poll `probe` until its condition holds for `policy.settle`
///
/// During the settle window the latest value wins. If the condition stops
/// holding the window is abandoned and polling resumes under the original
/// deadline.
pub async fn poll_stable<P: Probe>(
    policy: &PollPolicy,
    probe: &mut P,
    what: &str,
) -> E2eResult<Observation<P::Output>> {
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut interval = policy.interval;
    let mut polls = 0u32;

    loop {
        polls += 1;
        if let Some(first) = probe.probe().await? {
            let mut value = first;
            let settle_until = Instant::now() + policy.settle;
            let mut held = true;

            while Instant::now() < settle_until {
                let step = policy.interval.min(settle_until - Instant::now());
                sleep(step).await;
                polls += 1;
                match probe.probe().await? {
                    Some(latest) => value = latest,
                    None => {
                        held = false;
                        break;
                    }
                }
            }

            if held {
                let elapsed = started.elapsed();
                debug!("{} stable after {} polls ({} ms)", what, polls, elapsed.as_millis());
                return Ok(Observation { value, polls, elapsed });
            }

            warn!("{} vanished inside the settle window, polling again", what);
            interval = policy.interval;
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(E2eError::Timeout {
                what: what.to_string(),
                waited_ms: started.elapsed().as_millis() as u64,
            });
        }

        sleep(interval.min(deadline - now)).await;
        interval = policy.next_interval(interval);
    }
}

/// First region that cannot accept input and shows non-empty trimmed text
pub fn select_output(regions: &[Region]) -> Option<&Region> {
    regions
        .iter()
        .filter(|r| !r.is_input_capable())
        .find(|r| !r.text.trim().is_empty())
}

/// Waits for the output region to show a settled transformation
#[derive(Debug, Clone)]
pub struct CompletionDetector {
    stable: PollPolicy,
    presence: PollPolicy,
}

impl CompletionDetector {
    pub fn new(timings: &Timings) -> Self {
        Self {
            stable: PollPolicy::stable(timings),
            presence: PollPolicy::presence(timings),
        }
    }

    pub fn with_policies(stable: PollPolicy, presence: PollPolicy) -> Self {
        Self { stable, presence }
    }

    /// Non-empty output that held for the settle window
    pub async fn await_stable<P>(&self, probe: &mut P) -> E2eResult<Observation<String>>
    where
        P: Probe<Output = String>,
    {
        poll_stable(&self.stable, probe, "stable output").await
    }

    /// Any non-empty output, no settle window
    pub async fn await_presence<P>(&self, probe: &mut P) -> E2eResult<Observation<String>>
    where
        P: Probe<Output = String>,
    {
        poll_stable(&self.presence, probe, "partial output").await
    }
}
