//! Harness configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// System under test: endpoint and page contract
    pub sut: SutConfig,

    /// Delays, poll policy and bounds
    pub timings: Timings,

    /// Directory for result reports
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            sut: SutConfig::default(),
            timings: Timings::default(),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

/// Where the transliteration page lives and how its controls are found
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SutConfig {
    /// Page URL
    pub url: String,

    /// Accessible name of the single text-entry control
    pub input_label: String,

    /// Presentation selector shared by the input and output regions
    pub output_fingerprint: String,

    /// Dedicated output selector, used instead of the fingerprint when the page exposes one
    pub output_marker: Option<String>,
}

impl Default for SutConfig {
    fn default() -> Self {
        Self {
            url: "https://www.swifttranslator.com/".to_string(),
            input_label: "Input Your Singlish Text Here.".to_string(),
            output_fingerprint:
                "div.w-full.h-80.p-3.rounded-lg.ring-1.ring-slate-300.whitespace-pre-wrap"
                    .to_string(),
            output_marker: None,
        }
    }
}

impl SutConfig {
    /// Selector used to enumerate output candidates
    pub fn output_selector(&self) -> &str {
        self.output_marker.as_deref().unwrap_or(&self.output_fingerprint)
    }
}

/// Timing policy, all values in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Quiescence settle after the page reports network idle
    pub page_load_ms: u64,

    /// Upper bound for navigation and load-state waits
    pub load_timeout_ms: u64,

    /// Grace period after clearing the input, lets pending debounce timers expire
    pub clear_grace_ms: u64,

    /// Stabilization window after output first appears
    pub settle_ms: u64,

    /// Upper bound for output to appear
    pub detect_timeout_ms: u64,

    /// Initial poll interval
    pub poll_interval_ms: u64,

    /// Poll interval ceiling under backoff
    pub poll_max_interval_ms: u64,

    /// Multiplier applied to the poll interval after each miss
    pub poll_backoff: f64,

    /// Cool-down between consecutive cases
    pub cooldown_ms: u64,

    /// Per-unit delay for keystroke-paced submission
    pub keystroke_delay_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            page_load_ms: 2000,
            load_timeout_ms: 30_000,
            clear_grace_ms: 1000,
            settle_ms: 3000,
            detect_timeout_ms: 10_000,
            poll_interval_ms: 100,
            poll_max_interval_ms: 500,
            poll_backoff: 1.5,
            cooldown_ms: 2000,
            keystroke_delay_ms: 150,
        }
    }
}

impl Timings {
    pub fn page_load(&self) -> Duration {
        Duration::from_millis(self.page_load_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }

    pub fn clear_grace(&self) -> Duration {
        Duration::from_millis(self.clear_grace_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn poll_max_interval(&self) -> Duration {
        Duration::from_millis(self.poll_max_interval_ms)
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn keystroke_delay(&self) -> Duration {
        Duration::from_millis(self.keystroke_delay_ms)
    }
}

impl HarnessConfig {
    /// Load configuration from file, falling back to defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the harness cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.sut.url.trim().is_empty() {
            return Err(Error::InvalidConfig("sut.url is empty".to_string()));
        }
        if self.sut.input_label.trim().is_empty() {
            return Err(Error::InvalidConfig("sut.input_label is empty".to_string()));
        }
        if self.sut.output_selector().trim().is_empty() {
            return Err(Error::InvalidConfig("output selector is empty".to_string()));
        }

        let t = &self.timings;
        if t.detect_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "timings.detect_timeout_ms must be positive".to_string(),
            ));
        }
        if t.poll_interval_ms == 0 || t.poll_interval_ms > t.poll_max_interval_ms {
            return Err(Error::InvalidConfig(format!(
                "timings.poll_interval_ms ({}) must be in 1..={}",
                t.poll_interval_ms, t.poll_max_interval_ms
            )));
        }
        if !t.poll_backoff.is_finite() || t.poll_backoff < 1.0 {
            return Err(Error::InvalidConfig(format!(
                "timings.poll_backoff ({}) must be finite and >= 1.0",
                t.poll_backoff
            )));
        }
        Ok(())
    }
}
