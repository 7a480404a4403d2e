//! Session over one page of the system under test
//!
//! `PageDriver` is the narrow browser interface; `Session` layers the
//! harness contract on top of it (quiescent open, clear with grace period,
//! atomic or paced submission, instantaneous output read).

use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swiftcheck_common::HarnessConfig;
use tokio::time::sleep;
use tracing::{debug, info};

use crate::detector::{select_output, Probe};
use crate::error::{E2eError, E2eResult};

/// A page region matching the output selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    /// Lower-case element tag
    pub tag: String,

    /// ARIA role attribute, if any
    #[serde(default)]
    pub role: Option<String>,

    /// `contenteditable` surface
    #[serde(default)]
    pub editable: bool,

    /// The region is the designated input control itself
    #[serde(default)]
    pub designated_input: bool,

    /// Raw text content
    #[serde(default)]
    pub text: String,
}

impl Region {
    /// Whether the region can accept input and therefore cannot be the output
    pub fn is_input_capable(&self) -> bool {
        self.designated_input
            || self.editable
            || matches!(self.tag.as_str(), "textarea" | "input")
            || self.role.as_deref() == Some("textbox")
    }
}

/// Browser page primitives
#[async_trait]
pub trait PageDriver: Send {
    /// Load `url` and wait for network quiescence
    async fn navigate(&mut self, url: &str, load_timeout: Duration) -> E2eResult<()>;

    /// Empty the text control named `label`
    async fn clear_input(&mut self, label: &str) -> E2eResult<()>;

    /// Replace the control's content with `text`
    async fn fill_input(&mut self, label: &str, text: &str) -> E2eResult<()>;

    /// Type `text` one unit at a time, appending to the current content
    async fn type_input(&mut self, label: &str, text: &str, per_unit_delay: Duration) -> E2eResult<()>;

    /// Enumerate regions matching `selector`, flagging the control named `label`
    async fn query_regions(&mut self, label: &str, selector: &str) -> E2eResult<Vec<Region>>;

    /// Release the page and browser
    async fn close(&mut self) -> E2eResult<()>;
}

/// Creates one driver per session
#[async_trait]
pub trait DriverFactory: Send + Sync {
    type Driver: PageDriver;

    async fn create(&self, config: &HarnessConfig) -> E2eResult<Self::Driver>;
}

/// One live binding to the system under test
///
/// Not shared: every operation takes `&mut self`, so cases against one
/// session run strictly in sequence.
pub struct Session<D: PageDriver> {
    driver: D,
    config: HarnessConfig,
    open: bool,
}

impl<D: PageDriver> Session<D> {
    pub fn new(driver: D, config: HarnessConfig) -> Self {
        Self {
            driver,
            config,
            open: false,
        }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Navigate to the endpoint and wait until the page is quiescent
    pub async fn open(&mut self) -> E2eResult<()> {
        let url = self.config.sut.url.clone();
        info!("Opening session at {}", url);

        self.driver
            .navigate(&url, self.config.timings.load_timeout())
            .await?;
        sleep(self.config.timings.page_load()).await;

        self.open = true;
        Ok(())
    }

    /// Empty the input, then wait out any pending debounce from earlier input
    pub async fn clear_input(&mut self) -> E2eResult<()> {
        self.ensure_open()?;
        self.driver.clear_input(&self.config.sut.input_label).await?;
        sleep(self.config.timings.clear_grace()).await;
        Ok(())
    }

    /// Replace the input content with `text` in one step
    pub async fn submit(&mut self, text: &str) -> E2eResult<()> {
        self.ensure_open()?;
        debug!("Submitting {} chars", text.chars().count());
        self.driver.fill_input(&self.config.sut.input_label, text).await
    }

    /// Type `text` with a fixed delay between units
    pub async fn submit_incremental(&mut self, text: &str, per_unit_delay: Duration) -> E2eResult<()> {
        self.ensure_open()?;
        debug!(
            "Typing {} chars at {} ms/unit",
            text.chars().count(),
            per_unit_delay.as_millis()
        );
        self.driver
            .type_input(&self.config.sut.input_label, text, per_unit_delay)
            .await
    }

    /// Current trimmed output text; does not wait
    pub async fn read_output(&mut self) -> E2eResult<String> {
        self.ensure_open()?;
        let regions = self.regions().await?;
        Ok(select_output(&regions)
            .map(|r| r.text.trim().to_string())
            .unwrap_or_default())
    }

    pub async fn close(&mut self) -> E2eResult<()> {
        self.open = false;
        self.driver.close().await
    }

    async fn regions(&mut self) -> E2eResult<Vec<Region>> {
        let sut = &self.config.sut;
        self.driver
            .query_regions(&sut.input_label, sut.output_selector())
            .await
    }

    fn ensure_open(&self) -> E2eResult<()> {
        if self.open {
            Ok(())
        } else {
            Err(E2eError::Navigation {
                url: self.config.sut.url.clone(),
                reason: "session is not open".to_string(),
            })
        }
    }
}

#[async_trait]
impl<D: PageDriver> Probe for Session<D> {
    type Output = String;

    async fn probe(&mut self) -> E2eResult<Option<String>> {
        self.ensure_open()?;
        let regions = self.regions().await?;
        Ok(select_output(&regions).map(|r| r.text.trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn region(tag: &str, role: Option<&str>) -> Region {
        Region {
            tag: tag.to_string(),
            role: role.map(String::from),
            text: "text".to_string(),
            ..Default::default()
        }
    }

    #[test_case(region("textarea", None), true ; "textarea")]
    #[test_case(region("input", None), true ; "input element")]
    #[test_case(region("div", Some("textbox")), true ; "textbox role")]
    #[test_case(Region { editable: true, ..region("div", None) }, true ; "contenteditable")]
    #[test_case(Region { designated_input: true, ..region("div", None) }, true ; "designated input")]
    #[test_case(region("div", None), false ; "plain div")]
    #[test_case(region("div", Some("status")), false ; "status role")]
    fn test_input_capability(region: Region, expected: bool) {
        assert_eq!(region.is_input_capable(), expected);
    }
}
