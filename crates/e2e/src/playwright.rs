//! Playwright browser automation
//!
//! The browser is controlled by a long-lived Node process running a small
//! bridge script. Rust writes one JSON request per line to its stdin and
//! reads one JSON response per line from its stdout, so a single page (and
//! its debounce timers) survives across every case of a session.

use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use swiftcheck_common::HarnessConfig;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tracing::{debug, info, warn};

use crate::driver::{DriverFactory, PageDriver, Region};
use crate::error::{E2eError, E2eResult};

const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require(require.resolve('playwright', { paths: [process.cwd()] }));

const send = (msg) => process.stdout.write(JSON.stringify(msg) + '\n');
const errorKind = (op) => {
  if (op === 'goto') return 'navigation';
  if (op === 'clear' || op === 'fill' || op === 'type') return 'input';
  return 'page';
};

(async () => {
  const browserType = playwright[process.env.SWIFTCHECK_BROWSER || 'chromium'];
  const browser = await browserType.launch({ headless: process.env.SWIFTCHECK_HEADLESS !== '0' });
  const context = await browser.newContext();
  const page = await context.newPage();
  const textbox = (label) => page.getByRole('textbox', { name: label });

  const dispatch = async (req) => {
    switch (req.op) {
      case 'goto':
        await page.goto(req.url, { timeout: req.timeout_ms });
        await page.waitForLoadState('networkidle', { timeout: req.timeout_ms });
        return null;
      case 'clear':
        await textbox(req.label).clear({ timeout: req.timeout_ms });
        return null;
      case 'fill':
        await textbox(req.label).fill(req.text, { timeout: req.timeout_ms });
        return null;
      case 'type':
        await textbox(req.label).pressSequentially(req.text, { delay: req.delay_ms, timeout: req.timeout_ms });
        return null;
      case 'regions': {
        const input = await textbox(req.label).elementHandle({ timeout: req.timeout_ms }).catch(() => null);
        return await page.$$eval(req.selector, (els, inputEl) => els.map((el) => ({
          tag: el.tagName.toLowerCase(),
          role: el.getAttribute('role'),
          editable: el.isContentEditable,
          designated_input: el === inputEl,
          text: el.textContent || '',
        })), input);
      }
      case 'close':
        return null;
      default:
        throw new Error('unknown op: ' + req.op);
    }
  };

  send({ id: 0, ok: true, value: 'ready' });

  const rl = readline.createInterface({ input: process.stdin });
  for await (const line of rl) {
    if (!line.trim()) continue;
    const req = JSON.parse(line);
    try {
      send({ id: req.id, ok: true, value: await dispatch(req) });
    } catch (error) {
      send({ id: req.id, ok: false, kind: errorKind(req.op), error: error.message });
    }
    if (req.op === 'close') break;
  }
  await browser.close();
})().catch((error) => {
  send({ id: 0, ok: false, kind: 'launch', error: error.message });
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default)]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::str::FromStr for Browser {
    type Err = E2eError;

    fn from_str(s: &str) -> E2eResult<Self> {
        match s {
            "chromium" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" => Ok(Browser::Webkit),
            other => Err(E2eError::Bridge(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    pub browser: Browser,
    pub headless: bool,
    /// Directory whose `node_modules` provides `playwright`
    pub node_root: PathBuf,
    /// Node executable
    pub node_binary: PathBuf,
    /// Added on top of each operation's own timeout before the bridge is declared dead
    pub request_slack: Duration,
    /// Timeout for the reachability probe issued before launching a browser
    pub preflight_timeout: Duration,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: Browser::Chromium,
            headless: true,
            node_root: PathBuf::from("."),
            node_binary: PathBuf::from("node"),
            request_slack: Duration::from_secs(5),
            preflight_timeout: Duration::from_secs(10),
        }
    }
}

/// One bridge request
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeRequest<'a> {
    Goto { url: &'a str, timeout_ms: u64 },
    Clear { label: &'a str, timeout_ms: u64 },
    Fill { label: &'a str, text: &'a str, timeout_ms: u64 },
    Type { label: &'a str, text: &'a str, delay_ms: u64, timeout_ms: u64 },
    Regions { label: &'a str, selector: &'a str, timeout_ms: u64 },
    Close,
}

#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    request: &'a BridgeRequest<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeResponse {
    id: u64,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Running bridge process
struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    // Keeps the script file alive for the lifetime of the process
    _script_dir: tempfile::TempDir,
}

/// Page driver backed by a Playwright bridge
pub struct PlaywrightDriver {
    config: PlaywrightConfig,
    /// Bound for non-navigation operations
    action_timeout: Duration,
    bridge: Option<Bridge>,
    url: String,
}

impl PlaywrightDriver {
    pub fn new(config: PlaywrightConfig, action_timeout: Duration) -> Self {
        Self {
            config,
            action_timeout,
            bridge: None,
            url: String::new(),
        }
    }

    /// Check if Playwright is installed
    fn check_playwright_installed(&self) -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["playwright", "--version"])
            .current_dir(&self.config.node_root)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    /// Probe the endpoint over HTTP before spending a browser on it
    async fn preflight(&self, url: &str) -> E2eResult<()> {
        let client = reqwest::Client::builder()
            .timeout(self.config.preflight_timeout)
            .build()?;

        match client.get(url).send().await {
            Ok(resp) => {
                if !resp.status().is_success() {
                    warn!("SUT answered {} to preflight", resp.status());
                }
                Ok(())
            }
            Err(e) => Err(E2eError::Navigation {
                url: url.to_string(),
                reason: if e.is_timeout() {
                    "endpoint did not answer in time".to_string()
                } else {
                    e.to_string()
                },
            }),
        }
    }

    async fn spawn_bridge(&self) -> E2eResult<Bridge> {
        self.check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        debug!("Starting Playwright bridge: {}", script_path.display());

        let mut child = TokioCommand::new(&self.config.node_binary)
            .arg(&script_path)
            .current_dir(&self.config.node_root)
            .env("SWIFTCHECK_BROWSER", self.config.browser.as_str())
            .env("SWIFTCHECK_HEADLESS", if self.config.headless { "1" } else { "0" })
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| E2eError::Bridge(format!("failed to spawn node: {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("bridge stdout unavailable".to_string()))?;

        let mut bridge = Bridge {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
            next_id: 1,
            _script_dir: script_dir,
        };

        let ready = tokio::time::timeout(self.action_timeout + self.config.request_slack, bridge.read_response())
            .await
            .map_err(|_| E2eError::Bridge("browser did not start in time".to_string()))??;
        if !ready.ok {
            return Err(E2eError::Bridge(format!(
                "browser launch failed: {}",
                ready.error.unwrap_or_default()
            )));
        }

        info!("Playwright bridge ready ({})", self.config.browser.as_str());
        Ok(bridge)
    }

    async fn call(&mut self, request: BridgeRequest<'_>, op_timeout: Duration) -> E2eResult<serde_json::Value> {
        let url = self.url.clone();
        let limit = op_timeout + self.config.request_slack;
        let bridge = self
            .bridge
            .as_mut()
            .ok_or_else(|| E2eError::Bridge("bridge not started".to_string()))?;

        let response = tokio::time::timeout(limit, bridge.round_trip(&request))
            .await
            .map_err(|_| E2eError::Bridge(format!("no response within {} ms", limit.as_millis())))??;

        if response.ok {
            return Ok(response.value);
        }

        let reason = response.error.unwrap_or_else(|| "unknown bridge error".to_string());
        Err(match response.kind.as_deref() {
            Some("navigation") => E2eError::Navigation { url, reason },
            Some("input") => E2eError::Input(reason),
            _ => E2eError::Bridge(reason),
        })
    }

    fn action_timeout_ms(&self) -> u64 {
        self.action_timeout.as_millis() as u64
    }
}

impl Bridge {
    async fn round_trip(&mut self, request: &BridgeRequest<'_>) -> E2eResult<BridgeResponse> {
        let id = self.next_id;
        self.next_id += 1;

        let mut line = serde_json::to_string(&Envelope { id, request })?;
        line.push('\n');
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.flush().await?;

        // Stale answers from a request that already timed out are dropped
        loop {
            let response = self.read_response().await?;
            if response.id == id {
                return Ok(response);
            }
            debug!("Discarding stale bridge response {}", response.id);
        }
    }

    async fn read_response(&mut self) -> E2eResult<BridgeResponse> {
        match self.stdout.next_line().await? {
            Some(line) => Ok(serde_json::from_str(&line)?),
            None => Err(E2eError::Bridge("bridge process exited".to_string())),
        }
    }

    /// Ask the bridge to exit, escalating to signals if it does not
    async fn shutdown(&mut self, grace: Duration) {
        let close = Envelope {
            id: self.next_id,
            request: &BridgeRequest::Close,
        };
        if let Ok(mut line) = serde_json::to_string(&close) {
            line.push('\n');
            let _ = self.stdin.write_all(line.as_bytes()).await;
            let _ = self.stdin.flush().await;
        }
        if tokio::time::timeout(grace, self.child.wait()).await.is_ok() {
            return;
        }

        #[cfg(unix)]
        {
            use nix::sys::signal::{kill, Signal};
            use nix::unistd::Pid;

            if let Some(pid) = self.child.id() {
                if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok()
                    && tokio::time::timeout(Duration::from_millis(500), self.child.wait())
                        .await
                        .is_ok()
                {
                    return;
                }
            }
        }

        let _ = self.child.kill().await;
    }
}

#[async_trait]
impl PageDriver for PlaywrightDriver {
    async fn navigate(&mut self, url: &str, load_timeout: Duration) -> E2eResult<()> {
        self.url = url.to_string();
        self.preflight(url).await?;

        if self.bridge.is_none() {
            self.bridge = Some(self.spawn_bridge().await?);
        }

        let timeout_ms = load_timeout.as_millis() as u64;
        self.call(BridgeRequest::Goto { url, timeout_ms }, load_timeout).await?;
        Ok(())
    }

    async fn clear_input(&mut self, label: &str) -> E2eResult<()> {
        let timeout_ms = self.action_timeout_ms();
        self.call(BridgeRequest::Clear { label, timeout_ms }, self.action_timeout)
            .await?;
        Ok(())
    }

    async fn fill_input(&mut self, label: &str, text: &str) -> E2eResult<()> {
        let timeout_ms = self.action_timeout_ms();
        self.call(BridgeRequest::Fill { label, text, timeout_ms }, self.action_timeout)
            .await?;
        Ok(())
    }

    async fn type_input(&mut self, label: &str, text: &str, per_unit_delay: Duration) -> E2eResult<()> {
        let delay_ms = per_unit_delay.as_millis() as u64;
        let typing = per_unit_delay * text.chars().count() as u32;
        let timeout_ms = (self.action_timeout + typing).as_millis() as u64;
        self.call(
            BridgeRequest::Type { label, text, delay_ms, timeout_ms },
            self.action_timeout + typing,
        )
        .await?;
        Ok(())
    }

    async fn query_regions(&mut self, label: &str, selector: &str) -> E2eResult<Vec<Region>> {
        let timeout_ms = self.action_timeout_ms();
        let value = self
            .call(BridgeRequest::Regions { label, selector, timeout_ms }, self.action_timeout)
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn close(&mut self) -> E2eResult<()> {
        if let Some(mut bridge) = self.bridge.take() {
            info!("Closing Playwright bridge");
            bridge.shutdown(self.config.request_slack).await;
        }
        Ok(())
    }
}

/// Creates a Playwright-backed driver per session
#[derive(Debug, Clone, Default)]
pub struct PlaywrightFactory {
    pub config: PlaywrightConfig,
}

#[async_trait]
impl DriverFactory for PlaywrightFactory {
    type Driver = PlaywrightDriver;

    async fn create(&self, config: &HarnessConfig) -> E2eResult<PlaywrightDriver> {
        // the locator wait inside `regions` is short so polling stays responsive
        Ok(PlaywrightDriver::new(
            self.config.clone(),
            config.timings.load_timeout().min(Duration::from_secs(5)),
        ))
    }
}
