//! Simulated transliteration page for executor and runner tests
//!
//! Behaves like the hosted page as seen through the browser: the output
//! region shares the input textarea's selector, output follows input only
//! after a debounce, and optionally shows an unsegmented draft before the
//! final rendering.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use swiftcheck_common::{Corpus, HarnessConfig};
use swiftcheck_e2e::{DriverFactory, E2eError, E2eResult, PageDriver, Region};
use tokio::time::{sleep, Instant};

/// Behavior knobs shared by every page a factory creates
#[derive(Debug, Clone)]
pub struct PageBehavior {
    /// input -> rendered output; unknown input renders as itself
    pub translations: HashMap<String, String>,
    pub debounce: Duration,
    /// How long the draft (output without spaces) is shown before the final text
    pub segmentation: Duration,
    pub never_render: HashSet<String>,
    pub reject_input: HashSet<String>,
    pub crash_on: HashSet<String>,
    pub unreachable: bool,
}

impl PageBehavior {
    pub fn for_corpus(corpus: &Corpus) -> Self {
        let translations = corpus
            .iter()
            .map(|c| (c.input.trim().to_string(), c.expectation.final_output().to_string()))
            .collect();
        Self {
            translations,
            debounce: Duration::from_millis(300),
            segmentation: Duration::ZERO,
            never_render: HashSet::new(),
            reject_input: HashSet::new(),
            crash_on: HashSet::new(),
            unreachable: false,
        }
    }

    fn render(&self, input: &str, age: Duration) -> String {
        if input.is_empty() || self.never_render.contains(input) || age < self.debounce {
            return String::new();
        }
        let full = self
            .translations
            .get(input.trim())
            .cloned()
            .unwrap_or_else(|| input.to_string());
        if age < self.debounce + self.segmentation {
            full.chars().filter(|c| !c.is_whitespace()).collect()
        } else {
            full
        }
    }
}

/// Operation log shared between a factory and its pages
pub type Events = Arc<Mutex<Vec<String>>>;

pub struct FakePage {
    behavior: PageBehavior,
    events: Events,
    /// Every edit of the input, oldest first
    edits: Vec<(Instant, String)>,
}

impl FakePage {
    pub fn new(behavior: PageBehavior, events: Events) -> Self {
        Self {
            behavior,
            events,
            edits: Vec::new(),
        }
    }

    fn log(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    fn current_input(&self) -> String {
        self.edits.last().map(|(_, s)| s.clone()).unwrap_or_default()
    }

    fn edit(&mut self, text: String) {
        self.edits.push((Instant::now(), text));
    }

    /// What the output region shows now: the rendering of the newest edit
    /// that has outlived the debounce, so stale output lingers after a clear
    fn output(&self) -> String {
        let now = Instant::now();
        self.edits
            .iter()
            .rev()
            .find(|(at, _)| now - *at >= self.behavior.debounce)
            .map(|(at, input)| self.behavior.render(input, now - *at))
            .unwrap_or_default()
    }

    fn check_input(&self, text: &str) -> E2eResult<()> {
        if self.behavior.crash_on.contains(text) {
            return Err(E2eError::Bridge("bridge process exited".to_string()));
        }
        if self.behavior.reject_input.contains(text) {
            return Err(E2eError::Input(format!("textbox is disabled for {:?}", text)));
        }
        Ok(())
    }
}

#[async_trait]
impl PageDriver for FakePage {
    async fn navigate(&mut self, url: &str, _load_timeout: Duration) -> E2eResult<()> {
        self.log(format!("navigate:{}", url));
        if self.behavior.unreachable {
            return Err(E2eError::Navigation {
                url: url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }

    async fn clear_input(&mut self, _label: &str) -> E2eResult<()> {
        self.log("clear".to_string());
        self.edit(String::new());
        Ok(())
    }

    async fn fill_input(&mut self, _label: &str, text: &str) -> E2eResult<()> {
        self.log(format!("fill:{}", text));
        self.check_input(text)?;
        self.edit(text.to_string());
        Ok(())
    }

    async fn type_input(&mut self, _label: &str, text: &str, per_unit_delay: Duration) -> E2eResult<()> {
        self.log(format!("type:{}", text));
        self.check_input(text)?;
        for ch in text.chars() {
            sleep(per_unit_delay).await;
            let mut next = self.current_input();
            next.push(ch);
            self.edit(next);
        }
        Ok(())
    }

    async fn query_regions(&mut self, _label: &str, _selector: &str) -> E2eResult<Vec<Region>> {
        Ok(vec![
            Region {
                tag: "textarea".to_string(),
                role: Some("textbox".to_string()),
                designated_input: true,
                text: self.current_input(),
                ..Default::default()
            },
            Region {
                tag: "div".to_string(),
                text: self.output(),
                ..Default::default()
            },
        ])
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.log("close".to_string());
        Ok(())
    }
}

pub struct FakeFactory {
    pub behavior: PageBehavior,
    pub events: Events,
}

impl FakeFactory {
    pub fn new(behavior: PageBehavior) -> Self {
        Self {
            behavior,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl DriverFactory for FakeFactory {
    type Driver = FakePage;

    async fn create(&self, _config: &HarnessConfig) -> E2eResult<FakePage> {
        Ok(FakePage::new(self.behavior.clone(), self.events.clone()))
    }
}

pub fn config(output_dir: &std::path::Path) -> HarnessConfig {
    HarnessConfig {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}
