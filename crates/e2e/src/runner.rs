//! Suite runner: sessions per partition, filtering, aggregation and reports

use std::path::PathBuf;
use serde::{Deserialize, Serialize};
use swiftcheck_common::{CaseFilter, Corpus, HarnessConfig, Partition, TestCase};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::driver::{DriverFactory, Session};
use crate::error::{E2eError, E2eResult};
use crate::executor::{CaseResult, Executor, PartitionResult};

/// Result of running the selected cases of every partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteResult {
    pub started_at: String,
    pub sut_url: String,
    pub corpus_digest: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub partitions: Vec<PartitionResult>,
}

impl SuiteResult {
    /// True when every selected case ran and passed
    pub fn success(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }

    pub fn cases(&self) -> impl Iterator<Item = &CaseResult> {
        self.partitions.iter().flat_map(|p| p.cases.iter())
    }
}

/// Same case executed in two fresh sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeterminismResult {
    pub id: String,
    pub first: CaseResult,
    pub second: CaseResult,
    pub identical: bool,
}

/// Runs corpus partitions against sessions created by a driver factory
pub struct TestRunner<F: DriverFactory> {
    config: HarnessConfig,
    corpus: Corpus,
    factory: F,
}

impl<F: DriverFactory> TestRunner<F> {
    pub fn new(config: HarnessConfig, corpus: Corpus, factory: F) -> Self {
        Self {
            config,
            corpus,
            factory,
        }
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    /// Run every partition that has selected cases, each in its own session
    pub async fn run(&self, filter: &CaseFilter) -> E2eResult<SuiteResult> {
        let start = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let mut partitions = Vec::new();

        for partition in Partition::ALL {
            let cases = filter.select(&self.corpus, partition);
            if cases.is_empty() {
                continue;
            }

            let mut session = Session::new(
                self.factory.create(&self.config).await?,
                self.config.clone(),
            );

            let result = match session.open().await {
                Ok(()) => Executor::new(&mut session).run_partition(partition, &cases).await,
                Err(e) => {
                    error!("✗ {} session could not be opened: {}", partition, e);
                    let mut result = PartitionResult::new(partition);
                    result.abort(&e.to_string(), cases.iter().copied());
                    result
                }
            };

            if let Err(e) = session.close().await {
                warn!("Closing {} session failed: {}", partition, e);
            }
            partitions.push(result);
        }

        let passed: usize = partitions.iter().map(|p| p.passed).sum();
        let failed: usize = partitions.iter().map(|p| p.failed).sum();
        let skipped: usize = partitions.iter().map(|p| p.skipped).sum();
        let duration_ms = start.elapsed().as_millis() as u64;

        info!("");
        info!(
            "Conformance results: {} passed, {} failed, {} skipped ({} ms)",
            passed, failed, skipped, duration_ms
        );

        Ok(SuiteResult {
            started_at,
            sut_url: self.config.sut.url.clone(),
            corpus_digest: self.corpus.digest().to_string(),
            total: passed + failed + skipped,
            passed,
            failed,
            skipped,
            duration_ms,
            partitions,
        })
    }

    /// Run one case in two fresh sessions and compare what they rendered
    pub async fn check_determinism(&self, id: &str) -> E2eResult<DeterminismResult> {
        let case = self
            .corpus
            .get(id)
            .ok_or_else(|| E2eError::Input(format!("Test case not found: {}", id)))?;

        let first = self.run_isolated(case).await?;
        let second = self.run_isolated(case).await?;
        let identical = first.actual.is_some() && first.actual == second.actual;

        if identical {
            info!("✓ {} rendered identically in two sessions", id);
        } else {
            error!(
                "✗ {} rendered {:?} then {:?}",
                id, first.actual, second.actual
            );
        }

        Ok(DeterminismResult {
            id: id.to_string(),
            first,
            second,
            identical,
        })
    }

    async fn run_isolated(&self, case: &TestCase) -> E2eResult<CaseResult> {
        let mut session = Session::new(
            self.factory.create(&self.config).await?,
            self.config.clone(),
        );
        let result = match session.open().await {
            Ok(()) => Executor::new(&mut session).run_case(case).await,
            Err(e) => Err(e),
        };
        if let Err(e) = session.close().await {
            warn!("Closing session failed: {}", e);
        }
        result
    }

    /// Write suite results to JSON under the output directory
    pub fn write_results(&self, results: &SuiteResult) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("conformance-results.json");
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}
