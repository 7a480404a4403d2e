//! Test corpus: the expected behavior of the transliteration service
//!
//! The corpus is a fixture. It is parsed and validated once, then only read.
//! Cases live in three disjoint partitions and keep their file order inside a
//! partition, so sequential runs produce reproducible logs.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

use crate::error::{Error, Result};

const BUILTIN_CORPUS: &str = include_str!("../fixtures/swift_translator.yaml");

/// Corpus partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Partition {
    /// Well-formed input mapped to an exact output
    Positive,
    /// Degraded input that still has a defined output
    Negative,
    /// Keystroke-paced submission checked mid-typing and at the end
    Incremental,
}

impl Partition {
    /// Execution order used by the runner
    pub const ALL: [Partition; 3] = [Partition::Positive, Partition::Negative, Partition::Incremental];

    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Positive => "positive",
            Partition::Negative => "negative",
            Partition::Incremental => "incremental",
        }
    }
}

impl fmt::Display for Partition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Partition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "positive" | "pos" => Ok(Partition::Positive),
            "negative" | "neg" => Ok(Partition::Negative),
            "incremental" | "ui" => Ok(Partition::Incremental),
            other => Err(Error::InvalidConfig(format!("unknown partition: {}", other))),
        }
    }
}

/// Length bucket of the input, for report grouping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LengthClass {
    XS,
    S,
    M,
    L,
    XL,
}

/// What the output region must show
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Expectation {
    /// Full submission, output must equal `expected` after trimming
    Exact { expected: String },
    /// `partial_input` is typed first and must produce some output, then the
    /// rest of the input is typed and the output must equal `expected_full`
    Staged {
        partial_input: String,
        expected_full: String,
    },
}

impl Expectation {
    /// Final expected output
    pub fn final_output(&self) -> &str {
        match self {
            Expectation::Exact { expected } => expected,
            Expectation::Staged { expected_full, .. } => expected_full,
        }
    }
}

/// Descriptive tags; not used by any logic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseTags {
    pub category: String,
    pub grammar: String,
    pub length_class: LengthClass,
}

/// One fixture row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub name: String,
    pub partition: Partition,
    pub input: String,
    pub expectation: Expectation,
    pub tags: CaseTags,
}

impl TestCase {
    /// The part of the input typed after the staged prefix, if any
    pub fn remaining_input(&self) -> Option<&str> {
        match &self.expectation {
            Expectation::Staged { partial_input, .. } => self.input.strip_prefix(partial_input.as_str()),
            Expectation::Exact { .. } => None,
        }
    }
}

/// Row as written in the YAML fixture
#[derive(Debug, Clone, Deserialize)]
struct CaseRecord {
    id: String,
    #[serde(default)]
    name: String,
    input: String,
    #[serde(default)]
    expected: Option<String>,
    #[serde(default)]
    partial_input: Option<String>,
    #[serde(default)]
    expected_full: Option<String>,
    #[serde(default)]
    category: String,
    #[serde(default)]
    grammar: String,
    length: LengthClass,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct CorpusFile {
    #[serde(default)]
    positive: Vec<CaseRecord>,
    #[serde(default)]
    negative: Vec<CaseRecord>,
    #[serde(default)]
    incremental: Vec<CaseRecord>,
}

/// Immutable, partitioned collection of test cases
#[derive(Debug, Clone)]
pub struct Corpus {
    positive: Vec<TestCase>,
    negative: Vec<TestCase>,
    incremental: Vec<TestCase>,
    digest: String,
}

impl Corpus {
    /// The corpus compiled into the harness
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_CORPUS)
    }

    /// Parse and validate a corpus from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let file: CorpusFile = serde_yaml::from_str(yaml)?;
        Self::from_files(vec![(yaml.to_string(), file)])
    }

    /// Parse a corpus from a YAML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Merge every YAML file under a directory, in path order
    pub fn load_all(dir: &Path) -> Result<Self> {
        let mut paths: Vec<_> = walkdir::WalkDir::new(dir)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| {
                e.path()
                    .extension()
                    .map(|ext| ext == "yaml" || ext == "yml")
                    .unwrap_or(false)
            })
            .map(|e| e.into_path())
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(Error::InvalidCorpus(format!(
                "no corpus files found in {}",
                dir.display()
            )));
        }

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            debug!("Loading corpus file {}", path.display());
            let content = std::fs::read_to_string(path)?;
            let file: CorpusFile = serde_yaml::from_str(&content)?;
            files.push((content, file));
        }
        Self::from_files(files)
    }

    fn from_files(files: Vec<(String, CorpusFile)>) -> Result<Self> {
        let mut hasher = Sha256::new();
        let mut corpus = Corpus {
            positive: Vec::new(),
            negative: Vec::new(),
            incremental: Vec::new(),
            digest: String::new(),
        };
        let mut seen = HashSet::new();

        for (raw, file) in files {
            hasher.update(raw.as_bytes());
            for (partition, records) in [
                (Partition::Positive, file.positive),
                (Partition::Negative, file.negative),
                (Partition::Incremental, file.incremental),
            ] {
                for record in records {
                    let case = build_case(partition, record)?;
                    if !seen.insert(case.id.clone()) {
                        return Err(Error::DuplicateCase { id: case.id });
                    }
                    corpus.partition_mut(partition).push(case);
                }
            }
        }

        corpus.digest = hex::encode(hasher.finalize());
        Ok(corpus)
    }

    fn partition_mut(&mut self, partition: Partition) -> &mut Vec<TestCase> {
        match partition {
            Partition::Positive => &mut self.positive,
            Partition::Negative => &mut self.negative,
            Partition::Incremental => &mut self.incremental,
        }
    }

    /// Cases of one partition, in fixture order
    pub fn partition(&self, partition: Partition) -> &[TestCase] {
        match partition {
            Partition::Positive => &self.positive,
            Partition::Negative => &self.negative,
            Partition::Incremental => &self.incremental,
        }
    }

    /// All cases, partition by partition
    pub fn iter(&self) -> impl Iterator<Item = &TestCase> {
        Partition::ALL.into_iter().flat_map(move |p| self.partition(p).iter())
    }

    /// Look up a case by id
    pub fn get(&self, id: &str) -> Option<&TestCase> {
        self.iter().find(|c| c.id == id)
    }

    pub fn len(&self) -> usize {
        self.positive.len() + self.negative.len() + self.incremental.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// SHA-256 of the source YAML, identifies the corpus revision in reports
    pub fn digest(&self) -> &str {
        &self.digest
    }
}

fn build_case(partition: Partition, record: CaseRecord) -> Result<TestCase> {
    let invalid = |reason: &str| Error::InvalidCorpus(format!("{}: {}", record.id, reason));

    if record.id.trim().is_empty() {
        return Err(Error::InvalidCorpus("case with empty id".to_string()));
    }
    if record.input.is_empty() {
        return Err(invalid("input is empty"));
    }

    let expectation = match partition {
        Partition::Positive | Partition::Negative => {
            let expected = record
                .expected
                .clone()
                .ok_or_else(|| invalid("missing `expected`"))?;
            if expected.trim().is_empty() {
                return Err(invalid("`expected` is empty"));
            }
            Expectation::Exact { expected }
        }
        Partition::Incremental => {
            let partial_input = record
                .partial_input
                .clone()
                .ok_or_else(|| invalid("missing `partial_input`"))?;
            let expected_full = record
                .expected_full
                .clone()
                .ok_or_else(|| invalid("missing `expected_full`"))?;
            if expected_full.trim().is_empty() {
                return Err(invalid("`expected_full` is empty"));
            }
            let strict_prefix = !partial_input.is_empty()
                && partial_input.len() < record.input.len()
                && record.input.starts_with(&partial_input);
            if !strict_prefix {
                return Err(invalid("`partial_input` is not a strict prefix of `input`"));
            }
            Expectation::Staged {
                partial_input,
                expected_full,
            }
        }
    };

    Ok(TestCase {
        id: record.id,
        name: record.name,
        partition,
        input: record.input,
        expectation,
        tags: CaseTags {
            category: record.category,
            grammar: record.grammar,
            length_class: record.length,
        },
    })
}

/// Selects cases by id, category and partition
///
/// Each non-empty list must contain the case's value; empty lists match everything.
#[derive(Debug, Clone, Default)]
pub struct CaseFilter {
    pub ids: Vec<String>,
    pub categories: Vec<String>,
    pub partitions: Vec<Partition>,
}

impl CaseFilter {
    pub fn matches(&self, case: &TestCase) -> bool {
        (self.ids.is_empty() || self.ids.iter().any(|id| *id == case.id))
            && (self.categories.is_empty()
                || self
                    .categories
                    .iter()
                    .any(|c| c.eq_ignore_ascii_case(&case.tags.category)))
            && self.includes_partition(case.partition)
    }

    pub fn includes_partition(&self, partition: Partition) -> bool {
        self.partitions.is_empty() || self.partitions.contains(&partition)
    }

    /// Matching cases of one partition, order preserved
    pub fn select<'a>(&self, corpus: &'a Corpus, partition: Partition) -> Vec<&'a TestCase> {
        if !self.includes_partition(partition) {
            return Vec::new();
        }
        corpus
            .partition(partition)
            .iter()
            .filter(|c| self.matches(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_builtin_corpus_partitions() {
        let corpus = Corpus::builtin().unwrap();
        assert_eq!(corpus.partition(Partition::Positive).len(), 26);
        assert_eq!(corpus.partition(Partition::Negative).len(), 10);
        assert_eq!(corpus.partition(Partition::Incremental).len(), 3);
        assert_eq!(corpus.len(), 39);
        assert_eq!(corpus.digest().len(), 64);
    }

    #[test]
    fn test_builtin_corpus_preserves_order() {
        let corpus = Corpus::builtin().unwrap();
        let ids: Vec<_> = corpus
            .partition(Partition::Negative)
            .iter()
            .map(|c| c.id.as_str())
            .take(3)
            .collect();
        assert_eq!(ids, ["Neg_Fun_001", "Neg_Fun_002", "Neg_Fun_003"]);
    }

    #[test_case("Pos_Fun_001", "mama adha gamata yanavaa", "මම අද ගමට යනවා" ; "simple sentence")]
    #[test_case("Neg_Fun_001", "mamagedharainnee", "මම ගෙදර ඉන්නේ" ; "missing spaces")]
    #[test_case("Pos_Fun_009", "eyaata puluvandha code karanna", "එයාට පුලුවන්ද code කරන්න" ; "mixed script")]
    fn test_builtin_scenarios(id: &str, input: &str, expected: &str) {
        let corpus = Corpus::builtin().unwrap();
        let case = corpus.get(id).unwrap();
        assert_eq!(case.input, input);
        assert_eq!(case.expectation.final_output(), expected);
    }

    #[test]
    fn test_staged_case_remaining_input() {
        let corpus = Corpus::builtin().unwrap();
        let case = corpus.get("Pos_UI_001").unwrap();
        assert_eq!(case.remaining_input(), Some("%^&*()"));
        assert_eq!(
            case.expectation,
            Expectation::Staged {
                partial_input: "@#$".to_string(),
                expected_full: "@#$%^&*()".to_string(),
            }
        );
    }

    #[test]
    fn test_rejects_duplicate_ids_across_partitions() {
        let yaml = r#"
positive:
  - id: dup
    input: a
    expected: b
    length: S
negative:
  - id: dup
    input: c
    expected: d
    length: S
"#;
        let err = Corpus::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::DuplicateCase { id } if id == "dup"));
    }

    #[test_case("partial_input: abc\n    expected_full: abc" ; "prefix equals input")]
    #[test_case("partial_input: xy\n    expected_full: abc" ; "not a prefix")]
    #[test_case("partial_input: ''\n    expected_full: abc" ; "empty prefix")]
    #[test_case("partial_input: ab\n    expected_full: '  '" ; "blank expected")]
    #[test_case("expected: abc" ; "missing staged fields")]
    fn test_rejects_invalid_incremental_case(fields: &str) {
        let yaml = format!(
            "incremental:\n  - id: ui\n    input: abc\n    {}\n    length: XS\n",
            fields
        );
        let err = Corpus::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, Error::InvalidCorpus(_)), "{:?}", err);
    }

    #[test]
    fn test_rejects_empty_expected() {
        let yaml = "positive:\n  - id: p\n    input: abc\n    expected: ' '\n    length: S\n";
        assert!(matches!(
            Corpus::from_yaml(yaml).unwrap_err(),
            Error::InvalidCorpus(_)
        ));
    }

    #[test]
    fn test_filter_by_category_and_partition() {
        let corpus = Corpus::builtin().unwrap();
        let filter = CaseFilter {
            categories: vec!["mixed singlish + english".to_string()],
            ..Default::default()
        };
        let selected = filter.select(&corpus, Partition::Positive);
        assert!(selected.iter().any(|c| c.id == "Pos_Fun_009"));
        assert!(selected.iter().any(|c| c.id == "Pos_Fun_020"));
        assert!(selected.iter().all(|c| c.tags.category.eq_ignore_ascii_case("Mixed Singlish + English")));

        let filter = CaseFilter {
            partitions: vec![Partition::Negative],
            ..Default::default()
        };
        assert!(filter.select(&corpus, Partition::Positive).is_empty());
        assert_eq!(filter.select(&corpus, Partition::Negative).len(), 10);
    }

    #[test]
    fn test_load_all_merges_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("b.yaml"),
            "positive:\n  - id: b1\n    input: b\n    expected: B\n    length: S\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("a.yml"),
            "positive:\n  - id: a1\n    input: a\n    expected: A\n    length: S\n",
        )
        .unwrap();

        let corpus = Corpus::load_all(dir.path()).unwrap();
        let ids: Vec<_> = corpus.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["a1", "b1"]);
    }

    #[test]
    fn test_partition_from_str() {
        assert_eq!("Neg".parse::<Partition>().unwrap(), Partition::Negative);
        assert_eq!("incremental".parse::<Partition>().unwrap(), Partition::Incremental);
        assert!("other".parse::<Partition>().is_err());
    }
}
