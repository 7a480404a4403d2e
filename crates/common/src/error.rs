//! Error types for corpus and configuration loading

use thiserror::Error;

/// Result type alias using the common Error
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Invalid corpus: {0}")]
    InvalidCorpus(String),

    #[error("Duplicate test case id: {id}")]
    DuplicateCase { id: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
