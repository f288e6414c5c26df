//! Runtime configuration.

use std::io::Write;
use std::path::{Path, PathBuf};

use ncd_core::oracle::{DEFAULT_MAX_INPUT_BYTES, MAX_LEVEL};
use ncd_core::{ClassifierOptions, CompressionError, LoaderOptions, ZlibOracle};
use serde::Deserialize;
use thiserror::Error;

/// Top-level classifier configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Training corpus source.
    pub corpus: CorpusConfig,
    /// Parallelism and vote settings.
    #[serde(default)]
    pub engine: EngineConfig,
    /// Codec settings.
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Display names indexed by zero-based class id.
    #[serde(default)]
    pub class_names: Vec<String>,
}

impl ClassifierConfig {
    /// Loads configuration from TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        Self::from_toml_str(&data)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml_str(data: &str) -> Result<Self, ConfigError> {
        let cfg = toml::from_str::<Self>(data).map_err(ConfigError::Toml)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Checks value ranges serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.k == 0 {
            return Err(ConfigError::Invalid("engine.k must be at least 1".to_owned()));
        }
        if self.engine.workers == Some(0) {
            return Err(ConfigError::Invalid(
                "engine.workers must be at least 1".to_owned(),
            ));
        }
        if self.engine.class_count == Some(0) {
            return Err(ConfigError::Invalid(
                "engine.class_count must be at least 1".to_owned(),
            ));
        }
        if self.compression.level > MAX_LEVEL {
            return Err(ConfigError::Invalid(format!(
                "compression.level must be in 0..={MAX_LEVEL}"
            )));
        }
        if self.compression.max_input_bytes == 0 {
            return Err(ConfigError::Invalid(
                "compression.max_input_bytes must be positive".to_owned(),
            ));
        }
        self.corpus.separator_byte()?;
        Ok(())
    }

    /// Applies command-line overrides.
    pub fn apply_overrides(
        &mut self,
        k: Option<usize>,
        workers: Option<usize>,
    ) -> Result<(), ConfigError> {
        if let Some(k) = k {
            self.engine.k = k;
        }
        if workers.is_some() {
            self.engine.workers = workers;
        }
        self.validate()
    }

    /// Builds the configured oracle.
    pub fn oracle(&self) -> Result<ZlibOracle, CompressionError> {
        ZlibOracle::new(self.compression.level, self.compression.max_input_bytes)
    }

    /// Classifier options from the engine section.
    #[must_use]
    pub fn classifier_options(&self) -> ClassifierOptions {
        ClassifierOptions {
            workers: self.engine.workers,
            class_count: self.engine.class_count,
        }
    }

    /// Display name for a zero-based class id.
    #[must_use]
    pub fn class_name(&self, label: usize) -> String {
        self.class_names
            .get(label)
            .cloned()
            .unwrap_or_else(|| format!("class {}", label + 1))
    }
}

/// Corpus source settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CorpusConfig {
    /// Path to the labeled corpus file.
    pub path: PathBuf,
    /// First line is a header.
    #[serde(default = "default_skip_header")]
    pub skip_header: bool,
    /// Single-byte field separator after the class number.
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl CorpusConfig {
    /// Separator as a byte; must be exactly one byte long.
    pub fn separator_byte(&self) -> Result<u8, ConfigError> {
        match self.separator.as_bytes() {
            [byte] => Ok(*byte),
            _ => Err(ConfigError::Invalid(format!(
                "corpus.separator must be a single byte, got {:?}",
                self.separator
            ))),
        }
    }

    /// Loader options for this corpus.
    pub fn loader_options(&self) -> Result<LoaderOptions, ConfigError> {
        Ok(LoaderOptions {
            skip_header: self.skip_header,
            separator: self.separator_byte()?,
        })
    }
}

/// Parallelism and vote settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// Worker threads; hardware parallelism when unset.
    #[serde(default)]
    pub workers: Option<usize>,
    /// Neighbours consulted per vote.
    #[serde(default = "default_k")]
    pub k: usize,
    /// Histogram width; derived from corpus labels when unset.
    #[serde(default)]
    pub class_count: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: None,
            k: default_k(),
            class_count: None,
        }
    }
}

/// Codec settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// zlib effort level, fixed for the whole run.
    #[serde(default = "default_level")]
    pub level: u32,
    /// Largest buffer the oracle accepts.
    #[serde(default = "default_max_input_bytes")]
    pub max_input_bytes: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            max_input_bytes: default_max_input_bytes(),
        }
    }
}

/// Embedded example configuration template.
pub const EXAMPLE_CONFIG_TOML: &str = include_str!("../ncd-classify.example.toml");

/// Writes the embedded example config to `path`.
pub fn write_example_config(path: impl AsRef<Path>, overwrite: bool) -> Result<(), std::io::Error> {
    if overwrite {
        return std::fs::write(path, EXAMPLE_CONFIG_TOML);
    }

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(EXAMPLE_CONFIG_TOML.as_bytes())
}

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File read error.
    #[error("failed to read config file: {0}")]
    Io(std::io::Error),
    /// TOML parse error.
    #[error("failed to parse config toml: {0}")]
    Toml(toml::de::Error),
    /// Value out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_skip_header() -> bool {
    true
}

fn default_separator() -> String {
    ",".to_owned()
}

fn default_k() -> usize {
    3
}

fn default_level() -> u32 {
    MAX_LEVEL
}

fn default_max_input_bytes() -> usize {
    DEFAULT_MAX_INPUT_BYTES
}
