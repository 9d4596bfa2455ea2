//! Configuration file handling.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ifres::{DEFAULT_HEADER_SIZE, FingerprintStrategy, LocatorConfig};
use serde::Deserialize;

use crate::retry::{ExponentialBackoff, FixedDelay, NoRetry, RetryStrategy};

/// Contents of `ifres.toml`
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target process executable name
    pub process: String,
    /// Offset table path
    pub table: PathBuf,
    /// Default fingerprint strategy for captures
    pub fingerprint: FingerprintStrategy,
    /// Bytes of each module header read for fingerprinting
    pub header_size: usize,
    pub retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            process: "cs2.exe".to_string(),
            table: PathBuf::from("interfaces.json"),
            fingerprint: FingerprintStrategy::default(),
            header_size: DEFAULT_HEADER_SIZE,
            retry: RetryConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig::builder()
            .strategy(self.fingerprint)
            .header_size(self.header_size)
            .build()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryKind {
    None,
    Fixed,
    Exponential,
}

/// Caller-side retry policy for modules that are not loaded yet
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub strategy: RetryKind,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub max_attempts: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            strategy: RetryKind::Exponential,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            max_attempts: 20,
        }
    }
}

impl RetryConfig {
    pub fn strategy(&self) -> Box<dyn RetryStrategy> {
        let initial = Duration::from_millis(self.initial_delay_ms);
        match self.strategy {
            RetryKind::None => Box::new(NoRetry),
            RetryKind::Fixed => Box::new(FixedDelay::new(initial, self.max_attempts)),
            RetryKind::Exponential => Box::new(ExponentialBackoff::new(
                initial,
                Duration::from_millis(self.max_delay_ms),
                self.max_attempts,
            )),
        }
    }
}
