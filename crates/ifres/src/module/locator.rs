use tracing::debug;

use super::{ModuleEntry, ModuleInfo, ModuleSource};
use crate::error::{Error, Result};
use crate::fingerprint::{Fingerprint, FingerprintStrategy};

/// Default size of the header region read for fingerprinting (one page)
pub const DEFAULT_HEADER_SIZE: usize = 0x1000;

/// Configuration for the module locator
#[derive(Debug, Clone)]
pub struct LocatorConfig {
    /// Strategy used when the caller does not ask for a specific one
    pub strategy: FingerprintStrategy,
    /// Bytes of the image header read for fingerprinting
    pub header_size: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            strategy: FingerprintStrategy::default(),
            header_size: DEFAULT_HEADER_SIZE,
        }
    }
}

impl LocatorConfig {
    /// Create a new configuration builder
    pub fn builder() -> LocatorConfigBuilder {
        LocatorConfigBuilder::default()
    }
}

/// Builder for LocatorConfig
#[derive(Debug, Clone, Default)]
pub struct LocatorConfigBuilder {
    strategy: Option<FingerprintStrategy>,
    header_size: Option<usize>,
}

impl LocatorConfigBuilder {
    /// Set the default fingerprint strategy
    pub fn strategy(mut self, strategy: FingerprintStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Set the header region size (clamped to at least 0x200 bytes)
    pub fn header_size(mut self, size: usize) -> Self {
        self.header_size = Some(size);
        self
    }

    /// Build the configuration
    pub fn build(self) -> LocatorConfig {
        let default = LocatorConfig::default();
        LocatorConfig {
            strategy: self.strategy.unwrap_or(default.strategy),
            header_size: self.header_size.unwrap_or(default.header_size).max(0x200),
        }
    }
}

/// Resolves module names to their loaded base, size and build fingerprint.
pub struct ModuleLocator<S: ModuleSource> {
    source: S,
    config: LocatorConfig,
}

impl<S: ModuleSource> ModuleLocator<S> {
    pub fn new(source: S) -> Self {
        Self::with_config(source, LocatorConfig::default())
    }

    pub fn with_config(source: S, config: LocatorConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Locate a module, fingerprinting it with the configured strategy
    pub fn locate(&self, name: &str) -> Result<ModuleEntry> {
        self.locate_with(name, self.config.strategy)
    }

    /// Locate a module, fingerprinting it with `strategy`.
    ///
    /// Names match case-insensitively. Fails with `ModuleNotLoaded` when the
    /// current snapshot has no such module.
    pub fn locate_with(&self, name: &str, strategy: FingerprintStrategy) -> Result<ModuleEntry> {
        let info = self.find(name)?;
        let fingerprint = self.fingerprint(&info, strategy)?;

        debug!(
            "Located {} at {:#x} (size {:#x}, {})",
            info.name, info.base_address, info.size, fingerprint
        );

        Ok(ModuleEntry {
            name: info.name,
            fingerprint,
            base_address: info.base_address,
            size: info.size,
        })
    }

    /// Names of all modules in the current snapshot
    pub fn module_names(&self) -> Result<Vec<String>> {
        Ok(self
            .source
            .loaded_modules()?
            .into_iter()
            .map(|m| m.name)
            .collect())
    }

    fn find(&self, name: &str) -> Result<ModuleInfo> {
        self.source
            .loaded_modules()?
            .into_iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ModuleNotLoaded {
                module: name.to_string(),
                interface: None,
            })
    }

    fn fingerprint(&self, info: &ModuleInfo, strategy: FingerprintStrategy) -> Result<Fingerprint> {
        let len = usize::try_from(info.size)
            .unwrap_or(usize::MAX)
            .min(self.config.header_size);
        // A module listed a moment ago but no longer readable was unloaded in between
        let header = self
            .source
            .read_bytes(info.base_address, len)
            .map_err(|e| match e {
                Error::MemoryReadFailed { address, message } => {
                    debug!(
                        "Header read of {} at {:#x} failed: {}",
                        info.name, address, message
                    );
                    Error::ModuleNotLoaded {
                        module: info.name.clone(),
                        interface: None,
                    }
                }
                other => other,
            })?;

        strategy.compute(&header).map_err(|e| match e {
            Error::InvalidImage(reason) => Error::InvalidImage(format!("{}: {}", info.name, reason)),
            other => other,
        })
    }
}
