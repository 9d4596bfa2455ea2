//! CLI command implementations.
//!
//! This module contains the implementation of each CLI command.

pub mod check;
pub mod dump;
pub mod fingerprint;
pub mod import;
pub mod list;
pub mod offset;
pub mod resolve;

use anyhow::{Context as _, Result};
use ifres::{Error, InterfaceResolver, ModuleLocator, OffsetTable, ProcessHandle, load_table};
use tracing::info;

use crate::config::Config;

/// Settings shared by all commands
pub struct Context {
    pub config: Config,
    pub pid: Option<u32>,
}

impl Context {
    pub fn open_process(&self) -> Result<ProcessHandle> {
        let process = match self.pid {
            Some(pid) => ProcessHandle::open(pid)?,
            None => ProcessHandle::find_and_open(&self.config.process)?,
        };
        info!("Attached to process {}", process.pid);
        Ok(process)
    }

    pub fn load_table(&self) -> Result<OffsetTable> {
        load_table(&self.config.table)
            .with_context(|| format!("Failed to load table {}", self.config.table.display()))
    }

    pub fn locator(&self) -> Result<ModuleLocator<ProcessHandle>> {
        Ok(ModuleLocator::with_config(
            self.open_process()?,
            self.config.locator_config(),
        ))
    }

    pub fn resolver(&self) -> Result<InterfaceResolver<ProcessHandle>> {
        let table = self.load_table()?;
        Ok(InterfaceResolver::new(table, self.locator()?))
    }
}

/// What an operator should do about a resolution failure
pub fn failure_hint(err: &Error) -> &'static str {
    match err {
        Error::ModuleNotLoaded { .. } => "module not loaded yet; retry later or use --wait",
        Error::StaleOffsets { .. } => "module was updated; capture a new offset table",
        Error::UnknownInterface { .. } | Error::UnknownModule { .. } => {
            "check the module and interface names (see `ifres list`)"
        }
        Error::OffsetOutOfBounds { .. } => "offset table is corrupt; replace it",
        Error::MalformedTable(_) => "fix or regenerate the offset table",
        _ => "environment error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_hints_are_distinct() {
        let not_loaded = Error::ModuleNotLoaded {
            module: "client.dll".to_string(),
            interface: None,
        };
        let stale = Error::StaleOffsets {
            module: "client.dll".to_string(),
            interface: None,
            expected: "pe-header:00".to_string(),
            actual: "pe-header:01".to_string(),
        };
        let unknown = Error::UnknownInterface {
            module: "client.dll".to_string(),
            interface: "DoesNotExist".to_string(),
        };
        let corrupt = Error::OffsetOutOfBounds {
            module: "client.dll".to_string(),
            interface: "Source2Client002".to_string(),
            offset: 0x4000_0000,
            size: 0x200_0000,
        };

        let hints = [
            failure_hint(&not_loaded),
            failure_hint(&stale),
            failure_hint(&unknown),
            failure_hint(&corrupt),
        ];
        for (i, a) in hints.iter().enumerate() {
            for b in &hints[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }
}
