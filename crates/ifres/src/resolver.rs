//! Interface resolution: table lookup, module location, staleness check and
//! pointer arithmetic behind one call.
//!
//! ## Example
//!
//! ```ignore
//! use ifres::{InterfaceResolver, ModuleLocator, ProcessHandle, SharedTable, load_table};
//!
//! let table = SharedTable::new(load_table("interfaces.json")?);
//! let process = ProcessHandle::find_and_open("cs2.exe")?;
//! let resolver = InterfaceResolver::new(table, ModuleLocator::new(process));
//!
//! let client = resolver.resolve("client.dll", "Source2Client002")?;
//! println!("{} at {:#x}", client.interface_name, client.address);
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error};

use crate::error::{Error, Result};
use crate::module::{ModuleEntry, ModuleLocator, ModuleSource};
use crate::table::{ModuleOffsets, SharedTable};
use crate::validate::validate;

/// A successfully resolved interface address.
///
/// Addresses are only valid while the module stays loaded; callers that
/// cache them own the invalidation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedInterface {
    pub module_name: String,
    pub interface_name: String,
    pub address: u64,
    pub resolved_at: DateTime<Utc>,
}

/// Resolves `(module, interface)` pairs to absolute addresses.
///
/// Every call re-derives the address from a fresh module snapshot; nothing
/// is cached between calls and no call retries.
pub struct InterfaceResolver<S: ModuleSource> {
    table: SharedTable,
    locator: ModuleLocator<S>,
}

impl<S: ModuleSource> InterfaceResolver<S> {
    pub fn new<T: Into<SharedTable>>(table: T, locator: ModuleLocator<S>) -> Self {
        Self {
            table: table.into(),
            locator,
        }
    }

    /// Handle to the table in use; replacing through it affects later calls
    pub fn table(&self) -> &SharedTable {
        &self.table
    }

    pub fn locator(&self) -> &ModuleLocator<S> {
        &self.locator
    }

    pub fn resolve(&self, module: &str, interface: &str) -> Result<ResolvedInterface> {
        let table = self.table.snapshot();

        let Some((offsets, offset)) = table
            .module(module)
            .and_then(|m| m.offset(interface).map(|offset| (m, offset)))
        else {
            return Err(Error::UnknownInterface {
                module: module.to_string(),
                interface: interface.to_string(),
            });
        };

        let entry = self
            .validated_module(offsets)
            .map_err(|e| e.for_interface(interface))?;

        resolve_in(&entry, interface, offset)
    }

    /// Resolve every interface the table lists for `module`.
    ///
    /// The module is located and validated once; each interface then gets
    /// its own bounds check, so one corrupt record does not hide the rest.
    pub fn resolve_module(&self, module: &str) -> Result<Vec<Result<ResolvedInterface>>> {
        let table = self.table.snapshot();
        let offsets = table.module(module).ok_or_else(|| Error::UnknownModule {
            module: module.to_string(),
        })?;

        let entry = self.validated_module(offsets)?;

        Ok(offsets
            .interfaces()
            .into_iter()
            .map(|(name, offset)| resolve_in(&entry, name, offset))
            .collect())
    }

    /// Locate and validate `module` without resolving any interface
    pub fn check_module(&self, module: &str) -> Result<ModuleEntry> {
        let table = self.table.snapshot();
        let offsets = table.module(module).ok_or_else(|| Error::UnknownModule {
            module: module.to_string(),
        })?;

        self.validated_module(offsets)
    }

    /// Status of every module in the current table, sorted by module name
    pub fn check_all(&self) -> Vec<(String, Result<ModuleEntry>)> {
        let table = self.table.snapshot();
        table
            .modules()
            .into_iter()
            .map(|offsets| (offsets.name().to_string(), self.validated_module(offsets)))
            .collect()
    }

    fn validated_module(&self, offsets: &ModuleOffsets) -> Result<ModuleEntry> {
        let captured = offsets.fingerprint();
        let entry = self
            .locator
            .locate_with(offsets.name(), captured.strategy())?;
        validate(&entry, captured)?;
        Ok(entry)
    }
}

/// Absolute address of `offset` within `module`, if it lies inside the image.
pub fn checked_address(module: &ModuleEntry, offset: i64) -> Option<u64> {
    let offset = u64::try_from(offset).ok()?;
    if offset >= module.size {
        return None;
    }
    module.base_address.checked_add(offset)
}

fn resolve_in(entry: &ModuleEntry, interface: &str, offset: i64) -> Result<ResolvedInterface> {
    let Some(address) = checked_address(entry, offset) else {
        error!(
            "Offset {:#x} for {}!{} is outside the loaded image (base {:#x}, size {:#x}); table is corrupt",
            offset, entry.name, interface, entry.base_address, entry.size
        );
        return Err(Error::OffsetOutOfBounds {
            module: entry.name.clone(),
            interface: interface.to_string(),
            offset,
            size: entry.size,
        });
    };

    debug!("Resolved {}!{} to {:#x}", entry.name, interface, address);
    Ok(ResolvedInterface {
        module_name: entry.name.clone(),
        interface_name: interface.to_string(),
        address,
        resolved_at: Utc::now(),
    })
}
