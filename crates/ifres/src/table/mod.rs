//! Versioned table of interface offsets, grouped by module.
//!
//! A table is validated once when it is built and is immutable afterwards.
//! Refreshing offsets means building a new table and swapping it in through
//! [`SharedTable`].

mod header;
mod loader;
mod shared;

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

pub use header::*;
pub use loader::*;
pub use shared::*;

/// One named interface within a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRecord {
    pub module_name: String,
    pub interface_name: String,
    pub offset: i64,
}

/// Offsets of one module, together with the build they were captured from.
#[derive(Debug, Clone)]
pub struct ModuleOffsets {
    name: String,
    fingerprint: Fingerprint,
    interfaces: HashMap<String, i64>,
}

impl ModuleOffsets {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    pub fn offset(&self, interface: &str) -> Option<i64> {
        self.interfaces.get(interface).copied()
    }

    /// Interfaces sorted by name
    pub fn interfaces(&self) -> Vec<(&str, i64)> {
        let mut list: Vec<_> = self
            .interfaces
            .iter()
            .map(|(name, offset)| (name.as_str(), *offset))
            .collect();
        list.sort_unstable_by(|a, b| a.0.cmp(b.0));
        list
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }
}

/// Immutable module → interface → offset table.
///
/// Module names are matched case-insensitively, interface names exactly.
#[derive(Debug, Clone)]
pub struct OffsetTable {
    version: String,
    modules: HashMap<String, ModuleOffsets>,
}

impl OffsetTable {
    pub fn builder<S: Into<String>>(version: S) -> OffsetTableBuilder {
        OffsetTableBuilder::new(version)
    }

    /// Capture label of this table (usually the capture timestamp)
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn lookup(&self, module: &str, interface: &str) -> Option<i64> {
        let offset = self.module(module)?.offset(interface);
        debug!(module, interface, ?offset, "offset table lookup");
        offset
    }

    pub fn module(&self, name: &str) -> Option<&ModuleOffsets> {
        self.modules.get(&module_key(name))
    }

    pub fn fingerprint(&self, module: &str) -> Option<&Fingerprint> {
        self.module(module).map(ModuleOffsets::fingerprint)
    }

    /// Modules sorted by name
    pub fn modules(&self) -> Vec<&ModuleOffsets> {
        let mut list: Vec<_> = self.modules.values().collect();
        list.sort_unstable_by_key(|m| module_key(&m.name));
        list
    }

    /// All records, sorted by module then interface
    pub fn records(&self) -> Vec<InterfaceRecord> {
        self.modules()
            .into_iter()
            .flat_map(|module| {
                module
                    .interfaces()
                    .into_iter()
                    .map(|(name, offset)| InterfaceRecord {
                        module_name: module.name.clone(),
                        interface_name: name.to_string(),
                        offset,
                    })
            })
            .collect()
    }

    /// Number of interface records
    pub fn len(&self) -> usize {
        self.modules.values().map(ModuleOffsets::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn module_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Collects modules and records, then validates them into an [`OffsetTable`].
///
/// Nothing is checked until [`build`](Self::build), so the order in which
/// modules and records are added does not affect the outcome.
#[derive(Debug, Clone, Default)]
pub struct OffsetTableBuilder {
    version: String,
    modules: Vec<(String, Fingerprint)>,
    records: Vec<InterfaceRecord>,
}

impl OffsetTableBuilder {
    pub fn new<S: Into<String>>(version: S) -> Self {
        Self {
            version: version.into(),
            ..Default::default()
        }
    }

    /// Declare a module and the fingerprint its offsets were captured against
    pub fn module<S: Into<String>>(mut self, name: S, fingerprint: Fingerprint) -> Self {
        self.modules.push((name.into(), fingerprint));
        self
    }

    pub fn interface<M: Into<String>, I: Into<String>>(
        mut self,
        module: M,
        interface: I,
        offset: i64,
    ) -> Self {
        self.records.push(InterfaceRecord {
            module_name: module.into(),
            interface_name: interface.into(),
            offset,
        });
        self
    }

    pub fn record(mut self, record: InterfaceRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn build(self) -> Result<OffsetTable> {
        let version = self.version.trim();
        if version.is_empty() {
            return Err(malformed("table version is empty"));
        }

        let mut modules = HashMap::with_capacity(self.modules.len());
        for (name, fingerprint) in self.modules {
            if name.trim().is_empty() {
                return Err(malformed("module name is empty"));
            }
            if fingerprint.as_bytes().is_empty() {
                return Err(malformed(format!("module {} has an empty fingerprint", name)));
            }

            match modules.entry(module_key(&name)) {
                Entry::Occupied(_) => {
                    return Err(malformed(format!("module {} is declared twice", name)));
                }
                Entry::Vacant(slot) => {
                    slot.insert(ModuleOffsets {
                        name,
                        fingerprint,
                        interfaces: HashMap::new(),
                    });
                }
            }
        }

        for record in self.records {
            let module = modules
                .get_mut(&module_key(&record.module_name))
                .ok_or_else(|| {
                    malformed(format!(
                        "interface {} references undeclared module {}",
                        record.interface_name, record.module_name
                    ))
                })?;

            if record.interface_name.trim().is_empty() {
                return Err(malformed(format!(
                    "module {} has an interface with an empty name",
                    record.module_name
                )));
            }
            if record.offset < 0 {
                return Err(malformed(format!(
                    "{}!{} has negative offset {}",
                    record.module_name, record.interface_name, record.offset
                )));
            }

            match module.interfaces.entry(record.interface_name) {
                Entry::Occupied(existing) => {
                    return Err(malformed(format!(
                        "duplicate interface {}!{} (offsets {:#x} and {:#x})",
                        module.name,
                        existing.key(),
                        existing.get(),
                        record.offset
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(record.offset);
                }
            }
        }

        Ok(OffsetTable {
            version: version.to_string(),
            modules,
        })
    }
}

fn malformed<S: Into<String>>(reason: S) -> Error {
    Error::MalformedTable(reason.into())
}

/// Parse an offset written as decimal or `0x` hex, with an optional leading `-`.
pub fn parse_offset(s: &str) -> Result<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };

    let (radix, digits) = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => (16, hex),
        None => (10, digits),
    };

    // `from_str_radix` takes its own sign, which would let "--16" through
    if digits.starts_with(['+', '-']) {
        return Err(malformed(format!("invalid offset '{}': misplaced sign", s)));
    }

    let value = i64::from_str_radix(digits, radix)
        .map_err(|e| malformed(format!("invalid offset '{}': {}", s, e)))?;

    Ok(if negative { -value } else { value })
}
