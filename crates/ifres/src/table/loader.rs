//! JSON carrier for offset tables.
//!
//! Modules and interfaces are stored as arrays rather than objects so that a
//! duplicated key survives parsing and is rejected by the table builder
//! instead of silently overwriting the earlier entry.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::{OffsetTable, parse_offset};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

#[derive(Debug, Serialize, Deserialize)]
struct TableFile {
    version: String,
    modules: Vec<ModuleFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ModuleFile {
    name: String,
    fingerprint: Fingerprint,
    #[serde(default)]
    interfaces: Vec<InterfaceFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct InterfaceFile {
    name: String,
    offset: OffsetValue,
}

/// Offsets may be written as plain integers or as hex strings
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum OffsetValue {
    Number(i64),
    Text(String),
}

impl OffsetValue {
    fn value(&self) -> Result<i64> {
        match self {
            OffsetValue::Number(n) => Ok(*n),
            OffsetValue::Text(s) => parse_offset(s),
        }
    }
}

impl OffsetTable {
    /// Parse and validate a table from its JSON form
    pub fn from_json(content: &str) -> Result<Self> {
        let file: TableFile = serde_json::from_str(content)
            .map_err(|e| Error::MalformedTable(format!("invalid table JSON: {}", e)))?;

        let mut builder = OffsetTable::builder(file.version);
        for module in file.modules {
            for interface in &module.interfaces {
                builder = builder.interface(&module.name, &interface.name, interface.offset.value()?);
            }
            builder = builder.module(module.name, module.fingerprint);
        }

        builder.build()
    }

    pub fn to_json(&self) -> Result<String> {
        let file = TableFile {
            version: self.version.clone(),
            modules: self
                .modules()
                .into_iter()
                .map(|module| ModuleFile {
                    name: module.name().to_string(),
                    fingerprint: module.fingerprint().clone(),
                    interfaces: module
                        .interfaces()
                        .into_iter()
                        .map(|(name, offset)| InterfaceFile {
                            name: name.to_string(),
                            offset: OffsetValue::Text(format!("{:#X}", offset)),
                        })
                        .collect(),
                })
                .collect(),
        };

        Ok(serde_json::to_string_pretty(&file)?)
    }
}

/// Load an offset table from a JSON file
pub fn load_table<P: AsRef<Path>>(path: P) -> Result<OffsetTable> {
    let content = fs::read_to_string(&path)?;
    let table = OffsetTable::from_json(&content)?;
    info!(
        "Loaded offset table {} ({} modules, {} interfaces) from {}",
        table.version(),
        table.modules().len(),
        table.len(),
        path.as_ref().display()
    );
    Ok(table)
}

/// Save an offset table as JSON
pub fn save_table<P: AsRef<Path>>(path: P, table: &OffsetTable) -> Result<()> {
    fs::write(&path, table.to_json()?)?;
    info!("Saved offset table to {}", path.as_ref().display());
    Ok(())
}
