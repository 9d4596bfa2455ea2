//! Import of generated C++ offset headers.
//!
//! The offset dumper emits interface offsets as a header of constants:
//!
//! ```text
//! // 2025-09-11 07:42:49.512547700 UTC
//! namespace cs2_dumper {
//!     namespace interfaces {
//!         // Module: client.dll
//!         namespace client_dll {
//!             constexpr std::ptrdiff_t Source2Client002 = 0x1E2D410;
//!         }
//!     }
//! }
//! ```
//!
//! The header carries no build identity, so an import only becomes an
//! [`OffsetTable`] once a fingerprint is supplied for every module.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::{OffsetTable, module_key, parse_offset};
use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;

const MODULE_MARKER: &str = "// Module:";
const CONSTANT_MARKER: &str = "constexpr std::ptrdiff_t";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Offsets parsed from a generated header, not yet bound to module builds.
#[derive(Debug, Clone, Default)]
pub struct HeaderImport {
    /// Generation timestamp from the header comment, if present
    pub generated_at: Option<String>,
    /// Modules in header order, each with its (name, offset) pairs
    pub modules: Vec<(String, Vec<(String, i64)>)>,
}

impl HeaderImport {
    pub fn parse(source: &str) -> Result<Self> {
        let mut import = HeaderImport::default();

        for (index, raw) in source.lines().enumerate() {
            let line = raw.trim();
            let line_no = index + 1;

            if let Some(name) = line.strip_prefix(MODULE_MARKER) {
                let name = name.trim();
                if name.is_empty() {
                    return Err(Error::MalformedTable(format!(
                        "line {}: module comment without a name",
                        line_no
                    )));
                }
                import.modules.push((name.to_string(), Vec::new()));
                continue;
            }

            if let Some(rest) = line.strip_prefix(CONSTANT_MARKER) {
                let (name, value) = parse_constant(rest).ok_or_else(|| {
                    Error::MalformedTable(format!("line {}: unrecognized constant", line_no))
                })?;
                let offset = parse_offset(value)?;

                let (_, interfaces) = import.modules.last_mut().ok_or_else(|| {
                    Error::MalformedTable(format!(
                        "line {}: constant {} appears before any module",
                        line_no, name
                    ))
                })?;
                interfaces.push((name.to_string(), offset));
                continue;
            }

            if import.generated_at.is_none() {
                if let Some(comment) = line.strip_prefix("//") {
                    let comment = comment.trim();
                    if is_timestamp(comment) {
                        import.generated_at = Some(comment.to_string());
                    }
                }
            }
        }

        debug!(
            "Parsed offset header: {} modules, generated at {:?}",
            import.modules.len(),
            import.generated_at
        );
        Ok(import)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn module_names(&self) -> impl Iterator<Item = &str> {
        self.modules.iter().map(|(name, _)| name.as_str())
    }

    /// Drop modules for which `keep` returns false
    pub fn retain_modules<F: FnMut(&str) -> bool>(&mut self, mut keep: F) {
        self.modules.retain(|(name, _)| keep(name));
    }

    /// Bind the import to module builds.
    ///
    /// `version` overrides the header timestamp as the table label. Every
    /// module needs a fingerprint; a missing one is a malformed table.
    pub fn into_table(
        self,
        version: Option<String>,
        fingerprints: &HashMap<String, Fingerprint>,
    ) -> Result<OffsetTable> {
        let version = version
            .or(self.generated_at)
            .ok_or_else(|| {
                Error::MalformedTable(
                    "header has no generation timestamp and no version was given".to_string(),
                )
            })?;

        let mut by_key: HashMap<String, &Fingerprint> = HashMap::with_capacity(fingerprints.len());
        for (name, fingerprint) in fingerprints {
            if let Some(other) = by_key.insert(module_key(name), fingerprint) {
                if other != fingerprint {
                    return Err(Error::MalformedTable(format!(
                        "conflicting fingerprints for module {}",
                        name
                    )));
                }
            }
        }

        let mut builder = OffsetTable::builder(version);
        for (module, interfaces) in self.modules {
            let fingerprint = by_key
                .get(&module_key(&module))
                .map(|fp| (*fp).clone())
                .ok_or_else(|| {
                    Error::MalformedTable(format!("no fingerprint for module {}", module))
                })?;

            if interfaces.is_empty() {
                warn!("Module {} has no interfaces in the header", module);
            }
            for (name, offset) in interfaces {
                builder = builder.interface(&module, name, offset);
            }
            builder = builder.module(module, fingerprint);
        }

        builder.build()
    }
}

/// Split `Name = 0x1E2D410;` into its name and value
fn parse_constant(rest: &str) -> Option<(&str, &str)> {
    let (name, value) = rest.split_once('=')?;
    let name = name.trim();
    let value = value.trim().strip_suffix(';')?.trim();
    if name.is_empty() || value.is_empty() {
        return None;
    }
    Some((name, value))
}

fn is_timestamp(comment: &str) -> bool {
    let stamp = comment.strip_suffix("UTC").unwrap_or(comment).trim();
    NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).is_ok()
}
