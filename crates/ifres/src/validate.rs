//! Staleness check between a loaded module and the table it is read with.

use tracing::warn;

use crate::error::{Error, Result};
use crate::fingerprint::Fingerprint;
use crate::module::ModuleEntry;

/// Check that `module` is the build the table's offsets were captured from.
///
/// Only exact equality passes. A fingerprint that differs in a single bit is
/// rejected exactly like a completely different build.
pub fn validate(module: &ModuleEntry, captured: &Fingerprint) -> Result<()> {
    if module.fingerprint == *captured {
        return Ok(());
    }

    warn!(
        "Stale offsets for {}: table captured {}, loaded build is {}",
        module.name, captured, module.fingerprint
    );
    Err(Error::StaleOffsets {
        module: module.name.clone(),
        interface: None,
        expected: captured.to_string(),
        actual: module.fingerprint.to_string(),
    })
}
