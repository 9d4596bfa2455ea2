//! Import command implementation.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Result, bail};
use ifres::{Error, Fingerprint, HeaderImport, ModuleLocator, ModuleSource, save_table};
use tracing::{info, warn};

use super::Context;

/// Run the import command
pub fn run(
    ctx: &Context,
    header: &Path,
    output: &Path,
    label: Option<String>,
    skip_missing: bool,
) -> Result<()> {
    let mut import = HeaderImport::load(header)?;
    info!(
        "Read {} modules from {}",
        import.modules.len(),
        header.display()
    );

    let locator = ctx.locator()?;
    let fingerprints = capture_fingerprints(&locator, &import, skip_missing)?;
    import.retain_modules(|name| fingerprints.contains_key(name));

    if import.modules.is_empty() {
        bail!("None of the header's modules are loaded in the target process");
    }

    let table = import.into_table(label, &fingerprints)?;
    save_table(output, &table)?;

    println!(
        "Wrote {} ({} modules, {} interfaces, version {})",
        output.display(),
        table.modules().len(),
        table.len(),
        table.version()
    );

    Ok(())
}

/// Fingerprint every module named in the import from the live process
fn capture_fingerprints<S: ModuleSource>(
    locator: &ModuleLocator<S>,
    import: &HeaderImport,
    skip_missing: bool,
) -> Result<HashMap<String, Fingerprint>> {
    let mut fingerprints = HashMap::new();

    for name in import.module_names() {
        match locator.locate(name) {
            Ok(entry) => {
                info!("{}: {}", name, entry.fingerprint);
                fingerprints.insert(name.to_string(), entry.fingerprint);
            }
            Err(Error::ModuleNotLoaded { .. }) if skip_missing => {
                warn!("Skipping {}: not loaded", name);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(fingerprints)
}
