//! Fingerprint command implementation.

use anyhow::Result;
use ifres::FingerprintStrategy;

use super::Context;

/// Run the fingerprint command
pub fn run(ctx: &Context, module: &str, strategy: Option<FingerprintStrategy>) -> Result<()> {
    let locator = ctx.locator()?;
    let strategy = strategy.unwrap_or(locator.config().strategy);
    let entry = locator.locate_with(module, strategy)?;

    println!("Module:      {}", entry.name);
    println!("Base:        0x{:X}", entry.base_address);
    println!("Size:        0x{:X}", entry.size);
    println!("Fingerprint: {}", entry.fingerprint);

    Ok(())
}
