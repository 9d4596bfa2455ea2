//! Dump command implementation.

use anyhow::{Result, bail};
use owo_colors::OwoColorize;

use super::{Context, failure_hint};

/// Run the dump command
pub fn run(ctx: &Context, module: &str, json: bool) -> Result<()> {
    let resolver = ctx.resolver()?;
    let results = resolver.resolve_module(module)?;

    let mut resolved = Vec::with_capacity(results.len());
    let mut failures = 0usize;
    for result in results {
        match result {
            Ok(r) => resolved.push(r),
            Err(e) => {
                failures += 1;
                eprintln!("{} {} ({})", "error:".red(), e, failure_hint(&e));
            }
        }
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&resolved)?);
    } else {
        println!("=== {} ===", module);
        for r in &resolved {
            println!("  {:<48} 0x{:X}", r.interface_name, r.address);
        }
    }

    if failures > 0 {
        bail!("{} interfaces of {} could not be resolved", failures, module);
    }

    Ok(())
}
