//! Check command implementation.

use anyhow::{Result, bail};
use ifres::Error;
use owo_colors::OwoColorize;

use super::{Context, failure_hint};

/// Run the check command
pub fn run(ctx: &Context) -> Result<()> {
    let resolver = ctx.resolver()?;
    let table = resolver.table().snapshot();

    println!("=== Offset Table Check ===");
    println!("Table:   {} ({})", ctx.config.table.display(), table.version());
    println!();

    let status = resolver.check_all();

    for (module, result) in &status {
        match result {
            Ok(entry) => println!(
                "  {:<32} {}  base 0x{:X}, size 0x{:X}",
                module,
                "OK".green(),
                entry.base_address,
                entry.size
            ),
            Err(Error::ModuleNotLoaded { .. }) => {
                println!("  {:<32} {}", module, "NOT LOADED".yellow());
            }
            Err(e @ Error::StaleOffsets { actual, .. }) => {
                println!("  {:<32} {}  loaded build {}", module, "STALE".red(), actual);
                println!("  {:<32} {}", "", failure_hint(e).dimmed());
            }
            Err(e) => {
                println!("  {:<32} {}  {}", module, "ERROR".red(), e);
            }
        }
    }

    let tally = Tally::of(&status);
    println!();
    println!(
        "{} modules: {} ok, {} not loaded, {} stale, {} could not be checked",
        status.len(),
        tally.ok,
        tally.not_loaded,
        tally.stale,
        tally.unchecked
    );

    if tally.stale > 0 {
        bail!("{} modules do not match the offset table", tally.stale);
    }
    if tally.unchecked > 0 {
        bail!("{} modules could not be checked", tally.unchecked);
    }

    Ok(())
}

/// Per-status module counts
#[derive(Debug, Default, PartialEq, Eq)]
struct Tally {
    ok: usize,
    not_loaded: usize,
    stale: usize,
    unchecked: usize,
}

impl Tally {
    fn of<T>(status: &[(String, Result<T, Error>)]) -> Self {
        let mut tally = Self::default();
        for (_, result) in status {
            match result {
                Ok(_) => tally.ok += 1,
                Err(Error::ModuleNotLoaded { .. }) => tally.not_loaded += 1,
                Err(Error::StaleOffsets { .. }) => tally.stale += 1,
                Err(_) => tally.unchecked += 1,
            }
        }
        tally
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unreadable_modules_are_not_counted_as_stale() {
        let status: Vec<(String, Result<(), Error>)> = vec![
            ("client.dll".to_string(), Ok(())),
            (
                "engine2.dll".to_string(),
                Err(Error::StaleOffsets {
                    module: "engine2.dll".to_string(),
                    interface: None,
                    expected: "pe-header:00".to_string(),
                    actual: "pe-header:01".to_string(),
                }),
            ),
            (
                "garbage.dll".to_string(),
                Err(Error::InvalidImage("garbage.dll: missing MZ".to_string())),
            ),
            (
                "server.dll".to_string(),
                Err(Error::MemoryReadFailed {
                    address: 0x7FF6_0000_0000,
                    message: "partial copy".to_string(),
                }),
            ),
            (
                "tier0.dll".to_string(),
                Err(Error::ModuleNotLoaded {
                    module: "tier0.dll".to_string(),
                    interface: None,
                }),
            ),
        ];

        assert_eq!(
            Tally::of(&status),
            Tally {
                ok: 1,
                not_loaded: 1,
                stale: 1,
                unchecked: 2,
            }
        );
    }
}
