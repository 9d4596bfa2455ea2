//! List command implementation.

use anyhow::{Result, bail};

use super::Context;

/// Run the list command
pub fn run(ctx: &Context, module: Option<&str>) -> Result<()> {
    let table = ctx.load_table()?;

    let modules = match module {
        Some(name) => match table.module(name) {
            Some(m) => vec![m],
            None => bail!("Module {} is not in the table", name),
        },
        None => table.modules(),
    };

    println!("Table version: {}", table.version());
    for m in modules {
        println!();
        println!("{} [{}]", m.name(), m.fingerprint());
        for (name, offset) in m.interfaces() {
            println!("  {:<48} 0x{:X}", name, offset);
        }
    }

    Ok(())
}
