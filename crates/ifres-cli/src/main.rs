mod cli;
mod commands;
mod config;
mod retry;

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use cli::{Args, Command};
use commands::Context;
use config::Config;
use retry::Interrupt;

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "ifres=debug" } else { "ifres=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.parse()?))
        .with_writer(std::io::stderr)
        .init();

    let mut config = if args.config.exists() {
        match Config::load(&args.config) {
            Ok(c) => {
                info!("Loaded config from {:?}", args.config);
                c
            }
            Err(e) => {
                warn!("Failed to load config: {:#}, using defaults", e);
                Config::default()
            }
        }
    } else {
        debug!("No config at {:?}, using defaults", args.config);
        Config::default()
    };

    if let Some(table) = args.table {
        config.table = table;
    }
    if let Some(process) = args.process {
        config.process = process;
    }

    let interrupt = Arc::new(Interrupt::new());
    {
        let interrupt = Arc::clone(&interrupt);
        ctrlc::set_handler(move || interrupt.raise())?;
    }

    let ctx = Context {
        config,
        pid: args.pid,
    };

    match args.command {
        Command::Resolve {
            module,
            interface,
            wait,
            json,
        } => commands::resolve::run(&ctx, &module, &interface, wait, json, &interrupt),
        Command::Dump { module, json } => commands::dump::run(&ctx, &module, json),
        Command::Check => commands::check::run(&ctx),
        Command::Fingerprint { module, strategy } => {
            commands::fingerprint::run(&ctx, &module, strategy)
        }
        Command::Import {
            header,
            output,
            label,
            skip_missing,
        } => commands::import::run(&ctx, &header, &output, label, skip_missing),
        Command::List { module } => commands::list::run(&ctx, module.as_deref()),
        Command::Offset { from, to } => commands::offset::run(&from, &to),
    }
}
