//! Command-line definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ifres::FingerprintStrategy;

#[derive(Parser)]
#[command(name = "ifres")]
#[command(about = "Resolve native interface addresses from a captured offset table")]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short, long, default_value = "ifres.toml", env = "IFRES_CONFIG")]
    pub config: PathBuf,

    /// Offset table (JSON); overrides the config file
    #[arg(short, long, env = "IFRES_TABLE")]
    pub table: Option<PathBuf>,

    /// Target process executable name; overrides the config file
    #[arg(short, long)]
    pub process: Option<String>,

    /// Target process ID; takes precedence over --process
    #[arg(long)]
    pub pid: Option<u32>,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Resolve one interface to its address in the target process
    Resolve {
        module: String,
        interface: String,

        /// Keep retrying while the module is not loaded yet
        #[arg(short, long)]
        wait: bool,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve every interface the table lists for a module
    Dump {
        module: String,

        /// Print the results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check every table module against the loaded builds
    Check,

    /// Print the build fingerprint of a loaded module
    Fingerprint {
        module: String,

        /// Fingerprint strategy (defaults to the configured one)
        #[arg(short, long)]
        strategy: Option<FingerprintStrategy>,
    },

    /// Convert a generated offset header into a table, fingerprinting
    /// each module from the running process
    Import {
        /// Generated C++ header with interface offsets
        header: PathBuf,

        /// Output table path
        #[arg(short, long)]
        output: PathBuf,

        /// Table version label (defaults to the header timestamp)
        #[arg(long)]
        label: Option<String>,

        /// Drop modules that are not loaded instead of failing
        #[arg(long)]
        skip_missing: bool,
    },

    /// List the table contents
    List {
        /// Only list this module
        #[arg(short, long)]
        module: Option<String>,
    },

    /// Calculate offset between two addresses
    Offset {
        /// Starting address (hex)
        from: String,
        /// Target address (hex)
        to: String,
    },
}
