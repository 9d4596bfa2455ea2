//! # ifres
//!
//! Locates native interface instances in a running process from a table of
//! pre-captured module offsets, without calling the process's own
//! interface factory.
//!
//! This crate provides:
//! - An immutable, versioned offset table (JSON and generated-header carriers)
//! - Module enumeration and build fingerprinting for a target process
//! - Staleness validation of table entries against the loaded build
//! - A resolver combining the above into `base + offset` with bounds checks
//!
//! Every resolution re-reads the target's module list; resolved addresses
//! are never cached here because a module reload invalidates them.

pub mod error;
pub mod fingerprint;
pub mod module;
pub mod resolver;
pub mod table;
pub mod validate;

pub use error::{Error, Result};
pub use fingerprint::{Fingerprint, FingerprintStrategy};
pub use module::{
    DEFAULT_HEADER_SIZE, LocatorConfig, LocatorConfigBuilder, ModuleEntry, ModuleInfo,
    ModuleLocator, ModuleSource, ProcessHandle,
};
pub use resolver::{InterfaceResolver, ResolvedInterface, checked_address};
pub use table::{
    HeaderImport, InterfaceRecord, ModuleOffsets, OffsetTable, OffsetTableBuilder, SharedTable,
    load_table, parse_offset, save_table,
};
pub use validate::validate;
