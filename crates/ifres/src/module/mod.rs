//! Loaded-module discovery in a target process.
//!
//! - [`ModuleSource`]: enumerates modules and reads image headers (OS facing)
//! - [`ModuleLocator`]: finds one module by name and fingerprints its build
//! - [`ProcessHandle`]: Windows implementation of `ModuleSource`

mod entry;
mod locator;
mod process;
mod source;

#[cfg(test)]
pub mod mock;

pub use entry::*;
pub use locator::*;
pub use process::*;
pub use source::*;

#[cfg(test)]
pub use mock::{MockModuleBuilder, MockModuleSource};
