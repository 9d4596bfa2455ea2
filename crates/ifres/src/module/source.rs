use crate::error::Result;

/// A module in an enumeration snapshot, before fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInfo {
    pub name: String,
    pub base_address: u64,
    pub size: u64,
}

/// Access to the loaded modules of a target process.
///
/// Implementations must be callable from several threads at once. Each call
/// to [`loaded_modules`](Self::loaded_modules) returns one self-consistent
/// snapshot; no state is carried between calls.
pub trait ModuleSource: Send + Sync {
    fn loaded_modules(&self) -> Result<Vec<ModuleInfo>>;

    /// Read `size` bytes of target memory starting at `address`
    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>>;
}

impl<S: ModuleSource + ?Sized> ModuleSource for &S {
    fn loaded_modules(&self) -> Result<Vec<ModuleInfo>> {
        (**self).loaded_modules()
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}

impl<S: ModuleSource + ?Sized> ModuleSource for std::sync::Arc<S> {
    fn loaded_modules(&self) -> Result<Vec<ModuleInfo>> {
        (**self).loaded_modules()
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        (**self).read_bytes(address, size)
    }
}
