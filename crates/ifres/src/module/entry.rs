use serde::Serialize;

use crate::fingerprint::Fingerprint;

/// A module as currently loaded in the target process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleEntry {
    /// Module name as reported by the target (e.g. `client.dll`)
    pub name: String,
    /// Build fingerprint computed from the loaded image header
    pub fingerprint: Fingerprint,
    pub base_address: u64,
    /// Size of the mapped image in bytes
    pub size: u64,
}

impl ModuleEntry {
    /// Whether `address` lies inside the mapped image
    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address - self.base_address < self.size
    }
}
