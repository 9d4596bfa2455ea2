//! In-memory module source for tests.

use std::sync::{Mutex, RwLock};

use super::{ModuleInfo, ModuleSource};
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
struct MockModule {
    info: ModuleInfo,
    header: Vec<u8>,
}

/// Module source backed by a list of fake modules.
///
/// Image bytes past the supplied header read as zero. Modules can be loaded
/// and unloaded while the source is shared, to simulate a target that
/// reloads a library between calls.
#[derive(Debug, Default)]
pub struct MockModuleSource {
    modules: RwLock<Vec<MockModule>>,
    reads: Mutex<Vec<(u64, usize)>>,
}

impl MockModuleSource {
    pub fn load(&self, name: &str, base_address: u64, size: u64, header: Vec<u8>) {
        let mut modules = self.modules.write().unwrap();
        modules.retain(|m| !m.info.name.eq_ignore_ascii_case(name));
        modules.push(MockModule {
            info: ModuleInfo {
                name: name.to_string(),
                base_address,
                size,
            },
            header,
        });
    }

    pub fn unload(&self, name: &str) {
        self.modules
            .write()
            .unwrap()
            .retain(|m| !m.info.name.eq_ignore_ascii_case(name));
    }

    /// Every `(address, size)` passed to `read_bytes` so far
    pub fn reads(&self) -> Vec<(u64, usize)> {
        self.reads.lock().unwrap().clone()
    }
}

impl ModuleSource for MockModuleSource {
    fn loaded_modules(&self) -> Result<Vec<ModuleInfo>> {
        Ok(self
            .modules
            .read()
            .unwrap()
            .iter()
            .map(|m| m.info.clone())
            .collect())
    }

    fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
        self.reads.lock().unwrap().push((address, size));

        let modules = self.modules.read().unwrap();
        let module = modules
            .iter()
            .find(|m| {
                address >= m.info.base_address
                    && address + size as u64 <= m.info.base_address + m.info.size
            })
            .ok_or_else(|| Error::MemoryReadFailed {
                address,
                message: "address not mapped".to_string(),
            })?;

        let start = (address - module.info.base_address) as usize;
        let mut bytes = vec![0u8; size];
        if start < module.header.len() {
            let end = (start + size).min(module.header.len());
            bytes[..end - start].copy_from_slice(&module.header[start..end]);
        }
        Ok(bytes)
    }
}

/// Builder for MockModuleSource
#[derive(Debug, Default)]
pub struct MockModuleBuilder {
    source: MockModuleSource,
}

impl MockModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(self, name: &str, base_address: u64, size: u64, header: Vec<u8>) -> Self {
        self.source.load(name, base_address, size, header);
        self
    }

    pub fn build(self) -> MockModuleSource {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_pads_past_header() {
        let source = MockModuleBuilder::new()
            .module("a.dll", 0x1000, 0x100, vec![1, 2, 3, 4])
            .build();

        assert_eq!(source.read_bytes(0x1002, 4).unwrap(), vec![3, 4, 0, 0]);
        assert_eq!(source.read_bytes(0x1010, 2).unwrap(), vec![0, 0]);
    }

    #[test]
    fn test_read_outside_module_fails() {
        let source = MockModuleBuilder::new()
            .module("a.dll", 0x1000, 0x100, vec![1, 2, 3, 4])
            .build();

        assert!(matches!(
            source.read_bytes(0x10F0, 0x20),
            Err(Error::MemoryReadFailed { address: 0x10F0, .. })
        ));
    }

    #[test]
    fn test_reload_replaces_module() {
        let source = MockModuleBuilder::new()
            .module("a.dll", 0x1000, 0x100, vec![1])
            .build();
        source.load("A.DLL", 0x2000, 0x100, vec![2]);

        let modules = source.loaded_modules().unwrap();
        assert_eq!(modules.len(), 1);
        assert_eq!(modules[0].base_address, 0x2000);

        source.unload("a.dll");
        assert!(source.loaded_modules().unwrap().is_empty());
    }
}
