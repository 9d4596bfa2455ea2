use std::sync::{Arc, RwLock};

use tracing::info;

use super::OffsetTable;

/// Replaceable handle to the current offset table.
///
/// Readers take a snapshot (`Arc<OffsetTable>`) and keep using it for the
/// whole operation; [`replace`](Self::replace) swaps the whole table at once,
/// so no reader ever sees a mix of two tables. Clones share the same slot.
#[derive(Debug, Clone)]
pub struct SharedTable {
    current: Arc<RwLock<Arc<OffsetTable>>>,
}

impl SharedTable {
    pub fn new(table: OffsetTable) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(table))),
        }
    }

    /// Current table. Later replacements do not affect the returned snapshot.
    pub fn snapshot(&self) -> Arc<OffsetTable> {
        // The slot only ever holds a complete table, so a poisoned lock is still consistent
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Install a new table, returning the one it replaced
    pub fn replace(&self, table: OffsetTable) -> Arc<OffsetTable> {
        let table = Arc::new(table);
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        let previous = std::mem::replace(&mut *guard, table);
        info!(
            "Replaced offset table {} with {}",
            previous.version(),
            guard.version()
        );
        previous
    }
}

impl From<OffsetTable> for SharedTable {
    fn from(table: OffsetTable) -> Self {
        Self::new(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::{Fingerprint, FingerprintStrategy};
    use std::thread;

    fn table(version: &str, offset: i64) -> OffsetTable {
        OffsetTable::builder(version)
            .module(
                "client.dll",
                Fingerprint::new(FingerprintStrategy::PeHeader, vec![1; 12]),
            )
            .interface("client.dll", "Source2Client002", offset)
            .interface("client.dll", "Source2ClientUI001", offset + 0x10)
            .build()
            .unwrap()
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let shared = SharedTable::new(table("v1", 0x100));
        let before = shared.snapshot();

        let previous = shared.replace(table("v2", 0x200));

        assert_eq!(previous.version(), "v1");
        assert_eq!(before.lookup("client.dll", "Source2Client002"), Some(0x100));
        assert_eq!(
            shared.snapshot().lookup("client.dll", "Source2Client002"),
            Some(0x200)
        );
    }

    #[test]
    fn test_clones_share_the_slot() {
        let shared = SharedTable::new(table("v1", 0x100));
        let other = shared.clone();

        other.replace(table("v2", 0x200));
        assert_eq!(shared.snapshot().version(), "v2");
    }

    #[test]
    fn test_readers_never_see_a_mixed_table() {
        let shared = SharedTable::new(table("v1", 0x100));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let snap = shared.snapshot();
                        let a = snap.lookup("client.dll", "Source2Client002").unwrap();
                        let b = snap.lookup("client.dll", "Source2ClientUI001").unwrap();
                        assert_eq!(b - a, 0x10);
                    }
                })
            })
            .collect();

        for i in 0..100 {
            shared.replace(table(&format!("v{}", i + 2), 0x1000 * (i + 2)));
        }

        for reader in readers {
            reader.join().unwrap();
        }
    }
}
