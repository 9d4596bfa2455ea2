//! Target process access.
//!
//! On Windows modules are enumerated with ToolHelp snapshots and headers
//! are read with `ReadProcessMemory`. Other platforms get a handle type with
//! the same API whose constructors always fail.

#[cfg(target_os = "windows")]
pub use windows_impl::ProcessHandle;

#[cfg(not(target_os = "windows"))]
pub use unsupported::ProcessHandle;

/// Convert a NUL-terminated UTF-16 buffer to a String
#[cfg_attr(not(target_os = "windows"), allow(dead_code))]
fn wide_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

#[cfg(target_os = "windows")]
mod windows_impl {
    use std::ffi::c_void;
    use std::mem::size_of;

    use tracing::debug;
    use windows::Win32::Foundation::{CloseHandle, HANDLE};
    use windows::Win32::System::Diagnostics::Debug::ReadProcessMemory;
    use windows::Win32::System::Diagnostics::ToolHelp::{
        CreateToolhelp32Snapshot, MODULEENTRY32W, Module32FirstW, Module32NextW, PROCESSENTRY32W,
        Process32FirstW, Process32NextW, TH32CS_SNAPMODULE, TH32CS_SNAPMODULE32,
        TH32CS_SNAPPROCESS,
    };
    use windows::Win32::System::Threading::{
        GetCurrentProcessId, OpenProcess, PROCESS_QUERY_INFORMATION, PROCESS_VM_READ,
    };

    use super::wide_to_string;
    use crate::error::{Error, Result};
    use crate::module::{ModuleInfo, ModuleSource};

    /// Closes a ToolHelp snapshot on drop
    struct Snapshot(HANDLE);

    impl Drop for Snapshot {
        fn drop(&mut self) {
            // SAFETY: the handle came from CreateToolhelp32Snapshot and is closed once.
            unsafe {
                let _ = CloseHandle(self.0);
            }
        }
    }

    /// Open handle to a target process with read access.
    pub struct ProcessHandle {
        pub pid: u32,
        handle: HANDLE,
    }

    // SAFETY: a process handle is a kernel object reference that may be used
    // from any thread; the handle is never mutated after construction.
    unsafe impl Send for ProcessHandle {}
    unsafe impl Sync for ProcessHandle {}

    impl ProcessHandle {
        /// Open a process by PID
        pub fn open(pid: u32) -> Result<Self> {
            // SAFETY: OpenProcess has no memory-safety preconditions.
            let handle =
                unsafe { OpenProcess(PROCESS_QUERY_INFORMATION | PROCESS_VM_READ, false, pid) }
                    .map_err(|e| Error::ProcessOpenFailed(format!("PID {}: {}", pid, e)))?;

            debug!("Opened process {}", pid);
            Ok(Self { pid, handle })
        }

        /// Open the first process whose executable name matches `exe_name`
        pub fn find_and_open(exe_name: &str) -> Result<Self> {
            let pid = find_process_id(exe_name)?
                .ok_or_else(|| Error::ProcessNotFound(exe_name.to_string()))?;
            Self::open(pid)
        }

        /// Open the calling process
        pub fn current() -> Result<Self> {
            // SAFETY: GetCurrentProcessId has no preconditions.
            let pid = unsafe { GetCurrentProcessId() };
            Self::open(pid)
        }
    }

    impl Drop for ProcessHandle {
        fn drop(&mut self) {
            // SAFETY: the handle came from OpenProcess and is closed once.
            unsafe {
                let _ = CloseHandle(self.handle);
            }
        }
    }

    impl ModuleSource for ProcessHandle {
        fn loaded_modules(&self) -> Result<Vec<ModuleInfo>> {
            // SAFETY: CreateToolhelp32Snapshot has no memory-safety preconditions.
            let snapshot = unsafe {
                CreateToolhelp32Snapshot(TH32CS_SNAPMODULE | TH32CS_SNAPMODULE32, self.pid)
            }
            .map(Snapshot)
            .map_err(|e| Error::ProcessOpenFailed(format!("module snapshot of {}: {}", self.pid, e)))?;

            let mut entry = MODULEENTRY32W {
                dwSize: size_of::<MODULEENTRY32W>() as u32,
                ..Default::default()
            };

            let mut modules = Vec::new();
            // SAFETY: entry is a properly sized MODULEENTRY32W owned by this frame.
            let mut ok = unsafe { Module32FirstW(snapshot.0, &mut entry) }.is_ok();
            while ok {
                modules.push(ModuleInfo {
                    name: wide_to_string(&entry.szModule),
                    base_address: entry.modBaseAddr as u64,
                    size: entry.modBaseSize as u64,
                });
                // SAFETY: as above.
                ok = unsafe { Module32NextW(snapshot.0, &mut entry) }.is_ok();
            }

            debug!("Process {} has {} modules loaded", self.pid, modules.len());
            Ok(modules)
        }

        fn read_bytes(&self, address: u64, size: usize) -> Result<Vec<u8>> {
            let mut buffer = vec![0u8; size];
            let mut read = 0usize;

            // SAFETY: buffer is valid for `size` bytes of writes and outlives the call.
            unsafe {
                ReadProcessMemory(
                    self.handle,
                    address as *const c_void,
                    buffer.as_mut_ptr().cast(),
                    size,
                    Some(&mut read as *mut usize),
                )
            }
            .map_err(|e| Error::MemoryReadFailed {
                address,
                message: e.to_string(),
            })?;

            if read != size {
                return Err(Error::MemoryReadFailed {
                    address,
                    message: format!("short read: {} of {} bytes", read, size),
                });
            }

            Ok(buffer)
        }
    }

    fn find_process_id(exe_name: &str) -> Result<Option<u32>> {
        // SAFETY: CreateToolhelp32Snapshot has no memory-safety preconditions.
        let snapshot = unsafe { CreateToolhelp32Snapshot(TH32CS_SNAPPROCESS, 0) }
            .map(Snapshot)
            .map_err(|e| Error::ProcessNotFound(format!("process snapshot failed: {}", e)))?;

        let mut entry = PROCESSENTRY32W {
            dwSize: size_of::<PROCESSENTRY32W>() as u32,
            ..Default::default()
        };

        // SAFETY: entry is a properly sized PROCESSENTRY32W owned by this frame.
        let mut ok = unsafe { Process32FirstW(snapshot.0, &mut entry) }.is_ok();
        while ok {
            if wide_to_string(&entry.szExeFile).eq_ignore_ascii_case(exe_name) {
                return Ok(Some(entry.th32ProcessID));
            }
            // SAFETY: as above.
            ok = unsafe { Process32NextW(snapshot.0, &mut entry) }.is_ok();
        }

        Ok(None)
    }
}

#[cfg(not(target_os = "windows"))]
mod unsupported {
    use crate::error::{Error, Result};
    use crate::module::{ModuleInfo, ModuleSource};

    const UNSUPPORTED: &str = "process access is only supported on Windows";

    /// Placeholder process handle; every constructor fails on this platform.
    pub struct ProcessHandle {
        pub pid: u32,
    }

    impl ProcessHandle {
        pub fn open(pid: u32) -> Result<Self> {
            Err(Error::ProcessOpenFailed(format!("PID {}: {}", pid, UNSUPPORTED)))
        }

        pub fn find_and_open(exe_name: &str) -> Result<Self> {
            Err(Error::ProcessNotFound(format!("{}: {}", exe_name, UNSUPPORTED)))
        }

        pub fn current() -> Result<Self> {
            Err(Error::ProcessOpenFailed(UNSUPPORTED.to_string()))
        }
    }

    impl ModuleSource for ProcessHandle {
        fn loaded_modules(&self) -> Result<Vec<ModuleInfo>> {
            Err(Error::ProcessOpenFailed(UNSUPPORTED.to_string()))
        }

        fn read_bytes(&self, address: u64, _size: usize) -> Result<Vec<u8>> {
            Err(Error::MemoryReadFailed {
                address,
                message: UNSUPPORTED.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_to_string_stops_at_nul() {
        let mut buf = [0u16; 16];
        for (i, c) in "client.dll".encode_utf16().enumerate() {
            buf[i] = c;
        }
        assert_eq!(wide_to_string(&buf), "client.dll");
    }

    #[test]
    fn test_wide_to_string_without_nul() {
        let buf: Vec<u16> = "engine2.dll".encode_utf16().collect();
        assert_eq!(wide_to_string(&buf), "engine2.dll");
    }

    #[cfg(not(target_os = "windows"))]
    #[test]
    fn test_unsupported_platform_fails_cleanly() {
        assert!(matches!(
            ProcessHandle::find_and_open("cs2.exe"),
            Err(crate::error::Error::ProcessNotFound(_))
        ));
        assert!(ProcessHandle::open(1234).is_err());
    }
}
