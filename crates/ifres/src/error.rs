use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed offset table: {0}")]
    MalformedTable(String),

    #[error("Unknown interface {interface} in module {module}")]
    UnknownInterface { module: String, interface: String },

    #[error("Module {module} is not loaded{}", requested(.interface))]
    ModuleNotLoaded {
        module: String,
        interface: Option<String>,
    },

    #[error(
        "Stale offsets for module {module}{}: table fingerprint {expected}, loaded fingerprint {actual}",
        requested(.interface)
    )]
    StaleOffsets {
        module: String,
        interface: Option<String>,
        expected: String,
        actual: String,
    },

    #[error(
        "Offset {offset:#x} of {interface} lies outside module {module} (size {size:#x})"
    )]
    OffsetOutOfBounds {
        module: String,
        interface: String,
        offset: i64,
        size: u64,
    },

    #[error("Unknown module {module}: not present in the offset table")]
    UnknownModule { module: String },

    #[error("Invalid module image: {0}")]
    InvalidImage(String),

    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Failed to open process: {0}")]
    ProcessOpenFailed(String),

    #[error("Failed to read process memory at address {address:#x}: {message}")]
    MemoryReadFailed { address: u64, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

fn requested(interface: &Option<String>) -> String {
    match interface {
        Some(name) => format!(" (requested {})", name),
        None => String::new(),
    }
}

impl Error {
    /// Check if this error is a "file not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Whether retrying the same request later with the same table can succeed.
    ///
    /// Only a module that is not mapped yet qualifies; everything else needs
    /// a corrected request, a new table, or a new process.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ModuleNotLoaded { .. })
    }

    /// Attach the requested interface name to module-level failures.
    pub fn for_interface(self, name: &str) -> Self {
        match self {
            Error::ModuleNotLoaded { module, .. } => Error::ModuleNotLoaded {
                module,
                interface: Some(name.to_string()),
            },
            Error::StaleOffsets {
                module,
                expected,
                actual,
                ..
            } => Error::StaleOffsets {
                module,
                interface: Some(name.to_string()),
                expected,
                actual,
            },
            other => other,
        }
    }
}
