use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatcherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Download error: {0}")]
    Download(String),
    #[error("Download timed out after {0}s")]
    Timeout(u64),
    #[error("Patch tool error: {0}")]
    PatchTool(String),
    #[error("Patch hash mismatch: {0}")]
    Integrity(String),
    #[error("Runtime install error: {0}")]
    RuntimeInstall(String),
    #[error("Filesystem error: {0}")]
    Filesystem(String),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Config error: {0}")]
    Config(String),
}

impl PatcherError {
    /// Stable tag attached to `install-error` events.
    pub fn kind(&self) -> &'static str {
        match self {
            PatcherError::Network(_) | PatcherError::Download(_) | PatcherError::Timeout(_) => {
                "download"
            }
            PatcherError::PatchTool(_) => "patch_tool",
            PatcherError::Integrity(_) => "integrity",
            PatcherError::RuntimeInstall(_) => "runtime_install",
            PatcherError::Filesystem(_) | PatcherError::Io(_) => "filesystem",
            PatcherError::Serde(_) => "serialization",
            PatcherError::Config(_) => "config",
        }
    }

    pub fn filesystem(action: &str, path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        PatcherError::Filesystem(format!("{} {}: {}", action, path.display(), err))
    }
}

pub type Result<T> = std::result::Result<T, PatcherError>;
