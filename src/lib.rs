pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod services;
pub mod utils;

#[cfg(test)]
mod test_support;

pub use config::PatcherConfig;
pub use errors::{PatcherError, Result};
pub use models::{
    BuildChannel, HotPatchOutcome, InstallEvent, InstallManifest, InstallReport, Platform,
    ProgressEvent, ProgressPhase, VersionDescriptor,
};
pub use services::InstallOrchestrator;
