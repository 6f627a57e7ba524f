pub mod collaborators;
pub mod download_engine;
pub mod events;
pub mod hot_patch;
pub mod install_orchestrator;
pub mod manifest_store;
pub mod patch_applier;

pub use collaborators::{
    ArtifactFetcher, FixedPatchTool, PatchRunner, PatchToolProvider, PreinstalledRuntime,
    RuntimeInstaller,
};
pub use download_engine::DownloadEngine;
pub use events::{ChannelSink, EventSink, MemorySink, NoopPresence, PresenceChannel};
pub use hot_patch::HotPatchVerifier;
pub use install_orchestrator::{patch_required, BinaryPresence, InstallOrchestrator, InstallStage};
pub use manifest_store::ManifestStore;
pub use patch_applier::{parse_progress_line, PatchApplier};
