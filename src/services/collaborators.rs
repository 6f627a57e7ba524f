use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Platform, ProgressPhase};
use crate::services::events::EventSink;
use crate::utils::paths;

/// Streams a remote artifact to disk.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        phase: ProgressPhase,
        sink: &dyn EventSink,
    ) -> Result<PathBuf>;
}

/// Materializes a build from a patch artifact.
#[async_trait]
pub trait PatchRunner: Send + Sync {
    async fn apply(
        &self,
        artifact: &Path,
        tool: &Path,
        staging_dir: &Path,
        target_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<PathBuf>;
}

/// Installs the managed Java runtime; `None` means the installer gave up.
#[async_trait]
pub trait RuntimeInstaller: Send + Sync {
    async fn install_runtime(&self, game_root: &Path) -> Result<Option<PathBuf>>;
}

/// Acquires the external patch tool binary; `None` means it is unavailable.
#[async_trait]
pub trait PatchToolProvider: Send + Sync {
    async fn ensure_patch_tool(&self) -> Result<Option<PathBuf>>;
}

/// Patch tool already unpacked at a known location.
#[derive(Clone, Debug)]
pub struct FixedPatchTool {
    path: PathBuf,
}

impl FixedPatchTool {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl PatchToolProvider for FixedPatchTool {
    async fn ensure_patch_tool(&self) -> Result<Option<PathBuf>> {
        if tokio::fs::metadata(&self.path).await.is_ok() {
            Ok(Some(self.path.clone()))
        } else {
            tracing::warn!("patch tool not found at {}", self.path.display());
            Ok(None)
        }
    }
}

/// Runtime provisioned out of band; succeeds only once the runtime binary is on disk.
#[derive(Clone, Debug)]
pub struct PreinstalledRuntime {
    platform: Platform,
}

impl PreinstalledRuntime {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }
}

#[async_trait]
impl RuntimeInstaller for PreinstalledRuntime {
    async fn install_runtime(&self, game_root: &Path) -> Result<Option<PathBuf>> {
        let runtime = paths::runtime_binary(game_root, self.platform);
        if tokio::fs::metadata(&runtime).await.is_ok() {
            Ok(Some(runtime))
        } else {
            Ok(None)
        }
    }
}
