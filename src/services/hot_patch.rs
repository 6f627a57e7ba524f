use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{PatcherError, Result};
use crate::models::{HotPatchOutcome, InstallEvent, Platform, ProgressPhase, VersionDescriptor};
use crate::services::collaborators::ArtifactFetcher;
use crate::services::events::EventSink;
use crate::utils::file::{remove_file_if_exists, replace_file, restore_executable_bit};
use crate::utils::hash::{compute_sha256_file_async, hashes_match, sanitize_hash};
use crate::utils::paths;

/// Out-of-band replacement of the client executable, verified by SHA-256.
#[derive(Clone)]
pub struct HotPatchVerifier {
    fetcher: Arc<dyn ArtifactFetcher>,
    platform: Platform,
    enabled: bool,
}

impl HotPatchVerifier {
    pub fn new(fetcher: Arc<dyn ArtifactFetcher>, platform: Platform, enabled: bool) -> Self {
        Self {
            fetcher,
            platform,
            enabled,
        }
    }

    /// Never fails: errors are reported as `online-patch-error` and the base install stands.
    pub async fn run(
        &self,
        install_dir: &Path,
        version: &VersionDescriptor,
        sink: &dyn EventSink,
    ) -> HotPatchOutcome {
        let outcome = match self.apply(install_dir, version, sink).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("online patch for build {} failed: {}", version.build_index, err);
                sink.emit(InstallEvent::OnlinePatchError {
                    message: err.to_string(),
                });
                HotPatchOutcome::Failed(err.to_string())
            }
        };
        sink.emit(InstallEvent::OnlinePatchStatus(outcome.clone()));
        outcome
    }

    pub async fn apply(
        &self,
        install_dir: &Path,
        version: &VersionDescriptor,
        sink: &dyn EventSink,
    ) -> Result<HotPatchOutcome> {
        if !self.platform.supports_hot_patch() {
            return Ok(HotPatchOutcome::Skipped("unsupported platform".to_string()));
        }
        if !self.enabled {
            return Ok(HotPatchOutcome::Skipped("disabled".to_string()));
        }
        let (Some(url), Some(expected)) = (
            version.patch_url.as_deref().map(str::trim).filter(|v| !v.is_empty()),
            version.patch_hash.as_deref().map(str::trim).filter(|v| !v.is_empty()),
        ) else {
            return Ok(HotPatchOutcome::Skipped("no patch metadata".to_string()));
        };

        let expected = sanitize_hash(expected)
            .ok_or_else(|| PatcherError::Integrity(format!("malformed expected hash {expected:?}")))?;

        let client = paths::client_binary(install_dir, self.platform);
        if tokio::fs::metadata(&client).await.is_err() {
            return Ok(HotPatchOutcome::Skipped("client binary missing".to_string()));
        }

        let current = compute_sha256_file_async(client.clone()).await?;
        if hashes_match(&current, &expected) {
            tracing::info!("client for build {} is up to date", version.build_index);
            return Ok(HotPatchOutcome::UpToDate);
        }

        let temp = download_path(&client);
        if let Err(err) = self
            .fetcher
            .fetch(url, &temp, ProgressPhase::OnlinePatch, sink)
            .await
        {
            discard(&temp);
            return Err(err);
        }

        let downloaded = match compute_sha256_file_async(temp.clone()).await {
            Ok(digest) => digest,
            Err(err) => {
                discard(&temp);
                return Err(err);
            }
        };
        if !hashes_match(&downloaded, &expected) {
            discard(&temp);
            return Err(PatcherError::Integrity(format!(
                "expected {}, got {}",
                expected, downloaded
            )));
        }

        install_verified(&temp, &client)?;
        tracing::info!("online patch applied to {}", client.display());
        Ok(HotPatchOutcome::Patched)
    }
}

/// Swaps a hash-verified download over the client. On failure the download stays on
/// disk, since the client may already be gone or half-written.
fn install_verified(temp: &Path, client: &Path) -> Result<()> {
    if let Err(err) = replace_file(temp, client) {
        tracing::warn!(
            "could not replace {}, verified copy kept at {}: {}",
            client.display(),
            temp.display(),
            err
        );
        return Err(PatcherError::filesystem("replace", client, err));
    }
    if let Err(err) = restore_executable_bit(client) {
        tracing::debug!("could not mark {} executable: {}", client.display(), err);
    }
    Ok(())
}

fn download_path(client: &Path) -> PathBuf {
    let mut name = client
        .file_name()
        .map(|value| value.to_os_string())
        .unwrap_or_default();
    name.push(".download");
    client.with_file_name(name)
}

fn discard(path: &Path) {
    if let Err(err) = remove_file_if_exists(path) {
        tracing::debug!("could not remove {}: {}", path.display(), err);
    }
}
