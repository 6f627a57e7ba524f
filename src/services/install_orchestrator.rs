use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::Instrument;

use crate::config::PatcherConfig;
use crate::errors::{PatcherError, Result};
use crate::models::{
    BuildChannel, InstallEvent, InstallManifest, InstallReport, Platform, ProgressEvent,
    ProgressPhase, VersionDescriptor,
};
use crate::services::collaborators::{
    ArtifactFetcher, PatchRunner, PatchToolProvider, RuntimeInstaller,
};
use crate::services::download_engine::DownloadEngine;
use crate::services::events::{EventSink, NoopPresence, PresenceChannel};
use crate::services::hot_patch::HotPatchVerifier;
use crate::services::manifest_store::ManifestStore;
use crate::services::patch_applier::PatchApplier;
use crate::utils::file::{remove_dir_if_exists, remove_file_if_exists, restore_executable_bit};
use crate::utils::paths;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstallStage {
    Idle,
    Resolving,
    RetiringLatest,
    InstallingRuntime,
    Patching,
    Verifying,
    Done,
    Failed,
}

/// Which of the binaries a playable install needs are on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BinaryPresence {
    pub client: bool,
    pub server: bool,
    pub runtime: bool,
}

impl BinaryPresence {
    pub fn inspect(game_root: &Path, install_dir: &Path, platform: Platform) -> Self {
        Self {
            client: paths::client_binary(install_dir, platform).is_file(),
            server: paths::server_binary(install_dir, platform).is_file(),
            runtime: paths::runtime_binary(game_root, platform).is_file(),
        }
    }

    pub fn game_binaries_present(&self) -> bool {
        self.client && self.server
    }

    pub fn missing_game_binaries(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.client {
            missing.push("client");
        }
        if !self.server {
            missing.push("server");
        }
        missing
    }
}

/// A matching manifest only counts when the binaries it vouches for are still there.
pub fn patch_required(
    manifest: Option<&InstallManifest>,
    presence: &BinaryPresence,
    target: &VersionDescriptor,
) -> bool {
    match manifest {
        Some(manifest) if manifest.build_index == target.build_index => {
            !presence.game_binaries_present()
        }
        _ => true,
    }
}

pub struct InstallOrchestrator {
    game_root: PathBuf,
    platform: Platform,
    manifests: ManifestStore,
    fetcher: Arc<dyn ArtifactFetcher>,
    patcher: Arc<dyn PatchRunner>,
    runtime: Arc<dyn RuntimeInstaller>,
    tools: Arc<dyn PatchToolProvider>,
    hot_patch: HotPatchVerifier,
    sink: Arc<dyn EventSink>,
    presence: Arc<dyn PresenceChannel>,
    install_lock: tokio::sync::Mutex<()>,
    stage: Mutex<InstallStage>,
}

impl InstallOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        game_root: PathBuf,
        platform: Platform,
        fetcher: Arc<dyn ArtifactFetcher>,
        patcher: Arc<dyn PatchRunner>,
        runtime: Arc<dyn RuntimeInstaller>,
        tools: Arc<dyn PatchToolProvider>,
        sink: Arc<dyn EventSink>,
        hot_patch_enabled: bool,
    ) -> Self {
        let hot_patch = HotPatchVerifier::new(Arc::clone(&fetcher), platform, hot_patch_enabled);
        Self {
            game_root,
            platform,
            manifests: ManifestStore::new(),
            fetcher,
            patcher,
            runtime,
            tools,
            hot_patch,
            sink,
            presence: Arc::new(NoopPresence),
            install_lock: tokio::sync::Mutex::new(()),
            stage: Mutex::new(InstallStage::Idle),
        }
    }

    /// Wires the HTTP download engine and the subprocess patch applier.
    pub fn from_config(
        config: &PatcherConfig,
        runtime: Arc<dyn RuntimeInstaller>,
        tools: Arc<dyn PatchToolProvider>,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self> {
        let fetcher = Arc::new(DownloadEngine::new(config)?);
        let patcher = Arc::new(PatchApplier::new(config.strict_tool_exit));
        Ok(Self::new(
            config.game_root.clone(),
            Platform::current(),
            fetcher,
            patcher,
            runtime,
            tools,
            sink,
            config.hot_patch_enabled,
        ))
    }

    pub fn with_presence(mut self, presence: Arc<dyn PresenceChannel>) -> Self {
        self.presence = presence;
        self
    }

    pub fn game_root(&self) -> &Path {
        &self.game_root
    }

    pub fn stage(&self) -> InstallStage {
        match self.stage.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Whether `version` is fully materialized. Reads the manifest and stats binaries only,
    /// no network or subprocess work.
    pub fn is_installed(&self, version: &VersionDescriptor) -> Result<bool> {
        let install_dir = paths::install_dir(&self.game_root, version);
        let manifest = self.manifests.read(&install_dir)?;
        let presence = BinaryPresence::inspect(&self.game_root, &install_dir, self.platform);
        Ok(!patch_required(manifest.as_ref(), &presence, version))
    }

    /// Brings the install for `version` up to date. Concurrent calls on one orchestrator
    /// run one after another.
    pub async fn install(&self, version: &VersionDescriptor) -> Result<InstallReport> {
        let _guard = self.install_lock.lock().await;
        let span = tracing::info_span!(
            "install",
            build_index = version.build_index,
            channel = version.channel.dir_name()
        );

        async {
            self.sink.emit(InstallEvent::InstallStarted(version.clone()));
            self.presence.set_state("Installing", &version.label());

            let result = self.run(version).await;
            self.presence.clear();

            match result {
                Ok(report) => {
                    self.set_stage(InstallStage::Done);
                    tracing::info!("install of {} finished", version.label());
                    self.sink.emit(InstallEvent::InstallFinished(version.clone()));
                    Ok(report)
                }
                Err(err) => {
                    self.set_stage(InstallStage::Failed);
                    tracing::error!("install of {} failed: {}", version.label(), err);
                    self.sink.emit(InstallEvent::InstallError {
                        message: err.to_string(),
                        kind: err.kind().to_string(),
                    });
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, version: &VersionDescriptor) -> Result<InstallReport> {
        self.set_stage(InstallStage::Resolving);
        paths::migrate_legacy_layout(&self.game_root)?;

        if version.uses_latest_alias() {
            let latest = paths::latest_dir(&self.game_root);
            if let Some(current) = self.manifests.read(&latest)? {
                if current.build_index != version.build_index {
                    self.retire_latest(&latest, current.build_index)?;
                }
            }
        }

        let install_dir = paths::install_dir(&self.game_root, version);
        let presence = BinaryPresence::inspect(&self.game_root, &install_dir, self.platform);
        let manifest = self.manifests.read(&install_dir)?;
        let needs_patch = patch_required(manifest.as_ref(), &presence, version);
        match (&manifest, needs_patch) {
            (_, false) => tracing::info!("build {} already installed", version.build_index),
            (Some(current), true) if current.build_index == version.build_index => {
                tracing::warn!(
                    "build {} recorded but {} missing, repairing",
                    version.build_index,
                    presence.missing_game_binaries().join(", ")
                );
            }
            (Some(current), true) => tracing::info!(
                "updating {} from build {} to {}",
                install_dir.display(),
                current.build_index,
                version.build_index
            ),
            (None, true) => tracing::info!("fresh install into {}", install_dir.display()),
        }

        if !presence.runtime {
            self.set_stage(InstallStage::InstallingRuntime);
            self.install_runtime().await?;
        }

        if needs_patch {
            self.set_stage(InstallStage::Patching);
            self.patch(version, &install_dir).await?;
        }

        self.set_stage(InstallStage::Verifying);
        let after = BinaryPresence::inspect(&self.game_root, &install_dir, self.platform);
        if !after.game_binaries_present() {
            tracing::warn!(
                "{} still missing after install: {}",
                install_dir.display(),
                after.missing_game_binaries().join(", ")
            );
        }
        let hot_patch = self
            .hot_patch
            .run(&install_dir, version, self.sink.as_ref())
            .await;

        Ok(InstallReport {
            version: version.clone(),
            install_dir: install_dir.to_string_lossy().to_string(),
            patched: needs_patch,
            hot_patch,
            finished_at: chrono::Utc::now().timestamp(),
        })
    }

    /// Moves the latest alias to its numbered directory. When that directory already
    /// exists it is the canonical copy and the alias is dropped instead.
    fn retire_latest(&self, latest: &Path, build_index: u64) -> Result<()> {
        self.set_stage(InstallStage::RetiringLatest);
        let numbered = paths::build_dir(&self.game_root, BuildChannel::Release, build_index);
        if numbered.exists() {
            tracing::info!(
                "build {} already kept at {}, dropping stale latest copy",
                build_index,
                numbered.display()
            );
            return remove_dir_if_exists(latest)
                .map_err(|err| PatcherError::filesystem("remove", latest, err));
        }
        if let Some(parent) = numbered.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|err| PatcherError::filesystem("create", parent, err))?;
        }
        std::fs::rename(latest, &numbered)
            .map_err(|err| PatcherError::filesystem("retire", latest, err))?;
        tracing::info!("retired latest build {} to {}", build_index, numbered.display());
        Ok(())
    }

    async fn install_runtime(&self) -> Result<PathBuf> {
        tracing::info!("managed runtime missing, installing");
        match self.runtime.install_runtime(&self.game_root).await {
            Ok(Some(path)) => Ok(path),
            Ok(None) => Err(PatcherError::RuntimeInstall(
                "runtime installer returned no runtime".to_string(),
            )),
            Err(PatcherError::RuntimeInstall(message)) => Err(PatcherError::RuntimeInstall(message)),
            Err(err) => Err(PatcherError::RuntimeInstall(err.to_string())),
        }
    }

    async fn patch(&self, version: &VersionDescriptor, install_dir: &Path) -> Result<()> {
        let tool = self
            .tools
            .ensure_patch_tool()
            .await?
            .ok_or_else(|| PatcherError::PatchTool("patch tool unavailable".to_string()))?;

        let artifact = paths::artifact_temp_path(&self.game_root, version);
        let fetched = self
            .fetcher
            .fetch(
                &version.url,
                &artifact,
                ProgressPhase::PwrDownload,
                self.sink.as_ref(),
            )
            .await;
        if let Err(err) = fetched {
            discard_artifact(&artifact);
            self.sink
                .progress(ProgressEvent::percent(ProgressPhase::PwrDownload, 100));
            return Err(err);
        }

        let applied = self
            .patcher
            .apply(
                &artifact,
                &tool,
                &paths::staging_dir(install_dir),
                install_dir,
                self.sink.as_ref(),
            )
            .await;
        discard_artifact(&artifact);
        applied?;

        self.manifests.write(install_dir, version)?;

        let client = paths::client_binary(install_dir, self.platform);
        if let Err(err) = restore_executable_bit(&client) {
            tracing::debug!("could not mark {} executable: {}", client.display(), err);
        }
        Ok(())
    }

    fn set_stage(&self, stage: InstallStage) {
        let mut guard = match self.stage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if *guard != stage {
            tracing::debug!("install stage {:?} -> {:?}", *guard, stage);
            *guard = stage;
        }
    }
}

fn discard_artifact(artifact: &Path) {
    if let Err(err) = remove_file_if_exists(artifact) {
        tracing::debug!("could not remove artifact {}: {}", artifact.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::HotPatchOutcome;
    use crate::services::events::MemorySink;
    use crate::test_support::{
        temp_dir, FakeFetcher, FakePatchRunner, FakeRuntime, FakeToolProvider,
    };

    const PLATFORM: Platform = Platform::Linux;

    struct Harness {
        root: PathBuf,
        fetcher: FakeFetcher,
        runner: FakePatchRunner,
        runtime: FakeRuntime,
        sink: MemorySink,
        orchestrator: InstallOrchestrator,
    }

    fn harness_with(root: PathBuf, fetcher: FakeFetcher, runtime: FakeRuntime, tool: bool) -> Harness {
        let runner = FakePatchRunner::new(PLATFORM);
        let sink = MemorySink::new();
        let tools = FakeToolProvider(if tool {
            Some(root.join("tools/patch-tool"))
        } else {
            None
        });
        let orchestrator = InstallOrchestrator::new(
            root.clone(),
            PLATFORM,
            Arc::new(fetcher.clone()),
            Arc::new(runner.clone()),
            Arc::new(runtime.clone()),
            Arc::new(tools),
            Arc::new(sink.clone()),
            true,
        );
        Harness {
            root,
            fetcher,
            runner,
            runtime,
            sink,
            orchestrator,
        }
    }

    fn harness() -> Harness {
        harness_with(
            temp_dir("orchestrator"),
            FakeFetcher::new(b"pwr-bytes"),
            FakeRuntime::new(PLATFORM, true),
            true,
        )
    }

    fn release(build_index: u64, is_latest: bool) -> VersionDescriptor {
        VersionDescriptor {
            channel: BuildChannel::Release,
            build_index,
            build_name: String::new(),
            url: format!("https://x/b{}.patch", build_index),
            is_latest,
            patch_url: None,
            patch_hash: None,
        }
    }

    fn seed_install(dir: &Path, build_index: Option<u64>, with_client: bool, marker: &str) {
        let server = paths::server_binary(dir, PLATFORM);
        std::fs::create_dir_all(server.parent().expect("server parent")).expect("mkdir");
        std::fs::write(&server, b"server").expect("write server");
        if with_client {
            let client = paths::client_binary(dir, PLATFORM);
            std::fs::create_dir_all(client.parent().expect("client parent")).expect("mkdir");
            std::fs::write(&client, b"client").expect("write client");
        }
        std::fs::write(dir.join("marker"), marker).expect("write marker");
        if let Some(build_index) = build_index {
            ManifestStore::new()
                .write(dir, &release(build_index, false))
                .expect("seed manifest");
        }
    }

    fn manifest_build(dir: &Path) -> Option<u64> {
        ManifestStore::new()
            .read(dir)
            .expect("read manifest")
            .map(|manifest| manifest.build_index)
    }

    #[tokio::test]
    async fn fresh_root_installs_latest() {
        let h = harness();
        let version = release(3, true);

        let report = h.orchestrator.install(&version).await.expect("install");

        let latest = paths::latest_dir(&h.root);
        assert!(latest.is_dir());
        assert_eq!(manifest_build(&latest), Some(3));
        assert!(report.patched);
        assert_eq!(report.hot_patch, HotPatchOutcome::Skipped("unsupported platform".to_string()));
        assert_eq!(h.orchestrator.stage(), InstallStage::Done);

        let events = h.sink.events();
        assert_eq!(events.first(), Some(&InstallEvent::InstallStarted(version.clone())));
        assert_eq!(events.last(), Some(&InstallEvent::InstallFinished(version.clone())));

        let leftovers = std::fs::read_dir(paths::cache_dir(&h.root))
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftovers, 0);
        assert!(!paths::staging_dir(&latest).exists());
    }

    #[tokio::test]
    async fn second_install_does_no_work() {
        let h = harness();
        let version = release(3, true);

        h.orchestrator.install(&version).await.expect("first install");
        let report = h.orchestrator.install(&version).await.expect("second install");

        assert!(!report.patched);
        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.runner.calls(), 1);
        assert_eq!(h.runtime.calls(), 1);
        assert!(h.orchestrator.is_installed(&version).expect("probe"));
    }

    #[tokio::test]
    async fn manifest_mismatch_triggers_repatch() {
        let h = harness();
        let install_dir = paths::build_dir(&h.root, BuildChannel::Release, 6);
        seed_install(&install_dir, Some(5), true, "old");
        let version = release(6, false);
        assert!(!h.orchestrator.is_installed(&version).expect("probe"));

        h.orchestrator.install(&version).await.expect("install");

        assert_eq!(h.fetcher.calls(), 1);
        assert_eq!(h.runner.calls(), 1);
        assert_eq!(manifest_build(&install_dir), Some(6));
    }

    #[tokio::test]
    async fn missing_client_is_repaired() {
        let h = harness();
        let install_dir = paths::build_dir(&h.root, BuildChannel::Release, 6);
        seed_install(&install_dir, Some(6), false, "partial");
        let version = release(6, false);

        let report = h.orchestrator.install(&version).await.expect("install");

        assert!(report.patched);
        assert_eq!(h.fetcher.calls(), 1);
        assert!(paths::client_binary(&install_dir, PLATFORM).is_file());
    }

    #[tokio::test]
    async fn new_latest_retires_previous_build() {
        let h = harness();
        let latest = paths::latest_dir(&h.root);
        seed_install(&latest, Some(2), true, "build two");

        h.orchestrator.install(&release(3, true)).await.expect("install");

        let retired = paths::build_dir(&h.root, BuildChannel::Release, 2);
        assert_eq!(manifest_build(&retired), Some(2));
        assert_eq!(
            std::fs::read_to_string(retired.join("marker")).expect("marker"),
            "build two"
        );
        assert_eq!(manifest_build(&latest), Some(3));
        assert!(!latest.join("marker").exists());
    }

    #[tokio::test]
    async fn retirement_keeps_existing_numbered_copy() {
        let h = harness();
        let latest = paths::latest_dir(&h.root);
        let numbered = paths::build_dir(&h.root, BuildChannel::Release, 2);
        seed_install(&latest, Some(2), true, "stale alias");
        seed_install(&numbered, Some(2), true, "canonical");

        h.orchestrator.install(&release(3, true)).await.expect("install");

        assert_eq!(
            std::fs::read_to_string(numbered.join("marker")).expect("marker"),
            "canonical"
        );
        assert!(!latest.join("marker").exists());
        assert_eq!(manifest_build(&latest), Some(3));
    }

    #[tokio::test]
    async fn every_started_phase_ends_at_100() {
        let h = harness();
        h.orchestrator.install(&release(3, true)).await.expect("install");

        for phase in [ProgressPhase::PwrDownload, ProgressPhase::Patching] {
            let events = h.sink.progress_for(phase);
            assert!(!events.is_empty(), "{:?} never started", phase);
            assert!(events
                .iter()
                .all(|event| event.percent == -1 || (0..=100).contains(&event.percent)));
            assert_eq!(events.last().map(|event| event.percent), Some(100));
        }
    }

    #[tokio::test]
    async fn runtime_failure_aborts_before_download() {
        let h = harness_with(
            temp_dir("orchestrator-runtime"),
            FakeFetcher::new(b"pwr"),
            FakeRuntime::new(PLATFORM, false),
            true,
        );
        let err = h
            .orchestrator
            .install(&release(3, true))
            .await
            .expect_err("runtime failure must abort");

        assert!(matches!(err, PatcherError::RuntimeInstall(_)));
        assert_eq!(h.fetcher.calls(), 0);
        assert_eq!(h.orchestrator.stage(), InstallStage::Failed);
        assert!(h.sink.events().iter().any(|event| matches!(
            event,
            InstallEvent::InstallError { kind, .. } if kind == "runtime_install"
        )));
    }

    #[tokio::test]
    async fn missing_patch_tool_fails_install() {
        let h = harness_with(
            temp_dir("orchestrator-tool"),
            FakeFetcher::new(b"pwr"),
            FakeRuntime::new(PLATFORM, true),
            false,
        );
        let err = h
            .orchestrator
            .install(&release(3, true))
            .await
            .expect_err("missing tool must abort");
        assert!(matches!(err, PatcherError::PatchTool(_)));
        assert_eq!(h.fetcher.calls(), 0);
    }

    #[tokio::test]
    async fn download_failure_leaves_no_manifest() {
        let h = harness_with(
            temp_dir("orchestrator-download"),
            FakeFetcher::failing(),
            FakeRuntime::new(PLATFORM, true),
            true,
        );
        let version = release(3, true);
        let err = h.orchestrator.install(&version).await.expect_err("must fail");

        assert_eq!(err.kind(), "download");
        assert_eq!(h.runner.calls(), 0);
        assert_eq!(manifest_build(&paths::latest_dir(&h.root)), None);
        let last = h.sink.events().pop().expect("events");
        assert!(matches!(last, InstallEvent::InstallError { ref message, .. } if message.contains("503")));
    }

    #[tokio::test]
    async fn failed_download_removes_partial_artifact() {
        let h = harness_with(
            temp_dir("orchestrator-partial"),
            FakeFetcher::truncating(b"half"),
            FakeRuntime::new(PLATFORM, true),
            true,
        );
        let version = release(3, true);
        let err = h.orchestrator.install(&version).await.expect_err("must fail");

        assert_eq!(err.kind(), "download");
        assert!(!paths::artifact_temp_path(&h.root, &version).exists());
        let left: Vec<_> = std::fs::read_dir(paths::cache_dir(&h.root))
            .map(|entries| entries.filter_map(|entry| entry.ok()).map(|entry| entry.path()).collect())
            .unwrap_or_default();
        assert!(left.is_empty(), "artifacts left behind: {:?}", left);

        let progress = h.sink.progress_for(ProgressPhase::PwrDownload);
        assert_eq!(progress.last().map(|event| event.percent), Some(100));
        assert!(matches!(
            h.sink.events().last(),
            Some(InstallEvent::InstallError { .. })
        ));
    }

    #[tokio::test]
    async fn patch_without_client_stays_uninstalled() {
        let mut h = harness();
        let mut runner = FakePatchRunner::new(PLATFORM);
        runner.write_client = false;
        h.orchestrator = InstallOrchestrator::new(
            h.root.clone(),
            PLATFORM,
            Arc::new(h.fetcher.clone()),
            Arc::new(runner.clone()),
            Arc::new(h.runtime.clone()),
            Arc::new(FakeToolProvider(Some(h.root.join("tools/patch-tool")))),
            Arc::new(h.sink.clone()),
            true,
        );
        let version = release(4, false);

        let report = h.orchestrator.install(&version).await.expect("install");
        assert!(report.patched);
        let install_dir = paths::build_dir(&h.root, BuildChannel::Release, 4);
        assert_eq!(manifest_build(&install_dir), Some(4));
        assert!(!paths::client_binary(&install_dir, PLATFORM).exists());
        assert!(!h.orchestrator.is_installed(&version).expect("check"));

        h.orchestrator.install(&version).await.expect("repair attempt");
        assert_eq!(runner.calls(), 2);
    }

    #[tokio::test]
    async fn pre_release_uses_numbered_dir_and_leaves_latest_alone() {
        let h = harness();
        let latest = paths::latest_dir(&h.root);
        seed_install(&latest, Some(2), true, "release");
        let version = VersionDescriptor {
            channel: BuildChannel::PreRelease,
            ..release(9, true)
        };

        h.orchestrator.install(&version).await.expect("install");

        let numbered = paths::build_dir(&h.root, BuildChannel::PreRelease, 9);
        assert_eq!(manifest_build(&numbered), Some(9));
        assert_eq!(manifest_build(&latest), Some(2));
    }

    #[tokio::test]
    async fn legacy_layout_is_migrated_before_resolving() {
        let h = harness();
        let legacy = h.root.join("game/latest");
        seed_install(&legacy, Some(3), true, "legacy");

        let report = h.orchestrator.install(&release(3, true)).await.expect("install");

        assert!(!report.patched);
        assert_eq!(h.fetcher.calls(), 0);
        assert!(!legacy.exists());
        assert_eq!(manifest_build(&paths::latest_dir(&h.root)), Some(3));
    }

    #[derive(Default)]
    struct RecordingPresence {
        calls: Mutex<Vec<String>>,
    }

    impl PresenceChannel for RecordingPresence {
        fn set_state(&self, details: &str, state: &str) {
            self.calls
                .lock()
                .expect("presence lock")
                .push(format!("set:{}:{}", details, state));
        }

        fn clear(&self) {
            self.calls.lock().expect("presence lock").push("clear".to_string());
        }
    }

    #[tokio::test]
    async fn presence_is_set_then_cleared() {
        let h = harness();
        let presence = Arc::new(RecordingPresence::default());
        let orchestrator = h.orchestrator.with_presence(presence.clone());

        orchestrator.install(&release(3, true)).await.expect("install");

        let calls = presence.calls.lock().expect("presence lock").clone();
        assert_eq!(calls, vec!["set:Installing:release build 3".to_string(), "clear".to_string()]);
    }

    #[test]
    fn patch_decision_table() {
        let target = release(6, true);
        let all = BinaryPresence {
            client: true,
            server: true,
            runtime: true,
        };
        let no_client = BinaryPresence { client: false, ..all };
        let matching = InstallManifest {
            build_index: 6,
            build_name: None,
            installed_at: None,
        };
        let older = InstallManifest {
            build_index: 5,
            ..matching.clone()
        };

        assert!(!patch_required(Some(&matching), &all, &target));
        assert!(patch_required(Some(&matching), &no_client, &target));
        assert!(patch_required(Some(&older), &all, &target));
        assert!(patch_required(None, &all, &target));
        assert_eq!(no_client.missing_game_binaries(), vec!["client"]);
    }
}
