use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BuildChannel {
    Release,
    PreRelease,
}

impl BuildChannel {
    pub fn dir_name(self) -> &'static str {
        match self {
            BuildChannel::Release => "release",
            BuildChannel::PreRelease => "pre-release",
        }
    }
}

/// One build as published by the version catalog.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct VersionDescriptor {
    #[serde(rename = "type")]
    pub channel: BuildChannel,
    pub build_index: u64,
    #[serde(default)]
    pub build_name: String,
    pub url: String,
    #[serde(default)]
    pub is_latest: bool,
    #[serde(default)]
    pub patch_url: Option<String>,
    #[serde(default)]
    pub patch_hash: Option<String>,
}

impl VersionDescriptor {
    /// The latest alias only exists for release builds.
    pub fn uses_latest_alias(&self) -> bool {
        self.is_latest && self.channel == BuildChannel::Release
    }

    pub fn label(&self) -> String {
        if self.build_name.trim().is_empty() {
            format!("{} build {}", self.channel.dir_name(), self.build_index)
        } else {
            self.build_name.clone()
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstallManifest {
    pub build_index: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
}

impl Platform {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Linux
        }
    }

    /// Post-release binary hotfixes are only published for the Windows client.
    pub fn supports_hot_patch(self) -> bool {
        self == Platform::Windows
    }

    pub fn client_binary(self) -> &'static str {
        match self {
            Platform::Windows => "Client/GameClient.exe",
            Platform::MacOs => "Client/GameClient.app/Contents/MacOS/GameClient",
            Platform::Linux => "Client/GameClient",
        }
    }

    pub fn server_binary(self) -> &'static str {
        "Server/GameServer.jar"
    }

    pub fn runtime_binary(self) -> &'static str {
        match self {
            Platform::Windows => "jre/bin/java.exe",
            Platform::MacOs | Platform::Linux => "jre/bin/java",
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProgressPhase {
    #[serde(rename = "pwr-download")]
    PwrDownload,
    #[serde(rename = "patching")]
    Patching,
    #[serde(rename = "online-patch")]
    OnlinePatch,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    /// `-1` when the total is unknown.
    pub percent: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current: Option<u64>,
}

impl ProgressEvent {
    pub fn percent(phase: ProgressPhase, percent: i32) -> Self {
        Self {
            phase,
            percent: percent.clamp(-1, 100),
            total: None,
            current: None,
        }
    }

    pub fn bytes(phase: ProgressPhase, current: u64, total: Option<u64>) -> Self {
        let percent = match total {
            Some(total) if total > 0 => {
                ((current as f64 / total as f64) * 100.0).round().clamp(0.0, 100.0) as i32
            }
            _ => -1,
        };
        Self {
            phase,
            percent,
            total,
            current: Some(current),
        }
    }

    pub fn complete(phase: ProgressPhase, current: Option<u64>, total: Option<u64>) -> Self {
        Self {
            phase,
            percent: 100,
            total,
            current,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", content = "reason", rename_all = "kebab-case")]
pub enum HotPatchOutcome {
    Skipped(String),
    UpToDate,
    Patched,
    Failed(String),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum InstallEvent {
    InstallStarted(VersionDescriptor),
    Progress(ProgressEvent),
    InstallFinished(VersionDescriptor),
    InstallError { message: String, kind: String },
    OnlinePatchProgress(ProgressEvent),
    OnlinePatchStatus(HotPatchOutcome),
    OnlinePatchError { message: String },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct InstallReport {
    pub version: VersionDescriptor,
    pub install_dir: String,
    pub patched: bool,
    pub hot_patch: HotPatchOutcome,
    pub finished_at: i64,
}
