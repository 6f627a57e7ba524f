use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30 * 60;
const MIN_DOWNLOAD_TIMEOUT_SECS: u64 = 5;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PatcherConfig {
    pub game_root: PathBuf,
    pub log_dir: PathBuf,
    pub download_timeout_secs: u64,
    pub strict_tool_exit: bool,
    pub hot_patch_enabled: bool,
    pub user_agent: String,
}

impl PatcherConfig {
    pub fn new(game_root: PathBuf) -> Self {
        let log_dir = game_root.join("logs");
        Self {
            game_root,
            log_dir,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            strict_tool_exit: true,
            hot_patch_enabled: true,
            user_agent: format!("otoshi-patcher/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn from_env() -> Self {
        let game_root = env_path("OTOSHI_GAME_ROOT").unwrap_or_else(default_game_root);
        let mut config = Self::new(game_root);
        if let Some(dir) = env_path("OTOSHI_LOG_DIR") {
            config.log_dir = dir;
        }
        if let Some(secs) = env_u64("OTOSHI_DOWNLOAD_TIMEOUT_SECS") {
            config.download_timeout_secs = secs.max(MIN_DOWNLOAD_TIMEOUT_SECS);
        }
        if let Some(strict) = env_flag("OTOSHI_PATCH_TOOL_STRICT_EXIT") {
            config.strict_tool_exit = strict;
        }
        if let Some(enabled) = env_flag("OTOSHI_HOT_PATCH") {
            config.hot_patch_enabled = enabled;
        }
        if let Ok(value) = std::env::var("OTOSHI_USER_AGENT") {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                config.user_agent = trimmed.to_string();
            }
        }
        config
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

fn default_game_root() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            return dir.join("otoshi");
        }
    }
    PathBuf::from("otoshi")
}

fn env_path(key: &str) -> Option<PathBuf> {
    let value = std::env::var(key).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(PathBuf::from(trimmed))
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    let value = std::env::var(key).ok()?;
    parse_flag(&value)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
