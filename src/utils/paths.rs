use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{PatcherError, Result};
use crate::models::{BuildChannel, Platform, VersionDescriptor};

const GAME_DIR: &str = "game";
const LATEST_DIR: &str = "latest";
const BUILD_PREFIX: &str = "build-";
const STAGING_DIR: &str = "staging-temp";
const CACHE_DIR: &str = "cache";
const ARTIFACT_EXTENSION: &str = "pwr";

pub fn game_dir(root: &Path) -> PathBuf {
    root.join(GAME_DIR)
}

pub fn channel_dir(root: &Path, channel: BuildChannel) -> PathBuf {
    game_dir(root).join(channel.dir_name())
}

pub fn latest_dir(root: &Path) -> PathBuf {
    channel_dir(root, BuildChannel::Release).join(LATEST_DIR)
}

pub fn build_dir(root: &Path, channel: BuildChannel, build_index: u64) -> PathBuf {
    channel_dir(root, channel).join(format!("{}{}", BUILD_PREFIX, build_index))
}

/// Directory the given version materializes into.
pub fn install_dir(root: &Path, version: &VersionDescriptor) -> PathBuf {
    if version.uses_latest_alias() {
        latest_dir(root)
    } else {
        build_dir(root, version.channel, version.build_index)
    }
}

pub fn staging_dir(install_dir: &Path) -> PathBuf {
    install_dir.join(STAGING_DIR)
}

pub fn cache_dir(root: &Path) -> PathBuf {
    root.join(CACHE_DIR)
}

pub fn artifact_temp_path(root: &Path, version: &VersionDescriptor) -> PathBuf {
    cache_dir(root).join(format!(
        "{}-{}{}.{}",
        version.channel.dir_name(),
        BUILD_PREFIX,
        version.build_index,
        ARTIFACT_EXTENSION
    ))
}

pub fn client_binary(install_dir: &Path, platform: Platform) -> PathBuf {
    install_dir.join(platform.client_binary())
}

pub fn server_binary(install_dir: &Path, platform: Platform) -> PathBuf {
    install_dir.join(platform.server_binary())
}

/// The managed runtime is shared by every build under a root.
pub fn runtime_binary(root: &Path, platform: Platform) -> PathBuf {
    root.join(platform.runtime_binary())
}

pub fn parse_build_dir_name(name: &str) -> Option<u64> {
    name.strip_prefix(BUILD_PREFIX)?.parse::<u64>().ok()
}

/// Moves the single-channel layout (`game/latest`, `game/build-N`) under `game/release/`.
///
/// Safe to call on every install: entries whose destination already exists are left alone,
/// and a root that was already migrated is a no-op. Returns whether anything moved.
pub fn migrate_legacy_layout(root: &Path) -> Result<bool> {
    let game = game_dir(root);
    if !game.is_dir() {
        return Ok(false);
    }

    let mut legacy: Vec<(PathBuf, PathBuf)> = Vec::new();
    let legacy_latest = game.join(LATEST_DIR);
    if legacy_latest.is_dir() {
        legacy.push((legacy_latest, latest_dir(root)));
    }

    let entries = fs::read_dir(&game).map_err(|err| PatcherError::filesystem("read", &game, err))?;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(build_index) = name.to_str().and_then(parse_build_dir_name) else {
            continue;
        };
        if entry.path().is_dir() {
            legacy.push((
                entry.path(),
                build_dir(root, BuildChannel::Release, build_index),
            ));
        }
    }

    let mut moved = false;
    for (from, to) in legacy {
        if to.exists() {
            tracing::warn!(
                "legacy directory {} left in place, {} already exists",
                from.display(),
                to.display()
            );
            continue;
        }
        if let Some(parent) = to.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| PatcherError::filesystem("create", parent, err))?;
        }
        fs::rename(&from, &to).map_err(|err| PatcherError::filesystem("migrate", &from, err))?;
        tracing::info!("migrated legacy install {} -> {}", from.display(), to.display());
        moved = true;
    }

    Ok(moved)
}
