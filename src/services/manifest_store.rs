use std::io;
use std::path::{Path, PathBuf};

use crate::errors::{PatcherError, Result};
use crate::models::{InstallManifest, VersionDescriptor};
use crate::utils::file::{remove_file_if_exists, write_atomic};

pub const MANIFEST_FILE: &str = ".install-manifest.json";

/// Record of which build is materialized in an install directory.
#[derive(Clone, Copy, Default)]
pub struct ManifestStore;

impl ManifestStore {
    pub fn new() -> Self {
        Self
    }

    pub fn path_for(&self, install_dir: &Path) -> PathBuf {
        install_dir.join(MANIFEST_FILE)
    }

    /// A missing or unreadable record reads as "nothing installed here".
    pub fn read(&self, install_dir: &Path) -> Result<Option<InstallManifest>> {
        let path = self.path_for(install_dir);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        match serde_json::from_str::<InstallManifest>(&data) {
            Ok(manifest) => Ok(Some(manifest)),
            Err(err) => {
                tracing::warn!("ignoring corrupt manifest {}: {}", path.display(), err);
                Ok(None)
            }
        }
    }

    pub fn write(&self, install_dir: &Path, version: &VersionDescriptor) -> Result<InstallManifest> {
        let manifest = InstallManifest {
            build_index: version.build_index,
            build_name: Some(version.build_name.clone()).filter(|name| !name.trim().is_empty()),
            installed_at: Some(chrono::Utc::now().timestamp()),
        };
        let payload = serde_json::to_vec_pretty(&manifest)?;
        let path = self.path_for(install_dir);
        write_atomic(&path, &payload)
            .map_err(|err| PatcherError::filesystem("write manifest", &path, err))?;
        Ok(manifest)
    }

    pub fn remove(&self, install_dir: &Path) -> io::Result<()> {
        remove_file_if_exists(&self.path_for(install_dir))
    }
}
