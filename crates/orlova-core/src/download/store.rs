//! Local store for auxiliary assets (image-generation tool install).

use crate::extract::is_weight_file;
use crate::format::format_bytes;
use crate::models::{ActionResult, DestinationKind};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Shown when no install root was configured or detected.
pub const ROOT_NOT_CONFIGURED: &str = "ComfyUI path not configured. Set it in Settings.";

/// A weight file found in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledAsset {
    pub filename: String,
    pub model_type: DestinationKind,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub size_human: String,
}

/// Resolves destination directories under the tool's install root.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    root: Option<PathBuf>,
}

impl ModelStore {
    /// Use the configured root if it exists, otherwise look in the usual
    /// install locations.
    pub fn resolve(configured: Option<&Path>) -> Self {
        let root = configured
            .filter(|path| path.exists())
            .map(Path::to_path_buf)
            .or_else(detect_install_root);
        Self { root }
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: Some(root.into()),
        }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    /// Directory for `kind`. Not created here.
    pub fn destination_dir(&self, kind: DestinationKind) -> Option<PathBuf> {
        self.root.as_ref().map(|root| root.join(kind.subdir()))
    }

    /// Weight files in every kind's directory. Unreadable directories are skipped.
    pub fn list_installed(&self) -> Vec<InstalledAsset> {
        let mut found = Vec::new();
        for kind in DestinationKind::ALL {
            let Some(dir) = self.destination_dir(kind) else {
                return found;
            };
            if !dir.is_dir() {
                continue;
            }
            if let Err(e) = scan_dir(&dir, kind, &mut found) {
                warn!("Failed to scan {}: {}", dir.display(), e);
            }
        }
        found
    }

    /// Delete an installed file. Paths outside the store are refused.
    pub fn delete_installed(&self, path: &Path) -> ActionResult {
        if !path.exists() {
            return ActionResult::failed(format!("File not found: {}", path.display()));
        }
        let inside_store = match (self.root.as_deref(), path.canonicalize()) {
            (Some(root), Ok(resolved)) => root
                .canonicalize()
                .map(|root| resolved.starts_with(root))
                .unwrap_or(false),
            _ => false,
        };
        if !inside_store {
            return ActionResult::failed(format!(
                "Refusing to delete outside the model store: {}",
                path.display()
            ));
        }

        match std::fs::remove_file(path) {
            Ok(()) => {
                info!("Deleted {}", path.display());
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                ActionResult::ok(format!("Deleted: {}", name))
            }
            Err(e) => {
                warn!("Failed to delete {}: {}", path.display(), e);
                ActionResult::failed(format!("Failed to delete: {}", e))
            }
        }
    }
}

fn scan_dir(dir: &Path, kind: DestinationKind, found: &mut Vec<InstalledAsset>) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let filename = entry.file_name().to_string_lossy().into_owned();
        if !is_weight_file(&filename) {
            continue;
        }
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        found.push(InstalledAsset {
            filename,
            model_type: kind,
            path: entry.path(),
            size_bytes: metadata.len(),
            size_human: format_bytes(metadata.len()),
        });
    }
    Ok(())
}

/// Look for an install in the usual places.
///
/// A candidate counts when it contains `main.py` or a `models` directory.
pub fn detect_install_root() -> Option<PathBuf> {
    install_candidates()
        .into_iter()
        .find(|candidate| looks_like_install(candidate))
}

fn looks_like_install(path: &Path) -> bool {
    path.join("main.py").exists() || path.join("models").exists()
}

fn install_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // Portable installs next to an AppImage or the working directory.
    if let Some(dir) = std::env::var_os("APPIMAGE")
        .map(PathBuf::from)
        .and_then(|p| p.parent().map(Path::to_path_buf))
    {
        candidates.push(dir.join("ComfyUI"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("ComfyUI"));
    }
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join("ComfyUI"));
        candidates.push(home.join("comfyui"));
        candidates.push(home.join(".comfyui"));
    }
    candidates.push(PathBuf::from("/opt/ComfyUI"));
    candidates.push(PathBuf::from("/opt/comfyui"));
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_configured_root_wins_when_present() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::resolve(Some(temp_dir.path()));
        assert_eq!(store.root(), Some(temp_dir.path()));
        assert_eq!(
            store.destination_dir(DestinationKind::Upscaler),
            Some(temp_dir.path().join("models/upscale_models"))
        );
    }

    #[test]
    fn test_unconfigured_store_has_no_destination() {
        let store = ModelStore::default();
        assert_eq!(store.destination_dir(DestinationKind::Lora), None);
        assert!(store.list_installed().is_empty());
    }

    #[test]
    fn test_list_installed_filters_extensions() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::with_root(temp_dir.path());
        let loras = temp_dir.path().join("models/loras");
        std::fs::create_dir_all(&loras).unwrap();
        std::fs::write(loras.join("style.safetensors"), vec![0u8; 2048]).unwrap();
        std::fs::write(loras.join("notes.txt"), b"hi").unwrap();

        let installed = store.list_installed();

        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].filename, "style.safetensors");
        assert_eq!(installed[0].model_type, DestinationKind::Lora);
        assert_eq!(installed[0].size_human, "2.0 KB");
    }

    #[test]
    fn test_delete_installed() {
        let temp_dir = TempDir::new().unwrap();
        let store = ModelStore::with_root(temp_dir.path().join("root"));
        let vae = temp_dir.path().join("root/models/vae");
        std::fs::create_dir_all(&vae).unwrap();
        let file = vae.join("x.safetensors");
        std::fs::write(&file, b"w").unwrap();
        let outside = temp_dir.path().join("outside.bin");
        std::fs::write(&outside, b"w").unwrap();

        assert!(!store.delete_installed(&outside).success);
        assert!(outside.exists());

        let deleted = store.delete_installed(&file);
        assert!(deleted.success);
        assert_eq!(deleted.message, "Deleted: x.safetensors");
        assert!(!file.exists());

        assert!(!store.delete_installed(&file).success);
    }

    #[test]
    fn test_looks_like_install() {
        let temp_dir = TempDir::new().unwrap();
        assert!(!looks_like_install(temp_dir.path()));
        std::fs::write(temp_dir.path().join("main.py"), b"").unwrap();
        assert!(looks_like_install(temp_dir.path()));
    }
}
