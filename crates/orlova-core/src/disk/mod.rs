//! Disk space advisor.
//!
//! Answers "will this file fit" for a target path and reports free space
//! across mounted disks. The verdict is advisory: the download manager logs
//! a negative answer but does not refuse to start.

use crate::config::{ConfigPatch, ConfigStore};
use crate::error::Result;
use crate::format::format_bytes;
use crate::models::ActionResult;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use sysinfo::Disks;
use tracing::{info, warn};

/// Projected free space below this share of capacity triggers a warning.
pub const LOW_SPACE_THRESHOLD_PERCENT: f64 = 20.0;

/// Mount points under these prefixes are left out of the disk report.
const EXCLUDED_MOUNT_PREFIXES: &[&str] = &["/snap", "/boot"];

/// Space figures for one filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskInfo {
    pub path: PathBuf,
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub used_bytes: u64,
    pub used_percent: u8,
    pub free_percent: u8,
    pub total_human: String,
    pub free_human: String,
}

impl DiskInfo {
    pub fn new(path: PathBuf, total_bytes: u64, free_bytes: u64) -> Self {
        let used_bytes = total_bytes.saturating_sub(free_bytes);
        Self {
            path,
            total_bytes,
            free_bytes,
            used_bytes,
            used_percent: whole_percent(used_bytes, total_bytes),
            free_percent: whole_percent(free_bytes, total_bytes),
            total_human: format_bytes(total_bytes),
            free_human: format_bytes(free_bytes),
        }
    }
}

/// Mounted disks plus the model store's location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskReport {
    pub disks: Vec<DiskInfo>,
    pub current_models_path: PathBuf,
    pub current_models_path_free: Option<String>,
}

/// Verdict of a space check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceCheck {
    pub fits: bool,
    pub free_bytes: u64,
    /// Free space left after the write, clamped at zero.
    pub free_after: u64,
    pub low_space_warning: bool,
    pub message: String,
}

/// Decide whether `size_bytes` fits on a disk with the given totals.
pub fn evaluate_space(size_bytes: u64, total_bytes: u64, free_bytes: u64) -> SpaceCheck {
    let free_after = free_bytes as i128 - size_bytes as i128;
    let percent_after = if total_bytes > 0 {
        free_after as f64 / total_bytes as f64 * 100.0
    } else {
        0.0
    };
    let fits = free_after > 0;
    let low_space_warning = percent_after < LOW_SPACE_THRESHOLD_PERCENT;
    let free_after = u64::try_from(free_after.max(0)).unwrap_or(u64::MAX);

    let message = if !fits {
        format!(
            "Not enough space. Need {}, only {} available",
            format_bytes(size_bytes),
            format_bytes(free_bytes)
        )
    } else if low_space_warning {
        format!(
            "Model fits but only {} ({:.0}%) will remain free",
            format_bytes(free_after),
            percent_after
        )
    } else {
        format!("Model fits. {} will remain free", format_bytes(free_after))
    };

    SpaceCheck {
        fits,
        free_bytes,
        free_after,
        low_space_warning,
        message,
    }
}

/// Space figures for the filesystem holding `path`, `None` if `path` does
/// not exist or no mounted disk contains it.
pub fn disk_info_for_path(path: &Path) -> Option<DiskInfo> {
    if !path.exists() {
        return None;
    }
    let resolved = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    let disks = Disks::new_with_refreshed_list();

    // The disk with the longest mount point that contains the path.
    let disk = disks
        .list()
        .iter()
        .filter(|disk| resolved.starts_with(disk.mount_point()))
        .max_by_key(|disk| disk.mount_point().as_os_str().len());

    match disk {
        Some(disk) => Some(DiskInfo::new(
            path.to_path_buf(),
            disk.total_space(),
            disk.available_space(),
        )),
        None => {
            warn!("No mounted disk contains {}", path.display());
            None
        }
    }
}

/// Check whether `size_bytes` fits at `target`.
pub fn check_space(size_bytes: u64, target: &Path) -> SpaceCheck {
    match disk_info_for_path(target) {
        Some(info) => evaluate_space(size_bytes, info.total_bytes, info.free_bytes),
        None => SpaceCheck {
            fits: false,
            free_bytes: 0,
            free_after: 0,
            low_space_warning: true,
            message: format!("Cannot determine free space for: {}", target.display()),
        },
    }
}

/// Report every mounted disk (except system mounts) and the model store.
pub fn disk_report(models_path: &Path) -> DiskReport {
    let disks = Disks::new_with_refreshed_list();

    let mut seen = std::collections::HashSet::new();
    let infos = disks
        .list()
        .iter()
        .filter(|disk| {
            let mount = disk.mount_point().to_string_lossy();
            !EXCLUDED_MOUNT_PREFIXES
                .iter()
                .any(|prefix| mount.starts_with(prefix))
        })
        .filter(|disk| seen.insert(disk.mount_point().to_path_buf()))
        .map(|disk| {
            DiskInfo::new(
                disk.mount_point().to_path_buf(),
                disk.total_space(),
                disk.available_space(),
            )
        })
        .collect();

    DiskReport {
        disks: infos,
        current_models_path: models_path.to_path_buf(),
        current_models_path_free: disk_info_for_path(models_path).map(|info| info.free_human),
    }
}

/// Point the model store at `path` and remember it as the last used path.
pub fn set_models_path(store: &ConfigStore, path: &Path) -> Result<ActionResult> {
    if !path.exists() {
        return Ok(ActionResult::failed(format!(
            "Path does not exist: {}",
            path.display()
        )));
    }

    store.update(ConfigPatch {
        models_path: Some(Some(path.to_path_buf())),
        last_models_path: Some(Some(path.to_path_buf())),
        ..Default::default()
    })?;
    info!("Models path updated to {}", path.display());
    Ok(ActionResult::ok(format!("Models path set to: {}", path.display())))
}

fn whole_percent(part: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    (part as f64 / total as f64 * 100.0).round().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const GB: u64 = 1024 * 1024 * 1024;

    #[test]
    fn test_not_enough_space() {
        let check = evaluate_space(95 * GB, 100 * GB, 10 * GB);
        assert!(!check.fits);
        assert_eq!(check.free_after, 0);
        assert!(check.low_space_warning);
        assert_eq!(
            check.message,
            "Not enough space. Need 95.0 GB, only 10.0 GB available"
        );
    }

    #[test]
    fn test_fits_with_low_space_warning() {
        let check = evaluate_space(15 * GB, 100 * GB, 30 * GB);
        assert!(check.fits);
        assert!(check.low_space_warning);
        assert_eq!(check.free_after, 15 * GB);
        assert_eq!(
            check.message,
            "Model fits but only 15.0 GB (15%) will remain free"
        );
    }

    #[test]
    fn test_fits_comfortably() {
        let check = evaluate_space(5 * GB, 100 * GB, 60 * GB);
        assert!(check.fits);
        assert!(!check.low_space_warning);
        assert_eq!(check.message, "Model fits. 55.0 GB will remain free");
    }

    #[test]
    fn test_exact_fit_is_not_a_fit() {
        assert!(!evaluate_space(10 * GB, 100 * GB, 10 * GB).fits);
    }

    #[test]
    fn test_unknown_path() {
        let check = check_space(GB, Path::new("/definitely/not/here/orlova"));
        assert!(!check.fits);
        assert!(check.low_space_warning);
        assert!(check.message.starts_with("Cannot determine free space for:"));
    }

    #[test]
    fn test_disk_info_percentages() {
        let info = DiskInfo::new(PathBuf::from("/"), 200 * GB, 50 * GB);
        assert_eq!(info.used_bytes, 150 * GB);
        assert_eq!(info.used_percent, 75);
        assert_eq!(info.free_percent, 25);
        assert_eq!(info.free_human, "50.0 GB");
    }

    #[test]
    fn test_existing_path_has_disk_info() {
        let temp_dir = TempDir::new().unwrap();
        // Every existing path lives on some mounted disk.
        if let Some(info) = disk_info_for_path(temp_dir.path()) {
            assert!(info.total_bytes >= info.free_bytes);
        }
    }

    #[test]
    fn test_set_models_path() {
        let temp_dir = TempDir::new().unwrap();
        let store = ConfigStore::open(temp_dir.path().join("config.json")).unwrap();

        let missing = set_models_path(&store, &temp_dir.path().join("missing")).unwrap();
        assert!(!missing.success);
        assert!(missing.message.starts_with("Path does not exist"));

        let models = temp_dir.path().join("models");
        std::fs::create_dir(&models).unwrap();
        let result = set_models_path(&store, &models).unwrap();
        assert!(result.success);
        assert_eq!(store.get().models_path, Some(models.clone()));
        assert_eq!(store.get().last_models_path, Some(models));
    }
}
