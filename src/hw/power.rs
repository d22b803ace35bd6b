use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;

const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

/// Mains adapter names used by laptops that don't fill in `type`
const ADAPTER_NAME_PATTERN: &str = r"^(AC|ACAD|ADP)\d*$";

pub trait PowerSource {
    /// Whether external power is connected
    fn on_ac(&self) -> bool;
}

/// Reads adapter state from sysfs
pub struct SysfsPower {
    root: PathBuf,
    adapter_name: Regex,
}

impl SysfsPower {
    pub fn new() -> Self {
        Self::with_root(POWER_SUPPLY_ROOT)
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            // constant pattern
            adapter_name: Regex::new(ADAPTER_NAME_PATTERN).unwrap(),
        }
    }

    fn is_adapter(&self, dir: &Path) -> bool {
        if let Ok(kind) = fs::read_to_string(dir.join("type")) {
            return kind.trim() == "Mains";
        }
        dir.file_name()
            .and_then(|n| n.to_str())
            .map_or(false, |n| self.adapter_name.is_match(n))
    }
}

impl Default for SysfsPower {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerSource for SysfsPower {
    fn on_ac(&self) -> bool {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(err) => {
                log::trace!("cannot list {}: {}", self.root.display(), err);
                return false;
            }
        };

        entries.flatten().map(|e| e.path()).any(|dir| {
            self.is_adapter(&dir)
                && fs::read_to_string(dir.join("online")).map_or(false, |s| s.trim() == "1")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn supply(root: &TempDir, name: &str, kind: Option<&str>, online: &str) {
        let dir = root.path().join(name);
        fs::create_dir_all(&dir).unwrap();
        if let Some(kind) = kind {
            fs::write(dir.join("type"), format!("{}\n", kind)).unwrap();
        }
        fs::write(dir.join("online"), format!("{}\n", online)).unwrap();
    }

    #[test]
    fn mains_online_means_ac() {
        let root = TempDir::new().unwrap();
        supply(&root, "BAT0", Some("Battery"), "1");
        supply(&root, "AC0", Some("Mains"), "1");

        assert!(SysfsPower::with_root(root.path()).on_ac());
    }

    #[test]
    fn mains_offline_means_battery() {
        let root = TempDir::new().unwrap();
        supply(&root, "BAT0", Some("Battery"), "1");
        supply(&root, "ADP1", Some("Mains"), "0");

        assert!(!SysfsPower::with_root(root.path()).on_ac());
    }

    #[test]
    fn adapter_recognized_by_name_without_type() {
        let root = TempDir::new().unwrap();
        supply(&root, "ACAD", None, "1");
        supply(&root, "hid-battery", None, "1");

        assert!(SysfsPower::with_root(root.path()).on_ac());
    }

    #[test]
    fn unknown_supply_without_type_is_ignored() {
        let root = TempDir::new().unwrap();
        supply(&root, "ucsi-source-psy", None, "1");

        assert!(!SysfsPower::with_root(root.path()).on_ac());
    }

    #[test]
    fn missing_root_means_battery() {
        assert!(!SysfsPower::with_root("/nonexistent/power_supply").on_ac());
    }
}
