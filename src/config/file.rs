//! Configuration file discovery

use std::path::{Path, PathBuf};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./tst.yaml",
    "./tst.yml",
    "./tst.json",
    "./.tst.yaml",
    "~/.config/tst/config.yaml",
    "~/.tst.yaml",
];

/// Find configuration file in standard locations
pub fn find() -> Option<PathBuf> {
    find_in(CONFIG_LOCATIONS)
}

fn find_in(locations: &[&str]) -> Option<PathBuf> {
    locations
        .iter()
        .map(|location| expand_path(location))
        .find(|path| path.exists())
}

/// Expand ~ to home directory
pub fn expand_path(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

/// Check if file is YAML based on extension
pub fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_expand_path() {
        let path = expand_path("./tst.yaml");
        assert_eq!(path, PathBuf::from("./tst.yaml"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~/.tst.yaml"), home.join(".tst.yaml"));
        }
    }

    #[test]
    fn test_find_first_existing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("tst.yaml");
        let present = dir.path().join("tst.json");
        std::fs::write(&present, "{}").unwrap();

        let locations = [missing.to_str().unwrap(), present.to_str().unwrap()];
        assert_eq!(find_in(&locations), Some(present.clone()));
        assert_eq!(find_in(&locations[..1]), None);
    }

    #[test]
    fn test_is_yaml_file() {
        assert!(is_yaml_file(Path::new("tst.yaml")));
        assert!(is_yaml_file(Path::new("conf/tst.yml")));
        assert!(!is_yaml_file(Path::new("tst.json")));
        assert!(!is_yaml_file(Path::new("tst")));
    }
}
