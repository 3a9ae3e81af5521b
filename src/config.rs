// ⚙️ Configuration - one explicit context for a run
//
// Priority: CLI flag / env var > TOML file > defaults.
// Every component receives what it needs from here; nothing is global.

use crate::matcher::DEFAULT_THRESHOLD;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// CSV export of the roster spreadsheet
    pub roster_file: PathBuf,

    /// Root of the Archdeaconry/Parish/Sub-Parish/Individual tree
    pub base_dir: PathBuf,

    /// Where placed files land (defaults to base_dir)
    pub dest_base_dir: Option<PathBuf>,

    /// Relative file names in the roster resolve against this
    /// (defaults to the roster's directory)
    pub inbox_dir: Option<PathBuf>,

    pub hierarchy_cache_file: PathBuf,
    pub processed_individuals_file: PathBuf,

    /// Optional Archdeaconry/Parish/Sub-Parish summary written after a build
    pub hierarchy_export_file: Option<PathBuf>,

    /// Append-only log file alongside stderr output
    pub log_file: Option<PathBuf>,

    /// Minimum similarity for a folder match, inclusive
    pub match_threshold: f64,

    /// Rebuild the hierarchy even if a cache exists
    pub force_refresh: bool,

    /// Compare the cached directory fingerprint against disk at startup
    pub verify_freshness: bool,

    /// Save the ledger after this many successes (0 = only at the end)
    pub ledger_flush_interval: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            roster_file: PathBuf::from("File_Structure.csv"),
            base_dir: PathBuf::from("Scans"),
            dest_base_dir: None,
            inbox_dir: None,
            hierarchy_cache_file: PathBuf::from("hierarchy_cache.json"),
            processed_individuals_file: PathBuf::from("processed_individuals.csv"),
            hierarchy_export_file: None,
            log_file: None,
            match_threshold: DEFAULT_THRESHOLD,
            force_refresh: false,
            verify_freshness: false,
            ledger_flush_interval: 25,
        }
    }
}

impl Config {
    /// Load a TOML config file; missing keys take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Reject values no run can work with
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.match_threshold) {
            bail!(
                "match_threshold must be between 0 and 1 (got {})",
                self.match_threshold
            );
        }
        if self.hierarchy_cache_file == self.processed_individuals_file {
            bail!("hierarchy_cache_file and processed_individuals_file must differ");
        }
        Ok(())
    }

    pub fn dest_base_dir(&self) -> &Path {
        self.dest_base_dir.as_deref().unwrap_or(&self.base_dir)
    }

    pub fn inbox_dir(&self) -> PathBuf {
        match &self.inbox_dir {
            Some(dir) => dir.clone(),
            None => self
                .roster_file
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }

    /// Where a roster file name points on disk
    pub fn resolve_input_file(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.inbox_dir().join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.match_threshold, 0.8);
        assert!(!config.force_refresh);
        assert!(!config.verify_freshness);
        assert_eq!(config.dest_base_dir(), Path::new("Scans"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("organizer.toml");
        fs::write(
            &path,
            r#"
base_dir = "/home/scans/Scans_2023 - 2024"
dest_base_dir = "/home/scans/Organized_Scans"
match_threshold = 0.85
"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.base_dir, PathBuf::from("/home/scans/Scans_2023 - 2024"));
        assert_eq!(config.dest_base_dir(), Path::new("/home/scans/Organized_Scans"));
        assert_eq!(config.match_threshold, 0.85);
        assert_eq!(config.ledger_flush_interval, 25);
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("organizer.toml");
        fs::write(&path, "match_threshold = \"high\"").unwrap();
        assert!(Config::from_file(&path).is_err());
    }

    #[test]
    fn test_validate_threshold_range() {
        let config = Config {
            match_threshold: 1.5,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_input_files_resolve_against_inbox() {
        let config = Config {
            roster_file: PathBuf::from("/data/roster/File_Structure.csv"),
            ..Config::default()
        };
        assert_eq!(
            config.resolve_input_file("Smith_J.pdf"),
            PathBuf::from("/data/roster/Smith_J.pdf")
        );

        let config = Config {
            inbox_dir: Some(PathBuf::from("/data/inbox")),
            ..config
        };
        assert_eq!(
            config.resolve_input_file("Smith_J.pdf"),
            PathBuf::from("/data/inbox/Smith_J.pdf")
        );
        assert_eq!(
            config.resolve_input_file("/abs/Smith_J.pdf"),
            PathBuf::from("/abs/Smith_J.pdf")
        );
    }
}
