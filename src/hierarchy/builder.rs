// 🏗️ Hierarchy Builder - walk base_dir once and classify by depth
//
// depth 1 = Archdeaconry, 2 = Parish, 3 = Sub-Parish, 4 = Individual
// Deeper directories and branches that stop short of depth 4 are malformed:
// logged and skipped, never fatal.

use super::cache::HierarchyCache;
use super::node::{normalize_path, HierarchyLevel, HierarchyNode};
use crate::error::{OrganizerError, Result};
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use walkdir::{DirEntry, WalkDir};

// ============================================================================
// BUILD REPORT
// ============================================================================

#[derive(Debug, Default)]
pub struct BuildReport {
    /// Directories classified per level (after pruning)
    pub classified: BTreeMap<HierarchyLevel, usize>,

    /// Malformed entries that were skipped or pruned
    pub skipped: Vec<OrganizerError>,

    /// Entries the walk could not read
    pub errors: Vec<String>,
}

impl BuildReport {
    pub fn summary(&self) -> String {
        let count = |level| self.classified.get(&level).copied().unwrap_or(0);
        format!(
            "{} archdeaconries, {} parishes, {} sub-parishes, {} individuals ({} skipped, {} unreadable)",
            count(HierarchyLevel::Archdeaconry),
            count(HierarchyLevel::Parish),
            count(HierarchyLevel::SubParish),
            count(HierarchyLevel::Individual),
            self.skipped.len(),
            self.errors.len()
        )
    }
}

// ============================================================================
// HIERARCHY BUILDER
// ============================================================================

pub struct HierarchyBuilder {
    /// Skip directories whose name starts with '.'
    pub ignore_hidden: bool,

    /// Directory names never treated as hierarchy levels
    pub ignore_patterns: Vec<String>,
}

impl HierarchyBuilder {
    pub fn new() -> Self {
        HierarchyBuilder {
            ignore_hidden: true,
            ignore_patterns: vec![
                "__MACOSX".to_string(),
                "$RECYCLE.BIN".to_string(),
                "System Volume Information".to_string(),
            ],
        }
    }

    /// Walk `base_dir` and classify every directory
    pub fn build(&self, base_dir: &Path) -> Result<HierarchyCache> {
        self.build_with_report(base_dir).map(|(cache, _)| cache)
    }

    /// Same as `build`, also returning what was classified and skipped
    pub fn build_with_report(&self, base_dir: &Path) -> Result<(HierarchyCache, BuildReport)> {
        if !base_dir.is_dir() {
            return Err(OrganizerError::MissingInput(base_dir.to_path_buf()));
        }

        tracing::info!("Walking hierarchy under {}", base_dir.display());

        let mut cache = HierarchyCache::new(base_dir);
        let mut report = BuildReport::default();

        // One level past MAX_DEPTH so over-deep directories are seen (and reported)
        for entry in self.walker(base_dir) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Error accessing entry: {}", e);
                    report.errors.push(e.to_string());
                    continue;
                }
            };

            if !entry.file_type().is_dir() {
                continue;
            }

            let depth = entry.depth();
            let level = match HierarchyLevel::from_depth(depth) {
                Some(level) => level,
                None => {
                    tracing::warn!(
                        "Skipping {} - depth {} is below the individual level",
                        entry.path().display(),
                        depth
                    );
                    report.skipped.push(OrganizerError::MalformedHierarchyEntry {
                        path: entry.path().to_path_buf(),
                        depth,
                    });
                    continue;
                }
            };

            // None for non-UTF-8 names and everything beneath them
            let Some(key) = normalize_path(base_dir, entry.path()) else {
                if entry.file_name().to_str().is_none() {
                    tracing::warn!(
                        "Skipping {} - folder name is not valid UTF-8",
                        entry.path().display()
                    );
                    report.skipped.push(OrganizerError::MalformedHierarchyEntry {
                        path: entry.path().to_path_buf(),
                        depth,
                    });
                }
                continue;
            };
            let parent = if depth > 1 {
                entry.path().parent().and_then(|p| normalize_path(base_dir, p))
            } else {
                None
            };

            tracing::debug!("Found {}: {}", level.as_str(), key);
            cache.insert(HierarchyNode::new(key, level, parent));
        }

        self.prune_incomplete_branches(&mut cache, base_dir, &mut report);

        cache.built_at = Some(Utc::now());
        cache.fingerprint = Some(self.fingerprint(base_dir));
        report.classified = cache.level_counts();

        tracing::info!("Hierarchy built: {}", report.summary());
        Ok((cache, report))
    }

    /// Reuse the cache at `cache_file` unless it is empty, built from a
    /// different base_dir, `force_refresh` is set, or (with
    /// `verify_freshness`) the directory layout changed. A rebuilt cache is
    /// saved immediately.
    pub fn load_or_build(
        &self,
        cache_file: &Path,
        base_dir: &Path,
        force_refresh: bool,
        verify_freshness: bool,
    ) -> Result<HierarchyCache> {
        let cached = HierarchyCache::load(cache_file);

        let reason = if force_refresh {
            Some("forced refresh")
        } else if cached.is_empty() {
            Some("cache is empty")
        } else if cached.base_dir != base_dir {
            Some("cache was built from a different base directory")
        } else if verify_freshness && !self.is_fresh(&cached) {
            Some("directory layout changed since the cache was built")
        } else {
            None
        };

        match reason {
            None => {
                tracing::info!("Using cached hierarchy ({} nodes)", cached.len());
                Ok(cached)
            }
            Some(reason) => {
                tracing::info!("Rebuilding hierarchy: {}", reason);
                let cache = self.build(base_dir)?;
                cache.save(cache_file)?;
                Ok(cache)
            }
        }
    }

    /// Whether the cache still matches the layout on disk
    pub fn is_fresh(&self, cache: &HierarchyCache) -> bool {
        match &cache.fingerprint {
            Some(stored) => *stored == self.fingerprint(&cache.base_dir),
            None => false,
        }
    }

    /// SHA-256 over the sorted relative directory paths.
    ///
    /// Files are left out so placing files into individual folders does not
    /// invalidate the cache.
    pub fn fingerprint(&self, base_dir: &Path) -> String {
        let mut hasher = Sha256::new();

        for entry in self.walker(base_dir).filter_map(|e| e.ok()) {
            if !entry.file_type().is_dir() {
                continue;
            }
            if let Some(key) = normalize_path(base_dir, entry.path()) {
                hasher.update(key.as_bytes());
                hasher.update(b"\n");
            }
        }

        format!("{:x}", hasher.finalize())
    }

    fn walker<'a>(
        &'a self,
        base_dir: &Path,
    ) -> impl Iterator<Item = walkdir::Result<DirEntry>> + 'a {
        WalkDir::new(base_dir)
            .min_depth(1)
            .max_depth(HierarchyLevel::MAX_DEPTH + 1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(move |e| self.should_process_entry(e))
    }

    fn should_process_entry(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();

        if self.ignore_hidden && name.starts_with('.') && entry.depth() > 0 {
            return false;
        }

        !self.ignore_patterns.iter().any(|p| name == p.as_str())
    }

    /// Drop non-individual nodes that have nothing beneath them, repeatedly,
    /// so a parish whose only sub-parish was empty goes too.
    fn prune_incomplete_branches(
        &self,
        cache: &mut HierarchyCache,
        base_dir: &Path,
        report: &mut BuildReport,
    ) {
        loop {
            let dead_ends: Vec<HierarchyNode> = cache
                .nodes()
                .filter(|n| n.level != HierarchyLevel::Individual && n.children.is_empty())
                .cloned()
                .collect();

            if dead_ends.is_empty() {
                break;
            }

            for node in dead_ends {
                tracing::warn!(
                    "Skipping {} '{}' - no individual folders beneath it",
                    node.level.as_str(),
                    node.path
                );
                report.skipped.push(OrganizerError::MalformedHierarchyEntry {
                    path: node.absolute_path(base_dir),
                    depth: node.level.depth(),
                });
                cache.remove(&node.path);
            }
        }
    }
}

impl Default for HierarchyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    /// Kazo Arch/St Mary's/Central/{John Smith, Jane Doe}
    /// Kazo Arch/Masuulita Parish/St Andrews/Peter Okello
    fn synthetic_tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        for individual in [
            "Kazo Arch/St Mary's/Central/John Smith",
            "Kazo Arch/St Mary's/Central/Jane Doe",
            "Kazo Arch/Masuulita Parish/St Andrews/Peter Okello",
        ] {
            fs::create_dir_all(root.join(individual)).unwrap();
        }
        // Loose files never become nodes
        fs::write(root.join("Kazo Arch/notes.txt"), "x").unwrap();
        fs::write(root.join("Kazo Arch/St Mary's/Central/John Smith/scan1.pdf"), "x").unwrap();
        dir
    }

    #[test]
    fn test_classifies_each_depth() {
        let dir = synthetic_tree();
        let (cache, report) = HierarchyBuilder::new().build_with_report(dir.path()).unwrap();

        let level = |p: &str| cache.get(p).map(|n| n.level);
        assert_eq!(level("Kazo Arch"), Some(HierarchyLevel::Archdeaconry));
        assert_eq!(level("Kazo Arch/St Mary's"), Some(HierarchyLevel::Parish));
        assert_eq!(level("Kazo Arch/St Mary's/Central"), Some(HierarchyLevel::SubParish));
        assert_eq!(
            level("Kazo Arch/St Mary's/Central/John Smith"),
            Some(HierarchyLevel::Individual)
        );

        assert_eq!(cache.len(), 8);
        assert_eq!(report.classified.get(&HierarchyLevel::Individual), Some(&3));
        assert!(report.skipped.is_empty());
        assert!(cache.validate().is_empty());
    }

    #[test]
    fn test_depth_five_is_skipped_not_fatal() {
        let dir = synthetic_tree();
        fs::create_dir_all(
            dir.path()
                .join("Kazo Arch/St Mary's/Central/John Smith/2023 scans/extra"),
        )
        .unwrap();

        let (cache, report) = HierarchyBuilder::new().build_with_report(dir.path()).unwrap();

        assert!(cache
            .get("Kazo Arch/St Mary's/Central/John Smith/2023 scans")
            .is_none());
        assert!(cache
            .get("Kazo Arch/St Mary's/Central/John Smith/2023 scans/extra")
            .is_none());
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0],
            OrganizerError::MalformedHierarchyEntry { depth: 5, .. }
        ));
        // The individual above it is unaffected
        assert!(cache.contains("Kazo Arch/St Mary's/Central/John Smith"));
    }

    #[test]
    fn test_shallow_branches_are_pruned() {
        let dir = synthetic_tree();
        // Parish with an empty sub-parish, and an archdeaconry with nothing
        fs::create_dir_all(dir.path().join("Kazo Arch/Empty Parish/Nobody Here")).unwrap();
        fs::create_dir_all(dir.path().join("Bare Arch")).unwrap();

        let (cache, report) = HierarchyBuilder::new().build_with_report(dir.path()).unwrap();

        assert!(!cache.contains("Kazo Arch/Empty Parish/Nobody Here"));
        assert!(!cache.contains("Kazo Arch/Empty Parish"));
        assert!(!cache.contains("Bare Arch"));
        assert_eq!(report.skipped.len(), 3);
        assert!(cache.validate().is_empty());
    }

    #[test]
    fn test_hidden_directories_ignored() {
        let dir = synthetic_tree();
        fs::create_dir_all(dir.path().join(".git/objects/aa/bb")).unwrap();

        let cache = HierarchyBuilder::new().build(dir.path()).unwrap();
        assert!(cache.nodes().all(|n| !n.path.starts_with(".git")));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_non_utf8_folder_is_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let dir = synthetic_tree();
        let central = dir.path().join("Kazo Arch/St Mary's/Central");
        fs::create_dir_all(central.join(OsStr::from_bytes(b"Jos\xe9 Smith"))).unwrap();

        let (cache, report) = HierarchyBuilder::new().build_with_report(dir.path()).unwrap();

        assert_eq!(cache.nodes_at(HierarchyLevel::Individual).count(), 3);
        assert!(cache.nodes().all(|n| !n.path.contains('\u{FFFD}')));
        assert_eq!(report.skipped.len(), 1);
        assert!(matches!(
            report.skipped[0],
            OrganizerError::MalformedHierarchyEntry { depth: 4, .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_directory_warns_and_continues() {
        use std::os::unix::fs::PermissionsExt;

        let dir = synthetic_tree();
        let locked = dir.path().join("Kazo Arch/Locked Parish");
        fs::create_dir_all(locked.join("Inner/Someone")).unwrap();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();

        // Permission bits don't stop root
        if fs::read_dir(&locked).is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let result = HierarchyBuilder::new().build_with_report(dir.path());
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        let (cache, report) = result.unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(!cache.contains("Kazo Arch/Locked Parish"));
        assert_eq!(cache.nodes_at(HierarchyLevel::Individual).count(), 3);
    }

    #[test]
    fn test_missing_base_dir_is_missing_input() {
        let dir = TempDir::new().unwrap();
        let result = HierarchyBuilder::new().build(&dir.path().join("absent"));
        assert!(matches!(result, Err(OrganizerError::MissingInput(_))));
    }

    #[test]
    fn test_fingerprint_ignores_files_but_sees_directories() {
        let dir = synthetic_tree();
        let builder = HierarchyBuilder::new();
        let cache = builder.build(dir.path()).unwrap();
        assert!(builder.is_fresh(&cache));

        fs::write(
            dir.path().join("Kazo Arch/St Mary's/Central/Jane Doe/new_scan.pdf"),
            "x",
        )
        .unwrap();
        assert!(builder.is_fresh(&cache));

        fs::create_dir_all(dir.path().join("Kazo Arch/St Mary's/Central/Mary Nakato")).unwrap();
        assert!(!builder.is_fresh(&cache));
    }

    #[test]
    fn test_load_or_build_reuses_stale_cache_by_default() {
        let dir = synthetic_tree();
        let state = TempDir::new().unwrap();
        let cache_file = state.path().join("hierarchy_cache.json");
        let builder = HierarchyBuilder::new();

        let first = builder.load_or_build(&cache_file, dir.path(), false, false).unwrap();
        assert!(cache_file.exists());

        fs::create_dir_all(dir.path().join("Kazo Arch/St Mary's/Central/Mary Nakato")).unwrap();

        // Stale cache is reused as-is
        let second = builder.load_or_build(&cache_file, dir.path(), false, false).unwrap();
        assert_eq!(second.len(), first.len());

        // Freshness check notices the new folder
        let third = builder.load_or_build(&cache_file, dir.path(), false, true).unwrap();
        assert_eq!(third.len(), first.len() + 1);

        // Forced refresh always rebuilds
        fs::create_dir_all(dir.path().join("Kazo Arch/St Mary's/Central/Ruth Auma")).unwrap();
        let fourth = builder.load_or_build(&cache_file, dir.path(), true, false).unwrap();
        assert_eq!(fourth.len(), first.len() + 2);
    }
}
