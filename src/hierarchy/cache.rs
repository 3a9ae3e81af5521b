// 🗂️ Hierarchy Cache - persisted path → node mapping
// Saves re-walking the scan tree on every run.
//
// Format: one JSON snapshot. Missing or corrupt file → empty cache (rebuild),
// never a fatal error. Saves go through a sibling temp file + rename.

use super::node::{HierarchyLevel, HierarchyNode};
use crate::error::{OrganizerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Snapshot format version - bump when the layout changes
pub const CACHE_FORMAT_VERSION: u32 = 1;

// ============================================================================
// HIERARCHY CACHE
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HierarchyCache {
    /// Snapshot format version
    pub format_version: u32,

    /// Directory the hierarchy was built from
    pub base_dir: PathBuf,

    /// When the walk happened
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub built_at: Option<DateTime<Utc>>,

    /// SHA-256 over the directory layout at build time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Normalized relative path → node
    nodes: BTreeMap<String, HierarchyNode>,
}

impl HierarchyCache {
    /// Create an empty cache for a base directory
    pub fn new(base_dir: &Path) -> Self {
        HierarchyCache {
            format_version: CACHE_FORMAT_VERSION,
            base_dir: base_dir.to_path_buf(),
            built_at: None,
            fingerprint: None,
            nodes: BTreeMap::new(),
        }
    }

    /// Load a snapshot. Missing, unreadable, corrupt or wrong-version files
    /// all yield an empty cache.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            tracing::info!("No hierarchy cache at {}", path.display());
            return HierarchyCache::default();
        }

        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!("Could not read hierarchy cache {}: {}", path.display(), e);
                return HierarchyCache::default();
            }
        };

        match serde_json::from_str::<HierarchyCache>(&content) {
            Ok(cache) if cache.format_version == CACHE_FORMAT_VERSION => {
                tracing::info!(
                    "Loaded hierarchy cache with {} nodes from {}",
                    cache.len(),
                    path.display()
                );
                cache
            }
            Ok(cache) => {
                tracing::warn!(
                    "Hierarchy cache {} has format version {} (expected {}), ignoring",
                    path.display(),
                    cache.format_version,
                    CACHE_FORMAT_VERSION
                );
                HierarchyCache::default()
            }
            Err(e) => {
                tracing::warn!("Corrupt hierarchy cache {}: {}", path.display(), e);
                HierarchyCache::default()
            }
        }
    }

    /// Write the snapshot to `path` (temp file, then rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let persist_err = |source: io::Error| OrganizerError::Persistence {
            path: path.to_path_buf(),
            source,
        };

        let json = serde_json::to_vec_pretty(self).map_err(|e| persist_err(io::Error::other(e)))?;
        write_atomically(path, &json).map_err(persist_err)?;

        tracing::debug!("Saved hierarchy cache ({} nodes) to {}", self.len(), path.display());
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Lookups
    // ------------------------------------------------------------------------

    pub fn get(&self, path: &str) -> Option<&HierarchyNode> {
        self.nodes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in path order
    pub fn nodes(&self) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.values()
    }

    /// All nodes classified at `level`, in path order
    pub fn nodes_at(&self, level: HierarchyLevel) -> impl Iterator<Item = &HierarchyNode> {
        self.nodes.values().filter(move |n| n.level == level)
    }

    /// Direct children of `path`
    pub fn children_of(&self, path: &str) -> Vec<&HierarchyNode> {
        self.get(path)
            .map(|node| node.children.iter().filter_map(|c| self.get(c)).collect())
            .unwrap_or_default()
    }

    /// Nodes at `level` inside the subtree rooted at `scope`
    pub fn descendants_at(&self, scope: &str, level: HierarchyLevel) -> Vec<&HierarchyNode> {
        // Keys sharing the scope as a string prefix are contiguous in a BTreeMap;
        // siblings like "St Mary's Annex" interleave and are filtered out.
        self.nodes
            .range(scope.to_string()..)
            .map(|(_, node)| node)
            .take_while(|node| node.path.starts_with(scope))
            .filter(|node| node.level == level && node.is_within(scope))
            .collect()
    }

    /// Chain from the archdeaconry down to `path` (inclusive)
    pub fn ancestry(&self, path: &str) -> Vec<&HierarchyNode> {
        let mut chain = Vec::new();
        let mut current = self.get(path);
        while let Some(node) = current {
            chain.push(node);
            current = node.parent.as_deref().and_then(|p| self.get(p));
        }
        chain.reverse();
        chain
    }

    // ------------------------------------------------------------------------
    // Mutation (builder only)
    // ------------------------------------------------------------------------

    /// Insert a node and link it into its parent's children
    pub fn insert(&mut self, node: HierarchyNode) {
        if let Some(parent_path) = node.parent.clone() {
            if let Some(parent) = self.nodes.get_mut(&parent_path) {
                if !parent.children.contains(&node.path) {
                    parent.children.push(node.path.clone());
                }
            }
        }
        self.nodes.insert(node.path.clone(), node);
    }

    /// Remove a node (and its subtree) and unlink it from its parent
    pub fn remove(&mut self, path: &str) -> Option<HierarchyNode> {
        let node = self.nodes.remove(path)?;

        for child in &node.children {
            self.remove(child);
        }

        if let Some(parent_path) = &node.parent {
            if let Some(parent) = self.nodes.get_mut(parent_path) {
                parent.children.retain(|c| c != path);
            }
        }

        Some(node)
    }

    /// Keys of nodes whose parent is missing (should always be empty)
    pub fn validate(&self) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| match &node.parent {
                Some(parent) => !self.nodes.contains_key(parent),
                None => node.level != HierarchyLevel::Archdeaconry,
            })
            .map(|node| node.path.clone())
            .collect()
    }

    /// Count of nodes per level
    pub fn level_counts(&self) -> BTreeMap<HierarchyLevel, usize> {
        let mut counts = BTreeMap::new();
        for node in self.nodes.values() {
            *counts.entry(node.level).or_insert(0) += 1;
        }
        counts
    }
}

/// Write `bytes` to a sibling temp file and rename it over `path`
pub(crate) fn write_atomically(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut tmp_name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);

    fs::write(&tmp_path, bytes)?;
    fs::rename(&tmp_path, path)
}

// ============================================================================
// TESTS
// ============================================================================
