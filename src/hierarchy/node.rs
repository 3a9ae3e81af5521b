// 🌳 Hierarchy Node - one classified directory
// Archdeaconry → Parish → Sub-Parish → Individual, derived from depth under base_dir

use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

// ============================================================================
// HIERARCHY LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HierarchyLevel {
    /// Depth 1 - outermost geographic level
    Archdeaconry,

    /// Depth 2
    Parish,

    /// Depth 3
    SubParish,

    /// Depth 4 - one folder per person, the placement target
    Individual,
}

impl HierarchyLevel {
    /// Deepest depth that still classifies
    pub const MAX_DEPTH: usize = 4;

    /// Classify a directory by its depth below base_dir (1-based)
    pub fn from_depth(depth: usize) -> Option<Self> {
        match depth {
            1 => Some(HierarchyLevel::Archdeaconry),
            2 => Some(HierarchyLevel::Parish),
            3 => Some(HierarchyLevel::SubParish),
            4 => Some(HierarchyLevel::Individual),
            _ => None,
        }
    }

    pub fn depth(&self) -> usize {
        match self {
            HierarchyLevel::Archdeaconry => 1,
            HierarchyLevel::Parish => 2,
            HierarchyLevel::SubParish => 3,
            HierarchyLevel::Individual => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Archdeaconry => "Archdeaconry",
            HierarchyLevel::Parish => "Parish",
            HierarchyLevel::SubParish => "Sub-Parish",
            HierarchyLevel::Individual => "Individual",
        }
    }
}

// ============================================================================
// HIERARCHY NODE
// ============================================================================

/// A directory in the hierarchy, keyed by its normalized relative path.
///
/// `parent` and `children` hold cache keys rather than nodes: the cache owns
/// every node and links are resolved through it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Normalized path relative to base_dir ("Kazo Arch/Masuulita Parish")
    pub path: String,

    pub level: HierarchyLevel,

    /// Parent key (None for archdeaconries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Child keys in directory-name order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<String>,
}

impl HierarchyNode {
    pub fn new(path: String, level: HierarchyLevel, parent: Option<String>) -> Self {
        HierarchyNode {
            path,
            level,
            parent,
            children: Vec::new(),
        }
    }

    /// Folder name (last path component)
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }

    /// Path components from archdeaconry down to this node
    pub fn segments(&self) -> Vec<&str> {
        self.path.split('/').collect()
    }

    /// Absolute location under a given root
    pub fn absolute_path(&self, root: &Path) -> PathBuf {
        let mut full = root.to_path_buf();
        for segment in self.segments() {
            full.push(segment);
        }
        full
    }

    /// True if this node is `ancestor` or lives beneath it
    pub fn is_within(&self, ancestor: &str) -> bool {
        self.path == ancestor
            || (self.path.starts_with(ancestor)
                && self.path[ancestor.len()..].starts_with('/'))
    }
}

/// Normalize `path` to a cache key relative to `base`.
///
/// Returns None when `path` is not under `base`, is `base` itself, or has a
/// segment that is not valid UTF-8.
pub fn normalize_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;

    let segments: Vec<String> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_str().map(str::to_owned)),
            _ => None,
        })
        .collect::<Option<Vec<String>>>()?;

    if segments.is_empty() {
        None
    } else {
        Some(segments.join("/"))
    }
}
