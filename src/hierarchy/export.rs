// 📤 Hierarchy Export - Archdeaconry / Parish / Sub-Parish summary table
// One row per sub-parish (or per parish when it has none), sorted by path.

use super::cache::HierarchyCache;
use super::node::HierarchyLevel;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HierarchyRow {
    #[serde(rename = "Archdeaconry")]
    pub archdeaconry: String,

    #[serde(rename = "Parish")]
    pub parish: String,

    #[serde(rename = "Sub-Parish")]
    pub sub_parish: String,

    #[serde(rename = "Individuals")]
    pub individuals: usize,
}

/// Flatten the cache into summary rows
pub fn summary_rows(cache: &HierarchyCache) -> Vec<HierarchyRow> {
    let mut rows = Vec::new();

    for arch in cache.nodes_at(HierarchyLevel::Archdeaconry) {
        for parish in cache.children_of(&arch.path) {
            let sub_parishes = cache.children_of(&parish.path);

            if sub_parishes.is_empty() {
                rows.push(HierarchyRow {
                    archdeaconry: arch.name().to_string(),
                    parish: parish.name().to_string(),
                    sub_parish: String::new(),
                    individuals: 0,
                });
                continue;
            }

            for sub in sub_parishes {
                rows.push(HierarchyRow {
                    archdeaconry: arch.name().to_string(),
                    parish: parish.name().to_string(),
                    sub_parish: sub.name().to_string(),
                    individuals: sub.children.len(),
                });
            }
        }
    }

    rows.sort_by(|a, b| {
        (&a.archdeaconry, &a.parish, &a.sub_parish).cmp(&(&b.archdeaconry, &b.parish, &b.sub_parish))
    });
    rows
}

/// Write the summary as CSV. Returns the number of rows written.
pub fn export_summary(cache: &HierarchyCache, path: &Path) -> Result<usize> {
    if cache.is_empty() {
        tracing::error!("Hierarchy is empty. Nothing to export to {}", path.display());
        return Ok(0);
    }

    let rows = summary_rows(cache);

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create export file: {}", path.display()))?;
    for row in &rows {
        wtr.serialize(row).context("Failed to write hierarchy row")?;
    }
    wtr.flush().context("Failed to flush hierarchy export")?;

    tracing::info!("Saved {} hierarchy rows to {}", rows.len(), path.display());
    Ok(rows.len())
}
