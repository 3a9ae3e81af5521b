// Hierarchy - Archdeaconry → Parish → Sub-Parish → Individual
//
// Each piece:
// - node: level classification + path-keyed node
// - cache: persisted snapshot, the only owner of nodes
// - builder: filesystem walk that fills the cache
// - export: flat summary table

pub mod builder;
pub mod cache;
pub mod export;
pub mod node;

pub use builder::{BuildReport, HierarchyBuilder};
pub use cache::{HierarchyCache, CACHE_FORMAT_VERSION};
pub use export::{export_summary, summary_rows, HierarchyRow};
pub use node::{normalize_path, HierarchyLevel, HierarchyNode};
