// Parish Organizer - Core Library
// Hierarchy cache + name matching + file placement, used by the CLI and tests

pub mod config;
pub mod error;
pub mod hierarchy;
pub mod ledger;
pub mod matcher;
pub mod organizer;
pub mod placer;
pub mod roster;

// Re-export commonly used types
pub use config::Config;
pub use error::{OrganizerError, Result};
pub use hierarchy::{
    export_summary, BuildReport, HierarchyBuilder, HierarchyCache, HierarchyLevel, HierarchyNode,
};
pub use ledger::{LedgerEntry, ProcessedLedger};
pub use matcher::{
    token_set_ratio, MatchCandidate, MatchFailure, NameMatcher, NameScorer, TokenSetScorer,
    DEFAULT_THRESHOLD,
};
pub use organizer::{Organizer, RunReport};
pub use placer::{FilePlacer, PlaceOutcome};
pub use roster::{load_roster, Roster, RosterRow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
