// ⚠️ Error Taxonomy - what can go wrong during an organize run
// Fatal: MissingInput, Persistence. Everything else is per-row and recoverable.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrganizerError {
    /// Roster file or base directory absent - aborts the run
    #[error("Missing input: {0}")]
    MissingInput(PathBuf),

    /// Directory at an unexpected depth in the hierarchy tree
    #[error("Malformed hierarchy entry {path} (depth {depth})")]
    MalformedHierarchyEntry { path: PathBuf, depth: usize },

    /// No individual folder scored at or above the threshold
    #[error("Unresolved match for '{individual}' in parish '{parish}': {reason}")]
    UnresolvedMatch {
        individual: String,
        parish: String,
        reason: String,
    },

    /// Move/copy failed (permission, disk full, destination taken)
    #[error("Failed to move {from} -> {to}: {reason}")]
    FileMoveFailure {
        from: PathBuf,
        to: PathBuf,
        reason: String,
    },

    /// Roster row missing a required cell
    #[error("Invalid roster row at line {line}: {reason}")]
    InvalidRosterRow { line: u64, reason: String },

    /// Cache or ledger could not be written
    #[error("Failed to persist {path}: {source}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl OrganizerError {
    /// Whether the run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            OrganizerError::MissingInput(_) | OrganizerError::Persistence { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, OrganizerError>;
