// 📦 File Placer - move each file into its individual's folder
//
// One attempt per file per run:
//   in ledger      → Skipped
//   no match       → Unresolved (file untouched)
//   match          → move, record in ledger → Moved
//   move fails     → Err(FileMoveFailure), caller logs and continues
//
// Target folders mirror the hierarchy under dest_base_dir. When that is the
// base_dir itself the matched folder must exist; nothing is created there.

use crate::error::{OrganizerError, Result};
use crate::hierarchy::{HierarchyCache, HierarchyNode};
use crate::ledger::{LedgerEntry, ProcessedLedger};
use crate::matcher::{MatchFailure, NameMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// ============================================================================
// PLACE OUTCOME
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome {
    /// File moved into the individual folder
    Moved { target: PathBuf },

    /// Whole individual folder copied into the destination tree
    Copied { target: PathBuf },

    /// Already in the ledger, or destination folder already present
    Skipped,

    /// No folder matched; nothing touched
    Unresolved(MatchFailure),
}

// ============================================================================
// FILE PLACER
// ============================================================================

pub struct FilePlacer<'a> {
    cache: &'a HierarchyCache,
    matcher: &'a NameMatcher,
    ledger: &'a mut ProcessedLedger,
    dest_base_dir: PathBuf,
}

impl<'a> FilePlacer<'a> {
    pub fn new(
        cache: &'a HierarchyCache,
        matcher: &'a NameMatcher,
        ledger: &'a mut ProcessedLedger,
        dest_base_dir: &Path,
    ) -> Self {
        FilePlacer {
            cache,
            matcher,
            ledger,
            dest_base_dir: dest_base_dir.to_path_buf(),
        }
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &*self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut ProcessedLedger {
        &mut *self.ledger
    }

    /// Move `file` into the folder matching `individual_name` in `parish_scope`
    pub fn place(
        &mut self,
        file: &Path,
        individual_name: &str,
        parish_scope: &str,
    ) -> Result<PlaceOutcome> {
        let node = match self.lookup(individual_name, parish_scope) {
            Ok(node) => node,
            Err(outcome) => return Ok(outcome),
        };

        let file_name = file.file_name().ok_or_else(|| OrganizerError::FileMoveFailure {
            from: file.to_path_buf(),
            to: PathBuf::new(),
            reason: "source has no file name".to_string(),
        })?;

        let target_dir = node.absolute_path(&self.dest_base_dir);
        let target = target_dir.join(file_name);

        let failure = |reason: String| OrganizerError::FileMoveFailure {
            from: file.to_path_buf(),
            to: target.clone(),
            reason,
        };

        if !file.is_file() {
            return Err(failure("source file not found".to_string()));
        }
        if target.exists() {
            return Err(failure("destination already exists".to_string()));
        }

        // Placing into the hierarchy itself: the folder must still be there.
        // Only a separate destination tree gets folders created on demand.
        if self.dest_base_dir == self.cache.base_dir {
            if !target_dir.is_dir() {
                return Err(failure("individual folder missing".to_string()));
            }
        } else {
            fs::create_dir_all(&target_dir).map_err(|e| failure(e.to_string()))?;
        }
        move_file(file, &target).map_err(failure)?;

        tracing::info!("Moved {} to {}", file.display(), target.display());
        self.ledger
            .record(LedgerEntry::new(individual_name, parish_scope, &target));

        Ok(PlaceOutcome::Moved { target })
    }

    /// Copy the matched individual folder to
    /// `dest_base_dir/<archdeaconry>/<parish>/<sub-parish>/<individual> (<folder>)`
    pub fn place_folder(&mut self, individual_name: &str, parish_scope: &str) -> Result<PlaceOutcome> {
        let node = match self.lookup(individual_name, parish_scope) {
            Ok(node) => node,
            Err(outcome) => return Ok(outcome),
        };

        let source = node.absolute_path(&self.cache.base_dir);
        if !source.is_dir() {
            return Err(OrganizerError::FileMoveFailure {
                from: source,
                to: self.dest_base_dir.clone(),
                reason: "individual folder missing".to_string(),
            });
        }

        let mut target = self.dest_base_dir.clone();
        if let Some(parent) = node.parent.as_deref() {
            for segment in parent.split('/') {
                target.push(segment);
            }
        }
        target.push(format!("{} ({})", individual_name, node.name()));

        if target.exists() {
            tracing::warn!("Destination already exists: {}. Skipping copy.", target.display());
            return Ok(PlaceOutcome::Skipped);
        }

        if let Err(reason) = copy_tree(&source, &target) {
            // Leave nothing half-copied behind
            let _ = fs::remove_dir_all(&target);
            return Err(OrganizerError::FileMoveFailure {
                from: source,
                to: target,
                reason,
            });
        }

        tracing::info!("Copied {} to {}", individual_name, target.display());
        self.ledger
            .record(LedgerEntry::new(individual_name, parish_scope, &target));

        Ok(PlaceOutcome::Copied { target })
    }

    /// Ledger check + match. Err carries the outcome to return as-is.
    fn lookup(
        &self,
        individual_name: &str,
        parish_scope: &str,
    ) -> std::result::Result<&'a HierarchyNode, PlaceOutcome> {
        if self.ledger.contains(individual_name) {
            tracing::info!("Individual {} already processed. Skipping.", individual_name);
            return Err(PlaceOutcome::Skipped);
        }

        let cache: &'a HierarchyCache = self.cache;
        let found = self
            .matcher
            .try_resolve(individual_name, parish_scope, cache)
            .map_err(|failure| {
                tracing::warn!("{}", failure.clone().into_error(individual_name, parish_scope));
                PlaceOutcome::Unresolved(failure)
            })?;

        match cache.get(&found.folder_path) {
            Some(node) => {
                tracing::info!(
                    "Found individual folder for {}: {} ({:.2})",
                    individual_name,
                    found.folder_name(),
                    found.similarity_score
                );
                Ok(node)
            }
            None => Err(PlaceOutcome::Unresolved(MatchFailure::NoIndividualFolders)),
        }
    }
}

// ============================================================================
// FILESYSTEM HELPERS
// ============================================================================

/// Rename, or copy + remove when rename can't (e.g. across devices).
/// On failure the source is left where it was and no copy remains.
fn move_file(from: &Path, to: &Path) -> std::result::Result<(), String> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    copy_then_remove(from, to)
}

fn copy_then_remove(from: &Path, to: &Path) -> std::result::Result<(), String> {
    if let Err(e) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(format!("copy failed: {}", e));
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(format!("could not remove source after copy: {}", e));
    }

    Ok(())
}

/// Recursive copy of a directory tree (symlinks skipped)
fn copy_tree(from: &Path, to: &Path) -> std::result::Result<(), String> {
    for entry in WalkDir::new(from).sort_by_file_name() {
        let entry = entry.map_err(|e| e.to_string())?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(|e| e.to_string())?;
        let dest = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| format!("{}: {}", dest.display(), e))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &dest).map_err(|e| format!("{}: {}", dest.display(), e))?;
        } else {
            tracing::debug!("Not copying symlink {}", entry.path().display());
        }
    }
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
