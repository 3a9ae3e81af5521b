// 🧭 Organizer - the run context
//
// Lifecycle: open (load cache + ledger) → run rows → finish (flush ledger).
// Per-row problems are logged and counted; only missing input and
// persistence failures stop a run.

use crate::config::Config;
use crate::error::{OrganizerError, Result};
use crate::hierarchy::{export_summary, HierarchyBuilder, HierarchyCache};
use crate::ledger::ProcessedLedger;
use crate::matcher::{MatchFailure, NameMatcher};
use crate::placer::{FilePlacer, PlaceOutcome};
use crate::roster::{Roster, RosterRow};
use serde::Serialize;
use std::collections::BTreeMap;

// ============================================================================
// RUN REPORT
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub moved: usize,
    pub copied: usize,
    pub skipped: usize,
    pub unresolved: usize,
    pub failed: usize,

    /// Roster rows rejected at load time
    pub rejected_rows: usize,

    /// Parish name → rows whose parish was not in the hierarchy
    pub parishes_not_found: BTreeMap<String, usize>,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.moved + self.copied
    }

    pub fn summary(&self) -> String {
        format!(
            "{} moved, {} copied, {} skipped, {} unresolved, {} failed, {} rejected rows",
            self.moved, self.copied, self.skipped, self.unresolved, self.failed, self.rejected_rows
        )
    }
}

// ============================================================================
// ORGANIZER
// ============================================================================

pub struct Organizer {
    config: Config,
    cache: HierarchyCache,
    ledger: ProcessedLedger,
    matcher: NameMatcher,
}

impl Organizer {
    /// Load (or build) the hierarchy and load the ledger
    pub fn open(config: Config) -> Result<Self> {
        if !config.base_dir.is_dir() {
            return Err(OrganizerError::MissingInput(config.base_dir.clone()));
        }
        if !config.roster_file.is_file() {
            return Err(OrganizerError::MissingInput(config.roster_file.clone()));
        }

        let cache = HierarchyBuilder::new().load_or_build(
            &config.hierarchy_cache_file,
            &config.base_dir,
            config.force_refresh,
            config.verify_freshness,
        )?;

        let orphans = cache.validate();
        if !orphans.is_empty() {
            tracing::warn!("Hierarchy cache has {} orphaned nodes", orphans.len());
        }

        if let Some(export_file) = &config.hierarchy_export_file {
            if let Err(e) = export_summary(&cache, export_file) {
                tracing::error!("Failed to save hierarchy summary: {:#}", e);
            }
        }

        let ledger = ProcessedLedger::load(&config.processed_individuals_file)?;
        let matcher = NameMatcher::new().with_threshold(config.match_threshold);

        Ok(Organizer {
            config,
            cache,
            ledger,
            matcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &HierarchyCache {
        &self.cache
    }

    pub fn ledger(&self) -> &ProcessedLedger {
        &self.ledger
    }

    /// Process a loaded roster, counting its rejected rows
    pub fn run_roster(&mut self, roster: &Roster) -> Result<RunReport> {
        let mut report = self.run(&roster.rows)?;
        report.rejected_rows = roster.rejected.len();
        Ok(report)
    }

    /// Process rows in order. Rows with a file move that file; rows without
    /// one copy the whole individual folder.
    pub fn run(&mut self, rows: &[RosterRow]) -> Result<RunReport> {
        let mut report = RunReport::default();
        let flush_interval = self.config.ledger_flush_interval;
        let dest = self.config.dest_base_dir().to_path_buf();

        let mut placer = FilePlacer::new(&self.cache, &self.matcher, &mut self.ledger, &dest);

        for row in rows {
            let result = match &row.file {
                Some(file) => {
                    let path = self.config.resolve_input_file(file);
                    placer.place(&path, &row.individual_name, &row.parish_name)
                }
                None => placer.place_folder(&row.individual_name, &row.parish_name),
            };

            match result {
                Ok(PlaceOutcome::Moved { .. }) => report.moved += 1,
                Ok(PlaceOutcome::Copied { .. }) => report.copied += 1,
                Ok(PlaceOutcome::Skipped) => report.skipped += 1,
                Ok(PlaceOutcome::Unresolved(failure)) => {
                    report.unresolved += 1;
                    if failure == MatchFailure::ParishNotFound {
                        let count = report
                            .parishes_not_found
                            .entry(row.parish_name.clone())
                            .or_insert(0);
                        *count += 1;
                        tracing::warn!(
                            "Parish not found in hierarchy: {}. Total not found: {}.",
                            row.parish_name,
                            count
                        );
                    }
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::error!("Roster line {}: {}", row.line, e);
                    report.failed += 1;
                }
            }

            if flush_interval > 0 && placer.ledger().pending() >= flush_interval {
                placer.ledger_mut().save()?;
            }
        }

        tracing::info!("Run complete: {}", report.summary());
        Ok(report)
    }

    /// Flush the ledger
    pub fn finish(mut self) -> Result<()> {
        self.ledger.save()?;
        tracing::info!(
            "Ledger saved: {} processed individuals in {}",
            self.ledger.len(),
            self.ledger.path().display()
        );
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
