// 📒 Processed-Individuals Ledger - makes reruns resumable
//
// Only successes are recorded. An individual in the ledger is skipped on
// every later run; anything that failed simply gets another try next time.
// Rows this version can't parse are carried through saves untouched.
// Identity = individual name, case-folded with whitespace collapsed.

use crate::error::{OrganizerError, Result};
use crate::hierarchy::cache::write_atomically;
use crate::matcher::normalize_name;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};

// ============================================================================
// LEDGER ENTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    #[serde(rename = "Individual Name")]
    pub individual_name: String,

    #[serde(rename = "Parish Name")]
    pub parish_name: String,

    /// Where the file or folder ended up
    #[serde(rename = "Target")]
    pub target: String,

    #[serde(rename = "Processed At")]
    pub processed_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(individual_name: &str, parish_name: &str, target: &Path) -> Self {
        LedgerEntry {
            individual_name: individual_name.to_string(),
            parish_name: parish_name.to_string(),
            target: target.display().to_string(),
            processed_at: Utc::now(),
        }
    }

    pub fn identifier(&self) -> String {
        normalize_name(&self.individual_name)
    }
}

// ============================================================================
// LEDGER
// ============================================================================

const LEDGER_HEADERS: [&str; 4] = ["Individual Name", "Parish Name", "Target", "Processed At"];

pub struct ProcessedLedger {
    path: PathBuf,

    /// Append-only within a run
    entries: Vec<LedgerEntry>,

    /// Rows that didn't parse, written back verbatim on save
    unparsed: Vec<csv::StringRecord>,

    /// Normalized names of recorded individuals
    index: HashSet<String>,

    /// Entries recorded since the last save
    pending: usize,
}

impl ProcessedLedger {
    /// Load the ledger at `path`; a missing file is an empty ledger.
    ///
    /// Rows that don't parse are kept as-is and written back on save. Their
    /// individual name, when present, still counts as processed.
    pub fn load(path: &Path) -> Result<Self> {
        let mut ledger = ProcessedLedger {
            path: path.to_path_buf(),
            entries: Vec::new(),
            unparsed: Vec::new(),
            index: HashSet::new(),
            pending: 0,
        };

        if !path.exists() {
            tracing::info!("{} does not exist. Starting an empty ledger.", path.display());
            return Ok(ledger);
        }

        let persist_err = |e: csv::Error| OrganizerError::Persistence {
            path: path.to_path_buf(),
            source: io::Error::other(e),
        };

        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(persist_err)?;
        let headers = rdr.headers().map_err(persist_err)?.clone();

        for result in rdr.records() {
            let record = result.map_err(persist_err)?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            match record.deserialize::<LedgerEntry>(Some(&headers)) {
                Ok(entry) => {
                    if ledger.index.insert(entry.identifier()) {
                        ledger.entries.push(entry);
                    }
                }
                Err(e) => {
                    let name = record.get(0).map(normalize_name).unwrap_or_default();
                    tracing::warn!(
                        "Ledger line {} is unreadable ({}); keeping it as-is{}",
                        line,
                        e,
                        if name.is_empty() { "" } else { " and treating the individual as processed" }
                    );
                    if !name.is_empty() {
                        ledger.index.insert(name);
                    }
                    ledger.unparsed.push(record);
                }
            }
        }

        tracing::info!(
            "Loaded {} processed individuals from {}",
            ledger.entries.len(),
            path.display()
        );
        Ok(ledger)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, individual_name: &str) -> bool {
        self.index.contains(&normalize_name(individual_name))
    }

    /// Record a success. Returns false if the individual was already there.
    pub fn record(&mut self, entry: LedgerEntry) -> bool {
        if !self.index.insert(entry.identifier()) {
            return false;
        }
        self.entries.push(entry);
        self.pending += 1;
        true
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries not yet written to disk
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Write the whole ledger (temp file, then rename)
    pub fn save(&mut self) -> Result<()> {
        let persist_err = |source: io::Error| OrganizerError::Persistence {
            path: self.path.clone(),
            source,
        };

        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        wtr.write_record(LEDGER_HEADERS)
            .map_err(|e| persist_err(io::Error::other(e)))?;
        for entry in &self.entries {
            wtr.serialize(entry).map_err(|e| persist_err(io::Error::other(e)))?;
        }
        for record in &self.unparsed {
            wtr.write_record(record)
                .map_err(|e| persist_err(io::Error::other(e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| persist_err(io::Error::other(e.to_string())))?;

        write_atomically(&self.path, &bytes).map_err(persist_err)?;

        tracing::debug!("Saved {} ledger entries to {}", self.entries.len(), self.path.display());
        self.pending = 0;
        Ok(())
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

    #[test]
    fn test_missing_ledger_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = ProcessedLedger::load(&dir.path().join("processed_individuals.csv")).unwrap();
        assert!(ledger.is_empty());
        assert!(!ledger.contains("John Smith"));
    }

    #[test]
    fn test_record_is_idempotent_and_case_insensitive() {
        let dir = TempDir::new().unwrap();
        let mut ledger = ProcessedLedger::load(&dir.path().join("ledger.csv")).unwrap();

        assert!(ledger.record(LedgerEntry::new("John Smith", "St Mary's", Path::new("/x"))));
        assert!(!ledger.record(LedgerEntry::new("john  smith", "St Mary's", Path::new("/y"))));

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.pending(), 1);
        assert!(ledger.contains("JOHN SMITH"));
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut ledger = ProcessedLedger::load(&path).unwrap();
        ledger.record(LedgerEntry::new("John Smith", "St Mary's", Path::new("/scans/a")));
        ledger.record(LedgerEntry::new("Jane Doe", "Central, East", Path::new("/scans/b")));
        ledger.save().unwrap();
        assert_eq!(ledger.pending(), 0);

        let reloaded = ProcessedLedger::load(&path).unwrap();
        assert_eq!(reloaded.entries(), ledger.entries());
        assert!(reloaded.contains("Jane Doe"));
    }

    #[test]
    fn test_unreadable_rows_still_count_as_processed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(
            &path,
            "Individual Name,Parish Name,Target,Processed At\n\
             John Smith,St Mary's,/scans/a,2024-05-01T10:00:00Z\n\
             Broken Row,St Mary's,/scans/b,not-a-date\n\
             ,,\n",
        )
        .unwrap();

        let ledger = ProcessedLedger::load(&path).unwrap();
        assert_eq!(ledger.len(), 1);
        assert!(ledger.contains("John Smith"));
        assert!(ledger.contains("Broken Row"));
        assert!(!ledger.contains(""));
    }

    #[test]
    fn test_unreadable_rows_survive_save() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        fs::write(
            &path,
            "Individual Name,Parish Name,Target,Processed At\n\
             A,P,/s,2024-05-01T10:00:00Z\n\
             B,P,/t,2024-05-01 10:00\n",
        )
        .unwrap();

        let mut ledger = ProcessedLedger::load(&path).unwrap();
        assert!(!ledger.record(LedgerEntry::new("B", "P", Path::new("/elsewhere"))));
        assert!(ledger.record(LedgerEntry::new("C", "P", Path::new("/u"))));
        ledger.save().unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("Individual Name,Parish Name,Target,Processed At\n"));
        assert!(text.contains("B,P,/t,2024-05-01 10:00\n"));

        let reloaded = ProcessedLedger::load(&path).unwrap();
        assert!(reloaded.contains("A"));
        assert!(reloaded.contains("B"));
        assert!(reloaded.contains("C"));
        assert_eq!(reloaded.len(), 2);
    }

    #[test]
    fn test_empty_ledger_saves_header_only() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");

        let mut ledger = ProcessedLedger::load(&path).unwrap();
        ledger.save().unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Individual Name,Parish Name,Target,Processed At\n"
        );
        assert!(ProcessedLedger::load(&path).unwrap().is_empty());
    }
}
