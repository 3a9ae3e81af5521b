// 📋 Roster - spreadsheet rows as fixed-shape records
//
// Input is the CSV export of the roster spreadsheet:
//   Individual Name, Parish Name[, File]
// Rows missing a name or parish are rejected here, with their line number,
// instead of failing somewhere downstream.

use crate::error::OrganizerError;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ============================================================================
// RAW ROW (as deserialized)
// ============================================================================

#[derive(Debug, Deserialize)]
struct RawRosterRow {
    #[serde(rename = "Individual Name", default)]
    individual_name: Option<String>,

    #[serde(rename = "Parish Name", default)]
    parish_name: Option<String>,

    #[serde(rename = "File", default)]
    file: Option<String>,
}

/// Spreadsheet exports write missing cells as "nan"
fn clean_cell(cell: Option<String>) -> String {
    let trimmed = cell.unwrap_or_default().trim().to_string();
    if trimmed.eq_ignore_ascii_case("nan") {
        String::new()
    } else {
        trimmed
    }
}

// ============================================================================
// ROSTER ROW
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub individual_name: String,
    pub parish_name: String,

    /// File to place. None = mirror the whole individual folder.
    pub file: Option<String>,

    /// Line in the roster file (for log messages)
    pub line: u64,
}

impl RosterRow {
    /// Validate one row
    pub fn new(
        individual_name: &str,
        parish_name: &str,
        file: Option<&str>,
        line: u64,
    ) -> Result<Self, OrganizerError> {
        let individual_name = individual_name.trim();
        let parish_name = parish_name.trim();

        if individual_name.is_empty() {
            return Err(OrganizerError::InvalidRosterRow {
                line,
                reason: "empty Individual Name".to_string(),
            });
        }
        if parish_name.is_empty() {
            return Err(OrganizerError::InvalidRosterRow {
                line,
                reason: "empty Parish Name".to_string(),
            });
        }

        Ok(RosterRow {
            individual_name: individual_name.to_string(),
            parish_name: parish_name.to_string(),
            file: file
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string),
            line,
        })
    }
}

// ============================================================================
// LOADING
// ============================================================================

/// Rows accepted and rejected from one roster file
#[derive(Debug, Default)]
pub struct Roster {
    pub rows: Vec<RosterRow>,
    pub rejected: Vec<OrganizerError>,
}

/// Read the roster CSV. A missing file is fatal; bad rows are not.
pub fn load_roster(path: &Path) -> Result<Roster, OrganizerError> {
    if !path.is_file() {
        return Err(OrganizerError::MissingInput(path.to_path_buf()));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|_| OrganizerError::MissingInput(path.to_path_buf()))?;

    let headers = rdr
        .headers()
        .map_err(|_| OrganizerError::MissingInput(path.to_path_buf()))?
        .clone();

    let mut roster = Roster::default();

    for result in rdr.records() {
        let parsed = result.and_then(|record| {
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            record
                .deserialize::<RawRosterRow>(Some(&headers))
                .map(|raw| (line, raw))
        });

        let (line, raw) = match parsed {
            Ok(parsed) => parsed,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                tracing::warn!("Skipping unreadable roster row at line {}: {}", line, e);
                roster.rejected.push(OrganizerError::InvalidRosterRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        let file = clean_cell(raw.file);
        let file = (!file.is_empty()).then_some(file);

        match RosterRow::new(
            &clean_cell(raw.individual_name),
            &clean_cell(raw.parish_name),
            file.as_deref(),
            line,
        ) {
            Ok(row) => roster.rows.push(row),
            Err(e) => {
                tracing::warn!("{}", e);
                roster.rejected.push(e);
            }
        }
    }

    tracing::info!(
        "Read {} roster rows from {} ({} rejected)",
        roster.rows.len(),
        path.display(),
        roster.rejected.len()
    );
    Ok(roster)
}

// ============================================================================
// TESTS
// ============================================================================
