// End-to-end runs against throwaway trees

use parish_organizer::{
    load_roster, Config, HierarchyCache, HierarchyLevel, Organizer, ProcessedLedger,
};
use std::fs;
use tempfile::TempDir;

/// scans/
///   Kazo Arch/St Mary's/Central/{John Smith, Jane Doe}
///   Kazo Arch/Masuulita Parish/St Andrews/Peter Okello
/// inbox/{Smith_J.pdf, Doe_J.pdf, Unknown_X.pdf}
/// roster.csv
fn workspace() -> (TempDir, Config) {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    for p in [
        "Kazo Arch/St Mary's/Central/John Smith",
        "Kazo Arch/St Mary's/Central/Jane Doe",
        "Kazo Arch/Masuulita Parish/St Andrews/Peter Okello",
    ] {
        fs::create_dir_all(root.join("scans").join(p)).unwrap();
    }

    fs::create_dir_all(root.join("inbox")).unwrap();
    for f in ["Smith_J.pdf", "Doe_J.pdf", "Unknown_X.pdf"] {
        fs::write(root.join("inbox").join(f), f).unwrap();
    }

    fs::write(
        root.join("roster.csv"),
        "Individual Name,Parish Name,File\n\
         John Smith,St Mary's,Smith_J.pdf\n\
         Jane Doe,Central,Doe_J.pdf\n\
         Xavier Unknown,St Mary's,Unknown_X.pdf\n\
         ,St Mary's,Nobody.pdf\n",
    )
    .unwrap();

    let config = Config {
        roster_file: root.join("roster.csv"),
        base_dir: root.join("scans"),
        inbox_dir: Some(root.join("inbox")),
        hierarchy_cache_file: root.join("hierarchy_cache.json"),
        processed_individuals_file: root.join("processed_individuals.csv"),
        ..Config::default()
    };

    (dir, config)
}

fn run_once(config: &Config) -> parish_organizer::RunReport {
    let roster = load_roster(&config.roster_file).unwrap();
    let mut organizer = Organizer::open(config.clone()).unwrap();
    let report = organizer.run_roster(&roster).unwrap();
    organizer.finish().unwrap();
    report
}

#[test]
fn test_file_lands_in_individual_folder() {
    let (dir, config) = workspace();
    let root = dir.path();

    let report = run_once(&config);

    let placed = root.join("scans/Kazo Arch/St Mary's/Central/John Smith/Smith_J.pdf");
    assert!(placed.is_file(), "Smith_J.pdf should be in John Smith's folder");
    assert!(!root.join("inbox/Smith_J.pdf").exists());

    let ledger = ProcessedLedger::load(&config.processed_individuals_file).unwrap();
    assert!(ledger.contains("John Smith"));
    assert!(ledger.contains("Jane Doe"));
    assert!(!ledger.contains("Xavier Unknown"));

    assert_eq!(report.moved, 2);
    assert_eq!(report.unresolved, 1);
    assert_eq!(report.rejected_rows, 1);

    // Unresolved file is untouched
    assert!(root.join("inbox/Unknown_X.pdf").is_file());
}

#[test]
fn test_second_run_moves_nothing() {
    let (_dir, config) = workspace();

    let first = run_once(&config);
    assert_eq!(first.moved, 2);

    let second = run_once(&config);
    assert_eq!(second.moved, 0);
    assert_eq!(second.skipped, 2);
    // Unresolved rows get another try and fail the same way
    assert_eq!(second.unresolved, 1);
}

#[test]
fn test_cache_reused_between_runs() {
    let (dir, config) = workspace();

    run_once(&config);
    let cached = HierarchyCache::load(&config.hierarchy_cache_file);
    assert_eq!(cached.nodes_at(HierarchyLevel::Individual).count(), 3);

    // A folder added after the cache was built is not seen by default
    fs::create_dir_all(dir.path().join("scans/Kazo Arch/St Mary's/Central/Mary Nakato")).unwrap();
    let organizer = Organizer::open(config.clone()).unwrap();
    assert_eq!(organizer.cache().nodes_at(HierarchyLevel::Individual).count(), 3);

    // ... unless freshness is verified
    let fresh = Config {
        verify_freshness: true,
        ..config
    };
    let organizer = Organizer::open(fresh).unwrap();
    assert_eq!(organizer.cache().nodes_at(HierarchyLevel::Individual).count(), 4);
}

#[test]
fn test_separate_destination_mirrors_hierarchy() {
    let (dir, mut config) = workspace();
    let dest = dir.path().join("Organized_Scans");
    config.dest_base_dir = Some(dest.clone());

    run_once(&config);

    assert!(dest
        .join("Kazo Arch/St Mary's/Central/John Smith/Smith_J.pdf")
        .is_file());
    // Source hierarchy gains nothing
    assert!(!dir
        .path()
        .join("scans/Kazo Arch/St Mary's/Central/John Smith/Smith_J.pdf")
        .exists());
}

#[test]
fn test_folder_rows_copy_individual_folder() {
    let (dir, mut config) = workspace();
    let root = dir.path();
    let dest = root.join("Organized_Scans");
    config.dest_base_dir = Some(dest.clone());

    fs::write(
        root.join("scans/Kazo Arch/Masuulita Parish/St Andrews/Peter Okello/baptism.pdf"),
        "b",
    )
    .unwrap();
    fs::write(
        root.join("roster.csv"),
        "Individual Name,Parish Name\nPeter Okello,Masuulita Parish\n",
    )
    .unwrap();

    let report = run_once(&config);
    assert_eq!(report.copied, 1);
    assert!(dest
        .join("Kazo Arch/Masuulita Parish/St Andrews/Peter Okello (Peter Okello)/baptism.pdf")
        .is_file());
}

#[test]
fn test_missing_roster_is_fatal() {
    let (dir, config) = workspace();
    fs::remove_file(dir.path().join("roster.csv")).unwrap();

    let err = load_roster(&config.roster_file).unwrap_err();
    assert!(err.is_fatal());
}
