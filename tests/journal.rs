//! Journal Integration Tests
//!
//! Tests for persisting a compliance run as JSONL and rebuilding the store.

use copyguard::config::BrandParams;
use copyguard::core::{ComplianceEngine, HistoryOrder, VersionJournal};
use copyguard::domain::VersionAction;
use tempfile::TempDir;
use uuid::Uuid;

#[tokio::test]
async fn test_compliance_run_round_trips_through_journal() {
    let temp = TempDir::new().unwrap();
    let journal = VersionJournal::open(temp.path().join(Uuid::new_v4().to_string())).unwrap();

    let engine = ComplianceEngine::default();
    let outcome = engine
        .run_compliance("blog", "We sell outcomes, not hours, not days.", 5, &BrandParams::default())
        .await
        .unwrap();

    let versions = engine.store().all();
    let written = journal.append_all(versions.iter().map(|v| v.as_ref())).unwrap();
    assert_eq!(written, outcome.versions.len());

    // One JSON object per line
    let raw = std::fs::read_to_string(journal.path()).unwrap();
    assert_eq!(raw.lines().count(), written);
    assert!(raw.lines().all(|line| line.starts_with('{')));

    let rebuilt = journal.load_store().unwrap();
    let head = outcome.head().unwrap();
    let history = rebuilt.history(head, HistoryOrder::OldestFirst).unwrap();

    assert_eq!(history.len(), outcome.versions.len());
    assert_eq!(history[0].action, VersionAction::Initial);
    assert_eq!(history.last().unwrap().text("blog"), Some(outcome.final_text.as_str()));
    for (replayed, original) in history.iter().zip(&outcome.versions) {
        assert_eq!(**replayed, **original);
    }
}

#[test]
fn test_list_runs_finds_journal_directories() {
    let temp = TempDir::new().unwrap();
    let runs = temp.path().join("runs");
    let run_id = Uuid::new_v4();
    VersionJournal::open(runs.join(run_id.to_string())).unwrap();

    assert_eq!(VersionJournal::list_runs(&runs).unwrap(), vec![run_id]);
}
