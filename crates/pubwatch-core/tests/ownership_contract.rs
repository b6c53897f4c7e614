//! Architectural Contract Test: Record Ownership
//!
//! This test verifies that every discovered record is downloaded by the
//! monitor instance that produced it, and by no other.
//!
//! Constraints verified:
//! - Discovery results are concatenated in monitor order
//! - Each record is routed back to its producing monitor
//! - Records from different monitors never share a local path, even when
//!   their publication ids collide
//!
//! If this test fails, someone has replaced explicit ownership with
//! type-based or first-match routing.

mod common;

use common::*;
use pubwatch_core::{Orchestrator, RunConfig};
use std::collections::HashSet;

#[tokio::test]
async fn each_record_is_downloaded_by_its_owner() {
    init_tracing();

    let first = ScriptedMonitor::new(
        "issuu",
        vec![
            publication("Spring", "acme", "doc-1", "2024-05-01"),
            publication("Summer", "acme", "doc-2", "2024-06-01"),
        ],
    );
    // Same monitor type, same publication id as the first monitor's record
    let second = ScriptedMonitor::new(
        "issuu",
        vec![publication("Autumn", "globex", "doc-1", "2024-09-01")],
    );
    let third = ScriptedMonitor::new(
        "archive",
        vec![publication("Winter", "initech", "w-1", "2024-12-01")],
    );

    let first_probe = first.probe();
    let second_probe = second.probe();
    let third_probe = third.probe();

    let storage = RecordingStorage::new();
    let storage_probe = storage.probe();

    let orchestrator = Orchestrator::new(
        vec![Box::new(first), Box::new(second), Box::new(third)],
        Some(Box::new(storage)),
        Vec::new(),
        RunConfig::default(),
    )
    .expect("valid orchestrator");

    let report = orchestrator.run().await.expect("run succeeds");

    assert_eq!(report.discovered, 4);
    assert_eq!(first_probe.downloaded_titles(), vec!["Spring", "Summer"]);
    assert_eq!(second_probe.downloaded_titles(), vec!["Autumn"]);
    assert_eq!(third_probe.downloaded_titles(), vec!["Winter"]);

    // Uploads follow discovery order across monitors
    let uploaded: Vec<String> = report.uploaded.iter().map(|p| p.title.clone()).collect();
    assert_eq!(uploaded, vec!["Spring", "Summer", "Autumn", "Winter"]);

    let paths: HashSet<_> = storage_probe
        .uploads()
        .into_iter()
        .map(|u| u.local_path)
        .collect();
    assert_eq!(paths.len(), 4, "colliding ids must not share a local path");
}

#[tokio::test]
async fn every_monitor_is_checked_exactly_once() {
    let first = ScriptedMonitor::new("issuu", Vec::new());
    let second = ScriptedMonitor::new(
        "archive",
        vec![publication("Only", "acme", "doc-9", "2024-03-03")],
    );
    let first_probe = first.probe();
    let second_probe = second.probe();

    let orchestrator = Orchestrator::new(
        vec![Box::new(first), Box::new(second)],
        Some(Box::new(RecordingStorage::new())),
        Vec::new(),
        RunConfig::default(),
    )
    .expect("valid orchestrator");

    orchestrator.run().await.expect("run succeeds");

    assert_eq!(first_probe.check_calls(), 1);
    assert_eq!(second_probe.check_calls(), 1);
    assert!(first_probe.downloads().is_empty());
    assert_eq!(second_probe.downloaded_titles(), vec!["Only"]);
}

#[tokio::test]
async fn download_completes_before_upload() {
    let monitor = ScriptedMonitor::new(
        "issuu",
        vec![publication("Spring", "acme", "doc-1", "2024-05-01")],
    );
    let storage = RecordingStorage::new();
    let storage_probe = storage.probe();

    let orchestrator = Orchestrator::new(
        vec![Box::new(monitor)],
        Some(Box::new(storage)),
        Vec::new(),
        RunConfig::default(),
    )
    .expect("valid orchestrator");

    orchestrator.run().await.expect("run succeeds");

    let uploads = storage_probe.uploads();
    assert_eq!(uploads.len(), 1);
    assert!(uploads[0].file_present);
    assert_eq!(uploads[0].remote_name, "acme_Spring_2024-05-01T00:00:00.pdf");
    assert!(
        !uploads[0].local_path.exists(),
        "temporary file outlives the run"
    );
}
