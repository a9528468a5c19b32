//! Backup cycles run end to end against a simulated host

mod common;

use common::{repo_location, settings, SimHost, PREFIX};
use snapvault::error::SnapvaultError;
use snapvault::journal::{EventKind, RunJournal};
use snapvault::pipeline::{BackupPipeline, Phase};
use tempfile::TempDir;

const TAG: &str = "auto-backup_2025-01-06_03-00-00";

fn position(events: &[String], prefix: &str) -> usize {
    events
        .iter()
        .position(|e| e.starts_with(prefix))
        .unwrap_or_else(|| panic!("no event starting with '{}' in {:?}", prefix, events))
}

#[test]
fn test_full_cycle_archives_every_volume() {
    let host = SimHost::with_volumes(&["a", "b"]);
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    pipeline.run().unwrap();

    let locations: Vec<String> = host.repo_locations().into_iter().collect();
    assert_eq!(locations, vec![repo_location("a"), repo_location("b")]);

    for volume in ["a", "b"] {
        let repo = host.repo(&repo_location(volume)).unwrap();
        assert_eq!(repo.archives.len(), 1);
        assert!(repo.archives[0].starts_with(&format!("{}_{}_", PREFIX, TAG)));
        assert_eq!(repo.prunes, 1);
        assert_eq!(repo.checks, 1);
        assert_eq!(
            host.sources(&repo_location(volume)),
            vec![format!("/srv/{}/.zfs/snapshot/{}", volume, TAG)]
        );
    }

    assert!(host.snapshots().is_empty());
    let state = pipeline.state();
    assert!(!state.snapshot_created);
    assert_eq!(state.archived, vec!["pool/svcs/a", "pool/svcs/b"]);
    assert_eq!(state.checked, vec!["pool/svcs/a", "pool/svcs/b"]);
    assert!(state.failure.is_none());
}

#[test]
fn test_services_bracket_only_the_snapshot() {
    let host = SimHost::with_volumes(&["a"]);
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    BackupPipeline::new(&host, &settings, &host)
        .unwrap()
        .with_tag(TAG)
        .run()
        .unwrap();

    let events = host.events();
    let stop = position(&events, "services stop");
    let snapshot = position(&events, "zfs snapshot -r pool/svcs@");
    let start = position(&events, "services start");
    let first_borg = position(&events, "borg");
    assert!(stop < snapshot && snapshot < start && start < first_borg);
    assert_eq!(host.count_events("services start"), 1);
}

#[test]
fn test_snapshot_failure_still_restarts_services() {
    let host = SimHost::with_volumes(&["a", "b"]);
    host.fail_snapshots();
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.exit_code(), Some(2));
    assert_eq!(host.count_events("services stop"), 1);
    assert_eq!(host.count_events("services start"), 1);
    assert_eq!(host.count_events("borg"), 0);
    assert!(!pipeline.state().snapshot_created);
}

#[test]
fn test_restart_failure_aborts_and_keeps_snapshot() {
    let host = SimHost::with_volumes(&["a", "b"]);
    host.fail_service_start();
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let journal = RunJournal::new(dir.path().join("runs.jsonl"));

    let mut pipeline = BackupPipeline::new(&host, &settings, &host)
        .unwrap()
        .with_tag(TAG)
        .with_journal(&journal);
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.exit_code(), Some(17));
    assert_eq!(host.count_events("services start"), 1);
    assert_eq!(host.count_events("borg"), 0);
    assert!(pipeline.state().snapshot_created);
    assert!(host.snapshot_exists(&format!("pool/svcs@{}", TAG)));

    let last = journal.read_recent(1).unwrap().pop().unwrap();
    assert_eq!(last.kind, EventKind::RunFailed);
    let expected = format!("pool/svcs@{}", TAG);
    assert_eq!(last.retained_snapshot.as_deref(), Some(expected.as_str()));
}

#[test]
fn test_snapshot_and_restart_failure_reports_snapshot_error() {
    let host = SimHost::with_volumes(&["a"]);
    host.fail_snapshots();
    host.fail_service_start();
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    let err = pipeline.run().unwrap_err();

    assert_eq!(err.exit_code(), Some(2));
    assert_eq!(host.count_events("services start"), 1);
    assert_eq!(host.count_events("borg"), 0);
    assert!(!pipeline.state().snapshot_created);
    assert!(host.snapshots().is_empty());
}

#[test]
fn test_archive_failure_stops_the_run_and_keeps_snapshot() {
    let host = SimHost::with_volumes(&["a", "b", "c"]);
    host.fail_archive_for("b");
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, SnapvaultError::CommandFailed { .. }));

    assert_eq!(host.repo(&repo_location("a")).unwrap().archives.len(), 1);
    assert!(host.repo(&repo_location("b")).unwrap().archives.is_empty());
    assert!(host.repo(&repo_location("c")).is_none());
    assert_eq!(host.count_events("borg check"), 0);

    let state = pipeline.state();
    assert!(state.snapshot_created);
    assert!(host.snapshot_exists(&format!("pool/svcs@{}", TAG)));
    assert_eq!(state.archived, vec!["pool/svcs/a"]);
    let failure = state.failure.as_ref().unwrap();
    assert_eq!(failure.volume, "pool/svcs/b");
    assert_eq!(failure.phase, Phase::Archive);
}

#[test]
fn test_check_failure_is_attributed_to_check_phase() {
    let host = SimHost::with_volumes(&["a", "b", "c"]);
    host.fail_check_for("b");
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    assert!(pipeline.run().is_err());

    let state = pipeline.state();
    assert_eq!(state.archived.len(), 3);
    assert_eq!(state.checked, vec!["pool/svcs/a"]);
    let failure = state.failure.as_ref().unwrap();
    assert_eq!(failure.volume, "pool/svcs/b");
    assert_eq!(failure.phase, Phase::Check);
    assert!(state.snapshot_created);
    assert_eq!(host.count_events("zfs destroy"), 0);
}

#[test]
fn test_no_mounted_volumes_is_an_error() {
    let host = SimHost::with_volumes(&[]);
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);

    let mut pipeline = BackupPipeline::new(&host, &settings, &host).unwrap().with_tag(TAG);
    let err = pipeline.run().unwrap_err();
    assert!(matches!(err, SnapvaultError::NoVolumesFound { .. }));
    assert!(pipeline.state().snapshot_created);
}

#[test]
fn test_journal_records_run_milestones() {
    let host = SimHost::with_volumes(&["a", "b"]);
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let journal = RunJournal::new(dir.path().join("runs.jsonl"));

    let mut pipeline = BackupPipeline::new(&host, &settings, &host)
        .unwrap()
        .with_tag(TAG)
        .with_journal(&journal);
    pipeline.run().unwrap();

    let events = journal.read_all().unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EventKind::RunStarted,
            EventKind::SnapshotCreated,
            EventKind::VolumeArchived,
            EventKind::VolumeArchived,
            EventKind::VolumeChecked,
            EventKind::VolumeChecked,
            EventKind::SnapshotDestroyed,
            EventKind::RunSucceeded,
        ]
    );
    assert!(events.iter().all(|e| e.run_id == pipeline.run_id() && e.tag == TAG));
}

#[test]
fn test_journal_names_retained_snapshot_on_failure() {
    let host = SimHost::with_volumes(&["a", "b"]);
    host.fail_archive_for("a");
    let dir = TempDir::new().unwrap();
    let settings = settings(&dir);
    let journal = RunJournal::new(dir.path().join("runs.jsonl"));

    let mut pipeline = BackupPipeline::new(&host, &settings, &host)
        .unwrap()
        .with_tag(TAG)
        .with_journal(&journal);
    assert!(pipeline.run().is_err());

    let last = journal.read_recent(1).unwrap().pop().unwrap();
    assert_eq!(last.kind, EventKind::RunFailed);
    assert_eq!(last.volume.as_deref(), Some("pool/svcs/a"));
    let expected = format!("pool/svcs@{}", TAG);
    assert_eq!(last.retained_snapshot.as_deref(), Some(expected.as_str()));
}
