//! Timeline controller: branching, commit promotion, undo/redo and the
//! durable log underneath.

use rewind_core::{
    event::LogRecord,
    live::{entity_mut, entity_ref, ObjRef, Record, Value},
    snapshot::SnapshotEngine,
    store::{self, EventLog},
    timeline::{Mode, Timeline},
};
use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rewind-timeline-{}", uuid::Uuid::new_v4()))
}

struct Fixture {
    dir:      PathBuf,
    root:     Value,
    counter:  ObjRef,
    timeline: Timeline<u32>,
}

impl Fixture {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = temp_dir();
        let log = EventLog::create(&dir.join("live.jsonl")).unwrap();
        let root = Value::object(Record::new("Counter").with("n", Value::Int(0)));
        let counter = root.as_object().unwrap();
        Self { dir, root, counter, timeline: Timeline::new(log, SnapshotEngine::default()) }
    }

    fn speculative() -> Self {
        let mut fixture = Self::new();
        fixture.timeline.set_mode(Mode::Speculative).unwrap();
        fixture
    }

    fn n(&self) -> i64 {
        entity_ref::<Record>(&self.counter).unwrap().get("n").unwrap().as_int().unwrap()
    }

    /// Log `event` speculatively, then apply it: n += 1.
    fn step(&mut self, event: u32) {
        let record = LogRecord::new(format!("n-{}", self.n()), event);
        self.timeline.append_speculative(&self.root, record).unwrap();
        let n = self.n();
        entity_mut::<Record>(&self.counter).unwrap().set("n", Value::Int(n + 1));
    }

    fn undo(&mut self) -> bool {
        match self.timeline.undo() {
            Some(snapshot) => {
                snapshot.restore_into(&self.counter).unwrap();
                true
            }
            None => false,
        }
    }

    fn redo(&mut self) -> bool {
        match self.timeline.redo() {
            Some(snapshot) => {
                snapshot.restore_into(&self.counter).unwrap();
                true
            }
            None => false,
        }
    }

    fn speculative_events(&self) -> Vec<u32> {
        self.timeline.speculative().map(|r| r.event).collect()
    }

    fn file_events(&self) -> Vec<u32> {
        store::read_lines(self.timeline.log_path())
            .unwrap()
            .iter()
            .map(|line| LogRecord::<u32>::from_line(line).unwrap().event)
            .collect()
    }

    fn file_len(&self) -> u64 {
        std::fs::metadata(self.timeline.log_path()).unwrap().len()
    }
}

/// Appending after two undos discards the redo tail in memory and on disk.
#[test]
fn branch_discards_redo_tail_and_truncates_file() {
    let mut f = Fixture::speculative();
    for event in 0..5 {
        f.step(event);
    }
    assert_eq!(f.timeline.cursor(), 5);
    let branch_offset = f.timeline.offset_at(3).unwrap();

    assert!(f.undo());
    assert!(f.undo());
    assert_eq!(f.timeline.cursor(), 3);
    assert_eq!(f.n(), 3, "two undos from n=5 must land on n=3");

    f.step(99);

    assert_eq!(f.timeline.speculative_len(), 4);
    assert_eq!(f.timeline.cursor(), 4);
    assert_eq!(f.speculative_events(), vec![0, 1, 2, 99]);
    assert_eq!(
        f.timeline.offset_at(3),
        Some(branch_offset),
        "the new branch must start where the discarded entry 3 started"
    );
    assert_eq!(f.file_events(), vec![0, 1, 2, 99], "file must hold the new branch only");

    let new_line = LogRecord::new("n-3", 99u32).to_line().unwrap();
    assert_eq!(f.file_len(), branch_offset + new_line.len() as u64);
    assert_eq!(f.timeline.log_len(), f.file_len());
}

/// Commit promotes exactly `[0, cursor)` and keeps the rest for redo.
#[test]
fn commit_promotes_applied_prefix() {
    let mut f = Fixture::speculative();
    for event in 0..5 {
        f.step(event);
    }
    f.undo();
    f.undo();
    assert_eq!(f.timeline.cursor(), 3);

    let promoted: Vec<u32> = f.timeline.commit().unwrap().into_iter().map(|r| r.event).collect();

    assert_eq!(promoted, vec![0, 1, 2]);
    assert_eq!(f.timeline.cursor(), 0);
    assert_eq!(f.timeline.speculative_len(), 2);
    assert_eq!(f.speculative_events(), vec![3, 4]);
    assert_eq!(f.timeline.committed_len(), 3);
    assert_eq!(f.timeline.last_committed_marker(), Some("n-2"));
    assert_eq!(f.file_events(), vec![0, 1, 2, 3, 4], "commit writes nothing new");
}

/// N appends, N undos, N redos walk the state down to the start and back.
#[test]
fn undo_redo_walk_the_history() {
    let mut f = Fixture::speculative();
    for event in 0..4 {
        f.step(event);
    }
    assert_eq!(f.n(), 4);

    let mut seen = Vec::new();
    while f.undo() {
        seen.push(f.n());
    }
    assert_eq!(seen, vec![3, 2, 1, 0]);
    assert!(!f.undo(), "undo at cursor 0 is a no-op");
    assert_eq!(f.timeline.cursor(), 0);

    let mut seen = Vec::new();
    while f.redo() {
        seen.push(f.n());
    }
    assert_eq!(seen, vec![1, 2, 3], "redo reaches the pre-state of the final entry");
    assert_eq!(f.timeline.cursor(), 3);

    let last = f.timeline.reapply_last().map(|r| r.event);
    assert_eq!(last, Some(3), "the final entry is handed back for re-application");
    assert_eq!(f.timeline.cursor(), 4);
    assert!(f.timeline.reapply_last().is_none());
}

/// Undo and redo on an empty buffer do nothing.
#[test]
fn undo_and_redo_on_empty_buffer_are_noops() {
    let mut f = Fixture::speculative();
    assert!(!f.undo());
    assert!(!f.redo());
    assert!(f.timeline.reapply_last().is_none());
    assert_eq!(f.timeline.cursor(), 0);
}

/// Committed appends go straight to the log with no snapshot.
#[test]
fn committed_appends_are_durable_immediately() {
    let mut f = Fixture::new();
    f.timeline.append_committed(LogRecord::new("a", 1)).unwrap();
    f.timeline.append_committed(LogRecord::new("b", 2)).unwrap();

    assert_eq!(f.timeline.committed_len(), 2);
    assert_eq!(f.timeline.committed_offset_at(0), Some(0));
    assert_eq!(f.file_events(), vec![1, 2]);
    assert_eq!(f.timeline.log_len(), f.file_len());
    assert_eq!(f.timeline.last_committed_marker(), Some("b"));
}

/// Leaving speculative mode with only redo entries left drops them from disk.
#[test]
fn leaving_speculative_mode_discards_redo_tail() {
    let mut f = Fixture::new();
    f.timeline.append_committed(LogRecord::new("c", 7)).unwrap();
    let committed_bytes = f.timeline.log_len();

    f.timeline.set_mode(Mode::Speculative).unwrap();
    for event in 0..3 {
        f.step(event);
    }
    while f.undo() {}

    assert_eq!(f.timeline.try_toggle_mode().unwrap(), Mode::Committed);
    assert_eq!(f.timeline.speculative_len(), 0);
    assert_eq!(f.timeline.log_len(), committed_bytes);
    assert_eq!(f.file_events(), vec![7]);
}

/// Toggling out of speculative mode with applied entries is refused.
#[test]
fn toggle_is_refused_while_entries_are_applied() {
    let mut f = Fixture::speculative();
    f.step(1);
    assert_eq!(f.timeline.try_toggle_mode().unwrap(), Mode::Speculative);
    assert_eq!(f.timeline.speculative_len(), 1);
    assert_eq!(f.timeline.cursor(), 1);
}

/// Entering speculative mode is always allowed.
#[test]
fn entering_speculative_mode_is_always_legal() {
    let mut f = Fixture::new();
    assert_eq!(f.timeline.mode(), Mode::Committed);
    assert_eq!(f.timeline.try_toggle_mode().unwrap(), Mode::Speculative);
    f.timeline.set_mode(Mode::Speculative).unwrap();
    assert_eq!(f.timeline.mode(), Mode::Speculative);
}

/// A save holds the committed records then the applied speculative ones.
#[test]
fn save_writes_committed_then_applied_entries() {
    let mut f = Fixture::new();
    f.timeline.append_committed(LogRecord::new("c0", 10)).unwrap();
    f.timeline.set_mode(Mode::Speculative).unwrap();
    for event in 0..4 {
        f.step(event);
    }
    f.undo();

    let path = f.dir.join("saved.jsonl");
    f.timeline.save_to(&path).unwrap();

    let saved: Vec<u32> = store::read_lines(&path)
        .unwrap()
        .iter()
        .map(|line| LogRecord::<u32>::from_line(line).unwrap().event)
        .collect();
    assert_eq!(saved, vec![10, 0, 1, 2]);

    let live = std::fs::read(f.timeline.log_path()).unwrap();
    let copy = std::fs::read(&path).unwrap();
    assert!(live.starts_with(&copy), "saved bytes must be copied verbatim from the log");
}

#[test]
#[should_panic(expected = "commit() called with nothing applied")]
fn commit_with_nothing_applied_panics() {
    let mut f = Fixture::speculative();
    f.step(1);
    f.undo();
    let _ = f.timeline.commit();
}

#[test]
#[should_panic(expected = "append_speculative() called in committed mode")]
fn speculative_append_in_committed_mode_panics() {
    let mut f = Fixture::new();
    let root = f.root.clone();
    let _ = f.timeline.append_speculative(&root, LogRecord::new("x", 1));
}

#[test]
#[should_panic(expected = "append_committed() called in speculative mode")]
fn committed_append_in_speculative_mode_panics() {
    let mut f = Fixture::speculative();
    let _ = f.timeline.append_committed(LogRecord::new("x", 1));
}

#[test]
#[should_panic(expected = "uncommitted entries")]
fn forcing_committed_mode_with_applied_entries_panics() {
    let mut f = Fixture::speculative();
    f.step(1);
    let _ = f.timeline.set_mode(Mode::Committed);
}

/// Every write to `/dev/full` fails with ENOSPC.
#[cfg(target_os = "linux")]
fn full_device_timeline() -> Option<Timeline<u32>> {
    let _ = env_logger::builder().is_test(true).try_init();
    let device = Path::new("/dev/full");
    if !device.exists() {
        return None;
    }
    let log = EventLog::create(device).unwrap();
    Some(Timeline::new(log, SnapshotEngine::default()))
}

#[cfg(target_os = "linux")]
#[test]
fn failed_committed_write_leaves_buffers_untouched() {
    let Some(mut timeline) = full_device_timeline() else { return };
    let err = timeline.append_committed(LogRecord::new("n-0", 1)).unwrap_err();
    assert!(err.to_string().starts_with("Log I/O error"), "got: {err}");
    assert_eq!(timeline.committed_len(), 0, "nothing is recorded for an unwritten line");
    assert_eq!(timeline.log_len(), 0, "the next record still starts at zero");
    assert_eq!(timeline.last_committed_marker(), None);
}

#[cfg(target_os = "linux")]
#[test]
fn failed_speculative_write_leaves_buffers_untouched() {
    let Some(mut timeline) = full_device_timeline() else { return };
    timeline.set_mode(Mode::Speculative).unwrap();
    let root = Value::object(Record::new("Counter").with("n", Value::Int(0)));

    assert!(timeline.append_speculative(&root, LogRecord::new("n-0", 1)).is_err());
    assert_eq!(timeline.speculative_len(), 0);
    assert_eq!(timeline.cursor(), 0);
    assert_eq!(timeline.log_len(), 0);
    assert!(timeline.undo().is_none(), "no snapshot was kept for the failed entry");
}

/// Events keyed by byte strings only serialize while the map is empty.
type Keyed = BTreeMap<Vec<u8>, u32>;

/// A record that cannot be written at a branch point must not discard the
/// redo tail in memory or on disk.
#[test]
fn failed_branch_append_keeps_redo_tail() {
    let _ = env_logger::builder().is_test(true).try_init();
    let dir = temp_dir();
    let log = EventLog::create(&dir.join("live.jsonl")).unwrap();
    let mut timeline: Timeline<Keyed> = Timeline::new(log, SnapshotEngine::default());
    timeline.set_mode(Mode::Speculative).unwrap();
    let root = Value::object(Record::new("Counter").with("n", Value::Int(0)));

    for n in 0..3 {
        timeline.append_speculative(&root, LogRecord::new(format!("n-{n}"), Keyed::new())).unwrap();
    }
    timeline.undo().unwrap();
    let bytes = std::fs::read(timeline.log_path()).unwrap();
    let log_len = timeline.log_len();

    let unwritable = Keyed::from([(vec![1u8], 7)]);
    let err = timeline.append_speculative(&root, LogRecord::new("n-2", unwritable)).unwrap_err();
    assert!(err.to_string().starts_with("Serialization error"), "got: {err}");

    assert_eq!(timeline.speculative_len(), 3, "the redo tail is still buffered");
    assert_eq!(timeline.cursor(), 2);
    assert_eq!(timeline.log_len(), log_len);
    assert_eq!(std::fs::read(timeline.log_path()).unwrap(), bytes, "the file is untouched");
    let last = timeline.reapply_last().map(|r| r.marker.clone());
    assert_eq!(last.as_deref(), Some("n-2"), "the undone entry can still be redone");
}
