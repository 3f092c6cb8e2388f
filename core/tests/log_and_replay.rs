//! Durable log files, save listings, replay resync and pacing.

use rewind_core::{
    event::LogRecord,
    replay::{load_replay, Pace, ReplayQueue},
    store::{self, EventLog},
};
use std::{
    collections::VecDeque,
    fs::File,
    path::{Path, PathBuf},
    time::{Duration, Instant, SystemTime},
};

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rewind-log-{}", uuid::Uuid::new_v4()))
}

fn write_records(path: &Path, markers: &[&str]) {
    let lines: Vec<Vec<u8>> = markers
        .iter()
        .enumerate()
        .map(|(i, m)| LogRecord::new(*m, i as u32).to_line().unwrap())
        .collect();
    store::write_lines(path, lines.iter().map(|l| l.as_slice())).unwrap();
}

fn set_modified(path: &Path, secs: u64) {
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// Appends return the offset each record starts at; truncation cuts back to one.
#[test]
fn append_returns_offsets_and_truncate_cuts_back() {
    let dir = temp_dir();
    let path = dir.join("nested").join("live.jsonl");
    let mut log = EventLog::create(&path).unwrap();
    assert!(log.is_empty());

    assert_eq!(log.append(b"a\n").unwrap(), 0);
    assert_eq!(log.append(b"bb\n").unwrap(), 2);
    assert_eq!(log.append(b"ccc\n").unwrap(), 5);
    assert_eq!(log.len(), 9);

    log.truncate(2).unwrap();
    assert_eq!(log.len(), 2);
    assert_eq!(std::fs::read(&path).unwrap(), b"a\n");

    assert_eq!(log.append(b"z\n").unwrap(), 2, "appends continue from the cut");
    assert_eq!(std::fs::read(&path).unwrap(), b"a\nz\n");
}

#[test]
#[should_panic(expected = "past end of log")]
fn truncating_past_the_end_panics() {
    let dir = temp_dir();
    let mut log = EventLog::create(&dir.join("live.jsonl")).unwrap();
    log.append(b"a\n").unwrap();
    let _ = log.truncate(10);
}

/// Empty lines are skipped when reading a log back.
#[test]
fn read_lines_skips_blank_lines() {
    let dir = temp_dir();
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("log.jsonl");
    std::fs::write(&path, b"one\n\ntwo\r\n").unwrap();
    assert_eq!(
        store::read_lines(&path).unwrap(),
        vec![b"one".to_vec(), b"two".to_vec()]
    );
}

/// Save files are named `<label>.<timestamp>.jsonl`, or just the timestamp.
#[test]
fn save_paths_follow_the_naming_scheme() {
    let dir = PathBuf::from("saves");

    let named = store::save_path(&dir, " boss-run ");
    let name = named.file_name().unwrap().to_str().unwrap().to_string();
    assert!(name.starts_with("boss-run."), "got {name}");
    assert!(name.ends_with(".jsonl"), "got {name}");

    let unnamed = store::save_path(&dir, "");
    let stem = unnamed.file_stem().unwrap().to_str().unwrap().to_string();
    let parts: Vec<&str> = stem.split('-').collect();
    assert_eq!(parts.len(), 5, "timestamp is day-hour-minute-second-micros, got {stem}");
    assert_eq!(parts[4].len(), 6, "microseconds are zero padded, got {stem}");

    let autosave = store::autosave_path(&dir);
    assert_eq!(autosave.parent().unwrap(), dir.join("autosave"));
}

/// Listing puts explicit saves first, newest first, and skips the live log.
#[test]
fn replay_listing_orders_saves_before_autosaves() {
    let dir = temp_dir();
    let live = dir.join("autosave").join("live.jsonl");
    let old_auto = dir.join("autosave").join("old.jsonl");
    let alpha = dir.join("alpha.jsonl");
    let beta = dir.join("beta.jsonl");

    write_records(&live, &["x"]);
    write_records(&old_auto, &["a", "b", "c"]);
    write_records(&alpha, &["a"]);
    write_records(&beta, &["a", "b"]);
    std::fs::write(dir.join("notes.txt"), b"not a log").unwrap();

    set_modified(&old_auto, 5_000);
    set_modified(&alpha, 1_000);
    set_modified(&beta, 2_000);

    let listed = store::list_replays(&dir, Some(&live)).unwrap();
    let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["beta", "alpha", "autosave/old"]);

    let records: Vec<usize> = listed.iter().map(|r| r.records).collect();
    assert_eq!(records, vec![2, 1, 3]);
    assert!(listed[2].is_autosave());
}

/// A missing save directory simply has no replays.
#[test]
fn listing_a_missing_directory_is_empty() {
    let listed = store::list_replays(&temp_dir(), None).unwrap();
    assert!(listed.is_empty());
}

/// Replays resync past the live log's last committed marker.
#[test]
fn load_replay_skips_through_last_marker() {
    let dir = temp_dir();
    let path = dir.join("run.jsonl");
    write_records(&path, &["tick-0", "tick-1", "tick-2", "tick-3", "tick-4"]);

    let all: VecDeque<LogRecord<u32>> = load_replay(&path, None).unwrap();
    assert_eq!(all.len(), 5);

    let rest: VecDeque<LogRecord<u32>> = load_replay(&path, Some("tick-2")).unwrap();
    let markers: Vec<&str> = rest.iter().map(|r| r.marker.as_str()).collect();
    assert_eq!(markers, vec!["tick-3", "tick-4"]);
    assert_eq!(rest[0].event, 3);

    let none: VecDeque<LogRecord<u32>> = load_replay(&path, Some("tick-9")).unwrap();
    assert!(none.is_empty(), "an unknown marker leaves nothing to replay");
}

fn queue(n: u32, pace: Pace) -> ReplayQueue<u32> {
    let mut queue = ReplayQueue::new();
    queue.start((0..n).map(|i| LogRecord::new(format!("m{i}"), i)).collect(), pace);
    queue
}

/// Realtime pacing releases one record first, then ceil(elapsed * rate).
#[test]
fn realtime_pace_follows_elapsed_time() {
    let mut q = queue(20, Pace::Realtime);
    let t0 = Instant::now();

    assert_eq!(q.due(t0, 10.0), 1, "first frame releases exactly one record");
    assert_eq!(q.pop().map(|r| r.event), Some(0));

    assert_eq!(q.due(t0 + Duration::from_millis(500), 10.0), 5);
    assert_eq!(q.due(t0 + Duration::from_millis(750), 8.0), 2);
    assert_eq!(q.due(t0 + Duration::from_millis(875), 4.0), 1, "partial ticks round up");
    assert_eq!(q.due(t0 + Duration::from_secs(60), 10.0), 19, "never more than pending");
}

/// Direct pacing releases everything; stopping clears the queue.
#[test]
fn direct_pace_drains_and_stop_clears() {
    let mut q = queue(7, Pace::Direct);
    assert!(q.is_active());
    assert_eq!(q.due(Instant::now(), 60.0), 7);

    q.pop();
    q.stop();
    assert!(!q.is_active());
    assert_eq!(q.remaining(), 0);
    assert_eq!(q.due(Instant::now(), 60.0), 0);
}
