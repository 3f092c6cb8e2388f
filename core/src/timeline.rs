//! Timeline controller — the committed log, the speculative buffer and the cursor.
//!
//! States per logged position:
//!   Committed    durable, already forwarded, never reversed
//!   Speculative  durable but provisional; each entry keeps the snapshot
//!                taken *before* its event was applied
//!
//! `cursor` splits the speculative buffer into applied entries `[0, cursor)`
//! and entries available to redo `[cursor, len)`.
//!
//! RULES:
//!   - Every record reaches the durable log when it is appended, in both modes.
//!   - Appending behind the end of the buffer starts a new branch: the whole
//!     redo tail is dropped from memory and cut from the file.
//!   - A failed write leaves the in-memory buffers exactly as they were.
//!   - Sequencing violations are programming errors and panic.

use crate::{
    error::RewindResult,
    event::LogRecord,
    live::Value,
    snapshot::{Snapshot, SnapshotEngine},
    store::{self, EventLog},
};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Every step goes straight to the committed log.
    Committed,
    /// Every step is captured first and can be undone until committed.
    Speculative,
}

struct CommittedEntry<E> {
    offset: u64,
    line:   Vec<u8>,
    record: LogRecord<E>,
}

struct SpeculativeEntry<E> {
    offset:   u64,
    line:     Vec<u8>,
    snapshot: Snapshot,
    record:   LogRecord<E>,
}

pub struct Timeline<E> {
    log:         EventLog,
    engine:      SnapshotEngine,
    mode:        Mode,
    committed:   Vec<CommittedEntry<E>>,
    speculative: Vec<SpeculativeEntry<E>>,
    cursor:      usize,
}

impl<E> Timeline<E> {
    pub fn new(log: EventLog, engine: SnapshotEngine) -> Self {
        Self {
            log,
            engine,
            mode:        Mode::Committed,
            committed:   Vec::new(),
            speculative: Vec::new(),
            cursor:      0,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn speculative_len(&self) -> usize {
        self.speculative.len()
    }

    pub fn committed_len(&self) -> usize {
        self.committed.len()
    }

    pub fn committed(&self) -> impl Iterator<Item = &LogRecord<E>> {
        self.committed.iter().map(|e| &e.record)
    }

    pub fn speculative(&self) -> impl Iterator<Item = &LogRecord<E>> {
        self.speculative.iter().map(|e| &e.record)
    }

    pub fn last_committed_marker(&self) -> Option<&str> {
        self.committed.last().map(|e| e.record.marker.as_str())
    }

    /// Byte offset at which speculative entry `index` starts in the log.
    pub fn offset_at(&self, index: usize) -> Option<u64> {
        self.speculative.get(index).map(|e| e.offset)
    }

    pub fn committed_offset_at(&self, index: usize) -> Option<u64> {
        self.committed.get(index).map(|e| e.offset)
    }

    pub fn log_len(&self) -> u64 {
        self.log.len()
    }

    pub fn log_path(&self) -> &Path {
        self.log.path()
    }

    pub fn engine(&self) -> &SnapshotEngine {
        &self.engine
    }

    /// Snapshot to restore for one step back. `None` when nothing is applied.
    pub fn undo(&mut self) -> Option<&Snapshot> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        log::debug!("undo → cursor {}/{}", self.cursor, self.speculative.len());
        Some(&self.speculative[self.cursor].snapshot)
    }

    /// Snapshot to restore for one step forward. Only entries that have a
    /// following snapshot can be reached this way; see [`Self::reapply_last`].
    pub fn redo(&mut self) -> Option<&Snapshot> {
        if self.cursor + 1 >= self.speculative.len() {
            return None;
        }
        self.cursor += 1;
        log::debug!("redo → cursor {}/{}", self.cursor, self.speculative.len());
        Some(&self.speculative[self.cursor].snapshot)
    }

    /// Moves the cursor past the final entry and returns its record, which
    /// the caller steps again on top of that entry's pre-state.
    /// `None` unless exactly the final entry is unapplied.
    pub fn reapply_last(&mut self) -> Option<&LogRecord<E>> {
        if self.speculative.is_empty() || self.cursor + 1 != self.speculative.len() {
            return None;
        }
        self.cursor += 1;
        log::debug!("re-applying final entry {}", self.cursor);
        Some(&self.speculative[self.cursor - 1].record)
    }

    /// Switch between committed-only and speculative operation.
    /// Leaving speculative mode requires `cursor == 0` and drops any redo tail.
    pub fn set_mode(&mut self, mode: Mode) -> RewindResult<()> {
        if mode == self.mode {
            return Ok(());
        }
        if mode == Mode::Committed {
            assert!(
                self.cursor == 0,
                "set_mode(Committed) with {} uncommitted entries",
                self.cursor
            );
            if let Some(first) = self.speculative.first() {
                self.log.truncate(first.offset)?;
                log::info!("discarded {} redo entries", self.speculative.len());
            }
            self.speculative.clear();
        }
        self.mode = mode;
        log::info!("timeline mode → {mode:?}");
        Ok(())
    }

    /// Toggle the mode if allowed. Leaving speculative mode with applied
    /// entries outstanding is refused and the mode stays as it is.
    pub fn try_toggle_mode(&mut self) -> RewindResult<Mode> {
        match self.mode {
            Mode::Committed => self.set_mode(Mode::Speculative)?,
            Mode::Speculative if self.cursor == 0 => self.set_mode(Mode::Committed)?,
            Mode::Speculative => {
                log::debug!("mode toggle refused: cursor at {}", self.cursor);
            }
        }
        Ok(self.mode)
    }

    pub fn flush(&mut self) -> RewindResult<()> {
        self.log.sync()
    }

    /// Put the discarded branch back on disk after a failed branch append.
    fn rewrite_tail(&mut self) {
        for entry in &self.speculative[self.cursor..] {
            match self.log.append(&entry.line) {
                Ok(offset) => debug_assert_eq!(offset, entry.offset),
                Err(err) => {
                    log::error!("could not rewrite discarded entry at {}: {err}", entry.offset);
                    return;
                }
            }
        }
        log::warn!("branch append failed, redo tail rewritten to the log");
    }
}

impl<E: Serialize + Clone> Timeline<E> {
    /// Record an event outside speculative mode. No snapshot is taken.
    pub fn append_committed(&mut self, record: LogRecord<E>) -> RewindResult<()> {
        assert!(
            self.mode == Mode::Committed,
            "append_committed() called in speculative mode"
        );
        let line = record.to_line()?;
        let offset = self.log.append(&line)?;
        self.committed.push(CommittedEntry { offset, line, record });
        Ok(())
    }

    /// Capture `root` as the pre-state of `record`, then log the record.
    /// Appending behind the end of the buffer discards the redo tail first.
    pub fn append_speculative(&mut self, root: &Value, record: LogRecord<E>) -> RewindResult<()> {
        assert!(
            self.mode == Mode::Speculative,
            "append_speculative() called in committed mode"
        );
        let snapshot = self.engine.capture(root)?;
        let line = record.to_line()?;

        let offset = if self.cursor < self.speculative.len() {
            let branch_at = self.speculative[self.cursor].offset;
            self.log.truncate(branch_at)?;
            match self.log.append(&line) {
                Ok(offset) => {
                    log::debug!(
                        "branch at {}: dropped {} redo entries",
                        self.cursor,
                        self.speculative.len() - self.cursor
                    );
                    self.speculative.truncate(self.cursor);
                    offset
                }
                Err(err) => {
                    self.rewrite_tail();
                    return Err(err);
                }
            }
        } else {
            self.log.append(&line)?
        };

        self.speculative.push(SpeculativeEntry { offset, line, snapshot, record });
        self.cursor = self.speculative.len();
        Ok(())
    }

    /// Promote the applied entries `[0, cursor)` to the committed log and
    /// return their records in order for forwarding.
    pub fn commit(&mut self) -> RewindResult<Vec<LogRecord<E>>> {
        assert!(self.cursor > 0, "commit() called with nothing applied");
        self.log.sync()?;

        let promoted: Vec<_> = self.speculative.drain(..self.cursor).collect();
        self.cursor = 0;

        let mut records = Vec::with_capacity(promoted.len());
        for entry in promoted {
            records.push(entry.record.clone());
            self.committed.push(CommittedEntry {
                offset: entry.offset,
                line:   entry.line,
                record: entry.record,
            });
        }
        log::info!(
            "committed {} entries ({} total, {} still speculative)",
            records.len(),
            self.committed.len(),
            self.speculative.len()
        );
        Ok(records)
    }

    /// Write the committed lines, then the applied speculative lines, to `path`.
    pub fn save_to(&self, path: &Path) -> RewindResult<()> {
        let lines = self
            .committed
            .iter()
            .map(|e| e.line.as_slice())
            .chain(self.speculative[..self.cursor].iter().map(|e| e.line.as_slice()));
        store::write_lines(path, lines)?;
        log::info!(
            "saved {} records to {}",
            self.committed.len() + self.cursor,
            path.display()
        );
        Ok(())
    }
}
