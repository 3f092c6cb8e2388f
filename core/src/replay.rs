//! Replay ingestion and pacing.
//!
//! A replay is a saved log read back in full and applied one record per
//! simulation step through the normal committed path. No snapshots are
//! read or written here.

use crate::{error::RewindResult, event::LogRecord, store};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::VecDeque, path::Path, time::Instant};

/// Read every record of a saved log. When `last_marker` is given, records
/// up to and including the first one carrying it are skipped, so the
/// replay continues from where the live log left off.
pub fn load_replay<E: DeserializeOwned>(
    path: &Path,
    last_marker: Option<&str>,
) -> RewindResult<VecDeque<LogRecord<E>>> {
    let mut records = VecDeque::new();
    for line in store::read_lines(path)? {
        records.push_back(LogRecord::from_line(&line)?);
    }
    let total = records.len();

    if let Some(marker) = last_marker {
        while let Some(record) = records.pop_front() {
            if record.marker == marker {
                break;
            }
        }
        if records.is_empty() {
            log::warn!(
                "replay {}: nothing left after resync on marker '{marker}'",
                path.display()
            );
        }
    }

    log::info!(
        "loaded replay {} ({} of {total} records pending)",
        path.display(),
        records.len()
    );
    Ok(records)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pace {
    /// Release records at the playback tick rate.
    Realtime,
    /// Apply everything as fast as possible.
    Direct,
}

#[derive(Debug)]
pub struct ReplayQueue<E> {
    pending:    VecDeque<LogRecord<E>>,
    pace:       Pace,
    last_frame: Option<Instant>,
}

impl<E> Default for ReplayQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> ReplayQueue<E> {
    pub fn new() -> Self {
        Self { pending: VecDeque::new(), pace: Pace::Realtime, last_frame: None }
    }

    pub fn start(&mut self, records: VecDeque<LogRecord<E>>, pace: Pace) {
        self.pending = records;
        self.pace = pace;
        self.last_frame = None;
    }

    pub fn stop(&mut self) {
        if !self.pending.is_empty() {
            log::info!("replay stopped with {} records pending", self.pending.len());
        }
        self.pending.clear();
        self.last_frame = None;
    }

    pub fn is_active(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.pending.len()
    }

    pub fn pace(&self) -> Pace {
        self.pace
    }

    /// How many records this driver frame should apply.
    /// Realtime releases `ceil(elapsed * ticks_per_second)`, one on the first
    /// frame; Direct releases everything.
    pub fn due(&mut self, now: Instant, ticks_per_second: f64) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        match self.pace {
            Pace::Direct => {
                self.last_frame = None;
                self.pending.len()
            }
            Pace::Realtime => {
                let lag = match self.last_frame {
                    Some(last) => {
                        let elapsed = now.saturating_duration_since(last).as_secs_f64();
                        (elapsed * ticks_per_second).ceil() as usize
                    }
                    None => 1,
                };
                self.last_frame = Some(now);
                lag.min(self.pending.len())
            }
        }
    }

    pub fn pop(&mut self) -> Option<LogRecord<E>> {
        self.pending.pop_front()
    }
}
