//! The session — one explicitly constructed controller per running simulation.
//!
//! A session owns the simulation, the timeline, the replay queue, the
//! playback clock and the forwarding sink. Every operation takes `&mut self`,
//! so stepping, capturing and restoring can never interleave on the graph.
//! Other threads talk to a session by message passing only.
//!
//! STEP ORDER (fixed):
//!   1. Stamp the record with the simulation's resume marker.
//!   2. Log the record. Speculative steps capture the pre-state first.
//!   3. Apply the event to the simulation.
//!   4. Committed only: forward the record to the sink.

use crate::{
    clock::PlaybackClock,
    config::RewindConfig,
    error::RewindResult,
    event::LogRecord,
    live::Value,
    replay::{self, Pace, ReplayQueue},
    simulation::{EventSink, Simulation},
    snapshot::SnapshotEngine,
    store::{self, EventLog, ReplayFile, LOG_EXTENSION},
    timeline::{Mode, Timeline},
    types::RunId,
};
use serde::Serialize;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};

pub struct Session<S: Simulation> {
    pub run_id: RunId,
    sim:        S,
    timeline:   Timeline<S::Event>,
    replay:     ReplayQueue<S::Event>,
    clock:      PlaybackClock,
    sink:       Box<dyn EventSink<S::Event>>,
    save_dir:   PathBuf,
}

/// What a driver shows after each command.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStatus {
    pub run_id:         RunId,
    pub simulation:     &'static str,
    pub marker:         String,
    pub mode:           Mode,
    pub committed:      usize,
    pub cursor:         usize,
    pub speculative:    usize,
    pub replay_pending: usize,
    pub speed:          f64,
    pub paused:         bool,
    pub log_bytes:      u64,
}

impl<S: Simulation> Session<S> {
    /// Open a fresh autosave log under the configured save directory and
    /// wire everything together.
    pub fn new(
        sim: S,
        config: &RewindConfig,
        sink: Box<dyn EventSink<S::Event>>,
    ) -> RewindResult<Self> {
        let mut classifier = sim.classifier();
        classifier.extend(&config.classifier);

        let log = EventLog::create(&store::autosave_path(&config.save_dir))?;
        let run_id = uuid::Uuid::new_v4().to_string();
        log::info!("session {run_id} started for '{}'", sim.name());

        Ok(Self {
            run_id,
            sim,
            timeline: Timeline::new(log, SnapshotEngine::new(classifier)),
            replay:   ReplayQueue::new(),
            clock:    PlaybackClock::new(config.tick_rate, config.speed),
            sink,
            save_dir: config.save_dir.clone(),
        })
    }

    pub fn simulation(&self) -> &S {
        &self.sim
    }

    pub fn timeline(&self) -> &Timeline<S::Event> {
        &self.timeline
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut PlaybackClock {
        &mut self.clock
    }

    pub fn mode(&self) -> Mode {
        self.timeline.mode()
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    /// Log and apply one input event. In committed mode the record is
    /// forwarded only after it has been applied, so a forwarding error
    /// leaves the log and the simulation in agreement.
    pub fn step(&mut self, event: S::Event) -> RewindResult<()> {
        let record = LogRecord::new(self.sim.resume_marker(), event);
        log::debug!("step at {}: {:?}", record.marker, record.event);
        match self.timeline.mode() {
            Mode::Speculative => {
                let root = Value::Object(self.sim.root());
                self.timeline.append_speculative(&root, record.clone())?;
                self.sim.step(&record.event)
            }
            Mode::Committed => {
                self.timeline.append_committed(record.clone())?;
                self.sim.step(&record.event)?;
                self.sink.forward(&record)
            }
        }
    }

    /// Step back to the nearest settled state. Returns false when there was
    /// nothing to undo.
    pub fn undo(&mut self) -> RewindResult<bool> {
        let root = self.sim.root();
        let mut moved = false;
        while let Some(snapshot) = self.timeline.undo() {
            snapshot.restore_into(&root)?;
            moved = true;
            if self.sim.is_settled() {
                break;
            }
        }
        Ok(moved)
    }

    /// Step forward to the nearest settled state. The final entry has no
    /// snapshot after it, so it is reached by applying its event again.
    pub fn redo(&mut self) -> RewindResult<bool> {
        let root = self.sim.root();
        let mut moved = false;
        loop {
            if let Some(snapshot) = self.timeline.redo() {
                snapshot.restore_into(&root)?;
            } else if let Some(record) = self.timeline.reapply_last() {
                let event = record.event.clone();
                self.sim.step(&event)?;
            } else {
                break;
            }
            moved = true;
            if self.sim.is_settled() {
                break;
            }
        }
        Ok(moved)
    }

    /// Promote the applied speculative entries and forward them.
    /// Returns how many were committed.
    pub fn commit(&mut self) -> RewindResult<usize> {
        if self.timeline.cursor() == 0 {
            return Ok(0);
        }
        let records = self.timeline.commit()?;
        for record in &records {
            self.sink.forward(record)?;
        }
        Ok(records.len())
    }

    pub fn toggle_mode(&mut self) -> RewindResult<Mode> {
        self.timeline.try_toggle_mode()
    }

    /// Write committed plus applied speculative records to a new save file.
    pub fn save(&self, label: &str) -> RewindResult<PathBuf> {
        let path = store::save_path(&self.save_dir, label);
        self.timeline.save_to(&path)?;
        Ok(path)
    }

    /// Saved logs available for replay, excluding the live one.
    pub fn replays(&self) -> RewindResult<Vec<ReplayFile>> {
        store::list_replays(&self.save_dir, Some(self.timeline.log_path()))
    }

    pub fn replay_path(&self, name: &str) -> PathBuf {
        self.save_dir.join(format!("{name}.{LOG_EXTENSION}"))
    }

    /// Queue a saved log for replay. Refused while speculative or while a
    /// replay is already pending. Returns whether anything was queued.
    pub fn start_replay(&mut self, path: &Path, pace: Pace) -> RewindResult<bool> {
        if self.replay.is_active() {
            log::info!("replay refused: another replay is pending");
            return Ok(false);
        }
        if self.timeline.mode() == Mode::Speculative {
            log::info!("replay refused: session is speculative");
            return Ok(false);
        }
        let records = replay::load_replay(path, self.timeline.last_committed_marker())?;
        let queued = !records.is_empty();
        self.replay.start(records, pace);
        Ok(queued)
    }

    pub fn stop_replay(&mut self) {
        self.replay.stop();
    }

    pub fn replay_pending(&self) -> usize {
        self.replay.remaining()
    }

    /// Apply the replay records due at `now`. Returns how many were applied.
    pub fn pump_replay(&mut self, now: Instant) -> RewindResult<usize> {
        if self.clock.paused {
            return Ok(0);
        }
        let due = self.replay.due(now, self.clock.ticks_per_second());
        let mut applied = 0;
        while applied < due {
            let Some(record) = self.replay.pop() else { break };
            self.step(record.event)?;
            applied += 1;
        }
        if applied > 0 && !self.replay.is_active() {
            log::info!("replay finished at {}", self.sim.resume_marker());
        }
        Ok(applied)
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            run_id:         self.run_id.clone(),
            simulation:     self.sim.name(),
            marker:         self.sim.resume_marker(),
            mode:           self.timeline.mode(),
            committed:      self.timeline.committed_len(),
            cursor:         self.timeline.cursor(),
            speculative:    self.timeline.speculative_len(),
            replay_pending: self.replay.remaining(),
            speed:          self.clock.speed,
            paused:         self.clock.paused,
            log_bytes:      self.timeline.log_len(),
        }
    }

    /// Flush the live log and end the session.
    pub fn close(mut self) -> RewindResult<()> {
        self.timeline.flush()?;
        log::info!(
            "session {} closed: {} committed, {} speculative",
            self.run_id,
            self.timeline.committed_len(),
            self.timeline.speculative_len()
        );
        Ok(())
    }
}
