use crate::replay::Pace;
use serde::{Deserialize, Serialize};

/// Everything a driver can ask of a session.
/// `E` is the simulation's input event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum ControlCommand<E> {
    // ── Stepping ──────────────────────────────────
    Step { event: E },

    // ── Timeline ──────────────────────────────────
    Undo,
    Redo,
    Commit,
    ToggleMode,

    // ── Saves and replays ─────────────────────────
    Save { #[serde(default)] label: String },
    ListReplays,
    /// `name` is relative to the save directory, without extension.
    Replay { name: String, pace: Pace },
    StopReplay,

    // ── Clock control ─────────────────────────────
    SetSpeed { speed: f64 },
    SpeedStep { delta: i32 },
    Pause,
    Resume,

    // ── Driver ────────────────────────────────────
    Status,
    Quit,
}
