//! Playback clock — owns the tick rate, the speed dial, and pause.

use serde::{Deserialize, Serialize};

/// Ticks per second at speed 1.0.
pub const BASE_TICK_RATE: f64 = 60.0;
pub const DEFAULT_SPEED: f64 = 1.5;
pub const MIN_SPEED: f64 = 0.1;
pub const MAX_SPEED: f64 = 100.0;

/// Preset speeds the driver steps through.
pub const SPEED_DIAL: [f64; 8] = [0.1, 0.2, 0.5, 1.0, 1.5, 2.0, 4.0, 10.0];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybackClock {
    pub base_rate: f64,
    pub speed:     f64,
    pub paused:    bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new(BASE_TICK_RATE, DEFAULT_SPEED)
    }
}

impl PlaybackClock {
    pub fn new(base_rate: f64, speed: f64) -> Self {
        let mut clock = Self { base_rate, speed: DEFAULT_SPEED, paused: false };
        clock.set_speed(speed);
        clock
    }

    pub fn pause(&mut self)  { self.paused = true;  }
    pub fn resume(&mut self) { self.paused = false; }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            DEFAULT_SPEED
        };
    }

    /// Move `delta` notches along the dial from the nearest preset.
    pub fn step_dial(&mut self, delta: i32) -> f64 {
        let nearest = SPEED_DIAL
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (*a - self.speed).abs().total_cmp(&(*b - self.speed).abs())
            })
            .map(|(i, _)| i as i32)
            .unwrap_or(0);
        let index = nearest.saturating_add(delta).clamp(0, SPEED_DIAL.len() as i32 - 1);
        self.speed = SPEED_DIAL[index as usize];
        self.speed
    }

    /// Effective tick rate. Zero while paused.
    pub fn ticks_per_second(&self) -> f64 {
        if self.paused {
            0.0
        } else {
            self.base_rate * self.speed
        }
    }
}
