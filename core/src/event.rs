//! The durable log record.
//!
//! RULE: one record per line, newline-terminated JSON. Records are only
//! ever appended, or cut off by truncating back to a recorded offset.

use crate::error::RewindResult;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// One applied input event as persisted to the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord<E> {
    /// The simulation's progress indicator when the event was applied.
    /// Used to resynchronise a replay against the live log.
    pub marker: String,
    pub event:  E,
}

impl<E> LogRecord<E> {
    pub fn new(marker: impl Into<String>, event: E) -> Self {
        Self { marker: marker.into(), event }
    }
}

impl<E: Serialize> LogRecord<E> {
    /// Serialized form including the trailing newline.
    pub fn to_line(&self) -> RewindResult<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }
}

impl<E: DeserializeOwned> LogRecord<E> {
    pub fn from_line(line: &[u8]) -> RewindResult<Self> {
        Ok(serde_json::from_slice(line)?)
    }
}
