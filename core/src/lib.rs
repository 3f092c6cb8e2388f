//! rewind-core: snapshot capture/restore of a live simulation graph and the
//! branching undo/redo timeline built on top of a durable input log.
//!
//! Layering, bottom-up:
//!   live, classify → snapshot → event, store → timeline → replay → session

pub mod arena;
pub mod classify;
pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod event;
pub mod live;
pub mod replay;
pub mod rng;
pub mod session;
pub mod simulation;
pub mod snapshot;
pub mod store;
pub mod timeline;
pub mod types;
