//! # cardfx
//!
//! Serialized visual feedback for a multiplayer card game client.
//!
//! Game events arrive asynchronously; the [`sequencer::Sequencer`] plays
//! them strictly one at a time, in arrival order, through a pluggable
//! [`playback::PlaybackBackend`]. State snapshots are queued as
//! zero-duration events so they land exactly between the effects around
//! them.

pub mod config;
pub mod error;
pub mod event;
pub mod model;
pub mod playback;
pub mod producer;
pub mod sequencer;
pub mod telemetry;
