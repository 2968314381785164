//! Core IR types for the pulseroll sequencer.
//!
//! This crate defines the note and song model consumed by the playback
//! engine, plus the implicit interval tree used to find the notes that
//! sound at a given tick.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod interval;
mod note;
pub mod song;

pub use interval::{find_overlapping, index, Interval, MAX_QUERY_DEPTH};
pub use note::{Note, NoteId, Tick};
pub use song::{Song, DEFAULT_BPM, DEFAULT_PATTERN_DURATION, DEFAULT_PPQN};
