//! Playback engine for the pulseroll sequencer.
//!
//! Turns a song's notes into audio: a tick scheduler that keeps a dense pool
//! of voices in step with the interval index, plus the oscillator and
//! envelope each voice renders with.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod frame;
mod frequency;
pub mod identity_map;
pub mod scheduler;
mod voice;

pub use frame::Frame;
pub use frequency::{phase_increment, pitch_to_frequency};
pub use identity_map::IdentityMap;
pub use scheduler::{Scheduler, Transport, VOICE_CAPACITY};
pub use voice::{oscillator, PreviewVoice, Voice, MASTER_GAIN};
