//! Tick scheduler and block renderer.
//!
//! The host calls [`Scheduler::process_block`] from its audio callback. Each
//! block is cut at tick boundaries; at the start of every tick the scheduler
//! asks the song's interval index which notes cover the tick and reconciles
//! the answer against the active voices:
//!
//! - a note with no voice gets one (note-on),
//! - a voice whose note changed length is retriggered,
//! - voices whose note has ended, or that the query no longer reports, are
//!   swap-removed.
//!
//! Voices live densely in a `Vec`; the [`IdentityMap`] maps each note id to
//! its voice's slot and is patched on every swap. Nothing here allocates
//! once the voice array and map have reached their working size.

use alloc::vec::Vec;
use pr_ir::{Song, Tick};

use crate::identity_map::IdentityMap;
use crate::voice::{PreviewVoice, Voice};

/// Voices reserved up front so note-on does not reallocate during playback.
pub const VOICE_CAPACITY: usize = 256;

/// Transport state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Transport {
    /// Tick 0, no voices.
    #[default]
    Stopped,
    /// Ticks advance and voices sound.
    Playing,
    /// Position and voices frozen in place.
    Paused,
}

/// Real-time note scheduler for one song.
pub struct Scheduler {
    /// The song being played
    song: Song,
    /// Output sample rate
    sample_rate: u32,
    /// Samples per tick at the song's tempo
    samples_per_tick: u32,
    /// Sounding voices, densely packed
    voices: Vec<Voice>,
    /// Note id -> slot in `voices`
    ids: IdentityMap,
    /// Key-press audition voice, independent of the pool
    preview: PreviewVoice,
    /// Current tick, wraps at the song's pattern duration
    tick: Tick,
    /// Samples left in the current tick. Zero means the tick has not started
    /// yet and will be reconciled before anything is rendered.
    countdown: u32,
    /// Transport state
    state: Transport,
}

impl Scheduler {
    /// Create a stopped scheduler with an empty song.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_song(Song::default(), sample_rate)
    }

    /// Create a stopped scheduler for `song`.
    pub fn with_song(song: Song, sample_rate: u32) -> Self {
        let samples_per_tick = song.samples_per_tick(sample_rate);
        Self {
            song,
            sample_rate,
            samples_per_tick,
            voices: Vec::with_capacity(VOICE_CAPACITY),
            ids: IdentityMap::with_capacity(VOICE_CAPACITY),
            preview: PreviewVoice::new(),
            tick: 0,
            countdown: 0,
            state: Transport::Stopped,
        }
    }

    /// Swap in a new song, returning the previous one.
    ///
    /// Sounding voices carry over and are reconciled against the new notes at
    /// the next tick boundary, so edits take effect without a restart. The
    /// returned song can be dropped off the audio thread.
    pub fn load_song(&mut self, song: Song) -> Song {
        self.samples_per_tick = song.samples_per_tick(self.sample_rate);
        self.countdown = self.countdown.min(self.samples_per_tick);
        let previous = core::mem::replace(&mut self.song, song);
        if self.tick >= self.pattern_duration() {
            self.release_all();
            self.tick = 0;
            self.countdown = 0;
        }
        previous
    }

    // --- Transport ---

    /// Start, or resume from pause.
    pub fn play(&mut self) {
        self.state = Transport::Playing;
    }

    /// Freeze position and voices.
    pub fn pause(&mut self) {
        if self.state == Transport::Playing {
            self.state = Transport::Paused;
        }
    }

    /// Drop every voice and rewind to tick 0. No fade.
    pub fn stop(&mut self) {
        self.release_all();
        self.tick = 0;
        self.countdown = 0;
        self.state = Transport::Stopped;
    }

    /// Jump to `tick`, dropping every voice. Notes covering `tick` restart there.
    pub fn seek(&mut self, tick: Tick) {
        self.release_all();
        self.tick = if tick < self.pattern_duration() { tick } else { 0 };
        self.countdown = 0;
    }

    /// Start the preview tone at `pitch`.
    pub fn play_piano_note(&mut self, pitch: f32) {
        self.preview.start(pitch, self.sample_rate);
    }

    /// Stop the preview tone if it is sounding `pitch`.
    pub fn stop_piano_note(&mut self, pitch: f32) {
        self.preview.stop(pitch);
    }

    // --- Rendering ---

    /// Add `min(out_l.len(), out_r.len())` frames of audio to the output buffers.
    ///
    /// `playhead`, if given, is filled with the fractional tick position at
    /// the start of the block. `time_taken`, if given, receives the
    /// wall-clock milliseconds spent in this call (always 0 without `std`).
    pub fn process_block(
        &mut self,
        out_l: &mut [f32],
        out_r: &mut [f32],
        playhead: Option<&mut [f32]>,
        time_taken: Option<&mut f64>,
    ) {
        #[cfg(feature = "std")]
        let started = std::time::Instant::now();

        let size = out_l.len().min(out_r.len());
        let (out_l, out_r) = (&mut out_l[..size], &mut out_r[..size]);
        let position = self.playhead();

        if self.state == Transport::Playing {
            let mut offset = 0;
            while offset < size {
                if self.countdown == 0 {
                    self.reconcile();
                    self.countdown = self.samples_per_tick;
                }
                let run = (size - offset).min(self.countdown as usize);
                let (left, right) = (&mut out_l[offset..offset + run], &mut out_r[offset..offset + run]);
                for voice in &mut self.voices {
                    voice.render(left, right);
                }
                self.countdown -= run as u32;
                offset += run;
                if self.countdown == 0 {
                    self.advance_tick();
                }
            }
        }

        self.preview.render(out_l, out_r);

        if let Some(playhead) = playhead {
            playhead.fill(position as f32);
        }
        if let Some(elapsed) = time_taken {
            #[cfg(feature = "std")]
            {
                *elapsed = started.elapsed().as_secs_f64() * 1000.0;
            }
            #[cfg(not(feature = "std"))]
            {
                *elapsed = 0.0;
            }
        }
    }

    /// Bring the voice set in line with the notes covering the current tick.
    fn reconcile(&mut self) {
        let Self {
            song,
            voices,
            ids,
            tick,
            sample_rate,
            samples_per_tick,
            ..
        } = self;
        let (tick, sample_rate, samples_per_tick) = (*tick, *sample_rate, *samples_per_tick);

        song.find_overlapping(tick, tick.saturating_add(1), |note, _| {
            let key = note.id.get();
            match ids.get_index_from_key(key) {
                None => {
                    if note.contains(tick) {
                        let slot = voices.len() as u32;
                        voices.push(Voice::start(*note, sample_rate, samples_per_tick));
                        ids.set(key, slot);
                    }
                }
                Some(bucket) => {
                    let voice = &mut voices[ids.get_value_from_index(bucket) as usize];
                    if tick >= note.end {
                        voice.release();
                    } else if voice.note.duration() != note.duration() {
                        voice.retrigger(note, tick, sample_rate, samples_per_tick);
                    }
                    voice.note = *note;
                    voice.visited = true;
                }
            }
        });

        // Also drop voices the query did not report: their note was removed
        // or moved away by an edit since the last tick.
        let mut slot = 0;
        while slot < self.voices.len() {
            let voice = &mut self.voices[slot];
            if !voice.visited || voice.note.end <= tick {
                self.remove_voice(slot);
            } else {
                voice.visited = false;
                slot += 1;
            }
        }

        debug_assert_eq!(self.ids.len(), self.voices.len());
    }

    /// Step to the next tick, wrapping at the end of the loop.
    fn advance_tick(&mut self) {
        self.tick += 1;
        self.sweep_ended();
        if self.tick >= self.pattern_duration() {
            // Every loop pass starts from an empty voice set.
            self.release_all();
            self.tick = 0;
        }
    }

    /// Remove voices whose note ends at or before the current tick.
    fn sweep_ended(&mut self) {
        let mut slot = 0;
        while slot < self.voices.len() {
            if self.voices[slot].note.end <= self.tick {
                self.remove_voice(slot);
            } else {
                slot += 1;
            }
        }
    }

    /// Swap-remove the voice in `slot`, keeping the identity map in step.
    fn remove_voice(&mut self, slot: usize) {
        let removed = self.voices.swap_remove(slot);
        self.ids.remove(removed.note.id.get());
        if let Some(moved) = self.voices.get(slot) {
            self.ids.set(moved.note.id.get(), slot as u32);
        }
    }

    fn release_all(&mut self) {
        self.voices.clear();
        self.ids.clear();
    }

    fn pattern_duration(&self) -> Tick {
        self.song.pattern_duration.max(1)
    }

    // --- Inspection ---

    pub fn song(&self) -> &Song {
        &self.song
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples_per_tick(&self) -> u32 {
        self.samples_per_tick
    }

    pub fn state(&self) -> Transport {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == Transport::Playing
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    /// Samples left in the current tick (0 before the tick has started).
    pub fn countdown(&self) -> u32 {
        self.countdown
    }

    /// Fractional tick position.
    pub fn playhead(&self) -> f64 {
        if self.countdown == 0 {
            return self.tick as f64;
        }
        let consumed = self.samples_per_tick - self.countdown;
        self.tick as f64 + consumed as f64 / self.samples_per_tick as f64
    }

    /// Currently sounding pool voices, in slot order.
    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn identity_map(&self) -> &IdentityMap {
        &self.ids
    }

    pub fn preview(&self) -> &PreviewVoice {
        &self.preview
    }
}
