//! Voice: one sounding note, and the preview voice used for auditioning.

use pr_ir::{Note, Tick};

use crate::frequency::phase_increment;

/// Fixed output gain applied to every voice.
pub const MASTER_GAIN: f64 = 0.05;

/// Drive into the `tanh` soft clipper.
const DRIVE: f64 = 2.0;

/// Soft-clipped sine at `phase` cycles, in [-tanh(2), tanh(2)].
#[inline]
pub fn oscillator(phase: f64) -> f64 {
    libm::tanh(libm::sin(phase * core::f64::consts::TAU) * DRIVE)
}

/// A note that is currently sounding.
#[derive(Clone, Copy, Debug)]
pub struct Voice {
    /// Oscillator phase in [0, 1).
    pub phase: f64,
    /// Phase advance per sample.
    pub phase_delta: f64,
    /// Current amplitude.
    pub volume: f64,
    /// Amplitude change per sample.
    pub volume_delta: f64,
    /// The note as of the last reconciliation.
    pub note: Note,
    /// Reported by the current tick's overlap query.
    pub(crate) visited: bool,
}

impl Voice {
    /// Note-on: full volume, ramping linearly to silence at the note's end.
    pub fn start(note: Note, sample_rate: u32, samples_per_tick: u32) -> Self {
        Self {
            phase: 0.0,
            phase_delta: phase_increment(note.pitch, sample_rate),
            volume: 1.0,
            volume_delta: ramp_to_silence(note.duration(), samples_per_tick),
            note,
            visited: true,
        }
    }

    /// Restart the envelope after the note's length changed while sounding.
    ///
    /// The new ramp covers only what is left of the note from `tick`, so the
    /// level jumps back to full rather than splicing onto the old slope.
    pub fn retrigger(&mut self, note: &Note, tick: Tick, sample_rate: u32, samples_per_tick: u32) {
        self.phase_delta = phase_increment(note.pitch, sample_rate);
        self.volume = 1.0;
        self.volume_delta = ramp_to_silence(note.end.saturating_sub(tick), samples_per_tick);
    }

    /// Silence immediately. No release tail.
    pub fn release(&mut self) {
        self.phase_delta = 0.0;
        self.volume_delta = 0.0;
        self.volume = 0.0;
    }

    /// Add this voice's next `left.len()` samples to both channels.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let sample = (oscillator(self.phase) * MASTER_GAIN * self.volume) as f32;
            *l += sample;
            *r += sample;
            self.phase += self.phase_delta;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
            // A note moved while sounding keeps its old ramp, which can run
            // past zero before the next retrigger or release.
            self.volume = (self.volume + self.volume_delta).max(0.0);
        }
    }
}

/// Per-sample slope that takes full volume to zero over `ticks`.
fn ramp_to_silence(ticks: Tick, samples_per_tick: u32) -> f64 {
    let samples = ticks as f64 * samples_per_tick as f64;
    if samples <= 0.0 {
        return -1.0;
    }
    -1.0 / samples
}

/// Single key-press voice outside the scheduled pool. Constant volume, no envelope.
#[derive(Clone, Copy, Debug, Default)]
pub struct PreviewVoice {
    pitch: Option<f32>,
    phase: f64,
    phase_delta: f64,
}

impl PreviewVoice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or re-pitch) the preview tone.
    pub fn start(&mut self, pitch: f32, sample_rate: u32) {
        self.pitch = Some(pitch);
        self.phase = 0.0;
        self.phase_delta = phase_increment(pitch, sample_rate);
    }

    /// Stop the tone if it is sounding `pitch`. Returns whether it stopped.
    pub fn stop(&mut self, pitch: f32) -> bool {
        if self.pitch == Some(pitch) {
            self.pitch = None;
            true
        } else {
            false
        }
    }

    pub fn pitch(&self) -> Option<f32> {
        self.pitch
    }

    pub fn is_active(&self) -> bool {
        self.pitch.is_some()
    }

    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.pitch.is_none() {
            return;
        }
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let sample = (oscillator(self.phase) * MASTER_GAIN) as f32;
            *l += sample;
            *r += sample;
            self.phase += self.phase_delta;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pr_ir::NoteId;

    const SR: u32 = 48000;

    fn note(start: Tick, end: Tick, pitch: f32) -> Note {
        Note::new(NoteId::new(1).unwrap(), start, end, pitch)
    }

    #[test]
    fn oscillator_is_soft_clipped_sine() {
        assert_eq!(oscillator(0.0), 0.0);
        assert!((oscillator(0.25) - libm::tanh(2.0)).abs() < 1e-12);
        assert!((oscillator(0.75) + libm::tanh(2.0)).abs() < 1e-12);
        assert!(oscillator(0.5).abs() < 1e-12);
    }

    #[test]
    fn start_sets_envelope_over_full_note() {
        let v = Voice::start(note(10, 20, 69.0), SR, 100);
        assert_eq!(v.phase, 0.0);
        assert_eq!(v.volume, 1.0);
        assert!((v.volume_delta + 1.0 / 1000.0).abs() < 1e-15);
        assert!((v.phase_delta - 440.0 / SR as f64).abs() < 1e-12);
    }

    #[test]
    fn render_accumulates_into_both_channels() {
        let mut v = Voice::start(note(0, 10, 69.0), SR, 100);
        let mut left = [1.0f32; 8];
        let mut right = [-1.0f32; 8];
        v.render(&mut left, &mut right);
        for i in 0..8 {
            assert!(((left[i] - 1.0) - (right[i] + 1.0)).abs() < 1e-6);
        }
        assert_eq!(left[0], 1.0);
        assert!(left[1] > 1.0);
    }

    #[test]
    fn envelope_reaches_zero_at_note_end() {
        let mut v = Voice::start(note(0, 4, 69.0), SR, 25);
        let mut left = [0.0f32; 100];
        let mut right = [0.0f32; 100];
        v.render(&mut left, &mut right);
        assert!(v.volume.abs() < 1e-12);
    }

    #[test]
    fn envelope_holds_at_silence_past_note_end() {
        let mut v = Voice::start(note(0, 4, 69.0), SR, 25);
        let mut left = [0.0f32; 250];
        let mut right = [0.0f32; 250];
        v.render(&mut left, &mut right);
        assert_eq!(v.volume, 0.0);
        assert!(left[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn phase_stays_in_unit_range() {
        let mut v = Voice::start(note(0, 1000, 100.0), SR, 1000);
        let mut left = [0.0f32; 4096];
        let mut right = [0.0f32; 4096];
        v.render(&mut left, &mut right);
        assert!((0.0..1.0).contains(&v.phase));
    }

    #[test]
    fn retrigger_uses_remaining_length() {
        let mut v = Voice::start(note(0, 20, 69.0), SR, 10);
        v.volume = 0.3;
        v.retrigger(&note(0, 15, 72.0), 5, SR, 10);
        assert_eq!(v.volume, 1.0);
        assert!((v.volume_delta + 1.0 / 100.0).abs() < 1e-15);
        assert!((v.phase_delta - crate::frequency::phase_increment(72.0, SR)).abs() < 1e-15);
    }

    #[test]
    fn release_silences_immediately() {
        let mut v = Voice::start(note(0, 20, 69.0), SR, 10);
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        v.render(&mut left, &mut right);
        v.release();
        let mut left = [0.0f32; 16];
        let mut right = [0.0f32; 16];
        v.render(&mut left, &mut right);
        assert!(left.iter().chain(right.iter()).all(|&s| s == 0.0));
    }

    #[test]
    fn preview_has_constant_volume() {
        let mut p = PreviewVoice::new();
        p.start(69.0, SR);
        let mut left = [0.0f32; SR as usize / 100];
        let mut right = [0.0f32; SR as usize / 100];
        p.render(&mut left, &mut right);
        let peak = left.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak as f64 - MASTER_GAIN * libm::tanh(2.0)).abs() < 1e-3);
    }

    #[test]
    fn preview_stops_only_for_its_pitch() {
        let mut p = PreviewVoice::new();
        p.start(60.0, SR);
        assert!(!p.stop(61.0));
        assert!(p.is_active());
        assert!(p.stop(60.0));
        assert!(!p.is_active());
        let mut left = [0.0f32; 8];
        let mut right = [0.0f32; 8];
        p.render(&mut left, &mut right);
        assert!(left.iter().all(|&s| s == 0.0));
    }
}
