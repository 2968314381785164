//! Pitch-to-frequency conversion.
//!
//! Pitches follow MIDI numbering in 12-TET with A4 (pitch 69) at 440 Hz.
//! Fractional pitches are microtonal offsets and go through the same formula.

/// Pitch number of the reference note.
pub const REFERENCE_PITCH: f64 = 69.0;

/// Frequency of the reference note in Hz.
pub const REFERENCE_FREQUENCY: f64 = 440.0;

/// Frequency in Hz: `440 * 2^((pitch - 69) / 12)`.
pub fn pitch_to_frequency(pitch: f32) -> f64 {
    REFERENCE_FREQUENCY * libm::exp2((pitch as f64 - REFERENCE_PITCH) / 12.0)
}

/// Oscillator phase advance per output sample, in cycles.
pub fn phase_increment(pitch: f32, sample_rate: u32) -> f64 {
    if sample_rate == 0 {
        return 0.0;
    }
    pitch_to_frequency(pitch) / sample_rate as f64
}
