//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Convert a pair of float samples in [-1, 1], clamping out-of-range input.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: to_i16(left),
            right: to_i16(right),
        }
    }

    /// Left channel as a float in [-1, 1).
    pub fn left_f32(self) -> f32 {
        self.left as f32 / 32768.0
    }

    /// Right channel as a float in [-1, 1).
    pub fn right_f32(self) -> f32 {
        self.right as f32 / 32768.0
    }

    pub fn is_silent(self) -> bool {
        self.left == 0 && self.right == 0
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}
