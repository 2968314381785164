//! Audio output trait and error types.

use pr_engine::Frame;

/// Error type for audio operations.
#[derive(Debug)]
pub enum AudioError {
    /// No output device available
    NoDevice,
    /// The device rejected its default configuration
    DeviceInit(String),
    /// Failed to create the output stream
    StreamCreate(String),
    /// Failed to start or pause the stream
    Playback(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AudioError::NoDevice => write!(f, "no audio output device available"),
            AudioError::DeviceInit(msg) => write!(f, "audio device init failed: {}", msg),
            AudioError::StreamCreate(msg) => write!(f, "audio stream creation failed: {}", msg),
            AudioError::Playback(msg) => write!(f, "audio playback failed: {}", msg),
        }
    }
}

impl std::error::Error for AudioError {}

/// A sink for rendered stereo frames.
pub trait AudioOutput {
    /// Output sample rate in Hz.
    fn sample_rate(&self) -> u32;

    /// Queue as many frames as fit without waiting. Returns how many were taken.
    fn write(&mut self, frames: &[Frame]) -> usize;

    /// Queue every frame, spinning while the sink is full.
    fn write_spin(&mut self, frames: &[Frame]) {
        let mut rest = frames;
        while !rest.is_empty() {
            let taken = self.write(rest);
            rest = &rest[taken..];
            if taken == 0 {
                std::hint::spin_loop();
            }
        }
    }

    /// Convert a planar float block to frames and queue it, spinning while full.
    ///
    /// `scratch` must be at least as long as the shorter channel.
    fn write_block_spin(&mut self, left: &[f32], right: &[f32], scratch: &mut [Frame]) {
        let len = left.len().min(right.len()).min(scratch.len());
        for ((frame, &l), &r) in scratch[..len].iter_mut().zip(left).zip(right) {
            *frame = Frame::from_f32(l, r);
        }
        self.write_spin(&scratch[..len]);
    }

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Pause playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}
