//! Controller error type.

use pr_audio::AudioError;

#[derive(Debug)]
pub enum ControllerError {
    /// The audio backend failed to open or start
    Audio(AudioError),
    /// The audio thread exited before reporting its sample rate
    ThreadStart,
    /// Writing rendered output failed
    Io(std::io::Error),
}

impl std::fmt::Display for ControllerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControllerError::Audio(e) => write!(f, "{}", e),
            ControllerError::ThreadStart => write!(f, "audio thread exited during startup"),
            ControllerError::Io(e) => write!(f, "i/o error: {}", e),
        }
    }
}

impl std::error::Error for ControllerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControllerError::Audio(e) => Some(e),
            ControllerError::ThreadStart => None,
            ControllerError::Io(e) => Some(e),
        }
    }
}

impl From<AudioError> for ControllerError {
    fn from(e: AudioError) -> Self {
        ControllerError::Audio(e)
    }
}

impl From<std::io::Error> for ControllerError {
    fn from(e: std::io::Error) -> Self {
        ControllerError::Io(e)
    }
}
