// Error types for the capture engine and detection pipeline
//
// Capture failures are fatal to the pipeline: the engine reports them once
// and shuts the stream down. There is no retry or supervised restart.

use std::fmt;

/// Audio capture and lifecycle errors
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Capture engine is already running
    AlreadyRunning,

    /// Capture engine is not running
    NotRunning,

    /// Failed to open the input stream
    StreamOpenFailed { reason: String },

    /// The input device delivers a sample format the engine cannot consume
    UnsupportedSampleFormat { format: String },

    /// Device-level failure while the stream was running
    HardwareError { details: String },
}

impl AudioError {
    pub fn message(&self) -> String {
        match self {
            AudioError::AlreadyRunning => {
                "Capture engine already running. Call stop() first.".to_string()
            }
            AudioError::NotRunning => {
                "Capture engine not running. Call start() first.".to_string()
            }
            AudioError::StreamOpenFailed { reason } => {
                format!("Failed to open input stream: {}", reason)
            }
            AudioError::UnsupportedSampleFormat { format } => {
                format!("Unsupported input sample format: {}", format)
            }
            AudioError::HardwareError { details } => {
                format!("Hardware error: {}", details)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for AudioError {}

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::HardwareError {
            details: err.to_string(),
        }
    }
}
