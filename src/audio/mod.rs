// Audio module - capture side of the pipeline
//
// frame_pool carries samples from the cpal callback to the detection thread
// without allocating; engine owns the stream and the thread lifecycle.

pub mod engine;
pub mod frame_pool;

pub use engine::CaptureEngine;
pub use frame_pool::{CaptureChannels, DetectionChannels, SampleBuffer};
