// beatglow - real-time percussive onset classification
//
// Listens to a mono audio stream and reports bass hits, hand claps and
// hi-hat strikes as they happen, with a steadiness classification for the
// hi-hat pattern. The pipeline is split across two threads: a cpal capture
// callback that fills pooled buffers, and a detection thread that runs the
// FFT, adaptive thresholding and per-instrument confirmation chains.
//
// Library layout:
// - config: tunable detection parameters, JSON-loadable
// - audio: capture engine and the lock-free frame pool
// - analysis: the detection pipeline itself
// - error: audio subsystem errors

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;

pub use analysis::{BeatDetector, DetectorState, Instrument, OnsetEvent};
pub use audio::CaptureEngine;
pub use config::DetectorConfig;
pub use error::AudioError;
