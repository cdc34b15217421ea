// Analysis module - the onset detection pipeline
//
// Frames flow in from the capture thread via the lock-free queue pair and
// out as OnsetEvents on a tokio broadcast channel:
//
// - DetectionWorker: thread loop that drains the data queue
// - Pipeline: SpectrumAnalyzer -> beat_flags -> per-instrument chains
// - Output: OnsetEvent broadcast to however many subscribers care

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::audio::frame_pool::DetectionChannels;
use crate::config::DetectorConfig;

pub mod confirm;
pub mod detector;
pub mod energy;
pub mod history;
pub mod periodicity;
pub mod scorer;
pub mod threshold;

pub use detector::{BeatDetector, DetectorState};
pub use scorer::Instrument;

/// A confirmed percussive onset
///
/// Broadcast to subscribers the moment the frame that caused it has been
/// processed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OnsetEvent {
    /// Which instrument fired
    pub instrument: Instrument,
    /// Index of the frame that confirmed the onset
    pub frame_index: u64,
    /// Candidate energy that passed the confirmation gate
    pub energy: f64,
    /// Steadiness of the hi-hat pattern, present on hi-hat events only
    pub hihat_steady: Option<bool>,
}

/// Worker thread state: queue handles, the detector, and the sample
/// accumulator that reblocks capture chunks into fixed-size frames.
struct DetectionWorker {
    channels: DetectionChannels,
    detector: BeatDetector,
    event_sender: tokio::sync::broadcast::Sender<OnsetEvent>,
    hihat_steady_flag: Arc<AtomicBool>,
    shutdown_flag: Arc<AtomicBool>,
    frame_size: usize,
    accumulator: Vec<f32>,
}

impl DetectionWorker {
    fn new(
        channels: DetectionChannels,
        config: &DetectorConfig,
        event_sender: tokio::sync::broadcast::Sender<OnsetEvent>,
        hihat_steady_flag: Arc<AtomicBool>,
        shutdown_flag: Arc<AtomicBool>,
    ) -> Self {
        let frame_size = config.audio.frame_size;
        Self {
            channels,
            detector: BeatDetector::new(config),
            event_sender,
            hihat_steady_flag,
            shutdown_flag,
            frame_size,
            accumulator: Vec::with_capacity(frame_size * 2),
        }
    }

    /// Run whole frames out of the accumulator through the detector
    fn drain_accumulator(&mut self) {
        while self.accumulator.len() >= self.frame_size {
            let events = self.detector.process_frame(&self.accumulator[..self.frame_size]);
            self.accumulator.drain(..self.frame_size);

            for event in events {
                if let Some(steady) = event.hihat_steady {
                    self.hihat_steady_flag.store(steady, Ordering::Relaxed);
                }
                // Send fails only when nobody is subscribed
                let _ = self.event_sender.send(event);
            }
        }
    }

    fn run(mut self) {
        tracing::info!("[DetectionThread] Starting detection loop");

        loop {
            let buffer = match self.channels.next_filled() {
                Some(buffer) => buffer,
                None => {
                    // Check shutdown only when the queue is drained so no
                    // captured audio is lost on the way out.
                    if self.shutdown_flag.load(Ordering::SeqCst) {
                        tracing::info!(
                            "[DetectionThread] Shutdown after {} frames",
                            self.detector.frame_index()
                        );
                        break;
                    }
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            };

            self.accumulator.extend_from_slice(&buffer);
            self.channels.recycle(buffer);
            self.drain_accumulator();
        }

        self.detector.stop();
    }
}

/// Spawn the detection thread. It drains `channels` until `shutdown_flag`
/// is set and the data queue is empty.
pub fn spawn_detection_thread(
    channels: DetectionChannels,
    config: DetectorConfig,
    event_sender: tokio::sync::broadcast::Sender<OnsetEvent>,
    hihat_steady_flag: Arc<AtomicBool>,
    shutdown_flag: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let worker = DetectionWorker::new(
            channels,
            &config,
            event_sender,
            hihat_steady_flag,
            shutdown_flag,
        );
        worker.run();
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frame_pool;

    #[test]
    fn test_worker_processes_and_shuts_down() {
        let config = DetectorConfig::default();
        let frame_size = config.audio.frame_size;
        let (mut capture, detection) = frame_pool::frame_pool(8, frame_size);

        let (event_tx, _event_rx) = tokio::sync::broadcast::channel(64);
        let hihat_flag = Arc::new(AtomicBool::new(false));
        let shutdown = Arc::new(AtomicBool::new(false));

        let handle = spawn_detection_thread(
            detection,
            config,
            event_tx,
            Arc::clone(&hihat_flag),
            Arc::clone(&shutdown),
        );

        // Two half-frames accumulate into one full silent frame
        let chunk = vec![0.0f32; frame_size / 2];
        assert!(capture.publish(&chunk));
        assert!(capture.publish(&chunk));

        shutdown.store(true, Ordering::SeqCst);
        handle.join().expect("detection thread panicked");
        assert!(!hihat_flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_event_serializes_to_json() {
        let event = OnsetEvent {
            instrument: Instrument::HiHat,
            frame_index: 120,
            energy: 42.5,
            hihat_steady: Some(true),
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"hihat\""));
        let back: OnsetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
