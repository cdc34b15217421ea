// CaptureEngine - cpal input stream feeding the detection thread
//
// Owns the whole live pipeline: opens the default input device, copies the
// first channel of each callback into pooled buffers, and runs the detection
// thread that turns those buffers into OnsetEvents. The capture callback
// never allocates and never blocks; when the pool runs dry the chunk is
// dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::analysis::{spawn_detection_thread, OnsetEvent};
use crate::audio::frame_pool;
use crate::config::DetectorConfig;
use crate::error::AudioError;

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct CaptureEngine {
    config: DetectorConfig,
    input_stream: Option<cpal::Stream>,
    detection_handle: Option<JoinHandle<()>>,
    shutdown_flag: Arc<AtomicBool>,
    event_sender: tokio::sync::broadcast::Sender<OnsetEvent>,
    hihat_steady: Arc<AtomicBool>,
}

impl CaptureEngine {
    pub fn new(config: DetectorConfig) -> Self {
        let (event_sender, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            config,
            input_stream: None,
            detection_handle: None,
            shutdown_flag: Arc::new(AtomicBool::new(false)),
            event_sender,
            hihat_steady: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Receiver for onset events. Valid across start/stop cycles.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<OnsetEvent> {
        self.event_sender.subscribe()
    }

    /// Live hi-hat steadiness flag, updated by the detection thread
    pub fn hihat_steady_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.hihat_steady)
    }

    pub fn is_running(&self) -> bool {
        self.input_stream.is_some()
    }

    /// Open the input stream and spawn the detection thread
    pub fn start(&mut self) -> Result<(), AudioError> {
        if self.input_stream.is_some() {
            return Err(AudioError::AlreadyRunning);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| AudioError::StreamOpenFailed {
                reason: "No default input device found".to_string(),
            })?;

        let device_config =
            device
                .default_input_config()
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("Failed to get default input config: {:?}", e),
                })?;

        let stream_config: cpal::StreamConfig = device_config.clone().into();
        let channel_count = stream_config.channels as usize;
        let device_rate = stream_config.sample_rate.0;

        // The detector's history length is derived from the sample rate, so
        // it must track what the device actually delivers.
        let mut detector_config = self.config.clone();
        if device_rate != detector_config.audio.sample_rate {
            log::warn!(
                "Input device runs at {} Hz, configured for {} Hz; adopting device rate",
                device_rate,
                detector_config.audio.sample_rate
            );
            detector_config.audio.sample_rate = device_rate;
        }

        let (mut capture_channels, detection_channels) = frame_pool::frame_pool(
            detector_config.audio.pool_buffers,
            detector_config.audio.frame_size,
        );

        let shutdown_flag = Arc::new(AtomicBool::new(false));
        self.shutdown_flag = Arc::clone(&shutdown_flag);

        self.detection_handle = Some(spawn_detection_thread(
            detection_channels,
            detector_config,
            self.event_sender.clone(),
            Arc::clone(&self.hihat_steady),
            Arc::clone(&shutdown_flag),
        ));

        // A stream error is fatal for the session: flag the detection thread
        // down so it drains and exits.
        let error_shutdown = Arc::clone(&shutdown_flag);
        let err_fn = move |err| {
            tracing::error!("Input stream error: {}", err);
            error_shutdown.store(true, Ordering::SeqCst);
        };

        let stream = match device_config.sample_format() {
            cpal::SampleFormat::F32 => device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        if !capture_channels.publish_first_channel(data, channel_count) {
                            log::trace!("Frame pool exhausted, dropping capture chunk");
                        }
                    },
                    err_fn,
                    None,
                )
                .map_err(|e| AudioError::StreamOpenFailed {
                    reason: format!("{:?}", e),
                })?,
            other => {
                self.shutdown_flag.store(true, Ordering::SeqCst);
                if let Some(handle) = self.detection_handle.take() {
                    let _ = handle.join();
                }
                return Err(AudioError::UnsupportedSampleFormat {
                    format: format!("{:?}", other),
                });
            }
        };

        stream.play().map_err(|e| AudioError::HardwareError {
            details: format!("Failed to start input stream: {:?}", e),
        })?;

        tracing::info!(
            "[CaptureEngine] Capturing at {} Hz, {} channel(s)",
            device_rate,
            channel_count
        );
        self.input_stream = Some(stream);
        Ok(())
    }

    /// Stop capture and join the detection thread
    pub fn stop(&mut self) -> Result<(), AudioError> {
        let stream = self.input_stream.take().ok_or(AudioError::NotRunning)?;
        drop(stream);

        self.shutdown_flag.store(true, Ordering::SeqCst);
        if let Some(handle) = self.detection_handle.take() {
            if handle.join().is_err() {
                return Err(AudioError::HardwareError {
                    details: "Detection thread panicked".to_string(),
                });
            }
        }

        tracing::info!("[CaptureEngine] Stopped");
        Ok(())
    }
}

impl Drop for CaptureEngine {
    fn drop(&mut self) {
        if self.input_stream.is_some() {
            let _ = self.stop();
        }
    }
}
