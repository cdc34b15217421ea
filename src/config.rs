//! Configuration for the detection pipeline
//!
//! Every tuned constant of the pipeline lives here as a named field, so the
//! hand-tuned values can be adjusted from a JSON file without recompiling.
//! Defaults reproduce the values the detector was tuned with on rap-oriented
//! low/mid-heavy material.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Complete detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    pub audio: AudioConfig,
    pub threshold: ThresholdConfig,
    pub bass: InstrumentConfig,
    pub clap: InstrumentConfig,
    pub hihat: InstrumentConfig,
    pub steadiness: SteadinessConfig,
}

/// Capture format and spectral layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Samples per frame (one detection cycle)
    pub frame_size: usize,
    /// Length of the adaptive-normalization window in seconds
    pub history_seconds: f32,
    /// Number of spectral sub-bands
    pub sub_bands: usize,
    /// FFT bins grouped into each sub-band
    pub bins_per_band: usize,
    /// Pre-allocated capture buffers in the frame pool
    pub pool_buffers: usize,
}

impl AudioConfig {
    /// Frames per second of audio, truncated (94618 / 2048 = 46)
    pub fn frames_per_second(&self) -> usize {
        (self.sample_rate as usize) / self.frame_size
    }

    /// Capacity of the energy history window in frames
    pub fn history_frames(&self) -> usize {
        ((self.history_seconds * self.frames_per_second() as f32) as usize).max(1)
    }

    /// Number of FFT bins consumed by the sub-band layout (DC excluded)
    pub fn used_bins(&self) -> usize {
        self.sub_bands * self.bins_per_band
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 94618,
            frame_size: 2048,
            history_seconds: 1.0,
            // 39 bands x 5 bins, ~230 Hz per band at the default rate
            sub_bands: 39,
            bins_per_band: 5,
            pool_buffers: 16,
        }
    }
}

/// Per-band adaptive threshold parameters
///
/// A band's threshold is `variance_slope * var + variance_intercept`, where
/// `var` is the population variance of the max-normalized history. The slope
/// sign flipped between tuning iterations of this detector; the negative form
/// (low-variance bands get a higher threshold) is the one that shipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub variance_slope: f64,
    pub variance_intercept: f64,
    /// The history average is divided by this before the comparison
    pub average_divisor: f64,
    /// A normalized current energy above this floor always sets the flag,
    /// rescuing transients that follow a long quiet stretch
    pub absolute_floor: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            variance_slope: -15.0,
            variance_intercept: 1.40,
            average_divisor: 1.15,
            absolute_floor: 0.15,
        }
    }
}

/// One weighted sub-band of an instrument's spectral signature
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BandWeight {
    pub band: usize,
    pub weight: f64,
}

/// Band set, gating rule, and debounce/confirmation tuning for one instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Weighted sub-bands summed into the candidate energy
    pub bands: Vec<BandWeight>,
    /// The weighted sum is divided by this
    pub energy_divisor: f64,
    /// Beat flags required among `bands` for the candidate to be considered
    pub min_active_flags: usize,
    /// A candidate is eligible only when more than this many frames have
    /// elapsed since the last accepted onset
    pub cooldown_frames: u64,
    /// Confirmation history length (bootstrap fills it before gating starts)
    pub confirm_history_len: usize,
    /// Candidate scale applied at the confirmation gate
    pub confirm_boost: f64,
    /// Threshold scale of the confirmation rule
    pub confirm_scale: f64,
    /// When set, clear the confirmation history (re-enter bootstrap) after
    /// this many frames without an accepted onset. `None` disables the reset.
    pub reset_after_silence_frames: Option<u64>,
}

impl InstrumentConfig {
    fn bass() -> Self {
        Self {
            bands: vec![BandWeight {
                band: 0,
                weight: 1.0,
            }],
            energy_divisor: 1.0,
            min_active_flags: 1,
            cooldown_frames: 8,
            confirm_history_len: 4,
            confirm_boost: 1.0,
            confirm_scale: 0.64,
            reset_after_silence_frames: None,
        }
    }

    fn clap() -> Self {
        const BASE: usize = 11;
        let weights = [
            (0usize, 1.2),
            (1, 1.3),
            (2, 1.5),
            (5, 1.4),
            (6, 1.6),
            (9, 1.4),
            (10, 1.6),
        ];
        Self {
            bands: weights
                .iter()
                .map(|&(offset, weight)| BandWeight {
                    band: BASE + offset,
                    weight,
                })
                .collect(),
            energy_divisor: 10.0,
            min_active_flags: 7,
            cooldown_frames: 3,
            confirm_history_len: 4,
            confirm_boost: 1.6,
            confirm_scale: 0.64,
            reset_after_silence_frames: None,
        }
    }

    fn hihat() -> Self {
        const BASE: usize = 27;
        let weights = [1.3, 1.7, 1.4, 1.2, 1.4];
        Self {
            bands: weights
                .iter()
                .enumerate()
                .map(|(offset, &weight)| BandWeight {
                    band: BASE + offset,
                    weight,
                })
                .collect(),
            energy_divisor: 7.0,
            min_active_flags: 1,
            cooldown_frames: 3,
            confirm_history_len: 5,
            confirm_boost: 1.0,
            confirm_scale: 0.64,
            reset_after_silence_frames: None,
        }
    }
}

/// Hi-hat periodicity classification parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SteadinessConfig {
    /// Inter-onset gaps kept in the circular gap history
    pub gap_capacity: usize,
    /// Minimum modal gap (frames) for a groove to count as steady
    pub mode_floor: u64,
    /// Maximum allowed |mean/mode - 1| deviation
    pub ratio_tolerance: f64,
}

impl Default for SteadinessConfig {
    fn default() -> Self {
        Self {
            gap_capacity: 35,
            mode_floor: 7,
            ratio_tolerance: 0.50,
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            threshold: ThresholdConfig::default(),
            bass: InstrumentConfig::bass(),
            clap: InstrumentConfig::clap(),
            hihat: InstrumentConfig::hihat(),
            steadiness: SteadinessConfig::default(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from a JSON file, falling back to defaults if the
    /// file is missing or malformed.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_audio_layout() {
        let audio = AudioConfig::default();
        assert_eq!(audio.frames_per_second(), 46);
        assert_eq!(audio.history_frames(), 46);
        assert_eq!(audio.used_bins(), 195);
    }

    #[test]
    fn test_default_instrument_tuning() {
        let config = DetectorConfig::default();

        assert_eq!(config.bass.bands.len(), 1);
        assert_eq!(config.bass.bands[0].band, 0);
        assert_eq!(config.bass.cooldown_frames, 8);

        assert_eq!(config.clap.bands.len(), 7);
        assert_eq!(config.clap.min_active_flags, 7);
        assert_eq!(config.clap.bands[0].band, 11);
        assert_eq!(config.clap.bands[6].band, 21);
        assert_eq!(config.clap.confirm_boost, 1.6);

        assert_eq!(config.hihat.bands.len(), 5);
        assert_eq!(config.hihat.bands[0].band, 27);
        assert_eq!(config.hihat.bands[4].band, 31);
        assert_eq!(config.hihat.min_active_flags, 1);
        assert_eq!(config.hihat.confirm_history_len, 5);
    }

    #[test]
    fn test_default_threshold_constants() {
        let threshold = ThresholdConfig::default();
        assert_eq!(threshold.variance_slope, -15.0);
        assert_eq!(threshold.variance_intercept, 1.40);
        assert_eq!(threshold.average_divisor, 1.15);
        assert_eq!(threshold.absolute_floor, 0.15);
    }

    #[test]
    fn test_json_roundtrip() {
        let config = DetectorConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: DetectorConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.audio.sample_rate, config.audio.sample_rate);
        assert_eq!(parsed.clap.bands.len(), config.clap.bands.len());
        assert_eq!(
            parsed.steadiness.gap_capacity,
            config.steadiness.gap_capacity
        );
        assert_eq!(
            parsed.hihat.reset_after_silence_frames,
            config.hihat.reset_after_silence_frames
        );
    }

    #[test]
    fn test_load_missing_file_falls_back_to_defaults() {
        let config = DetectorConfig::load_from_file("/nonexistent/beatglow.json");
        assert_eq!(config.audio.frame_size, 2048);
    }
}
