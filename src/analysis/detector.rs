// BeatDetector - the per-frame detection state machine
//
// Drives the whole pipeline for one frame of samples: sub-band energy
// extraction, adaptive threshold flags, then per instrument the gate ->
// cooldown -> confirmation chain, the hi-hat gap update, and finally the
// unconditional history rotation. Events are produced synchronously within
// the frame that caused them.
//
// States: Warmup (filling the energy history, no detection) -> Active
// (full pipeline every frame) -> Stopped (terminal, external stop).

use crate::analysis::confirm::ConfirmationGate;
use crate::analysis::energy::SpectrumAnalyzer;
use crate::analysis::history::EnergyHistory;
use crate::analysis::periodicity::GapTracker;
use crate::analysis::scorer::{Instrument, InstrumentScorer};
use crate::analysis::threshold::beat_flags;
use crate::analysis::OnsetEvent;
use crate::config::{DetectorConfig, InstrumentConfig, ThresholdConfig};

/// Detector lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// Energy history still filling; no detection performed
    Warmup,
    /// Full pipeline runs every frame
    Active,
    /// Terminal; frames are ignored
    Stopped,
}

/// Per-instrument detection chain: scorer, cooldown, confirmation
struct InstrumentChannel {
    instrument: Instrument,
    scorer: InstrumentScorer,
    gate: ConfirmationGate,
    cooldown_frames: u64,
    reset_after_silence: Option<u64>,
    last_onset_frame: u64,
}

impl InstrumentChannel {
    fn new(instrument: Instrument, config: &InstrumentConfig) -> Self {
        Self {
            instrument,
            scorer: InstrumentScorer::new(config),
            gate: ConfirmationGate::new(
                config.confirm_history_len,
                config.confirm_boost,
                config.confirm_scale,
            ),
            cooldown_frames: config.cooldown_frames,
            reset_after_silence: config.reset_after_silence_frames,
            last_onset_frame: 0,
        }
    }

    /// Run gate -> cooldown -> confirmation for one frame. Returns the
    /// accepted candidate energy, if any.
    fn detect(&mut self, frame_index: u64, energies: &[f64], flags: &[bool]) -> Option<f64> {
        if let Some(limit) = self.reset_after_silence {
            if frame_index.saturating_sub(self.last_onset_frame) > limit {
                self.gate.reset();
                self.last_onset_frame = frame_index;
            }
        }

        if !self.scorer.gate_passed(flags) {
            return None;
        }
        if frame_index - self.last_onset_frame <= self.cooldown_frames {
            return None;
        }

        let energy = self.scorer.candidate_energy(energies);
        if self.gate.offer(energy) {
            Some(energy)
        } else {
            None
        }
    }
}

/// The streaming detection core
pub struct BeatDetector {
    analyzer: SpectrumAnalyzer,
    history: EnergyHistory,
    threshold: ThresholdConfig,
    channels: Vec<InstrumentChannel>,
    hihat_gaps: GapTracker,
    frame_index: u64,
    state: DetectorState,
}

impl BeatDetector {
    pub fn new(config: &DetectorConfig) -> Self {
        let analyzer = SpectrumAnalyzer::new(
            config.audio.frame_size,
            config.audio.sub_bands,
            config.audio.bins_per_band,
        );
        let channels = vec![
            InstrumentChannel::new(Instrument::Bass, &config.bass),
            InstrumentChannel::new(Instrument::Clap, &config.clap),
            InstrumentChannel::new(Instrument::HiHat, &config.hihat),
        ];

        Self {
            analyzer,
            history: EnergyHistory::new(config.audio.history_frames()),
            threshold: config.threshold.clone(),
            channels,
            hihat_gaps: GapTracker::new(
                config.steadiness.gap_capacity,
                config.steadiness.mode_floor,
                config.steadiness.ratio_tolerance,
            ),
            frame_index: 0,
            state: DetectorState::Warmup,
        }
    }

    pub fn state(&self) -> DetectorState {
        self.state
    }

    /// Index of the next frame to be processed
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Current hi-hat steadiness classification
    pub fn hihat_steady(&self) -> bool {
        self.hihat_gaps.is_steady()
    }

    /// Stop accepting frames. Terminal; no internal state needs rollback.
    pub fn stop(&mut self) {
        self.state = DetectorState::Stopped;
    }

    /// Process one frame of samples and return the onsets it confirmed
    pub fn process_frame(&mut self, frame: &[f32]) -> Vec<OnsetEvent> {
        if self.state == DetectorState::Stopped {
            return Vec::new();
        }
        let energies = self.analyzer.analyze(frame);
        self.process_energies(energies)
    }

    /// Pipeline below the FFT: detection over an already-extracted sub-band
    /// energy vector. Exposed so the detection logic can be driven
    /// deterministically without synthesizing audio.
    pub fn process_energies(&mut self, energies: Vec<f64>) -> Vec<OnsetEvent> {
        if self.state == DetectorState::Stopped {
            return Vec::new();
        }

        if !self.history.is_full() {
            self.history.push(energies);
            self.frame_index += 1;
            if self.history.is_full() {
                self.state = DetectorState::Active;
                tracing::info!(
                    "[BeatDetector] Energy history full after {} frames, detection active",
                    self.frame_index
                );
            }
            return Vec::new();
        }

        let flags = beat_flags(&energies, &self.history, &self.threshold);

        let mut events = Vec::new();
        for channel in &mut self.channels {
            if let Some(energy) = channel.detect(self.frame_index, &energies, &flags) {
                let hihat_steady = if channel.instrument == Instrument::HiHat {
                    let gap = self.frame_index - channel.last_onset_frame;
                    self.hihat_gaps.record_gap(gap);
                    Some(self.hihat_gaps.is_steady())
                } else {
                    None
                };
                channel.last_onset_frame = self.frame_index;

                events.push(OnsetEvent {
                    instrument: channel.instrument,
                    frame_index: self.frame_index,
                    energy,
                    hihat_steady,
                });
            }
        }

        // Rotate the window regardless of detection outcome.
        self.history.push(energies);
        self.frame_index += 1;

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BANDS: usize = 39;

    fn default_detector() -> BeatDetector {
        BeatDetector::new(&DetectorConfig::default())
    }

    fn flat_frame(value: f64) -> Vec<f64> {
        vec![value; BANDS]
    }

    /// Drive the detector with flat frames until the history is full
    fn warm_up(detector: &mut BeatDetector, value: f64) {
        while detector.state() == DetectorState::Warmup {
            let events = detector.process_energies(flat_frame(value));
            assert!(events.is_empty(), "no detection during warm-up");
        }
    }

    #[test]
    fn test_silent_stream_warmup_transition() {
        // 46 frames of silence fill the 1-second window; the 47th runs the
        // full pipeline and produces no flags and no events.
        let mut detector = default_detector();

        for i in 0..46 {
            assert_eq!(detector.state(), DetectorState::Warmup, "frame {}", i);
            let events = detector.process_frame(&vec![0.0f32; 2048]);
            assert!(events.is_empty());
        }
        assert_eq!(detector.state(), DetectorState::Active);

        let events = detector.process_frame(&vec![0.0f32; 2048]);
        assert!(events.is_empty(), "silence stays silent once active");
        assert_eq!(detector.frame_index(), 47);
    }

    #[test]
    fn test_bass_spike_confirmed_after_bootstrap() {
        let mut detector = default_detector();
        warm_up(&mut detector, 1.0);

        // Sub-band 0 spikes over silent filler frames. Zero fillers keep
        // every other band's window maximum at zero, so nothing else flags.
        let mut spikes_offered = 0;
        let mut confirmed = Vec::new();
        while spikes_offered < 6 {
            let mut frame = flat_frame(0.0);
            frame[0] = 100.0;
            spikes_offered += 1;
            let mut events = detector.process_energies(frame);
            confirmed.append(&mut events);

            // Space the spikes beyond the bass cooldown of 8 frames
            for _ in 0..9 {
                let events = detector.process_energies(flat_frame(0.0));
                assert!(events.is_empty());
            }
        }

        // First 4 spikes bootstrap the confirmation history; the 5th and 6th
        // have an identical (zero-variance) history and must be accepted.
        assert_eq!(confirmed.len(), 2);
        assert!(confirmed
            .iter()
            .all(|e| e.instrument == Instrument::Bass && e.energy == 100.0));
        assert!(confirmed.iter().all(|e| e.hihat_steady.is_none()));
    }

    #[test]
    fn test_cooldown_spacing_is_enforced() {
        // Feed a spike on every frame: even with the gate wide open, accepted
        // bass onsets must stay more than 8 frames apart.
        let mut detector = default_detector();
        warm_up(&mut detector, 1.0);

        let mut accepted = Vec::new();
        for _ in 0..200 {
            let mut frame = flat_frame(0.05);
            frame[0] = 100.0;
            for event in detector.process_energies(frame) {
                if event.instrument == Instrument::Bass {
                    accepted.push(event.frame_index);
                }
            }
        }

        assert!(accepted.len() >= 2, "sustained spikes should confirm");
        for pair in accepted.windows(2) {
            assert!(
                pair[1] - pair[0] > 8,
                "onsets at {} and {} violate the bass cooldown",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_hihat_events_carry_steadiness() {
        let mut detector = default_detector();
        warm_up(&mut detector, 1.0);

        let mut hihat_events = Vec::new();
        // Spike all hi-hat bands every 10 frames; enough strikes to fill the
        // 35-entry gap history after bootstrap.
        for _ in 0..60 {
            let mut frame = flat_frame(0.05);
            for band in 27..32 {
                frame[band] = 50.0;
            }
            for event in detector.process_energies(frame) {
                if event.instrument == Instrument::HiHat {
                    hihat_events.push(event);
                }
            }
            for _ in 0..9 {
                detector.process_energies(flat_frame(0.05));
            }
        }

        assert!(hihat_events.len() > 40);
        assert!(hihat_events
            .iter()
            .all(|e| e.hihat_steady.is_some()), "hi-hat events carry the classification");
        // Gap history: first gap is the distance from frame 0, the rest are
        // a steady 10. Once the ring fills, mode 10 and mean ~10 => steady.
        assert_eq!(hihat_events.last().unwrap().hihat_steady, Some(true));
        assert!(detector.hihat_steady());
    }

    #[test]
    fn test_stopped_detector_ignores_frames() {
        let mut detector = default_detector();
        warm_up(&mut detector, 1.0);

        detector.stop();
        assert_eq!(detector.state(), DetectorState::Stopped);

        let index_before = detector.frame_index();
        let mut frame = flat_frame(0.05);
        frame[0] = 100.0;
        assert!(detector.process_energies(frame).is_empty());
        assert_eq!(detector.frame_index(), index_before);
    }

    #[test]
    fn test_silence_reset_reenters_bootstrap() {
        let mut config = DetectorConfig::default();
        config.bass.reset_after_silence_frames = Some(100);
        let mut detector = BeatDetector::new(&config);
        warm_up(&mut detector, 1.0);

        // Run of spikes spaced 10 frames apart: 4 bootstrap, then confirm.
        let spike_run = |detector: &mut BeatDetector, count: usize| -> Vec<usize> {
            let mut confirmed_at = Vec::new();
            for spike in 0..count {
                let mut frame = flat_frame(0.0);
                frame[0] = 100.0;
                if !detector.process_energies(frame).is_empty() {
                    confirmed_at.push(spike);
                }
                for _ in 0..9 {
                    detector.process_energies(flat_frame(0.0));
                }
            }
            confirmed_at
        };

        assert_eq!(spike_run(&mut detector, 6), vec![4, 5]);

        // A silent stretch past the limit clears the confirmation history.
        for _ in 0..110 {
            detector.process_energies(flat_frame(0.0));
        }

        // The first spike after silence has a zero window maximum and does
        // not flag; the next four bootstrap again before anything confirms.
        assert_eq!(spike_run(&mut detector, 7), vec![5, 6]);
    }
}
