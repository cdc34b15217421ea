// Composite instrument scoring
//
// Each instrument is a hand-tuned set of sub-bands with per-band weights,
// chosen to match the frequency signature of that percussive sound: bass is
// sub-band 0 alone, the clap spans a broad low/mid region and requires every
// one of its bands to flag, the hi-hat sits in a narrow high region and
// needs only a single flag.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::InstrumentConfig;

/// The percussive sounds the pipeline classifies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Bass,
    Clap,
    HiHat,
}

impl fmt::Display for Instrument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instrument::Bass => write!(f, "bass"),
            Instrument::Clap => write!(f, "clap"),
            Instrument::HiHat => write!(f, "hihat"),
        }
    }
}

/// Maps a frame's raw band energies and beat flags to one instrument's
/// candidate energy and gate decision
pub struct InstrumentScorer {
    bands: Vec<(usize, f64)>,
    energy_divisor: f64,
    min_active_flags: usize,
}

impl InstrumentScorer {
    pub fn new(config: &InstrumentConfig) -> Self {
        Self {
            bands: config.bands.iter().map(|b| (b.band, b.weight)).collect(),
            energy_divisor: config.energy_divisor,
            min_active_flags: config.min_active_flags,
        }
    }

    /// Weighted sum of the instrument's band energies, divided by the
    /// configured divisor
    pub fn candidate_energy(&self, energies: &[f64]) -> f64 {
        let sum: f64 = self
            .bands
            .iter()
            .map(|&(band, weight)| weight * energies.get(band).copied().unwrap_or(0.0))
            .sum();
        sum / self.energy_divisor
    }

    /// True when at least `min_active_flags` of the instrument's bands are
    /// flagged by the adaptive threshold
    pub fn gate_passed(&self, flags: &[bool]) -> bool {
        let mut active = 0;
        for &(band, _) in &self.bands {
            if flags.get(band).copied().unwrap_or(false) {
                active += 1;
                if active >= self.min_active_flags {
                    return true;
                }
            }
        }
        false
    }
}
