// Onset confirmation gate
//
// A band flag plus cooldown is not enough: decaying tails and room noise
// still slip through. The gate keeps a short history of previously confirmed
// onset energies and accepts a new candidate only when it is loud relative
// to that history:
//
//   accept  iff  candidate / max > mean(norm) * var(norm) * confirm_scale
//
// where norm is the history divided by its maximum. Before the gate can
// judge anything it has to see real onsets: during bootstrap each gated
// candidate is written into the first still-zero slot, and the gate stays
// inert until every slot holds a nonzero value.

/// Rolling confirmation state for one instrument
pub struct ConfirmationGate {
    /// Confirmed onset energies, oldest first; zero slots are unfilled
    history: Vec<f64>,
    boost: f64,
    scale: f64,
}

impl ConfirmationGate {
    pub fn new(history_len: usize, boost: f64, scale: f64) -> Self {
        Self {
            history: vec![0.0; history_len.max(1)],
            boost,
            scale,
        }
    }

    /// Offer a gated candidate energy. Returns true when the onset is
    /// confirmed; the history is updated FIFO on acceptance.
    pub fn offer(&mut self, candidate: f64) -> bool {
        let candidate = candidate * self.boost;

        // Bootstrap: fill the first empty slot instead of evaluating.
        // A zero candidate never fills a slot, so pure silence can keep the
        // gate in bootstrap forever without confirming anything.
        if let Some(slot) = self.history.iter().position(|&e| e == 0.0) {
            if candidate > 0.0 {
                self.history[slot] = candidate;
            }
            return false;
        }

        let max = self.history.iter().cloned().fold(f64::MIN, f64::max);
        let mean_norm = self.history.iter().sum::<f64>() / self.history.len() as f64 / max;
        let var_norm = self
            .history
            .iter()
            .map(|&e| {
                let d = e / max - mean_norm;
                d * d
            })
            .sum::<f64>()
            / self.history.len() as f64;

        if candidate / max > mean_norm * var_norm * self.scale {
            self.history.rotate_left(1);
            if let Some(last) = self.history.last_mut() {
                *last = candidate;
            }
            true
        } else {
            false
        }
    }

    /// True once bootstrap has completed and the gate evaluates candidates
    pub fn is_bootstrapped(&self) -> bool {
        self.history.iter().all(|&e| e != 0.0)
    }

    /// Clear the history back to zeros, re-entering bootstrap
    pub fn reset(&mut self) {
        self.history.fill(0.0);
    }
}
