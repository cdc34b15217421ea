// Hi-hat periodicity tracking
//
// Isolated high-frequency triggers are often noise; a deliberate hi-hat
// groove shows up as a consistent gap between confirmed strikes. The tracker
// keeps the recent inter-onset gaps in a ring and, once the ring is full,
// classifies the groove as steady when the modal gap is long enough and the
// mean does not stray far from it.

/// Circular buffer of inter-onset gaps with steadiness classification
pub struct GapTracker {
    gaps: Vec<u64>,
    head: usize,
    capacity: usize,
    mode_floor: u64,
    ratio_tolerance: f64,
    steady: bool,
}

impl GapTracker {
    pub fn new(capacity: usize, mode_floor: u64, ratio_tolerance: f64) -> Self {
        Self {
            gaps: Vec::with_capacity(capacity.max(1)),
            head: 0,
            capacity: capacity.max(1),
            mode_floor,
            ratio_tolerance,
            steady: false,
        }
    }

    /// Record the gap (in frames) since the previous confirmed onset.
    /// Reclassifies steadiness whenever the ring is full.
    pub fn record_gap(&mut self, gap: u64) {
        if self.gaps.len() < self.capacity {
            self.gaps.push(gap);
        } else {
            self.gaps[self.head] = gap;
            self.head = (self.head + 1) % self.capacity;
        }

        if self.is_full() {
            self.reclassify();
        }
    }

    pub fn is_full(&self) -> bool {
        self.gaps.len() == self.capacity
    }

    /// Steadiness is false until the ring first fills, decidable afterwards
    pub fn is_steady(&self) -> bool {
        self.steady
    }

    fn reclassify(&mut self) {
        let len = self.gaps.len();
        let mean = self.gaps.iter().sum::<u64>() as f64 / len as f64;

        // Mode with ties broken by the first value encountered scanning
        // oldest to newest.
        let mut mode = 0u64;
        let mut best_count = 0usize;
        for j in 0..len {
            let value = self.gaps[(self.head + j) % len];
            let count = self.gaps.iter().filter(|&&g| g == value).count();
            if count > best_count {
                best_count = count;
                mode = value;
            }
        }

        self.steady = mode >= self.mode_floor
            && mode > 0
            && (mean / mode as f64 - 1.0).abs() < self.ratio_tolerance;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> GapTracker {
        GapTracker::new(35, 7, 0.50)
    }

    #[test]
    fn test_not_steady_until_full() {
        let mut tracker = tracker();
        for _ in 0..34 {
            tracker.record_gap(10);
            assert!(!tracker.is_full());
            assert!(!tracker.is_steady());
        }
        tracker.record_gap(10);
        assert!(tracker.is_full());
        assert!(tracker.is_steady());
    }

    #[test]
    fn test_groove_with_small_jitter_is_steady() {
        // 35 gaps: mostly 10 with one 11 and two 9s. Mode 10, mean ~9.94,
        // ratio deviation ~0.006.
        let mut gaps = vec![10u64; 35];
        gaps[3] = 11;
        gaps[10] = 9;
        gaps[17] = 9;

        let mut tracker = tracker();
        for gap in gaps {
            tracker.record_gap(gap);
        }
        assert!(tracker.is_steady());
    }

    #[test]
    fn test_fast_chatter_is_not_steady() {
        // Modal gap of 3 frames is below the floor of 7: noise, not a groove.
        let mut tracker = tracker();
        for _ in 0..35 {
            tracker.record_gap(3);
        }
        assert!(!tracker.is_steady());
    }

    #[test]
    fn test_erratic_gaps_are_not_steady() {
        // Mode 8 clears the floor but the huge gaps drag the mean far away.
        let mut tracker = tracker();
        for i in 0..35 {
            tracker.record_gap(if i % 3 == 0 { 40 } else { 8 });
        }
        assert!(!tracker.is_steady());
    }

    #[test]
    fn test_mode_tie_broken_by_scan_order() {
        let mut tracker = GapTracker::new(4, 1, 10.0);
        tracker.record_gap(9);
        tracker.record_gap(12);
        tracker.record_gap(9);
        tracker.record_gap(12);
        // 9 and 12 both appear twice; the oldest entry wins the tie, and
        // with a generous tolerance the classification is steady.
        assert!(tracker.is_steady());

        // Overwriting the oldest 9 makes 12 the first-encountered value.
        tracker.record_gap(12);
        assert!(tracker.is_steady());
    }

    #[test]
    fn test_ring_overwrites_oldest() {
        let mut tracker = GapTracker::new(3, 7, 0.50);
        tracker.record_gap(100);
        tracker.record_gap(10);
        tracker.record_gap(10);
        assert!(!tracker.is_steady(), "mean dragged off by the stale gap");

        // The 100 gets overwritten; all entries are now 10.
        tracker.record_gap(10);
        assert!(tracker.is_steady());
    }
}
