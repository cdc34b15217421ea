// EnergyHistory - sliding window of recent sub-band energy vectors
//
// The adaptive threshold normalizes each frame against roughly one second of
// preceding energies. The window is an index-based ring: once full, pushing
// overwrites the oldest slot and advances the head, so rotation is O(1)
// instead of shifting the whole window every frame.

/// Fixed-capacity FIFO of sub-band energy vectors
pub struct EnergyHistory {
    slots: Vec<Vec<f64>>,
    head: usize,
    capacity: usize,
}

impl EnergyHistory {
    /// Create an empty history with room for `capacity` frames
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "history capacity must be greater than 0");
        Self {
            slots: Vec::with_capacity(capacity),
            head: 0,
            capacity,
        }
    }

    /// Append one frame's energies, evicting the oldest frame once full
    pub fn push(&mut self, energies: Vec<f64>) {
        if self.slots.len() < self.capacity {
            self.slots.push(energies);
        } else {
            self.slots[self.head] = energies;
            self.head = (self.head + 1) % self.capacity;
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Iterate one sub-band's history, oldest frame first
    pub fn band_iter(&self, band: usize) -> impl Iterator<Item = f64> + '_ {
        let len = self.slots.len();
        (0..len).map(move |j| self.slots[(self.head + j) % len.max(1)][band])
    }
}
