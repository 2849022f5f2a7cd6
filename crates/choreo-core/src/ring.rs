#![forbid(unsafe_code)]

//! Fixed-capacity circular buffer with explicit head/length indices.
//!
//! Every bounded history in choreo (the 60-slot frame-duration window, the
//! 5-sample velocity window, the 100-entry diagnostics buffer) sits on this
//! type. Push is O(1) and evicts the oldest element once full; there is no
//! `remove(0)`-style shifting anywhere.
//!
//! # Invariants
//!
//! 1. `len <= capacity` at all times; capacity never changes after
//!    construction.
//! 2. Iteration order is strictly oldest → newest.
//! 3. `push` on a full ring returns the evicted (oldest) element.

/// Fixed-capacity ring buffer.
#[derive(Debug, Clone)]
pub struct FixedRing<T> {
    buf: Vec<T>,
    capacity: usize,
    /// Index of the oldest element (valid when `len > 0`).
    head: usize,
    len: usize,
}

impl<T> FixedRing<T> {
    /// Create a ring with the given capacity.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "FixedRing capacity must be non-zero");
        Self {
            buf: Vec::with_capacity(capacity),
            capacity,
            head: 0,
            len: 0,
        }
    }

    /// Append a value, evicting and returning the oldest element when full.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.len < self.capacity {
            let slot = (self.head + self.len) % self.capacity;
            if slot == self.buf.len() {
                self.buf.push(value);
            } else {
                self.buf[slot] = value;
            }
            self.len += 1;
            None
        } else {
            let evicted = std::mem::replace(&mut self.buf[self.head], value);
            self.head = (self.head + 1) % self.capacity;
            Some(evicted)
        }
    }

    /// Number of stored elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when no elements are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once `capacity` elements are stored.
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop all elements. Capacity is retained.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.head = 0;
        self.len = 0;
    }

    /// Most recently pushed element.
    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            let idx = (self.head + self.len - 1) % self.capacity;
            Some(&self.buf[idx])
        }
    }

    /// Iterate oldest → newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len).map(move |i| &self.buf[(self.head + i) % self.capacity])
    }
}

impl FixedRing<f64> {
    /// Arithmetic mean of the stored samples (0.0 when empty).
    #[must_use]
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    /// Largest stored sample (0.0 when empty).
    #[must_use]
    pub fn max(&self) -> f64 {
        self.iter().copied().fold(0.0, f64::max)
    }
}
