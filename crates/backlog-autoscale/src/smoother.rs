//! Trailing-window smoothing of raw backlog samples.

use std::collections::VecDeque;

/// Fixed-length trailing window of raw samples.
///
/// The window is not ready until it holds exactly `capacity` samples;
/// after that every push evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct Smoother {
    capacity: usize,
    samples: VecDeque<u64>,
}

impl Smoother {
    /// Create an empty window holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity + 1),
        }
    }

    /// Append a sample and return the window average once the window is full.
    pub fn push(&mut self, sample: u64) -> Option<f64> {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        self.average()
    }

    /// Arithmetic mean of the window, or `None` while it is still filling.
    pub fn average(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let sum: u128 = self.samples.iter().map(|&s| u128::from(s)).sum();
        Some(sum as f64 / self.samples.len() as f64)
    }

    pub fn is_ready(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
