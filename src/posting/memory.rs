//! Memory accounting.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

/// Memory accounting for an arena-backed structure, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryUsage {
    /// Bytes allocated, including dead and on-hold memory.
    pub allocated_bytes: usize,
    /// Bytes holding live data.
    pub used_bytes: usize,
    /// Bytes allocated but unused (free slots).
    pub dead_bytes: usize,
    /// Bytes retired but kept alive for readers of older generations.
    pub allocated_bytes_on_hold: usize,
}

impl MemoryUsage {
    pub fn new(
        allocated_bytes: usize,
        used_bytes: usize,
        dead_bytes: usize,
        allocated_bytes_on_hold: usize,
    ) -> Self {
        MemoryUsage {
            allocated_bytes,
            used_bytes,
            dead_bytes,
            allocated_bytes_on_hold,
        }
    }
}

impl AddAssign for MemoryUsage {
    fn add_assign(&mut self, other: MemoryUsage) {
        self.allocated_bytes += other.allocated_bytes;
        self.used_bytes += other.used_bytes;
        self.dead_bytes += other.dead_bytes;
        self.allocated_bytes_on_hold += other.allocated_bytes_on_hold;
    }
}
