//! # Port-range partitioning across workers.
//!
//! Splits the pool's RTC port range into one contiguous slice per worker:
//!
//! ```text
//! slice = (max - min) / workers
//! base  = min + slice * (ordinal - 1)      (bumped to even)
//! top   = base + slice                     (dropped to odd)
//!
//! min ─┬──────────────┬──────────────┬─── ... ───┬─ max
//!      │   worker #1  │   worker #2  │           │
//!      even        odd even       odd
//! ```
//!
//! The even lower bound keeps RTP/RTCP pairs (even, odd) inside one worker.
//!
//! ## Rules
//! - Pure and deterministic: same inputs always give the same slices.
//! - Slices never overlap and never leave `[min, max]`.
//! - A slice may come out empty (`min > max`) when the range is too small for
//!   the worker count; this is reported through [`PortRange::is_empty`], not rejected.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Inclusive port range `[min, max]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    /// Lowest port of the range.
    pub min: u16,
    /// Highest port of the range.
    pub max: u16,
}

impl PortRange {
    /// Creates a new range. No validation is performed.
    pub const fn new(min: u16, max: u16) -> Self {
        Self { min, max }
    }

    /// True if the range holds no port (inverted bounds).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    /// Number of ports in the range.
    #[inline]
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            usize::from(self.max - self.min) + 1
        }
    }

    /// True if `port` lies inside the range.
    #[inline]
    pub fn contains(&self, port: u16) -> bool {
        self.min <= port && port <= self.max
    }

    /// True if both ranges share at least one port.
    pub fn overlaps(&self, other: &PortRange) -> bool {
        !self.is_empty() && !other.is_empty() && self.min <= other.max && other.min <= self.max
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

/// Computes the port slice of the worker with 1-based `ordinal`.
///
/// # Example
/// ```
/// use poolvisor::partition::{worker_port_range, PortRange};
///
/// let pool = PortRange::new(10000, 10099);
/// assert_eq!(worker_port_range(pool, 2, 1), PortRange::new(10000, 10049));
/// assert_eq!(worker_port_range(pool, 2, 2), PortRange::new(10050, 10097));
/// ```
///
/// # Panics
/// Panics if `workers` or `ordinal` is zero.
pub fn worker_port_range(range: PortRange, workers: usize, ordinal: usize) -> PortRange {
    assert!(workers > 0, "worker count must be positive");
    assert!(ordinal > 0, "worker ordinal is 1-based");

    let min = u64::from(range.min);
    let span = u64::from(range.max).saturating_sub(min);
    let slice = span / workers as u64;

    let mut base = min + slice * (ordinal as u64 - 1);
    let mut top = base + slice;

    if base % 2 != 0 {
        base += 1;
    }
    if top % 2 == 0 {
        top = top.saturating_sub(1);
    }

    // An odd last port leaves no even lower bound to start from.
    if base > u64::from(u16::MAX) {
        return PortRange::new(u16::MAX, u16::MAX - 1);
    }
    PortRange::new(clamp_port(base), clamp_port(top))
}

/// Computes the slices of all `workers`, in ordinal order.
pub fn partition(range: PortRange, workers: usize) -> Vec<PortRange> {
    (1..=workers)
        .map(|ordinal| worker_port_range(range, workers, ordinal))
        .collect()
}

#[inline]
fn clamp_port(port: u64) -> u16 {
    u16::try_from(port).unwrap_or(u16::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_disjoint_and_contained(range: PortRange, workers: usize) {
        let slices = partition(range, workers);
        assert_eq!(slices.len(), workers);
        for (i, a) in slices.iter().enumerate() {
            if a.is_empty() {
                continue;
            }
            assert!(range.contains(a.min) && range.contains(a.max), "{a} outside {range}");
            for b in &slices[i + 1..] {
                assert!(!a.overlaps(b), "{a} overlaps {b} (workers={workers})");
            }
        }
    }

    #[test]
    fn two_workers_concrete_split() {
        let pool = PortRange::new(10000, 10099);
        assert_eq!(
            partition(pool, 2),
            vec![PortRange::new(10000, 10049), PortRange::new(10050, 10097)]
        );
    }

    #[test]
    fn bounds_are_even_and_odd() {
        let pool = PortRange::new(10001, 59999);
        for workers in 1..=16 {
            for slice in partition(pool, workers) {
                assert_eq!(slice.min % 2, 0, "{slice}");
                assert_eq!(slice.max % 2, 1, "{slice}");
            }
        }
    }

    #[test]
    fn slices_never_overlap() {
        let ranges = [
            PortRange::new(10000, 59999),
            PortRange::new(1024, 65535),
            PortRange::new(40000, 40100),
            PortRange::new(20001, 20063),
        ];
        for range in ranges {
            for workers in 1..=64 {
                assert_disjoint_and_contained(range, workers);
            }
        }
    }

    #[test]
    fn deterministic() {
        let pool = PortRange::new(10000, 59999);
        assert_eq!(partition(pool, 12), partition(pool, 12));
    }

    #[test]
    fn single_worker_takes_whole_range() {
        assert_eq!(
            worker_port_range(PortRange::new(10000, 59999), 1, 1),
            PortRange::new(10000, 59999)
        );
    }

    #[test]
    fn tiny_range_yields_empty_slices() {
        // slice = 10 / 8 = 1: base and top cross after parity adjustment.
        let slices = partition(PortRange::new(10000, 10010), 8);
        assert!(slices.iter().any(PortRange::is_empty));
        assert_eq!(slices[0], PortRange::new(10000, 10001));
        assert!(slices[1].is_empty());
    }

    #[test]
    fn top_of_port_space_does_not_overflow() {
        let slice = worker_port_range(PortRange::new(65535, 65535), 1, 1);
        assert!(slice.is_empty(), "{slice}");
        assert_eq!(slice.len(), 0);

        let slice = worker_port_range(PortRange::new(65534, 65535), 1, 1);
        assert_eq!(slice, PortRange::new(65534, 65535));
    }

    #[test]
    fn non_empty_slices_keep_parity_at_top_of_port_space() {
        for min in [65000u16, 65001, 65530, 65533] {
            for workers in 1..=8 {
                for slice in partition(PortRange::new(min, u16::MAX), workers) {
                    if slice.is_empty() {
                        continue;
                    }
                    assert_eq!(slice.min % 2, 0, "{slice}");
                    assert_eq!(slice.max % 2, 1, "{slice}");
                }
            }
        }
    }
}
