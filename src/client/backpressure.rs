//! Outbound queue accounting.
//!
//! The send path reserves bytes before queueing and the driver releases
//! them once the bytes hit the transport. A reservation that would push the
//! total past the limit fails instead of queueing, so queue memory stays
//! bounded and nothing is silently dropped.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Byte budget shared between the send path and the connection driver.
#[derive(Debug)]
pub struct SendBudget {
    queued: AtomicUsize,
    limit: usize,
}

impl SendBudget {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            queued: AtomicUsize::new(0),
            limit,
        }
    }

    /// Try to reserve `bytes`. Returns the new queue total on success, or
    /// the total that would have resulted on failure.
    pub fn try_reserve(&self, bytes: usize) -> Result<usize, usize> {
        let mut current = self.queued.load(Ordering::Acquire);
        loop {
            let next = current.saturating_add(bytes);
            if next > self.limit {
                return Err(next);
            }
            match self.queued.compare_exchange_weak(
                current,
                next,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(next),
                Err(actual) => current = actual,
            }
        }
    }

    /// Return `bytes` to the budget after they were written or discarded.
    pub fn release(&self, bytes: usize) {
        let prev = self.queued.fetch_sub(bytes, Ordering::AcqRel);
        debug_assert!(prev >= bytes, "released more than was reserved");
    }

    /// Bytes currently reserved.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::Acquire)
    }

    /// Configured limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_reserve_within_limit() {
        let budget = SendBudget::new(100);
        assert_eq!(budget.try_reserve(60), Ok(60));
        assert_eq!(budget.try_reserve(40), Ok(100));
        assert_eq!(budget.queued(), 100);
    }

    #[test]
    fn test_reserve_over_limit_fails() {
        let budget = SendBudget::new(100);
        assert_eq!(budget.try_reserve(60), Ok(60));
        assert_eq!(budget.try_reserve(41), Err(101));
        // A failed reservation leaves the total untouched.
        assert_eq!(budget.queued(), 60);
    }

    #[test]
    fn test_release_makes_room() {
        let budget = SendBudget::new(100);
        budget.try_reserve(100).unwrap();
        assert!(budget.try_reserve(1).is_err());

        budget.release(50);
        assert_eq!(budget.try_reserve(50), Ok(100));
    }

    #[test]
    fn test_zero_byte_reservation() {
        let budget = SendBudget::new(0);
        assert_eq!(budget.try_reserve(0), Ok(0));
        assert!(budget.try_reserve(1).is_err());
    }

    #[test]
    fn test_concurrent_reservations_never_exceed_limit() {
        let budget = Arc::new(SendBudget::new(1000));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let budget = budget.clone();
            handles.push(std::thread::spawn(move || {
                let mut reserved = 0usize;
                for _ in 0..1000 {
                    if budget.try_reserve(7).is_ok() {
                        reserved += 7;
                    }
                }
                reserved
            }));
        }

        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert!(total <= 1000);
        assert_eq!(budget.queued(), total);
    }
}
