use std::sync::atomic::{AtomicI32, Ordering};

/// Largest correlation number the controller accepts.
///
/// Numbers repeat after this many allocations. That is a bound on how many
/// transactions may be outstanding at once, not an identity guarantee.
pub const MAX_CORRELATION: i32 = 10_000;

/// Hands out correlation numbers `1..=MAX_CORRELATION`, wrapping to 1.
///
/// `0` is never allocated; on the wire it means "no reply wanted".
#[derive(Debug, Default)]
pub struct CorrelationAllocator {
    last: AtomicI32,
}

impl CorrelationAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start as if `last` had just been allocated.
    pub fn with_last(last: i32) -> Self {
        Self {
            last: AtomicI32::new(last),
        }
    }

    /// Allocate the next correlation number.
    pub fn next_id(&self) -> i32 {
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(successor(last))
            })
            .unwrap_or_else(|last| last);
        successor(previous)
    }

    /// The most recently allocated number, 0 before the first allocation.
    pub fn last(&self) -> i32 {
        self.last.load(Ordering::Acquire)
    }
}

fn successor(last: i32) -> i32 {
    if (1..MAX_CORRELATION).contains(&last) {
        last + 1
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn starts_at_one() {
        let ids = CorrelationAllocator::new();
        assert_eq!(ids.next_id(), 1);
        assert_eq!(ids.next_id(), 2);
        assert_eq!(ids.last(), 2);
    }

    #[test]
    fn wraps_after_max() {
        let ids = CorrelationAllocator::with_last(MAX_CORRELATION);
        assert_eq!(ids.next_id(), 1);

        let ids = CorrelationAllocator::with_last(MAX_CORRELATION - 1);
        assert_eq!(ids.next_id(), MAX_CORRELATION);
        assert_eq!(ids.next_id(), 1);
    }

    #[test]
    fn out_of_range_state_restarts_at_one() {
        assert_eq!(CorrelationAllocator::with_last(-3).next_id(), 1);
        assert_eq!(CorrelationAllocator::with_last(20_000).next_id(), 1);
    }

    #[test]
    fn concurrent_callers_get_distinct_ids() {
        let ids = Arc::new(CorrelationAllocator::with_last(9_000));
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..1_250).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for worker in workers {
            for id in worker.join().unwrap() {
                assert!((1..=MAX_CORRELATION).contains(&id));
                assert!(seen.insert(id), "id {id} issued twice");
            }
        }
        assert_eq!(seen.len(), 10_000);
    }
}
