//! Monotonic identity generation.

use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonic id generator.
///
/// Every [`Context`](crate::context::Context) owns one and hands it to the
/// events, controllers, threads and executors it creates, so ids are unique
/// per context and reset naturally when a context is torn down.
#[derive(Debug)]
pub struct Sequence {
    next: AtomicU64,
}

impl Sequence {
    /// Creates a sequence whose first id is `1`.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates a sequence whose first id is `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Returns the id that the next call to [`Sequence::next_id`] will hand out.
    #[must_use]
    pub fn peek(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_sequence_is_monotonic() {
        let seq = Sequence::new();
        assert_eq!(seq.next_id(), 1);
        assert_eq!(seq.next_id(), 2);
        assert_eq!(seq.peek(), 3);
    }

    #[test]
    fn test_sequence_shared_across_threads() {
        let seq = Arc::new(Sequence::starting_at(100));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let seq = seq.clone();
                std::thread::spawn(move || (0..10).map(|_| seq.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut ids: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 40);
        assert_eq!(ids[0], 100);
    }
}
