//! Discrete-event scheduler
//!
//! Events are ordered by time, then by insertion order, so two events
//! scheduled for the same instant fire in the order they were scheduled.
//! Cancellation is lazy: cancelled entries stay in the heap and are skipped
//! when popped.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};
use std::time::Duration;

use crate::error::SimError;

/// Handle for cancelling a scheduled event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

struct Entry<E> {
    at: Duration,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    // Reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Min-heap event queue with a simulation clock
pub struct Scheduler<E> {
    now: Duration,
    next_seq: u64,
    queue: BinaryHeap<Entry<E>>,
    cancelled: HashSet<u64>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self {
            now: Duration::ZERO,
            next_seq: 0,
            queue: BinaryHeap::new(),
            cancelled: HashSet::new(),
        }
    }

    /// Current simulation time
    pub fn now(&self) -> Duration {
        self.now
    }

    /// Number of live (not cancelled) events
    pub fn len(&self) -> usize {
        self.queue.len() - self.cancelled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Schedule `event` at absolute time `at`
    pub fn schedule_at(&mut self, at: Duration, event: E) -> Result<EventId, SimError> {
        if at < self.now {
            return Err(SimError::ScheduleInPast { at, now: self.now });
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry { at, seq, event });
        Ok(EventId(seq))
    }

    /// Schedule `event` `delay` after the current time
    pub fn schedule_after(&mut self, delay: Duration, event: E) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Entry {
            at: self.now + delay,
            seq,
            event,
        });
        EventId(seq)
    }

    /// Cancel a pending event. Cancelling an event that already fired is a no-op.
    pub fn cancel(&mut self, id: EventId) {
        if id.0 < self.next_seq && self.queue.iter().any(|e| e.seq == id.0) {
            self.cancelled.insert(id.0);
        }
    }

    /// Time of the next live event
    pub fn peek_time(&mut self) -> Option<Duration> {
        self.skip_cancelled();
        self.queue.peek().map(|e| e.at)
    }

    /// Remove the next live event and advance the clock to it
    pub fn pop(&mut self) -> Option<(Duration, E)> {
        self.skip_cancelled();
        let entry = self.queue.pop()?;
        self.now = entry.at;
        Some((entry.at, entry.event))
    }

    fn skip_cancelled(&mut self) {
        while let Some(top) = self.queue.peek() {
            if !self.cancelled.remove(&top.seq) {
                break;
            }
            self.queue.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn us(n: u64) -> Duration {
        Duration::from_micros(n)
    }

    #[test]
    fn test_pops_in_time_order() {
        let mut s = Scheduler::new();
        s.schedule_at(us(30), "c").unwrap();
        s.schedule_at(us(10), "a").unwrap();
        s.schedule_at(us(20), "b").unwrap();

        assert_eq!(s.pop(), Some((us(10), "a")));
        assert_eq!(s.now(), us(10));
        assert_eq!(s.pop(), Some((us(20), "b")));
        assert_eq!(s.pop(), Some((us(30), "c")));
        assert_eq!(s.pop(), None);
    }

    #[test]
    fn test_same_time_is_fifo() {
        let mut s = Scheduler::new();
        for i in 0..5 {
            s.schedule_at(us(7), i).unwrap();
        }
        let order: Vec<_> = std::iter::from_fn(|| s.pop().map(|(_, e)| e)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_cancel_skips_event() {
        let mut s = Scheduler::new();
        let a = s.schedule_at(us(1), 'a').unwrap();
        s.schedule_at(us(2), 'b').unwrap();
        s.cancel(a);

        assert_eq!(s.len(), 1);
        assert_eq!(s.peek_time(), Some(us(2)));
        assert_eq!(s.pop(), Some((us(2), 'b')));
        assert!(s.is_empty());
    }

    #[test]
    fn test_cancel_after_fire_is_noop() {
        let mut s = Scheduler::new();
        let a = s.schedule_at(us(1), 'a').unwrap();
        assert!(s.pop().is_some());
        s.cancel(a);
        assert_eq!(s.len(), 0);
    }

    #[test]
    fn test_schedule_in_past_rejected() {
        let mut s = Scheduler::new();
        s.schedule_at(us(10), ()).unwrap();
        s.pop();
        assert!(matches!(
            s.schedule_at(us(5), ()),
            Err(SimError::ScheduleInPast { .. })
        ));
        let id = s.schedule_after(us(5), ());
        assert_eq!(s.pop(), Some((us(15), ())));
        s.cancel(id);
    }
}
