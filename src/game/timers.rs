//! Deferred one-shot room actions keyed by wall-clock fire time

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use crate::util::time::Millis;

#[derive(Debug)]
struct Entry<A> {
    fire_at: Millis,
    seq: u64,
    action: A,
}

impl<A> PartialEq for Entry<A> {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}

impl<A> Eq for Entry<A> {}

impl<A> PartialOrd for Entry<A> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<A> Ord for Entry<A> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.fire_at, self.seq).cmp(&(other.fire_at, other.seq))
    }
}

/// Min-heap of pending actions.
///
/// Actions scheduled for the same instant pop in scheduling order. Nothing is
/// ever cancelled; whoever drains the queue re-checks room state before acting.
#[derive(Debug)]
pub struct TimerQueue<A> {
    heap: BinaryHeap<Reverse<Entry<A>>>,
    next_seq: u64,
}

impl<A> Default for TimerQueue<A> {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }
}

impl<A> TimerQueue<A> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, fire_at: Millis, action: A) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            fire_at,
            seq,
            action,
        }));
    }

    /// Pop the earliest action whose fire time is at or before `now`
    pub fn pop_due(&mut self, now: Millis) -> Option<(Millis, A)> {
        match self.heap.peek() {
            Some(Reverse(entry)) if entry.fire_at <= now => {}
            _ => return None,
        }
        self.heap
            .pop()
            .map(|Reverse(entry)| (entry.fire_at, entry.action))
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
