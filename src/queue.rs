use std::collections::{HashMap, VecDeque};

use crate::error::QueueError;

/// Fairness label attached to each queued element.
pub type Tag = i64;

#[derive(Debug)]
struct TagBucket<T> {
    fifo: VecDeque<T>,
    next: Option<Tag>,
}

impl<T> TagBucket<T> {
    fn new() -> Self {
        Self {
            fifo: VecDeque::new(),
            next: None,
        }
    }
}

/// A FIFO container that serves its tags round-robin.
///
/// Elements are grouped into per-tag buckets, and the currently non-empty
/// buckets form a singly linked ready list. `dequeue` pops from the head
/// bucket and then rotates that bucket to the tail while it still holds
/// elements, so between two dequeues of the same tag every other ready tag
/// gets a turn. Within a tag, elements come out in insertion order.
///
/// # Thread Safety
/// Not internally synchronised. The queue has a single owner; callers that
/// share it across threads must wrap every operation under their own lock,
/// the way `FairPool` does.
///
/// # Performance Characteristics
/// - O(1) enqueue, dequeue, and observers
/// - Buckets are created on first use for a tag and persist for the life of
///   the queue, re-entering the ready list when they become non-empty again
#[derive(Debug)]
pub struct FairQueue<T> {
    /// Every bucket ever created, keyed by tag.
    buckets: HashMap<Tag, TagBucket<T>>,
    /// First tag in the ready list; `None` when the queue is empty.
    head: Option<Tag>,
    /// Last tag in the ready list.
    tail: Option<Tag>,
    /// Total element count across all buckets.
    len: usize,
}

impl<T> FairQueue<T> {
    pub fn new() -> Self {
        Self {
            buckets: HashMap::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    /// Appends `value` under `tag`. A bucket that was empty before this call
    /// joins the ready list at the tail.
    pub fn enqueue(&mut self, tag: Tag, value: T) {
        let bucket = self.buckets.entry(tag).or_insert_with(TagBucket::new);
        let was_empty = bucket.fifo.is_empty();
        bucket.fifo.push_back(value);
        self.len += 1;
        if was_empty {
            self.link_tail(tag);
        }
    }

    /// Appends `value` under the default tag 0.
    pub fn enqueue_untagged(&mut self, value: T) {
        self.enqueue(0, value);
    }

    /// Removes and returns the oldest element of the head bucket together
    /// with its tag, then rotates the ready list so another tag is served
    /// next.
    pub fn dequeue(&mut self) -> Result<(T, Tag), QueueError> {
        let tag = self.head.ok_or(QueueError::Empty)?;
        let bucket = self.buckets.get_mut(&tag).unwrap();
        let value = bucket.fifo.pop_front().unwrap();
        self.len -= 1;
        let next = bucket.next;
        let drained = bucket.fifo.is_empty();
        bucket.next = None;

        if drained {
            // Drained bucket leaves the ready list.
            self.head = next;
            if self.head.is_none() {
                self.tail = None;
            }
        } else if self.tail != Some(tag) {
            // Rotate the head bucket to the tail.
            self.head = next;
            self.link_tail(tag);
        }
        // Otherwise the bucket is the only one ready and keeps its place.

        Ok((value, tag))
    }

    /// Total number of queued elements.
    pub fn count(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of queued elements under `tag`.
    pub fn count_tagged(&self, tag: Tag) -> usize {
        self.buckets.get(&tag).map_or(0, |b| b.fifo.len())
    }

    /// Splices `tag` onto the tail of the ready list.
    fn link_tail(&mut self, tag: Tag) {
        match self.tail {
            Some(prev) => self.buckets.get_mut(&prev).unwrap().next = Some(tag),
            None => self.head = Some(tag),
        }
        self.tail = Some(tag);
    }
}

impl<T> Default for FairQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
