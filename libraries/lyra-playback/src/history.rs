//! Bounded command history
//!
//! Fixed-capacity ring with index wraparound. Once full, every push
//! overwrites the oldest entry, so memory use never grows past `capacity`.

/// Ring buffer of the most recent entries (newest = top)
#[derive(Debug, Clone)]
pub struct CommandHistory<T> {
    /// Slot storage, length == capacity
    slots: Box<[Option<T>]>,

    /// Index of the oldest entry
    head: usize,

    /// Number of occupied slots
    len: usize,
}

impl<T> CommandHistory<T> {
    /// Create history with the given capacity (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Record an entry
    ///
    /// Returns the evicted oldest entry when the history was full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len == capacity {
            let evicted = self.slots[self.head].replace(entry);
            self.head = (self.head + 1) % capacity;
            evicted
        } else {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(entry);
            self.len += 1;
            None
        }
    }

    /// Remove and return the most recent entry
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        let top = (self.head + self.len - 1) % self.capacity();
        self.len -= 1;
        self.slots[top].take()
    }

    /// Most recent entry without removing it
    pub fn peek(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let top = (self.head + self.len - 1) % self.capacity();
        self.slots[top].as_ref()
    }

    /// Entries from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let capacity = self.capacity();
        (0..self.len).filter_map(move |i| self.slots[(self.head + i) % capacity].as_ref())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_and_pop_in_lifo_order() {
        let mut history = CommandHistory::new(3);
        history.push(1);
        history.push(2);

        assert_eq!(history.peek(), Some(&2));
        assert_eq!(history.pop(), Some(2));
        assert_eq!(history.pop(), Some(1));
        assert_eq!(history.pop(), None);
    }

    #[test]
    fn overflow_evicts_oldest() {
        let mut history = CommandHistory::new(3);
        assert_eq!(history.push(1), None);
        assert_eq!(history.push(2), None);
        assert_eq!(history.push(3), None);
        assert_eq!(history.push(4), Some(1));

        assert_eq!(history.len(), 3);
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![2, 3, 4]);
    }

    #[test]
    fn wraparound_after_pop() {
        let mut history = CommandHistory::new(3);
        for i in 1..=5 {
            history.push(i);
        }
        assert_eq!(history.pop(), Some(5));
        history.push(6);
        history.push(7);

        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![4, 6, 7]);
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn zero_capacity_is_bumped_to_one() {
        let mut history = CommandHistory::new(0);
        assert_eq!(history.capacity(), 1);
        history.push("a");
        assert_eq!(history.push("b"), Some("a"));
    }
}
