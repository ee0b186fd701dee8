use std::collections::VecDeque;

/// FIFO that keeps at most `capacity` items, dropping the oldest on overflow.
#[derive(Debug, Clone)]
pub struct BoundedQueue<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity.min(256)),
            capacity,
        }
    }

    /// Append an item. Returns how many old items were evicted to make room.
    pub fn push(&mut self, item: T) -> usize {
        self.items.push_back(item);
        let mut dropped = 0;
        while self.items.len() > self.capacity {
            self.items.pop_front();
            dropped += 1;
        }
        dropped
    }

    /// Remove and yield every queued item in arrival order.
    pub fn drain(&mut self) -> std::collections::vec_deque::Drain<'_, T> {
        self.items.drain(..)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_order_below_capacity() {
        let mut queue = BoundedQueue::new(4);
        for i in 0..4 {
            assert_eq!(queue.push(i), 0);
        }
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_drops_oldest_on_overflow() {
        let mut queue = BoundedQueue::new(3);
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.push(5), 1);
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec![3, 4, 5]);
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut queue = BoundedQueue::new(0);
        assert_eq!(queue.capacity(), 1);
        queue.push("a");
        assert_eq!(queue.push("b"), 1);
        assert_eq!(queue.drain().collect::<Vec<_>>(), vec!["b"]);
    }
}
