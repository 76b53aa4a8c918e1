use std::collections::VecDeque;

/// Newest-first buffer that evicts from the tail once full.
#[derive(Debug, Clone)]
pub struct BoundedRing<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedRing<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert at the head, evicting the oldest entries beyond capacity.
    pub fn push_front(&mut self, item: T) {
        self.items.push_front(item);
        self.items.truncate(self.capacity);
    }

    pub fn front(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
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

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sixty_pushes_keep_the_fifty_newest() {
        let mut ring = BoundedRing::new(50);
        for i in 0..60 {
            ring.push_front(i);
        }

        assert_eq!(ring.len(), 50);
        assert_eq!(ring.front(), Some(&59));
        let items: Vec<i32> = ring.iter().copied().collect();
        assert_eq!(items, (10..60).rev().collect::<Vec<_>>());
    }

    #[test]
    fn clear_empties() {
        let mut ring = BoundedRing::new(3);
        ring.push_front("a");
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.capacity(), 3);
    }
}
