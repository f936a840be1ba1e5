use std::fmt;

/// A binary min-heap ordered by a comparator supplied at construction.
///
/// `less(a, b)` must return `true` when `a` should come out of the queue before `b`. Items
/// that compare equal come out in no particular order.
///
/// The queue has no synchronization of its own.
///
/// # Examples
///
/// Basic usage:
///
/// ```
/// use dispatch_delay_queue::PriorityQueue;
///
/// let mut queue = PriorityQueue::new(|a: &i32, b: &i32| a < b);
/// queue.push(3);
/// queue.push(1);
/// queue.push(2);
///
/// assert_eq!(queue.peek(), Some(&1));
/// assert_eq!(queue.pop(), Some(1));
/// assert_eq!(queue.pop(), Some(2));
/// assert_eq!(queue.pop(), Some(3));
/// assert_eq!(queue.pop(), None);
/// ```
pub struct PriorityQueue<T, F> {
    items: Vec<T>,
    less: F,
}

impl<T, F> PriorityQueue<T, F>
where
    F: Fn(&T, &T) -> bool,
{
    /// Creates an empty `PriorityQueue` ordered by `less`.
    pub fn new(less: F) -> PriorityQueue<T, F> {
        PriorityQueue::with_capacity(less, 0)
    }

    /// Creates an empty `PriorityQueue` with room for `capacity` items before it has to
    /// reallocate. The capacity is only a hint; the queue grows as needed.
    pub fn with_capacity(less: F, capacity: usize) -> PriorityQueue<T, F> {
        PriorityQueue {
            items: Vec::with_capacity(capacity),
            less,
        }
    }

    /// Inserts an item. O(log n).
    pub fn push(&mut self, item: T) {
        self.items.push(item);
        let last = self.items.len() - 1;
        self.sift_up(last);
    }

    /// Removes and returns the minimum item, or `None` if the queue is empty. O(log n).
    pub fn pop(&mut self) -> Option<T> {
        if self.items.is_empty() {
            return None;
        }

        let min = self.items.swap_remove(0);
        if !self.items.is_empty() {
            self.sift_down(0);
        }
        Some(min)
    }

    /// Returns the minimum item without removing it, or `None` if the queue is empty. O(1).
    pub fn peek(&self) -> Option<&T> {
        self.items.first()
    }

    /// Returns the number of items in the queue.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Checks if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if !(self.less)(&self.items[pos], &self.items[parent]) {
                break;
            }
            self.items.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.items.len();
        loop {
            let left = 2 * pos + 1;
            if left >= len {
                break;
            }

            let right = left + 1;
            let child = if right < len && (self.less)(&self.items[right], &self.items[left]) {
                right
            } else {
                left
            };

            if !(self.less)(&self.items[child], &self.items[pos]) {
                break;
            }
            self.items.swap(pos, child);
            pos = child;
        }
    }
}

impl<T: fmt::Debug, F> fmt::Debug for PriorityQueue<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("items", &self.items)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::PriorityQueue;

    #[test]
    fn pop_in_ascending_order() {
        let mut queue = PriorityQueue::new(|a: &u32, b: &u32| a < b);

        for value in &[5, 3, 9, 1, 7, 3, 8, 0] {
            queue.push(*value);
        }
        assert_eq!(queue.len(), 8);

        let mut popped = vec![];
        while let Some(value) = queue.pop() {
            popped.push(value);
        }

        assert_eq!(popped, vec![0, 1, 3, 3, 5, 7, 8, 9]);
        assert!(queue.is_empty());
    }

    #[test]
    fn peek_does_not_remove() {
        let mut queue = PriorityQueue::new(|a: &i64, b: &i64| a < b);
        queue.push(20);
        queue.push(10);

        assert_eq!(queue.peek(), Some(&10));
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(10));
        assert_eq!(queue.peek(), Some(&20));
    }

    #[test]
    fn empty_queue() {
        let mut queue = PriorityQueue::with_capacity(|a: &i32, b: &i32| a < b, 16);

        assert!(queue.is_empty());
        assert_eq!(queue.peek(), None);
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn comparator_decides_order() {
        let mut queue = PriorityQueue::new(|a: &&str, b: &&str| a.len() > b.len());
        queue.push("a");
        queue.push("abc");
        queue.push("ab");

        assert_eq!(queue.pop(), Some("abc"));
        assert_eq!(queue.pop(), Some("ab"));
        assert_eq!(queue.pop(), Some("a"));
    }

    #[test]
    fn interleaved_push_pop() {
        let mut queue = PriorityQueue::new(|a: &i32, b: &i32| a < b);

        queue.push(4);
        queue.push(2);
        assert_eq!(queue.pop(), Some(2));

        queue.push(1);
        queue.push(3);
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.pop(), Some(3));
        assert_eq!(queue.pop(), Some(4));
        assert_eq!(queue.pop(), None);
    }
}
