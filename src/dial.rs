/// Monotone bucket queue (Dial's algorithm).
///
/// Keys are computed by the caller at push time and never re-evaluated, so an entry stays in
/// the bucket it was pushed into even if the state behind its key changes afterwards.
/// Entries within a bucket are served last-in first-out.
pub struct Dial<T> {
    buckets: Vec<Vec<T>>,
    current: usize,
    len: usize,
}

impl<T> Dial<T> {
    /// Queue accepting keys in `0..=max_key`.
    pub fn new(max_key: usize) -> Self {
        let mut buckets = Vec::with_capacity(max_key + 1);
        buckets.resize_with(max_key + 1, Vec::new);
        Self { buckets, current: 0, len: 0 }
    }

    pub fn max_key(&self) -> usize { self.buckets.len() - 1 }

    /// Grows the key range; never shrinks.
    pub fn reserve_keys(&mut self, max_key: usize) {
        if max_key + 1 > self.buckets.len() {
            self.buckets.resize_with(max_key + 1, Vec::new);
        }
    }

    pub fn push(&mut self, key: usize, entry: T) {
        assert!(key <= self.max_key(), "Key {key} exceeds the queue range of {}.", self.max_key());
        if key < self.current {
            self.current = key;
        }
        self.buckets[key].push(entry);
        self.len += 1;
    }

    fn advance(&mut self) {
        while self.current < self.buckets.len() && self.buckets[self.current].is_empty() {
            self.current += 1;
        }
    }

    /// Smallest key currently present.
    pub fn top_key(&mut self) -> Option<usize> {
        if self.len == 0 {
            return None;
        }
        self.advance();
        Some(self.current)
    }

    pub fn top(&mut self) -> Option<&T> {
        let key = self.top_key()?;
        self.buckets[key].last()
    }

    pub fn pop(&mut self) -> Option<T> {
        let key = self.top_key()?;
        let entry = self.buckets[key].pop();
        debug_assert!(entry.is_some());
        self.len -= 1;
        entry
    }

    pub fn len(&self) -> usize { self.len }

    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Empties every bucket, keeping their allocations.
    pub fn clear(&mut self) {
        for bucket in self.buckets.iter_mut() {
            bucket.clear();
        }
        self.current = 0;
        self.len = 0;
    }
}
