//! Chained hash map with caller supplied hash and compare functions
//!
//! Buckets live in one flat array. The first entry of a bucket is stored in the
//! array itself; colliding entries hang off it in a singly linked chain. The
//! table doubles (and rehashes every entry) whenever the load factor reaches
//! [`SPACE_RATIO`] on insert.
//!
//! Absence is expressed through `Option`: `get`/`remove` of an unknown key and
//! `put` of a fresh key all return `None`. Keys and values can never be "null",
//! so the silent no-op the table performs for null input in C-style variants of
//! this container cannot arise here.

use std::mem;

/// Load factor at which the table doubles on the next insert
pub const SPACE_RATIO: f32 = 0.5;

/// Hash function: any key maps to an unsigned integer, reduced modulo capacity
pub type HashFn<K> = fn(&K) -> u64;

/// Compare function: `0` means the keys are equal
pub type CompareFn<K> = fn(&K, &K) -> i64;

struct Entry<K, V> {
    key: K,
    value: V,
}

struct ChainNode<K, V> {
    key: K,
    value: V,
    next: Option<Box<ChainNode<K, V>>>,
}

/// One array slot. `chain` is always `None` while `head` is `None`.
struct Bucket<K, V> {
    head: Option<Entry<K, V>>,
    chain: Option<Box<ChainNode<K, V>>>,
}

impl<K, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self {
            head: None,
            chain: None,
        }
    }
}

/// Generic associative container with intrusive chaining
pub struct ChainedHashMap<K, V> {
    buckets: Vec<Bucket<K, V>>,
    count: usize,
    hash: HashFn<K>,
    compare: CompareFn<K>,
}

impl<K, V> ChainedHashMap<K, V> {
    /// Creates an empty map with `initial_capacity` buckets
    ///
    /// # Panics
    /// Panics if `initial_capacity` is zero.
    pub fn new(hash: HashFn<K>, compare: CompareFn<K>, initial_capacity: usize) -> Self {
        assert!(initial_capacity > 0, "hash map capacity must be positive");

        Self {
            buckets: Self::alloc_buckets(initial_capacity),
            count: 0,
            hash,
            compare,
        }
    }

    fn alloc_buckets(capacity: usize) -> Vec<Bucket<K, V>> {
        (0..capacity).map(|_| Bucket::default()).collect()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Size of the bucket array
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    fn probe(&self, key: &K) -> usize {
        ((self.hash)(key) % self.buckets.len() as u64) as usize
    }

    fn matches(&self, a: &K, b: &K) -> bool {
        (self.compare)(a, b) == 0
    }

    /// Returns the value stored for `key`
    pub fn get(&self, key: &K) -> Option<&V> {
        if self.count == 0 {
            return None;
        }

        let bucket = &self.buckets[self.probe(key)];
        let head = bucket.head.as_ref()?;
        if self.matches(key, &head.key) {
            return Some(&head.value);
        }

        let mut node = bucket.chain.as_deref();
        while let Some(n) = node {
            if self.matches(key, &n.key) {
                return Some(&n.value);
            }
            node = n.next.as_deref();
        }

        None
    }

    /// Returns a mutable reference to the value stored for `key`
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        if self.count == 0 {
            return None;
        }

        let compare = self.compare;
        let index = self.probe(key);
        let bucket = &mut self.buckets[index];

        let head = bucket.head.as_mut()?;
        if compare(key, &head.key) == 0 {
            return Some(&mut head.value);
        }

        let mut node = bucket.chain.as_deref_mut();
        while let Some(n) = node {
            if compare(key, &n.key) == 0 {
                return Some(&mut n.value);
            }
            node = n.next.as_deref_mut();
        }

        None
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Associates `value` with `key`
    ///
    /// Returns the previously associated value if an equal key was already
    /// present (the stored key is kept), otherwise `None`.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        self.ensure_capacity();
        self.insert_entry(key, value)
    }

    fn insert_entry(&mut self, key: K, value: V) -> Option<V> {
        let compare = self.compare;
        let index = self.probe(&key);
        let bucket = &mut self.buckets[index];

        if bucket.head.is_none() {
            bucket.head = Some(Entry { key, value });
            self.count += 1;
            return None;
        }

        if let Some(head) = bucket.head.as_mut() {
            if compare(&key, &head.key) == 0 {
                return Some(mem::replace(&mut head.value, value));
            }
        }

        let mut link = &mut bucket.chain;
        while let Some(node) = link {
            if compare(&key, &node.key) == 0 {
                return Some(mem::replace(&mut node.value, value));
            }
            link = &mut node.next;
        }

        *link = Some(Box::new(ChainNode {
            key,
            value,
            next: None,
        }));
        self.count += 1;
        None
    }

    /// Removes `key` and returns its value
    ///
    /// Removing a bucket head that has a chain behind it promotes the first
    /// chain node into the array slot.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if self.count == 0 {
            return None;
        }

        let compare = self.compare;
        let index = self.probe(key);
        let bucket = &mut self.buckets[index];

        let head_matches = match &bucket.head {
            Some(head) => compare(key, &head.key) == 0,
            None => return None,
        };

        if head_matches {
            let removed = bucket.head.take();
            if let Some(promoted) = bucket.chain.take() {
                let ChainNode { key, value, next } = *promoted;
                bucket.head = Some(Entry { key, value });
                bucket.chain = next;
            }
            self.count -= 1;
            return removed.map(|entry| entry.value);
        }

        let mut link = &mut bucket.chain;
        while link
            .as_ref()
            .is_some_and(|node| compare(key, &node.key) != 0)
        {
            if let Some(node) = link {
                link = &mut node.next;
            }
        }

        let ChainNode { value, next, .. } = *link.take()?;
        *link = next;
        self.count -= 1;
        Some(value)
    }

    /// Empties the map, keeping the current capacity
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.head = None;

            // unlink node by node so long chains don't recurse on drop
            let mut chain = bucket.chain.take();
            while let Some(mut node) = chain {
                chain = node.next.take();
            }
        }
        self.count = 0;
    }

    /// Multiplies the bucket count by `factor` and rehashes every entry
    pub fn increase_capacity(&mut self, factor: usize) {
        let new_capacity = self.buckets.len() * factor.max(1);
        let old = mem::replace(&mut self.buckets, Self::alloc_buckets(new_capacity));
        self.count = 0;

        for bucket in old {
            let Bucket { head, mut chain } = bucket;
            if let Some(Entry { key, value }) = head {
                self.insert_entry(key, value);
            }

            while let Some(node) = chain {
                let ChainNode { key, value, next } = *node;
                chain = next;
                self.insert_entry(key, value);
            }
        }
    }

    fn ensure_capacity(&mut self) {
        if (self.count as f32 / self.buckets.len() as f32) < SPACE_RATIO {
            return;
        }
        self.increase_capacity(2);
    }

    /// Key at `position` within bucket `bucket` (0 is the array slot)
    fn key_at(&self, bucket: usize, position: usize) -> Option<&K> {
        let bucket = self.buckets.get(bucket)?;
        let head = bucket.head.as_ref()?;
        if position == 0 {
            return Some(&head.key);
        }

        let mut node = bucket.chain.as_deref();
        for _ in 1..position {
            node = node?.next.as_deref();
        }
        node.map(|n| &n.key)
    }

    /// Borrowing iterator over all entries, bucket by bucket
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            buckets: self.buckets.iter(),
            chain: None,
        }
    }

    /// Starts a cursor that tolerates removal of the key it just yielded
    pub fn cursor(&self) -> Cursor<K> {
        Cursor {
            bucket: 0,
            position: 0,
            last: None,
        }
    }
}

impl<K, V> Drop for ChainedHashMap<K, V> {
    fn drop(&mut self) {
        self.clear();
    }
}

pub struct Iter<'a, K, V> {
    buckets: std::slice::Iter<'a, Bucket<K, V>>,
    chain: Option<&'a ChainNode<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(node) = self.chain {
            self.chain = node.next.as_deref();
            return Some((&node.key, &node.value));
        }

        for bucket in self.buckets.by_ref() {
            if let Some(head) = &bucket.head {
                self.chain = bucket.chain.as_deref();
                return Some((&head.key, &head.value));
            }
        }

        None
    }
}

/// Detached iteration cursor
///
/// The cursor holds no borrow of the map, so the caller may remove the key it
/// just received before asking for the next one. When that removal shifts the
/// rest of the bucket back by one (head promotion or chain unlink) the cursor
/// notices that its last key is gone and steps back instead of skipping.
/// Inserting while iterating may trigger a rehash and is not supported.
pub struct Cursor<K> {
    bucket: usize,
    position: usize,
    last: Option<K>,
}

impl<K: Clone> Cursor<K> {
    /// Returns the next key, or `None` once every bucket has been visited
    pub fn next<V>(&mut self, map: &ChainedHashMap<K, V>) -> Option<K> {
        if let Some(last) = self.last.take() {
            let still_there = self.position > 0
                && map
                    .key_at(self.bucket, self.position - 1)
                    .is_some_and(|key| map.matches(key, &last));
            if self.position > 0 && !still_there {
                self.position -= 1;
            }
        }

        while self.bucket < map.capacity() {
            if let Some(key) = map.key_at(self.bucket, self.position) {
                self.position += 1;
                self.last = Some(key.clone());
                return Some(key.clone());
            }
            self.bucket += 1;
            self.position = 0;
        }

        None
    }

    /// Like [`Cursor::next`] but also hands back the value
    pub fn next_entry<'m, V>(&mut self, map: &'m ChainedHashMap<K, V>) -> Option<(K, &'m V)> {
        let key = self.next(map)?;
        let value = map.get(&key)?;
        Some((key, value))
    }
}
