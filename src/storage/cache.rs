//! The in-memory cache engine.
//!
//! One flat map from byte-string key to [`Entry`], where an entry is either
//! an opaque string or a double-ended list. The whole map lives behind a
//! single mutex which the *caller* holds: the cache itself never locks, so a
//! worker can run a multi-step command (a variadic `LPUSH`, say) as one
//! atomic sequence.
//!
//! Invariants:
//!
//! - No key ever maps to an empty list; popping the last element removes the
//!   key.
//! - An entry's kind is fixed for its lifetime: list operations on a string
//!   key (and vice versa) fail with [`CacheError::WrongType`]. Only `SET`
//!   replaces an entry wholesale.
//! - Iteration order is not observable through any operation.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

/// Failures produced by cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The key does not exist.
    #[error("key not found")]
    KeyNotFound,

    /// The entry exists but holds the other kind of value.
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,

    /// A list index outside `[0, len)`.
    #[error("index out of range")]
    OutOfRange,
}

/// A stored value: an opaque byte string, or a deque of byte strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    Str(Bytes),
    List(VecDeque<Bytes>),
}

/// The shared in-memory store.
///
/// Wrapped in `Arc<std::sync::Mutex<Cache>>` by the server; every operation
/// below assumes the caller holds that lock.
#[derive(Debug, Default)]
pub struct Cache {
    entries: HashMap<Bytes, Entry>,
}

impl Cache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `value` under `key`, replacing any existing entry of either
    /// kind. Always succeeds.
    pub fn set(&mut self, key: Bytes, value: Bytes) {
        self.entries.insert(key, Entry::Str(value));
    }

    /// Returns the string stored under `key`.
    pub fn get(&self, key: &Bytes) -> Result<Bytes, CacheError> {
        match self.entries.get(key) {
            Some(Entry::Str(value)) => Ok(value.clone()),
            Some(Entry::List(_)) => Err(CacheError::WrongType),
            None => Err(CacheError::KeyNotFound),
        }
    }

    /// Prepends `value` to the list at `key`, creating the list if absent.
    pub fn lpush(&mut self, key: Bytes, value: Bytes) -> Result<(), CacheError> {
        let list = self.list_mut(key)?;
        list.push_front(value);
        Ok(())
    }

    /// Appends `value` to the list at `key`, creating the list if absent.
    pub fn rpush(&mut self, key: Bytes, value: Bytes) -> Result<(), CacheError> {
        let list = self.list_mut(key)?;
        list.push_back(value);
        Ok(())
    }

    /// Removes and returns the head of the list at `key`.
    pub fn lpop(&mut self, key: &Bytes) -> Result<Bytes, CacheError> {
        self.pop(key, VecDeque::pop_front)
    }

    /// Removes and returns the tail of the list at `key`.
    pub fn rpop(&mut self, key: &Bytes) -> Result<Bytes, CacheError> {
        self.pop(key, VecDeque::pop_back)
    }

    /// Returns the element at zero-based `index`, counted from the head.
    ///
    /// Indices outside `[0, len)` fail with [`CacheError::OutOfRange`];
    /// negative indices are not supported.
    pub fn lindex(&self, key: &Bytes, index: i64) -> Result<Bytes, CacheError> {
        let list = match self.entries.get(key) {
            Some(Entry::List(list)) => list,
            Some(Entry::Str(_)) => return Err(CacheError::WrongType),
            None => return Err(CacheError::KeyNotFound),
        };
        usize::try_from(index)
            .ok()
            .and_then(|i| list.get(i))
            .cloned()
            .ok_or(CacheError::OutOfRange)
    }

    /// Fetches the list at `key` for mutation, creating it when absent.
    fn list_mut(&mut self, key: Bytes) -> Result<&mut VecDeque<Bytes>, CacheError> {
        match self.entries.entry(key).or_insert_with(|| Entry::List(VecDeque::new())) {
            Entry::List(list) => Ok(list),
            Entry::Str(_) => Err(CacheError::WrongType),
        }
    }

    /// Pops from one end of the list at `key`, removing the key once the
    /// list drains.
    fn pop(
        &mut self,
        key: &Bytes,
        take: fn(&mut VecDeque<Bytes>) -> Option<Bytes>,
    ) -> Result<Bytes, CacheError> {
        let list = match self.entries.get_mut(key) {
            Some(Entry::List(list)) => list,
            Some(Entry::Str(_)) => return Err(CacheError::WrongType),
            None => return Err(CacheError::KeyNotFound),
        };
        // Lists are never stored empty, so this pop always yields.
        let value = take(list).ok_or(CacheError::KeyNotFound)?;
        if list.is_empty() {
            self.entries.remove(key);
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_then_get_round_trips() {
        let mut cache = Cache::new();
        cache.set(b("KEY"), b("REDIGO"));
        assert_eq!(cache.get(&b("KEY")).unwrap(), b("REDIGO"));
    }

    #[test]
    fn get_missing_key_fails() {
        let cache = Cache::new();
        assert_eq!(cache.get(&b("KEY")), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn set_overwrites_any_existing_entry() {
        let mut cache = Cache::new();
        cache.rpush(b("KEY"), b("REDIGO")).unwrap();
        cache.set(b("KEY"), b("NIJI"));
        assert_eq!(cache.get(&b("KEY")).unwrap(), b("NIJI"));
    }

    #[test]
    fn rpush_creates_the_list_when_absent() {
        let mut cache = Cache::new();
        cache.rpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        assert_eq!(cache.rpop(&b("KEYVECTOR")).unwrap(), b("REDIGO"));
    }

    #[test]
    fn rpop_returns_elements_newest_first() {
        let mut cache = Cache::new();
        cache.rpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        cache.rpush(b("KEYVECTOR"), b("NIJI")).unwrap();
        assert_eq!(cache.rpop(&b("KEYVECTOR")).unwrap(), b("NIJI"));
        assert_eq!(cache.rpop(&b("KEYVECTOR")).unwrap(), b("REDIGO"));
        assert_eq!(cache.rpop(&b("KEYVECTOR")), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn rpop_missing_key_fails() {
        let mut cache = Cache::new();
        assert_eq!(cache.rpop(&b("KEYVECTOR")), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn popping_the_last_element_deletes_the_key() {
        let mut cache = Cache::new();
        cache.rpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        assert_eq!(cache.rpop(&b("KEYVECTOR")).unwrap(), b("REDIGO"));
        assert!(cache.is_empty());
        assert_eq!(cache.rpop(&b("KEYVECTOR")), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn lpush_and_lpop_are_lifo() {
        let mut cache = Cache::new();
        cache.lpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        cache.lpush(b("KEYVECTOR"), b("NIJI")).unwrap();
        assert_eq!(cache.lpop(&b("KEYVECTOR")).unwrap(), b("NIJI"));
        assert_eq!(cache.lpop(&b("KEYVECTOR")).unwrap(), b("REDIGO"));
        assert_eq!(cache.lpop(&b("KEYVECTOR")), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn mixed_end_pushes_keep_head_to_tail_order() {
        let mut cache = Cache::new();
        cache.lpush(b("L"), b("A")).unwrap();
        cache.rpush(b("L"), b("B")).unwrap();
        cache.lpush(b("L"), b("C")).unwrap();

        assert_eq!(cache.lindex(&b("L"), 0).unwrap(), b("C"));
        assert_eq!(cache.lindex(&b("L"), 1).unwrap(), b("A"));
        assert_eq!(cache.lindex(&b("L"), 2).unwrap(), b("B"));
    }

    #[test]
    fn lindex_head_after_mixed_pushes() {
        let mut cache = Cache::new();
        cache.lpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        cache.rpush(b("KEYVECTOR"), b("NIJI")).unwrap();
        cache.lpush(b("KEYVECTOR"), b("ANUBIS")).unwrap();
        assert_eq!(cache.lindex(&b("KEYVECTOR"), 0).unwrap(), b("ANUBIS"));
    }

    #[test]
    fn lindex_rejects_out_of_range_indices() {
        let mut cache = Cache::new();
        cache.rpush(b("KEYVECTOR"), b("REDIGO")).unwrap();
        assert_eq!(cache.lindex(&b("KEYVECTOR"), 5), Err(CacheError::OutOfRange));
        assert_eq!(cache.lindex(&b("KEYVECTOR"), -1), Err(CacheError::OutOfRange));
    }

    #[test]
    fn lindex_missing_key_fails() {
        let cache = Cache::new();
        assert_eq!(cache.lindex(&b("KEYVECTOR"), 0), Err(CacheError::KeyNotFound));
    }

    #[test]
    fn entry_kinds_do_not_mix() {
        let mut cache = Cache::new();
        cache.set(b("S"), b("REDIGO"));
        cache.rpush(b("V"), b("NIJI")).unwrap();

        assert_eq!(cache.rpush(b("S"), b("X")), Err(CacheError::WrongType));
        assert_eq!(cache.lpush(b("S"), b("X")), Err(CacheError::WrongType));
        assert_eq!(cache.lpop(&b("S")), Err(CacheError::WrongType));
        assert_eq!(cache.rpop(&b("S")), Err(CacheError::WrongType));
        assert_eq!(cache.lindex(&b("S"), 0), Err(CacheError::WrongType));
        assert_eq!(cache.get(&b("V")), Err(CacheError::WrongType));
    }
}
