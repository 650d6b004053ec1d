// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! In-process keyspace with Redis-like scan semantics.
//!
//! Keys are held in byte order; the scan cursor is the offset of the next
//! key. Removing keys mid-scan can therefore skip or repeat entries, which
//! is the same weak guarantee a real `SCAN` gives.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use super::traits::{KeyspaceStore, ScanPage, StorageError};
use crate::key_record::{KeyType, MemoryProbe};

#[derive(Debug, Clone, Copy)]
struct Entry {
    key_type: KeyType,
    /// `None` = the store refuses to report memory for this key
    memory: Option<u64>,
}

pub struct InMemoryKeyspace {
    data: RwLock<BTreeMap<Vec<u8>, Entry>>,
    memory_command_rejected: AtomicBool,
}

impl InMemoryKeyspace {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            memory_command_rejected: AtomicBool::new(false),
        }
    }

    /// Behave like a server where `MEMORY USAGE` is disabled or denied.
    pub fn reject_memory_command(&self) {
        self.memory_command_rejected.store(true, Ordering::SeqCst);
    }

    /// Insert or overwrite a key.
    pub fn insert(&self, key: impl Into<Vec<u8>>, key_type: KeyType, memory: Option<u64>) {
        self.data.write().insert(key.into(), Entry { key_type, memory });
    }

    /// Remove a key; returns whether it existed.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.data.write().remove(key).is_some()
    }

    /// Get current key count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl Default for InMemoryKeyspace {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyspaceStore for InMemoryKeyspace {
    async fn scan_batch(
        &self,
        cursor: u64,
        match_pattern: &str,
        count: usize,
    ) -> Result<ScanPage, StorageError> {
        let data = self.data.read();
        let start = usize::try_from(cursor).unwrap_or(usize::MAX);
        let count = count.max(1);

        // Like SCAN, COUNT bounds the work done, not the number of matches.
        let keys = data
            .keys()
            .skip(start)
            .take(count)
            .filter(|k| glob_match(match_pattern.as_bytes(), k))
            .cloned()
            .collect();

        let end = start.saturating_add(count);
        let next_cursor = if end >= data.len() { 0 } else { end as u64 };
        Ok(ScanPage { next_cursor, keys })
    }

    async fn type_of(&self, key: &[u8]) -> Result<Option<KeyType>, StorageError> {
        Ok(self.data.read().get(key).map(|e| e.key_type))
    }

    async fn memory_of(&self, key: &[u8], _samples: Option<u32>) -> Result<MemoryProbe, StorageError> {
        if self.memory_command_rejected.load(Ordering::SeqCst) {
            return Ok(MemoryProbe::CommandRejected);
        }
        Ok(match self.data.read().get(key) {
            None => MemoryProbe::NotFound,
            Some(Entry { memory: Some(bytes), .. }) => MemoryProbe::Bytes(*bytes),
            Some(Entry { memory: None, .. }) => MemoryProbe::Unsupported,
        })
    }
}

/// Redis-style glob: `*`, `?`, `[abc]`, `[^a-z]`, `\x`.
#[must_use]
pub fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let (mut p, mut t) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        if p < pattern.len() {
            match pattern[p] {
                b'*' => {
                    backtrack = Some((p, t));
                    p += 1;
                    continue;
                }
                b'?' => {
                    p += 1;
                    t += 1;
                    continue;
                }
                b'[' => {
                    if let Some((matched, next_p)) = match_class(pattern, p, text[t]) {
                        if matched {
                            p = next_p;
                            t += 1;
                            continue;
                        }
                    }
                }
                b'\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == text[t] {
                        p += 2;
                        t += 1;
                        continue;
                    }
                }
                c if c == text[t] => {
                    p += 1;
                    t += 1;
                    continue;
                }
                _ => {}
            }
        }

        match backtrack {
            Some((star_p, star_t)) => {
                p = star_p + 1;
                t = star_t + 1;
                backtrack = Some((star_p, star_t + 1));
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == b'*')
}

/// Match `c` against the class starting at `pattern[open]` (`[`).
/// Returns (matched, index after `]`), or `None` if the class is unterminated.
fn match_class(pattern: &[u8], open: usize, c: u8) -> Option<(bool, usize)> {
    let mut i = open + 1;
    let negate = pattern.get(i) == Some(&b'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != b']' {
        if pattern[i] == b'\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == b'-' && pattern[i + 2] != b']' {
            let (lo, hi) = (pattern[i].min(pattern[i + 2]), pattern[i].max(pattern[i + 2]));
            matched |= (lo..=hi).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(n: usize) -> InMemoryKeyspace {
        let store = InMemoryKeyspace::new();
        for i in 0..n {
            store.insert(format!("key:{:03}", i), KeyType::String, Some(10));
        }
        store
    }

    #[tokio::test]
    async fn test_new_store_is_empty() {
        let store = InMemoryKeyspace::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);

        let page = store.scan_batch(0, "*", 10).await.unwrap();
        assert_eq!(page.next_cursor, 0);
        assert!(page.keys.is_empty());
    }

    #[tokio::test]
    async fn test_scan_visits_every_key_once() {
        let store = filled(25);
        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = store.scan_batch(cursor, "*", 10).await.unwrap();
            seen.extend(page.keys);
            cursor = page.next_cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 25);
        seen.dedup();
        assert_eq!(seen.len(), 25);
    }

    #[tokio::test]
    async fn test_scan_match_filters_but_keeps_paging() {
        let store = filled(5);
        store.insert("other", KeyType::Hash, Some(1));

        let page = store.scan_batch(0, "key:*", 100).await.unwrap();
        assert_eq!(page.keys.len(), 5);
        assert_eq!(page.next_cursor, 0);
    }

    #[tokio::test]
    async fn test_type_and_memory() {
        let store = InMemoryKeyspace::new();
        store.insert("h", KeyType::Hash, Some(300));
        store.insert("m", KeyType::Unknown, None);

        assert_eq!(store.type_of(b"h").await.unwrap(), Some(KeyType::Hash));
        assert_eq!(store.type_of(b"missing").await.unwrap(), None);
        assert_eq!(store.memory_of(b"h", None).await.unwrap(), MemoryProbe::Bytes(300));
        assert_eq!(store.memory_of(b"m", None).await.unwrap(), MemoryProbe::Unsupported);
        assert_eq!(store.memory_of(b"missing", None).await.unwrap(), MemoryProbe::NotFound);

        store.reject_memory_command();
        assert_eq!(store.memory_of(b"h", None).await.unwrap(), MemoryProbe::CommandRejected);
    }

    #[tokio::test]
    async fn test_default_inspect_batch() {
        let store = InMemoryKeyspace::new();
        store.insert("a", KeyType::List, Some(40));
        let keys = vec![b"a".to_vec(), b"gone".to_vec()];

        let inspected = store.inspect_batch(&keys, true, None).await.unwrap();
        assert_eq!(inspected[0].key_type, Some(KeyType::List));
        assert_eq!(inspected[0].memory, MemoryProbe::Bytes(40));
        assert_eq!(inspected[1].key_type, None);
        assert_eq!(inspected[1].memory, MemoryProbe::NotFound);

        let skipped = store.inspect_batch(&keys, false, None).await.unwrap();
        assert_eq!(skipped[0].memory, MemoryProbe::Skipped);
    }

    #[test]
    fn test_remove() {
        let store = filled(2);
        assert!(store.remove(b"key:000"));
        assert!(!store.remove(b"key:000"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_glob_match() {
        assert!(glob_match(b"*", b"anything"));
        assert!(glob_match(b"*", b""));
        assert!(glob_match(b"user:*", b"user:1"));
        assert!(!glob_match(b"user:*", b"session:1"));
        assert!(glob_match(b"h?llo", b"hello"));
        assert!(glob_match(b"h[ae]llo", b"hallo"));
        assert!(!glob_match(b"h[ae]llo", b"hillo"));
        assert!(glob_match(b"h[^e]llo", b"hallo"));
        assert!(!glob_match(b"h[^e]llo", b"hello"));
        assert!(glob_match(b"h[a-c]llo", b"hbllo"));
        assert!(glob_match(b"a\\*b", b"a*b"));
        assert!(!glob_match(b"a\\*b", b"axb"));
        assert!(glob_match(b"*:profile", b"user:42:profile"));
        assert!(glob_match(b"a*b*c", b"aXXbYYc"));
        assert!(!glob_match(b"a*b*c", b"aXXbYY"));
    }
}
