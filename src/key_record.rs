// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-key records produced by the scanner.
//!
//! A [`RawKeyRecord`] only lives between the scanner and the aggregator.
//! Nothing here is persisted.
//!
//! # Example
//!
//! ```
//! use keyspace_analyzer::{KeyType, MemoryUsage, RawKeyRecord};
//!
//! let record = RawKeyRecord::new(b"user:42:profile".to_vec(), KeyType::Hash, MemoryUsage::Known(96));
//! assert_eq!(record.memory.bytes(), Some(96));
//! assert_eq!(KeyType::parse("zset"), KeyType::SortedSet);
//! ```

use serde::Serialize;

/// Data-structure type of a key, as reported by `TYPE`.
///
/// Module types (RedisJSON, RedisBloom, ...) are folded into `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    String,
    List,
    Set,
    Hash,
    #[serde(rename = "zset")]
    SortedSet,
    Stream,
    Unknown,
}

impl KeyType {
    /// Every variant, in display order.
    pub const ALL: [KeyType; 7] = [
        Self::String,
        Self::List,
        Self::Set,
        Self::Hash,
        Self::SortedSet,
        Self::Stream,
        Self::Unknown,
    ];

    /// Parse a `TYPE` reply. `none` is not a type; callers handle it first.
    #[must_use]
    pub fn parse(reply: &str) -> Self {
        match reply {
            "string" => Self::String,
            "list" => Self::List,
            "set" => Self::Set,
            "hash" => Self::Hash,
            "zset" => Self::SortedSet,
            "stream" => Self::Stream,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::List => "list",
            Self::Set => "set",
            Self::Hash => "hash",
            Self::SortedSet => "zset",
            Self::Stream => "stream",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for KeyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Memory footprint of a key, if it could be determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryUsage {
    Known(u64),
    /// Vanished before inspection, or the store can't report it.
    /// Never treated as zero.
    Unknown,
}

impl MemoryUsage {
    #[must_use]
    pub fn bytes(&self) -> Option<u64> {
        match self {
            Self::Known(b) => Some(*b),
            Self::Unknown => None,
        }
    }

    #[must_use]
    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }
}

/// Raw answer of a memory probe, before the estimator interprets it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryProbe {
    Bytes(u64),
    /// The key no longer exists.
    NotFound,
    /// The store refused to report memory for this key.
    Unsupported,
    /// The store refused the command itself (unknown, renamed or not
    /// permitted). Holds for every key on this connection.
    CommandRejected,
    /// The probe was not issued (command disabled for this pass).
    Skipped,
}

/// One observed key: name, type and memory cost.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyRecord {
    pub key: Vec<u8>,
    pub key_type: KeyType,
    pub memory: MemoryUsage,
}

impl RawKeyRecord {
    #[must_use]
    pub fn new(key: Vec<u8>, key_type: KeyType, memory: MemoryUsage) -> Self {
        Self { key, key_type, memory }
    }

    /// Key rendered for humans (invalid UTF-8 replaced).
    #[must_use]
    pub fn key_lossy(&self) -> String {
        String::from_utf8_lossy(&self.key).into_owned()
    }
}
