//! Partitioned retrieval indices.
//!
//! Documents are split by a discrete [`PartitionKey`] (a fiscal year in the
//! reference corpus). Each partition owns an independent vector database
//! under the store root, is built or restored exactly once per process, and
//! is then read-only.
//!
//! - [`store`] - deterministic on-disk location per key, build manifest
//! - [`index`] - build (chunk, embed, persist) and load of one partition
//! - [`catalog`] - concurrent build-or-load over a key set with failure collection

pub mod catalog;
pub mod index;
pub mod store;

pub use catalog::{CatalogBuilder, PartitionCatalog, PartitionFailure};
pub use index::{IndexBuilder, IndexConfig, PartitionIndex};
pub use store::{PartitionManifest, PartitionStore, StorageHandle};

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Identifier of one partition.
///
/// Ordering is "natural": two keys that both parse as integers compare
/// numerically, two non-numeric keys compare as strings, and in a mixed set
/// numeric keys come first (this keeps the order total). Equal numbers with
/// different spellings ("7" and "07") fall back to string order so `Ord`
/// stays consistent with `Eq`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionKey(String);

impl PartitionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Filesystem-safe, injective encoding of the key.
    ///
    /// `[A-Za-z0-9_-]` pass through and every other byte becomes `%XX`, so
    /// distinct keys never share a directory.
    pub fn encoded(&self) -> String {
        let mut out = String::with_capacity(self.0.len());
        for byte in self.0.bytes() {
            if byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-' {
                out.push(byte as char);
            } else {
                out.push_str(&format!("%{:02X}", byte));
            }
        }
        out
    }

    /// Lower-cased identifier used in tool names.
    ///
    /// Not injective: `"A B"` and `"a_b"` share a slug. Registries reject the
    /// resulting duplicate tool names.
    pub fn slug(&self) -> String {
        self.0
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_lowercase()
                } else {
                    '_'
                }
            })
            .collect()
    }
}

impl Ord for PartitionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.0.parse::<i64>(), other.0.parse::<i64>()) {
            (Ok(a), Ok(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for PartitionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PartitionKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}
