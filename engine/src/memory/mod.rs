//! Shared Conversation Memory
//!
//! Append-only conversation logs keyed by memory bucket id. Every member
//! declaring the same `memoryId` reads and writes the same bucket, which is
//! how context survives across turns and across members. Entries are never
//! mutated or removed within a run.
//!
//! Writes are serialized behind a mutex. Members of a parallel squad that
//! share one bucket may still interleave their appends in an unspecified
//! order; each append stays internally ordered.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::llm::Message;

/// Append-only per-bucket conversation store
#[derive(Debug, Default)]
pub struct MemoryStore {
    buckets: Mutex<HashMap<String, Vec<Message>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current ordered entries of a bucket.
    ///
    /// Empty for an empty or unseen bucket id.
    pub fn get(&self, bucket_id: &str) -> Vec<Message> {
        if bucket_id.is_empty() {
            return Vec::new();
        }
        let buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets.get(bucket_id).cloned().unwrap_or_default()
    }

    /// Append entries to a bucket, preserving their order.
    ///
    /// A no-op for an empty bucket id.
    pub fn append(&self, bucket_id: &str, entries: Vec<Message>) {
        if bucket_id.is_empty() || entries.is_empty() {
            return;
        }
        let mut buckets = self.buckets.lock().unwrap_or_else(|e| e.into_inner());
        buckets
            .entry(bucket_id.to_string())
            .or_default()
            .extend(entries);
    }
}
