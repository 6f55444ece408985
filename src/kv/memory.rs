use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::KvStore;
use crate::error::CoreError;

enum Entry {
    Str {
        value: String,
        expires_at: Option<Instant>,
    },
    ZSet {
        members: Vec<(i64, String)>,
        expires_at: Option<Instant>,
    },
}

impl Entry {
    fn is_expired(&self) -> bool {
        let expires_at = match self {
            Entry::Str { expires_at, .. } => expires_at,
            Entry::ZSet { expires_at, .. } => expires_at,
        };
        matches!(expires_at, Some(at) if Instant::now() >= *at)
    }
}

/// In-process `KvStore` backed by a `parking_lot::Mutex<HashMap>`. This is
/// the default adapter so the crate runs end-to-end without a networked
/// dependency; a real deployment swaps in a Redis-shaped implementation of
/// the same trait.
#[derive(Default)]
pub struct MemoryKv {
    data: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    fn ttl_instant(ttl_seconds: u64) -> Option<Instant> {
        if ttl_seconds == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_secs(ttl_seconds))
        }
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn get(&self, key: &str) -> Result<Option<String>, CoreError> {
        let mut data = self.data.lock();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                return Ok(None);
            }
            if let Entry::Str { value, .. } = entry {
                return Ok(Some(value.clone()));
            }
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), CoreError> {
        let mut data = self.data.lock();
        data.insert(
            key.to_string(),
            Entry::Str {
                value: value.to_string(),
                expires_at: Self::ttl_instant(ttl_seconds),
            },
        );
        Ok(())
    }

    async fn zadd(&self, key: &str, score_ms: i64, member: &str) -> Result<(), CoreError> {
        let mut data = self.data.lock();
        let entry = data.entry(key.to_string()).or_insert_with(|| Entry::ZSet {
            members: Vec::new(),
            expires_at: None,
        });
        match entry {
            Entry::ZSet { members, .. } => {
                members.retain(|(_, m)| m != member);
                members.push((score_ms, member.to_string()));
            }
            Entry::Str { .. } => {
                *entry = Entry::ZSet {
                    members: vec![(score_ms, member.to_string())],
                    expires_at: None,
                };
            }
        }
        Ok(())
    }

    async fn zrange_all(&self, key: &str) -> Result<Vec<String>, CoreError> {
        let mut data = self.data.lock();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                return Ok(Vec::new());
            }
            if let Entry::ZSet { members, .. } = entry {
                return Ok(members.iter().map(|(_, m)| m.clone()).collect());
            }
        }
        Ok(Vec::new())
    }

    async fn zrange_by_score_count(&self, key: &str, min: i64, max: i64) -> Result<u64, CoreError> {
        let mut data = self.data.lock();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                return Ok(0);
            }
            if let Entry::ZSet { members, .. } = entry {
                return Ok(members
                    .iter()
                    .filter(|(score, _)| *score >= min && *score <= max)
                    .count() as u64);
            }
        }
        Ok(0)
    }

    async fn zrem_by_score(&self, key: &str, min: i64, max: i64) -> Result<(), CoreError> {
        let mut data = self.data.lock();
        if let Some(Entry::ZSet { members, .. }) = data.get_mut(key) {
            members.retain(|(score, _)| !(*score >= min && *score <= max));
        }
        Ok(())
    }

    async fn expire(&self, key: &str, ttl_seconds: u64) -> Result<(), CoreError> {
        let mut data = self.data.lock();
        if let Some(entry) = data.get_mut(key) {
            let new_expiry = Self::ttl_instant(ttl_seconds);
            match entry {
                Entry::Str { expires_at, .. } => *expires_at = new_expiry,
                Entry::ZSet { expires_at, .. } => *expires_at = new_expiry,
            }
        }
        Ok(())
    }
}
