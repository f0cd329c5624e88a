use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::collections::HashSet;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Slot {
    Str(String),
    Int(i64),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Record {
    slot: Slot,
    expires_at: Option<Instant>,
}

impl Record {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }

    fn expiring(slot: Slot, ttl: Duration, now: Instant) -> Self {
        Record {
            slot,
            expires_at: Some(now + ttl),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyTtl {
    Missing,
    NoExpiry,
    Remaining(Duration),
}

/// A process-local stand-in for the shared TTL store: strings, counters and
/// sets, each with an optional deadline. Expired entries are dropped lazily on
/// access. Time comes from `tokio::time`, so a paused test clock drives expiry.
#[derive(Debug, Default)]
pub struct MemoryTtlStore {
    map: DashMap<String, Record>,
}

impl MemoryTtlStore {
    pub fn new() -> Self {
        MemoryTtlStore {
            map: DashMap::new(),
        }
    }

    fn read<T>(&self, key: &str, f: impl FnOnce(&Record) -> T) -> Option<T> {
        let now = Instant::now();
        {
            let record = self.map.get(key)?;
            if record.is_live(now) {
                return Some(f(&record));
            }
        }
        self.map.remove_if(key, |_, r| !r.is_live(now));
        None
    }

    /// Entry for `key` with any expired record already evicted.
    fn live_entry(&self, key: &str, now: Instant) -> Entry<'_, String, Record> {
        match self.map.entry(key.to_string()) {
            Entry::Occupied(o) if !o.get().is_live(now) => {
                o.remove();
                self.map.entry(key.to_string())
            }
            entry => entry,
        }
    }

    pub fn exists(&self, key: &str) -> bool {
        self.read(key, |_| ()).is_some()
    }

    pub fn get_str(&self, key: &str) -> Option<String> {
        self.read(key, |r| match &r.slot {
            Slot::Str(s) => Some(s.clone()),
            Slot::Int(n) => Some(n.to_string()),
            Slot::Set(_) => None,
        })
        .flatten()
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.read(key, |r| match &r.slot {
            Slot::Int(n) => Some(*n),
            Slot::Str(s) => s.parse().ok(),
            Slot::Set(_) => None,
        })
        .flatten()
    }

    pub fn set_ex(&self, key: &str, value: &str, ttl: Duration) {
        let record = Record::expiring(Slot::Str(value.to_string()), ttl, Instant::now());
        self.map.insert(key.to_string(), record);
    }

    /// Set only when absent. Returns whether the value was written.
    pub fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.live_entry(key, now) {
            Entry::Occupied(_) => false,
            Entry::Vacant(v) => {
                v.insert(Record::expiring(Slot::Str(value.to_string()), ttl, now));
                true
            }
        }
    }

    /// Increment a counter, keeping its deadline. A new counter has none.
    pub fn incr(&self, key: &str) -> i64 {
        let now = Instant::now();
        match self.live_entry(key, now) {
            Entry::Occupied(mut o) => {
                let record = o.get_mut();
                let next = match &record.slot {
                    Slot::Int(n) => n + 1,
                    Slot::Str(s) => s.parse::<i64>().unwrap_or(0) + 1,
                    Slot::Set(_) => 1,
                };
                record.slot = Slot::Int(next);
                next
            }
            Entry::Vacant(v) => {
                v.insert(Record {
                    slot: Slot::Int(1),
                    expires_at: None,
                });
                1
            }
        }
    }

    pub fn expire(&self, key: &str, ttl: Duration) -> bool {
        let now = Instant::now();
        match self.live_entry(key, now) {
            Entry::Occupied(mut o) => {
                o.get_mut().expires_at = Some(now + ttl);
                true
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn ttl(&self, key: &str) -> KeyTtl {
        let now = Instant::now();
        self.read(key, |r| match r.expires_at {
            None => KeyTtl::NoExpiry,
            Some(at) => KeyTtl::Remaining(at.saturating_duration_since(now)),
        })
        .unwrap_or(KeyTtl::Missing)
    }

    pub fn del(&self, key: &str) -> bool {
        let now = Instant::now();
        self.map
            .remove(key)
            .is_some_and(|(_, record)| record.is_live(now))
    }

    /// Add `member` and raise the set deadline to `now + ttl` unless it is
    /// already later. One entry lock covers both steps.
    pub fn sadd_extending(&self, key: &str, member: &str, ttl: Duration) {
        let now = Instant::now();
        let deadline = now + ttl;
        match self.live_entry(key, now) {
            Entry::Occupied(mut o) => {
                let record = o.get_mut();
                match &mut record.slot {
                    Slot::Set(members) => {
                        members.insert(member.to_string());
                    }
                    slot => *slot = Slot::Set(HashSet::from([member.to_string()])),
                }
                if record.expires_at.is_none_or(|at| at < deadline) {
                    record.expires_at = Some(deadline);
                }
            }
            Entry::Vacant(v) => {
                v.insert(Record {
                    slot: Slot::Set(HashSet::from([member.to_string()])),
                    expires_at: Some(deadline),
                });
            }
        }
    }

    /// Remove `member`; an emptied set disappears, as in Redis.
    pub fn srem(&self, key: &str, member: &str) -> bool {
        let now = Instant::now();
        match self.live_entry(key, now) {
            Entry::Occupied(mut o) => {
                let (removed, emptied) = match &mut o.get_mut().slot {
                    Slot::Set(members) => (members.remove(member), members.is_empty()),
                    _ => (false, false),
                };
                if emptied {
                    o.remove();
                }
                removed
            }
            Entry::Vacant(_) => false,
        }
    }

    pub fn smembers(&self, key: &str) -> Vec<String> {
        self.read(key, |r| match &r.slot {
            Slot::Set(members) => members.iter().cloned().collect(),
            _ => Vec::new(),
        })
        .unwrap_or_default()
    }

    /// Remove the set and return what it held.
    pub fn take_set(&self, key: &str) -> Vec<String> {
        let now = Instant::now();
        match self.map.remove(key) {
            Some((_, record)) if record.is_live(now) => match record.slot {
                Slot::Set(members) => members.into_iter().collect(),
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}
