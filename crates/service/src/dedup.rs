//! Time windowed response cache for retransmit absorption.
//!
//! UDP clients resend a request verbatim when the response is lost, so
//! the server keeps every response for a while, keyed by `(identifier,
//! source address, request authenticator)`. A retransmit inside the
//! window replays the stored octets without running the handler again;
//! a genuinely new request differs in its authenticator and misses even
//! when identifier and address coincide.

use std::{
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};

use ahash::AHashMap;
use bytes::Bytes;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    identifier: u8,
    source: SocketAddr,
    authenticator: [u8; 16],
}

impl CacheKey {
    pub fn new(identifier: u8, source: SocketAddr, authenticator: [u8; 16]) -> Self {
        Self {
            identifier,
            source,
            authenticator,
        }
    }
}

/// What the pipeline should do with an inbound request.
pub enum Begin {
    /// First sighting; the handler runs and the key is marked in
    /// flight.
    New,
    /// The same request is being handled right now; drop the
    /// retransmit.
    InFlight,
    /// The response is cached; resend these octets.
    Replay(Bytes),
}

enum Entry {
    Pending(Instant),
    Done(Instant, Bytes),
}

impl Entry {
    fn created(&self) -> Instant {
        match self {
            Self::Pending(created) => *created,
            Self::Done(created, _) => *created,
        }
    }
}

pub struct ResponseCache {
    ttl: Duration,
    capacity: usize,
    entries: Mutex<AHashMap<CacheKey, Entry>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            entries: Mutex::new(AHashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Look up a request key, purging expired entries on the way. A
    /// miss marks the key in flight.
    pub fn begin(&self, key: CacheKey) -> Begin {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| now.duration_since(entry.created()) < self.ttl);

        match entries.get(&key) {
            Some(Entry::Done(_, bytes)) => return Begin::Replay(bytes.clone()),
            Some(Entry::Pending(_)) => return Begin::InFlight,
            None => {}
        }

        // Full: the oldest entry yields.
        if entries.len() >= self.capacity {
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.created())
                .map(|(key, _)| key.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(key, Entry::Pending(now));
        Begin::New
    }

    /// Attach the response to an in-flight key. The window starts at
    /// first sighting, not at completion.
    pub fn store(&self, key: &CacheKey, bytes: Bytes) {
        let mut entries = self.entries.lock();
        let created = entries
            .get(key)
            .map(Entry::created)
            .unwrap_or_else(Instant::now);
        entries.insert(key.clone(), Entry::Done(created, bytes));
    }

    /// Remove an in-flight marker after a dropped or failed request,
    /// so a retransmit may try again.
    pub fn forget(&self, key: &CacheKey) {
        self.entries.lock().remove(key);
    }

    pub fn evict_expired(&self) {
        let now = Instant::now();
        self.entries
            .lock()
            .retain(|_, entry| now.duration_since(entry.created()) < self.ttl);
    }

    /// Periodic eviction so an idle server does not hold the last
    /// window of responses forever.
    pub fn spawn_evictor(self: Arc<Self>) -> JoinHandle<()> {
        let interval = self.ttl;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                self.evict_expired();
            }
        })
    }
}
