//! In-process key/value store used as the default backing store.
//!
//! Every connection shares the same [`DashMap`]. Taking the store offline
//! makes probes and commands fail, which is how tests exercise liveness
//! replacement without a real database.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;

use crate::store::{ManageConnection, StoreError};

#[derive(Debug)]
struct Shared {
    data: DashMap<String, Value>,
    online: AtomicBool,
    connects: AtomicU64,
}

/// Connection manager for the in-memory store.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                data: DashMap::new(),
                online: AtomicBool::new(true),
                connects: AtomicU64::new(0),
            }),
        }
    }

    /// Simulate the store going away or coming back.
    pub fn set_online(&self, online: bool) {
        self.shared.online.store(online, Ordering::SeqCst);
    }

    pub fn is_online(&self) -> bool {
        self.shared.online.load(Ordering::SeqCst)
    }

    /// Total connections ever opened.
    pub fn connect_count(&self) -> u64 {
        self.shared.connects.load(Ordering::Relaxed)
    }
}

impl ManageConnection for MemoryStore {
    type Connection = MemoryConnection;

    fn connect(&self) -> Result<MemoryConnection, StoreError> {
        if !self.is_online() {
            return Err(StoreError::Connect("memory store is offline".into()));
        }
        self.shared.connects.fetch_add(1, Ordering::Relaxed);
        Ok(MemoryConnection {
            shared: Arc::clone(&self.shared),
        })
    }

    fn is_valid(&self, conn: &mut MemoryConnection) -> bool {
        conn.ping().is_ok()
    }
}

/// A handle on the shared in-memory data.
#[derive(Debug)]
pub struct MemoryConnection {
    shared: Arc<Shared>,
}

impl MemoryConnection {
    fn check(&self) -> Result<(), StoreError> {
        if self.shared.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::ConnectionLost)
        }
    }

    /// Round-trip used as the liveness probe.
    pub fn ping(&self) -> Result<(), StoreError> {
        self.check()
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.shared.data.get(key).map(|v| v.value().clone()))
    }

    pub fn put(&self, key: impl Into<String>, value: Value) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.shared.data.insert(key.into(), value))
    }

    pub fn delete(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check()?;
        Ok(self.shared.data.remove(key).map(|(_, v)| v))
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        self.check()?;
        Ok(self.shared.data.len())
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        self.len().map(|n| n == 0)
    }
}
