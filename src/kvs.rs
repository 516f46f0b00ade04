//! Key-value store abstraction the accumulator persists through.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::Result;

/// Ordered byte-key store with point reads and writes.
///
/// `get` answers a missing key with `Ok(None)`; every other failure is an error. Writes are
/// assumed durable on return and no multi-key atomicity is required; the accumulator
/// recovers from any prefix of its writes. `close` flushes and must be the last call.
pub trait KvStore {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;
  fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;
  fn delete(&self, key: &[u8]) -> Result<()>;
  fn close(&self) -> Result<()>;
}

/// In-memory store over a shared map, for tests and benches.
///
/// Handles are cheap clones of the same underlying map, so a test can keep one handle to
/// tamper with the persisted bytes while the accumulator owns the other.
pub struct MemoryKvs {
  map: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>,
}

impl MemoryKvs {
  pub fn new() -> Self {
    Self::with_map(Default::default())
  }

  pub fn with_map(map: Arc<RwLock<HashMap<Vec<u8>, Vec<u8>>>>) -> Self {
    MemoryKvs { map }
  }
}

impl Default for MemoryKvs {
  fn default() -> Self {
    Self::new()
  }
}

impl KvStore for MemoryKvs {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.map.read()?.get(key).cloned())
  }

  fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
    self.map.write()?.insert(key.to_vec(), value.to_vec());
    Ok(())
  }

  fn delete(&self, key: &[u8]) -> Result<()> {
    self.map.write()?.remove(key);
    Ok(())
  }

  fn close(&self) -> Result<()> {
    Ok(())
  }
}
