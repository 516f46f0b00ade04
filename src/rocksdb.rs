//! RocksDB-backed [`KvStore`].

use std::path::Path;

use ::rocksdb::{DBCompressionType, Options, DB};

use crate::kvs::KvStore;
use crate::{Error, Result};

/// Store over a RocksDB database owned by a single accumulator for the process lifetime.
pub struct RocksKvs {
  db: DB,
}

impl RocksKvs {
  /// Opens (or creates) the database at `path`. Node hashes are incompressible, so
  /// compression stays off.
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
    let mut opts = Options::default();
    opts.create_if_missing(true);
    opts.set_compression_type(DBCompressionType::None);
    let db = DB::open(&opts, path)?;
    Ok(RocksKvs { db })
  }
}

impl From<::rocksdb::Error> for Error {
  fn from(e: ::rocksdb::Error) -> Self {
    Error::Storage(e.to_string())
  }
}

impl KvStore for RocksKvs {
  fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
    Ok(self.db.get(key)?)
  }

  fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
    Ok(self.db.put(key, value)?)
  }

  fn delete(&self, key: &[u8]) -> Result<()> {
    Ok(self.db.delete(key)?)
  }

  fn close(&self) -> Result<()> {
    Ok(self.db.flush()?)
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::accumulator::Accumulator;
  use crate::hash::hash;

  #[test]
  fn survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("accumulator.db");

    let accumulator = Accumulator::open(RocksKvs::open(&path).unwrap()).unwrap();
    let leaves: Vec<_> = (0u64..10).map(|i| hash(&i.to_be_bytes())).collect();
    for (i, leaf) in leaves.iter().enumerate() {
      assert_eq!(i as u64, accumulator.append(*leaf).unwrap());
    }
    let digest = accumulator.digest().unwrap();
    accumulator.close().unwrap();

    let accumulator = Accumulator::open(RocksKvs::open(&path).unwrap()).unwrap();
    for (i, leaf) in leaves.iter().enumerate() {
      assert_eq!(*leaf, accumulator.get(i as u64).unwrap());
      assert_eq!(i as u64, accumulator.search(*leaf).unwrap());
    }
    assert_eq!(digest, accumulator.digest().unwrap());
    accumulator.close().unwrap();
  }
}
