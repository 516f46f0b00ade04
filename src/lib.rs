//! An append-only authenticated log: monotonically increasing identifiers map to 32-byte
//! digests, the whole log is committed to by a single root digest, and membership can be
//! proven against the current root or any root the log has published before.
//!
//! The log is backed by any ordered key-value store implementing [`KvStore`] and survives
//! process crashes between appends; [`Accumulator::open`] rebuilds the in-memory frontier
//! from whatever prefix of writes reached the store.

use std::sync::PoisonError;

use thiserror::Error;

pub mod accumulator;
pub mod api;
pub mod hash;
pub mod kvs;
pub mod position;
pub mod rocksdb;

pub use accumulator::{Accumulator, Proof};
pub use hash::{Hash, HASH_LEN, PLACEHOLDER};
pub use kvs::{KvStore, MemoryKvs};
pub use position::Position;

#[derive(Debug, Error)]
pub enum Error {
  /// The id refers to a leaf that has not been appended yet.
  #[error("id out of range: {0}")]
  OutOfRange(u64),

  /// The queried hash is not indexed, or the requested proof pre-dates the leaf.
  #[error("not found")]
  NotFound,

  /// A digest was requested before anything was appended.
  #[error("empty accumulator")]
  Empty,

  /// A historical proof was requested against a digest this log never produced.
  #[error("invalid digest")]
  InvalidDigest,

  /// A persisted invariant no longer holds. Not recoverable at runtime.
  #[error("corrupt state at {at}: {reason}")]
  Corrupt { reason: &'static str, at: u64 },

  /// Failure in the underlying key-value store.
  #[error("storage: {0}")]
  Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<PoisonError<T>> for Error {
  fn from(_: PoisonError<T>) -> Self {
    Error::Storage("poisoned lock".to_string())
  }
}
