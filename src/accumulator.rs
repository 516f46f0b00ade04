//! The streaming Merkle accumulator engine.
//!
//! Appended hashes become the leaves of a left-complete binary tree. A node freezes as soon
//! as both of its subtrees are fully populated; frozen nodes are immutable and persisted
//! under their post-order rank, which makes the store a dense append-only sequence. The
//! in-memory state is only the frontier: the last frozen hash plus, per level, the hash of
//! a left sibling still waiting for its right-hand subtree. Digests over the ragged right
//! edge pad missing subtrees with [`PLACEHOLDER`].
//!
//! Every piece of in-memory state is derivable from the store, so [`Accumulator::open`]
//! recovers from a crash between any two writes of an append.

use std::sync::RwLock;

use byteorder::{BigEndian, ByteOrder};
use tracing::debug;

use crate::hash::{hash_nodes, Hash, HASH_LEN, PLACEHOLDER};
use crate::kvs::KvStore;
use crate::position::{root_level_from_leaf_index, Position, MAX_LEVEL};
use crate::{Error, Result};

// key layout: "s" -> BE size, "m" + BE rank -> node hash,
// "l" + leaf hash -> BE rank of its earliest leaf, "r" + digest -> BE rank snapshot
const SIZE_KEY: &[u8] = b"s";
const NODE_PREFIX: u8 = b'm';
const LEAF_INDEX_PREFIX: u8 = b'l';
const ROOT_INDEX_PREFIX: u8 = b'r';

fn node_key(rank: u64) -> [u8; 9] {
  let mut key = [NODE_PREFIX; 9];
  BigEndian::write_u64(&mut key[1..], rank);
  key
}

fn leaf_index_key(hash: &Hash) -> [u8; HASH_LEN + 1] {
  hash_key(LEAF_INDEX_PREFIX, hash)
}

fn root_index_key(digest: &Hash) -> [u8; HASH_LEN + 1] {
  hash_key(ROOT_INDEX_PREFIX, digest)
}

fn hash_key(prefix: u8, hash: &Hash) -> [u8; HASH_LEN + 1] {
  let mut key = [prefix; HASH_LEN + 1];
  key[1..].copy_from_slice(hash);
  key
}

fn encode_u64(value: u64) -> [u8; 8] {
  let mut buffer = [0u8; 8];
  BigEndian::write_u64(&mut buffer, value);
  buffer
}

fn decode_u64(bytes: &[u8], at: u64) -> Result<u64> {
  if bytes.len() != 8 {
    return Err(Error::Corrupt { reason: "stored counter is not 8 bytes", at });
  }
  Ok(BigEndian::read_u64(bytes))
}

fn decode_hash(bytes: Vec<u8>, at: u64) -> Result<Hash> {
  bytes.try_into().map_err(|_| Error::Corrupt { reason: "stored hash is not 32 bytes", at })
}

/// Membership proof: the leaf hash, the sibling hashes from the leaf towards the root, and
/// the root digest the co-path folds up to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proof {
  pub target: Hash,
  pub copath: Vec<Hash>,
  pub root: Hash,
}

struct State {
  /// Post-order rank of the next node to freeze; equivalently the frozen-node count.
  next: u64,
  /// Hash of the most recently frozen node.
  last_hash: Hash,
  /// Per level, the frozen left sibling still waiting for its right-hand subtree.
  left_siblings: [Option<Hash>; MAX_LEVEL as usize + 1],
  /// Root of the placeholder-padded tree, once derived.
  root: Option<Position>,
  root_hash: Hash,
  /// Clears on append; keeps `digest` idempotent in between.
  root_valid: bool,
}

impl State {
  fn empty() -> State {
    State {
      next: 0,
      last_hash: [0; HASH_LEN],
      left_siblings: [None; MAX_LEVEL as usize + 1],
      root: None,
      root_hash: [0; HASH_LEN],
      root_valid: false,
    }
  }
}

/// Append-only authenticated log over a [`KvStore`].
///
/// The store is owned exclusively for the process lifetime. A single lock serialises all
/// operations; only `get` takes the shared side, every other operation may write either the
/// store or the frontier.
pub struct Accumulator<S: KvStore> {
  db: S,
  state: RwLock<State>,
}

impl<S: KvStore> Accumulator<S> {
  /// Loads the accumulator from the store, repairing a torn append if the previous process
  /// crashed mid-freeze. Reopening a consistent store is a no-op.
  pub fn open(db: S) -> Result<Accumulator<S>> {
    let mut state = State::empty();
    if let Some(raw) = db.get(SIZE_KEY)? {
      state.next = decode_u64(&raw, 0)?;
    }
    if state.next == 0 {
      db.put(SIZE_KEY, &encode_u64(0))?;
      return Ok(Accumulator { db, state: RwLock::new(state) });
    }

    let mut position = Position::from_post_order(state.next - 1);
    let mut last_hash = read_node(&db, position.post_order())?;

    // a crash between the leaf write and the end of the freeze loop leaves a right-hand
    // spine whose internal nodes are derivable from what did reach the store
    while position.is_right_child() {
      let sibling = read_node(&db, position.sibling().post_order())?;
      last_hash = hash_nodes(&sibling, &last_hash);
      position = position.parent();
      db.put(&node_key(position.post_order()), &last_hash)?;
      state.next += 1;
    }
    state.last_hash = last_hash;
    db.put(SIZE_KEY, &encode_u64(state.next))?;

    // rebuild the frontier: walking up from the last frozen node, a frozen ancestor is
    // itself a waiting left sibling, and an unfrozen right child has one across from it
    let last_leaf = position.right_most_leaf();
    let root_level = root_level_from_leaf_index(last_leaf.leaf_index_on_level());
    let mut current = position;
    while current.level() <= root_level {
      if current.post_order() < state.next {
        let hash = read_node(&db, current.post_order())?;
        state.left_siblings[current.level() as usize] = Some(hash);
      } else if current.is_right_child() {
        let sibling = current.sibling();
        let hash = read_node(&db, sibling.post_order())?;
        state.left_siblings[sibling.level() as usize] = Some(hash);
      }
      current = current.parent();
    }

    Self::refresh_root(&db, &mut state, false)?;
    debug!(next = state.next, root_level, "accumulator recovered");
    Ok(Accumulator { db, state: RwLock::new(state) })
  }

  /// Appends a hash and returns its id, the zero-based index of the new leaf.
  pub fn append(&self, hash: Hash) -> Result<u64> {
    let mut state = self.state.write()?;
    let mut position = Position::from_post_order(state.next);
    if !position.is_leaf() {
      return Err(Error::Corrupt { reason: "append position is not a leaf", at: state.next });
    }
    let id = position.leaf_index_on_level();

    // the earliest leaf with a given hash keeps the index entry
    let index_key = leaf_index_key(&hash);
    if self.db.get(&index_key)?.is_none() {
      self.db.put(&index_key, &encode_u64(position.post_order()))?;
    }

    state.root_valid = false;
    let mut hash = hash;
    loop {
      self.db.put(&node_key(position.post_order()), &hash)?;
      state.next += 1;

      if position.is_left_child() {
        state.left_siblings[position.level() as usize] = Some(hash);
        state.last_hash = hash;
        if state.root.map_or(true, |root| root.parent() == position) {
          state.root = Some(position);
          state.root_hash = hash;
          state.root_valid = true;
        }
        break;
      }

      // a right child completes its parent: fold and freeze one level up
      let left = state.left_siblings[position.level() as usize]
        .ok_or(Error::Corrupt { reason: "missing left sibling", at: position.post_order() })?;
      hash = hash_nodes(&left, &hash);
      position = position.parent();
    }

    self.db.put(SIZE_KEY, &encode_u64(state.next))?;
    debug!(id, next = state.next, "appended");
    Ok(id)
  }

  /// Returns the hash stored at `id`.
  pub fn get(&self, id: u64) -> Result<Hash> {
    let state = self.state.read()?;
    let position = Position::from_leaf_index(id);
    let rank = position.post_order();
    if rank >= state.next {
      return Err(Error::OutOfRange(id));
    }
    read_node(&self.db, rank)
  }

  /// Returns the id of the earliest leaf holding `hash`.
  ///
  /// An index entry pointing at a rank the store no longer covers answers `NotFound` but is
  /// kept; once the rank refreezes under a different hash the entry is deleted.
  pub fn search(&self, hash: Hash) -> Result<u64> {
    let state = self.state.write()?;
    let index_key = leaf_index_key(&hash);
    let raw = self.db.get(&index_key)?.ok_or(Error::NotFound)?;
    let rank = decode_u64(&raw, 0)?;
    let position = Position::from_post_order(rank);
    if !position.is_leaf() {
      return Err(Error::Corrupt { reason: "leaf index points at an internal node", at: rank });
    }
    if rank >= state.next {
      return Err(Error::NotFound);
    }
    let stored = read_node(&self.db, rank)?;
    if stored != hash {
      self.db.delete(&index_key)?;
      return Err(Error::NotFound);
    }
    Ok(position.leaf_index_on_level())
  }

  /// Returns the current root digest, deriving and indexing it if an append invalidated the
  /// cached one.
  pub fn digest(&self) -> Result<Hash> {
    let mut state = self.state.write()?;
    Self::refresh_root(&self.db, &mut state, true)
  }

  /// Proves that the leaf at `id` is covered by a root digest.
  ///
  /// With `digest == None` the proof targets the live root (refreshing and indexing it);
  /// otherwise `digest` must be a root this log returned before, and the proof reconstructs
  /// the tree as of that snapshot, padding subtrees the snapshot had not frozen.
  pub fn get_proof(&self, id: u64, digest: Option<Hash>) -> Result<Proof> {
    let mut state = self.state.write()?;
    let mut position = Position::from_leaf_index(id);
    if position.post_order() >= state.next {
      return Err(Error::OutOfRange(id));
    }

    let live = digest.is_none();
    let (root_hash, last_frozen, root_level) = match digest {
      None => {
        let last_frozen = state.next - 1;
        let root_hash = Self::refresh_root(&self.db, &mut state, true)?;
        let root_level = match state.root {
          Some(root) => root.level(),
          None => return Err(Error::Corrupt { reason: "missing root after refresh", at: last_frozen }),
        };
        (root_hash, last_frozen, root_level)
      }
      Some(digest) => {
        let raw = self.db.get(&root_index_key(&digest))?.ok_or(Error::InvalidDigest)?;
        let last_frozen = decode_u64(&raw, 0)?;
        let last = Position::from_post_order(last_frozen);
        let root_level = root_level_from_leaf_index(last.right_most_leaf().leaf_index_on_level());
        (digest, last_frozen, root_level)
      }
    };

    if last_frozen < position.post_order() {
      // the leaf was appended after the snapshot was taken
      return Err(Error::NotFound);
    }

    let target = read_node(&self.db, position.post_order())?;

    if root_level == 0 {
      if root_hash == target {
        return Ok(Proof { target, copath: Vec::new(), root: root_hash });
      }
      return Err(Error::NotFound);
    }

    let mut copath = Vec::with_capacity(root_level as usize);
    let mut running = target;
    while position.parent().level() <= root_level {
      let sibling_hash = self.node_hash(position.sibling(), last_frozen)?;
      if live {
        // fold alongside the co-path; the result must land on the indexed root
        running = if position.is_left_child() {
          hash_nodes(&running, &sibling_hash)
        } else {
          hash_nodes(&sibling_hash, &running)
        };
      }
      copath.push(sibling_hash);
      position = position.parent();
    }
    if live && running != root_hash {
      return Err(Error::InvalidDigest);
    }

    Ok(Proof { target, copath, root: root_hash })
  }

  /// Flushes and releases the store. Must be the last call.
  pub fn close(self) -> Result<()> {
    self.db.close()
  }

  // derives the root over the placeholder-padded tree unless the cached one is valid, and
  // records a first-seen digest under the root index
  fn refresh_root(db: &S, state: &mut State, index_root: bool) -> Result<Hash> {
    if !state.root_valid {
      if state.next == 0 {
        return Err(Error::Empty);
      }
      let mut position = Position::from_post_order(state.next - 1);
      let mut hash = state.last_hash;
      while position.left_most_leaf() != Position::from_leaf_index(0) {
        hash = if position.is_left_child() {
          hash_nodes(&hash, &PLACEHOLDER)
        } else {
          let left = state.left_siblings[position.level() as usize]
            .ok_or(Error::Corrupt { reason: "missing left sibling", at: position.post_order() })?;
          hash_nodes(&left, &hash)
        };
        position = position.parent();
      }
      state.root = Some(position);
      state.root_hash = hash;
      state.root_valid = true;
    }

    if index_root {
      let index_key = root_index_key(&state.root_hash);
      if db.get(&index_key)?.is_none() {
        db.put(&index_key, &encode_u64(state.next - 1))?;
      }
    }
    Ok(state.root_hash)
  }

  // reconstructs the hash of a node as of the snapshot whose last frozen rank is
  // `last_frozen`: frozen nodes read back, unborn subtrees pad with the placeholder
  fn node_hash(&self, position: Position, last_frozen: u64) -> Result<Hash> {
    if position.post_order() <= last_frozen {
      return read_node(&self.db, position.post_order());
    }
    if position.left_most_leaf().post_order() > last_frozen {
      return Ok(PLACEHOLDER);
    }
    let at = position.post_order();
    let left = position.left_child().ok_or(Error::Corrupt { reason: "leaf has no children", at })?;
    let right = position.right_child().ok_or(Error::Corrupt { reason: "leaf has no children", at })?;
    let left_hash = self.node_hash(left, last_frozen)?;
    let right_hash = self.node_hash(right, last_frozen)?;
    Ok(hash_nodes(&left_hash, &right_hash))
  }
}

fn read_node<S: KvStore>(db: &S, rank: u64) -> Result<Hash> {
  let raw = db.get(&node_key(rank))?.ok_or(Error::Corrupt { reason: "missing frozen node", at: rank })?;
  decode_hash(raw, rank)
}
