//! SHA-256 digests for leaves, internal nodes, and the padding placeholder.

use sha2::{Digest as _, Sha256};

pub const HASH_LEN: usize = 32;

/// Fixed-size digest stored at every node of the tree.
pub type Hash = [u8; HASH_LEN];

/// Hash standing in for a right-hand subtree with no frozen descendants yet.
/// Equal to `hash(b"merkle placeholder")`; pinned by a test.
pub const PLACEHOLDER: Hash = [
  0xd3, 0x39, 0x66, 0xc0, 0x54, 0x81, 0x76, 0x4d, 0x5b, 0xfe, 0xa4, 0x2d, 0x79, 0x17, 0x7a, 0xba, 0xd4,
  0xd2, 0xd2, 0x45, 0xe5, 0xd2, 0x45, 0xb1, 0x3f, 0x65, 0xa6, 0xea, 0x02, 0x0e, 0x5b, 0xa6,
];

pub fn hash(data: &[u8]) -> Hash {
  Sha256::digest(data).into()
}

/// Digest of an internal node over its two children.
pub fn hash_nodes(left: &Hash, right: &Hash) -> Hash {
  let mut hasher = Sha256::new();
  hasher.update(left);
  hasher.update(right);
  hasher.finalize().into()
}
