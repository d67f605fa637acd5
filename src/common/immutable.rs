//! Helper functions for immutable items.

use sha1_smol::Sha1;

use super::{Id, ID_SIZE};

/// Returns `true` if `target` is the sha1 hash of the bencoded `v`.
pub fn validate_immutable(v: &[u8], target: &Id) -> bool {
    hash_immutable(v) == *target.as_bytes()
}

/// Sha1 hash of the bencoded byte string `v`, which is the target of an immutable item.
pub fn hash_immutable(v: &[u8]) -> [u8; ID_SIZE] {
    let mut encoded = Vec::with_capacity(v.len() + 3);
    encoded.extend(format!("{}:", v.len()).bytes());
    encoded.extend_from_slice(v);

    let mut hasher = Sha1::new();
    hasher.update(&encoded);

    hasher.digest().bytes()
}
