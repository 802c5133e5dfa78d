//! Partitioners are supplied by the caller, not the engine: a function
//! `(key_bytes, n) -> partition_index`, treated as an opaque value. This
//! module only fixes the function signature and offers a couple of
//! ready-made hash partitioners for callers (and this crate's own tests)
//! who don't need a custom scheme.

use std::sync::Arc;

use sha2::{Digest, Sha256};

/// `(key, num_partitions) -> partition_index`, `partition_index` always
/// in `[0, num_partitions)`.
pub type Partitioner = dyn Fn(&[u8], u32) -> u32 + Send + Sync;

pub fn shared(f: impl Fn(&[u8], u32) -> u32 + Send + Sync + 'static) -> Arc<Partitioner> {
    Arc::new(f)
}

/// Reduces a SHA-256 digest of the key, interpreted as one big big-endian
/// unsigned integer, modulo `n`. Deterministic and well-distributed;
/// matches the reduction the catalog itself uses for shard routing.
pub fn sha256_partitioner(key: &[u8], n: u32) -> u32 {
    let digest = Sha256::digest(key);
    let mut acc: u64 = 0;
    for byte in digest.iter() {
        acc = (acc * 256 + u64::from(*byte)) % u64::from(n);
    }
    acc as u32
}

/// A cheaper non-cryptographic alternative for high-throughput bulk
/// loads where adversarial key distributions are not a concern.
pub fn seahash_partitioner(key: &[u8], n: u32) -> u32 {
    (seahash::hash(key) % u64::from(n)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partitions_are_always_in_range() {
        for n in [1u32, 2, 4, 7, 16] {
            for key in [&b""[..], b"a", b"hello world", b"\x00\x01\x02"] {
                assert!(sha256_partitioner(key, n) < n);
                assert!(seahash_partitioner(key, n) < n);
            }
        }
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(sha256_partitioner(b"abc", 4), sha256_partitioner(b"abc", 4));
        assert_eq!(
            seahash_partitioner(b"abc", 4),
            seahash_partitioner(b"abc", 4)
        );
    }
}
