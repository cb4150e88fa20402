//! Hash functions used for deriving storage keys.

use blake2_rfc::blake2b::blake2b;
use parity_scale_codec::{Decode, Encode};
use serde::{Deserialize, Serialize};
use std::hash::Hasher;
use twox_hash::XxHash64;

/// The hashers a storage map can declare for each of its keys.
///
/// "Fixed" hashers output the hash only; the key cannot be recovered from the
/// storage key. "Concat" hashers append the encoded key to the hash, so the
/// key can be decoded back out of the storage key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Encode, Decode, Serialize, Deserialize)]
pub enum StorageHasher {
    Blake2_128,
    Blake2_256,
    Blake2_128Concat,
    Twox128,
    Twox256,
    Twox64Concat,
    Identity,
}

impl StorageHasher {
    /// Hashes `data`, appending the data itself for concat hashers.
    pub fn hash(&self, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.hash_len() + data.len());
        self.hash_to(data, &mut out);
        out
    }
    /// Like [`StorageHasher::hash`], writing into an existing buffer.
    pub fn hash_to(&self, data: &[u8], out: &mut Vec<u8>) {
        match self {
            StorageHasher::Blake2_128 => out.extend_from_slice(&blake2_128(data)),
            StorageHasher::Blake2_256 => out.extend_from_slice(&blake2_256(data)),
            StorageHasher::Blake2_128Concat => {
                out.extend_from_slice(&blake2_128(data));
                out.extend_from_slice(data);
            }
            StorageHasher::Twox128 => out.extend_from_slice(&twox_128(data)),
            StorageHasher::Twox256 => out.extend_from_slice(&twox_256(data)),
            StorageHasher::Twox64Concat => {
                out.extend_from_slice(&twox_64(data));
                out.extend_from_slice(data);
            }
            StorageHasher::Identity => out.extend_from_slice(data),
        }
    }
    /// Whether the original key bytes are part of the output.
    pub fn is_concat(&self) -> bool {
        matches!(
            self,
            StorageHasher::Blake2_128Concat | StorageHasher::Twox64Concat | StorageHasher::Identity
        )
    }
    /// Length of the hash part of the output.
    pub fn hash_len(&self) -> usize {
        match self {
            StorageHasher::Blake2_128 | StorageHasher::Blake2_128Concat => 16,
            StorageHasher::Blake2_256 => 32,
            StorageHasher::Twox128 => 16,
            StorageHasher::Twox256 => 32,
            StorageHasher::Twox64Concat => 8,
            StorageHasher::Identity => 0,
        }
    }
}

pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut r = [0; 16];
    r.copy_from_slice(blake2b(16, &[], data).as_bytes());
    r
}

pub fn blake2_256(data: &[u8]) -> [u8; 32] {
    let mut r = [0; 32];
    r.copy_from_slice(blake2b(32, &[], data).as_bytes());
    r
}

pub fn blake2_512(data: &[u8]) -> [u8; 64] {
    let mut r = [0; 64];
    r.copy_from_slice(blake2b(64, &[], data).as_bytes());
    r
}

fn twox_seeded(seed: u64, data: &[u8]) -> [u8; 8] {
    let mut h = XxHash64::with_seed(seed);
    h.write(data);
    h.finish().to_le_bytes()
}

pub fn twox_64(data: &[u8]) -> [u8; 8] {
    twox_seeded(0, data)
}

pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut r = [0; 16];
    r[..8].copy_from_slice(&twox_seeded(0, data));
    r[8..].copy_from_slice(&twox_seeded(1, data));
    r
}

pub fn twox_256(data: &[u8]) -> [u8; 32] {
    let mut r = [0; 32];
    for seed in 0..4 {
        let offset = seed as usize * 8;
        r[offset..offset + 8].copy_from_slice(&twox_seeded(seed, data));
    }
    r
}
