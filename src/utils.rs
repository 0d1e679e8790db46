// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Byte-level conversion helpers shared by the storage, bridge, and
//! precompile layers.
//!
//! All multi-byte integers on the wire are big-endian, matching Ethereum's
//! conventions. Decoders are tolerant: values shorter than their target
//! width are zero-extended from the most significant side, and values
//! longer than the target width keep their least significant bytes.

use num_bigint::BigUint;

use crate::{Address, Hash};

/// Encode a u64 as 8 big-endian bytes.
pub fn u64_to_bytes(value: u64) -> [u8; 8] {
    value.to_be_bytes()
}

/// Decode a big-endian byte string into a u64. Shorter inputs are
/// zero-extended, longer inputs keep their low 8 bytes.
pub fn bytes_to_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    if bytes.len() >= 8 {
        buf.copy_from_slice(&bytes[bytes.len() - 8..]);
    } else {
        buf[8 - bytes.len()..].copy_from_slice(bytes);
    }
    u64::from_be_bytes(buf)
}

/// Right-align a byte string into a 32-byte hash, truncating from the left
/// if the input is longer than 32 bytes.
pub fn bytes_to_hash(bytes: &[u8]) -> Hash {
    let mut hash = [0u8; 32];
    if bytes.len() >= 32 {
        hash.copy_from_slice(&bytes[bytes.len() - 32..]);
    } else {
        hash[32 - bytes.len()..].copy_from_slice(bytes);
    }
    hash
}

/// Right-align a byte string into a 20-byte address.
pub fn bytes_to_address(bytes: &[u8]) -> Address {
    let mut address = [0u8; 20];
    if bytes.len() >= 20 {
        address.copy_from_slice(&bytes[bytes.len() - 20..]);
    } else {
        address[20 - bytes.len()..].copy_from_slice(bytes);
    }
    address
}

/// Encode a u64 as a 32-byte hash (right-aligned).
pub fn u64_to_hash(value: u64) -> Hash {
    bytes_to_hash(&value.to_be_bytes())
}

/// Read the low 64 bits of a hash.
pub fn hash_to_u64(hash: &Hash) -> u64 {
    bytes_to_u64(&hash[24..])
}

/// Convert a big integer to a 32-byte hash (big-endian, zero-padded).
/// Values wider than 256 bits keep their least significant 32 bytes.
pub fn biguint_to_hash(value: &BigUint) -> Hash {
    let bytes = value.to_bytes_be();
    bytes_to_hash(&bytes)
}

/// Interpret a hash as an unsigned big integer.
pub fn hash_to_biguint(hash: &Hash) -> BigUint {
    BigUint::from_bytes_be(hash)
}
