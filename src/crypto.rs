// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Legacy Keccak-256, the canonical hash of the precompile framework.
//!
//! Keccak-256 keys every derived storage slot and identifies every
//! preimage, so it is also exported to sandboxed guests as a host
//! function. Note that this is the pre-NIST Keccak used by Ethereum, not
//! standard SHA-3.

use sha3::{Digest, Keccak256};

use crate::Hash;

/// Compute the Keccak-256 hash of a byte string.
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute the Keccak-256 hash of the concatenation of two byte strings.
/// Used for mapping slot derivation, where the slot is `keccak(key ++ id)`.
pub fn keccak256_pair(a: &[u8], b: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(a);
    hasher.update(b);
    hasher.finalize().into()
}
