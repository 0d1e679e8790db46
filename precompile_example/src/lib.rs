// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! A realistic precompile exercising most of the framework: a persistent
//! run counter, a persistent set of preimage hashes, the preimage oracle,
//! and ephemeral bookkeeping cleared in `finalise`.
//!
//! Call input is the raw preimage to register. The output is its
//! Keccak-256 hash.

use concrete_precompiles::api::{Api, Counter};
use concrete_precompiles::crypto::keccak256;
use concrete_precompiles::precompiles::{Precompile, PrecompileError, PrecompileResult};
use concrete_precompiles::{Hash, ZERO_HASH};

const GAS_BASE: u64 = 2_500;
const GAS_PER_BYTE: u64 = 10;

/// Slot of the persistent run counter.
pub fn run_counter_key() -> Hash {
    keccak256(b"typical.counter.0")
}

/// Id of the persistent set of registered hashes.
pub fn hash_set_key() -> Hash {
    keccak256(b"typical.set.0")
}

/// Id of the ephemeral array of hashes registered in the current
/// transaction.
pub fn pending_key() -> Hash {
    keccak256(b"typical.pending.0")
}

pub struct TypicalPrecompile;

impl Precompile for TypicalPrecompile {
    fn required_gas(&self, input: &[u8]) -> u64 {
        GAS_BASE + GAS_PER_BYTE * input.len() as u64
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        true
    }

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        if input.is_empty() {
            return Err(PrecompileError::Runtime("empty preimage".into()));
        }

        let persistent = api.persistent();
        Counter::new(persistent.new_reference(run_counter_key())).inc();

        let hash = persistent.add_preimage(input);
        persistent.new_set(hash_set_key()).add(hash);

        // Remember this transaction's registrations for finalise.
        api.ephemeral().new_array(pending_key()).push(hash);

        Ok(hash.to_vec())
    }

    fn finalise(&self, api: &Api) -> PrecompileResult<()> {
        // Drain the per-transaction scratch list.
        let pending = api.ephemeral().new_array(pending_key());
        while pending.pop() != ZERO_HASH {}
        Ok(())
    }
}
