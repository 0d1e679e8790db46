// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Built-in precompiles, registered before any user precompile in a
//! reserved low-address block.

use std::sync::Arc;

use crate::api::Api;
use crate::crypto::keccak256;
use crate::precompiles::{Precompile, PrecompileRef, PrecompileResult};
use crate::utils::bytes_to_address;
use crate::Address;

/// Persistent preimage registry.
pub const PREIMAGE_REGISTRY_ADDRESS: u8 = 0x70;
/// Ephemeral preimage registry.
pub const EPHEMERAL_PREIMAGE_REGISTRY_ADDRESS: u8 = 0x71;
/// Pure Keccak-256 hasher.
pub const KECCAK256_ADDRESS: u8 = 0x72;

pub const BUILTIN_COUNT: usize = 3;

const PREIMAGE_STORE_BASE_GAS: u64 = 2_000;
const PREIMAGE_STORE_WORD_GAS: u64 = 50;
const KECCAK256_BASE_GAS: u64 = 30;
const KECCAK256_WORD_GAS: u64 = 6;

fn words(len: usize) -> u64 {
    (len as u64).div_ceil(32)
}

/// The built-ins in registration order.
pub fn builtin_precompiles() -> Vec<(Address, PrecompileRef)> {
    vec![
        (
            bytes_to_address(&[PREIMAGE_REGISTRY_ADDRESS]),
            Arc::new(PreimageRegistry) as PrecompileRef,
        ),
        (
            bytes_to_address(&[EPHEMERAL_PREIMAGE_REGISTRY_ADDRESS]),
            Arc::new(EphemeralPreimageRegistry) as PrecompileRef,
        ),
        (
            bytes_to_address(&[KECCAK256_ADDRESS]),
            Arc::new(Keccak256Precompile) as PrecompileRef,
        ),
    ]
}

/// Stores the call input as a persistent preimage and returns its hash.
pub struct PreimageRegistry;

impl Precompile for PreimageRegistry {
    fn required_gas(&self, input: &[u8]) -> u64 {
        PREIMAGE_STORE_BASE_GAS + PREIMAGE_STORE_WORD_GAS * words(input.len())
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        true
    }

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        let hash = api.persistent().add_preimage(input);
        Ok(hash.to_vec())
    }
}

/// Stores the call input as an ephemeral preimage and returns its hash.
/// The preimage is gone at transaction end.
pub struct EphemeralPreimageRegistry;

impl Precompile for EphemeralPreimageRegistry {
    fn required_gas(&self, input: &[u8]) -> u64 {
        PREIMAGE_STORE_BASE_GAS + PREIMAGE_STORE_WORD_GAS * words(input.len())
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        // Ephemeral writes still need a mutable API.
        true
    }

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        let hash = api.ephemeral().add_preimage(input);
        Ok(hash.to_vec())
    }
}

/// Hashes the call input with Keccak-256. Pure.
pub struct Keccak256Precompile;

impl Precompile for Keccak256Precompile {
    fn is_pure(&self) -> bool {
        true
    }

    fn required_gas(&self, input: &[u8]) -> u64 {
        KECCAK256_BASE_GAS + KECCAK256_WORD_GAS * words(input.len())
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        false
    }

    fn run(&self, _api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        Ok(keccak256(input).to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Evm, MockEvm, MockStateDB, StateDB};
    use crate::precompiles::run_precompile;
    use std::rc::Rc;

    fn new_context() -> (Rc<dyn StateDB>, Rc<dyn Evm>) {
        let db: Rc<dyn StateDB> = Rc::new(MockStateDB::new());
        let evm: Rc<dyn Evm> = Rc::new(MockEvm::new(Rc::clone(&db)));
        (db, evm)
    }

    #[test]
    fn test_preimage_registry() {
        let (db, evm) = new_context();
        let address = bytes_to_address(&[PREIMAGE_REGISTRY_ADDRESS]);
        let pc = PreimageRegistry;
        let input = b"registered preimage";
        let gas = pc.required_gas(input);

        let (output, gas_left) =
            run_precompile(evm, address, &pc, input, gas, false).unwrap();
        assert_eq!(gas_left, 0);
        assert_eq!(output, keccak256(input).to_vec());
        assert_eq!(db.get_persistent_preimage(keccak256(input)), input);
        assert_eq!(db.get_ephemeral_preimage_size(keccak256(input)), 0);
    }

    #[test]
    fn test_ephemeral_preimage_registry() {
        let (db, evm) = new_context();
        let address = bytes_to_address(&[EPHEMERAL_PREIMAGE_REGISTRY_ADDRESS]);
        let pc = EphemeralPreimageRegistry;
        let input = b"scratch preimage";
        let gas = pc.required_gas(input);

        let (output, _) = run_precompile(evm, address, &pc, input, gas, false).unwrap();
        assert_eq!(output, keccak256(input).to_vec());
        assert_eq!(db.get_ephemeral_preimage(keccak256(input)), input);
        assert_eq!(db.get_persistent_preimage_size(keccak256(input)), 0);
    }

    #[test]
    fn test_keccak256_precompile() {
        let (_, evm) = new_context();
        let address = bytes_to_address(&[KECCAK256_ADDRESS]);
        let pc = Keccak256Precompile;
        assert!(pc.is_pure());
        assert!(!pc.mutates_storage(b"abc"));

        let (output, gas_left) =
            run_precompile(evm, address, &pc, b"abc", 100, false).unwrap();
        assert_eq!(
            hex::encode(output),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
        // 1 word of input: 30 + 6.
        assert_eq!(gas_left, 100 - 36);
    }

    #[test]
    fn test_keccak256_runs_read_only() {
        // A pure precompile works under the read-only flag.
        let (_, evm) = new_context();
        let pc = Keccak256Precompile;
        let address = bytes_to_address(&[KECCAK256_ADDRESS]);
        run_precompile(evm, address, &pc, b"", 100, true).unwrap();
    }
}
