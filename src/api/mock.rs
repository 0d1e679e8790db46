// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! In-memory implementations of [`StateDB`] and [`Evm`] for tests and
//! development. Users integrating with a real node provide their own
//! implementations backed by its state database.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigUint;

use crate::api::api::Evm;
use crate::api::statedb::StateDB;
use crate::crypto::keccak256;
use crate::utils::u64_to_bytes;
use crate::{Address, Hash};

/// Hash-map backed state database with both lanes and preimage stores.
#[derive(Default)]
pub struct MockStateDB {
    persistent: RefCell<HashMap<(Address, Hash), Hash>>,
    ephemeral: RefCell<HashMap<(Address, Hash), Hash>>,
    persistent_preimages: RefCell<HashMap<Hash, Vec<u8>>>,
    ephemeral_preimages: RefCell<HashMap<Hash, Vec<u8>>>,
}

impl MockStateDB {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateDB for MockStateDB {
    fn set_persistent_state(&self, addr: Address, key: Hash, value: Hash) {
        self.persistent.borrow_mut().insert((addr, key), value);
    }

    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash {
        self.persistent
            .borrow()
            .get(&(addr, key))
            .copied()
            .unwrap_or([0u8; 32])
    }

    fn set_ephemeral_state(&self, addr: Address, key: Hash, value: Hash) {
        self.ephemeral.borrow_mut().insert((addr, key), value);
    }

    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash {
        self.ephemeral
            .borrow()
            .get(&(addr, key))
            .copied()
            .unwrap_or([0u8; 32])
    }

    fn add_persistent_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.persistent_preimages
            .borrow_mut()
            .insert(hash, preimage.to_vec());
    }

    fn get_persistent_preimage(&self, hash: Hash) -> Vec<u8> {
        self.persistent_preimages
            .borrow()
            .get(&hash)
            .cloned()
            .unwrap_or_default()
    }

    fn get_persistent_preimage_size(&self, hash: Hash) -> usize {
        self.persistent_preimages
            .borrow()
            .get(&hash)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn add_ephemeral_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.ephemeral_preimages
            .borrow_mut()
            .insert(hash, preimage.to_vec());
    }

    fn get_ephemeral_preimage(&self, hash: Hash) -> Vec<u8> {
        self.ephemeral_preimages
            .borrow()
            .get(&hash)
            .cloned()
            .unwrap_or_default()
    }

    fn get_ephemeral_preimage_size(&self, hash: Hash) -> usize {
        self.ephemeral_preimages
            .borrow()
            .get(&hash)
            .map(Vec::len)
            .unwrap_or(0)
    }
}

/// Fixed-block EVM context over a shared [`MockStateDB`].
pub struct MockEvm {
    db: Rc<dyn StateDB>,
    pub number: BigUint,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub difficulty: BigUint,
    pub coinbase: Address,
}

impl MockEvm {
    pub fn new(db: Rc<dyn StateDB>) -> Self {
        let mut coinbase = [0u8; 20];
        coinbase[0] = 0x02;
        Self {
            db,
            number: BigUint::from(12345u32),
            timestamp: 1234567890,
            gas_limit: 30_000_000,
            difficulty: BigUint::from(2u32),
            coinbase,
        }
    }
}

impl Evm for MockEvm {
    fn state_db(&self) -> Rc<dyn StateDB> {
        Rc::clone(&self.db)
    }

    fn block_hash(&self, block: u64) -> Hash {
        keccak256(&u64_to_bytes(block))
    }

    fn block_timestamp(&self) -> u64 {
        self.timestamp
    }

    fn block_gas_limit(&self) -> u64 {
        self.gas_limit
    }

    fn block_number(&self) -> BigUint {
        self.number.clone()
    }

    fn block_difficulty(&self) -> BigUint {
        self.difficulty.clone()
    }

    fn block_coinbase(&self) -> Address {
        self.coinbase
    }
}
