// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Per-address, per-lane views over a [`StateDB`].
//!
//! A `Storage` scopes every slot and preimage operation to one account
//! address and one lane, so the datastore layer above it never handles
//! addresses or lane selection.

use std::rc::Rc;

use crate::api::statedb::StateDB;
use crate::crypto::keccak256;
use crate::{Address, Hash};

/// A single-lane, single-address slot store with its preimage oracle.
pub trait Storage {
    fn address(&self) -> Address;
    fn get(&self, key: Hash) -> Hash;
    fn set(&self, key: Hash, value: Hash);

    /// Store a preimage and return its Keccak-256 hash.
    fn add_preimage(&self, preimage: &[u8]) -> Hash;
    fn has_preimage(&self, hash: Hash) -> bool;
    fn get_preimage(&self, hash: Hash) -> Vec<u8>;
    fn get_preimage_size(&self, hash: Hash) -> usize;
}

/// Consensus-visible slot view.
pub struct PersistentStorage {
    db: Rc<dyn StateDB>,
    address: Address,
}

impl PersistentStorage {
    pub fn new(db: Rc<dyn StateDB>, address: Address) -> Self {
        Self { db, address }
    }
}

impl Storage for PersistentStorage {
    fn address(&self) -> Address {
        self.address
    }

    fn get(&self, key: Hash) -> Hash {
        self.db.get_persistent_state(self.address, key)
    }

    fn set(&self, key: Hash, value: Hash) {
        self.db.set_persistent_state(self.address, key, value);
    }

    fn add_preimage(&self, preimage: &[u8]) -> Hash {
        let hash = keccak256(preimage);
        self.db.add_persistent_preimage(hash, preimage);
        hash
    }

    fn has_preimage(&self, hash: Hash) -> bool {
        self.db.get_persistent_preimage_size(hash) > 0
    }

    fn get_preimage(&self, hash: Hash) -> Vec<u8> {
        self.db.get_persistent_preimage(hash)
    }

    fn get_preimage_size(&self, hash: Hash) -> usize {
        self.db.get_persistent_preimage_size(hash)
    }
}

/// Transaction-scoped scratch view. Same interface, different lane.
pub struct EphemeralStorage {
    db: Rc<dyn StateDB>,
    address: Address,
}

impl EphemeralStorage {
    pub fn new(db: Rc<dyn StateDB>, address: Address) -> Self {
        Self { db, address }
    }
}

impl Storage for EphemeralStorage {
    fn address(&self) -> Address {
        self.address
    }

    fn get(&self, key: Hash) -> Hash {
        self.db.get_ephemeral_state(self.address, key)
    }

    fn set(&self, key: Hash, value: Hash) {
        self.db.set_ephemeral_state(self.address, key, value);
    }

    fn add_preimage(&self, preimage: &[u8]) -> Hash {
        let hash = keccak256(preimage);
        self.db.add_ephemeral_preimage(hash, preimage);
        hash
    }

    fn has_preimage(&self, hash: Hash) -> bool {
        self.db.get_ephemeral_preimage_size(hash) > 0
    }

    fn get_preimage(&self, hash: Hash) -> Vec<u8> {
        self.db.get_ephemeral_preimage(hash)
    }

    fn get_preimage_size(&self, hash: Hash) -> usize {
        self.db.get_ephemeral_preimage_size(hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::mock::MockStateDB;
    use rand::{Rng, SeedableRng};

    fn storages() -> Vec<(&'static str, Box<dyn Storage>)> {
        let address = [0x11u8; 20];
        let persistent_db: Rc<dyn StateDB> = Rc::new(MockStateDB::new());
        let ephemeral_db: Rc<dyn StateDB> = Rc::new(MockStateDB::new());
        vec![
            (
                "persistent",
                Box::new(PersistentStorage::new(persistent_db, address)),
            ),
            (
                "ephemeral",
                Box::new(EphemeralStorage::new(ephemeral_db, address)),
            ),
        ]
    }

    #[test]
    fn test_storage_slots() {
        for (name, storage) in storages() {
            let key = [1u8; 32];
            assert_eq!(storage.get(key), [0u8; 32], "{name}: missing key is zero");
            storage.set(key, [2u8; 32]);
            assert_eq!(storage.get(key), [2u8; 32], "{name}: read back");
            storage.set(key, [3u8; 32]);
            assert_eq!(storage.get(key), [3u8; 32], "{name}: overwrite");
        }
    }

    #[test]
    fn test_storage_preimages() {
        for (name, storage) in storages() {
            let absent = [9u8; 32];
            assert!(!storage.has_preimage(absent), "{name}");
            assert_eq!(storage.get_preimage(absent), Vec::<u8>::new(), "{name}");
            assert_eq!(storage.get_preimage_size(absent), 0, "{name}");

            let preimage = b"some preimage bytes";
            let hash = storage.add_preimage(preimage);
            assert_eq!(hash, crate::crypto::keccak256(preimage), "{name}");
            assert!(storage.has_preimage(hash), "{name}");
            assert_eq!(storage.get_preimage(hash), preimage, "{name}");
            assert_eq!(storage.get_preimage_size(hash), preimage.len(), "{name}");
        }
    }

    #[test]
    fn test_storage_fuzz() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(0x5eed);
        for (name, storage) in storages() {
            let mut expected = std::collections::HashMap::new();
            for _ in 0..200 {
                let key: Hash = {
                    // Small key space forces overwrites.
                    let mut k = [0u8; 32];
                    k[31] = rng.gen_range(0..16);
                    k
                };
                if rng.gen_bool(0.6) {
                    let mut value = [0u8; 32];
                    rng.fill(&mut value[..]);
                    storage.set(key, value);
                    expected.insert(key, value);
                } else {
                    let want = expected.get(&key).copied().unwrap_or([0u8; 32]);
                    assert_eq!(storage.get(key), want, "{name}");
                }
            }
        }
    }

    #[test]
    fn test_lanes_are_independent() {
        let db: Rc<dyn StateDB> = Rc::new(MockStateDB::new());
        let address = [0x22u8; 20];
        let persistent = PersistentStorage::new(Rc::clone(&db), address);
        let ephemeral = EphemeralStorage::new(Rc::clone(&db), address);

        let key = [5u8; 32];
        persistent.set(key, [1u8; 32]);
        assert_eq!(ephemeral.get(key), [0u8; 32]);
        ephemeral.set(key, [2u8; 32]);
        assert_eq!(persistent.get(key), [1u8; 32]);
    }
}
