// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Typed collections over flat 32-byte slot storage.
//!
//! Every collection derives its slots by Keccak hashing, in the same
//! layout Solidity uses for storage variables, so precompiles and EVM
//! contracts can share state views:
//!
//! - `Reference(key)` occupies the single slot `key`.
//! - `Mapping(id)` stores entry `k` at `keccak256(k ++ id)`.
//! - `Array(id)` stores its length at `id` and element `i` at
//!   `keccak256(id) + i` (256-bit wrapping addition).
//! - `Set(id)` combines an array of values at `keccak256(id)` with an
//!   index mapping at `keccak256(id) + 1`. The mapping stores `index + 1`
//!   so that zero always means "absent".
//!
//! Collections hold a cloned [`Datastore`] handle and an id; the backing
//! storage is the sole owner of state, so nesting collections never
//! creates ownership cycles.

use std::cell::OnceCell;
use std::rc::Rc;

use num_bigint::BigUint;
use num_traits::One;

use crate::api::storage::Storage;
use crate::crypto::{keccak256, keccak256_pair};
use crate::utils::{biguint_to_hash, hash_to_biguint, hash_to_u64, u64_to_hash};
use crate::{Address, Hash, ZERO_HASH};

/// Factory for typed collections over one [`Storage`] lane.
#[derive(Clone)]
pub struct Datastore {
    storage: Rc<dyn Storage>,
}

impl Datastore {
    pub fn new(storage: Rc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn address(&self) -> Address {
        self.storage.address()
    }

    pub fn get(&self, key: Hash) -> Hash {
        self.storage.get(key)
    }

    pub fn set(&self, key: Hash, value: Hash) {
        self.storage.set(key, value);
    }

    pub fn add_preimage(&self, preimage: &[u8]) -> Hash {
        self.storage.add_preimage(preimage)
    }

    pub fn has_preimage(&self, hash: Hash) -> bool {
        self.storage.has_preimage(hash)
    }

    pub fn get_preimage(&self, hash: Hash) -> Vec<u8> {
        self.storage.get_preimage(hash)
    }

    pub fn get_preimage_size(&self, hash: Hash) -> usize {
        self.storage.get_preimage_size(hash)
    }

    pub fn new_reference(&self, key: Hash) -> Reference {
        Reference {
            ds: self.clone(),
            key,
        }
    }

    pub fn new_map(&self, id: Hash) -> Mapping {
        Mapping {
            ds: self.clone(),
            id,
        }
    }

    pub fn new_array(&self, id: Hash) -> Array {
        Array {
            ds: self.clone(),
            id,
            id_hash: OnceCell::new(),
        }
    }

    pub fn new_set(&self, id: Hash) -> Set {
        Set {
            ds: self.clone(),
            id,
            id_hash: OnceCell::new(),
        }
    }
}

// Reference

/// A single named slot.
pub struct Reference {
    ds: Datastore,
    key: Hash,
}

impl Reference {
    pub fn key(&self) -> Hash {
        self.key
    }

    pub fn get(&self) -> Hash {
        self.ds.get(self.key)
    }

    pub fn set(&self, value: Hash) {
        self.ds.set(self.key, value);
    }
}

// Mapping

/// A hash-to-hash mapping with Solidity slot derivation.
pub struct Mapping {
    ds: Datastore,
    id: Hash,
}

impl Mapping {
    fn slot(&self, key: Hash) -> Hash {
        keccak256_pair(&key, &self.id)
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn get(&self, key: Hash) -> Hash {
        self.ds.get(self.slot(key))
    }

    pub fn set(&self, key: Hash, value: Hash) {
        self.ds.set(self.slot(key), value);
    }

    pub fn get_reference(&self, key: Hash) -> Reference {
        self.ds.new_reference(self.slot(key))
    }

    pub fn get_map(&self, key: Hash) -> Mapping {
        self.ds.new_map(self.slot(key))
    }

    pub fn get_array(&self, key: Hash) -> Array {
        self.ds.new_array(self.slot(key))
    }
}

// Array

/// A length-prefixed array. Out-of-range reads return the zero hash;
/// out-of-range writes are a programming error.
pub struct Array {
    ds: Datastore,
    id: Hash,
    id_hash: OnceCell<Hash>,
}

impl Array {
    fn id_hash(&self) -> &Hash {
        self.id_hash.get_or_init(|| keccak256(&self.id))
    }

    fn element_key(&self, index: u64) -> Hash {
        let slot = hash_to_biguint(self.id_hash()) + index;
        biguint_to_hash(&slot)
    }

    fn set_length(&self, length: u64) {
        self.ds.set(self.id, u64_to_hash(length));
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn length(&self) -> u64 {
        hash_to_u64(&self.ds.get(self.id))
    }

    pub fn get(&self, index: u64) -> Hash {
        if index >= self.length() {
            return ZERO_HASH;
        }
        self.ds.get(self.element_key(index))
    }

    pub fn set(&self, index: u64, value: Hash) {
        if index >= self.length() {
            panic!("array index out of bounds");
        }
        self.ds.set(self.element_key(index), value);
    }

    pub fn push(&self, value: Hash) {
        let length = self.length();
        self.set_length(length + 1);
        self.ds.set(self.element_key(length), value);
    }

    pub fn pop(&self) -> Hash {
        let length = self.length();
        if length == 0 {
            return ZERO_HASH;
        }
        let value = self.get(length - 1);
        self.set_length(length - 1);
        value
    }

    pub fn swap(&self, i: u64, j: u64) {
        let length = self.length();
        if i >= length || j >= length {
            panic!("array index out of bounds");
        }
        let iv = self.get(i);
        self.set(i, self.get(j));
        self.set(j, iv);
    }

    pub fn get_reference(&self, index: u64) -> Reference {
        self.ds.new_reference(self.element_key(index))
    }

    pub fn get_map(&self, index: u64) -> Mapping {
        self.ds.new_map(self.element_key(index))
    }

    pub fn get_array(&self, index: u64) -> Array {
        self.ds.new_array(self.element_key(index))
    }
}

// Set

/// An unordered set of hashes with O(1) membership and removal.
pub struct Set {
    ds: Datastore,
    id: Hash,
    id_hash: OnceCell<Hash>,
}

impl Set {
    fn id_hash(&self) -> &Hash {
        self.id_hash.get_or_init(|| keccak256(&self.id))
    }

    fn values_array(&self) -> Array {
        self.ds.new_array(*self.id_hash())
    }

    /// Maps each member to its array index plus one; zero means absent.
    fn index_map(&self) -> Mapping {
        let id = hash_to_biguint(self.id_hash()) + BigUint::one();
        self.ds.new_map(biguint_to_hash(&id))
    }

    pub fn id(&self) -> Hash {
        self.id
    }

    pub fn has(&self, value: Hash) -> bool {
        if self.size() == 0 {
            return false;
        }
        self.index_map().get(value) != ZERO_HASH
    }

    pub fn add(&self, value: Hash) {
        if self.has(value) {
            return;
        }
        let values = self.values_array();
        let index = values.length();
        self.index_map().set(value, u64_to_hash(index + 1));
        values.push(value);
    }

    pub fn remove(&self, value: Hash) {
        if !self.has(value) {
            return;
        }
        let values = self.values_array();
        let index_map = self.index_map();
        let index = hash_to_u64(&index_map.get(value)) - 1;
        let last = values.length() - 1;
        if index != last {
            values.swap(index, last);
            // Repoint the member that moved into the vacated slot.
            let moved = values.get(index);
            index_map.set(moved, u64_to_hash(index + 1));
        }
        values.pop();
        index_map.set(value, ZERO_HASH);
    }

    pub fn size(&self) -> u64 {
        self.values_array().length()
    }

    pub fn values(&self) -> Array {
        self.values_array()
    }
}

// Counter

/// A big-integer counter over a single [`Reference`] slot.
pub struct Counter {
    reference: Reference,
}

impl Counter {
    pub fn new(reference: Reference) -> Self {
        Self { reference }
    }

    pub fn get(&self) -> BigUint {
        hash_to_biguint(&self.reference.get())
    }

    pub fn set(&self, value: &BigUint) {
        self.reference.set(biguint_to_hash(value));
    }

    pub fn add(&self, diff: u64) {
        self.set(&(self.get() + diff));
    }

    pub fn inc(&self) {
        self.add(1);
    }
}
