// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The slot-level state interface consumed by precompiles, and the access
//! wrappers that restrict it.
//!
//! A [`StateDB`] exposes two independent storage lanes keyed by
//! `(address, 32-byte key)`:
//!
//! - **Persistent**: consensus-visible state that survives block commit.
//! - **Ephemeral**: per-transaction scratch, discarded at transaction end
//!   and never hashed into the state root.
//!
//! Each lane also carries a preimage oracle mapping `keccak256(bytes)` to
//! the original byte string.
//!
//! All setters are total at this layer. Missing slots read as the zero
//! hash; missing preimages read as empty bytes with size 0.
//!
//! Mutating through a wrapper that forbids the mutation is a programming
//! error and panics: a precompile that declares itself non-mutating must
//! not reach a setter at all.

use std::rc::Rc;

use crate::{Address, Hash};

/// Slot and preimage storage with persistent and ephemeral lanes.
///
/// Implementations use interior mutability; all methods take `&self` so a
/// single handle can be shared between the API facade, the datastores, and
/// the host-side bridge handlers.
pub trait StateDB {
    fn set_persistent_state(&self, addr: Address, key: Hash, value: Hash);
    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash;
    fn set_ephemeral_state(&self, addr: Address, key: Hash, value: Hash);
    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash;

    fn add_persistent_preimage(&self, hash: Hash, preimage: &[u8]);
    fn get_persistent_preimage(&self, hash: Hash) -> Vec<u8>;
    fn get_persistent_preimage_size(&self, hash: Hash) -> usize;
    fn add_ephemeral_preimage(&self, hash: Hash, preimage: &[u8]);
    fn get_ephemeral_preimage(&self, hash: Hash) -> Vec<u8>;
    fn get_ephemeral_preimage_size(&self, hash: Hash) -> usize;
}

/// Decorator that rejects every mutation. Reads pass through unchanged.
pub struct ReadOnlyStateDb {
    inner: Rc<dyn StateDB>,
}

impl ReadOnlyStateDb {
    pub fn new(inner: Rc<dyn StateDB>) -> Self {
        Self { inner }
    }
}

impl StateDB for ReadOnlyStateDb {
    fn set_persistent_state(&self, _addr: Address, _key: Hash, _value: Hash) {
        panic!("persistent state write through read-only StateDB");
    }

    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash {
        self.inner.get_persistent_state(addr, key)
    }

    fn set_ephemeral_state(&self, _addr: Address, _key: Hash, _value: Hash) {
        panic!("ephemeral state write through read-only StateDB");
    }

    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash {
        self.inner.get_ephemeral_state(addr, key)
    }

    fn add_persistent_preimage(&self, _hash: Hash, _preimage: &[u8]) {
        panic!("preimage write through read-only StateDB");
    }

    fn get_persistent_preimage(&self, hash: Hash) -> Vec<u8> {
        self.inner.get_persistent_preimage(hash)
    }

    fn get_persistent_preimage_size(&self, hash: Hash) -> usize {
        self.inner.get_persistent_preimage_size(hash)
    }

    fn add_ephemeral_preimage(&self, _hash: Hash, _preimage: &[u8]) {
        panic!("preimage write through read-only StateDB");
    }

    fn get_ephemeral_preimage(&self, hash: Hash) -> Vec<u8> {
        self.inner.get_ephemeral_preimage(hash)
    }

    fn get_ephemeral_preimage_size(&self, hash: Hash) -> usize {
        self.inner.get_ephemeral_preimage_size(hash)
    }
}

/// Decorator for the `Finalise`/`Commit` phases: persistent slot writes are
/// rejected, while ephemeral writes and preimage additions stay available
/// for bookkeeping.
pub struct CommitSafeStateDb {
    inner: Rc<dyn StateDB>,
}

impl CommitSafeStateDb {
    pub fn new(inner: Rc<dyn StateDB>) -> Self {
        Self { inner }
    }

    /// The wrapped store, for callers that need to reach the underlying
    /// handle (e.g. to flush a guest-side cache).
    pub fn inner(&self) -> Rc<dyn StateDB> {
        Rc::clone(&self.inner)
    }
}

impl StateDB for CommitSafeStateDb {
    fn set_persistent_state(&self, _addr: Address, _key: Hash, _value: Hash) {
        panic!("persistent state write through commit-safe StateDB");
    }

    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash {
        self.inner.get_persistent_state(addr, key)
    }

    fn set_ephemeral_state(&self, addr: Address, key: Hash, value: Hash) {
        self.inner.set_ephemeral_state(addr, key, value);
    }

    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash {
        self.inner.get_ephemeral_state(addr, key)
    }

    fn add_persistent_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.inner.add_persistent_preimage(hash, preimage);
    }

    fn get_persistent_preimage(&self, hash: Hash) -> Vec<u8> {
        self.inner.get_persistent_preimage(hash)
    }

    fn get_persistent_preimage_size(&self, hash: Hash) -> usize {
        self.inner.get_persistent_preimage_size(hash)
    }

    fn add_ephemeral_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.inner.add_ephemeral_preimage(hash, preimage);
    }

    fn get_ephemeral_preimage(&self, hash: Hash) -> Vec<u8> {
        self.inner.get_ephemeral_preimage(hash)
    }

    fn get_ephemeral_preimage_size(&self, hash: Hash) -> usize {
        self.inner.get_ephemeral_preimage_size(hash)
    }
}
