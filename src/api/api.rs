// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The execution context handed to a precompile: its own address, the
//! slot store, an optional view of the enclosing block, and the two typed
//! datastores.
//!
//! State-only APIs exist for the `Finalise`/`Commit` phases and for tests;
//! asking one for block context is a programming error and panics.

use std::rc::Rc;

use num_bigint::BigUint;

use crate::api::datastore::Datastore;
use crate::api::statedb::{CommitSafeStateDb, ReadOnlyStateDb, StateDB};
use crate::api::storage::{EphemeralStorage, PersistentStorage};
use crate::{Address, Hash};

/// Read-only view of the enclosing block, plus access to the slot store.
pub trait Evm {
    fn state_db(&self) -> Rc<dyn StateDB>;
    fn block_hash(&self, block: u64) -> Hash;
    fn block_timestamp(&self) -> u64;
    fn block_gas_limit(&self) -> u64;
    fn block_number(&self) -> BigUint;
    fn block_difficulty(&self) -> BigUint;
    fn block_coinbase(&self) -> Address;
}

/// Aggregate of the block fields, used where one round trip should fetch
/// them all. Bridge encoding lives in the bridge module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockData {
    pub number: BigUint,
    pub timestamp: u64,
    pub gas_limit: u64,
    pub difficulty: BigUint,
    pub coinbase: Address,
}

/// EVM wrapper whose `state_db` hands out a read-only store.
pub struct ReadOnlyEvm {
    inner: Rc<dyn Evm>,
}

impl ReadOnlyEvm {
    pub fn new(inner: Rc<dyn Evm>) -> Self {
        Self { inner }
    }
}

impl Evm for ReadOnlyEvm {
    fn state_db(&self) -> Rc<dyn StateDB> {
        Rc::new(ReadOnlyStateDb::new(self.inner.state_db()))
    }

    fn block_hash(&self, block: u64) -> Hash {
        self.inner.block_hash(block)
    }

    fn block_timestamp(&self) -> u64 {
        self.inner.block_timestamp()
    }

    fn block_gas_limit(&self) -> u64 {
        self.inner.block_gas_limit()
    }

    fn block_number(&self) -> BigUint {
        self.inner.block_number()
    }

    fn block_difficulty(&self) -> BigUint {
        self.inner.block_difficulty()
    }

    fn block_coinbase(&self) -> Address {
        self.inner.block_coinbase()
    }
}

/// EVM wrapper whose `state_db` hands out a commit-safe store.
pub struct CommitSafeEvm {
    inner: Rc<dyn Evm>,
}

impl CommitSafeEvm {
    pub fn new(inner: Rc<dyn Evm>) -> Self {
        Self { inner }
    }
}

impl Evm for CommitSafeEvm {
    fn state_db(&self) -> Rc<dyn StateDB> {
        Rc::new(CommitSafeStateDb::new(self.inner.state_db()))
    }

    fn block_hash(&self, block: u64) -> Hash {
        self.inner.block_hash(block)
    }

    fn block_timestamp(&self) -> u64 {
        self.inner.block_timestamp()
    }

    fn block_gas_limit(&self) -> u64 {
        self.inner.block_gas_limit()
    }

    fn block_number(&self) -> BigUint {
        self.inner.block_number()
    }

    fn block_difficulty(&self) -> BigUint {
        self.inner.block_difficulty()
    }

    fn block_coinbase(&self) -> Address {
        self.inner.block_coinbase()
    }
}

/// The handle a precompile receives for every entry point.
pub struct Api {
    address: Address,
    statedb: Rc<dyn StateDB>,
    evm: Option<Rc<dyn Evm>>,
    persistent: Datastore,
    ephemeral: Datastore,
}

impl Api {
    fn build(address: Address, statedb: Rc<dyn StateDB>, evm: Option<Rc<dyn Evm>>) -> Self {
        let persistent = Datastore::new(Rc::new(PersistentStorage::new(
            Rc::clone(&statedb),
            address,
        )));
        let ephemeral = Datastore::new(Rc::new(EphemeralStorage::new(
            Rc::clone(&statedb),
            address,
        )));
        Self {
            address,
            statedb,
            evm,
            persistent,
            ephemeral,
        }
    }

    /// Full API over an EVM context.
    pub fn new(evm: Rc<dyn Evm>, address: Address) -> Self {
        Self::build(address, evm.state_db(), Some(evm))
    }

    /// Full API with every mutation blocked.
    pub fn new_read_only(evm: Rc<dyn Evm>, address: Address) -> Self {
        Self::new(Rc::new(ReadOnlyEvm::new(evm)), address)
    }

    /// Full API with persistent mutations blocked, for `Finalise`/`Commit`.
    pub fn new_commit_safe(evm: Rc<dyn Evm>, address: Address) -> Self {
        Self::new(Rc::new(CommitSafeEvm::new(evm)), address)
    }

    /// State-only API. Block context accessors panic.
    pub fn new_state(statedb: Rc<dyn StateDB>, address: Address) -> Self {
        Self::build(address, statedb, None)
    }

    /// State-only API with every mutation blocked.
    pub fn new_read_only_state(statedb: Rc<dyn StateDB>, address: Address) -> Self {
        Self::new_state(Rc::new(ReadOnlyStateDb::new(statedb)), address)
    }

    /// State-only API with persistent mutations blocked.
    pub fn new_commit_safe_state(statedb: Rc<dyn StateDB>, address: Address) -> Self {
        Self::new_state(Rc::new(CommitSafeStateDb::new(statedb)), address)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn state_db(&self) -> Rc<dyn StateDB> {
        Rc::clone(&self.statedb)
    }

    pub fn evm(&self) -> Option<Rc<dyn Evm>> {
        self.evm.clone()
    }

    pub fn persistent(&self) -> &Datastore {
        &self.persistent
    }

    pub fn ephemeral(&self) -> &Datastore {
        &self.ephemeral
    }

    fn require_evm(&self) -> &Rc<dyn Evm> {
        self.evm
            .as_ref()
            .expect("block context is not available on a state-only API")
    }

    pub fn block_hash(&self, block: u64) -> Hash {
        self.require_evm().block_hash(block)
    }

    pub fn block(&self) -> BlockData {
        let evm = self.require_evm();
        BlockData {
            number: evm.block_number(),
            timestamp: evm.block_timestamp(),
            gas_limit: evm.block_gas_limit(),
            difficulty: evm.block_difficulty(),
            coinbase: evm.block_coinbase(),
        }
    }
}
