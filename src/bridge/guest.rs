// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Guest-side proxies.
//!
//! A proxy object reconstructs the host's [`StateDB`] or [`Evm`] on the
//! guest side of the bridge: every method serializes its arguments with
//! the args codec, invokes the corresponding host function, and decodes
//! the returned value. To the precompile the proxy is indistinguishable
//! from a native implementation.
//!
//! [`CachedProxyStateDb`] additionally coalesces repeated slot reads and
//! defers slot writes until `commit`, which must run on every invocation
//! entry point so the writes reach the host before the host's own commit
//! phase. Preimages are not cached. Cached proxies must not be used by
//! pure precompiles.
//!
//! A bridge failure in a proxy means the module's memory or the host
//! handler misbehaved; proxies panic, aborting the invocation.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use num_bigint::BigUint;

use crate::api::{Evm, StateDB};
use crate::bridge::{get_value, put_args, BridgeMemory, BridgeResult, MemPointer, OpCode};
use crate::utils::{bytes_to_address, bytes_to_hash, bytes_to_u64, u64_to_bytes};
use crate::{Address, Hash};

/// Linear memory shared between a proxy and its bridge function.
pub type SharedMemory = Rc<RefCell<dyn BridgeMemory>>;

/// A host function as seen from the guest: one packed pointer in, one
/// packed pointer out.
pub type BridgeFn = Rc<dyn Fn(u64) -> u64>;

fn expect_bridge<T>(result: BridgeResult<T>, what: &str) -> T {
    result.unwrap_or_else(|err| panic!("{what}: {err}"))
}

fn bridge_call(memory: &SharedMemory, bridge: &BridgeFn, args: &[Vec<u8>]) -> Vec<u8> {
    let pointer = {
        let mut mem = memory.borrow_mut();
        expect_bridge(put_args(&mut *mem, args), "proxy argument encoding")
    };
    let ret = MemPointer::from_u64(bridge(pointer.as_u64()));
    let mut mem = memory.borrow_mut();
    expect_bridge(get_value(&mut *mem, ret), "proxy return decoding")
}

/// Guest-side state database speaking to the host's StateDB service.
pub struct ProxyStateDb {
    memory: SharedMemory,
    bridge: BridgeFn,
}

impl ProxyStateDb {
    pub fn new(memory: SharedMemory, bridge: BridgeFn) -> Self {
        Self { memory, bridge }
    }

    fn call(&self, op: OpCode, args: &[&[u8]]) -> Vec<u8> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(op.encode());
        full.extend(args.iter().map(|a| a.to_vec()));
        bridge_call(&self.memory, &self.bridge, &full)
    }
}

impl StateDB for ProxyStateDb {
    fn set_persistent_state(&self, addr: Address, key: Hash, value: Hash) {
        self.call(OpCode::SetPersistentState, &[&addr, &key, &value]);
    }

    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash {
        bytes_to_hash(&self.call(OpCode::GetPersistentState, &[&addr, &key]))
    }

    fn set_ephemeral_state(&self, addr: Address, key: Hash, value: Hash) {
        self.call(OpCode::SetEphemeralState, &[&addr, &key, &value]);
    }

    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash {
        bytes_to_hash(&self.call(OpCode::GetEphemeralState, &[&addr, &key]))
    }

    fn add_persistent_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.call(OpCode::AddPersistentPreimage, &[&hash, preimage]);
    }

    fn get_persistent_preimage(&self, hash: Hash) -> Vec<u8> {
        self.call(OpCode::GetPersistentPreimage, &[&hash])
    }

    fn get_persistent_preimage_size(&self, hash: Hash) -> usize {
        bytes_to_u64(&self.call(OpCode::GetPersistentPreimageSize, &[&hash])) as usize
    }

    fn add_ephemeral_preimage(&self, hash: Hash, preimage: &[u8]) {
        self.call(OpCode::AddEphemeralPreimage, &[&hash, preimage]);
    }

    fn get_ephemeral_preimage(&self, hash: Hash) -> Vec<u8> {
        self.call(OpCode::GetEphemeralPreimage, &[&hash])
    }

    fn get_ephemeral_preimage_size(&self, hash: Hash) -> usize {
        bytes_to_u64(&self.call(OpCode::GetEphemeralPreimageSize, &[&hash])) as usize
    }
}

/// Guest-side EVM context speaking to the host's EVM service.
pub struct ProxyEvm {
    memory: SharedMemory,
    bridge: BridgeFn,
    db: Rc<dyn StateDB>,
}

impl ProxyEvm {
    pub fn new(memory: SharedMemory, evm_bridge: BridgeFn, statedb_bridge: BridgeFn) -> Self {
        let db = Rc::new(ProxyStateDb::new(Rc::clone(&memory), statedb_bridge));
        Self::new_with_state_db(memory, evm_bridge, db)
    }

    /// Build over an existing store handle, e.g. a cached proxy or a
    /// commit-safe wrapper.
    pub fn new_with_state_db(
        memory: SharedMemory,
        evm_bridge: BridgeFn,
        db: Rc<dyn StateDB>,
    ) -> Self {
        Self {
            memory,
            bridge: evm_bridge,
            db,
        }
    }

    fn call(&self, op: OpCode, args: &[&[u8]]) -> Vec<u8> {
        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(op.encode());
        full.extend(args.iter().map(|a| a.to_vec()));
        bridge_call(&self.memory, &self.bridge, &full)
    }
}

impl Evm for ProxyEvm {
    fn state_db(&self) -> Rc<dyn StateDB> {
        Rc::clone(&self.db)
    }

    fn block_hash(&self, block: u64) -> Hash {
        bytes_to_hash(&self.call(OpCode::BlockHash, &[&u64_to_bytes(block)]))
    }

    fn block_timestamp(&self) -> u64 {
        bytes_to_u64(&self.call(OpCode::BlockTimestamp, &[]))
    }

    fn block_gas_limit(&self) -> u64 {
        bytes_to_u64(&self.call(OpCode::BlockGasLimit, &[]))
    }

    fn block_number(&self) -> BigUint {
        BigUint::from_bytes_be(&self.call(OpCode::BlockNumber, &[]))
    }

    fn block_difficulty(&self) -> BigUint {
        BigUint::from_bytes_be(&self.call(OpCode::BlockDifficulty, &[]))
    }

    fn block_coinbase(&self) -> Address {
        bytes_to_address(&self.call(OpCode::BlockCoinbase, &[]))
    }
}

// Cached proxy

struct SlotEntry {
    value: Hash,
    dirty: bool,
}

/// Write-back slot cache over a [`ProxyStateDb`].
pub struct CachedProxyStateDb {
    inner: ProxyStateDb,
    persistent: RefCell<HashMap<(Address, Hash), SlotEntry>>,
    ephemeral: RefCell<HashMap<(Address, Hash), SlotEntry>>,
}

impl CachedProxyStateDb {
    pub fn new(memory: SharedMemory, bridge: BridgeFn) -> Self {
        Self {
            inner: ProxyStateDb::new(memory, bridge),
            persistent: RefCell::new(HashMap::new()),
            ephemeral: RefCell::new(HashMap::new()),
        }
    }

    /// Flush dirty slots to the host. Must run before the host acts on
    /// the invocation's writes, i.e. at the end of every entry point.
    pub fn commit(&self) {
        let mut persistent = self.persistent.borrow_mut();
        let mut dirty: Vec<_> = persistent
            .iter_mut()
            .filter(|(_, entry)| entry.dirty)
            .collect();
        dirty.sort_by_key(|((addr, key), _)| (*addr, *key));
        for ((addr, key), entry) in dirty {
            self.inner.set_persistent_state(*addr, *key, entry.value);
            entry.dirty = false;
        }
        drop(persistent);

        let mut ephemeral = self.ephemeral.borrow_mut();
        let mut dirty: Vec<_> = ephemeral
            .iter_mut()
            .filter(|(_, entry)| entry.dirty)
            .collect();
        dirty.sort_by_key(|((addr, key), _)| (*addr, *key));
        for ((addr, key), entry) in dirty {
            self.inner.set_ephemeral_state(*addr, *key, entry.value);
            entry.dirty = false;
        }
    }

    fn cached_get(
        cache: &RefCell<HashMap<(Address, Hash), SlotEntry>>,
        addr: Address,
        key: Hash,
        fetch: impl FnOnce() -> Hash,
    ) -> Hash {
        if let Some(entry) = cache.borrow().get(&(addr, key)) {
            return entry.value;
        }
        let value = fetch();
        cache.borrow_mut().insert(
            (addr, key),
            SlotEntry {
                value,
                dirty: false,
            },
        );
        value
    }

    fn cached_set(
        cache: &RefCell<HashMap<(Address, Hash), SlotEntry>>,
        addr: Address,
        key: Hash,
        value: Hash,
    ) {
        cache
            .borrow_mut()
            .insert((addr, key), SlotEntry { value, dirty: true });
    }
}

impl StateDB for CachedProxyStateDb {
    fn set_persistent_state(&self, addr: Address, key: Hash, value: Hash) {
        Self::cached_set(&self.persistent, addr, key, value);
    }

    fn get_persistent_state(&self, addr: Address, key: Hash) -> Hash {
        Self::cached_get(&self.persistent, addr, key, || {
            self.inner.get_persistent_state(addr, key)
        })
    }

    fn set_ephemeral_state(&self, addr: Address, key: Hash, value: Hash) {
        Self::cached_set(&self.ephemeral, addr, key, value);
    }

    fn get_ephemeral_state(&self, addr: Address, key: Hash) -> Hash {
        Self::cached_get(&self.ephemeral, addr, key, || {
            self.inner.get_ephemeral_state(addr, key)
        })
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockEvm, MockStateDB};
    use crate::bridge::host::{new_evm_bridge, new_state_db_bridge};
    use crate::bridge::mock::MockMemory;

    fn new_shared_memory() -> SharedMemory {
        Rc::new(RefCell::new(MockMemory::new()))
    }

    fn new_proxy_pair() -> (Rc<MockStateDB>, ProxyStateDb) {
        let db = Rc::new(MockStateDB::new());
        let memory = new_shared_memory();
        let bridge = new_state_db_bridge(Rc::clone(&memory), Rc::clone(&db) as Rc<dyn StateDB>);
        (db, ProxyStateDb::new(memory, bridge))
    }

    #[test]
    fn test_proxy_statedb_slots() {
        let (db, proxy) = new_proxy_pair();
        let addr = [1u8; 20];
        let key = [2u8; 32];
        let value = [3u8; 32];

        // Writes through the proxy land in the backing store.
        proxy.set_persistent_state(addr, key, value);
        assert_eq!(db.get_persistent_state(addr, key), value);
        proxy.set_ephemeral_state(addr, key, value);
        assert_eq!(db.get_ephemeral_state(addr, key), value);

        // Writes to the backing store are visible through the proxy.
        db.set_persistent_state(addr, [4u8; 32], [5u8; 32]);
        assert_eq!(proxy.get_persistent_state(addr, [4u8; 32]), [5u8; 32]);
        assert_eq!(proxy.get_persistent_state(addr, [9u8; 32]), [0u8; 32]);
    }

    #[test]
    fn test_proxy_statedb_preimages() {
        let (db, proxy) = new_proxy_pair();
        let preimage = b"proxied preimage".to_vec();
        let hash = crate::crypto::keccak256(&preimage);

        proxy.add_persistent_preimage(hash, &preimage);
        assert_eq!(db.get_persistent_preimage(hash), preimage);
        assert_eq!(proxy.get_persistent_preimage(hash), preimage);
        assert_eq!(proxy.get_persistent_preimage_size(hash), preimage.len());

        assert_eq!(proxy.get_ephemeral_preimage_size(hash), 0);
        assert!(proxy.get_ephemeral_preimage(hash).is_empty());
    }

    #[test]
    fn test_proxy_evm_matches_backing_evm() {
        let db = Rc::new(MockStateDB::new());
        let evm = Rc::new(MockEvm::new(Rc::clone(&db) as Rc<dyn StateDB>));
        let memory = new_shared_memory();
        let evm_bridge = new_evm_bridge(Rc::clone(&memory), Rc::clone(&evm) as Rc<dyn Evm>);
        let statedb_bridge =
            new_state_db_bridge(Rc::clone(&memory), Rc::clone(&db) as Rc<dyn StateDB>);
        let proxy = ProxyEvm::new(memory, evm_bridge, statedb_bridge);

        assert_eq!(proxy.block_hash(1), evm.block_hash(1));
        assert_eq!(proxy.block_timestamp(), evm.block_timestamp());
        assert_eq!(proxy.block_number(), evm.block_number());
        assert_eq!(proxy.block_difficulty(), evm.block_difficulty());
        assert_eq!(proxy.block_gas_limit(), evm.block_gas_limit());
        assert_eq!(proxy.block_coinbase(), evm.block_coinbase());

        // The proxy's store reaches the same state.
        proxy.state_db().set_persistent_state([1u8; 20], [1u8; 32], [7u8; 32]);
        assert_eq!(db.get_persistent_state([1u8; 20], [1u8; 32]), [7u8; 32]);
    }

    #[test]
    fn test_cached_proxy_defers_writes() {
        let db = Rc::new(MockStateDB::new());
        let memory = new_shared_memory();
        let bridge = new_state_db_bridge(Rc::clone(&memory), Rc::clone(&db) as Rc<dyn StateDB>);
        let cached = CachedProxyStateDb::new(memory, bridge);

        let addr = [1u8; 20];
        cached.set_persistent_state(addr, [1u8; 32], [1u8; 32]);
        cached.set_ephemeral_state(addr, [2u8; 32], [2u8; 32]);

        // Reads through the cache see the pending writes, the host does not.
        assert_eq!(cached.get_persistent_state(addr, [1u8; 32]), [1u8; 32]);
        assert_eq!(db.get_persistent_state(addr, [1u8; 32]), [0u8; 32]);

        cached.commit();
        assert_eq!(db.get_persistent_state(addr, [1u8; 32]), [1u8; 32]);
        assert_eq!(db.get_ephemeral_state(addr, [2u8; 32]), [2u8; 32]);

        // A second commit has nothing left to flush.
        db.set_persistent_state(addr, [1u8; 32], [9u8; 32]);
        cached.commit();
        assert_eq!(db.get_persistent_state(addr, [1u8; 32]), [9u8; 32]);
    }

    #[test]
    fn test_cached_proxy_coalesces_reads() {
        let db = Rc::new(MockStateDB::new());
        let addr = [1u8; 20];
        db.set_persistent_state(addr, [1u8; 32], [5u8; 32]);

        let memory = new_shared_memory();
        let bridge = new_state_db_bridge(Rc::clone(&memory), Rc::clone(&db) as Rc<dyn StateDB>);
        let cached = CachedProxyStateDb::new(memory, bridge);

        assert_eq!(cached.get_persistent_state(addr, [1u8; 32]), [5u8; 32]);
        // The host-side value changes; the cache keeps serving the first read.
        db.set_persistent_state(addr, [1u8; 32], [6u8; 32]);
        assert_eq!(cached.get_persistent_state(addr, [1u8; 32]), [5u8; 32]);
    }
}
