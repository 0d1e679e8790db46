// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Guest-side runtime for precompiles compiled to `wasm32-unknown-unknown`.
//!
//! A guest crate implements [`Precompile`], registers it with
//! [`wasm_wrap`] (typically from a `#[no_mangle]` init or a lazy static),
//! and this module provides the `concrete_*` exports the host resolves:
//! the allocator the host writes arguments through, and the entry points
//! that rebuild a full [`Api`] out of proxy objects backed by the six
//! host imports.
//!
//! Everything allocated for a call is tracked in an allocation table and
//! reclaimed when the host invokes `concrete_Prune` on exit.

use crate::precompiles::Precompile;

/// Guest-side configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WasmConfig {
    /// Declare the precompile pure. Pure guests get no API access.
    pub is_pure: bool,
    /// Route state access through a write-back slot cache. Ignored for
    /// pure precompiles, which must not cache.
    pub cache_proxies: bool,
}

pub const DEFAULT_CONFIG: WasmConfig = WasmConfig {
    is_pure: false,
    cache_proxies: false,
};

impl WasmConfig {
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    fn cache_proxies_enabled(&self) -> bool {
        self.cache_proxies && !self.is_pure
    }
}

#[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
struct RegisteredPrecompile {
    precompile: Box<dyn Precompile + Send + Sync>,
    config: WasmConfig,
}

static PRECOMPILE: std::sync::OnceLock<RegisteredPrecompile> = std::sync::OnceLock::new();

/// Register the guest's precompile with the default configuration.
pub fn wasm_wrap(precompile: Box<dyn Precompile + Send + Sync>) {
    wasm_wrap_with_config(precompile, DEFAULT_CONFIG);
}

/// Register the guest's precompile. May be called once per module.
pub fn wasm_wrap_with_config(precompile: Box<dyn Precompile + Send + Sync>, config: WasmConfig) {
    let registered = RegisteredPrecompile { precompile, config };
    if PRECOMPILE.set(registered).is_err() {
        panic!("guest precompile already registered");
    }
}

#[cfg(target_arch = "wasm32")]
pub use abi::{host_keccak256, host_log, host_time};

#[cfg(target_arch = "wasm32")]
mod abi {
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;
    use std::sync::{Mutex, OnceLock};

    use super::{RegisteredPrecompile, PRECOMPILE};
    use crate::api::{Api, CommitSafeStateDb, StateDB};
    use crate::bridge::guest::{
        BridgeFn, CachedProxyStateDb, ProxyEvm, ProxyStateDb, SharedMemory,
    };
    use crate::bridge::{
        get_value, put_args, put_return_with_error, Allocator, BridgeResult, MemPointer, Memory,
    };
    use crate::utils::{bytes_to_address, bytes_to_hash, bytes_to_u64};
    use crate::{Address, Hash};

    #[link(wasm_import_module = "env")]
    extern "C" {
        fn concrete_EvmCaller(pointer: u64) -> u64;
        fn concrete_StateDBCaller(pointer: u64) -> u64;
        fn concrete_AddressCaller(pointer: u64) -> u64;
        fn concrete_LogCaller(pointer: u64) -> u64;
        fn concrete_Keccak256Caller(pointer: u64) -> u64;
        fn concrete_TimeCaller(pointer: u64) -> u64;
    }

    fn utility_call(caller: unsafe extern "C" fn(u64) -> u64, args: &[Vec<u8>]) -> Vec<u8> {
        let pointer = put_args(&mut GuestMemory, args)
            .unwrap_or_else(|err| panic!("utility argument encoding failed: {err}"));
        let raw = unsafe { caller(pointer.as_u64()) };
        get_value(&mut GuestMemory, MemPointer::from_u64(raw))
            .unwrap_or_else(|err| panic!("utility return decoding failed: {err}"))
    }

    /// Keccak-256 through the host. Available to pure guests.
    pub fn host_keccak256(data: &[u8]) -> Hash {
        bytes_to_hash(&utility_call(concrete_Keccak256Caller, &[data.to_vec()]))
    }

    /// Host wall-clock time in Unix nanoseconds.
    pub fn host_time() -> u64 {
        bytes_to_u64(&utility_call(concrete_TimeCaller, &[]))
    }

    /// Emit a log line on the host.
    pub fn host_log(message: &str) {
        utility_call(concrete_LogCaller, &[message.as_bytes().to_vec()]);
    }

    // Allocation table: keeps every buffer handed to the host alive until
    // it is freed or the host prunes the invocation.
    static ALLOCATIONS: Mutex<BTreeMap<u32, Box<[u8]>>> = Mutex::new(BTreeMap::new());

    #[no_mangle]
    pub extern "C" fn concrete_Malloc(size: usize) -> *mut u8 {
        if size == 0 {
            return std::ptr::null_mut();
        }
        let mut buf = vec![0u8; size].into_boxed_slice();
        let addr = buf.as_mut_ptr();
        ALLOCATIONS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(addr as u32, buf);
        addr
    }

    #[no_mangle]
    pub extern "C" fn concrete_Free(pointer: *mut u8) {
        if pointer.is_null() {
            return;
        }
        let removed = ALLOCATIONS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&(pointer as u32));
        if removed.is_none() {
            panic!("free: invalid pointer");
        }
    }

    #[no_mangle]
    pub extern "C" fn concrete_Prune() {
        ALLOCATIONS
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    /// The guest's own linear memory: offsets are addresses.
    struct GuestMemory;

    impl Memory for GuestMemory {
        fn read(&mut self, offset: u32, size: u32) -> BridgeResult<Vec<u8>> {
            if size == 0 {
                return Ok(Vec::new());
            }
            let slice =
                unsafe { std::slice::from_raw_parts(offset as *const u8, size as usize) };
            Ok(slice.to_vec())
        }

        fn write(&mut self, offset: u32, data: &[u8]) -> BridgeResult<()> {
            unsafe {
                std::ptr::copy_nonoverlapping(data.as_ptr(), offset as *mut u8, data.len());
            }
            Ok(())
        }
    }

    impl Allocator for GuestMemory {
        fn malloc(&mut self, size: u32) -> BridgeResult<u32> {
            Ok(concrete_Malloc(size as usize) as u32)
        }

        fn free(&mut self, offset: u32) -> BridgeResult<()> {
            concrete_Free(offset as *mut u8);
            Ok(())
        }

        fn prune(&mut self) -> BridgeResult<()> {
            concrete_Prune();
            Ok(())
        }
    }

    fn shared_memory() -> SharedMemory {
        Rc::new(RefCell::new(GuestMemory))
    }

    fn statedb_bridge() -> BridgeFn {
        Rc::new(|pointer| unsafe { concrete_StateDBCaller(pointer) })
    }

    fn evm_bridge() -> BridgeFn {
        Rc::new(|pointer| unsafe { concrete_EvmCaller(pointer) })
    }

    fn registered() -> &'static RegisteredPrecompile {
        PRECOMPILE.get().expect("no guest precompile registered")
    }

    fn self_address() -> Address {
        static ADDRESS: OnceLock<Address> = OnceLock::new();
        *ADDRESS.get_or_init(|| {
            let raw = unsafe { concrete_AddressCaller(MemPointer::NULL.as_u64()) };
            let bytes = get_value(&mut GuestMemory, MemPointer::from_u64(raw))
                .unwrap_or_else(|err| panic!("address decoding failed: {err}"));
            bytes_to_address(&bytes)
        })
    }

    fn build_state_db(
        memory: &SharedMemory,
    ) -> (Rc<dyn StateDB>, Option<Rc<CachedProxyStateDb>>) {
        if registered().config.cache_proxies_enabled() {
            let cached = Rc::new(CachedProxyStateDb::new(
                Rc::clone(memory),
                statedb_bridge(),
            ));
            (Rc::clone(&cached) as Rc<dyn StateDB>, Some(cached))
        } else {
            let plain = Rc::new(ProxyStateDb::new(Rc::clone(memory), statedb_bridge()));
            (plain, None)
        }
    }

    /// Full API for `Run`.
    fn new_run_api() -> (Api, Option<Rc<CachedProxyStateDb>>) {
        let memory = shared_memory();
        let (statedb, cache) = build_state_db(&memory);
        let evm = Rc::new(ProxyEvm::new_with_state_db(memory, evm_bridge(), statedb));
        (Api::new(evm, self_address()), cache)
    }

    /// API for `Finalise`/`Commit`: same shape with a commit-safe store.
    fn new_lifecycle_api() -> (Api, Option<Rc<CachedProxyStateDb>>) {
        let memory = shared_memory();
        let (statedb, cache) = build_state_db(&memory);
        let guarded: Rc<dyn StateDB> = Rc::new(CommitSafeStateDb::new(statedb));
        let evm = Rc::new(ProxyEvm::new_with_state_db(memory, evm_bridge(), guarded));
        (Api::new(evm, self_address()), cache)
    }

    fn guest_value(pointer: u64) -> Vec<u8> {
        get_value(&mut GuestMemory, MemPointer::from_u64(pointer))
            .unwrap_or_else(|err| panic!("argument decoding failed: {err}"))
    }

    fn encode_result(values: &[Vec<u8>], err: Option<&str>) -> u64 {
        put_return_with_error(&mut GuestMemory, values, err)
            .unwrap_or_else(|err| panic!("return encoding failed: {err}"))
            .as_u64()
    }

    #[no_mangle]
    pub extern "C" fn concrete_IsPure() -> u64 {
        registered().config.is_pure as u64
    }

    #[no_mangle]
    pub extern "C" fn concrete_MutatesStorage(pointer: u64) -> u64 {
        let input = guest_value(pointer);
        registered().precompile.mutates_storage(&input) as u64
    }

    #[no_mangle]
    pub extern "C" fn concrete_RequiredGas(pointer: u64) -> u64 {
        let input = guest_value(pointer);
        registered().precompile.required_gas(&input)
    }

    #[no_mangle]
    pub extern "C" fn concrete_Run(pointer: u64) -> u64 {
        let input = guest_value(pointer);
        let (api, cache) = new_run_api();
        let result = registered().precompile.run(&api, &input);
        if let Some(cache) = &cache {
            cache.commit();
        }
        match result {
            Ok(output) => encode_result(&[output], None),
            Err(err) => encode_result(&[Vec::new()], Some(&err.to_string())),
        }
    }

    #[no_mangle]
    pub extern "C" fn concrete_Finalise() -> u64 {
        let (api, cache) = new_lifecycle_api();
        let result = registered().precompile.finalise(&api);
        if let Some(cache) = &cache {
            cache.commit();
        }
        match result {
            Ok(()) => MemPointer::NULL.as_u64(),
            Err(err) => encode_result(&[], Some(&err.to_string())),
        }
    }

    #[no_mangle]
    pub extern "C" fn concrete_Commit() -> u64 {
        let (api, cache) = new_lifecycle_api();
        let result = registered().precompile.commit(&api);
        if let Some(cache) = &cache {
            cache.commit();
        }
        match result {
            Ok(()) => MemPointer::NULL.as_u64(),
            Err(err) => encode_result(&[], Some(&err.to_string())),
        }
    }
}
