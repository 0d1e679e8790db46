// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! WASM runtime adapter.
//!
//! Wraps a compiled guest module as a [`Precompile`]. The engine is
//! configured deterministically (NaN canonicalisation on, memory capped
//! at 128 pages) and the module is instantiated once; invocations are
//! serialized through a mutex, and the guest allocator is pruned on every
//! exit so no allocation outlives its invocation.
//!
//! The six `env` host imports route back into the host-side service
//! handlers. While a call is in flight the current [`Api`] is installed
//! in the store; host functions invoked with no API installed (for
//! example from `concrete_RequiredGas`) trap with a feature-disabled
//! error.
//!
//! Guest traps and instantiation failures surface as recoverable
//! [`PrecompileError::Engine`] values and are logged; the exceptions are
//! `required_gas` and `mutates_storage`, whose contract has no error
//! channel, so an engine failure there is fatal.

use std::sync::{Arc, Mutex};

use wasmtime::{
    AsContextMut, Caller, Config, Engine, Extern, Linker, Module, Store, StoreLimits,
    StoreLimitsBuilder, TypedFunc,
};

use crate::api::Api;
use crate::bridge::host;
use crate::bridge::{
    get_args, get_return_with_error, put_value, Allocator, BridgeError, BridgeResult, MemPointer,
    Memory, OpCode,
};
use crate::precompiles::{Precompile, PrecompileError, PrecompileRef, PrecompileResult};

// Guest exports
pub const WASM_IS_PURE: &str = "concrete_IsPure";
pub const WASM_MUTATES_STORAGE: &str = "concrete_MutatesStorage";
pub const WASM_REQUIRED_GAS: &str = "concrete_RequiredGas";
pub const WASM_FINALISE: &str = "concrete_Finalise";
pub const WASM_COMMIT: &str = "concrete_Commit";
pub const WASM_RUN: &str = "concrete_Run";
pub const WASM_MALLOC: &str = "concrete_Malloc";
pub const WASM_FREE: &str = "concrete_Free";
pub const WASM_PRUNE: &str = "concrete_Prune";
pub const WASM_MEMORY: &str = "memory";

// Host imports, module "env"
pub const WASM_EVM_CALLER: &str = "concrete_EvmCaller";
pub const WASM_STATEDB_CALLER: &str = "concrete_StateDBCaller";
pub const WASM_ADDRESS_CALLER: &str = "concrete_AddressCaller";
pub const WASM_LOG_CALLER: &str = "concrete_LogCaller";
pub const WASM_KECCAK256_CALLER: &str = "concrete_Keccak256Caller";
pub const WASM_TIME_CALLER: &str = "concrete_TimeCaller";

/// Memory cap: 128 pages of 64 KiB, 8 MiB.
const MEMORY_PAGE_LIMIT: usize = 128;
const WASM_PAGE_SIZE: usize = 64 * 1024;

/// Raw pointer to the API of the in-flight invocation.
///
/// Installed and cleared under the instance mutex; host functions only
/// dereference it while the guest call that received it is executing, so
/// the pointee is always alive. The Send bound is only needed because the
/// store it sits in may be locked from different threads across separate
/// invocations.
struct ApiHandle(*const Api);

unsafe impl Send for ApiHandle {}

struct GuestEnv {
    api: Option<ApiHandle>,
    limits: StoreLimits,
}

/// Bridge memory over a live store context, allocating through the
/// guest's own exported allocator.
struct EngineMemory<'a, C: AsContextMut> {
    ctx: &'a mut C,
    memory: wasmtime::Memory,
    malloc: TypedFunc<u32, u32>,
    free: TypedFunc<u32, ()>,
}

impl<'a, C: AsContextMut> Memory for EngineMemory<'a, C> {
    fn read(&mut self, offset: u32, size: u32) -> BridgeResult<Vec<u8>> {
        let data = self.memory.data(&mut *self.ctx);
        let end = offset as usize + size as usize;
        if end > data.len() {
            return Err(BridgeError::OutOfBounds { offset, size });
        }
        Ok(data[offset as usize..end].to_vec())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> BridgeResult<()> {
        let data = self.memory.data_mut(&mut *self.ctx);
        let end = offset as usize + bytes.len();
        if end > data.len() {
            return Err(BridgeError::OutOfBounds {
                offset,
                size: bytes.len() as u32,
            });
        }
        data[offset as usize..end].copy_from_slice(bytes);
        Ok(())
    }
}

impl<'a, C: AsContextMut> Allocator for EngineMemory<'a, C> {
    fn malloc(&mut self, size: u32) -> BridgeResult<u32> {
        self.malloc
            .call(&mut *self.ctx, size)
            .map_err(|err| BridgeError::Allocator(err.to_string()))
    }

    fn free(&mut self, offset: u32) -> BridgeResult<()> {
        self.free
            .call(&mut *self.ctx, offset)
            .map_err(|err| BridgeError::Allocator(err.to_string()))
    }

    fn prune(&mut self) -> BridgeResult<()> {
        // Pruning goes through the instance, not through call-scoped
        // memory handles.
        Ok(())
    }
}

fn caller_memory<'a, 'b>(
    caller: &'a mut Caller<'b, GuestEnv>,
) -> wasmtime::Result<EngineMemory<'a, Caller<'b, GuestEnv>>> {
    let memory = match caller.get_export(WASM_MEMORY) {
        Some(Extern::Memory(memory)) => memory,
        _ => return Err(wasmtime::Error::msg("guest memory export missing")),
    };
    let malloc = caller
        .get_export(WASM_MALLOC)
        .and_then(Extern::into_func)
        .ok_or_else(|| wasmtime::Error::msg("guest allocator export missing"))?
        .typed::<u32, u32>(&*caller)?;
    let free = caller
        .get_export(WASM_FREE)
        .and_then(Extern::into_func)
        .ok_or_else(|| wasmtime::Error::msg("guest allocator export missing"))?
        .typed::<u32, ()>(&*caller)?;
    Ok(EngineMemory {
        ctx: caller,
        memory,
        malloc,
        free,
    })
}

fn current_api(caller: &Caller<'_, GuestEnv>, what: &str) -> wasmtime::Result<*const Api> {
    caller
        .data()
        .api
        .as_ref()
        .map(|handle| handle.0)
        .ok_or_else(|| wasmtime::Error::msg(format!("feature disabled: {what}")))
}

fn split_opcode(args: &[Vec<u8>]) -> wasmtime::Result<(OpCode, &[Vec<u8>])> {
    let first = args
        .first()
        .ok_or_else(|| wasmtime::Error::msg("missing opcode"))?;
    let op = OpCode::decode(first).ok_or_else(|| wasmtime::Error::msg("unknown opcode"))?;
    Ok((op, &args[1..]))
}

fn install_host_functions(linker: &mut Linker<GuestEnv>) -> wasmtime::Result<()> {
    linker.func_wrap(
        "env",
        WASM_STATEDB_CALLER,
        |mut caller: Caller<'_, GuestEnv>, pointer: u64| -> wasmtime::Result<u64> {
            let api_ptr = current_api(&caller, "state database")?;
            let mut mem = caller_memory(&mut caller)?;
            let args = get_args(&mut mem, MemPointer::from_u64(pointer))?;
            let (op, rest) = split_opcode(&args)?;
            // Safety: installed under the instance mutex for the duration
            // of the guest call dispatching to us.
            let api = unsafe { &*api_ptr };
            let out = host::call_state_db(api.state_db().as_ref(), op, rest);
            Ok(put_value(&mut mem, &out)?.as_u64())
        },
    )?;

    linker.func_wrap(
        "env",
        WASM_EVM_CALLER,
        |mut caller: Caller<'_, GuestEnv>, pointer: u64| -> wasmtime::Result<u64> {
            let api_ptr = current_api(&caller, "evm context")?;
            let mut mem = caller_memory(&mut caller)?;
            let args = get_args(&mut mem, MemPointer::from_u64(pointer))?;
            let (op, rest) = split_opcode(&args)?;
            let api = unsafe { &*api_ptr };
            let evm = api
                .evm()
                .ok_or_else(|| wasmtime::Error::msg("feature disabled: evm context"))?;
            let out = host::call_evm(evm.as_ref(), op, rest);
            Ok(put_value(&mut mem, &out)?.as_u64())
        },
    )?;

    linker.func_wrap(
        "env",
        WASM_ADDRESS_CALLER,
        |mut caller: Caller<'_, GuestEnv>, _pointer: u64| -> wasmtime::Result<u64> {
            let api_ptr = current_api(&caller, "address")?;
            let mut mem = caller_memory(&mut caller)?;
            let address = unsafe { &*api_ptr }.address();
            Ok(put_value(&mut mem, &address)?.as_u64())
        },
    )?;

    linker.func_wrap(
        "env",
        WASM_LOG_CALLER,
        |mut caller: Caller<'_, GuestEnv>, pointer: u64| -> wasmtime::Result<u64> {
            let mut mem = caller_memory(&mut caller)?;
            let args = get_args(&mut mem, MemPointer::from_u64(pointer))?;
            host::log_service(&args);
            Ok(MemPointer::NULL.as_u64())
        },
    )?;

    linker.func_wrap(
        "env",
        WASM_KECCAK256_CALLER,
        |mut caller: Caller<'_, GuestEnv>, pointer: u64| -> wasmtime::Result<u64> {
            let mut mem = caller_memory(&mut caller)?;
            let args = get_args(&mut mem, MemPointer::from_u64(pointer))?;
            let out = host::keccak256_service(&args);
            Ok(put_value(&mut mem, &out)?.as_u64())
        },
    )?;

    linker.func_wrap(
        "env",
        WASM_TIME_CALLER,
        |mut caller: Caller<'_, GuestEnv>, _pointer: u64| -> wasmtime::Result<u64> {
            let mut mem = caller_memory(&mut caller)?;
            let out = host::time_service();
            Ok(put_value(&mut mem, &out)?.as_u64())
        },
    )?;

    Ok(())
}

struct WasmInstance {
    store: Store<GuestEnv>,
    memory: wasmtime::Memory,
    malloc: TypedFunc<u32, u32>,
    free: TypedFunc<u32, ()>,
    prune: TypedFunc<(), ()>,
    exp_is_pure: TypedFunc<(), u64>,
    exp_mutates_storage: TypedFunc<u64, u64>,
    exp_required_gas: TypedFunc<u64, u64>,
    exp_finalise: TypedFunc<(), u64>,
    exp_commit: TypedFunc<(), u64>,
    exp_run: TypedFunc<u64, u64>,
}

impl WasmInstance {
    fn new(code: &[u8]) -> wasmtime::Result<Self> {
        let mut config = Config::new();
        config.cranelift_nan_canonicalization(true);
        let engine = Engine::new(&config)?;
        let module = Module::new(&engine, code)?;

        let mut linker: Linker<GuestEnv> = Linker::new(&engine);
        install_host_functions(&mut linker)?;

        let limits = StoreLimitsBuilder::new()
            .memory_size(MEMORY_PAGE_LIMIT * WASM_PAGE_SIZE)
            .build();
        let mut store = Store::new(&engine, GuestEnv { api: None, limits });
        store.limiter(|env| &mut env.limits);

        let instance = linker.instantiate(&mut store, &module)?;
        let memory = instance
            .get_memory(&mut store, WASM_MEMORY)
            .ok_or_else(|| wasmtime::Error::msg("guest memory export missing"))?;

        Ok(Self {
            malloc: instance.get_typed_func::<u32, u32>(&mut store, WASM_MALLOC)?,
            free: instance.get_typed_func::<u32, ()>(&mut store, WASM_FREE)?,
            prune: instance.get_typed_func::<(), ()>(&mut store, WASM_PRUNE)?,
            exp_is_pure: instance.get_typed_func::<(), u64>(&mut store, WASM_IS_PURE)?,
            exp_mutates_storage: instance
                .get_typed_func::<u64, u64>(&mut store, WASM_MUTATES_STORAGE)?,
            exp_required_gas: instance
                .get_typed_func::<u64, u64>(&mut store, WASM_REQUIRED_GAS)?,
            exp_finalise: instance.get_typed_func::<(), u64>(&mut store, WASM_FINALISE)?,
            exp_commit: instance.get_typed_func::<(), u64>(&mut store, WASM_COMMIT)?,
            exp_run: instance.get_typed_func::<u64, u64>(&mut store, WASM_RUN)?,
            memory,
            store,
        })
    }

    fn engine_memory(&mut self) -> EngineMemory<'_, Store<GuestEnv>> {
        EngineMemory {
            ctx: &mut self.store,
            memory: self.memory,
            malloc: self.malloc.clone(),
            free: self.free.clone(),
        }
    }

    fn call_u64(&mut self, func: TypedFunc<(), u64>) -> wasmtime::Result<u64> {
        func.call(&mut self.store, ())
    }

    fn call_bytes_u64(&mut self, func: TypedFunc<u64, u64>, input: &[u8]) -> wasmtime::Result<u64> {
        let pointer = {
            let mut mem = self.engine_memory();
            put_value(&mut mem, input)?
        };
        let result = func.call(&mut self.store, pointer.as_u64());
        if !pointer.is_null() {
            let mut mem = self.engine_memory();
            let _ = mem.free(pointer.offset());
        }
        result
    }

    fn call_err(&mut self, func: TypedFunc<(), u64>) -> wasmtime::Result<Option<String>> {
        let raw = self.call_u64(func)?;
        let mut mem = self.engine_memory();
        let (_, err) = get_return_with_error(&mut mem, MemPointer::from_u64(raw))?;
        Ok(err)
    }

    fn call_bytes_bytes_err(
        &mut self,
        func: TypedFunc<u64, u64>,
        input: &[u8],
    ) -> wasmtime::Result<(Vec<u8>, Option<String>)> {
        let raw = self.call_bytes_u64(func, input)?;
        let mut mem = self.engine_memory();
        let (values, err) = get_return_with_error(&mut mem, MemPointer::from_u64(raw))?;
        let output = values.into_iter().next().unwrap_or_default();
        Ok((output, err))
    }
}

/// A sandboxed precompile backed by a WASM module instance.
pub struct WasmPrecompile {
    instance: Mutex<WasmInstance>,
    pure: bool,
}

impl WasmPrecompile {
    pub fn new(code: &[u8]) -> PrecompileResult<Self> {
        let mut instance = WasmInstance::new(code).map_err(engine_error)?;
        let pure = instance
            .call_u64(instance.exp_is_pure.clone())
            .map_err(engine_error)?
            != 0;
        Ok(Self {
            instance: Mutex::new(instance),
            pure,
        })
    }

    fn with_instance<R>(&self, api: Option<&Api>, f: impl FnOnce(&mut WasmInstance) -> R) -> R {
        let mut guard = self
            .instance
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.store.data_mut().api = api.map(|api| ApiHandle(api as *const Api));
        let result = f(&mut guard);
        guard.store.data_mut().api = None;
        let prune = guard.prune.clone();
        if let Err(err) = prune.call(&mut guard.store, ()) {
            tracing::warn!(target: "concrete::wasm", "guest prune failed: {err}");
        }
        result
    }
}

fn engine_error(err: wasmtime::Error) -> PrecompileError {
    tracing::warn!(target: "concrete::wasm", "wasm engine failure: {err}");
    PrecompileError::Engine(err.to_string())
}

impl Precompile for WasmPrecompile {
    fn is_pure(&self) -> bool {
        self.pure
    }

    fn required_gas(&self, input: &[u8]) -> u64 {
        // Gas pricing has no error channel; a trap here is fatal.
        self.with_instance(None, |inst| inst.call_bytes_u64(inst.exp_required_gas.clone(), input))
            .unwrap_or_else(|err| panic!("wasm precompile RequiredGas trapped: {err}"))
    }

    fn mutates_storage(&self, input: &[u8]) -> bool {
        self.with_instance(None, |inst| {
            inst.call_bytes_u64(inst.exp_mutates_storage.clone(), input)
        })
        .unwrap_or_else(|err| panic!("wasm precompile MutatesStorage trapped: {err}"))
            != 0
    }

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        let (output, err) = self
            .with_instance(Some(api), |inst| inst.call_bytes_bytes_err(inst.exp_run.clone(), input))
            .map_err(engine_error)?;
        match err {
            None => Ok(output),
            Some(message) => Err(PrecompileError::Runtime(message)),
        }
    }

    fn finalise(&self, api: &Api) -> PrecompileResult<()> {
        let err = self
            .with_instance(Some(api), |inst| inst.call_err(inst.exp_finalise.clone()))
            .map_err(engine_error)?;
        match err {
            None => Ok(()),
            Some(message) => Err(PrecompileError::Runtime(message)),
        }
    }

    fn commit(&self, api: &Api) -> PrecompileResult<()> {
        let err = self
            .with_instance(Some(api), |inst| inst.call_err(inst.exp_commit.clone()))
            .map_err(engine_error)?;
        match err {
            None => Ok(()),
            Some(message) => Err(PrecompileError::Runtime(message)),
        }
    }
}

/// Wrapper for modules that report themselves pure: storage mutation is
/// pinned to false and the lifecycle hooks are no-ops.
pub struct StatelessWasmPrecompile(WasmPrecompile);

impl Precompile for StatelessWasmPrecompile {
    fn is_pure(&self) -> bool {
        true
    }

    fn required_gas(&self, input: &[u8]) -> u64 {
        self.0.required_gas(input)
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        false
    }

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>> {
        self.0.run(api, input)
    }

    fn finalise(&self, _api: &Api) -> PrecompileResult<()> {
        Ok(())
    }

    fn commit(&self, _api: &Api) -> PrecompileResult<()> {
        Ok(())
    }
}

/// Wrap a compiled module as a precompile, probing its purity once.
pub fn new_wasm_precompile(code: &[u8]) -> PrecompileResult<PrecompileRef> {
    let pc = WasmPrecompile::new(code)?;
    if pc.pure {
        Ok(Arc::new(StatelessWasmPrecompile(pc)))
    } else {
        Ok(Arc::new(pc))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Evm, MockEvm, MockStateDB};
    use crate::precompiles::run_precompile;
    use std::rc::Rc;

    // A minimal pure guest: RequiredGas is 10, Run returns no output and
    // no error. The encoded success return ([], "") sits in a data
    // segment at offset 64.
    const PURE_GUEST: &str = r#"
        (module
          (memory (export "memory") 2)
          (global $next (mut i32) (i32.const 1024))
          (func (export "concrete_Malloc") (param $size i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next (i32.add (global.get $next) (local.get $size)))
            (local.get $ptr))
          (func (export "concrete_Free") (param i32))
          (func (export "concrete_Prune")
            (global.set $next (i32.const 1024)))
          (func (export "concrete_IsPure") (result i64) (i64.const 1))
          (func (export "concrete_MutatesStorage") (param i64) (result i64) (i64.const 0))
          (func (export "concrete_RequiredGas") (param i64) (result i64) (i64.const 10))
          (func (export "concrete_Finalise") (result i64) (i64.const 0))
          (func (export "concrete_Commit") (result i64) (i64.const 0))
          (func (export "concrete_Run") (param i64) (result i64)
            (i64.const 0x400000000c))
          (data (i32.const 64) "\00\00\00\02\00\00\00\00\00\00\00\00"))
    "#;

    // A pure guest that hashes "abc" through the keccak host function and
    // returns the hash. Pre-encoded args for the call sit at offset 128;
    // the return buffer is assembled at offset 512.
    const KECCAK_GUEST: &str = r#"
        (module
          (import "env" "concrete_Keccak256Caller" (func $keccak (param i64) (result i64)))
          (memory (export "memory") 2)
          (global $next (mut i32) (i32.const 1024))
          (func (export "concrete_Malloc") (param $size i32) (result i32)
            (local $ptr i32)
            (local.set $ptr (global.get $next))
            (global.set $next (i32.add (global.get $next) (local.get $size)))
            (local.get $ptr))
          (func (export "concrete_Free") (param i32))
          (func (export "concrete_Prune")
            (global.set $next (i32.const 1024)))
          (func (export "concrete_IsPure") (result i64) (i64.const 1))
          (func (export "concrete_MutatesStorage") (param i64) (result i64) (i64.const 0))
          (func (export "concrete_RequiredGas") (param i64) (result i64) (i64.const 1))
          (func (export "concrete_Finalise") (result i64) (i64.const 0))
          (func (export "concrete_Commit") (result i64) (i64.const 0))
          (func (export "concrete_Run") (param i64) (result i64)
            (local $ret i64)
            (local $off i32)
            ;; keccak(["abc"]), args pre-encoded at 128, 11 bytes
            (local.set $ret (call $keccak (i64.const 0x800000000b)))
            (local.set $off (i32.wrap_i64 (i64.shr_u (local.get $ret) (i64.const 32))))
            ;; copy the 32-byte hash behind its length prefix into the
            ;; return list at 512
            (memory.copy (i32.const 520) (i32.add (local.get $off) (i32.const 4)) (i32.const 32))
            (i64.const 0x2000000002c))
          (data (i32.const 128) "\00\00\00\01\00\00\00\03abc")
          (data (i32.const 512) "\00\00\00\02\00\00\00\20"))
    "#;

    // A guest whose Run traps.
    const TRAPPING_GUEST: &str = r#"
        (module
          (memory (export "memory") 2)
          (func (export "concrete_Malloc") (param i32) (result i32) (i32.const 1024))
          (func (export "concrete_Free") (param i32))
          (func (export "concrete_Prune"))
          (func (export "concrete_IsPure") (result i64) (i64.const 1))
          (func (export "concrete_MutatesStorage") (param i64) (result i64) (i64.const 0))
          (func (export "concrete_RequiredGas") (param i64) (result i64) (i64.const 1))
          (func (export "concrete_Finalise") (result i64) (i64.const 0))
          (func (export "concrete_Commit") (result i64) (i64.const 0))
          (func (export "concrete_Run") (param i64) (result i64)
            (unreachable)))
    "#;

    fn new_evm() -> Rc<dyn Evm> {
        Rc::new(MockEvm::new(Rc::new(MockStateDB::new())))
    }

    #[test]
    fn test_pure_guest_through_dispatcher() {
        let code = wat::parse_str(PURE_GUEST).unwrap();
        let pc = new_wasm_precompile(&code).unwrap();
        assert!(pc.is_pure());
        assert!(!pc.mutates_storage(b"anything"));
        assert_eq!(pc.required_gas(b"anything"), 10);

        let address = [0x81u8; 20];
        let err = run_precompile(new_evm(), address, pc.as_ref(), b"in", 5, false).unwrap_err();
        assert_eq!(err, PrecompileError::OutOfGas);

        let (output, gas_left) =
            run_precompile(new_evm(), address, pc.as_ref(), b"in", 25, false).unwrap();
        assert!(output.is_empty());
        assert_eq!(gas_left, 15);

        // Pure precompiles run fine in read-only frames, repeatedly.
        for _ in 0..3 {
            let (_, gas_left) =
                run_precompile(new_evm(), address, pc.as_ref(), b"in", 10, true).unwrap();
            assert_eq!(gas_left, 0);
        }
    }

    #[test]
    fn test_guest_reaches_keccak_host_function() {
        let code = wat::parse_str(KECCAK_GUEST).unwrap();
        let pc = new_wasm_precompile(&code).unwrap();
        let (output, _) =
            run_precompile(new_evm(), [0x82u8; 20], pc.as_ref(), b"", 1, false).unwrap();
        assert_eq!(
            hex::encode(output),
            "4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn test_trap_surfaces_as_engine_error() {
        let code = wat::parse_str(TRAPPING_GUEST).unwrap();
        let pc = new_wasm_precompile(&code).unwrap();
        let err = run_precompile(new_evm(), [0x83u8; 20], pc.as_ref(), b"", 1, false).unwrap_err();
        assert!(matches!(err, PrecompileError::Engine(_)));
    }

    #[test]
    fn test_invalid_module_fails_instantiation() {
        assert!(matches!(
            new_wasm_precompile(b"not wasm"),
            Err(PrecompileError::Engine(_))
        ));
    }

    #[test]
    fn test_missing_export_fails_instantiation() {
        let code = wat::parse_str(r#"(module (memory (export "memory") 1))"#).unwrap();
        assert!(matches!(
            new_wasm_precompile(&code),
            Err(PrecompileError::Engine(_))
        ));
    }
}
