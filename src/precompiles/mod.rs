// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The precompile contract, the process-wide registry, and the dispatcher
//! that enforces gas pricing, read-only mode, and the storage-mutation
//! declaration.
//!
//! A precompile is invoked through three entry points:
//!
//! 1. `run` handles the user-facing call and may mutate state, subject to
//!    its own `mutates_storage` declaration and the caller's read-only
//!    flag.
//! 2. `finalise` runs at transaction end on a commit-safe API.
//! 3. `commit` runs at block commit on a commit-safe API.
//!
//! Pure precompiles never observe the state database: their
//! `mutates_storage` is permanently false and `finalise`/`commit` are
//! no-ops.

pub mod builtins;

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::{Arc, OnceLock, RwLock};

use thiserror::Error;

use crate::api::{Api, Evm};
use crate::Address;

/// Result type for precompile operations.
pub type PrecompileResult<T> = Result<T, PrecompileError>;

/// Recoverable failures of a precompile invocation. Programming errors
/// (mutation through a restricted wrapper, a lying `mutates_storage`)
/// are panics, not variants.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PrecompileError {
    /// Supplied gas does not cover `required_gas`.
    #[error("out of gas")]
    OutOfGas,

    /// Mutation attempted in a read-only context.
    #[error("write protection")]
    WriteProtection,

    /// The precompile invoked a host capability that is not available.
    #[error("feature disabled: {0}")]
    FeatureDisabled(String),

    /// Failure reported by the precompile itself.
    #[error("{0}")]
    Runtime(String),

    /// WASM trap or instantiation failure.
    #[error("wasm engine failure: {0}")]
    Engine(String),
}

/// The contract every precompile satisfies.
///
/// Defaults mirror a stateless contract, so simple precompiles only
/// override what they use.
pub trait Precompile {
    /// True if the output is a function of the input alone.
    fn is_pure(&self) -> bool {
        false
    }

    /// Deterministic gas price of `run` for this input. Must depend only
    /// on the input.
    fn required_gas(&self, input: &[u8]) -> u64;

    /// Whether `run` will write persistent state for this input. The
    /// dispatcher hands out a read-only API when this returns false;
    /// misdeclaring is fatal.
    fn mutates_storage(&self, input: &[u8]) -> bool;

    fn run(&self, api: &Api, input: &[u8]) -> PrecompileResult<Vec<u8>>;

    fn finalise(&self, _api: &Api) -> PrecompileResult<()> {
        Ok(())
    }

    fn commit(&self, _api: &Api) -> PrecompileResult<()> {
        Ok(())
    }
}

/// No-op precompile, useful as a base for tests and as the simplest
/// possible contract implementation.
pub struct BlankPrecompile;

impl Precompile for BlankPrecompile {
    fn required_gas(&self, _input: &[u8]) -> u64 {
        0
    }

    fn mutates_storage(&self, _input: &[u8]) -> bool {
        false
    }

    fn run(&self, _api: &Api, _input: &[u8]) -> PrecompileResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

// Registry

/// Registration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("precompile already registered at 0x{}", hex::encode(.0))]
    AlreadyRegistered(Address),

    #[error("registry is sealed")]
    Sealed,
}

/// Shared handle to a registered precompile.
pub type PrecompileRef = Arc<dyn Precompile + Send + Sync>;

/// Append-only mapping from address to precompile, enumerable in
/// insertion order.
pub struct Registry {
    order: Vec<Address>,
    precompiles: HashMap<Address, PrecompileRef>,
    sealed: bool,
}

impl Registry {
    /// An empty registry, without the built-ins.
    pub fn empty() -> Self {
        Self {
            order: Vec::new(),
            precompiles: HashMap::new(),
            sealed: false,
        }
    }

    /// A registry pre-populated with the built-in precompiles.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        for (address, pc) in builtins::builtin_precompiles() {
            registry
                .add(address, pc)
                .expect("builtin addresses are distinct");
        }
        registry
    }

    pub fn add(&mut self, address: Address, pc: PrecompileRef) -> Result<(), RegistryError> {
        if self.sealed {
            return Err(RegistryError::Sealed);
        }
        if self.precompiles.contains_key(&address) {
            return Err(RegistryError::AlreadyRegistered(address));
        }
        self.order.push(address);
        self.precompiles.insert(address, pc);
        Ok(())
    }

    pub fn get(&self, address: Address) -> Option<PrecompileRef> {
        self.precompiles.get(&address).cloned()
    }

    pub fn active(&self) -> Vec<Address> {
        self.order.clone()
    }

    /// Forbid further registration. Called once the host reports ready.
    pub fn seal(&mut self) {
        self.sealed = true;
    }
}

fn global_registry() -> &'static RwLock<Registry> {
    static REGISTRY: OnceLock<RwLock<Registry>> = OnceLock::new();
    REGISTRY.get_or_init(|| RwLock::new(Registry::with_builtins()))
}

/// Register a precompile in the process-wide registry. Expected at
/// startup only; rejected once the registry is sealed.
pub fn add_precompile(address: Address, pc: PrecompileRef) -> Result<(), RegistryError> {
    global_registry().write().unwrap().add(address, pc)
}

/// Look up a precompile by address.
pub fn get_precompile(address: Address) -> Option<PrecompileRef> {
    global_registry().read().unwrap().get(address)
}

/// Addresses of all registered precompiles, in insertion order with the
/// built-ins first.
pub fn active_precompiles() -> Vec<Address> {
    global_registry().read().unwrap().active()
}

/// Seal the process-wide registry after startup registration is done.
pub fn seal_registry() {
    global_registry().write().unwrap().seal();
    tracing::debug!(target: "concrete", "precompile registry sealed");
}

// Dispatcher

/// Run a precompile against an EVM context.
///
/// Charges `required_gas` up front, enforces the read-only flag against
/// the precompile's `mutates_storage` declaration, and hands the
/// precompile a read-only API whenever it declares itself non-mutating,
/// so a false declaration panics on the first write.
///
/// Returns the output and the gas left after the charge.
pub fn run_precompile(
    evm: Rc<dyn Evm>,
    address: Address,
    pc: &dyn Precompile,
    input: &[u8],
    supplied_gas: u64,
    read_only: bool,
) -> PrecompileResult<(Vec<u8>, u64)> {
    let required = pc.required_gas(input);
    if supplied_gas < required {
        return Err(PrecompileError::OutOfGas);
    }
    let gas_left = supplied_gas - required;

    let mutates = pc.mutates_storage(input);
    if read_only && mutates {
        return Err(PrecompileError::WriteProtection);
    }

    let api = if mutates {
        Api::new(evm, address)
    } else {
        Api::new_read_only(evm, address)
    };

    let output = pc.run(&api, input)?;
    Ok((output, gas_left))
}

/// Transaction-end hook. The precompile sees a commit-safe API: block
/// context and ephemeral writes are available, persistent writes are not.
pub fn finalise_precompile(
    evm: Rc<dyn Evm>,
    address: Address,
    pc: &dyn Precompile,
) -> PrecompileResult<()> {
    if pc.is_pure() {
        return Ok(());
    }
    pc.finalise(&Api::new_commit_safe(evm, address))
}

/// Block-commit hook, with the same capability envelope as
/// [`finalise_precompile`].
pub fn commit_precompile(
    evm: Rc<dyn Evm>,
    address: Address,
    pc: &dyn Precompile,
) -> PrecompileResult<()> {
    if pc.is_pure() {
        return Ok(());
    }
    pc.commit(&Api::new_commit_safe(evm, address))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockEvm, MockStateDB};
    use crate::utils::bytes_to_address;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    struct TestPrecompile {
        required_gas: u64,
        mutates_storage: bool,
    }

    impl Precompile for TestPrecompile {
        fn required_gas(&self, _input: &[u8]) -> u64 {
            self.required_gas
        }

        fn mutates_storage(&self, _input: &[u8]) -> bool {
            self.mutates_storage
        }

        fn run(&self, api: &Api, _input: &[u8]) -> PrecompileResult<Vec<u8>> {
            api.state_db()
                .set_persistent_state(api.address(), [1u8; 32], [1u8; 32]);
            Ok(Vec::new())
        }
    }

    fn new_evm() -> Rc<dyn Evm> {
        Rc::new(MockEvm::new(Rc::new(MockStateDB::new())))
    }

    #[test]
    fn test_dispatcher_gas_accounting() {
        let pc = TestPrecompile {
            required_gas: 10,
            mutates_storage: true,
        };
        let address = [1u8; 20];

        // Insufficient gas fails without calling the precompile.
        let err = run_precompile(new_evm(), address, &pc, &[0], 5, false).unwrap_err();
        assert_eq!(err, PrecompileError::OutOfGas);

        // Exact gas leaves zero.
        let (_, gas_left) = run_precompile(new_evm(), address, &pc, &[0], 10, false).unwrap();
        assert_eq!(gas_left, 0);

        // Surplus gas is returned.
        let (_, gas_left) = run_precompile(new_evm(), address, &pc, &[0], 25, false).unwrap();
        assert_eq!(gas_left, 15);
    }

    #[test]
    fn test_dispatcher_read_only_violation() {
        let pc = TestPrecompile {
            required_gas: 10,
            mutates_storage: true,
        };
        let err = run_precompile(new_evm(), [1u8; 20], &pc, &[0], 10, true).unwrap_err();
        assert_eq!(err, PrecompileError::WriteProtection);
    }

    #[test]
    fn test_dispatcher_consistency_violation_is_fatal() {
        // mutates_storage lies: run writes persistent state anyway.
        let pc = TestPrecompile {
            required_gas: 10,
            mutates_storage: false,
        };
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let _ = run_precompile(new_evm(), [1u8; 20], &pc, &[0], 10, false);
        }));
        assert!(outcome.is_err(), "expected panic");
    }

    #[test]
    fn test_dispatcher_propagates_runtime_errors() {
        struct FailingPrecompile;
        impl Precompile for FailingPrecompile {
            fn required_gas(&self, _input: &[u8]) -> u64 {
                1
            }
            fn mutates_storage(&self, _input: &[u8]) -> bool {
                false
            }
            fn run(&self, _api: &Api, _input: &[u8]) -> PrecompileResult<Vec<u8>> {
                Err(PrecompileError::Runtime("bad input".into()))
            }
        }
        let err = run_precompile(new_evm(), [1u8; 20], &FailingPrecompile, &[], 1, false)
            .unwrap_err();
        assert_eq!(err, PrecompileError::Runtime("bad input".into()));
    }

    #[test]
    fn test_lifecycle_hooks_use_commit_safe_api() {
        struct LifecyclePrecompile;
        impl Precompile for LifecyclePrecompile {
            fn required_gas(&self, _input: &[u8]) -> u64 {
                0
            }
            fn mutates_storage(&self, _input: &[u8]) -> bool {
                false
            }
            fn run(&self, _api: &Api, _input: &[u8]) -> PrecompileResult<Vec<u8>> {
                Ok(Vec::new())
            }
            fn finalise(&self, api: &Api) -> PrecompileResult<()> {
                // Ephemeral bookkeeping and block context are allowed.
                api.ephemeral().set([1u8; 32], [1u8; 32]);
                api.block();
                Ok(())
            }
            fn commit(&self, api: &Api) -> PrecompileResult<()> {
                assert!(
                    catch_unwind(AssertUnwindSafe(|| {
                        api.persistent().set([1u8; 32], [1u8; 32])
                    }))
                    .is_err(),
                    "persistent write should panic during commit"
                );
                Ok(())
            }
        }
        let evm = new_evm();
        finalise_precompile(Rc::clone(&evm), [1u8; 20], &LifecyclePrecompile).unwrap();
        commit_precompile(evm, [1u8; 20], &LifecyclePrecompile).unwrap();
    }

    #[test]
    fn test_registry_struct() {
        let mut registry = Registry::empty();
        let addr = bytes_to_address(&[1]);
        registry.add(addr, Arc::new(BlankPrecompile)).unwrap();
        assert!(registry.get(addr).is_some());
        assert_eq!(
            registry.add(addr, Arc::new(BlankPrecompile)).unwrap_err(),
            RegistryError::AlreadyRegistered(addr)
        );

        registry.seal();
        assert_eq!(
            registry
                .add(bytes_to_address(&[2]), Arc::new(BlankPrecompile))
                .unwrap_err(),
            RegistryError::Sealed
        );
    }

    #[test]
    fn test_global_registry() {
        // The built-ins are always present and enumerate first.
        let initial = active_precompiles();
        assert!(initial.len() >= builtins::BUILTIN_COUNT);
        for (i, (address, _)) in builtins::builtin_precompiles().into_iter().enumerate() {
            assert_eq!(initial[i], address);
            assert!(get_precompile(address).is_some());
        }

        // Additions preserve insertion order.
        let base = 0xe0u8;
        for i in 0..4u8 {
            let addr = bytes_to_address(&[0xff, base + i]);
            add_precompile(addr, Arc::new(BlankPrecompile)).unwrap();
            assert!(get_precompile(addr).is_some());
        }
        let addr = bytes_to_address(&[0xff, base]);
        assert!(add_precompile(addr, Arc::new(BlankPrecompile)).is_err());

        let active = active_precompiles();
        let positions: Vec<usize> = (0..4u8)
            .map(|i| {
                let addr = bytes_to_address(&[0xff, base + i]);
                active.iter().position(|a| *a == addr).expect("registered")
            })
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }
}
