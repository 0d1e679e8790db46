// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Programmable precompiled contracts for an Ethereum-compatible
//! execution layer.
//!
//! A precompile written against this crate runs in two environments with
//! identical semantics: linked into the host process as a native
//! [`precompiles::Precompile`], or compiled to WASM and executed in a
//! sandbox, where the [`bridge`] makes the host's state interface
//! reachable through the guest's linear memory and the [`wasm`] adapter
//! enforces the same gas, purity, and storage-mutation rules.

pub mod api;
pub mod bridge;
pub mod crypto;
pub mod guest;
pub mod precompiles;
pub mod utils;

#[cfg(not(target_arch = "wasm32"))]
pub mod wasm;

/// 20-byte account identifier.
pub type Address = [u8; 20];

/// 32-byte value used both as storage key and storage value.
pub type Hash = [u8; 32];

pub const ZERO_ADDRESS: Address = [0u8; 20];
pub const ZERO_HASH: Hash = [0u8; 32];

// Re-export the types most integrations touch.
pub use api::{Api, Datastore, Evm, StateDB};
pub use precompiles::{
    add_precompile, get_precompile, run_precompile, Precompile, PrecompileError, PrecompileResult,
};
