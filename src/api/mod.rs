// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! The virtualized state interface a precompile programs against: the
//! slot store and its access wrappers, per-address storage views, typed
//! datastores, and the API facade.

pub mod api;
pub mod datastore;
pub mod mock;
pub mod statedb;
pub mod storage;

pub use api::{Api, BlockData, CommitSafeEvm, Evm, ReadOnlyEvm};
pub use datastore::{Array, Counter, Datastore, Mapping, Reference, Set};
pub use mock::{MockEvm, MockStateDB};
pub use statedb::{CommitSafeStateDb, ReadOnlyStateDb, StateDB};
pub use storage::{EphemeralStorage, PersistentStorage, Storage};
