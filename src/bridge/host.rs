// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Host-side service handlers.
//!
//! Each opcode-dispatched call lands here: the handler picks the method
//! on the concrete [`StateDB`] or [`Evm`], decodes the raw arguments, and
//! encodes the single return value. The keccak, time, and log services
//! never touch the API, so pure precompiles can still use them.
//!
//! A malformed payload (unknown opcode, missing argument) means the guest
//! is corrupted; handlers panic rather than guess.

use std::rc::Rc;

use crate::api::{Evm, StateDB};
use crate::bridge::guest::{BridgeFn, SharedMemory};
use crate::bridge::{get_args, put_value, OpCode};
use crate::crypto::keccak256;
use crate::utils::{bytes_to_address, bytes_to_hash, bytes_to_u64, u64_to_bytes};
use crate::Address;

fn arg<'a>(args: &'a [Vec<u8>], index: usize) -> &'a [u8] {
    args.get(index)
        .unwrap_or_else(|| panic!("missing bridge argument {index}"))
}

/// Dispatch a state database opcode. Setters return empty bytes.
pub fn call_state_db(db: &dyn StateDB, op: OpCode, args: &[Vec<u8>]) -> Vec<u8> {
    match op {
        OpCode::SetPersistentState => {
            db.set_persistent_state(
                bytes_to_address(arg(args, 0)),
                bytes_to_hash(arg(args, 1)),
                bytes_to_hash(arg(args, 2)),
            );
            Vec::new()
        }
        OpCode::GetPersistentState => db
            .get_persistent_state(bytes_to_address(arg(args, 0)), bytes_to_hash(arg(args, 1)))
            .to_vec(),
        OpCode::SetEphemeralState => {
            db.set_ephemeral_state(
                bytes_to_address(arg(args, 0)),
                bytes_to_hash(arg(args, 1)),
                bytes_to_hash(arg(args, 2)),
            );
            Vec::new()
        }
        OpCode::GetEphemeralState => db
            .get_ephemeral_state(bytes_to_address(arg(args, 0)), bytes_to_hash(arg(args, 1)))
            .to_vec(),
        OpCode::AddPersistentPreimage => {
            db.add_persistent_preimage(bytes_to_hash(arg(args, 0)), arg(args, 1));
            Vec::new()
        }
        OpCode::GetPersistentPreimage => db.get_persistent_preimage(bytes_to_hash(arg(args, 0))),
        OpCode::GetPersistentPreimageSize => {
            u64_to_bytes(db.get_persistent_preimage_size(bytes_to_hash(arg(args, 0))) as u64)
                .to_vec()
        }
        OpCode::AddEphemeralPreimage => {
            db.add_ephemeral_preimage(bytes_to_hash(arg(args, 0)), arg(args, 1));
            Vec::new()
        }
        OpCode::GetEphemeralPreimage => db.get_ephemeral_preimage(bytes_to_hash(arg(args, 0))),
        OpCode::GetEphemeralPreimageSize => {
            u64_to_bytes(db.get_ephemeral_preimage_size(bytes_to_hash(arg(args, 0))) as u64)
                .to_vec()
        }
        _ => panic!("opcode {op:?} is not a state database service"),
    }
}

/// Dispatch an EVM context opcode. Big integers travel as minimal
/// big-endian bytes.
pub fn call_evm(evm: &dyn Evm, op: OpCode, args: &[Vec<u8>]) -> Vec<u8> {
    match op {
        OpCode::BlockHash => evm.block_hash(bytes_to_u64(arg(args, 0))).to_vec(),
        OpCode::BlockTimestamp => u64_to_bytes(evm.block_timestamp()).to_vec(),
        OpCode::BlockNumber => evm.block_number().to_bytes_be(),
        OpCode::BlockDifficulty => evm.block_difficulty().to_bytes_be(),
        OpCode::BlockGasLimit => u64_to_bytes(evm.block_gas_limit()).to_vec(),
        OpCode::BlockCoinbase => evm.block_coinbase().to_vec(),
        _ => panic!("opcode {op:?} is not an EVM service"),
    }
}

/// Keccak service: hash the first argument.
pub fn keccak256_service(args: &[Vec<u8>]) -> Vec<u8> {
    keccak256(arg(args, 0)).to_vec()
}

/// Time service: current Unix time in nanoseconds.
pub fn time_service() -> Vec<u8> {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0);
    u64_to_bytes(nanos).to_vec()
}

/// Log service: surface a guest-originated log line.
pub fn log_service(args: &[Vec<u8>]) {
    let message = String::from_utf8_lossy(arg(args, 0)).into_owned();
    tracing::info!(target: "concrete::guest", "{message}");
}

// Loopback bridges
//
// These wire a guest-side proxy directly to host handlers over an
// in-process memory, with no engine in between. Tests and native
// in-process proxying use them; the wasm adapter builds the same shape
// over real guest memory.

/// Bridge function routing state database opcodes to a concrete store.
pub fn new_state_db_bridge(memory: SharedMemory, db: Rc<dyn StateDB>) -> BridgeFn {
    Rc::new(move |pointer| {
        let args = {
            let mut mem = memory.borrow_mut();
            get_args(&mut *mem, crate::bridge::MemPointer::from_u64(pointer))
                .expect("statedb bridge: bad argument pointer")
        };
        let op = OpCode::decode(arg(&args, 0)).expect("statedb bridge: bad opcode");
        let out = call_state_db(db.as_ref(), op, &args[1..]);
        let mut mem = memory.borrow_mut();
        put_value(&mut *mem, &out)
            .expect("statedb bridge: return encoding failed")
            .as_u64()
    })
}

/// Bridge function routing EVM context opcodes to a concrete EVM.
pub fn new_evm_bridge(memory: SharedMemory, evm: Rc<dyn Evm>) -> BridgeFn {
    Rc::new(move |pointer| {
        let args = {
            let mut mem = memory.borrow_mut();
            get_args(&mut *mem, crate::bridge::MemPointer::from_u64(pointer))
                .expect("evm bridge: bad argument pointer")
        };
        let op = OpCode::decode(arg(&args, 0)).expect("evm bridge: bad opcode");
        let out = call_evm(evm.as_ref(), op, &args[1..]);
        let mut mem = memory.borrow_mut();
        put_value(&mut *mem, &out)
            .expect("evm bridge: return encoding failed")
            .as_u64()
    })
}

/// Bridge function answering the address service with a fixed address.
pub fn new_address_bridge(memory: SharedMemory, address: Address) -> BridgeFn {
    Rc::new(move |_pointer| {
        let mut mem = memory.borrow_mut();
        put_value(&mut *mem, &address)
            .expect("address bridge: return encoding failed")
            .as_u64()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockEvm, MockStateDB};

    #[test]
    fn test_call_state_db_round_trip() {
        let db = MockStateDB::new();
        let addr = [1u8; 20];
        let key = [2u8; 32];
        let value = [3u8; 32];

        let out = call_state_db(
            &db,
            OpCode::SetPersistentState,
            &[addr.to_vec(), key.to_vec(), value.to_vec()],
        );
        assert!(out.is_empty());
        let out = call_state_db(
            &db,
            OpCode::GetPersistentState,
            &[addr.to_vec(), key.to_vec()],
        );
        assert_eq!(out, value.to_vec());

        let preimage = b"host side preimage".to_vec();
        let hash = keccak256(&preimage);
        call_state_db(
            &db,
            OpCode::AddEphemeralPreimage,
            &[hash.to_vec(), preimage.clone()],
        );
        assert_eq!(
            call_state_db(&db, OpCode::GetEphemeralPreimage, &[hash.to_vec()]),
            preimage
        );
        assert_eq!(
            bytes_to_u64(&call_state_db(
                &db,
                OpCode::GetEphemeralPreimageSize,
                &[hash.to_vec()]
            )),
            preimage.len() as u64
        );
    }

    #[test]
    #[should_panic(expected = "not a state database service")]
    fn test_call_state_db_rejects_evm_opcodes() {
        let db = MockStateDB::new();
        call_state_db(&db, OpCode::BlockNumber, &[]);
    }

    #[test]
    fn test_call_evm() {
        let evm = MockEvm::new(Rc::new(MockStateDB::new()));
        assert_eq!(
            bytes_to_u64(&call_evm(&evm, OpCode::BlockTimestamp, &[])),
            evm.timestamp
        );
        assert_eq!(
            call_evm(&evm, OpCode::BlockNumber, &[]),
            evm.number.to_bytes_be()
        );
        assert_eq!(
            call_evm(&evm, OpCode::BlockCoinbase, &[]),
            evm.coinbase.to_vec()
        );
        let hash = call_evm(&evm, OpCode::BlockHash, &[u64_to_bytes(5).to_vec()]);
        assert_eq!(bytes_to_hash(&hash), evm.block_hash(5));
    }

    #[test]
    fn test_utility_services() {
        assert_eq!(
            keccak256_service(&[b"abc".to_vec()]),
            keccak256(b"abc").to_vec()
        );
        let t0 = bytes_to_u64(&time_service());
        assert!(t0 > 0);
        // Logging must not panic.
        log_service(&[b"hello from a guest".to_vec()]);
    }
}
