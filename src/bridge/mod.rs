// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Marshalling layer between a WASM guest and its host over the guest's
//! linear memory.
//!
//! Every value crossing the boundary travels through a buffer described
//! by a [`MemPointer`]: a u64 packing `(offset, size)`, with 0 as the
//! null pointer. Buffers are allocated by the guest's own allocator, so
//! the guest stays the single source of truth for lifetimes; the host
//! frees per-call arguments and prunes everything else after each
//! invocation.
//!
//! Wire formats (all integers big-endian):
//!
//! - value:  `len32(|v|) ++ v`
//! - args:   `len32(count) ++ len32(|a0|) ++ a0 ++ len32(|a1|) ++ a1 …`
//! - return-with-error: an args vector whose final entry is the error
//!   message, empty meaning success.
//!
//! Opcode-dispatched services (state database, EVM context) put a one-byte
//! [`OpCode`] in the first args entry.

pub mod guest;
pub mod host;
pub mod mock;

use thiserror::Error;

use crate::api::BlockData;
use crate::utils::{bytes_to_address, bytes_to_u64, u64_to_bytes};

/// Result type for bridge memory and codec operations.
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge failures. On the host side these become engine traps; on the
/// guest side they indicate a corrupted module and abort the call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("memory access out of bounds at offset {offset} length {size}")]
    OutOfBounds { offset: u32, size: u32 },

    #[error("guest allocator failure: {0}")]
    Allocator(String),

    #[error("malformed bridge payload: {0}")]
    Codec(String),
}

/// Packed `(offset, size)` descriptor of a buffer in guest linear memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MemPointer(u64);

impl MemPointer {
    pub const NULL: MemPointer = MemPointer(0);

    pub fn pack(offset: u32, size: u32) -> Self {
        MemPointer(((offset as u64) << 32) | size as u64)
    }

    pub fn from_u64(raw: u64) -> Self {
        MemPointer(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn unpack(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }

    pub fn offset(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub fn size(self) -> u32 {
        self.0 as u32
    }

    pub fn is_null(self) -> bool {
        self.0 == 0
    }
}

/// Byte-level access to a linear memory.
pub trait Memory {
    fn read(&mut self, offset: u32, size: u32) -> BridgeResult<Vec<u8>>;
    fn write(&mut self, offset: u32, data: &[u8]) -> BridgeResult<()>;
}

/// Buffer lifetime management inside a linear memory.
pub trait Allocator {
    fn malloc(&mut self, size: u32) -> BridgeResult<u32>;
    fn free(&mut self, offset: u32) -> BridgeResult<()>;
    /// Bulk-free everything allocated since the last prune.
    fn prune(&mut self) -> BridgeResult<()>;
}

/// A memory that can also allocate, which is what the codec needs.
pub trait BridgeMemory: Memory + Allocator {}

impl<T: Memory + Allocator> BridgeMemory for T {}

// Value codec

fn len32(len: usize) -> [u8; 4] {
    (len as u32).to_be_bytes()
}

fn read_len32(bytes: &[u8], at: usize) -> BridgeResult<usize> {
    let end = at
        .checked_add(4)
        .filter(|end| *end <= bytes.len())
        .ok_or_else(|| BridgeError::Codec("truncated length prefix".into()))?;
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[at..end]);
    Ok(u32::from_be_bytes(buf) as usize)
}

fn alloc_and_write(mem: &mut dyn BridgeMemory, bytes: &[u8]) -> BridgeResult<MemPointer> {
    let offset = mem.malloc(bytes.len() as u32)?;
    mem.write(offset, bytes)?;
    Ok(MemPointer::pack(offset, bytes.len() as u32))
}

/// Allocate a buffer holding one length-prefixed value. The empty value
/// encodes as the null pointer.
pub fn put_value(mem: &mut dyn BridgeMemory, value: &[u8]) -> BridgeResult<MemPointer> {
    if value.is_empty() {
        return Ok(MemPointer::NULL);
    }
    let mut bytes = Vec::with_capacity(4 + value.len());
    bytes.extend_from_slice(&len32(value.len()));
    bytes.extend_from_slice(value);
    alloc_and_write(mem, &bytes)
}

/// Read back a value written by [`put_value`].
pub fn get_value(mem: &mut dyn BridgeMemory, pointer: MemPointer) -> BridgeResult<Vec<u8>> {
    if pointer.is_null() {
        return Ok(Vec::new());
    }
    let (offset, size) = pointer.unpack();
    let bytes = mem.read(offset, size)?;
    let len = read_len32(&bytes, 0)?;
    if len > bytes.len() - 4 {
        return Err(BridgeError::Codec("value length exceeds buffer".into()));
    }
    Ok(bytes[4..4 + len].to_vec())
}

/// Serialize a list of byte strings into one contiguous buffer.
pub fn pack_list(items: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = 4 + items.iter().map(|item| 4 + item.len()).sum::<usize>();
    let mut bytes = Vec::with_capacity(total);
    bytes.extend_from_slice(&len32(items.len()));
    for item in items {
        bytes.extend_from_slice(&len32(item.len()));
        bytes.extend_from_slice(item);
    }
    bytes
}

/// Reverse of [`pack_list`].
pub fn unpack_list(bytes: &[u8]) -> BridgeResult<Vec<Vec<u8>>> {
    let count = read_len32(bytes, 0)?;
    let mut items = Vec::with_capacity(count);
    let mut at = 4;
    for _ in 0..count {
        let len = read_len32(bytes, at)?;
        at += 4;
        if len > bytes.len() - at {
            return Err(BridgeError::Codec("list entry exceeds buffer".into()));
        }
        items.push(bytes[at..at + len].to_vec());
        at += len;
    }
    Ok(items)
}

/// Allocate a buffer holding an argument list. The empty list encodes as
/// the null pointer.
pub fn put_args(mem: &mut dyn BridgeMemory, args: &[Vec<u8>]) -> BridgeResult<MemPointer> {
    if args.is_empty() {
        return Ok(MemPointer::NULL);
    }
    alloc_and_write(mem, &pack_list(args))
}

/// Read back an argument list written by [`put_args`].
pub fn get_args(mem: &mut dyn BridgeMemory, pointer: MemPointer) -> BridgeResult<Vec<Vec<u8>>> {
    if pointer.is_null() {
        return Ok(Vec::new());
    }
    let (offset, size) = pointer.unpack();
    let bytes = mem.read(offset, size)?;
    unpack_list(&bytes)
}

/// Encode return values plus an error slot. The error message is carried
/// as the final entry; empty bytes mean success.
pub fn put_return_with_error(
    mem: &mut dyn BridgeMemory,
    values: &[Vec<u8>],
    err: Option<&str>,
) -> BridgeResult<MemPointer> {
    let mut entries = values.to_vec();
    entries.push(err.map(|msg| msg.as_bytes().to_vec()).unwrap_or_default());
    put_args(mem, &entries)
}

/// Decode a return vector into `(values, error)`. The null pointer decodes
/// as success with no values.
pub fn get_return_with_error(
    mem: &mut dyn BridgeMemory,
    pointer: MemPointer,
) -> BridgeResult<(Vec<Vec<u8>>, Option<String>)> {
    let mut entries = get_args(mem, pointer)?;
    let err = match entries.pop() {
        None => None,
        Some(last) if last.is_empty() => None,
        Some(last) => Some(String::from_utf8_lossy(&last).into_owned()),
    };
    Ok((entries, err))
}

// OpCode

/// Identifier of the host service requested by an opcode-dispatched call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    // State database services
    SetPersistentState = 0x01,
    GetPersistentState = 0x02,
    SetEphemeralState = 0x03,
    GetEphemeralState = 0x04,
    AddPersistentPreimage = 0x05,
    GetPersistentPreimage = 0x06,
    GetPersistentPreimageSize = 0x07,
    AddEphemeralPreimage = 0x08,
    GetEphemeralPreimage = 0x09,
    GetEphemeralPreimageSize = 0x0a,

    // EVM context services
    BlockHash = 0x20,
    BlockTimestamp = 0x21,
    BlockNumber = 0x22,
    BlockDifficulty = 0x23,
    BlockGasLimit = 0x24,
    BlockCoinbase = 0x25,
}

impl OpCode {
    pub fn encode(self) -> Vec<u8> {
        vec![self as u8]
    }

    pub fn decode(bytes: &[u8]) -> Option<OpCode> {
        if bytes.len() != 1 {
            return None;
        }
        Some(match bytes[0] {
            0x01 => OpCode::SetPersistentState,
            0x02 => OpCode::GetPersistentState,
            0x03 => OpCode::SetEphemeralState,
            0x04 => OpCode::GetEphemeralState,
            0x05 => OpCode::AddPersistentPreimage,
            0x06 => OpCode::GetPersistentPreimage,
            0x07 => OpCode::GetPersistentPreimageSize,
            0x08 => OpCode::AddEphemeralPreimage,
            0x09 => OpCode::GetEphemeralPreimage,
            0x0a => OpCode::GetEphemeralPreimageSize,
            0x20 => OpCode::BlockHash,
            0x21 => OpCode::BlockTimestamp,
            0x22 => OpCode::BlockNumber,
            0x23 => OpCode::BlockDifficulty,
            0x24 => OpCode::BlockGasLimit,
            0x25 => OpCode::BlockCoinbase,
            _ => return None,
        })
    }
}

// Block data

impl BlockData {
    /// Serialize for one-round-trip transfer over the bridge.
    pub fn encode(&self) -> Vec<u8> {
        pack_list(&[
            self.number.to_bytes_be(),
            u64_to_bytes(self.timestamp).to_vec(),
            u64_to_bytes(self.gas_limit).to_vec(),
            self.difficulty.to_bytes_be(),
            self.coinbase.to_vec(),
        ])
    }

    pub fn decode(bytes: &[u8]) -> BridgeResult<BlockData> {
        let fields = unpack_list(bytes)?;
        if fields.len() != 5 {
            return Err(BridgeError::Codec("block data wants 5 fields".into()));
        }
        Ok(BlockData {
            number: num_bigint::BigUint::from_bytes_be(&fields[0]),
            timestamp: bytes_to_u64(&fields[1]),
            gas_limit: bytes_to_u64(&fields[2]),
            difficulty: num_bigint::BigUint::from_bytes_be(&fields[3]),
            coinbase: bytes_to_address(&fields[4]),
        })
    }
}
