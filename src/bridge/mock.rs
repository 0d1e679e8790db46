// Copyright (C) 2023-2026 the Concrete authors. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! An in-process linear memory with a bump allocator, standing in for a
//! guest's memory in native tests and in-process proxy setups.

use crate::bridge::{Allocator, BridgeError, BridgeResult, Memory};

// Offset 0 is reserved so no allocation ever aliases the null pointer.
const BASE_OFFSET: u32 = 8;

/// Growable byte buffer with bump allocation. `free` is a no-op; `prune`
/// resets the whole arena, like a guest allocator wiped between
/// invocations.
pub struct MockMemory {
    data: Vec<u8>,
    next: u32,
}

impl MockMemory {
    pub fn new() -> Self {
        Self {
            data: vec![0u8; BASE_OFFSET as usize],
            next: BASE_OFFSET,
        }
    }

    /// Bytes currently allocated, excluding the reserved base.
    pub fn allocated(&self) -> usize {
        (self.next - BASE_OFFSET) as usize
    }
}

impl Default for MockMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory for MockMemory {
    fn read(&mut self, offset: u32, size: u32) -> BridgeResult<Vec<u8>> {
        let end = offset as usize + size as usize;
        if end > self.data.len() {
            return Err(BridgeError::OutOfBounds { offset, size });
        }
        Ok(self.data[offset as usize..end].to_vec())
    }

    fn write(&mut self, offset: u32, data: &[u8]) -> BridgeResult<()> {
        let end = offset as usize + data.len();
        if end > self.data.len() {
            return Err(BridgeError::OutOfBounds {
                offset,
                size: data.len() as u32,
            });
        }
        self.data[offset as usize..end].copy_from_slice(data);
        Ok(())
    }
}

impl Allocator for MockMemory {
    fn malloc(&mut self, size: u32) -> BridgeResult<u32> {
        let offset = self.next;
        self.next += size;
        self.data.resize(self.next as usize, 0);
        Ok(offset)
    }

    fn free(&mut self, _offset: u32) -> BridgeResult<()> {
        Ok(())
    }

    fn prune(&mut self) -> BridgeResult<()> {
        self.data.truncate(BASE_OFFSET as usize);
        self.next = BASE_OFFSET;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_write_read() {
        let mut mem = MockMemory::new();
        let offset = mem.malloc(4).unwrap();
        assert!(offset >= BASE_OFFSET);
        mem.write(offset, &[1, 2, 3, 4]).unwrap();
        assert_eq!(mem.read(offset, 4).unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_out_of_bounds() {
        let mut mem = MockMemory::new();
        let offset = mem.malloc(4).unwrap();
        assert!(mem.read(offset, 5).is_err());
        assert!(mem.write(offset + 1, &[0u8; 4]).is_err());
    }

    #[test]
    fn test_prune_resets_arena() {
        let mut mem = MockMemory::new();
        let first = mem.malloc(16).unwrap();
        mem.malloc(16).unwrap();
        assert_eq!(mem.allocated(), 32);
        mem.prune().unwrap();
        assert_eq!(mem.allocated(), 0);
        assert_eq!(mem.malloc(8).unwrap(), first);
    }
}
