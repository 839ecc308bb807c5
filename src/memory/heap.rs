//! Heap allocator for the interpreter
//!
//! The heap region of [`Memory`] is tiled by blocks, each starting with an 8-byte
//! boundary tag:
//!
//! ```text
//! +---------------+----------------------+-------------------+
//! | prev (4 bytes)| free:1 | length:31   | payload ...       |
//! +---------------+----------------------+-------------------+
//! ^ tag address                          ^ address handed to the program
//! ```
//!
//! `length` covers tag and payload, so walking `tag += length` from the heap bottom
//! visits every block and lands exactly on the stack bottom. `prev` points at the
//! preceding block's tag; the first block points at itself.
//!
//! Allocation is first-fit with splitting. Freeing coalesces with both neighbors.
//! Double frees and frees of foreign addresses are caught by the live set rather
//! than by inspecting tags.

use super::value::TypedValue;
use super::Memory;
use crate::interpreter::constants::{FREE_FLAG, LENGTH_MASK, TAG_LENGTH, WORD_SIZE};
use crate::interpreter::errors::{MemoryError, RuntimeError};
use crate::types::DataType;
use tracing::debug;

/// One block as seen by a heap walk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapBlock {
    /// Address of the boundary tag
    pub address: u32,
    /// Tag plus payload, in bytes
    pub length: u32,
    pub free: bool,
}

impl HeapBlock {
    /// First payload byte
    pub fn payload(&self) -> u32 {
        self.address + TAG_LENGTH
    }
}

impl Memory {
    /// Lay down one free block spanning the whole heap region
    pub(super) fn init_heap(&mut self) -> Result<(), MemoryError> {
        let length = self.stack_bottom - self.heap_bottom;
        let tag = self.heap_bottom;
        self.write_word(tag, tag)?;
        self.write_tag(tag, length, true)
    }

    /// Decode the tag at `tag`, which must lie inside the heap and describe a block
    /// that ends at or before the stack bottom
    fn read_tag(&self, tag: u32) -> Result<HeapBlock, MemoryError> {
        let corrupted = MemoryError::HeapCorrupted { address: tag };
        if tag < self.heap_bottom || tag >= self.stack_bottom {
            return Err(corrupted);
        }
        let word = self.read_word(tag + 4)?;
        let length = word & LENGTH_MASK;
        match tag.checked_add(length) {
            Some(end) if length >= TAG_LENGTH && end <= self.stack_bottom => Ok(HeapBlock {
                address: tag,
                length,
                free: word & FREE_FLAG != 0,
            }),
            _ => Err(corrupted),
        }
    }

    fn write_tag(&mut self, tag: u32, length: u32, free: bool) -> Result<(), MemoryError> {
        let flag = if free { FREE_FLAG } else { 0 };
        self.write_word(tag + 4, flag | (length & LENGTH_MASK))
    }

    /// Allocate `size` bytes and return a `void*` to the payload
    pub fn allocate(&mut self, size: i64) -> Result<TypedValue, RuntimeError> {
        if size <= 0 {
            return Err(MemoryError::InvalidAllocationSize { size }.into());
        }
        if size > (LENGTH_MASK - TAG_LENGTH) as i64 {
            return Err(MemoryError::OutOfMemory {
                requested: size.min(u32::MAX as i64) as u32,
            }
            .into());
        }
        let requested = (size as u32).div_ceil(WORD_SIZE) * WORD_SIZE;

        let mut tag = self.heap_bottom;
        let block = loop {
            if tag >= self.stack_bottom {
                return Err(MemoryError::OutOfMemory { requested }.into());
            }
            let block = self.read_tag(tag)?;
            if block.free && block.length - TAG_LENGTH >= requested {
                break block;
            }
            tag += block.length;
        };

        let needed = requested + TAG_LENGTH;
        let remainder = block.length - needed;
        if remainder > TAG_LENGTH {
            // Split: the front part is used, the rest becomes a new free block
            let rest = block.address + needed;
            self.write_tag(block.address, needed, false)?;
            self.write_word(rest, block.address)?;
            self.write_tag(rest, remainder, true)?;

            let following = rest + remainder;
            if following < self.stack_bottom {
                self.write_word(following, rest)?;
            }
        } else {
            self.write_tag(block.address, block.length, false)?;
        }

        let payload = block.payload();
        self.live_allocations.insert(payload);
        debug!(
            "malloc({}) -> 0x{:x} (block 0x{:x}, {} bytes)",
            size,
            payload,
            block.address,
            if remainder > TAG_LENGTH {
                needed
            } else {
                block.length
            }
        );

        Ok(TypedValue::new(payload as f64, DataType::void_pointer()))
    }

    /// Release the block whose payload starts at `address`
    pub fn free(&mut self, address: u32) -> Result<(), RuntimeError> {
        if !self.live_allocations.contains(&address) {
            return Err(MemoryError::InvalidFree { address }.into());
        }

        // Validate both tags before touching anything
        let mut node = address - TAG_LENGTH;
        let mut length = self.read_tag(node)?.length;
        let prev = self.read_word(node)?;
        let before = if prev == node {
            None
        } else {
            if prev < self.heap_bottom || prev >= node {
                return Err(MemoryError::HeapCorrupted { address: node }.into());
            }
            let before = self.read_tag(prev)?;
            if before.address + before.length != node {
                return Err(MemoryError::HeapCorrupted { address: node }.into());
            }
            Some(before)
        };

        self.live_allocations.remove(&address);
        self.write_tag(node, length, true)?;

        // Merge backwards
        if let Some(before) = before.filter(|b| b.free) {
            length += before.length;
            node = before.address;
            self.write_tag(node, length, true)?;
        }

        // Merge forwards
        let next = node + length;
        if next < self.stack_bottom {
            let after = self.read_tag(next)?;
            if after.free {
                length += after.length;
                self.write_tag(node, length, true)?;
            }
        }

        let following = node + length;
        if following < self.stack_bottom {
            self.write_word(following, node)?;
        }

        debug!("free(0x{:x}): block 0x{:x} now {} bytes", address, node, length);
        Ok(())
    }

    /// Walk the heap from the bottom. Stops early at a corrupt tag.
    pub fn heap_blocks(&self) -> Vec<HeapBlock> {
        let mut blocks = Vec::new();
        let mut tag = self.heap_bottom;
        while tag < self.stack_bottom {
            match self.read_tag(tag) {
                Ok(block) => {
                    blocks.push(block);
                    tag += block.length;
                }
                Err(_) => break,
            }
        }
        blocks
    }

    /// Verify that the blocks tile the heap exactly and every `prev` link is right
    pub fn check_heap(&self) -> Result<(), MemoryError> {
        let mut tag = self.heap_bottom;
        let mut expected_prev = self.heap_bottom;
        while tag < self.stack_bottom {
            let block = self.read_tag(tag)?;
            if self.read_word(tag)? != expected_prev {
                return Err(MemoryError::HeapCorrupted { address: tag });
            }
            if !block.free && !self.live_allocations.contains(&block.payload()) {
                return Err(MemoryError::HeapCorrupted { address: tag });
            }
            expected_prev = tag;
            tag += block.length;
        }
        if tag != self.stack_bottom {
            return Err(MemoryError::HeapCorrupted { address: tag });
        }
        Ok(())
    }

    /// Number of allocations not yet freed
    pub fn live_allocations(&self) -> usize {
        self.live_allocations.len()
    }

    pub fn is_live_allocation(&self, address: u32) -> bool {
        self.live_allocations.contains(&address)
    }

    /// Total length of all free blocks, tags included
    pub fn free_bytes(&self) -> u32 {
        self.heap_blocks()
            .iter()
            .filter(|b| b.free)
            .map(|b| b.length)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryConfig, StackPolicy};

    const HEAP: u32 = 256;

    fn memory() -> Memory {
        Memory::new(&MemoryConfig {
            read_only_size: 64,
            heap_size: HEAP,
            stack_size: 64,
            stack_policy: StackPolicy::Reclaim,
        })
        .unwrap()
    }

    fn single_free_block(memory: &Memory) -> bool {
        memory.heap_blocks()
            == vec![HeapBlock {
                address: memory.heap_bottom(),
                length: HEAP,
                free: true,
            }]
    }

    #[test]
    fn test_fresh_heap_is_one_free_block() {
        let memory = memory();
        assert!(single_free_block(&memory));
        assert_eq!(memory.read_word(memory.heap_bottom()).unwrap(), memory.heap_bottom());
        memory.check_heap().unwrap();
    }

    #[test]
    fn test_alloc_free_round_trip() {
        let mut memory = memory();
        let p = memory.allocate(10).unwrap();
        assert_eq!(p.data_type(), &DataType::void_pointer());
        assert_eq!(p.to_address(), memory.heap_bottom() + TAG_LENGTH);
        memory.check_heap().unwrap();

        memory.free(p.to_address()).unwrap();
        assert!(single_free_block(&memory));
        memory.check_heap().unwrap();
    }

    #[test]
    fn test_two_blocks_coalesce_in_either_order() {
        for reverse in [false, true] {
            let mut memory = memory();
            let a = memory.allocate(10).unwrap().to_address();
            let b = memory.allocate(10).unwrap().to_address();
            // 10 rounds to 12, plus the tag
            assert_eq!(b - a, 20);

            let (first, second) = if reverse { (b, a) } else { (a, b) };
            memory.free(first).unwrap();
            memory.check_heap().unwrap();
            memory.free(second).unwrap();

            assert!(single_free_block(&memory));
            assert_eq!(memory.free_bytes(), HEAP);
        }
    }

    #[test]
    fn test_middle_block_merges_both_ways() {
        let mut memory = memory();
        let a = memory.allocate(4).unwrap().to_address();
        let b = memory.allocate(4).unwrap().to_address();
        let c = memory.allocate(4).unwrap().to_address();
        let _guard = memory.allocate(4).unwrap().to_address();

        memory.free(a).unwrap();
        memory.free(c).unwrap();
        assert_eq!(memory.heap_blocks().iter().filter(|b| b.free).count(), 3);

        memory.free(b).unwrap();
        let blocks = memory.heap_blocks();
        assert_eq!(blocks[0].length, 36);
        assert!(blocks[0].free);
        assert!(!blocks[1].free);
        memory.check_heap().unwrap();
    }

    #[test]
    fn test_invalid_and_double_free() {
        let mut memory = memory();
        let p = memory.allocate(8).unwrap().to_address();

        assert_eq!(
            memory.free(p + 4).unwrap_err(),
            RuntimeError::Memory(MemoryError::InvalidFree { address: p + 4 })
        );
        memory.free(p).unwrap();
        assert_eq!(
            memory.free(p).unwrap_err(),
            RuntimeError::Memory(MemoryError::InvalidFree { address: p })
        );
    }

    #[test]
    fn test_first_fit_reuses_freed_block() {
        let mut memory = memory();
        let a = memory.allocate(10).unwrap().to_address();
        let _b = memory.allocate(10).unwrap();
        let free_before = memory.free_bytes();

        memory.free(a).unwrap();
        let again = memory.allocate(10).unwrap().to_address();
        assert_eq!(again, a);
        assert_eq!(memory.free_bytes(), free_before);
    }

    #[test]
    fn test_tight_fit_takes_whole_block() {
        let mut memory = memory();
        // Leaves exactly 8 spare bytes, not enough for a second tag plus payload
        let p = memory.allocate((HEAP - 2 * TAG_LENGTH) as i64).unwrap();
        let blocks = memory.heap_blocks();
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].free);
        assert_eq!(blocks[0].length, HEAP);

        memory.free(p.to_address()).unwrap();
        assert!(single_free_block(&memory));
    }

    #[test]
    fn test_allocation_failures() {
        let mut memory = memory();
        assert_eq!(
            memory.allocate(0).unwrap_err(),
            RuntimeError::Memory(MemoryError::InvalidAllocationSize { size: 0 })
        );
        assert!(matches!(
            memory.allocate(-3),
            Err(RuntimeError::Memory(MemoryError::InvalidAllocationSize { .. }))
        ));
        assert_eq!(
            memory.allocate(HEAP as i64).unwrap_err(),
            RuntimeError::Memory(MemoryError::OutOfMemory { requested: HEAP })
        );
        assert!(single_free_block(&memory));
    }

    #[test]
    fn test_corrupted_tag_is_reported() {
        let mut memory = memory();
        let p = memory.allocate(4).unwrap().to_address();
        // Program overwrites its own tag
        memory.write_word(p - 4, 2).unwrap();
        assert!(matches!(
            memory.allocate(4),
            Err(RuntimeError::Memory(MemoryError::HeapCorrupted { .. }))
        ));
        assert!(memory.check_heap().is_err());
    }

    #[test]
    fn test_corrupted_prev_link_is_reported() {
        let mut memory = memory();
        let a = memory.allocate(4).unwrap().to_address();
        let b = memory.allocate(4).unwrap().to_address();

        memory.write_word(b - TAG_LENGTH, u32::MAX).unwrap();
        assert_eq!(
            memory.free(b).unwrap_err(),
            RuntimeError::Memory(MemoryError::HeapCorrupted {
                address: b - TAG_LENGTH
            })
        );
        // Nothing was released
        assert!(memory.is_live_allocation(b));

        // A link that points inside the previous block is just as bad
        memory.write_word(b - TAG_LENGTH, a).unwrap();
        assert!(matches!(
            memory.free(b),
            Err(RuntimeError::Memory(MemoryError::HeapCorrupted { .. }))
        ));

        memory.write_word(b - TAG_LENGTH, a - TAG_LENGTH).unwrap();
        memory.free(b).unwrap();
        memory.free(a).unwrap();
        assert!(single_free_block(&memory));
    }

    #[test]
    fn test_oversized_length_is_reported() {
        let mut memory = memory();
        let p = memory.allocate(4).unwrap().to_address();
        memory.write_word(p - 4, LENGTH_MASK).unwrap();
        assert!(matches!(
            memory.free(p),
            Err(RuntimeError::Memory(MemoryError::HeapCorrupted { .. }))
        ));
        assert!(memory.heap_blocks().is_empty());
    }
}
