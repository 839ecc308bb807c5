// Constants for the C interpreter

/// Default size of the read-only region (string literals)
pub const READ_ONLY_SIZE: u32 = 0x1000;

/// Default size of the heap region
pub const HEAP_SIZE: u32 = 0x1_0000;

/// Default size of the stack region
pub const STACK_SIZE: u32 = 0x1_0000;

/// First read-only address handed out.
/// Addresses below this are never valid so that 0 can serve as NULL.
pub const NULL_GUARD: u32 = 4;

/// Bytes of boundary tag in front of every heap block: 4 bytes previous-block
/// address, 4 bytes free flag | length
pub const TAG_LENGTH: u32 = 8;

/// Top bit of the second tag word marks the block as free
pub const FREE_FLAG: u32 = 0x8000_0000;

/// Low 31 bits of the second tag word hold the block length (tag + payload)
pub const LENGTH_MASK: u32 = 0x7FFF_FFFF;

/// Heap requests are rounded up to this multiple, stack slots aligned to it
pub const WORD_SIZE: u32 = 4;

/// Iterations a single loop statement may run before the program is aborted
pub const LOOP_LIMIT: u64 = 1 << 20;

/// Maximum nesting of user function calls
pub const MAX_CALL_DEPTH: usize = 256;
