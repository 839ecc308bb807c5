//! Memory model for the C interpreter
//!
//! This module provides the core memory abstractions:
//! - [`Memory`]: one flat byte buffer split into read-only, heap, and stack regions
//! - [`heap`]: boundary-tag allocator (malloc/free) living inside the heap region
//! - [`value`]: [`value::TypedValue`], a typed number that may be bound to an address
//! - [`frame`]: lexical scopes mapping names to stack slots and functions
//!
//! # Layout
//!
//! ```text
//! 0 ........ heap_bottom ........ stack_bottom ........ len
//! | read-only |        heap        |        stack        |
//! ```
//!
//! Addresses below [`NULL_GUARD`] are never handed out, so address 0 is a usable
//! NULL. Every multi-byte value is stored little-endian.

pub mod frame;
pub mod heap;
pub mod value;

use crate::interpreter::constants::{
    HEAP_SIZE, LENGTH_MASK, NULL_GUARD, READ_ONLY_SIZE, STACK_SIZE, TAG_LENGTH,
};
use crate::interpreter::errors::{MemoryError, RuntimeError, TypeError};
use crate::types::DataType;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;
use value::TypedValue;

/// What happens to the stack cursor when a scope exits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackPolicy {
    /// The parent's cursor stays at the child's base, so the child's slots are reused
    #[default]
    Reclaim,
    /// The parent's cursor advances past everything the child claimed
    GrowOnly,
}

/// Region sizes and stack behavior of a [`Memory`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryConfig {
    pub read_only_size: u32,
    pub heap_size: u32,
    pub stack_size: u32,
    pub stack_policy: StackPolicy,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        MemoryConfig {
            read_only_size: READ_ONLY_SIZE,
            heap_size: HEAP_SIZE,
            stack_size: STACK_SIZE,
            stack_policy: StackPolicy::Reclaim,
        }
    }
}

/// The characters of a string literal, without surrounding quotes if present
pub fn literal_text(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(text)
}

/// The byte a C `char` holds for `c`. Strings are Latin-1; anything outside it
/// is stored as `?`.
pub fn encode_char(c: char) -> u8 {
    u8::try_from(c).unwrap_or(b'?')
}

/// One byte per character, without a terminator
pub fn encode_chars(text: &str) -> Vec<u8> {
    text.chars().map(encode_char).collect()
}

/// The simulated process memory image
#[derive(Debug, Clone)]
pub struct Memory {
    bytes: Vec<u8>,
    heap_bottom: u32,
    stack_bottom: u32,
    read_only_top: u32,
    literals: FxHashMap<String, u32>,
    live_allocations: FxHashSet<u32>,
    stack_policy: StackPolicy,
}

impl Memory {
    /// Build a zeroed image for `config`. Fails if the regions cannot be laid out.
    pub fn new(config: &MemoryConfig) -> Result<Self, MemoryError> {
        let invalid = |reason: String| MemoryError::InvalidLayout { reason };

        if config.read_only_size < NULL_GUARD {
            return Err(invalid(format!(
                "read-only region of {} bytes is smaller than the {} byte NULL guard",
                config.read_only_size, NULL_GUARD
            )));
        }
        if config.heap_size < 2 * TAG_LENGTH || config.heap_size > LENGTH_MASK {
            return Err(invalid(format!(
                "heap of {} bytes must be between {} and {} bytes",
                config.heap_size,
                2 * TAG_LENGTH,
                LENGTH_MASK
            )));
        }
        let heap_bottom = config.read_only_size;
        let stack_bottom = heap_bottom
            .checked_add(config.heap_size)
            .ok_or_else(|| invalid("regions exceed the 32-bit address space".to_string()))?;
        let total = stack_bottom
            .checked_add(config.stack_size)
            .ok_or_else(|| invalid("regions exceed the 32-bit address space".to_string()))?;

        let mut memory = Memory {
            bytes: vec![0; total as usize],
            heap_bottom,
            stack_bottom,
            read_only_top: NULL_GUARD,
            literals: FxHashMap::default(),
            live_allocations: FxHashSet::default(),
            stack_policy: config.stack_policy,
        };
        memory.init_heap()?;
        Ok(memory)
    }

    /// Total size of the buffer in bytes
    pub fn len(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn heap_bottom(&self) -> u32 {
        self.heap_bottom
    }

    pub fn stack_bottom(&self) -> u32 {
        self.stack_bottom
    }

    pub fn stack_policy(&self) -> StackPolicy {
        self.stack_policy
    }

    /// Bytes of the read-only region not yet used by string literals
    pub fn read_only_available(&self) -> u32 {
        self.heap_bottom - self.read_only_top
    }

    /// Bounds-check `[address, address + size)` and return the start index
    fn check_range(&self, address: u32, size: u32) -> Result<usize, MemoryError> {
        let end = address as u64 + size as u64;
        if end > self.bytes.len() as u64 {
            return Err(MemoryError::OutOfBounds {
                address: address as i64,
                size,
            });
        }
        Ok(address as usize)
    }

    /// Bounds-check a program access; address 0 is NULL
    fn check_access(&self, address: u32, size: u32) -> Result<usize, MemoryError> {
        if address == 0 {
            return Err(MemoryError::NullDereference);
        }
        self.check_range(address, size)
    }

    /// Like [`Self::check_access`] but also rejects the read-only region
    fn check_write(&self, address: u32, size: u32) -> Result<usize, MemoryError> {
        let start = self.check_access(address, size)?;
        if address < self.heap_bottom {
            return Err(MemoryError::ReadOnlyWrite { address });
        }
        Ok(start)
    }

    pub fn read_bytes(&self, address: u32, size: u32) -> Result<&[u8], MemoryError> {
        let start = self.check_access(address, size)?;
        Ok(&self.bytes[start..start + size as usize])
    }

    pub fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<(), MemoryError> {
        let start = self.check_write(address, data.len() as u32)?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    /// Set `size` bytes starting at `address` to `byte`
    pub fn fill(&mut self, address: u32, size: u32, byte: u8) -> Result<(), MemoryError> {
        let start = self.check_write(address, size)?;
        self.bytes[start..start + size as usize].fill(byte);
        Ok(())
    }

    /// Read a word without the NULL check (allocator tags)
    pub(crate) fn read_word(&self, address: u32) -> Result<u32, MemoryError> {
        let start = self.check_range(address, 4)?;
        let mut word = [0u8; 4];
        word.copy_from_slice(&self.bytes[start..start + 4]);
        Ok(u32::from_le_bytes(word))
    }

    /// Write a word without the read-only check (allocator tags)
    pub(crate) fn write_word(&mut self, address: u32, word: u32) -> Result<(), MemoryError> {
        let start = self.check_range(address, 4)?;
        self.bytes[start..start + 4].copy_from_slice(&word.to_le_bytes());
        Ok(())
    }

    fn read_array<const N: usize>(&self, address: u32) -> Result<[u8; N], MemoryError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(address, N as u32)?);
        Ok(out)
    }

    pub fn read_int(&self, address: u32) -> Result<TypedValue, RuntimeError> {
        let raw = i32::from_le_bytes(self.read_array::<4>(address)?);
        Ok(TypedValue::lvalue(raw as f64, DataType::Int, address))
    }

    pub fn read_float(&self, address: u32) -> Result<TypedValue, RuntimeError> {
        let raw = f32::from_le_bytes(self.read_array::<4>(address)?);
        Ok(TypedValue::lvalue(raw as f64, DataType::Float, address))
    }

    pub fn read_char(&self, address: u32) -> Result<TypedValue, RuntimeError> {
        let raw = self.read_array::<1>(address)?[0] as i8;
        Ok(TypedValue::lvalue(raw as f64, DataType::Char, address))
    }

    pub fn read_pointer(
        &self,
        address: u32,
        pointer_type: &DataType,
    ) -> Result<TypedValue, RuntimeError> {
        let raw = u32::from_le_bytes(self.read_array::<4>(address)?);
        Ok(TypedValue::lvalue(raw as f64, pointer_type.clone(), address))
    }

    /// Read a value of type `ty` stored at `address`.
    ///
    /// Arrays and structs are not loaded: the result is an lvalue whose value is
    /// the address itself (array-to-pointer decay on read).
    pub fn read(&self, address: u32, ty: &DataType) -> Result<TypedValue, RuntimeError> {
        match ty {
            DataType::Int => self.read_int(address),
            DataType::Float => self.read_float(address),
            DataType::Char => self.read_char(address),
            DataType::Pointer(_) => self.read_pointer(address, ty),
            DataType::Array(..) | DataType::Struct(_) => {
                self.check_access(address, ty.size()?)?;
                Ok(TypedValue::lvalue(address as f64, ty.clone(), address))
            }
            DataType::Void | DataType::Function => Err(TypeError::NotDereferenceable {
                ty: ty.to_string(),
            }
            .into()),
        }
    }

    /// Store `value` at `address`, encoding it by its own type
    pub fn write_numeric(&mut self, address: u32, value: &TypedValue) -> Result<(), RuntimeError> {
        let raw = value.value();
        match value.data_type() {
            DataType::Int => self.write_bytes(address, &(raw as i64 as i32).to_le_bytes())?,
            DataType::Pointer(_) => {
                self.write_bytes(address, &(raw as i64 as u32).to_le_bytes())?
            }
            DataType::Float => self.write_bytes(address, &(raw as f32).to_le_bytes())?,
            DataType::Char => self.write_bytes(address, &[raw as i64 as i8 as u8])?,
            other => {
                return Err(TypeError::NotStorable {
                    ty: other.to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// Read a NUL-terminated string starting at `address`
    pub fn read_string(&self, address: u32) -> Result<String, MemoryError> {
        let start = self.check_access(address, 1)?;
        let tail = &self.bytes[start..];
        let len = tail
            .iter()
            .position(|&b| b == 0)
            .ok_or(MemoryError::UnterminatedString { address })?;
        Ok(tail[..len].iter().map(|&b| b as char).collect())
    }

    /// Copy a string plus its terminator to `address`
    pub fn write_string(&mut self, address: u32, text: &str) -> Result<(), MemoryError> {
        let mut data = encode_chars(text);
        data.push(0);
        self.write_bytes(address, &data)
    }

    /// Place a string literal in the read-only region.
    ///
    /// Identical text always maps to the same address. Surrounding quotes, if the
    /// producer left them on, are not stored.
    pub fn allocate_string_literal(&mut self, text: &str) -> Result<TypedValue, RuntimeError> {
        let body = literal_text(text);
        let char_ptr = DataType::Char.pointer_to();

        if let Some(&address) = self.literals.get(body) {
            return Ok(TypedValue::new(address as f64, char_ptr));
        }

        let mut data = encode_chars(body);
        data.push(0);
        let needed = data.len() as u32;
        let available = self.read_only_available();
        if needed > available {
            return Err(MemoryError::ReadOnlyExhausted {
                requested: needed,
                available,
            }
            .into());
        }

        let address = self.read_only_top;
        let start = address as usize;
        self.bytes[start..start + data.len()].copy_from_slice(&data);
        self.read_only_top += needed;
        self.literals.insert(body.to_string(), address);
        trace!("interned literal {:?} at 0x{:x}", body, address);

        Ok(TypedValue::new(address as f64, char_ptr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> Memory {
        Memory::new(&MemoryConfig {
            read_only_size: 64,
            heap_size: 256,
            stack_size: 128,
            stack_policy: StackPolicy::Reclaim,
        })
        .unwrap()
    }

    #[test]
    fn test_layout() {
        let memory = small();
        assert_eq!(memory.heap_bottom(), 64);
        assert_eq!(memory.stack_bottom(), 320);
        assert_eq!(memory.len(), 448);
    }

    #[test]
    fn test_typed_round_trip() {
        let mut memory = small();
        let addr = memory.stack_bottom();

        memory
            .write_numeric(addr, &TypedValue::new(-7.0, DataType::Int))
            .unwrap();
        assert_eq!(memory.read_int(addr).unwrap().value(), -7.0);

        memory
            .write_numeric(addr + 4, &TypedValue::new(1.5, DataType::Float))
            .unwrap();
        assert_eq!(memory.read_float(addr + 4).unwrap().value(), 1.5);

        memory
            .write_numeric(addr + 8, &TypedValue::new(-1.0, DataType::Char))
            .unwrap();
        let c = memory.read_char(addr + 8).unwrap();
        assert_eq!(c.value(), -1.0);
        assert_eq!(c.address(), Some(addr + 8));
    }

    #[test]
    fn test_read_only_protection() {
        let mut memory = small();
        let err = memory
            .write_numeric(8, &TypedValue::new(1.0, DataType::Int))
            .unwrap_err();
        assert_eq!(err, RuntimeError::Memory(MemoryError::ReadOnlyWrite { address: 8 }));
    }

    #[test]
    fn test_bounds_and_null() {
        let memory = small();
        assert!(matches!(
            memory.read_int(memory.len() - 2),
            Err(RuntimeError::Memory(MemoryError::OutOfBounds { .. }))
        ));
        assert_eq!(
            memory.read_char(0).unwrap_err(),
            RuntimeError::Memory(MemoryError::NullDereference)
        );
    }

    #[test]
    fn test_string_literals_are_interned() {
        let mut memory = small();
        let a = memory.allocate_string_literal("\"hi\"").unwrap();
        let b = memory.allocate_string_literal("hi").unwrap();
        let c = memory.allocate_string_literal("there").unwrap();

        assert_eq!(a.value(), b.value());
        assert_ne!(a.value(), c.value());
        assert_ne!(a.value(), 0.0);
        assert_eq!(a.data_type().to_string(), "char*");
        assert_eq!(memory.read_string(a.to_address()).unwrap(), "hi");
    }

    #[test]
    fn test_read_only_exhaustion() {
        let mut memory = small();
        let long = "x".repeat(100);
        assert!(matches!(
            memory.allocate_string_literal(&long),
            Err(RuntimeError::Memory(MemoryError::ReadOnlyExhausted { .. }))
        ));
    }

    #[test]
    fn test_unusable_layouts_are_rejected() {
        let config = |read_only_size, heap_size, stack_size| MemoryConfig {
            read_only_size,
            heap_size,
            stack_size,
            stack_policy: StackPolicy::Reclaim,
        };
        for bad in [
            config(64, 8, 64),
            config(0, 256, 64),
            config(64, 0x8000_0000, 64),
            config(0x8000_0000, 0x7000_0000, 0x2000_0000),
        ] {
            assert!(matches!(
                Memory::new(&bad),
                Err(MemoryError::InvalidLayout { .. })
            ));
        }
        assert!(Memory::new(&config(NULL_GUARD, 2 * TAG_LENGTH, 0)).is_ok());
    }

    #[test]
    fn test_strings_are_latin1() {
        let mut memory = small();
        let addr = memory.stack_bottom();
        memory.write_string(addr, "caf\u{e9} \u{263a}").unwrap();
        assert_eq!(memory.read_bytes(addr, 7).unwrap(), b"caf\xe9 ?\0");
        assert_eq!(memory.read_string(addr).unwrap(), "caf\u{e9} ?");
        assert_eq!(encode_chars("A\u{100}"), vec![b'A', b'?']);
    }
}
