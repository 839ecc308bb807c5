//! Lexical scopes and activation records
//!
//! A [`Frame`] maps names to storage. Frames form a chain through borrowed parent
//! references, so a child can never outlive the scope it was opened in:
//!
//! ```text
//! root (builtins) <- program (globals, functions) <- activation <- block <- ...
//! ```
//!
//! Every frame in a run shares one [`Memory`]. Each frame owns a stack cursor
//! (`stack_top`) that starts where its parent's cursor was and advances on every
//! declaration. When a scope is closed its final cursor is handed back to the
//! parent according to the memory's [`StackPolicy`].

use super::value::TypedValue;
use super::{Memory, StackPolicy};
use crate::ast::FunctionDef;
use crate::interpreter::builtins::Builtin;
use crate::interpreter::constants::WORD_SIZE;
use crate::interpreter::errors::{MemoryError, RuntimeError, TypeError};
use crate::types::DataType;
use rustc_hash::FxHashMap;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;
use tracing::trace;

/// Something that can be called by name
#[derive(Debug, Clone)]
pub enum Callable {
    User(Rc<FunctionDef>),
    Builtin(Builtin),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::User(def) => &def.name,
            Callable::Builtin(b) => b.name(),
        }
    }

    pub fn signature(&self) -> String {
        match self {
            Callable::User(def) => def.signature(),
            Callable::Builtin(b) => b.signature(),
        }
    }

    /// Prototypes are not defined; builtins always are
    pub fn is_defined(&self) -> bool {
        match self {
            Callable::User(def) => def.is_defined(),
            Callable::Builtin(_) => true,
        }
    }
}

/// Where a name lives
#[derive(Debug, Clone)]
pub enum Storage {
    /// Stack slot address
    Stack(u32),
    Function(Callable),
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub data_type: DataType,
    pub storage: Storage,
}

/// Result of resolving a name
#[derive(Debug, Clone)]
pub enum Resolved {
    Value(TypedValue),
    Function(Callable),
}

/// One scope in the chain
#[derive(Debug)]
pub struct Frame<'p> {
    parent: Option<&'p Frame<'p>>,
    memory: Rc<RefCell<Memory>>,
    bindings: FxHashMap<String, Binding>,
    /// Declaration order, for inspection
    order: Vec<String>,
    /// Cursor at the time this frame was opened
    base: u32,
    stack_top: u32,
    depth: usize,
}

impl<'p> Frame<'p> {
    /// The outermost frame. Its stack starts at the bottom of the stack region.
    pub fn root(memory: Rc<RefCell<Memory>>) -> Self {
        let bottom = memory.borrow().stack_bottom();
        Frame {
            parent: None,
            memory,
            bindings: FxHashMap::default(),
            order: Vec::new(),
            base: bottom,
            stack_top: bottom,
            depth: 0,
        }
    }

    fn child_of<'a>(parent: &'a Frame<'a>, base: u32) -> Frame<'a> {
        Frame {
            parent: Some(parent),
            memory: Rc::clone(&parent.memory),
            bindings: FxHashMap::default(),
            order: Vec::new(),
            base,
            stack_top: base,
            depth: parent.depth + 1,
        }
    }

    /// Open a nested block scope
    pub fn extend(&self) -> Frame<'_> {
        trace!("enter scope depth {}", self.depth + 1);
        Frame::child_of(self, self.stack_top)
    }

    /// Open an activation record for a function call made from this frame.
    ///
    /// The callee sees the program scope, not the caller's locals, but its stack
    /// slots start above the caller's.
    pub fn activation(&self) -> Frame<'_> {
        let scope = self.program_scope();
        trace!("enter activation at 0x{:x}", self.stack_top);
        Frame::child_of(scope, self.stack_top)
    }

    /// The frame holding globals and functions (depth 1), or the root itself
    pub fn program_scope(&self) -> &Frame<'_> {
        let mut scope: &Frame<'_> = self;
        while scope.depth > 1 {
            match scope.parent {
                Some(parent) => scope = parent,
                None => break,
            }
        }
        scope
    }

    /// Consume this frame and return the cursor its opener should continue from
    pub fn close(self) -> u32 {
        let top = match self.memory.borrow().stack_policy() {
            StackPolicy::Reclaim => self.base,
            StackPolicy::GrowOnly => self.stack_top,
        };
        trace!("exit scope depth {}, stack top 0x{:x}", self.depth, top);
        top
    }

    /// Continue from the cursor returned by a closed child
    pub fn reclaim(&mut self, top: u32) {
        self.stack_top = top;
    }

    pub fn parent(&self) -> Option<&Frame<'_>> {
        self.parent
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn stack_top(&self) -> u32 {
        self.stack_top
    }

    pub fn memory(&self) -> Ref<'_, Memory> {
        self.memory.borrow()
    }

    pub fn memory_mut(&self) -> RefMut<'_, Memory> {
        self.memory.borrow_mut()
    }

    pub fn shared_memory(&self) -> Rc<RefCell<Memory>> {
        Rc::clone(&self.memory)
    }

    /// Names declared in this scope, in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }

    /// Binding declared directly in this scope
    pub fn local(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Nearest binding for `name`, innermost scope first
    pub fn find(&self, name: &str) -> Option<&Binding> {
        let mut scope: &Frame<'_> = self;
        loop {
            if let Some(binding) = scope.bindings.get(name) {
                return Some(binding);
            }
            scope = scope.parent?;
        }
    }

    fn bind(&mut self, name: &str, binding: Binding) {
        if self.bindings.insert(name.to_string(), binding).is_none() {
            self.order.push(name.to_string());
        }
    }

    /// Claim a zero-filled stack slot for `name` and return it as an lvalue.
    ///
    /// Any existing binding of `name` in this scope is a redefinition, a function
    /// binding included. Shadowing a name from an outer scope is allowed.
    pub fn declare_variable(
        &mut self,
        name: &str,
        ty: DataType,
    ) -> Result<TypedValue, RuntimeError> {
        if self.bindings.contains_key(name) {
            return Err(TypeError::Redefinition {
                name: name.to_string(),
            }
            .into());
        }
        if matches!(ty, DataType::Void | DataType::Function) {
            return Err(TypeError::IncompleteType { ty: ty.to_string() }.into());
        }

        let end = self.memory.borrow().len();
        let size = match ty.size() {
            Err(RuntimeError::Type(TypeError::TooLarge { .. })) => {
                return Err(MemoryError::StackOverflow {
                    requested: u32::MAX,
                    available: end.saturating_sub(self.stack_top),
                }
                .into())
            }
            size => size?,
        };
        let element_size = ty.element_size()?;
        let mut address = self.stack_top;
        if address % WORD_SIZE + element_size > WORD_SIZE {
            address = address.div_ceil(WORD_SIZE) * WORD_SIZE;
        }

        if address as u64 + size as u64 > end as u64 {
            return Err(MemoryError::StackOverflow {
                requested: size,
                available: end.saturating_sub(address),
            }
            .into());
        }

        let value = {
            let mut memory = self.memory.borrow_mut();
            memory.fill(address, size, 0)?;
            memory.read(address, &ty)?
        };

        trace!("declare {} {} at 0x{:x}", ty, name, address);
        self.bind(
            name,
            Binding {
                data_type: ty,
                storage: Storage::Stack(address),
            },
        );
        self.stack_top = address + size;
        Ok(value)
    }

    /// Bind a function. A prototype may be followed by one matching definition.
    pub fn declare_function(&mut self, name: &str, callable: Callable) -> Result<(), RuntimeError> {
        match self.bindings.get(name).map(|b| &b.storage) {
            Some(Storage::Stack(_)) => {
                return Err(TypeError::Redefinition {
                    name: name.to_string(),
                }
                .into())
            }
            Some(Storage::Function(existing)) => {
                let (old, new) = (existing.signature(), callable.signature());
                if old != new {
                    return Err(TypeError::ConflictingSignature {
                        name: name.to_string(),
                        existing: old,
                        new,
                    }
                    .into());
                }
                if existing.is_defined() && callable.is_defined() {
                    return Err(TypeError::Redefinition {
                        name: name.to_string(),
                    }
                    .into());
                }
                if !callable.is_defined() {
                    // A late prototype never replaces a definition
                    return Ok(());
                }
            }
            None => {}
        }

        trace!("declare function {}", name);
        self.bind(
            name,
            Binding {
                data_type: DataType::Function,
                storage: Storage::Function(callable),
            },
        );
        Ok(())
    }

    /// Resolve `name` through the scope chain
    pub fn lookup(&self, name: &str) -> Result<Resolved, RuntimeError> {
        let binding = self.find(name).ok_or_else(|| TypeError::UndeclaredSymbol {
            name: name.to_string(),
        })?;
        match &binding.storage {
            Storage::Stack(address) => Ok(Resolved::Value(
                self.memory.borrow().read(*address, &binding.data_type)?,
            )),
            Storage::Function(callable) => Ok(Resolved::Function(callable.clone())),
        }
    }

    pub fn lookup_value(&self, name: &str) -> Result<TypedValue, RuntimeError> {
        match self.lookup(name)? {
            Resolved::Value(value) => Ok(value),
            Resolved::Function(_) => Err(TypeError::NotAValue {
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub fn lookup_function(&self, name: &str) -> Result<Callable, RuntimeError> {
        match self.lookup(name)? {
            Resolved::Function(callable) => Ok(callable),
            Resolved::Value(_) => Err(TypeError::NotCallable {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Declared type of `name`, without reading memory
    pub fn binding_type(&self, name: &str) -> Result<DataType, RuntimeError> {
        self.find(name)
            .map(|b| b.data_type.clone())
            .ok_or_else(|| {
                TypeError::UndeclaredSymbol {
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Convert `value` to the variable's type and store it
    pub fn assign_value(&self, name: &str, value: &TypedValue) -> Result<(), RuntimeError> {
        let binding = self.find(name).ok_or_else(|| TypeError::UndeclaredSymbol {
            name: name.to_string(),
        })?;
        match &binding.storage {
            Storage::Stack(address) => {
                self.assign_value_by_address(*address, &binding.data_type, value)
            }
            Storage::Function(_) => Err(TypeError::NotAValue {
                name: name.to_string(),
            }
            .into()),
        }
    }

    /// Convert `value` to `ty` and store it at `address`
    pub fn assign_value_by_address(
        &self,
        address: u32,
        ty: &DataType,
        value: &TypedValue,
    ) -> Result<(), RuntimeError> {
        let converted = value.implicit_cast(ty)?;
        self.memory.borrow_mut().write_numeric(address, &converted)
    }

    pub fn dereference(&self, pointer: &TypedValue) -> Result<TypedValue, RuntimeError> {
        pointer.dereference(self)
    }

    /// Read the NUL-terminated string a `char*` or `char[]` refers to
    pub fn dereference_as_string(&self, pointer: &TypedValue) -> Result<String, RuntimeError> {
        if !pointer.data_type().is_pointer_like() {
            return Err(TypeError::NotDereferenceable {
                ty: pointer.data_type().to_string(),
            }
            .into());
        }
        Ok(self.memory.borrow().read_string(pointer.to_address())?)
    }

    pub fn allocate_on_heap(&self, size: i64) -> Result<TypedValue, RuntimeError> {
        self.memory.borrow_mut().allocate(size)
    }

    pub fn free(&self, pointer: &TypedValue) -> Result<(), RuntimeError> {
        self.memory.borrow_mut().free(pointer.to_address())
    }

    pub fn allocate_string_literal(&self, text: &str) -> Result<TypedValue, RuntimeError> {
        self.memory.borrow_mut().allocate_string_literal(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Param, SourceLocation};
    use crate::memory::MemoryConfig;

    fn memory(policy: StackPolicy) -> Rc<RefCell<Memory>> {
        Rc::new(RefCell::new(Memory::new(&MemoryConfig {
            read_only_size: 64,
            heap_size: 128,
            stack_size: 64,
            stack_policy: policy,
        })
        .unwrap()))
    }

    fn function(name: &str, params: Vec<Param>, defined: bool) -> Callable {
        Callable::User(Rc::new(FunctionDef {
            name: name.to_string(),
            return_type: DataType::Int,
            params,
            body: defined.then(Vec::new),
            location: SourceLocation::default(),
        }))
    }

    #[test]
    fn test_slots_are_aligned() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        let bottom = frame.stack_top();

        let c = frame.declare_variable("c", DataType::Char).unwrap();
        let i = frame.declare_variable("i", DataType::Int).unwrap();
        let d = frame.declare_variable("d", DataType::Char).unwrap();
        let s = frame
            .declare_variable("s", DataType::Char.array_of(&[3]))
            .unwrap();

        assert_eq!(c.address(), Some(bottom));
        assert_eq!(i.address(), Some(bottom + 4));
        assert_eq!(d.address(), Some(bottom + 8));
        // char elements never straddle a word, so the array packs right after
        assert_eq!(s.address(), Some(bottom + 9));
        assert_eq!(frame.stack_top(), bottom + 12);
        assert_eq!(frame.names().collect::<Vec<_>>(), vec!["c", "i", "d", "s"]);
    }

    #[test]
    fn test_redefinition_in_same_scope_only() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        frame.declare_variable("x", DataType::Int).unwrap();
        assert!(matches!(
            frame.declare_variable("x", DataType::Char),
            Err(RuntimeError::Type(TypeError::Redefinition { .. }))
        ));

        let mut inner = frame.extend();
        let shadow = inner.declare_variable("x", DataType::Char).unwrap();
        assert_eq!(inner.lookup_value("x").unwrap().address(), shadow.address());
        assert_eq!(inner.binding_type("x").unwrap(), DataType::Char);
    }

    #[test]
    fn test_incomplete_variable_types() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        assert!(matches!(
            frame.declare_variable("v", DataType::Void),
            Err(RuntimeError::Type(TypeError::IncompleteType { .. }))
        ));
        assert!(matches!(
            frame.declare_variable("f", DataType::Function),
            Err(RuntimeError::Type(TypeError::IncompleteType { .. }))
        ));
    }

    #[test]
    fn test_lookup_walks_the_chain() {
        let mut root = Frame::root(memory(StackPolicy::Reclaim));
        root.declare_variable("g", DataType::Int).unwrap();
        root.assign_value("g", &TypedValue::literal(7.0)).unwrap();

        let inner = root.extend();
        let innermost = inner.extend();
        assert_eq!(innermost.depth(), 2);
        assert_eq!(innermost.lookup_value("g").unwrap().value(), 7.0);
        assert!(matches!(
            innermost.lookup("missing"),
            Err(RuntimeError::Type(TypeError::UndeclaredSymbol { .. }))
        ));
    }

    #[test]
    fn test_arrays_read_as_their_address() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        let arr = frame
            .declare_variable("arr", DataType::Int.array_of(&[4]))
            .unwrap();
        let read = frame.lookup_value("arr").unwrap();
        assert_eq!(read.value(), arr.address().unwrap() as f64);
        assert_eq!(read.address(), arr.address());
    }

    #[test]
    fn test_function_declarations() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        let int_param = || vec![Param::new("a", DataType::Int)];

        frame
            .declare_function("f", function("f", int_param(), false))
            .unwrap();
        frame
            .declare_function("f", function("f", int_param(), true))
            .unwrap();
        assert!(frame.lookup_function("f").unwrap().is_defined());

        assert!(matches!(
            frame.declare_function("f", function("f", int_param(), true)),
            Err(RuntimeError::Type(TypeError::Redefinition { .. }))
        ));
        assert!(matches!(
            frame.declare_function("f", function("f", vec![], false)),
            Err(RuntimeError::Type(TypeError::ConflictingSignature { .. }))
        ));
        assert!(matches!(
            frame.lookup_value("f"),
            Err(RuntimeError::Type(TypeError::NotAValue { .. }))
        ));

        frame.declare_variable("v", DataType::Int).unwrap();
        assert!(matches!(
            frame.declare_function("v", function("v", vec![], true)),
            Err(RuntimeError::Type(TypeError::Redefinition { .. }))
        ));
        assert!(matches!(
            frame.lookup_function("v"),
            Err(RuntimeError::Type(TypeError::NotCallable { .. }))
        ));

        // A variable may not take the name of a function in the same scope
        assert!(matches!(
            frame.declare_variable("f", DataType::Int),
            Err(RuntimeError::Type(TypeError::Redefinition { .. }))
        ));
    }

    #[test]
    fn test_stack_overflow() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        frame
            .declare_variable("big", DataType::Int.array_of(&[12]))
            .unwrap();
        assert!(matches!(
            frame.declare_variable("more", DataType::Int.array_of(&[8])),
            Err(RuntimeError::Memory(MemoryError::StackOverflow {
                requested: 32,
                available: 16
            }))
        ));
    }

    #[test]
    fn test_array_too_large_for_address_space() {
        let mut frame = Frame::root(memory(StackPolicy::Reclaim));
        let top = frame.stack_top();
        assert!(matches!(
            frame.declare_variable("big", DataType::Int.array_of(&[1 << 30])),
            Err(RuntimeError::Memory(MemoryError::StackOverflow { .. }))
        ));
        assert_eq!(frame.stack_top(), top);
        assert!(frame.local("big").is_none());
    }

    #[test]
    fn test_closed_scope_is_reclaimed() {
        let mut root = Frame::root(memory(StackPolicy::Reclaim));
        root.declare_variable("a", DataType::Int).unwrap();
        let before = root.stack_top();

        let top = {
            let mut inner = root.extend();
            inner.declare_variable("b", DataType::Int).unwrap();
            inner.close()
        };
        root.reclaim(top);
        assert_eq!(root.stack_top(), before);
    }

    #[test]
    fn test_grow_only_keeps_cursor() {
        let mut root = Frame::root(memory(StackPolicy::GrowOnly));
        let before = root.stack_top();

        let top = {
            let mut inner = root.extend();
            inner.declare_variable("b", DataType::Int).unwrap();
            inner.close()
        };
        root.reclaim(top);
        assert_eq!(root.stack_top(), before + 4);
    }

    #[test]
    fn test_activation_sees_program_scope_only() {
        let root = Frame::root(memory(StackPolicy::Reclaim));
        let mut program = root.extend();
        program.declare_variable("global", DataType::Int).unwrap();

        let mut caller = program.activation();
        caller.declare_variable("local", DataType::Int).unwrap();
        let block = caller.extend();

        let callee = block.activation();
        assert_eq!(callee.depth(), 2);
        assert_eq!(callee.base(), block.stack_top());
        assert!(callee.lookup_value("global").is_ok());
        assert!(callee.lookup_value("local").is_err());
    }

    #[test]
    fn test_fresh_slots_are_zeroed() {
        let mut root = Frame::root(memory(StackPolicy::Reclaim));
        let top = {
            let mut inner = root.extend();
            inner.declare_variable("x", DataType::Int).unwrap();
            inner.assign_value("x", &TypedValue::literal(99.0)).unwrap();
            inner.close()
        };
        root.reclaim(top);

        let y = root.declare_variable("y", DataType::Int).unwrap();
        assert_eq!(y.value(), 0.0);
    }

    #[test]
    fn test_heap_and_strings_through_frame() {
        let frame = Frame::root(memory(StackPolicy::Reclaim));
        let lit = frame.allocate_string_literal("abc").unwrap();
        assert_eq!(frame.dereference_as_string(&lit).unwrap(), "abc");

        let p = frame.allocate_on_heap(4).unwrap();
        frame.free(&p).unwrap();
        assert!(frame.free(&p).is_err());
        assert!(frame
            .dereference_as_string(&TypedValue::literal(5.0))
            .is_err());
    }
}
