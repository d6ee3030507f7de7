//! Register spans
//!
//! A span is a lazy view of a register file restricted to an index list,
//! such as a kernel's arguments or a function's inputs.
//!
//! ```text
//! indices: [3, 0]
//! regs:    r0  r1  r2  r3
//!           ^           ^
//!          span[1]    span[0]
//! ```
//!
//! Indices are checked by `verify_executable` when an executable is loaded,
//! so spans index the register file directly.

use crate::bytecode::RegIndex;
use crate::vm::value::Value;

/// Read-only view of selected registers
#[derive(Debug, Clone, Copy)]
pub struct RegisterSpan<'a> {
    indices: &'a [RegIndex],
    regs: &'a [Value],
}

impl<'a> RegisterSpan<'a> {
    /// Create a span over `regs` selected by `indices`
    pub fn new(indices: &'a [RegIndex], regs: &'a [Value]) -> Self {
        Self { indices, regs }
    }

    /// Number of registers in the span
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the span is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Get the `i`-th register of the span
    #[inline]
    pub fn get(&self, i: usize) -> &'a Value {
        &self.regs[self.indices[i] as usize]
    }

    /// Iterate over the selected registers in index-list order
    pub fn iter(&self) -> impl Iterator<Item = &'a Value> + 'a {
        let regs = self.regs;
        self.indices.iter().map(move |&i| &regs[i as usize])
    }
}

/// Mutable view of selected registers
///
/// Hands out one register at a time, since an index list may name the same
/// register twice.
#[derive(Debug)]
pub struct RegisterSpanMut<'a> {
    indices: &'a [RegIndex],
    regs: &'a mut [Value],
}

impl<'a> RegisterSpanMut<'a> {
    /// Create a mutable span over `regs` selected by `indices`
    pub fn new(indices: &'a [RegIndex], regs: &'a mut [Value]) -> Self {
        Self { indices, regs }
    }

    /// Number of registers in the span
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Check if the span is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Get the `i`-th register of the span
    #[inline]
    pub fn get(&self, i: usize) -> &Value {
        &self.regs[self.indices[i] as usize]
    }

    /// Mutably get the `i`-th register of the span
    #[inline]
    pub fn get_mut(&mut self, i: usize) -> &mut Value {
        &mut self.regs[self.indices[i] as usize]
    }

    /// Overwrite the `i`-th register of the span
    #[inline]
    pub fn set(&mut self, i: usize, value: Value) {
        self.regs[self.indices[i] as usize] = value;
    }

    /// Reborrow as a read-only span
    pub fn as_span(&self) -> RegisterSpan<'_> {
        RegisterSpan::new(self.indices, &*self.regs)
    }
}
