//! Incremental bytecode emission.
//!
//! `CodeBuilder` wraps a [`Code`] under construction and provides the
//! emit/patch-jump API the compiler drives directly. Jump operands are
//! unsigned distances: forward jumps are measured from the byte immediately
//! after the operand; `emit_jump_by` (used for `JUMP_BACK`) computes the
//! equivalent backward distance from a known target.

use crate::{bytecode::code::Code, bytecode::op::Opcode, value::Value};

/// A forward-jump site awaiting `patch_jump`.
#[derive(Debug, Clone, Copy)]
pub struct JumpLabel(usize);

pub struct CodeBuilder {
    code: Code,
    current_line: i32,
}

impl Default for CodeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            code: Code::new(),
            current_line: 0,
        }
    }

    pub fn set_location(&mut self, line: i32) {
        self.current_line = line;
    }

    #[must_use]
    pub fn current_offset(&self) -> usize {
        self.code.len()
    }

    pub fn emit_byte(&mut self, byte: u8) {
        self.code.push_byte(byte, self.current_line);
    }

    pub fn emit(&mut self, op: Opcode) {
        self.emit_byte(op as u8);
    }

    pub fn emit_u8(&mut self, op: Opcode, operand: u8) {
        self.emit(op);
        self.emit_byte(operand);
    }

    pub fn emit_short(&mut self, value: u16) {
        let [hi, lo] = value.to_le_bytes();
        self.emit_byte(hi);
        self.emit_byte(lo);
    }

    pub fn emit_u16(&mut self, op: Opcode, operand: u16) {
        self.emit(op);
        self.emit_short(operand);
    }

    /// Emits `op` followed by a placeholder forward-jump operand, returning a
    /// label to pass to `patch_jump` once the jump target is known.
    pub fn emit_jump(&mut self, op: Opcode) -> JumpLabel {
        self.emit(op);
        let label = JumpLabel(self.code.len());
        self.emit_short(0xFFFF);
        label
    }

    /// Patches a forward jump emitted by `emit_jump` to land at the current
    /// offset.
    ///
    /// # Panics
    /// Panics if the jump distance exceeds `u16::MAX` (function too large).
    pub fn patch_jump(&mut self, label: JumpLabel) {
        let distance = self.code.len() - (label.0 + 2);
        let distance = u16::try_from(distance).expect("jump offset exceeds u16 range; function too large");
        self.code.patch_u16(label.0, distance);
    }

    /// Emits a known-target backward jump (`JUMP_BACK`), used to close loops.
    ///
    /// # Panics
    /// Panics if the jump distance exceeds `u16::MAX`.
    pub fn emit_jump_by(&mut self, op: Opcode, target: usize) {
        self.emit(op);
        let after_operand = self.code.len() + 2;
        let distance = after_operand - target;
        let distance = u16::try_from(distance).expect("jump offset exceeds u16 range; function too large");
        self.emit_short(distance);
    }

    /// Adds `value` to the constant pool, returning its index.
    ///
    /// # Panics
    /// Panics if the constant pool exceeds 65536 entries.
    pub fn add_const(&mut self, value: Value) -> u16 {
        self.code.add_constant(value)
    }

    #[must_use]
    pub fn build(self) -> Code {
        self.code
    }
}
