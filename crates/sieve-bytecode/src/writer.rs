//! Two-phase block emission for the code generator (§4.7 Design Note):
//! write operations as the AST is walked, reserving a fixed-width
//! [`crate::varint::OFFSET_WIDTH`] slot at every jump placeholder and
//! patching the final delta once the jump target is known. Mirrors
//! `plotnik-compiler`'s `Label`-based two-phase layout (`emit/layout.rs`).

use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::varint::{write_offset, OFFSET_WIDTH};

/// An unresolved jump target within one block, created by
/// [`BlockWriter::emit_jump_placeholder`] and resolved later by
/// [`BlockWriter::resolve`] or [`BlockWriter::resolve_here`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Label(usize);

pub struct BlockWriter {
    buf: Vec<u8>,
}

impl Default for BlockWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn position(&self) -> usize {
        self.buf.len()
    }

    pub fn emit_opcode(&mut self, op: Opcode) {
        self.buf.push(op.tag());
    }

    pub fn emit_operand(&mut self, operand: &Operand) {
        operand.write(&mut self.buf).expect("writing to a Vec never fails");
    }

    /// Reserve a fixed-width offset slot (written as `0` for now) and
    /// return a [`Label`] identifying its position for later patching.
    pub fn emit_jump_placeholder(&mut self) -> Label {
        let label = Label(self.buf.len());
        Operand::Offset(0)
            .write(&mut self.buf)
            .expect("writing to a Vec never fails");
        label
    }

    /// Patch `label`'s offset so it targets `target_pos` (an absolute
    /// byte position in this block). The delta is relative to the byte
    /// immediately following the offset's own encoding (§4.6).
    pub fn resolve(&mut self, label: Label, target_pos: usize) {
        let tag_and_offset_start = label.0;
        let offset_value_start = tag_and_offset_start + 1; // past the operand's own tag byte
        let site_end = offset_value_start + OFFSET_WIDTH;
        let delta = target_pos as i64 - site_end as i64;
        let delta: i32 = delta
            .try_into()
            .expect("block sizes fit comfortably within i32 range");
        let mut patched = Vec::with_capacity(1 + OFFSET_WIDTH);
        patched.push(crate::operand::OperandTag::Offset as u8);
        write_offset(&mut patched, delta).expect("writing to a Vec never fails");
        self.buf[tag_and_offset_start..site_end].copy_from_slice(&patched);
    }

    /// Convenience: resolve `label` to the writer's current position.
    pub fn resolve_here(&mut self, label: Label) {
        let here = self.position();
        self.resolve(label, here);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_placeholder_resolves_to_correct_delta() {
        let mut w = BlockWriter::new();
        w.emit_opcode(Opcode::JmpFalse);
        let label = w.emit_jump_placeholder();
        w.emit_opcode(Opcode::Keep);
        w.emit_operand(&Operand::SideEffectList(vec![]));
        w.resolve_here(label);
        w.emit_opcode(Opcode::Stop);

        let bytes = w.into_bytes();
        let mut cur = std::io::Cursor::new(&bytes[..]);
        let mut tag = [0u8; 1];
        std::io::Read::read_exact(&mut cur, &mut tag).unwrap();
        assert_eq!(tag[0], Opcode::JmpFalse.tag());
        let operand = Operand::read(&mut cur).unwrap();
        let Operand::Offset(delta) = operand else {
            panic!("expected offset")
        };
        let site = cur.position() as i64;
        let target = site + delta as i64;
        // Target must land exactly where Stop begins.
        assert_eq!(target as usize, bytes.len() - 1);
    }
}
