//! The operand-consumption contract for each core opcode (§4.6: "a
//! block's cursor after dispatch equals the position recorded in its
//! operation's operand consumption contract").
//!
//! Shared by the disassembler (generic decode) and by `sieve-compile`'s
//! code generator, which emits operands for each opcode in exactly this
//! order. The interpreter in `sieve-runtime` reads the same operands by
//! hand, in the same order, rather than through this table — the schema
//! exists for introspection (`dump`, jump-locality validation), while the
//! interpreter's typed reads are the actual execution contract (§4.8).

use crate::operand::OperandTag;
use crate::opcode::Opcode;

pub fn operand_schema(op: Opcode) -> &'static [OperandTag] {
    use OperandTag::*;
    match op {
        Opcode::Jmp | Opcode::JmpTrue | Opcode::JmpFalse => &[Offset],
        Opcode::Stop => &[],
        Opcode::True | Opcode::False => &[],
        Opcode::Address => &[Comparator, MatchType, AddressPart, StringList, StringList],
        Opcode::Header => &[Comparator, MatchType, StringList, StringList],
        Opcode::Exists => &[StringList],
        Opcode::SizeOver | Opcode::SizeUnder => &[Number],
        Opcode::Envelope => &[Comparator, MatchType, AddressPart, StringList, StringList],
        Opcode::Body => &[Comparator, MatchType, String, StringList],
        Opcode::HasFlag => &[Comparator, MatchType, StringList, StringList],
        Opcode::StringTest => &[Comparator, MatchType, StringList, StringList],
        Opcode::Keep => &[SideEffectList],
        Opcode::Discard => &[],
        Opcode::Redirect => &[String, SideEffectList],
        Opcode::FileInto => &[String, SideEffectList],
        Opcode::Reject => &[String],
        Opcode::Vacation => &[String, String, String, Number, SideEffectList],
        Opcode::Notify => &[String, StringList, String],
        Opcode::AddHeader => &[String, String],
        Opcode::DeleteHeader => &[String],
        Opcode::SetFlag | Opcode::AddFlag | Opcode::RemoveFlag => &[StringList],
        Opcode::Include => &[String],
        Opcode::Return => &[],
        Opcode::Set => &[String, String],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jump_opcodes_carry_exactly_one_offset() {
        for op in [Opcode::Jmp, Opcode::JmpTrue, Opcode::JmpFalse] {
            assert_eq!(operand_schema(op), &[OperandTag::Offset]);
        }
    }

    #[test]
    fn stop_and_discard_carry_no_operands() {
        assert!(operand_schema(Opcode::Stop).is_empty());
        assert!(operand_schema(Opcode::Discard).is_empty());
    }
}
