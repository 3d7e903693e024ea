//! Disassembler: renders a block's operations as human-readable text, the
//! `dump` half of each operation's `{dump, execute}` pair (§4.6).

use std::fmt::Write as _;
use std::io::Cursor;

use crate::binary::{Binary, Block};
use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::schema::operand_schema;

/// One decoded operation, as produced by [`disassemble_block`].
#[derive(Debug, Clone)]
pub struct DecodedOp {
    pub offset: usize,
    pub opcode: Opcode,
    pub operands: Vec<Operand>,
}

/// Decode every core operation in `block` in order. Stops (without error)
/// at the first extension opcode, matching `Binary::validate_jumps`: this
/// crate does not know extension operand schemas.
pub fn disassemble_block(block: &Block) -> Vec<DecodedOp> {
    let mut out = Vec::new();
    let len = block.payload.len();
    let mut cur = Cursor::new(&block.payload[..]);
    loop {
        let offset = cur.position() as usize;
        if offset >= len {
            break;
        }
        let mut tag = [0u8; 1];
        if std::io::Read::read_exact(&mut cur, &mut tag).is_err() {
            break;
        }
        if tag[0] & Opcode::EXT_TAG_BIT != 0 {
            break;
        }
        let Some(opcode) = Opcode::from_tag(tag[0]) else {
            break;
        };
        let mut operands = Vec::new();
        let mut failed = false;
        for _ in operand_schema(opcode) {
            match Operand::read(&mut cur) {
                Ok(op) => operands.push(op),
                Err(_) => {
                    failed = true;
                    break;
                }
            }
        }
        if failed {
            break;
        }
        out.push(DecodedOp {
            offset,
            opcode,
            operands,
        });
    }
    out
}

/// Render a full textual dump of every block in `binary`, used by the
/// `sieve` CLI's `dump` subcommand (§6).
pub fn dump_binary(binary: &Binary) -> String {
    let mut out = String::new();
    writeln!(out, "; script: {}", binary.metadata.script_name).unwrap();
    for ext in &binary.ext_table {
        writeln!(
            out,
            "; require {} v{}.{} (block {})",
            ext.name, ext.version.0, ext.version.1, ext.block_id
        )
        .unwrap();
    }
    for (id, block) in binary.blocks.iter().enumerate() {
        writeln!(out, "block {id}:").unwrap();
        for op in disassemble_block(block) {
            write!(out, "  {:>4}: {:?}", op.offset, op.opcode).unwrap();
            for operand in &op.operands {
                write!(out, " {operand:?}").unwrap();
            }
            writeln!(out).unwrap();
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operand::Operand;

    #[test]
    fn disassembles_a_keep_with_no_side_effects() {
        let mut block = Block::default();
        Operand::StringList(vec![]).write(&mut block.payload).unwrap();
        block.payload.insert(0, Opcode::Keep.tag());
        let ops = disassemble_block(&block);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].opcode, Opcode::Keep);
    }

    #[test]
    fn dump_includes_script_name_and_require_lines() {
        let mut binary = Binary::new();
        binary.metadata.script_name = "filter".into();
        binary.ext_table.push(crate::binary::ExtTableEntry {
            name: "fileinto".into(),
            version: (1, 0),
            block_id: 0,
        });
        let text = dump_binary(&binary);
        assert!(text.contains("script: filter"));
        assert!(text.contains("require fileinto"));
    }
}
