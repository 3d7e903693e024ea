#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Binary container format, varint/offset codec and disassembler for
//! compiled Sieve scripts (spec.md §4.6).
//!
//! Layers:
//! - [`varint`]: the wire primitives (`uvarint`, signed `varint`,
//!   `cstring`, fixed-width jump `offset`).
//! - [`opcode`]/[`operand`]/[`schema`]: the operation and operand wire
//!   formats and the per-opcode operand-consumption contract.
//! - [`binary`]: the `Binary` container itself — header, extension
//!   table, blocks, script metadata — with save/load.
//! - [`writer`]: two-phase block emission with jump-label patching, used
//!   by `sieve-compile`'s code generator.
//! - [`dump`]: the disassembler.

pub mod binary;
pub mod dump;
pub mod error;
pub mod header;
pub mod opcode;
pub mod operand;
pub mod schema;
pub mod varint;
pub mod writer;

pub use binary::{Binary, Block, ExtTableEntry, ScriptMetadata, MAIN_BLOCK_ID};
pub use dump::{disassemble_block, dump_binary, DecodedOp};
pub use error::{BytecodeError, Result};
pub use opcode::{OpTag, Opcode};
pub use operand::{Operand, OperandTag};
pub use writer::{BlockWriter, Label};
