//! Operand classes (§4.6): each has a tag byte; the reader verifies the
//! tag and returns a typed value. String-lists are read eagerly here
//! (the "lazy iterator" from the spec is realised at the `sieve-runtime`
//! layer, which drives `next_item` against a cursor into the same block —
//! this crate only guarantees the bytes are laid out so that is possible).

use std::io::{self, Read, Write};

use crate::varint::{read_cstring, read_offset, read_svarint, read_uvarint};
use crate::varint::{write_cstring, write_offset, write_svarint, write_uvarint};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperandTag {
    Number = 0x01,
    String = 0x02,
    StringList = 0x03,
    MatchType = 0x04,
    Comparator = 0x05,
    AddressPart = 0x06,
    SideEffect = 0x07,
    SideEffectList = 0x08,
    Variable = 0x09,
    Omitted = 0x0a,
    Offset = 0x0b,
}

impl OperandTag {
    pub fn from_byte(b: u8) -> Option<Self> {
        use OperandTag::*;
        Some(match b {
            0x01 => Number,
            0x02 => String,
            0x03 => StringList,
            0x04 => MatchType,
            0x05 => Comparator,
            0x06 => AddressPart,
            0x07 => SideEffect,
            0x08 => SideEffectList,
            0x09 => Variable,
            0x0a => Omitted,
            0x0b => Offset,
            _ => return None,
        })
    }
}

/// Byte that introduces the optional-operand sequence (§4.6): `0xFF`
/// prefix, `(uvarint code, operand)*`, terminated by `0x00`.
pub const OPTIONAL_OPERANDS_START: u8 = 0xff;
pub const OPTIONAL_OPERANDS_END: u8 = 0x00;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(u64),
    String(String),
    StringList(Vec<String>),
    MatchType(String),
    Comparator(String),
    AddressPart(String),
    SideEffect(String),
    SideEffectList(Vec<String>),
    Variable(String),
    Omitted,
    Offset(i32),
}

impl Operand {
    fn tag(&self) -> OperandTag {
        match self {
            Operand::Number(_) => OperandTag::Number,
            Operand::String(_) => OperandTag::String,
            Operand::StringList(_) => OperandTag::StringList,
            Operand::MatchType(_) => OperandTag::MatchType,
            Operand::Comparator(_) => OperandTag::Comparator,
            Operand::AddressPart(_) => OperandTag::AddressPart,
            Operand::SideEffect(_) => OperandTag::SideEffect,
            Operand::SideEffectList(_) => OperandTag::SideEffectList,
            Operand::Variable(_) => OperandTag::Variable,
            Operand::Omitted => OperandTag::Omitted,
            Operand::Offset(_) => OperandTag::Offset,
        }
    }

    pub fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&[self.tag() as u8])?;
        match self {
            Operand::Number(n) => write_uvarint(w, *n),
            Operand::String(s) => write_cstring(w, s),
            Operand::StringList(items) => {
                write_uvarint(w, items.len() as u64)?;
                for item in items {
                    write_cstring(w, item)?;
                }
                Ok(())
            }
            Operand::MatchType(s)
            | Operand::Comparator(s)
            | Operand::AddressPart(s)
            | Operand::SideEffect(s)
            | Operand::Variable(s) => write_cstring(w, s),
            Operand::SideEffectList(items) => {
                write_uvarint(w, items.len() as u64)?;
                for item in items {
                    write_cstring(w, item)?;
                }
                Ok(())
            }
            Operand::Omitted => Ok(()),
            Operand::Offset(delta) => write_offset(w, *delta),
        }
    }

    pub fn read<R: Read>(r: &mut R) -> io::Result<Self> {
        let mut tag_byte = [0u8; 1];
        r.read_exact(&mut tag_byte)?;
        let tag = OperandTag::from_byte(tag_byte[0])
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "unknown operand tag"))?;
        Ok(match tag {
            OperandTag::Number => Operand::Number(read_uvarint(r)?),
            OperandTag::String => Operand::String(read_cstring(r)?),
            OperandTag::StringList => {
                let n = read_uvarint(r)? as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(read_cstring(r)?);
                }
                Operand::StringList(items)
            }
            OperandTag::MatchType => Operand::MatchType(read_cstring(r)?),
            OperandTag::Comparator => Operand::Comparator(read_cstring(r)?),
            OperandTag::AddressPart => Operand::AddressPart(read_cstring(r)?),
            OperandTag::SideEffect => Operand::SideEffect(read_cstring(r)?),
            OperandTag::SideEffectList => {
                let n = read_uvarint(r)? as usize;
                let mut items = Vec::with_capacity(n);
                for _ in 0..n {
                    items.push(read_cstring(r)?);
                }
                Operand::SideEffectList(items)
            }
            OperandTag::Variable => Operand::Variable(read_cstring(r)?),
            OperandTag::Omitted => Operand::Omitted,
            OperandTag::Offset => Operand::Offset(read_offset(r)?),
        })
    }
}

/// A signed-varint relative reader for the rare operand that is not
/// length-tagged (kept distinct from `Operand::Offset`, which is the
/// fixed-width jump displacement used by control-flow operations).
pub fn read_relative<R: Read>(r: &mut R) -> io::Result<i64> {
    read_svarint(r)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(op: Operand) {
        let mut buf = Vec::new();
        op.write(&mut buf).unwrap();
        let mut cursor = &buf[..];
        assert_eq!(Operand::read(&mut cursor).unwrap(), op);
    }

    #[test]
    fn every_operand_kind_roundtrips() {
        roundtrip(Operand::Number(42));
        roundtrip(Operand::String("Junk".into()));
        roundtrip(Operand::StringList(vec!["a".into(), "b".into()]));
        roundtrip(Operand::MatchType(":matches".into()));
        roundtrip(Operand::Comparator("i;octet".into()));
        roundtrip(Operand::AddressPart(":domain".into()));
        roundtrip(Operand::SideEffect(":flags".into()));
        roundtrip(Operand::SideEffectList(vec!["\\Seen".into()]));
        roundtrip(Operand::Variable("1".into()));
        roundtrip(Operand::Omitted);
        roundtrip(Operand::Offset(-7));
    }
}
