//! The compiled artifact (§3 "Binary", §4.6).
//!
//! Layout:
//! ```text
//! header
//! ext_table_size: uvarint
//! ext_table:      N x { name: cstring, version: uvarint, block_id: uvarint }
//! block_count:    uvarint
//! blocks:         M x { byte_length: uvarint, payload: [u8] }
//! script_metadata: { driver_name, storage_version, storage_name, script_name, driver_data }
//! ```
//!
//! Grounded in `plotnik-bytecode`'s `Module`: a header-plus-sections file
//! format with a CRC over everything after the header, saved via
//! temp-file-plus-rename (`sieve-file-storage-save.c`'s atomic-replace
//! idiom) and loaded either by `memmap2::Mmap` or a plain read for small
//! inputs.

use std::fs::{self, File};
use std::io::{self, Cursor, Read, Write};
use std::path::Path;

use crc32fast::Hasher;

use crate::error::{BytecodeError, Result};
use crate::header::{Header, HEADER_LEN};
use crate::opcode::Opcode;
use crate::operand::Operand;
use crate::schema::operand_schema;
use crate::varint::{read_cstring, read_uvarint, write_cstring, write_uvarint};

/// One entry in the extension table: `(name, version, block_id)`.
/// `block_id = 0` means the extension contributes no dedicated sub-block
/// and only adds tests/operands evaluated against the shared main block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtTableEntry {
    pub name: String,
    pub version: (u16, u16),
    pub block_id: u32,
}

/// Script metadata embedded by the storage layer on save (§4.11).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptMetadata {
    pub driver_name: String,
    pub storage_version: u64,
    pub storage_name: String,
    pub script_name: String,
    /// Opaque driver-specific bytes (JSON for every backend in this
    /// workspace; a real LDAP backend might embed a DN + modify-timestamp
    /// the same way).
    pub driver_data: String,
}

/// One contiguous byte range of operations, operands and embedded
/// strings. Block-id 0 is always the main code block (§3).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Block {
    pub payload: Vec<u8>,
}

pub const MAIN_BLOCK_ID: u32 = 0;

/// The compiled artifact.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binary {
    pub ext_table: Vec<ExtTableEntry>,
    pub blocks: Vec<Block>,
    pub metadata: ScriptMetadata,
}

impl Binary {
    pub fn new() -> Self {
        Self {
            ext_table: Vec::new(),
            blocks: vec![Block::default()],
            metadata: ScriptMetadata::default(),
        }
    }

    pub fn main_block(&self) -> &Block {
        &self.blocks[MAIN_BLOCK_ID as usize]
    }

    pub fn block(&self, id: u32) -> Result<&Block> {
        self.blocks
            .get(id as usize)
            .ok_or(BytecodeError::NoSuchBlock(id))
    }

    fn encode_body(&self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        write_uvarint(&mut buf, self.ext_table.len() as u64)?;
        for ext in &self.ext_table {
            write_cstring(&mut buf, &ext.name)?;
            let packed = ((ext.version.0 as u64) << 16) | ext.version.1 as u64;
            write_uvarint(&mut buf, packed)?;
            write_uvarint(&mut buf, ext.block_id as u64)?;
        }
        write_uvarint(&mut buf, self.blocks.len() as u64)?;
        for block in &self.blocks {
            write_uvarint(&mut buf, block.payload.len() as u64)?;
            buf.write_all(&block.payload)?;
        }
        write_cstring(&mut buf, &self.metadata.driver_name)?;
        write_uvarint(&mut buf, self.metadata.storage_version)?;
        write_cstring(&mut buf, &self.metadata.storage_name)?;
        write_cstring(&mut buf, &self.metadata.script_name)?;
        write_cstring(&mut buf, &self.metadata.driver_data)?;
        Ok(buf)
    }

    fn decode_body(body: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(body);
        let ext_count = read_uvarint(&mut cur)?;
        let mut ext_table = Vec::with_capacity(ext_count as usize);
        for _ in 0..ext_count {
            let name = read_cstring(&mut cur)?;
            let packed = read_uvarint(&mut cur)?;
            let version = ((packed >> 16) as u16, (packed & 0xffff) as u16);
            let block_id = read_uvarint(&mut cur)? as u32;
            ext_table.push(ExtTableEntry {
                name,
                version,
                block_id,
            });
        }
        let block_count = read_uvarint(&mut cur)?;
        let mut blocks = Vec::with_capacity(block_count as usize);
        for _ in 0..block_count {
            let len = read_uvarint(&mut cur)? as usize;
            let mut payload = vec![0u8; len];
            cur.read_exact(&mut payload)?;
            blocks.push(Block { payload });
        }
        let metadata = ScriptMetadata {
            driver_name: read_cstring(&mut cur)?,
            storage_version: read_uvarint(&mut cur)?,
            storage_name: read_cstring(&mut cur)?,
            script_name: read_cstring(&mut cur)?,
            driver_data: read_cstring(&mut cur)?,
        };
        Ok(Self {
            ext_table,
            blocks,
            metadata,
        })
    }

    /// Serialize to the full wire format, including header and checksum.
    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let body = self.encode_body()?;
        let mut hasher = Hasher::new();
        hasher.update(&body);
        let header = Header {
            checksum: hasher.finalize(),
            ..Header::default()
        };
        let mut out = Vec::with_capacity(HEADER_LEN + body.len());
        header.write(&mut out)?;
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse the full wire format, verifying magic, version and checksum,
    /// and rejecting any extension `known_extensions` does not recognise
    /// (§4.6 Load semantics).
    pub fn from_bytes(bytes: &[u8], known_extensions: &dyn Fn(&str) -> bool) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(BytecodeError::BadMagic);
        }
        let mut head_cur = Cursor::new(&bytes[..HEADER_LEN]);
        let header = Header::read(&mut head_cur)?;
        let body = &bytes[HEADER_LEN..];
        let mut hasher = Hasher::new();
        hasher.update(body);
        if hasher.finalize() != header.checksum {
            return Err(BytecodeError::ChecksumMismatch);
        }
        let binary = Self::decode_body(body)?;
        for ext in &binary.ext_table {
            if !known_extensions(&ext.name) {
                return Err(BytecodeError::UnknownExtension(ext.name.clone()));
            }
        }
        binary.validate_jumps()?;
        Ok(binary)
    }

    /// Save to `path` atomically: write to `<path>.tmp`, `fsync`, then
    /// `rename` over the target (§4.6 Save semantics).
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let tmp_path = path.with_extension("svbin.tmp");
        {
            let mut f = File::create(&tmp_path)?;
            f.write_all(&bytes)?;
            f.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    /// Load from `path`. Uses `memmap2` for files large enough that
    /// mapping beats a full read; falls back to `std::fs::read` for small
    /// files (mapping a tiny file has more syscall overhead than reading
    /// it, and some storage backends serve from sources that are not
    /// `mmap`-able at all).
    pub fn load(path: &Path, known_extensions: &dyn Fn(&str) -> bool) -> Result<Self> {
        const MMAP_THRESHOLD: u64 = 16 * 1024;
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len >= MMAP_THRESHOLD {
            let mmap = unsafe { memmap2::Mmap::map(&file)? };
            Self::from_bytes(&mmap, known_extensions)
        } else {
            let bytes = fs::read(path)?;
            Self::from_bytes(&bytes, known_extensions)
        }
    }

    /// Decode every operation in every block generically (using
    /// `operand_schema`) and check every `Offset` operand lands within
    /// its own block (§3 invariant, Testable Property 3). Unknown
    /// (extension) opcodes are skipped — their jump locality, if any, is
    /// the extension's own responsibility, since this crate does not
    /// know their operand schema.
    pub fn validate_jumps(&self) -> Result<()> {
        for (block_id, block) in self.blocks.iter().enumerate() {
            let len = block.payload.len();
            let mut cur = Cursor::new(&block.payload[..]);
            loop {
                let pos_before = cur.position() as usize;
                if pos_before >= len {
                    break;
                }
                let mut tag = [0u8; 1];
                if cur.read_exact(&mut tag).is_err() {
                    break;
                }
                if tag[0] & Opcode::EXT_TAG_BIT != 0 {
                    // Extension operation: ext_id (low 7 bits) + uvarint sub-code.
                    // We cannot know its operand layout, so stop scanning this
                    // block generically; the interpreter validates it at
                    // execution time instead.
                    break;
                }
                let Some(op) = Opcode::from_tag(tag[0]) else {
                    break;
                };
                for kind in operand_schema(op) {
                    let operand = Operand::read(&mut cur)?;
                    if *kind == crate::operand::OperandTag::Offset {
                        if let Operand::Offset(delta) = operand {
                            let site = cur.position() as i64;
                            let target = site + delta as i64;
                            if target < 0 || target as usize > len {
                                return Err(BytecodeError::JumpOutOfBlock {
                                    block_id: block_id as u32,
                                    target,
                                    block_len: len,
                                });
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn known(_: &str) -> bool {
        true
    }

    #[test]
    fn roundtrips_through_bytes() {
        let mut bin = Binary::new();
        bin.ext_table.push(ExtTableEntry {
            name: "fileinto".into(),
            version: (1, 0),
            block_id: 0,
        });
        bin.metadata.script_name = "test".into();
        let bytes = bin.to_bytes().unwrap();
        let back = Binary::from_bytes(&bytes, &known).unwrap();
        assert_eq!(back, bin);
    }

    #[test]
    fn rejects_unknown_extension_on_load() {
        let mut bin = Binary::new();
        bin.ext_table.push(ExtTableEntry {
            name: "not-a-real-extension".into(),
            version: (1, 0),
            block_id: 0,
        });
        let bytes = bin.to_bytes().unwrap();
        let err = Binary::from_bytes(&bytes, &|_: &str| false).unwrap_err();
        assert!(matches!(err, BytecodeError::UnknownExtension(_)));
    }

    #[test]
    fn rejects_corrupted_checksum() {
        let bin = Binary::new();
        let mut bytes = bin.to_bytes().unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let err = Binary::from_bytes(&bytes, &known).unwrap_err();
        assert!(matches!(err, BytecodeError::ChecksumMismatch));
    }

    #[test]
    fn save_and_load_round_trip_on_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("script.svbin");
        let mut bin = Binary::new();
        bin.metadata.script_name = "disk-test".into();
        bin.save(&path).unwrap();
        let loaded = Binary::load(&path, &known).unwrap();
        assert_eq!(loaded, bin);
    }

    #[test]
    fn detects_jump_outside_block() {
        let mut bin = Binary::new();
        // Jmp with an offset that lands far past the end of the block.
        bin.blocks[0].payload = vec![Opcode::Jmp.tag(), 0x0b, 0xff, 0x7f, 0x00, 0x00];
        let err = bin.validate_jumps().unwrap_err();
        assert!(matches!(err, BytecodeError::JumpOutOfBlock { .. }));
    }
}
