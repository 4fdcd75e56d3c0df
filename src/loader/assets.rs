//! Settings and typed asset section decode (C4).
//!
//! The exact per-asset field layout is out of scope for this crate (see
//! spec.md section 4.2): this module is responsible for exactly one thing
//! end to end — inflating each section in order and, for the scripts and
//! room/object event sections, handing source text to the compiler so the
//! resulting bytecode can replace it in memory.

use log::debug;

use crate::compiler::{self, CodeObjectTable, ConstantPool, FieldTable, Program};
use crate::error::{LoadError, LoadResult};
use crate::loader::inflate::inflate_block;
use crate::loader::reader::Reader;

/// The sections that follow `settings`, read strictly in this order.
pub const SECTION_ORDER: &[&str] = &[
    "triggers",
    "constants",
    "sounds",
    "sprites",
    "backgrounds",
    "paths",
    "scripts",
    "fonts",
    "timelines",
    "objects",
    "rooms",
];

/// One inflated, not-yet-structurally-decoded section.
pub struct RawSection {
    /// Name, for diagnostics (matches `SECTION_ORDER`, or `"settings"` /
    /// `"trailing"`).
    pub name: &'static str,
    /// Decompressed bytes.
    pub data: Vec<u8>,
}

/// A user script whose source text has been compiled to bytecode.
pub struct CompiledScript {
    /// Script name as stored in the archive.
    pub name: String,
    /// Whether this slot is a live script (deleted scripts keep their slot
    /// but have `exists == false`, per the asset-name lookup convention
    /// used elsewhere in the spec).
    pub exists: bool,
    /// The compiled program, or `None` if the script is empty.
    pub program: Option<Program>,
}

/// Reads one `{u32 version_stamp; u32 compressed_len; zlib_stream}` block
/// and returns its inflated bytes, advancing the reader past it.
fn read_section(reader: &mut Reader<'_>) -> LoadResult<Vec<u8>> {
    let _version_stamp = reader
        .read_u32()
        .ok_or_else(|| LoadError::Corrupt("truncated section header".into()))?;
    let compressed_len = reader
        .read_u32()
        .ok_or_else(|| LoadError::Corrupt("truncated section header".into()))? as usize;
    let compressed = reader
        .read_bytes(compressed_len)
        .ok_or_else(|| LoadError::Corrupt("section shorter than declared length".into()))?;
    inflate_block(compressed)
}

/// Inflate `settings` followed by every table in `SECTION_ORDER`, plus one
/// trailing table. Stops and returns the first error encountered, per the
/// loader's all-or-nothing error policy.
pub fn decode_sections(buf: &[u8], cursor: usize) -> LoadResult<Vec<RawSection>> {
    let mut reader = Reader::at(buf, cursor);
    let mut sections = Vec::with_capacity(SECTION_ORDER.len() + 2);

    debug!("decoding settings section at offset {}", reader.position());
    sections.push(RawSection {
        name: "settings",
        data: read_section(&mut reader)?,
    });

    for &name in SECTION_ORDER {
        debug!("decoding {} section at offset {}", name, reader.position());
        sections.push(RawSection {
            name,
            data: read_section(&mut reader)?,
        });
    }

    debug!("decoding trailing section at offset {}", reader.position());
    sections.push(RawSection {
        name: "trailing",
        data: read_section(&mut reader)?,
    });

    Ok(sections)
}

/// Minimal encoding used for the scripts section: a `u32` count, then for
/// each script a length-prefixed name, an `exists` byte, and a
/// length-prefixed GML source string.
///
/// Compiles every live script's source text, replacing it with its bytecode
/// form — the one invariant this decoder is responsible for upholding.
pub fn compile_scripts(
    section: &RawSection,
    pool: &mut ConstantPool,
    fields: &mut FieldTable,
    code: &mut CodeObjectTable,
) -> LoadResult<Vec<CompiledScript>> {
    let mut reader = Reader::new(&section.data);
    let count = reader
        .read_u32()
        .ok_or_else(|| LoadError::Corrupt("truncated scripts section".into()))?;

    let mut scripts = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_len = reader
            .read_u32()
            .ok_or_else(|| LoadError::Corrupt("truncated script name".into()))? as usize;
        let name_bytes = reader
            .read_bytes(name_len)
            .ok_or_else(|| LoadError::Corrupt("truncated script name".into()))?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        let exists = reader
            .read_u8()
            .ok_or_else(|| LoadError::Corrupt("truncated script exists flag".into()))?
            != 0;

        let src_len = reader
            .read_u32()
            .ok_or_else(|| LoadError::Corrupt("truncated script source".into()))? as usize;
        let src_bytes = reader
            .read_bytes(src_len)
            .ok_or_else(|| LoadError::Corrupt("truncated script source".into()))?;
        let source = String::from_utf8_lossy(src_bytes).into_owned();

        let program = if exists && !source.trim().is_empty() {
            match compiler::compile_code(&source, pool, fields, code) {
                Ok(program) => Some(program),
                Err(e) => {
                    return Err(LoadError::Corrupt(format!(
                        "script '{}' failed to compile: {}",
                        name, e
                    )))
                }
            }
        } else {
            None
        };

        scripts.push(CompiledScript { name, exists, program });
    }

    Ok(scripts)
}
