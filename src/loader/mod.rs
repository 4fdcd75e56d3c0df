//! Loader / decryption / inflation pipeline (C1-C4).

pub mod assets;
pub mod crypt;
pub mod inflate;
pub mod reader;
pub mod version;

use std::fs;
use std::path::Path;

use log::{error, info};

use crate::compiler::{CodeObjectTable, ConstantPool, FieldTable};
use crate::error::{LoadError, LoadResult};

pub use assets::{CompiledScript, RawSection};
pub use version::GameVersion;

const MIN_FILE_SIZE: usize = 27;
const EXE_SIGNATURE: [u8; 2] = *b"MZ";

/// The fully decoded result of loading a game executable: its detected
/// version, every inflated asset section, and the scripts compiled out of
/// the scripts section.
pub struct GameArchive {
    /// V800 or V810.
    pub version: GameVersion,
    /// Inflated, not-yet-structurally-decoded sections, in archive order.
    pub sections: Vec<RawSection>,
    /// Scripts compiled to bytecode.
    pub scripts: Vec<CompiledScript>,
    /// Constant pool shared by every compiled script and event.
    pub constants: ConstantPool,
    /// Field name table shared by every compiled script and event.
    pub fields: FieldTable,
    /// Code-object table shared by every compiled script and event.
    pub code_objects: CodeObjectTable,
}

/// Load and fully decode a game executable from disk.
///
/// Reads the whole file into memory, validates it, detects (and if needed
/// decrypts) its version, inflates every asset section, and compiles every
/// script. Returns the first error encountered; no partial state is handed
/// back to the caller.
pub fn load(path: impl AsRef<Path>) -> LoadResult<GameArchive> {
    let path = path.as_ref();
    info!("loading game archive from {}", path.display());

    let mut buf = fs::read(path).map_err(|e| {
        error!("failed to read {}: {}", path.display(), e);
        LoadError::from(e)
    })?;

    validate_header(&buf)?;

    let (version, cursor) = version::detect_version(&mut buf)?;
    info!("detected game version: {:?}", version);

    let sections = assets::decode_sections(&buf, cursor)?;

    let mut constants = ConstantPool::new();
    let mut fields = FieldTable::new();
    let mut code_objects = CodeObjectTable::new();

    let scripts_section = sections
        .iter()
        .find(|s| s.name == "scripts")
        .ok_or_else(|| LoadError::Corrupt("missing scripts section".into()))?;
    let scripts = assets::compile_scripts(
        scripts_section,
        &mut constants,
        &mut fields,
        &mut code_objects,
    )?;

    Ok(GameArchive {
        version,
        sections,
        scripts,
        constants,
        fields,
        code_objects,
    })
}

fn validate_header(buf: &[u8]) -> LoadResult<()> {
    if buf.len() < MIN_FILE_SIZE {
        return Err(LoadError::NotAnExecutable);
    }
    if buf[0..2] != EXE_SIGNATURE {
        return Err(LoadError::NotAnExecutable);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_file_is_not_an_executable() {
        let buf = vec![b'M', b'Z'];
        assert!(matches!(validate_header(&buf), Err(LoadError::NotAnExecutable)));
    }

    #[test]
    fn missing_magic_is_not_an_executable() {
        let buf = vec![0u8; MIN_FILE_SIZE];
        assert!(matches!(validate_header(&buf), Err(LoadError::NotAnExecutable)));
    }

    #[test]
    fn valid_magic_and_size_passes_header_check() {
        let mut buf = vec![0u8; MIN_FILE_SIZE];
        buf[0..2].copy_from_slice(&EXE_SIGNATURE);
        assert!(validate_header(&buf).is_ok());
    }
}
