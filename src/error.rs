//! Error taxonomy for the loader and compiler.

use std::error::Error;
use std::fmt;
use std::io;

/// Common result alias used throughout the loader pipeline.
pub type LoadResult<T> = Result<T, LoadError>;

/// Common result alias used throughout the compiler front end.
pub type CompileResult<T> = Result<T, CompileError>;

/// Errors produced while turning an executable on disk into an asset set.
///
/// Mirrors spec.md section 7: the loader returns the first error it hits and
/// discards all partial state.
#[derive(Debug)]
pub enum LoadError {
    /// Could not open or read the file.
    Io(io::Error),
    /// Allocation failed while reading the file or inflating a block.
    ResourceExhausted(String),
    /// File is too small or does not start with the `MZ` signature.
    NotAnExecutable,
    /// Neither the V800 nor the V810 version probe matched.
    UnknownVersion,
    /// A section failed to inflate or decode.
    Corrupt(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Io(e) => write!(f, "io error: {}", e),
            LoadError::ResourceExhausted(what) => write!(f, "resource exhausted: {}", what),
            LoadError::NotAnExecutable => write!(f, "not a GM8 executable"),
            LoadError::UnknownVersion => write!(f, "unknown game version"),
            LoadError::Corrupt(what) => write!(f, "corrupt archive: {}", what),
        }
    }
}

impl Error for LoadError {}

impl From<io::Error> for LoadError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::OutOfMemory {
            return LoadError::ResourceExhausted(e.to_string());
        }
        LoadError::Io(e)
    }
}

/// Errors produced while compiling a single script or event's source text.
///
/// The compiler never partially mutates the code-object table before
/// failing: compilation of a unit completes fully or the unit's prior
/// bytecode is left untouched (spec.md section 7).
#[derive(Debug)]
pub enum CompileError {
    /// More than 256 names in a single `var` statement.
    TooManyVars(usize),
    /// A literal or sub-expression would need a constant-pool or code-object
    /// index wider than 22 bits.
    IndexOverflow(&'static str),
    /// A call-position identifier didn't resolve to a script or a built-in.
    UnknownCall(String),
    /// `alarm` was used without (or some other instance variable was used
    /// with) an array index it doesn't support.
    BadArrayUse(&'static str),
    /// A statement form reserved but not implemented by this pass
    /// (`while`/`do`/`repeat` are implemented; anything else reaching here
    /// truly has no lowering).
    Unsupported(&'static str),
    /// Malformed syntax that doesn't fit a more specific variant.
    Syntax(String),
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileError::TooManyVars(n) => {
                write!(f, "too many names in var statement: {} (max 256)", n)
            }
            CompileError::IndexOverflow(what) => write!(f, "{} index does not fit in 22 bits", what),
            CompileError::UnknownCall(name) => write!(f, "unresolved call: {}", name),
            CompileError::BadArrayUse(what) => write!(f, "invalid array-index use: {}", what),
            CompileError::Unsupported(what) => write!(f, "unsupported statement form: {}", what),
            CompileError::Syntax(what) => write!(f, "syntax error: {}", what),
        }
    }
}

impl Error for CompileError {}
