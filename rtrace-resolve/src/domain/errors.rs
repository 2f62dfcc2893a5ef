//! Structured error types for rtrace-resolve
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only `TraceError` is fatal; the other two are turned into degraded output
//! lines by the resolver.

use std::path::PathBuf;
use thiserror::Error;

/// Problems found while reading a raw ELF image.
#[derive(Error, Debug)]
pub enum ElfError {
    #[error("image file too short to contain an ELF header ({0} bytes)")]
    TooShort(u64),

    #[error("ELF header identification failed")]
    BadMagic,

    #[error("unsupported ELF class {0}")]
    UnsupportedClass(u8),

    #[error("unsupported ELF data encoding {0}")]
    UnsupportedEncoding(u8),

    #[error("truncated ELF data: need {needed} bytes at offset {offset:#x}")]
    Truncated { offset: u64, needed: u64 },

    #[error("{table} table at {offset:#x} extends past the end of the image")]
    OutOfBounds { table: &'static str, offset: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failures while registering a module or loading its symbols.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("{path} is not a recognizable binary: {source}")]
    ModuleRejected {
        path: String,
        #[source]
        source: ElfError,
    },

    #[error("failed to map image {path}: {source}")]
    ImageUnavailable {
        path: PathBuf,
        #[source]
        source: ElfError,
    },

    #[error("file {path} not in executable format: {source}")]
    NotExecutable {
        path: PathBuf,
        #[source]
        source: object::Error,
    },

    #[error("no symbols in {0}")]
    NoSymbols(PathBuf),

    #[error("failed to load debug information from {path}: {source}")]
    DebugInfo {
        path: PathBuf,
        #[source]
        source: gimli::Error,
    },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Fatal conditions of the text-log pipeline.
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("input stream is empty, expected a trace header")]
    MissingHeader,

    #[error(
        "non native architecture {found} (expected {expected}); \
         set the guest system root path to attempt cross architecture resolving"
    )]
    ArchMismatch { found: String, expected: String },

    #[error("multi-pass resolving failed, unexpected end of {0} resolved data")]
    ScratchExhausted(String),

    #[error("index record refers to unknown module id {0}")]
    UnknownModuleId(usize),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elf_error_display() {
        let err = ElfError::Truncated { offset: 0x40, needed: 56 };
        assert_eq!(err.to_string(), "truncated ELF data: need 56 bytes at offset 0x40");
    }

    #[test]
    fn test_module_rejected_keeps_path() {
        let err = ResolveError::ModuleRejected {
            path: "/lib/libfoo.so".to_string(),
            source: ElfError::BadMagic,
        };
        assert!(err.to_string().contains("/lib/libfoo.so"));
        assert!(err.to_string().contains("identification failed"));
    }

    #[test]
    fn test_arch_mismatch_display() {
        let err =
            TraceError::ArchMismatch { found: "arm".to_string(), expected: "x86_64".to_string() };
        assert!(err.to_string().contains("arm"));
        assert!(err.to_string().contains("x86_64"));
    }
}
