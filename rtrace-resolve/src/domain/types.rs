//! Core domain types: module identifiers and resolver configuration.

use std::fmt;
use std::path::{Path, PathBuf};

/// Registration sequence number of a module mapping.
///
/// Ids are handed out in registration order and index the flat
/// id → module table, so they stay valid for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which symbol lookup strategies run for every address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResolveMethod {
    /// Raw symbol table scan of the mapped image (function name only).
    Elf,
    /// Debug-info lookup with source file and line attribution.
    #[default]
    Dwarf,
    /// Both, reconciled per address.
    Both,
}

impl ResolveMethod {
    #[must_use]
    pub fn uses_elf(self) -> bool {
        matches!(self, Self::Elf | Self::Both)
    }

    #[must_use]
    pub fn uses_dwarf(self) -> bool {
        matches!(self, Self::Dwarf | Self::Both)
    }
}

/// How the input stream is processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperationMode {
    /// Resolve every backtrace line in place while streaming.
    #[default]
    Direct,
    /// Stage addresses per module, resolve module by module, reassemble.
    MultiPass,
}

/// Resolver configuration, built by the CLI layer.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub method: ResolveMethod,
    /// Echo names already present in the input instead of resolving again.
    pub keep_resolved: bool,
    /// Keep directories in source paths.
    pub full_path: bool,
    /// Guest system root for cross-filesystem resolving.
    pub root_path: Option<PathBuf>,
    /// Share one symbol cache record between all modules.
    pub single_cache: bool,
    pub mode: OperationMode,
}

impl ResolveOptions {
    /// Converts a target path into its location in the host filesystem.
    ///
    /// Only absolute paths are translated, and only when a root path is set.
    #[must_use]
    pub fn host_path(&self, path: &str) -> PathBuf {
        match &self.root_path {
            Some(root) if path.starts_with('/') => root.join(path.trim_start_matches('/')),
            _ => PathBuf::from(path),
        }
    }

    /// Root the well-known system debug directory lives under.
    #[must_use]
    pub fn system_root(&self) -> &Path {
        self.root_path.as_deref().unwrap_or_else(|| Path::new("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_path_without_root() {
        let options = ResolveOptions::default();
        assert_eq!(options.host_path("/lib/libc.so.6"), PathBuf::from("/lib/libc.so.6"));
    }

    #[test]
    fn test_host_path_with_root() {
        let options =
            ResolveOptions { root_path: Some(PathBuf::from("/opt/sysroot")), ..Default::default() };
        let host = options.host_path("/lib/libc.so.6");
        assert_eq!(host, PathBuf::from("/opt/sysroot/lib/libc.so.6"));
        // relative paths are left alone
        assert_eq!(options.host_path("lib/libc.so.6"), PathBuf::from("lib/libc.so.6"));
    }

    #[test]
    fn test_method_flags() {
        assert!(ResolveMethod::Elf.uses_elf());
        assert!(!ResolveMethod::Elf.uses_dwarf());
        assert!(ResolveMethod::Dwarf.uses_dwarf());
        assert!(ResolveMethod::Both.uses_elf() && ResolveMethod::Both.uses_dwarf());
        assert_eq!(ResolveMethod::default(), ResolveMethod::Dwarf);
    }
}
