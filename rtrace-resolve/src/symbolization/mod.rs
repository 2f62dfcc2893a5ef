//! # Symbol Resolution and Address Translation
//!
//! Turns a backtrace address into a function name, and where debug
//! information allows, a source file and line.
//!
//! ## Address Translation
//!
//! Trace addresses are runtime addresses of the traced process. Each module
//! mapping records where a binary was loaded. Position-independent modules
//! (shared libraries, PIE executables) are linked at address 0, so the mapping
//! start is subtracted before the image is searched:
//!
//! ```text
//! File Address = Runtime Address - Mapping Start
//! ```
//!
//! Executables linked at a fixed address are searched with the runtime
//! address unchanged. [`ElfImage::is_absolute`] tells the two apart from the
//! program header table when the module is registered.
//!
//! ## Lookup Strategies
//!
//! - [`ElfImage`]: maps the binary and scans `.symtab`/`.dynsym` by hand for
//!   the function whose extent contains the address. Name only.
//! - [`Symbolizer`]: DWARF lookup via `addr2line`, following `.gnu_debuglink`
//!   to a separate debug file when one is installed. Adds file and line.
//!
//! Both implement [`SymbolLookup`]; [`reconcile`] decides which answer is
//! reported when both run.
//!
//! ## Caching
//!
//! Each [`ModuleMapping`] points to a [`SymbolCache`] record that is loaded on
//! the first lookup in that module. In single-cache mode all mappings share
//! one record, which is reloaded whenever the looked-up module changes.
//!
//! **Libraries used**:
//! - `gimli`: Low-level DWARF parser
//! - `addr2line`: High-level symbolization library built on gimli
//! - `object`: ELF binary parser
//! - `memmap2`: read-only image mapping

pub mod demangle;
pub mod elf_image;
pub mod memory_maps;
pub mod strategy;
pub mod symbol_cache;
pub mod symbolizer;

pub use demangle::function_signature;
pub use elf_image::{ElfClass, ElfImage};
pub use memory_maps::{MemoryRange, ModuleIndex, ModuleMapping};
pub use strategy::{reconcile, Symbol, SymbolLookup};
pub use symbol_cache::SymbolCache;
pub use symbolizer::Symbolizer;
