//! # rtrace-resolve - Backtrace Address Resolution for Trace Logs
//!
//! Post-processes text trace logs of resource allocations: every backtrace
//! address is replaced by the function it belongs to, with source file and
//! line where debug information is available.
//!
//! ## Pipeline
//!
//! ```text
//! trace log ──▶ trace::pipeline ──▶ Resolver::resolve ──▶ resolved trace log
//!                   │ mapping lines        │
//!                   ▼                      ├─ NameCache (address → line)
//!              ModuleIndex ◀───────────────┤
//!                                          └─ SymbolCache (per module, lazy)
//!                                               ├─ ElfImage   (raw symbol table)
//!                                               └─ Symbolizer (DWARF)
//! ```
//!
//! ## Module Structure
//!
//! - [`resolver`]: the resolution engine and output line format
//! - [`name_cache`]: fixed-size resolved name cache with hit/age eviction
//! - [`symbolization`]: module index, symbol cache records and both lookup
//!   strategies
//! - [`sorted_array`]: insertion-sorted container behind the module index
//! - [`trace`]: header, record parsing and the direct/multi-pass passes
//! - [`cli`], [`preflight`], [`interrupt`]: binary support
//! - [`domain`]: identifiers, options and error types
//!
//! ## Typical Usage
//!
//! ```bash
//! rtrace-resolve -i trace.txt -o trace.resolved.txt
//!
//! # Low memory: one symbol cache shared by all modules
//! rtrace-resolve -m single-cache -i trace.txt
//!
//! # Trace recorded on another device
//! rtrace-resolve -s /opt/target-rootfs -i trace.txt
//! ```

pub mod cli;
pub mod domain;
pub mod interrupt;
pub mod name_cache;
pub mod preflight;
pub mod resolver;
pub mod sorted_array;
pub mod symbolization;
pub mod trace;
