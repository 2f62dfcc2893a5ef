//! Resolution engine
//!
//! [`Resolver::resolve`] is the single entry point the text layer uses:
//!
//! 1. keep-resolved mode echoes a name already present in the input;
//! 2. the name cache answers repeated addresses;
//! 3. otherwise the owning module is looked up, its symbol cache record
//!    loaded if another module (or none) is active in it, the configured
//!    strategies run and their results reconciled;
//! 4. the formatted line is cached and returned.
//!
//! Modules that fail to load, and addresses without a symbol, degrade to a
//! `from <module>` line. Addresses outside every module become `in ??`.

pub mod engine;
pub mod format;

pub use engine::Resolver;
