//! Resolved backtrace line formatting
//!
//! Every line starts with a tab and the address in hex, so resolved output
//! parses with the same grammar as the unresolved input:
//!
//! ```text
//!     0x4005d0 main() at main.c:12
//!     0x7f3a1c0221f0 g_malloc() from /usr/lib/libglib-2.0.so.0
//!     0x7f3a1c0221f0 from /usr/lib/libglib-2.0.so.0
//!     0xdeadbeef in ??
//! ```

// String formatting intentionally uses format! for clarity
#![allow(clippy::format_push_string)]

use std::borrow::Cow;

use crate::symbolization::{function_signature, Symbol};

/// Marker for addresses outside every registered module.
pub const UNKNOWN_SYMBOL: &str = "in ??";

#[must_use]
pub fn unknown_line(address: u64) -> String {
    format!("\t0x{address:x} {UNKNOWN_SYMBOL}")
}

/// Address inside `module` for which no symbol could be found.
#[must_use]
pub fn from_line(address: u64, module: &str) -> String {
    format!("\t0x{address:x} from {module}")
}

/// Address resolved to `symbol`. Without source attribution the module is
/// named instead.
#[must_use]
pub fn symbol_line(address: u64, symbol: &Symbol, module: &str, full_path: bool) -> String {
    let mut line = format!("\t0x{address:x} {}", function_signature(&symbol.name));
    match &symbol.source {
        Some(source) => {
            let source = if full_path { source.as_str() } else { file_name(source) };
            line.push_str(&format!(" at {source}"));
            if let Some(number) = symbol.line.filter(|&number| number != 0) {
                line.push_str(&format!(":{number}"));
            }
        }
        None => line.push_str(&format!(" from {module}")),
    }
    line
}

/// Name resolved by an earlier run, echoed back.
#[must_use]
pub fn kept_line(address: u64, name: &str, full_path: bool) -> String {
    let name = if full_path { Cow::Borrowed(name) } else { strip_source_path(name) };
    format!("\t0x{address:x} {name}")
}

fn file_name(path: &str) -> &str {
    path.rfind('/').map_or(path, |idx| &path[idx + 1..])
}

/// Reduces the last path-like word of an already resolved name to its final
/// component: `bar() at /src/foo.c:12` becomes `bar() at foo.c:12`.
#[must_use]
pub fn strip_source_path(name: &str) -> Cow<'_, str> {
    let Some(slash) = name.rfind('/') else {
        return Cow::Borrowed(name);
    };
    let word_start = name[..slash].rfind([' ', '\t']).map_or(0, |idx| idx + 1);
    Cow::Owned(format!("{}{}", &name[..word_start], &name[slash + 1..]))
}
