//! Symbol lookup strategies and the policy that reconciles them.

use crate::domain::ResolveMethod;

/// What a lookup strategy found for one address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// Raw (possibly mangled) function name.
    pub name: String,
    pub source: Option<String>,
    pub line: Option<u32>,
}

impl Symbol {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), source: None, line: None }
    }
}

/// A way of turning a file-relative address into a symbol.
pub trait SymbolLookup {
    fn lookup(&self, address: u64) -> Option<Symbol>;
}

/// Picks the result to report from the debug-info (`dwarf`) and raw symbol
/// table (`elf`) lookups.
///
/// With a single method its result is used as is. With both:
/// - only one found a name: that one;
/// - the names differ: the raw table's name, which stays right for global
///   constructor thunks where nearest-line lookup lands on a neighbour;
/// - the names agree: the debug-info result, filling in any source
///   attribution it lacks from the raw result.
#[must_use]
pub fn reconcile(
    method: ResolveMethod,
    dwarf: Option<Symbol>,
    elf: Option<Symbol>,
) -> Option<Symbol> {
    match method {
        ResolveMethod::Dwarf => dwarf,
        ResolveMethod::Elf => elf,
        ResolveMethod::Both => match (dwarf, elf) {
            (None, None) => None,
            (Some(found), None) | (None, Some(found)) => Some(found),
            (Some(dwarf), Some(elf)) if dwarf.name != elf.name => Some(elf),
            (Some(mut dwarf), Some(elf)) => {
                if dwarf.source.is_none() {
                    dwarf.source = elf.source;
                    dwarf.line = dwarf.line.or(elf.line);
                }
                Some(dwarf)
            }
        },
    }
}
