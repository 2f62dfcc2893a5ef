//! Function signature demangling for resolved symbols.

use cpp_demangle::DemangleOptions;

/// Prefix of internal assembly-level aliases (e.g. `IA__g_malloc` in GLib).
const INTERNAL_ALIAS_PREFIX: &str = "IA__";

/// Turns a raw symbol name into a printable function signature.
///
/// Rust and Itanium C++ names are demangled with parameter types and
/// qualifiers; anything else is printed as `name()`.
#[must_use]
pub fn function_signature(raw: &str) -> String {
    let name = raw.strip_prefix(INTERNAL_ALIAS_PREFIX).unwrap_or(raw);

    if let Ok(demangled) = rustc_demangle::try_demangle(name) {
        return format!("{demangled:#}");
    }
    if let Some(demangled) = demangle_cpp(name) {
        return demangled;
    }
    format!("{name}()")
}

fn demangle_cpp(name: &str) -> Option<String> {
    if !name.starts_with("_Z") {
        return None;
    }
    let symbol = cpp_demangle::Symbol::new(name).ok()?;
    symbol.demangle(&DemangleOptions::default()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_c_name_gets_parameter_list() {
        assert_eq!(function_signature("bar"), "bar()");
        assert_eq!(function_signature("main"), "main()");
    }

    #[test]
    fn test_internal_alias_prefix_is_stripped() {
        assert_eq!(function_signature("IA__g_malloc"), "g_malloc()");
        // only the leading prefix
        assert_eq!(function_signature("g_IA__thing"), "g_IA__thing()");
    }

    #[test]
    fn test_cpp_names_keep_parameters() {
        assert_eq!(function_signature("_Z3barv"), "bar()");
        assert_eq!(function_signature("_ZN3foo3bazEi"), "foo::baz(int)");
        assert_eq!(function_signature("_ZNK3foo3getEv"), "foo::get() const");
    }

    #[test]
    fn test_rust_names_drop_hash() {
        assert_eq!(
            function_signature("_ZN4core3ptr13drop_in_place17h0123456789abcdefE"),
            "core::ptr::drop_in_place"
        );
    }

    #[test]
    fn test_broken_mangling_falls_back() {
        assert_eq!(function_signature("_Zbroken"), "_Zbroken()");
    }
}
