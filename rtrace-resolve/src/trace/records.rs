//! Trace line records the resolver acts on.

/// `: <module> => 0x<from>-0x<to>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingRecord<'a> {
    pub module: &'a str,
    pub from: u64,
    pub to: u64,
}

/// `\t0x<address>`, optionally followed by ` (<name>)` from an earlier run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BacktraceRecord<'a> {
    pub address: u64,
    /// Previously resolved name, empty if none.
    pub name: &'a str,
}

/// Splits a leading hex number off `text`.
fn hex_prefix(text: &str) -> Option<(u64, &str)> {
    let end = text.find(|c: char| !c.is_ascii_hexdigit()).unwrap_or(text.len());
    let value = u64::from_str_radix(&text[..end], 16).ok()?;
    Some((value, &text[end..]))
}

#[must_use]
pub fn parse_mapping(line: &str) -> Option<MappingRecord<'_>> {
    let rest = line.strip_prefix(':')?.trim_start();
    let module_end = rest.find(char::is_whitespace)?;
    let (module, rest) = rest.split_at(module_end);
    let rest = rest.trim_start().strip_prefix("=>")?.trim_start().strip_prefix("0x")?;
    let (from, rest) = hex_prefix(rest)?;
    let (to, _) = hex_prefix(rest.strip_prefix("-0x")?)?;
    Some(MappingRecord { module, from, to })
}

#[must_use]
pub fn parse_backtrace(line: &str) -> Option<BacktraceRecord<'_>> {
    let (address, rest) = hex_prefix(line.strip_prefix("\t0x")?)?;
    let name = rest
        .trim_start()
        .strip_prefix('(')
        .map_or("", |name| name.strip_suffix(')').unwrap_or(name));
    Some(BacktraceRecord { address, name })
}

/// `^<module id>` placeholder of a multi-pass index file.
#[must_use]
pub fn parse_index(line: &str) -> Option<usize> {
    let digits = line.strip_prefix('^')?;
    let end = digits.find(|c: char| !c.is_ascii_digit()).unwrap_or(digits.len());
    digits[..end].parse().ok()
}
