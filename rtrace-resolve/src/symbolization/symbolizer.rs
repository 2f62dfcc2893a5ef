#![allow(unsafe_code)] // Mmap::map requires unsafe

use addr2line::Context;
use gimli::{EndianRcSlice, RunTimeEndian};
use log::{debug, info, warn};
use memmap2::Mmap;
use object::{Object, ObjectSection, ObjectSymbol, SectionFlags, SymbolKind};
use std::fs::File;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use super::strategy::{Symbol, SymbolLookup};
use crate::domain::ResolveError;

/// Debug-info based resolver for one module.
///
/// Owns everything it needs after loading: the DWARF sections are copied into
/// reference-counted slices, and the symbol table and loadable section ranges
/// are extracted, so the file mapping is released once `open` returns.
pub struct Symbolizer {
    ctx: Context<EndianRcSlice<RunTimeEndian>>,
    /// Function symbols sorted by address.
    symbols: Vec<SymbolEntry>,
    /// Address ranges of sections occupying memory at run time.
    sections: Vec<Range<u64>>,
    /// Separate debug file the information was read from, if any.
    debug_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct SymbolEntry {
    address: u64,
    size: u64,
    name: String,
}

fn map_file(path: &Path) -> Result<Mmap, ResolveError> {
    let io_error = |source| ResolveError::Io { path: path.to_path_buf(), source };
    let file = File::open(path).map_err(io_error)?;
    // Safety: read-only mapping, dropped before `Symbolizer::open` returns.
    unsafe { Mmap::map(&file) }.map_err(io_error)
}

fn parse_object<'data>(
    path: &Path,
    data: &'data [u8],
) -> Result<object::File<'data>, ResolveError> {
    object::File::parse(data)
        .map_err(|source| ResolveError::NotExecutable { path: path.to_path_buf(), source })
}

impl Symbolizer {
    /// Create a new symbolizer for the given binary
    ///
    /// A `.gnu_debuglink` target found next to the binary, in its `.debug`
    /// subdirectory or under `<system_root>/usr/lib/debug` replaces the binary
    /// as the source of symbols and debug information.
    ///
    /// # Errors
    /// Returns an error if the binary (or its debug file) cannot be read or
    /// parsed, if it has neither a symbol table nor a dynamic symbol table, or
    /// if its DWARF sections are malformed
    pub fn open(binary_path: &Path, system_root: &Path) -> Result<Self, ResolveError> {
        let binary_data = map_file(binary_path)?;
        let binary = parse_object(binary_path, &binary_data)?;

        let debug_file = find_debug_link(&binary, binary_path, system_root);
        match &debug_file {
            Some(debug_path) => {
                info!("{}: using debug file {}", binary_path.display(), debug_path.display());
                let debug_data = map_file(debug_path)?;
                let debug_obj = parse_object(debug_path, &debug_data)?;
                Self::load(&debug_obj, debug_path, debug_file.clone())
            }
            None => Self::load(&binary, binary_path, None),
        }
    }

    fn load(
        obj: &object::File<'_>,
        path: &Path,
        debug_file: Option<PathBuf>,
    ) -> Result<Self, ResolveError> {
        let mut symbols = collect_functions(obj.symbols());
        if symbols.is_empty() {
            symbols = collect_functions(obj.dynamic_symbols());
        }
        if symbols.is_empty() {
            return Err(ResolveError::NoSymbols(path.to_path_buf()));
        }
        symbols.sort_by_key(|sym| sym.address);

        let sections = obj
            .sections()
            .filter(|section| occupies_memory(section.flags()) && section.size() > 0)
            .filter_map(|section| {
                let start = section.address();
                let size = section.size();
                let Some(end) = start.checked_add(size) else {
                    debug!("{}: skipping section at {start:#x} of size {size:#x}", path.display());
                    return None;
                };
                Some(start..end)
            })
            .collect();

        // Load DWARF debug info
        let endian =
            if obj.is_little_endian() { RunTimeEndian::Little } else { RunTimeEndian::Big };

        let load_section =
            |id: gimli::SectionId| -> Result<EndianRcSlice<RunTimeEndian>, gimli::Error> {
                let data = obj
                    .section_by_name(id.name())
                    .and_then(|section| section.uncompressed_data().ok())
                    .unwrap_or(std::borrow::Cow::Borrowed(&[][..]));
                Ok(EndianRcSlice::new(Rc::from(&*data), endian))
            };

        let debug_error = |source| ResolveError::DebugInfo { path: path.to_path_buf(), source };
        let dwarf = gimli::Dwarf::load(&load_section).map_err(debug_error)?;
        let ctx = Context::from_dwarf(dwarf).map_err(debug_error)?;

        debug!("{}: {} function symbols loaded", path.display(), symbols.len());
        Ok(Self { ctx, symbols, sections, debug_file })
    }

    #[must_use]
    pub fn debug_file(&self) -> Option<&Path> {
        self.debug_file.as_deref()
    }

    #[must_use]
    pub fn symbol_count(&self) -> usize {
        self.symbols.len()
    }

    /// Nearest function symbol at or below `pc`, honouring its size when known.
    fn nearest_symbol(&self, pc: u64) -> Option<&SymbolEntry> {
        let idx = self.symbols.partition_point(|sym| sym.address <= pc);
        let sym = self.symbols.get(idx.checked_sub(1)?)?;
        (sym.size == 0 || pc - sym.address < sym.size).then_some(sym)
    }
}

fn occupies_memory(flags: SectionFlags) -> bool {
    match flags {
        SectionFlags::Elf { sh_flags } => sh_flags & u64::from(object::elf::SHF_ALLOC) != 0,
        _ => true,
    }
}

fn collect_functions<'data, S, I>(symbols: I) -> Vec<SymbolEntry>
where
    S: ObjectSymbol<'data>,
    I: Iterator<Item = S>,
{
    symbols
        .filter(|sym| sym.kind() == SymbolKind::Text && sym.is_definition())
        .filter_map(|sym| {
            let name = sym.name().ok().filter(|name| !name.is_empty())?;
            Some(SymbolEntry { address: sym.address(), size: sym.size(), name: name.to_string() })
        })
        .collect()
}

/// Locates the separate debug file named by the image's `.gnu_debuglink`.
fn find_debug_link(
    obj: &object::File<'_>,
    binary_path: &Path,
    system_root: &Path,
) -> Option<PathBuf> {
    let (name, _crc) = match obj.gnu_debuglink() {
        Ok(Some(link)) => link,
        Ok(None) => return None,
        Err(e) => {
            warn!("{}: unreadable .gnu_debuglink: {e}", binary_path.display());
            return None;
        }
    };
    let name = Path::new(std::str::from_utf8(name).ok()?);
    let bin_dir = binary_path.parent().unwrap_or_else(|| Path::new("."));
    // directory of the image as seen from inside the system root
    let target_dir = bin_dir.strip_prefix(system_root).unwrap_or(bin_dir);
    let target_dir = target_dir.strip_prefix("/").unwrap_or(target_dir);

    let candidates = [
        bin_dir.join(name),
        bin_dir.join(".debug").join(name),
        system_root.join("usr/lib/debug").join(target_dir).join(name),
    ];
    let found = candidates
        .into_iter()
        .find(|candidate| candidate.is_file() && candidate != binary_path);
    if found.is_none() {
        debug!("{}: debug link {} not found", binary_path.display(), name.display());
    }
    found
}

impl SymbolLookup for Symbolizer {
    /// Resolve a file-relative return address to function, file and line
    ///
    /// A return address points just past the call, so the instruction before
    /// it is looked up. The address must fall into a loadable section.
    fn lookup(&self, address: u64) -> Option<Symbol> {
        let pc = address.checked_sub(1)?;
        if !self.sections.iter().any(|range| range.contains(&pc)) {
            return None;
        }

        let mut found: Option<Symbol> = None;
        if let Ok(mut frame_iter) = self.ctx.find_frames(pc).skip_all_loads() {
            // innermost frame describes the instruction itself
            if let Ok(Some(frame)) = frame_iter.next() {
                let name = frame
                    .function
                    .as_ref()
                    .and_then(|f| f.raw_name().ok())
                    .map(|name| name.into_owned());
                let (source, line) = frame
                    .location
                    .map(|loc| (loc.file.map(str::to_string), loc.line))
                    .unwrap_or_default();
                if let Some(name) = name {
                    found = Some(Symbol { name, source, line });
                } else if source.is_some() {
                    found = self
                        .nearest_symbol(pc)
                        .map(|sym| Symbol { name: sym.name.clone(), source, line });
                }
            }
        }

        found.or_else(|| self.nearest_symbol(pc).map(|sym| Symbol::named(sym.name.clone())))
    }
}
