//! Module mappings of the traced process
//!
//! Every `: <module> => 0x<from>-0x<to>` record of a trace registers one
//! mapping. Mappings are kept sorted by start address for range lookups, and
//! in a flat table by registration id for multi-pass index replay.

use log::info;
use std::cell::RefCell;
use std::cmp::Ordering;
use std::path::Path;
use std::rc::Rc;

use super::elf_image::ElfImage;
use super::symbol_cache::SymbolCache;
use crate::domain::{ModuleId, ResolveError};
use crate::sorted_array::SortedArray;

/// Initial size of the id → module table.
const ID_TABLE_CAPACITY: usize = 256;

/// Memory range of a loaded binary in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

impl MemoryRange {
    /// Check if an address falls within this memory range
    #[must_use]
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.start && addr < self.end
    }

    /// Like [`contains`](Self::contains), but also accepting `end` itself, the
    /// way trace mapping records are matched.
    #[must_use]
    pub fn covers(&self, addr: u64) -> bool {
        addr >= self.start && addr <= self.end
    }

    /// Ordering of the whole range relative to `addr`: `Equal` when covered.
    #[must_use]
    pub fn locate(&self, addr: u64) -> Ordering {
        if self.end < addr {
            Ordering::Less
        } else if self.start > addr {
            Ordering::Greater
        } else {
            Ordering::Equal
        }
    }
}

/// One loaded module of the traced process.
#[derive(Debug)]
pub struct ModuleMapping {
    id: ModuleId,
    path: String,
    range: MemoryRange,
    is_absolute: bool,
    cache: Rc<RefCell<SymbolCache>>,
    owns_cache: bool,
}

impl ModuleMapping {
    #[must_use]
    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// Module path as recorded in the trace (target filesystem).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn range(&self) -> MemoryRange {
        self.range
    }

    /// True when runtime addresses inside the module are file addresses.
    #[must_use]
    pub fn is_absolute(&self) -> bool {
        self.is_absolute
    }

    /// False when the symbol cache record is the process-wide shared one.
    #[must_use]
    pub fn owns_cache(&self) -> bool {
        self.owns_cache
    }

    #[must_use]
    pub fn cache(&self) -> &Rc<RefCell<SymbolCache>> {
        &self.cache
    }

    /// Translates a runtime address into the address it has in the image.
    #[must_use]
    pub fn file_address(&self, addr: u64) -> u64 {
        if self.is_absolute {
            addr
        } else {
            addr.wrapping_sub(self.range.start)
        }
    }
}

fn by_start(a: &Rc<ModuleMapping>, b: &Rc<ModuleMapping>) -> Ordering {
    a.range.start.cmp(&b.range.start)
}

/// All registered modules, sorted by start address.
pub struct ModuleIndex {
    modules: SortedArray<Rc<ModuleMapping>>,
    by_id: Vec<Rc<ModuleMapping>>,
    shared_cache: Rc<RefCell<SymbolCache>>,
}

impl Default for ModuleIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleIndex {
    #[must_use]
    pub fn new() -> Self {
        Self {
            modules: SortedArray::new(by_start),
            by_id: Vec::with_capacity(ID_TABLE_CAPACITY),
            shared_cache: Rc::new(RefCell::new(SymbolCache::new())),
        }
    }

    /// Registers the module `path` mapped at `[from, to]`.
    ///
    /// `host_path` is where the file lives on this machine. It is probed once
    /// to decide whether the module is position independent.
    ///
    /// # Errors
    /// Returns [`ResolveError::ModuleRejected`] when the file cannot be opened
    /// or is not a well-formed ELF image.
    pub fn add_module(
        &mut self,
        path: &str,
        host_path: &Path,
        from: u64,
        to: u64,
        single_cache: bool,
    ) -> Result<Rc<ModuleMapping>, ResolveError> {
        let rejected = |source| ResolveError::ModuleRejected { path: path.to_string(), source };
        let image = ElfImage::open(host_path).map_err(rejected)?;
        let is_absolute = image.is_absolute().map_err(rejected)?;

        let (cache, owns_cache) = if single_cache {
            (Rc::clone(&self.shared_cache), false)
        } else {
            (Rc::new(RefCell::new(SymbolCache::new())), true)
        };

        if self.by_id.len() == self.by_id.capacity() {
            self.by_id.reserve_exact(self.by_id.capacity().max(ID_TABLE_CAPACITY));
        }
        let module = Rc::new(ModuleMapping {
            id: ModuleId(self.by_id.len()),
            path: path.to_string(),
            range: MemoryRange { start: from, end: to },
            is_absolute,
            cache,
            owns_cache,
        });
        self.modules.add(Rc::clone(&module));
        self.by_id.push(Rc::clone(&module));

        info!(
            "module {}: {path} 0x{from:x}-0x{to:x}{}",
            module.id,
            if is_absolute { "" } else { " (position independent)" }
        );
        Ok(module)
    }

    /// The module whose range covers `addr`, if any.
    #[must_use]
    pub fn find(&self, addr: u64) -> Option<&Rc<ModuleMapping>> {
        self.modules.find_by(|module| module.range.locate(addr))
    }

    /// The module registered with `id`.
    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Rc<ModuleMapping>> {
        self.by_id.get(id.0)
    }

    /// Modules in address order.
    pub fn iter(&self) -> std::slice::Iter<'_, Rc<ModuleMapping>> {
        self.modules.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    #[must_use]
    pub fn shared_cache(&self) -> &Rc<RefCell<SymbolCache>> {
        &self.shared_cache
    }
}
