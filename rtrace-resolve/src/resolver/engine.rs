//! Address → text line resolution.

use log::{debug, warn};
use std::collections::HashSet;
use std::rc::Rc;

use super::format;
use crate::domain::{ModuleId, ResolveError, ResolveOptions};
use crate::name_cache::NameCache;
use crate::symbolization::{ModuleIndex, ModuleMapping};

/// Resolution context for one trace: registered modules, the resolved name
/// cache and the options every lookup runs with.
///
/// Single threaded; each pass over a trace owns one `Resolver`.
pub struct Resolver {
    options: ResolveOptions,
    modules: ModuleIndex,
    names: NameCache,
    /// Modules whose symbols failed to load; not retried.
    failed: HashSet<ModuleId>,
}

impl Resolver {
    #[must_use]
    pub fn new(options: ResolveOptions) -> Self {
        Self::with_name_cache(options, NameCache::new())
    }

    #[must_use]
    pub fn with_name_cache(options: ResolveOptions, names: NameCache) -> Self {
        Self { options, modules: ModuleIndex::new(), names, failed: HashSet::new() }
    }

    #[must_use]
    pub fn options(&self) -> &ResolveOptions {
        &self.options
    }

    #[must_use]
    pub fn modules(&self) -> &ModuleIndex {
        &self.modules
    }

    #[must_use]
    pub fn name_cache(&self) -> &NameCache {
        &self.names
    }

    /// Registers a module mapping of the traced process.
    ///
    /// Names cached for addresses in `[from, to]` are dropped, since they were
    /// resolved against a different (or no) mapping.
    ///
    /// # Errors
    /// Returns an error if the module file is missing or not an ELF image.
    pub fn add_module(
        &mut self,
        path: &str,
        from: u64,
        to: u64,
    ) -> Result<Rc<ModuleMapping>, ResolveError> {
        let host_path = self.options.host_path(path);
        let single_cache = self.options.single_cache;
        let module = self.modules.add_module(path, &host_path, from, to, single_cache)?;
        let dropped = self.names.remove_range(from, to);
        if dropped > 0 {
            debug!("{path}: dropped {dropped} cached names");
        }
        Ok(module)
    }

    #[must_use]
    pub fn find_module(&self, address: u64) -> Option<&Rc<ModuleMapping>> {
        self.modules.find(address)
    }

    #[must_use]
    pub fn module(&self, id: ModuleId) -> Option<&Rc<ModuleMapping>> {
        self.modules.get(id)
    }

    /// Releases the symbols loaded for module `id` and forgets its cached names.
    ///
    /// A later lookup in the module loads it again, even if loading failed
    /// before. Returns false for an unknown id.
    pub fn unload_module(&mut self, id: ModuleId) -> bool {
        let Some(module) = self.modules.get(id).cloned() else {
            return false;
        };
        {
            let mut cache = module.cache().borrow_mut();
            if module.owns_cache() || cache.is_loaded_for(id) {
                cache.clear();
            }
        }
        self.failed.remove(&id);
        self.invalidate_names(id);
        debug!("unloaded module {id} ({})", module.path());
        true
    }

    /// Drops the cached names of module `id`'s address range.
    ///
    /// Returns the number of names dropped.
    pub fn invalidate_names(&mut self, id: ModuleId) -> usize {
        match self.modules.get(id) {
            Some(module) => {
                let range = module.range();
                self.names.remove_range(range.start, range.end)
            }
            None => 0,
        }
    }

    /// Resolves `address` into an output line (without trailing newline).
    ///
    /// `previous_name` is the name an earlier run attached to the address, or
    /// empty. It is echoed back instead of resolving when the options ask to
    /// keep resolved names.
    pub fn resolve(&mut self, address: u64, previous_name: &str) -> String {
        if self.options.keep_resolved && !previous_name.is_empty() {
            return format::kept_line(address, previous_name, self.options.full_path);
        }

        if let Some(line) = self.cached(address) {
            return line;
        }

        let line = match self.modules.find(address).cloned() {
            Some(module) => self.resolve_uncached(&module, address),
            None => format::unknown_line(address),
        };
        self.names.put(address, line.clone());
        line
    }

    /// Resolves `address` against module `id` without looking up its owner.
    ///
    /// Used when the owning module was decided earlier, before later mappings
    /// could cover the same range. An unknown id yields the unknown line.
    pub fn resolve_in(&mut self, id: ModuleId, address: u64, previous_name: &str) -> String {
        if self.options.keep_resolved && !previous_name.is_empty() {
            return format::kept_line(address, previous_name, self.options.full_path);
        }
        if let Some(line) = self.cached(address) {
            return line;
        }

        let line = match self.modules.get(id).cloned() {
            Some(module) => self.resolve_uncached(&module, address),
            None => format::unknown_line(address),
        };
        self.names.put(address, line.clone());
        line
    }

    fn cached(&mut self, address: u64) -> Option<String> {
        let line = self.names.get(address)?.to_string();
        self.names.record_hit(address);
        Some(line)
    }

    fn resolve_uncached(&mut self, module: &ModuleMapping, address: u64) -> String {
        if self.failed.contains(&module.id()) {
            return format::from_line(address, module.path());
        }

        let mut cache = module.cache().borrow_mut();
        if !cache.is_loaded_for(module.id()) {
            let host_path = self.options.host_path(module.path());
            let root = self.options.system_root();
            if let Err(e) = cache.load(module.id(), &host_path, self.options.method, root) {
                warn!("failed to load symbols of {}: {e}", module.path());
                self.failed.insert(module.id());
                return format::from_line(address, module.path());
            }
        }

        match cache.lookup(module.file_address(address), self.options.method) {
            Some(symbol) => {
                format::symbol_line(address, &symbol, module.path(), self.options.full_path)
            }
            None => format::from_line(address, module.path()),
        }
    }
}
