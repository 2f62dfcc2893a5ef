//! Lazily loaded resolver state for one module (or for all of them, when a
//! single record is shared).

use log::debug;
use std::path::Path;

use super::elf_image::ElfImage;
use super::strategy::{reconcile, Symbol, SymbolLookup};
use super::symbolizer::Symbolizer;
use crate::domain::{ModuleId, ResolveError, ResolveMethod};

/// Loaded lookup strategies plus the module they were loaded for.
///
/// At most one module is active at a time. Loading another one tears the
/// current state down first, so a shared record never holds more than one
/// module's images and tables.
#[derive(Default)]
pub struct SymbolCache {
    active: Option<ModuleId>,
    image: Option<ElfImage>,
    debug: Option<Symbolizer>,
}

impl std::fmt::Debug for SymbolCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolCache")
            .field("active", &self.active)
            .field("image", &self.image)
            .field("debug", &self.debug.as_ref().map(Symbolizer::symbol_count))
            .finish()
    }
}

impl SymbolCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn active_module(&self) -> Option<ModuleId> {
        self.active
    }

    #[must_use]
    pub fn is_loaded_for(&self, module: ModuleId) -> bool {
        self.active == Some(module)
    }

    /// Releases the mapped image and parsed tables.
    pub fn clear(&mut self) {
        if let Some(module) = self.active.take() {
            debug!("releasing symbol cache of module {module}");
        }
        self.image = None;
        self.debug = None;
    }

    /// Loads the strategies `method` needs for `module`, replacing whatever
    /// was loaded before.
    ///
    /// # Errors
    /// Returns an error if the image cannot be mapped or its symbols cannot be
    /// loaded. The record is left empty in that case.
    pub fn load(
        &mut self,
        module: ModuleId,
        host_path: &Path,
        method: ResolveMethod,
        system_root: &Path,
    ) -> Result<(), ResolveError> {
        self.clear();

        let image = if method.uses_elf() {
            let image = ElfImage::open(host_path).map_err(|source| {
                ResolveError::ImageUnavailable { path: host_path.to_path_buf(), source }
            })?;
            Some(image)
        } else {
            None
        };
        let debug = if method.uses_dwarf() {
            Some(Symbolizer::open(host_path, system_root)?)
        } else {
            None
        };

        debug!("symbol cache loaded for module {module} ({})", host_path.display());
        self.image = image;
        self.debug = debug;
        self.active = Some(module);
        Ok(())
    }

    /// Runs the loaded strategies on a file-relative address and reconciles
    /// their answers.
    #[must_use]
    pub fn lookup(&self, address: u64, method: ResolveMethod) -> Option<Symbol> {
        let dwarf = self.debug.as_ref().and_then(|symbolizer| symbolizer.lookup(address));
        let elf = self.image.as_ref().and_then(|image| image.lookup(address));
        reconcile(method, dwarf, elf)
    }
}
