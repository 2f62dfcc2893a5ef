//! Raw ELF image access
//!
//! Maps a binary read-only and walks its headers by hand: the program header
//! table (to tell position-independent modules apart) and the section header
//! table (to scan `.symtab`/`.dynsym` for the function covering an address).
//! This is the fast, coarse lookup strategy: function names only, no source
//! attribution, but it reports the symbol whose extent really contains the
//! address, which the debug-info lookup gets wrong for some constructor thunks.
//!
//! Every table offset read from the file is checked against the mapped size
//! before use, so truncated or corrupt images fail the lookup instead of
//! reading out of bounds. Both ELF classes and both byte orders are handled.

#![allow(unsafe_code)] // Mmap::map requires unsafe

use log::debug;
use memmap2::Mmap;
use object::elf;
use std::borrow::Cow;
use std::fs::File;
use std::path::{Path, PathBuf};

use super::strategy::{Symbol, SymbolLookup};
use crate::domain::ElfError;

// e_ident layout
const EI_NIDENT: usize = 16;
const EI_CLASS: usize = 4;
const EI_DATA: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElfClass {
    Elf32,
    Elf64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Little,
    Big,
}

/// Header fields the raw lookups need.
#[derive(Debug, Clone, Copy)]
struct Header {
    phoff: u64,
    phentsize: u64,
    phnum: u64,
    shoff: u64,
    shentsize: u64,
    shnum: u64,
}

#[derive(Debug, Clone, Copy)]
struct SectionHeader {
    kind: u32,
    offset: u64,
    size: u64,
    link: u64,
    entsize: u64,
}

/// Bounds-checked, endian-aware reads from a byte slice.
#[derive(Clone, Copy)]
struct Reader<'a> {
    data: &'a [u8],
    encoding: Encoding,
    class: ElfClass,
}

impl<'a> Reader<'a> {
    fn bytes(&self, offset: u64, len: u64) -> Result<&'a [u8], ElfError> {
        let truncated = || ElfError::Truncated { offset, needed: len };
        let start = usize::try_from(offset).map_err(|_| truncated())?;
        let count = usize::try_from(len).map_err(|_| truncated())?;
        let end = start.checked_add(count).ok_or_else(truncated)?;
        self.data.get(start..end).ok_or_else(truncated)
    }

    fn array<const N: usize>(&self, offset: u64) -> Result<[u8; N], ElfError> {
        let bytes = self.bytes(offset, N as u64)?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&self, offset: u64) -> Result<u8, ElfError> {
        Ok(self.array::<1>(offset)?[0])
    }

    fn u16(&self, offset: u64) -> Result<u16, ElfError> {
        let raw = self.array(offset)?;
        Ok(match self.encoding {
            Encoding::Little => u16::from_le_bytes(raw),
            Encoding::Big => u16::from_be_bytes(raw),
        })
    }

    fn u32(&self, offset: u64) -> Result<u32, ElfError> {
        let raw = self.array(offset)?;
        Ok(match self.encoding {
            Encoding::Little => u32::from_le_bytes(raw),
            Encoding::Big => u32::from_be_bytes(raw),
        })
    }

    fn u64(&self, offset: u64) -> Result<u64, ElfError> {
        let raw = self.array(offset)?;
        Ok(match self.encoding {
            Encoding::Little => u64::from_le_bytes(raw),
            Encoding::Big => u64::from_be_bytes(raw),
        })
    }

    /// Address/offset sized field: 4 bytes in ELF32, 8 in ELF64.
    fn word(&self, offset: u64) -> Result<u64, ElfError> {
        match self.class {
            ElfClass::Elf32 => self.u32(offset).map(u64::from),
            ElfClass::Elf64 => self.u64(offset),
        }
    }

    fn at(&self, data: &'a [u8]) -> Self {
        Self { data, ..*self }
    }
}

/// A read-only mapped ELF file.
pub struct ElfImage {
    path: PathBuf,
    map: Mmap,
    class: ElfClass,
    encoding: Encoding,
}

impl std::fmt::Debug for ElfImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElfImage")
            .field("path", &self.path)
            .field("size", &self.map.len())
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

impl ElfImage {
    /// Maps `path` and checks the ELF identification bytes.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or mapped, is shorter than
    /// the identification block, or is not an ELF file of a known class/encoding.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ElfError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        if size < EI_NIDENT as u64 {
            return Err(ElfError::TooShort(size));
        }

        // Safety: read-only private mapping of a regular file; the resolver never
        // writes through it and trace post-processing does not race with rebuilds.
        let map = unsafe { Mmap::map(&file)? };

        if map[..elf::ELFMAG.len()] != elf::ELFMAG {
            return Err(ElfError::BadMagic);
        }
        let class = match map[EI_CLASS] {
            elf::ELFCLASS32 => ElfClass::Elf32,
            elf::ELFCLASS64 => ElfClass::Elf64,
            other => return Err(ElfError::UnsupportedClass(other)),
        };
        let encoding = match map[EI_DATA] {
            elf::ELFDATA2LSB => Encoding::Little,
            elf::ELFDATA2MSB => Encoding::Big,
            other => return Err(ElfError::UnsupportedEncoding(other)),
        };

        debug!("mapped {} ({} bytes, {:?})", path.display(), map.len(), class);
        Ok(Self { path: path.to_path_buf(), map, class, encoding })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn class(&self) -> ElfClass {
        self.class
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.map.len() as u64
    }

    fn reader(&self) -> Reader<'_> {
        Reader { data: &self.map, encoding: self.encoding, class: self.class }
    }

    fn header(&self) -> Result<Header, ElfError> {
        let r = self.reader();
        Ok(match self.class {
            ElfClass::Elf32 => Header {
                phoff: r.word(28)?,
                shoff: r.word(32)?,
                phentsize: r.u16(42)?.into(),
                phnum: r.u16(44)?.into(),
                shentsize: r.u16(46)?.into(),
                shnum: r.u16(48)?.into(),
            },
            ElfClass::Elf64 => Header {
                phoff: r.word(32)?,
                shoff: r.word(40)?,
                phentsize: r.u16(54)?.into(),
                phnum: r.u16(56)?.into(),
                shentsize: r.u16(58)?.into(),
                shnum: r.u16(60)?.into(),
            },
        })
    }

    /// Checks that `count` entries of `entsize` bytes at `offset` lie inside the image.
    fn check_table(
        &self,
        table: &'static str,
        offset: u64,
        entsize: u64,
        count: u64,
    ) -> Result<(), ElfError> {
        let end = entsize
            .checked_mul(count)
            .and_then(|len| len.checked_add(offset))
            .ok_or(ElfError::OutOfBounds { table, offset })?;
        if end > self.size() {
            return Err(ElfError::OutOfBounds { table, offset });
        }
        Ok(())
    }

    /// Whether addresses inside this module are already file addresses.
    ///
    /// The first loadable segment starting at file offset 0 decides: linked at
    /// virtual address 0 means the module is position independent and runtime
    /// addresses must be rebased. Without such a segment the module is absolute.
    ///
    /// # Errors
    /// Returns an error if the program header table does not fit in the image.
    pub fn is_absolute(&self) -> Result<bool, ElfError> {
        let header = self.header()?;
        let (entry_size, offset_at, vaddr_at) = match self.class {
            ElfClass::Elf32 => (32, 4, 8),
            ElfClass::Elf64 => (56, 8, 16),
        };
        if header.phnum == 0 {
            return Ok(true);
        }
        if header.phentsize < entry_size {
            return Err(ElfError::Truncated { offset: header.phoff, needed: entry_size });
        }
        self.check_table("program header", header.phoff, header.phentsize, header.phnum)?;

        let r = self.reader();
        for idx in 0..header.phnum {
            let base = header.phoff + idx * header.phentsize;
            if r.u32(base)? == elf::PT_LOAD && r.word(base + offset_at)? == 0 {
                return Ok(r.word(base + vaddr_at)? != 0);
            }
        }
        Ok(true)
    }

    fn section(&self, header: &Header, index: u64) -> Result<SectionHeader, ElfError> {
        let r = self.reader();
        let base = header.shoff + index * header.shentsize;
        Ok(match self.class {
            ElfClass::Elf32 => SectionHeader {
                kind: r.u32(base + 4)?,
                offset: r.word(base + 16)?,
                size: r.word(base + 20)?,
                link: r.u32(base + 24)?.into(),
                entsize: r.word(base + 36)?,
            },
            ElfClass::Elf64 => SectionHeader {
                kind: r.u32(base + 4)?,
                offset: r.word(base + 24)?,
                size: r.word(base + 32)?,
                link: r.u32(base + 40)?.into(),
                entsize: r.word(base + 56)?,
            },
        })
    }

    /// Finds the defined function symbol whose `[value, value + size)` extent
    /// contains the file-relative `address`.
    ///
    /// # Errors
    /// Returns an error if the section header table lies outside the image or a
    /// matching symbol's name cannot be read.
    pub fn find_function(&self, address: u64) -> Result<Option<Cow<'_, str>>, ElfError> {
        let header = self.header()?;
        let (min_shentsize, sym_size) = match self.class {
            ElfClass::Elf32 => (40, 16),
            ElfClass::Elf64 => (64, 24),
        };
        if header.shnum == 0 {
            return Ok(None);
        }
        if header.shentsize < min_shentsize {
            return Err(ElfError::Truncated { offset: header.shoff, needed: min_shentsize });
        }
        self.check_table("section header", header.shoff, header.shentsize, header.shnum)?;

        let r = self.reader();
        for idx in 0..header.shnum {
            let section = self.section(&header, idx)?;
            if section.kind != elf::SHT_SYMTAB && section.kind != elf::SHT_DYNSYM {
                continue;
            }
            if section.entsize < sym_size || section.link >= header.shnum {
                debug!("{}: skipping malformed symbol table section {idx}", self.path.display());
                continue;
            }
            let strings_header = self.section(&header, section.link)?;
            let (Ok(symbols), Ok(strings)) = (
                r.bytes(section.offset, section.size),
                r.bytes(strings_header.offset, strings_header.size),
            ) else {
                debug!("{}: symbol table section {idx} exceeds image", self.path.display());
                continue;
            };

            let Ok(entsize) = usize::try_from(section.entsize) else {
                continue;
            };
            for entry in symbols.chunks_exact(entsize) {
                let sym = r.at(entry);
                // (st_name, st_info, st_shndx, st_value, st_size) offsets
                let (info_at, shndx_at, value_at, size_at) = match self.class {
                    ElfClass::Elf32 => (12, 14, 4, 8),
                    ElfClass::Elf64 => (4, 6, 8, 16),
                };
                let name = sym.u32(0)?;
                let info = sym.u8(info_at)?;
                let shndx = sym.u16(shndx_at)?;
                let value = sym.word(value_at)?;
                let size = sym.word(size_at)?;
                if info & 0xf != elf::STT_FUNC || shndx == elf::SHN_UNDEF {
                    continue;
                }
                if address >= value && address - value < size {
                    let out_of_bounds =
                        ElfError::OutOfBounds { table: "string", offset: strings_header.offset };
                    return c_string(strings, name).map(Some).ok_or(out_of_bounds);
                }
            }
        }
        Ok(None)
    }
}

/// NUL-terminated, non-empty string at `offset` of a string table.
fn c_string(table: &[u8], offset: u32) -> Option<Cow<'_, str>> {
    let tail = table.get(usize::try_from(offset).ok()?..)?;
    let len = tail.iter().position(|&b| b == 0)?;
    (len > 0).then(|| String::from_utf8_lossy(&tail[..len]))
}

impl SymbolLookup for ElfImage {
    fn lookup(&self, address: u64) -> Option<Symbol> {
        match self.find_function(address) {
            Ok(found) => found.map(Symbol::named),
            Err(e) => {
                debug!("{}: raw symbol lookup of {address:#x} failed: {e}", self.path.display());
                None
            }
        }
    }
}
