//! Synthetic ELF64 little-endian images for resolver tests.
//!
//! Layout: ELF header, optional `PT_LOAD` program header, `.text` contents,
//! `.symtab`, `.strtab`, `.shstrtab`, optional `.gnu_debuglink`, then the
//! section header table.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

const EHDR_SIZE: usize = 64;
const PHDR_SIZE: usize = 56;
const SHDR_SIZE: usize = 64;
const SYM_SIZE: usize = 24;

const SHT_PROGBITS: u32 = 1;
const SHT_SYMTAB: u32 = 2;
const SHT_STRTAB: u32 = 3;
const SHF_ALLOC_EXEC: u64 = 0x6;

pub struct ElfBuilder {
    load_vaddr: Option<u64>,
    text_addr: u64,
    text_size: u64,
    functions: Vec<(String, u64, u64)>,
    debuglink: Option<String>,
}

impl Default for ElfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ElfBuilder {
    /// Position-independent image with `.text` at `[0x1000, 0x2000)`.
    pub fn new() -> Self {
        Self {
            load_vaddr: Some(0),
            text_addr: 0x1000,
            text_size: 0x1000,
            functions: Vec::new(),
            debuglink: None,
        }
    }

    /// Virtual address of the `PT_LOAD` segment at file offset 0.
    pub fn load_vaddr(mut self, vaddr: u64) -> Self {
        self.load_vaddr = Some(vaddr);
        self
    }

    pub fn without_program_headers(mut self) -> Self {
        self.load_vaddr = None;
        self
    }

    pub fn text(mut self, addr: u64, size: u64) -> Self {
        self.text_addr = addr;
        self.text_size = size;
        self
    }

    pub fn function(mut self, name: &str, addr: u64, size: u64) -> Self {
        self.functions.push((name.to_string(), addr, size));
        self
    }

    pub fn debuglink(mut self, name: &str) -> Self {
        self.debuglink = Some(name.to_string());
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; EHDR_SIZE];
        if self.load_vaddr.is_some() {
            out.resize(EHDR_SIZE + PHDR_SIZE, 0);
        }

        align(&mut out, 16);
        let text_offset = out.len();
        out.resize(text_offset + self.text_size as usize, 0xcc);

        // .strtab
        let mut strtab = vec![0u8];
        let mut name_offsets = Vec::new();
        for (name, _, _) in &self.functions {
            name_offsets.push(strtab.len() as u32);
            strtab.extend_from_slice(name.as_bytes());
            strtab.push(0);
        }

        // .symtab: null symbol, then global functions in .text (section 1)
        align(&mut out, 8);
        let symtab_offset = out.len();
        out.extend_from_slice(&[0u8; SYM_SIZE]);
        for ((_, addr, size), name) in self.functions.iter().zip(&name_offsets) {
            out.extend_from_slice(&name.to_le_bytes());
            out.push(0x12); // STB_GLOBAL | STT_FUNC
            out.push(0);
            out.extend_from_slice(&1u16.to_le_bytes());
            out.extend_from_slice(&addr.to_le_bytes());
            out.extend_from_slice(&size.to_le_bytes());
        }
        let symtab_size = out.len() - symtab_offset;

        let strtab_offset = out.len();
        out.extend_from_slice(&strtab);

        let mut section_names = vec![".text", ".symtab", ".strtab", ".shstrtab"];
        if self.debuglink.is_some() {
            section_names.push(".gnu_debuglink");
        }
        let mut shstrtab = vec![0u8];
        let mut shname_offsets = Vec::new();
        for name in &section_names {
            shname_offsets.push(shstrtab.len() as u32);
            shstrtab.extend_from_slice(name.as_bytes());
            shstrtab.push(0);
        }
        let shstrtab_offset = out.len();
        out.extend_from_slice(&shstrtab);

        let debuglink_section = self.debuglink.as_ref().map(|name| {
            align(&mut out, 4);
            let offset = out.len();
            out.extend_from_slice(name.as_bytes());
            out.push(0);
            align(&mut out, 4);
            out.extend_from_slice(&0u32.to_le_bytes()); // crc
            (offset, out.len() - offset)
        });

        align(&mut out, 8);
        let shoff = out.len();
        out.extend_from_slice(&[0u8; SHDR_SIZE]);
        push_section(
            &mut out,
            shname_offsets[0],
            SHT_PROGBITS,
            SHF_ALLOC_EXEC,
            self.text_addr,
            text_offset,
            self.text_size as usize,
            0,
            0,
            0,
        );
        let names = &shname_offsets;
        push_section(
            &mut out,
            names[1],
            SHT_SYMTAB,
            0,
            0,
            symtab_offset,
            symtab_size,
            3,
            1,
            SYM_SIZE,
        );
        push_section(&mut out, names[2], SHT_STRTAB, 0, 0, strtab_offset, strtab.len(), 0, 0, 0);
        let shstrtab_size = shstrtab.len();
        push_section(&mut out, names[3], SHT_STRTAB, 0, 0, shstrtab_offset, shstrtab_size, 0, 0, 0);
        if let Some((offset, size)) = debuglink_section {
            push_section(&mut out, shname_offsets[4], SHT_PROGBITS, 0, 0, offset, size, 0, 0, 0);
        }
        let shnum = section_names.len() + 1;

        // ELF header
        out[..4].copy_from_slice(b"\x7fELF");
        out[4] = 2; // ELFCLASS64
        out[5] = 1; // ELFDATA2LSB
        out[6] = 1; // EV_CURRENT
        let e_type: u16 = if self.load_vaddr == Some(0) { 3 } else { 2 };
        out[16..18].copy_from_slice(&e_type.to_le_bytes());
        out[18..20].copy_from_slice(&62u16.to_le_bytes()); // EM_X86_64
        out[20..24].copy_from_slice(&1u32.to_le_bytes());
        out[24..32].copy_from_slice(&self.text_addr.to_le_bytes());
        if self.load_vaddr.is_some() {
            out[32..40].copy_from_slice(&(EHDR_SIZE as u64).to_le_bytes());
        }
        out[40..48].copy_from_slice(&(shoff as u64).to_le_bytes());
        out[52..54].copy_from_slice(&(EHDR_SIZE as u16).to_le_bytes());
        out[54..56].copy_from_slice(&(PHDR_SIZE as u16).to_le_bytes());
        out[56..58].copy_from_slice(&u16::from(self.load_vaddr.is_some()).to_le_bytes());
        out[58..60].copy_from_slice(&(SHDR_SIZE as u16).to_le_bytes());
        out[60..62].copy_from_slice(&(shnum as u16).to_le_bytes());
        out[62..64].copy_from_slice(&4u16.to_le_bytes()); // .shstrtab

        if let Some(vaddr) = self.load_vaddr {
            let file_size = out.len() as u64;
            let ph = &mut out[EHDR_SIZE..EHDR_SIZE + PHDR_SIZE];
            ph[0..4].copy_from_slice(&1u32.to_le_bytes()); // PT_LOAD
            ph[4..8].copy_from_slice(&5u32.to_le_bytes()); // R+X
            ph[8..16].copy_from_slice(&0u64.to_le_bytes());
            ph[16..24].copy_from_slice(&vaddr.to_le_bytes());
            ph[24..32].copy_from_slice(&vaddr.to_le_bytes());
            ph[32..40].copy_from_slice(&file_size.to_le_bytes());
            ph[40..48].copy_from_slice(&file_size.to_le_bytes());
            ph[48..56].copy_from_slice(&0x1000u64.to_le_bytes());
        }
        out
    }

    pub fn write_to(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, self.build()).unwrap();
    }
}

fn align(out: &mut Vec<u8>, to: usize) {
    let padded = out.len().div_ceil(to) * to;
    out.resize(padded, 0);
}

#[allow(clippy::too_many_arguments)]
fn push_section(
    out: &mut Vec<u8>,
    name: u32,
    kind: u32,
    flags: u64,
    addr: u64,
    offset: usize,
    size: usize,
    link: u32,
    info: u32,
    entsize: usize,
) {
    out.extend_from_slice(&name.to_le_bytes());
    out.extend_from_slice(&kind.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&(offset as u64).to_le_bytes());
    out.extend_from_slice(&(size as u64).to_le_bytes());
    out.extend_from_slice(&link.to_le_bytes());
    out.extend_from_slice(&info.to_le_bytes());
    out.extend_from_slice(&8u64.to_le_bytes()); // addralign
    out.extend_from_slice(&(entsize as u64).to_le_bytes());
}

/// The `/lib/libfoo.so` image of the end-to-end scenario: linked at 0x1000,
/// with `bar` covering `[0x1050, 0x1080)`.
pub fn libfoo() -> ElfBuilder {
    ElfBuilder::new().load_vaddr(0x1000).function("bar", 0x1050, 0x30)
}

/// Header line for a trace recorded on this machine.
pub fn native_header() -> String {
    format!("version=2.0, arch={}, pid=1234, backtrace depth=10, ", std::env::consts::ARCH)
}
