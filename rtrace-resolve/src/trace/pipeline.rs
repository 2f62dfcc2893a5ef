//! Resolving passes over a text trace
//!
//! Direct mode resolves backtrace lines while streaming. Multi-pass mode
//! stages the addresses of every module into a scratch file, resolves the
//! modules one after another, then reassembles the output in input order
//! from an index file. Both produce the same output.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use super::header::{Header, FILTER_RESOLVE};
use super::records::{parse_backtrace, parse_index, parse_mapping, MappingRecord};
use crate::domain::{ModuleId, TraceError};
use crate::resolver::Resolver;

/// Name of the multi-pass index file.
pub const INDEX_FILE: &str = "rtrace.index";

/// How a pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    /// Stopped early by the abort flag; output written so far is kept.
    Interrupted,
}

/// Reads one line without its terminator. Invalid UTF-8 is replaced.
fn read_line<R: BufRead>(reader: &mut R) -> io::Result<Option<String>> {
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw)? == 0 {
        return Ok(None);
    }
    if raw.last() == Some(&b'\n') {
        raw.pop();
    }
    let line = String::from_utf8(raw)
        .unwrap_or_else(|e| String::from_utf8_lossy(e.as_bytes()).into_owned());
    Ok(Some(line))
}

fn aborted(abort: &AtomicBool) -> bool {
    abort.load(Ordering::Relaxed)
}

/// Copies the header line, checking the architecture and adding the
/// `resolve` filter tag.
///
/// # Errors
/// Fails on an empty input, on an architecture mismatch without a system
/// root, and on I/O errors.
pub fn copy_header<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    has_system_root: bool,
) -> Result<Header, TraceError> {
    let line = read_line(input)?.ok_or(TraceError::MissingHeader)?;
    let mut header = Header::parse(&line);
    header.check_arch(std::env::consts::ARCH, has_system_root)?;
    header.set_filter_mask(header.filter_mask() | FILTER_RESOLVE);
    writeln!(output, "{header}")?;
    Ok(header)
}

fn register(resolver: &mut Resolver, record: &MappingRecord<'_>) -> Option<ModuleId> {
    match resolver.add_module(record.module, record.from, record.to) {
        Ok(module) => Some(module.id()),
        Err(e) => {
            warn!("ignoring mapping: {e}");
            None
        }
    }
}

/// Resolves every backtrace line of `input` in place.
///
/// # Errors
/// Returns an error if reading the input or writing the output fails.
pub fn process_direct<R: BufRead, W: Write>(
    resolver: &mut Resolver,
    input: &mut R,
    output: &mut W,
    abort: &AtomicBool,
) -> Result<Outcome, TraceError> {
    while let Some(line) = read_line(input)? {
        if aborted(abort) {
            return Ok(Outcome::Interrupted);
        }
        if let Some(record) = parse_mapping(&line) {
            register(resolver, &record);
            writeln!(output, "{line}")?;
        } else if let Some(record) = parse_backtrace(&line) {
            writeln!(output, "{}", resolver.resolve(record.address, record.name))?;
        } else {
            writeln!(output, "{line}")?;
        }
    }
    Ok(Outcome::Completed)
}

/// Scratch files of one module.
struct ModuleScratch {
    module: String,
    input_path: PathBuf,
    output_path: PathBuf,
    staged: Option<BufWriter<File>>,
    resolved: Option<BufReader<File>>,
}

/// Scratch files of a multi-pass run, removed when dropped.
struct Scratch {
    dir: PathBuf,
    index_path: PathBuf,
    modules: HashMap<ModuleId, ModuleScratch>,
}

impl Scratch {
    fn new(dir: &Path) -> Self {
        Self { dir: dir.to_path_buf(), index_path: dir.join(INDEX_FILE), modules: HashMap::new() }
    }

    fn create_index(&self) -> Result<BufWriter<File>, TraceError> {
        Ok(BufWriter::new(File::create(&self.index_path)?))
    }

    fn add_module(&mut self, id: ModuleId, module: &str) -> Result<(), TraceError> {
        let base = module.rsplit('/').next().unwrap_or(module);
        let input_path = self.dir.join(format!("rtrace.in.{id}.{base}"));
        let output_path = self.dir.join(format!("rtrace.out.{id}.{base}"));
        let staged = BufWriter::new(File::create(&input_path)?);
        self.modules.insert(
            id,
            ModuleScratch {
                module: module.to_string(),
                input_path,
                output_path,
                staged: Some(staged),
                resolved: None,
            },
        );
        Ok(())
    }

    fn stage(&mut self, id: ModuleId, line: &str) -> Result<bool, TraceError> {
        match self.modules.get_mut(&id).and_then(|scratch| scratch.staged.as_mut()) {
            Some(staged) => {
                writeln!(staged, "{line}")?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Next resolved line of module `id`, in staging order.
    fn next_resolved(&mut self, id: ModuleId) -> Result<String, TraceError> {
        let scratch = self.modules.get_mut(&id).ok_or(TraceError::UnknownModuleId(id.0))?;
        let reader = match scratch.resolved.take() {
            Some(reader) => reader,
            None => BufReader::new(File::open(&scratch.output_path)?),
        };
        let reader = scratch.resolved.insert(reader);
        read_line(reader)?.ok_or_else(|| TraceError::ScratchExhausted(scratch.module.clone()))
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        let modules = self
            .modules
            .values()
            .flat_map(|scratch| [&scratch.input_path, &scratch.output_path]);
        for path in modules.chain(std::iter::once(&self.index_path)) {
            if let Err(e) = fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!("failed to remove {}: {e}", path.display());
                }
            }
        }
    }
}

/// Resolves `input` module by module, using scratch files in `work_dir`.
///
/// # Errors
/// Returns an error on I/O failures, including scratch file creation, and if
/// the staged data does not match the index.
pub fn process_multi_pass<R: BufRead, W: Write>(
    resolver: &mut Resolver,
    input: &mut R,
    output: &mut W,
    work_dir: &Path,
    abort: &AtomicBool,
) -> Result<Outcome, TraceError> {
    let mut scratch = Scratch::new(work_dir);

    if index_input(resolver, input, &mut scratch, abort)? == Outcome::Interrupted {
        return Ok(Outcome::Interrupted);
    }
    if resolve_staged(resolver, &mut scratch, abort)? == Outcome::Interrupted {
        return Ok(Outcome::Interrupted);
    }

    // 3. replay the index, substituting placeholders
    let mut index = BufReader::new(File::open(&scratch.index_path)?);
    while let Some(line) = read_line(&mut index)? {
        if aborted(abort) {
            return Ok(Outcome::Interrupted);
        }
        match parse_index(&line) {
            Some(id) => writeln!(output, "{}", scratch.next_resolved(ModuleId(id))?)?,
            None => writeln!(output, "{line}")?,
        }
    }
    Ok(Outcome::Completed)
}

/// Pass 1: backtrace lines of known modules go to the module's scratch file
/// and leave a `^<id>` placeholder in the index; everything else is written
/// to the index as final output.
fn index_input<R: BufRead>(
    resolver: &mut Resolver,
    input: &mut R,
    scratch: &mut Scratch,
    abort: &AtomicBool,
) -> Result<Outcome, TraceError> {
    let mut index = scratch.create_index()?;
    while let Some(line) = read_line(input)? {
        if aborted(abort) {
            return Ok(Outcome::Interrupted);
        }
        if let Some(record) = parse_mapping(&line) {
            if let Some(id) = register(resolver, &record) {
                scratch.add_module(id, record.module)?;
            }
            writeln!(index, "{line}")?;
        } else if let Some(record) = parse_backtrace(&line) {
            let owner = resolver.find_module(record.address).map(|module| module.id());
            let staged = match owner {
                Some(id) => scratch.stage(id, &line)?.then_some(id),
                None => None,
            };
            match staged {
                Some(id) => writeln!(index, "^{id}")?,
                // nothing to stage against; resolved now, as direct mode would
                None => writeln!(index, "{}", resolver.resolve(record.address, record.name))?,
            }
        } else {
            writeln!(index, "{line}")?;
        }
    }
    index.flush()?;
    Ok(Outcome::Completed)
}

/// Pass 2: resolves each module's staged addresses in one contiguous run,
/// against the module they were staged under.
fn resolve_staged(
    resolver: &mut Resolver,
    scratch: &mut Scratch,
    abort: &AtomicBool,
) -> Result<Outcome, TraceError> {
    let order: Vec<ModuleId> = resolver.modules().iter().map(|module| module.id()).collect();
    for id in order {
        let Some(files) = scratch.modules.get_mut(&id) else {
            continue;
        };
        let Some(mut staged) = files.staged.take() else {
            continue;
        };
        staged.flush()?;
        drop(staged);

        let mut addresses = BufReader::new(File::open(&files.input_path)?);
        let mut resolved = BufWriter::new(File::create(&files.output_path)?);
        // names cached for another module mapped over this range
        resolver.invalidate_names(id);
        let mut count = 0usize;
        while let Some(line) = read_line(&mut addresses)? {
            if aborted(abort) {
                return Ok(Outcome::Interrupted);
            }
            match parse_backtrace(&line) {
                Some(record) => {
                    writeln!(resolved, "{}", resolver.resolve_in(id, record.address, record.name))?;
                    count += 1;
                }
                None => warn!("unexpected line in module address file: {line}"),
            }
        }
        resolved.flush()?;
        info!("{}: resolved {count} addresses", files.module);
    }
    Ok(Outcome::Completed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResolveOptions;
    use std::io::Cursor;

    fn run_direct(input: &str) -> String {
        let mut resolver = Resolver::new(ResolveOptions::default());
        let mut output = Vec::new();
        let abort = AtomicBool::new(false);
        let outcome =
            process_direct(&mut resolver, &mut Cursor::new(input), &mut output, &abort).unwrap();
        assert_eq!(outcome, Outcome::Completed);
        String::from_utf8(output).unwrap()
    }

    #[test]
    fn test_copy_header() {
        let mut input = Cursor::new(format!("arch={}, pid=1, \n\t0x10\n", std::env::consts::ARCH));
        let mut output = Vec::new();
        copy_header(&mut input, &mut output, false).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(text.starts_with("version=2.0, "));
        assert!(text.ends_with("filter=resolve, \n"));
        // the body is left for the pass
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("\t0x10"));
    }

    #[test]
    fn test_copy_header_errors() {
        let mut output = Vec::new();
        assert!(matches!(
            copy_header(&mut Cursor::new(""), &mut output, false),
            Err(TraceError::MissingHeader)
        ));
        assert!(matches!(
            copy_header(&mut Cursor::new("arch=no-such-arch, \n"), &mut output, false),
            Err(TraceError::ArchMismatch { .. })
        ));
        assert!(copy_header(&mut Cursor::new("arch=no-such-arch, \n"), &mut output, true).is_ok());
    }

    #[test]
    fn test_direct_keeps_line_count() {
        let input = "1. malloc(16) = 0x601010\n\t0x4005d0\n\t0x4005d0 (main())\n\
                     : /nonexistent/lib.so => 0x1000-0x2000\n\n";
        let output = run_direct(input);
        assert_eq!(output.lines().count(), input.lines().count());
        assert_eq!(
            output,
            "1. malloc(16) = 0x601010\n\t0x4005d0 in ??\n\t0x4005d0 in ??\n\
             : /nonexistent/lib.so => 0x1000-0x2000\n\n"
        );
    }

    #[test]
    fn test_direct_stops_when_aborted() {
        let mut resolver = Resolver::new(ResolveOptions::default());
        let mut output = Vec::new();
        let abort = AtomicBool::new(true);
        let outcome =
            process_direct(&mut resolver, &mut Cursor::new("\t0x10\n"), &mut output, &abort)
                .unwrap();
        assert_eq!(outcome, Outcome::Interrupted);
        assert!(output.is_empty());
    }

    #[test]
    fn test_multi_pass_without_modules_matches_direct() {
        let input = "1. malloc(16) = 0x601010\n\t0x4005d0\n\t0x10 (kept)\n";
        let dir = tempfile::tempdir().unwrap();
        let mut resolver = Resolver::new(ResolveOptions::default());
        let mut output = Vec::new();
        let abort = AtomicBool::new(false);
        let outcome = process_multi_pass(
            &mut resolver,
            &mut Cursor::new(input),
            &mut output,
            dir.path(),
            &abort,
        )
        .unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert_eq!(String::from_utf8(output).unwrap(), run_direct(input));
        // scratch files are gone
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_read_line_handles_invalid_utf8() {
        let mut input = Cursor::new(b"ab\xffc\nlast".to_vec());
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("ab\u{fffd}c"));
        assert_eq!(read_line(&mut input).unwrap().as_deref(), Some("last"));
        assert_eq!(read_line(&mut input).unwrap(), None);
    }
}
