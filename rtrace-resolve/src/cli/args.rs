//! CLI argument definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::domain::{OperationMode, ResolveMethod, ResolveOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One symbol cache per module (fastest, most memory)
    FullCache,
    /// One shared symbol cache, reloaded on every module switch
    SingleCache,
    /// Stage addresses per module, resolve each module in one run
    MultiPass,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Method {
    /// Raw symbol table lookup (function names only)
    Elf,
    /// Debug information lookup (function, file and line)
    Bfd,
    /// Both, preferring the raw symbol table when they disagree
    Both,
}

impl From<Method> for ResolveMethod {
    fn from(method: Method) -> Self {
        match method {
            Method::Elf => Self::Elf,
            Method::Bfd => Self::Dwarf,
            Method::Both => Self::Both,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "rtrace-resolve",
    version,
    about = "Resolve backtrace addresses in text trace logs",
    after_help = "\
EXAMPLES:
    rtrace-resolve -i trace.txt -o trace.resolved.txt
    rtrace-resolve -m multi-pass -t both < trace.txt > resolved.txt
    rtrace-resolve -s /opt/target-rootfs -i arm-trace.txt"
)]
pub struct Args {
    /// Input file (default: standard input)
    #[arg(short, long, value_name = "FILE")]
    pub input_file: Option<PathBuf>,

    /// Output file (default: standard output)
    #[arg(short, long, value_name = "FILE")]
    pub output_file: Option<PathBuf>,

    /// Caching strategy
    #[arg(short, long, value_enum, default_value = "full-cache")]
    pub mode: Mode,

    /// Symbol lookup method
    #[arg(short = 't', long, value_enum, default_value = "bfd")]
    pub method: Method,

    /// Keep full source paths instead of file names only
    #[arg(short = 'p', long)]
    pub full_path: bool,

    /// Keep names already resolved in the input
    #[arg(short, long)]
    pub keep_resolved: bool,

    /// Only report errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Target system root, prefixed to module paths
    #[arg(short, long, value_name = "DIR")]
    pub sysroot: Option<PathBuf>,

    /// Directory for multi-pass scratch files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub work_dir: PathBuf,
}

impl Args {
    /// Resolver options selected by the arguments.
    #[must_use]
    pub fn to_options(&self) -> ResolveOptions {
        ResolveOptions {
            method: self.method.into(),
            keep_resolved: self.keep_resolved,
            full_path: self.full_path,
            root_path: self.sysroot.clone(),
            // modules are resolved contiguously in multi-pass mode
            single_cache: self.mode != Mode::FullCache,
            mode: match self.mode {
                Mode::MultiPass => OperationMode::MultiPass,
                Mode::FullCache | Mode::SingleCache => OperationMode::Direct,
            },
        }
    }
}
