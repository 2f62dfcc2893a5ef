//! # rtrace-resolve - Main Entry Point
//!
//! Reads a text trace log (file or stdin), resolves its backtrace addresses
//! and writes the result (file or stdout):
//! - **Direct** (`-m full-cache`, `-m single-cache`): resolve while streaming
//! - **Multi-pass** (`-m multi-pass`): stage addresses per module in scratch
//!   files, resolve module by module, reassemble

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};

use rtrace_resolve::cli::Args;
use rtrace_resolve::domain::OperationMode;
use rtrace_resolve::interrupt;
use rtrace_resolve::preflight::run_preflight_checks;
use rtrace_resolve::resolver::Resolver;
use rtrace_resolve::trace::{copy_header, process_direct, process_multi_pass, Outcome};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_INTERRUPTED: i32 = 130;

fn main() {
    let args = Args::parse();
    init_logging(args.quiet);

    if let Err(e) = run_preflight_checks(&args) {
        eprintln!("error: {e}");
        std::process::exit(EXIT_USAGE);
    }
    interrupt::install_handler();

    std::process::exit(match run(&args) {
        Ok(Outcome::Completed) => EXIT_SUCCESS,
        Ok(Outcome::Interrupted) => {
            warn!("interrupted, output is incomplete");
            EXIT_INTERRUPTED
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_ERROR
        }
    });
}

/// `RUST_LOG` wins; otherwise warnings, or errors only with `--quiet`.
fn init_logging(quiet: bool) {
    let default_level = if quiet { "error" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
}

fn open_input(args: &Args) -> Result<Box<dyn BufRead>> {
    Ok(match &args.input_file {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("Failed to open input file {}", path.display()))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(io::stdin().lock()),
    })
}

fn open_output(args: &Args) -> Result<Box<dyn Write>> {
    Ok(match &args.output_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file {}", path.display()))?;
            info!("Created text log file {}", path.display());
            Box::new(BufWriter::new(file))
        }
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn run(args: &Args) -> Result<Outcome> {
    let options = args.to_options();
    let mut input = open_input(args)?;
    let mut output = open_output(args)?;

    copy_header(&mut input, &mut output, options.root_path.is_some())
        .context("Failed to read trace header")?;

    let mode = options.mode;
    let abort = interrupt::flag();
    let mut resolver = Resolver::new(options);
    let outcome = match mode {
        OperationMode::Direct => process_direct(&mut resolver, &mut input, &mut output, abort)?,
        OperationMode::MultiPass => {
            process_multi_pass(&mut resolver, &mut input, &mut output, &args.work_dir, abort)
                .context("Multi-pass resolving failed")?
        }
    };

    output.flush().context("Failed to flush output")?;
    info!("{} modules registered", resolver.modules().len());
    Ok(outcome)
}
