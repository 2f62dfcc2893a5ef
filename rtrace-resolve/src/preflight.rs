//! Pre-flight checks for rtrace-resolve
//!
//! Validates the command line paths before any output is created.
//! Provides clear, actionable error messages when requirements aren't met.

use anyhow::{bail, Result};
use std::path::Path;

use crate::cli::{Args, Mode};

/// Run all pre-flight checks before resolving
pub fn run_preflight_checks(args: &Args) -> Result<()> {
    if let Some(input) = &args.input_file {
        check_input_file(input)?;
    }
    if let Some(root) = &args.sysroot {
        check_directory(root, "--sysroot")?;
    }
    if args.mode == Mode::MultiPass {
        check_directory(&args.work_dir, "--work-dir")?;
    }
    Ok(())
}

/// Check if the input trace exists and is a regular file
fn check_input_file(path: &Path) -> Result<()> {
    if !path.exists() {
        bail!(
            "Input file not found: {}\n\n\
             Make sure the path is correct and the trace log exists.",
            path.display()
        );
    }
    if !path.is_file() {
        bail!(
            "Not a file: {}\n\n\
             --input-file must point to a text trace log, not a directory.",
            path.display()
        );
    }
    Ok(())
}

/// Check that a directory option points to an existing directory
fn check_directory(path: &Path, option: &str) -> Result<()> {
    if !path.is_dir() {
        bail!(
            "Directory not found: {}\n\n\
             {option} must point to an existing directory.",
            path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_input_not_found() {
        let result = check_input_file(Path::new("/nonexistent/path/to/trace.txt"));
        assert!(result.is_err());
        let err = result.unwrap_err().to_string();
        assert!(err.contains("Input file not found"));
    }

    #[test]
    fn test_input_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = check_input_file(dir.path()).unwrap_err().to_string();
        assert!(err.contains("Not a file"));
    }

    #[test]
    fn test_work_dir_checked_only_for_multi_pass() {
        let args = Args::try_parse_from(["rtrace-resolve", "--work-dir", "/nonexistent/scratch"])
            .unwrap();
        assert!(run_preflight_checks(&args).is_ok());

        let args = Args::try_parse_from([
            "rtrace-resolve",
            "-m",
            "multi-pass",
            "--work-dir",
            "/nonexistent/scratch",
        ])
        .unwrap();
        let err = run_preflight_checks(&args).unwrap_err().to_string();
        assert!(err.contains("--work-dir"));
    }

    #[test]
    fn test_sysroot_must_exist() {
        let args = Args::try_parse_from(["rtrace-resolve", "-s", "/nonexistent/root"]).unwrap();
        assert!(run_preflight_checks(&args).is_err());
    }
}
