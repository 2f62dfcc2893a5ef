//! Text trace handling around the resolver
//!
//! Only the parts of the text format the resolver needs are understood: the
//! header line, module mapping records and backtrace records. Every other
//! line passes through untouched, so the output has exactly as many lines as
//! the input.

pub mod header;
pub mod pipeline;
pub mod records;

pub use header::Header;
pub use pipeline::{copy_header, process_direct, process_multi_pass, Outcome};
pub use records::{parse_backtrace, parse_index, parse_mapping, BacktraceRecord, MappingRecord};
