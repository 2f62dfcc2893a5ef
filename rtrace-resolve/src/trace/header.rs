//! Trace header line
//!
//! The first line of a text trace is a list of `key=value, ` fields, e.g.
//!
//! ```text
//! version=2.0, arch=x86_64, pid=1234, backtrace depth=10,
//! ```
//!
//! Known fields are re-emitted in their canonical order; unknown ones are
//! dropped.

use std::fmt;

use crate::domain::TraceError;

/// Protocol version written into every emitted header.
pub const PROTO_VERSION: &str = "2.0";

/// Header keys in output order.
pub const HEADER_FIELDS: [&str; 8] =
    ["version", "arch", "timestamp", "process", "pid", "filter", "backtrace depth", "origin"];

/// Post-processing tags of the `filter` field, by bit.
pub const FILTER_TAGS: [&str; 3] = ["leaks", "compress", "resolve"];

pub const FILTER_RESOLVE: u32 = 1 << 2;

const ARCH: usize = 1;
const FILTER: usize = 5;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: [Option<String>; HEADER_FIELDS.len()],
}

impl Header {
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let mut header = Self::default();
        for field in line.trim_end_matches(['\n', '\r']).split(',') {
            let Some((key, value)) = field.trim_start_matches(' ').split_once('=') else {
                continue;
            };
            if let Some(idx) = HEADER_FIELDS.iter().position(|&known| known == key) {
                header.fields[idx] = Some(value.to_string());
            }
        }
        header
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let idx = HEADER_FIELDS.iter().position(|&known| known == key)?;
        self.fields[idx].as_deref()
    }

    #[must_use]
    pub fn arch(&self) -> Option<&str> {
        self.fields[ARCH].as_deref()
    }

    /// Bit mask of the tags present in the `filter` field.
    #[must_use]
    pub fn filter_mask(&self) -> u32 {
        let Some(filter) = self.fields[FILTER].as_deref() else {
            return 0;
        };
        FILTER_TAGS
            .iter()
            .enumerate()
            .filter(|(_, tag)| filter.contains(*tag))
            .fold(0, |mask, (bit, _)| mask | 1 << bit)
    }

    /// Rewrites the `filter` field from a tag mask.
    pub fn set_filter_mask(&mut self, mask: u32) {
        let tags: Vec<&str> = FILTER_TAGS
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, tag)| *tag)
            .collect();
        self.fields[FILTER] = (!tags.is_empty()).then(|| tags.join("|"));
    }

    /// Fails when the trace was recorded on another architecture and no
    /// system root to find that architecture's binaries was given.
    ///
    /// # Errors
    /// Returns [`TraceError::ArchMismatch`] in that case.
    pub fn check_arch(&self, expected: &str, has_system_root: bool) -> Result<(), TraceError> {
        match self.arch() {
            Some(found) if found != expected => {
                log::warn!("non native architecture: {found} (expected {expected})");
                if has_system_root {
                    Ok(())
                } else {
                    Err(TraceError::ArchMismatch {
                        found: found.to_string(),
                        expected: expected.to_string(),
                    })
                }
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, key) in HEADER_FIELDS.iter().enumerate() {
            if idx == 0 {
                write!(f, "{key}={PROTO_VERSION}, ")?;
            } else if let Some(value) = &self.fields[idx] {
                write!(f, "{key}={value}, ")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LINE: &str = "version=1.6, arch=x86_64, timestamp=1.2.2026 10:00:00, \
                        process=/usr/bin/app, pid=42, filter=leaks, backtrace depth=10, \n";

    #[test]
    fn test_parse_known_fields() {
        let header = Header::parse(LINE);
        assert_eq!(header.arch(), Some("x86_64"));
        assert_eq!(header.get("pid"), Some("42"));
        assert_eq!(header.get("backtrace depth"), Some("10"));
        assert_eq!(header.get("timestamp"), Some("1.2.2026 10:00:00"));
        assert_eq!(header.get("origin"), None);
        assert_eq!(header.get("bogus"), None);
    }

    #[test]
    fn test_filter_mask_roundtrip() {
        let mut header = Header::parse(LINE);
        assert_eq!(header.filter_mask(), 1);
        header.set_filter_mask(header.filter_mask() | FILTER_RESOLVE);
        assert_eq!(header.get("filter"), Some("leaks|resolve"));

        let mut bare = Header::parse("arch=arm, ");
        bare.set_filter_mask(bare.filter_mask() | FILTER_RESOLVE);
        assert_eq!(bare.get("filter"), Some("resolve"));
    }

    #[test]
    fn test_display_canonical_order() {
        let mut header = Header::parse("pid=7, arch=arm, custom=1, ");
        header.set_filter_mask(FILTER_RESOLVE);
        assert_eq!(header.to_string(), "version=2.0, arch=arm, pid=7, filter=resolve, ");
    }

    #[test]
    fn test_check_arch() {
        let header = Header::parse("arch=arm, ");
        assert!(header.check_arch("arm", false).is_ok());
        assert!(matches!(header.check_arch("x86_64", false), Err(TraceError::ArchMismatch { .. })));
        assert!(header.check_arch("x86_64", true).is_ok());
        assert!(Header::parse("pid=1, ").check_arch("x86_64", false).is_ok());
    }
}
