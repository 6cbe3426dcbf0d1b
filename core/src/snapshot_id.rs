//! Snapshot identifiers and the successor rule.
//!
//! Snapshot names carry their sequence number as the last run of decimal
//! digits in the file stem (`dump_00042`, `outflow_0007.h5`). Directories
//! and the extension are left alone. The successor increments that run,
//! keeping its zero padding and widening it when it overflows.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Name of the first dump in a sequence, used when nothing is configured.
pub const DEFAULT_START_SNAPSHOT: &str = "dump_00000";

/// Padding used when a name carries no sequence number at all.
const APPENDED_DIGITS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The next snapshot name in sequence.
    pub fn successor(&self) -> SnapshotId {
        let (stem_start, stem_end) = self.stem_bounds();
        let Some((start, end)) = digit_run(&self.0, stem_start, stem_end) else {
            return SnapshotId(format!(
                "{}_{:0width$}{}",
                &self.0[..stem_end],
                1,
                &self.0[stem_end..],
                width = APPENDED_DIGITS
            ));
        };
        SnapshotId(format!(
            "{}{}{}",
            &self.0[..start],
            increment_digits(&self.0[start..end]),
            &self.0[end..]
        ))
    }

    /// Sequence number embedded in the name, if any.
    pub fn sequence_number(&self) -> Option<u64> {
        let (stem_start, stem_end) = self.stem_bounds();
        let (start, end) = digit_run(&self.0, stem_start, stem_end)?;
        self.0[start..end].parse().ok()
    }

    /// Byte range of the file stem: after the last `/`, before the extension.
    fn stem_bounds(&self) -> (usize, usize) {
        let start = self.0.rfind('/').map_or(0, |i| i + 1);
        let end = match self.0[start..].rfind('.') {
            Some(dot) if dot > 0 => start + dot,
            _ => self.0.len(),
        };
        (start, end)
    }
}

/// Last run of ASCII digits within `name[from..to]`.
fn digit_run(name: &str, from: usize, to: usize) -> Option<(usize, usize)> {
    let bytes = &name.as_bytes()[from..to];
    let end = bytes.iter().rposition(u8::is_ascii_digit)? + 1;
    let start = bytes[..end]
        .iter()
        .rposition(|b| !b.is_ascii_digit())
        .map_or(0, |i| i + 1);
    Some((from + start, from + end))
}

/// Decimal increment on a digit string of arbitrary length.
fn increment_digits(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return String::from_utf8_lossy(&out).into_owned();
        }
    }
    // Every digit rolled over.
    let mut widened = Vec::with_capacity(out.len() + 1);
    widened.push(b'1');
    widened.extend_from_slice(&out);
    String::from_utf8_lossy(&widened).into_owned()
}

impl Default for SnapshotId {
    fn default() -> Self {
        Self::new(DEFAULT_START_SNAPSHOT)
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SnapshotId {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for SnapshotId {
    fn from(name: String) -> Self {
        Self(name)
    }
}
