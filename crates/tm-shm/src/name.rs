use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Result, ShmError};

static NEXT_SEQ: AtomicU64 = AtomicU64::new(0);

/// A POSIX shared memory object name: one leading `/`, no other slashes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentName(String);

impl SegmentName {
    /// Validate and normalise `raw`, adding the leading `/` if missing.
    pub fn new(raw: &str) -> Result<Self> {
        let body = raw.strip_prefix('/').unwrap_or(raw);
        if body.is_empty() || body.contains('/') || body.contains('\0') {
            return Err(ShmError::InvalidName(raw.to_string()));
        }
        Ok(SegmentName(format!("/{body}")))
    }

    /// A name no other live segment in this process or any other process
    /// will pick: `/tilemul-<pid>-<seq>-<label>`.
    ///
    /// Kept short because macOS caps object names at 31 bytes.
    pub fn unique(label: &str) -> Result<Self> {
        let seq = NEXT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::new(&format!("tilemul-{}-{}-{}", std::process::id(), seq, label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SegmentName {
    type Err = ShmError;

    fn from_str(s: &str) -> Result<Self> {
        SegmentName::new(s)
    }
}
