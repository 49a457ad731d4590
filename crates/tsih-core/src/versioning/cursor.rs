//! Current-version cursor and its advance policy.

use crate::error::{TsihError, TsihResult};
use crate::versioning::VersionNumber;

/// Tracks the version that reads and writes default to.
///
/// In manual mode the cursor only moves through [`VersionCursor::set`], in any
/// direction. In auto mode every write first bumps the cursor by one and lands
/// on the bumped value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VersionCursor {
    current: VersionNumber,
    auto: bool,
}

impl VersionCursor {
    /// Create a cursor at `initial` with the given advance policy.
    pub fn new(initial: VersionNumber, auto: bool) -> Self {
        Self {
            current: initial,
            auto,
        }
    }

    /// The present value of the cursor.
    pub fn current(&self) -> VersionNumber {
        self.current
    }

    /// Overwrite the cursor. No monotonicity is enforced.
    pub fn set(&mut self, version: VersionNumber) {
        self.current = version;
    }

    /// Whether writes auto-advance the cursor.
    pub fn is_auto(&self) -> bool {
        self.auto
    }

    /// Switch the advance policy. The current value is kept.
    pub fn set_auto(&mut self, auto: bool) {
        self.auto = auto;
    }

    /// The version the next write would land at, without moving the cursor.
    pub fn write_version(&self) -> TsihResult<VersionNumber> {
        if !self.auto {
            return Ok(self.current);
        }
        self.current
            .checked_add(1)
            .ok_or_else(|| TsihError::version_overflow(self.current))
    }

    /// Compute the effective version for a write and apply the advance policy.
    pub fn advance_for_write(&mut self) -> TsihResult<VersionNumber> {
        let version = self.write_version()?;
        self.current = version;
        Ok(version)
    }
}
