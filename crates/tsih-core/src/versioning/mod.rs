//! Version axis primitives: the per-key history index and the version cursor.
//!
//! The index answers "what was the value of this key at version V?" with a
//! predecessor search; the cursor decides which version a write lands at.

mod cursor;
mod history;

pub use cursor::VersionCursor;
pub use history::{Entry, KeyHistoryIndex};

/// Position on the version axis.
pub type VersionNumber = u64;
