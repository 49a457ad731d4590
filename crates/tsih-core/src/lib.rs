//! tsih-core - Core library for tsih.
//!
//! A versioned key-value map: every write is recorded at a version, and reads
//! can ask for the value a key had at any version. History can be mirrored to
//! SQLite and reloaded by name across restarts.
//!
//! # Example
//!
//! ```no_run
//! use tsih_core::{MapConfig, VersionedMap};
//!
//! # fn main() -> tsih_core::TsihResult<()> {
//! let config = MapConfig::persistent("robot.sqlite").with_name("robot");
//! let mut map: VersionedMap<String, String> = VersionedMap::open(config)?;
//!
//! map.write("text".to_string(), "hello".to_string())?;
//! map.set_version(25);
//! map.write("text".to_string(), "world".to_string())?;
//!
//! assert_eq!(map.read_at(24, "text")?, "hello");
//! assert_eq!(map.read("text")?, "world");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod map;
pub mod persistence;
pub mod versioning;

// Re-export commonly used types
pub use config::MapConfig;
pub use error::{ErrorCode, TsihError, TsihResult};
pub use map::VersionedMap;
pub use persistence::{PersistenceBridge, RowStore, SqliteRowStore, StoredRow};
pub use versioning::{Entry, KeyHistoryIndex, VersionCursor, VersionNumber};
