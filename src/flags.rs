//! Re-exports of the LMDB flag bitsets, under the names used throughout
//! this crate's `Environment`/`Database`/`Transaction`/`Cursor` layer.

pub use lmdb_sys::{DatabaseFlags, EnvironmentFlags, WriteFlags};
use lmdb_sys as ffi;

/// Shorthand for `EnvironmentFlags::MDB_RDONLY`, matching the name used by
/// environments that are only ever opened for reading.
pub const READ_ONLY: EnvironmentFlags = EnvironmentFlags::MDB_RDONLY;

/// `DatabaseFlags` bit that creates the database if it doesn't yet exist.
/// Exposed separately because `mdb_dbi_open` treats it as an out-of-band
/// flag rather than a `DatabaseFlags` member.
pub const CREATE: u32 = ffi::MDB_CREATE;
