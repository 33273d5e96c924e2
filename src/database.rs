use lmdb_sys as ffi;

/// A handle to an individual database (named ordered key-value table) in an environment.
///
/// A database handle denotes the name and parameters of a database in an environment. The
/// database may not exist in the environment (for instance, if the database is opened during a
/// transaction that has not yet committed).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Database {
    dbi: ffi::MDB_dbi,
}

impl Database {
    pub(crate) fn new(dbi: ffi::MDB_dbi) -> Database {
        Database { dbi }
    }

    /// Returns the underlying LMDB database handle.
    ///
    /// The caller **must** ensure that the handle is not used after the lifetime of the
    /// environment, or after the database handle has been closed.
    pub fn dbi(&self) -> ffi::MDB_dbi {
        self.dbi
    }
}
