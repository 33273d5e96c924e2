use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::ptr;
use std::sync::Mutex;

use libc::{c_uint, mode_t, size_t};

use lmdb_sys as ffi;

use crate::database::Database;
use crate::error::{lmdb_result, Error, Result};
use crate::flags::{DatabaseFlags, EnvironmentFlags};
use crate::transaction::{RoTransaction, RwTransaction, Transaction};

/// An LMDB environment.
///
/// An environment supports multiple databases, all residing in the same shared-memory map.
pub struct Environment {
    env: *mut ffi::MDB_env,
    dbi_open_mutex: Mutex<()>,
}

impl Environment {
    /// Creates a new builder for specifying options for opening an LMDB environment.
    pub fn new() -> EnvironmentBuilder {
        EnvironmentBuilder {
            flags: EnvironmentFlags::empty(),
            max_readers: None,
            max_dbs: None,
            map_size: None,
        }
    }

    /// Returns a raw pointer to the underlying LMDB environment.
    ///
    /// The caller **must** ensure that the pointer is not dereferenced after the lifetime of the
    /// environment.
    pub fn env(&self) -> *mut ffi::MDB_env {
        self.env
    }

    /// Opens a handle to an LMDB database, creating the database if necessary.
    ///
    /// If `name` is `None`, the returned handle is for the default (unnamed) database.
    pub fn open_db(&self, name: Option<&str>) -> Result<Database> {
        let _mutex = self.dbi_open_mutex.lock().unwrap();
        let txn = self.begin_ro_txn()?;
        let db = unsafe { txn.open_db(name)? };
        txn.commit()?;
        Ok(db)
    }

    /// Opens a handle to an LMDB database, creating the database (with the given flags) if
    /// it does not yet exist.
    pub fn create_db(&self, name: Option<&str>, flags: DatabaseFlags) -> Result<Database> {
        let _mutex = self.dbi_open_mutex.lock().unwrap();
        let txn = self.begin_rw_txn()?;
        let db = unsafe { txn.create_db(name, flags)? };
        txn.commit()?;
        Ok(db)
    }

    /// Create a read-only transaction for use with the environment.
    pub fn begin_ro_txn(&self) -> Result<RoTransaction<'_>> {
        RoTransaction::new(self)
    }

    /// Create a read-write transaction for use with the environment. This method will block
    /// while there are any other read-write transactions open on the environment.
    pub fn begin_rw_txn(&self) -> Result<RwTransaction<'_>> {
        RwTransaction::new(self)
    }

    /// Flush data buffers to disk.
    pub fn sync(&self, force: bool) -> Result<()> {
        unsafe { lmdb_result(ffi::mdb_env_sync(self.env(), if force { 1 } else { 0 })) }
    }

    /// Returns statistics about the environment's B-tree.
    pub fn stat(&self) -> Result<crate::stat::Stat> {
        let mut stat = crate::stat::Stat::new();
        unsafe { lmdb_result(ffi::mdb_env_stat(self.env, stat.stat_mut()))? };
        Ok(stat)
    }

    /// Drops (truncates) the contents of the given database without deleting its handle.
    ///
    /// Used by `Store::open(.., reset = true)` to clear the five gink tables while keeping the
    /// backing file in place.
    pub fn clear_db(&self, db: Database) -> Result<()> {
        let txn = self.begin_rw_txn()?;
        unsafe { lmdb_result(ffi::mdb_drop(txn.txn(), db.dbi(), 0))? };
        txn.commit()
    }
}

unsafe impl Send for Environment {}
unsafe impl Sync for Environment {}

impl Drop for Environment {
    fn drop(&mut self) {
        unsafe { ffi::mdb_env_close(self.env) }
    }
}

///////////////////////////////////////////////////////////////////////////
// Environment Builder
///////////////////////////////////////////////////////////////////////////

/// Options for opening or creating an environment.
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct EnvironmentBuilder {
    flags: EnvironmentFlags,
    max_readers: Option<c_uint>,
    max_dbs: Option<c_uint>,
    map_size: Option<size_t>,
}

impl EnvironmentBuilder {
    /// Open an environment at the given path, which must not contain a NUL byte.
    pub fn open(&self, path: &Path) -> Result<Environment> {
        self.open_with_permissions(path, 0o600)
    }

    pub fn open_with_permissions(&self, path: &Path, mode: mode_t) -> Result<Environment> {
        let mut env: *mut ffi::MDB_env = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_env_create(&mut env))?;

            // From here on a failure must close `env` before returning, since `Environment`
            // hasn't been constructed yet to do it via `Drop`.
            let result: Result<()> = (|| {
                if let Some(max_readers) = self.max_readers {
                    lmdb_result(ffi::mdb_env_set_maxreaders(env, max_readers))?;
                }
                if let Some(max_dbs) = self.max_dbs {
                    lmdb_result(ffi::mdb_env_set_maxdbs(env, max_dbs))?;
                }
                if let Some(map_size) = self.map_size {
                    lmdb_result(ffi::mdb_env_set_mapsize(env, map_size))?;
                }
                let path_cstr = CString::new(path.as_os_str().as_bytes()).map_err(|_| Error::Invalid)?;
                lmdb_result(ffi::mdb_env_open(env, path_cstr.as_ptr(), self.flags.bits(), mode))
            })();

            if let Err(err) = result {
                ffi::mdb_env_close(env);
                return Err(err);
            }
        }
        Ok(Environment { env, dbi_open_mutex: Mutex::new(()) })
    }

    pub fn set_flags(&mut self, flags: EnvironmentFlags) -> &mut EnvironmentBuilder {
        self.flags = flags;
        self
    }

    /// Sets the maximum number of threads or reader slots for the environment.
    pub fn set_max_readers(&mut self, max_readers: c_uint) -> &mut EnvironmentBuilder {
        self.max_readers = Some(max_readers);
        self
    }

    /// Sets the maximum number of named databases for the environment.
    pub fn set_max_dbs(&mut self, max_dbs: c_uint) -> &mut EnvironmentBuilder {
        self.max_dbs = Some(max_dbs);
        self
    }

    /// Sets the size of the memory map to use for the environment.
    pub fn set_map_size(&mut self, map_size: size_t) -> &mut EnvironmentBuilder {
        self.map_size = Some(map_size);
        self
    }
}

#[cfg(test)]
mod test {
    use crate::flags::*;

    use super::*;

    #[test]
    fn test_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        assert!(Environment::new().set_flags(READ_ONLY).open(&path).is_err());
        assert!(Environment::new().open(&path).is_ok());
        assert!(Environment::new().set_flags(READ_ONLY).open(&path).is_ok());
    }

    #[test]
    fn test_begin_txn() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();

        {
            let env = Environment::new().open(&path).unwrap();
            assert!(env.begin_rw_txn().is_ok());
            assert!(env.begin_ro_txn().is_ok());
        }
        {
            let env = Environment::new().set_flags(READ_ONLY).open(&path).unwrap();
            assert!(env.begin_rw_txn().is_err());
            assert!(env.begin_ro_txn().is_ok());
        }
    }

    #[test]
    fn test_open_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        let env = Environment::new().set_max_dbs(1).open(&path).unwrap();

        assert!(env.open_db(None).is_ok());
        assert!(env.open_db(Some("testdb")).is_err());
    }

    #[test]
    fn test_create_db() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        let env = Environment::new().set_max_dbs(11).open(&path).unwrap();
        assert!(env.open_db(Some("testdb")).is_err());
        assert!(env.create_db(Some("testdb"), DatabaseFlags::empty()).is_ok());
        assert!(env.open_db(Some("testdb")).is_ok());
    }

    #[test]
    fn test_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path();
        {
            let env = Environment::new().open(&path).unwrap();
            assert!(env.sync(true).is_ok());
        }
        {
            let env = Environment::new().set_flags(READ_ONLY).open(&path).unwrap();
            assert!(env.sync(true).is_err());
        }
    }
}
