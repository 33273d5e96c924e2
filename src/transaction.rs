use std::ffi::CString;
use std::ptr;

use libc::{c_void, size_t};

use lmdb_sys as ffi;

use crate::cursor::{RoCursor, RwCursor};
use crate::database::Database;
use crate::environment::Environment;
use crate::error::{lmdb_result, Result};
use crate::flags::{DatabaseFlags, WriteFlags, CREATE};

/// An LMDB transaction.
///
/// All database operations require a transaction. Implemented by both
/// `RoTransaction` (read-only) and `RwTransaction` (read-write).
pub trait Transaction {
    /// Returns a raw pointer to the underlying LMDB transaction.
    fn txn(&self) -> *mut ffi::MDB_txn;

    /// Opens a handle to an existing database.
    ///
    /// If `name` is `None`, the returned handle is for the default database.
    ///
    /// # Safety
    /// Caller must not call this from more than one live transaction per environment at a time;
    /// LMDB requires serialized `mdb_dbi_open` calls.
    unsafe fn open_db(&self, name: Option<&str>) -> Result<Database> {
        let c_name = name.map(|n| CString::new(n).unwrap());
        let name_ptr = c_name.as_ref().map_or(ptr::null(), |c| c.as_ptr());
        let mut dbi: ffi::MDB_dbi = 0;
        lmdb_result(ffi::mdb_dbi_open(self.txn(), name_ptr, 0, &mut dbi))?;
        Ok(Database::new(dbi))
    }

    /// Gets an item from a database.
    fn get<'txn>(&'txn self, database: Database, key: &[u8]) -> Result<&'txn [u8]> {
        let mut key_val = slice_to_val(Some(key));
        let mut data_val = slice_to_val(None);
        unsafe {
            lmdb_result(ffi::mdb_get(self.txn(), database.dbi(), &mut key_val, &mut data_val))?;
            Ok(val_to_slice(data_val))
        }
    }

    /// Opens a read-only cursor on the given database, bound to this transaction.
    fn open_ro_cursor<'txn>(&'txn self, database: Database) -> Result<RoCursor<'txn>> {
        RoCursor::new(self.txn(), database)
    }
}

/// Operations available only on a read-write transaction.
pub trait TransactionExt: Transaction {
    /// Creates the named database if it does not already exist.
    ///
    /// # Safety
    /// See `Transaction::open_db`.
    unsafe fn create_db(&self, name: Option<&str>, flags: DatabaseFlags) -> Result<Database> {
        let c_name = name.map(|n| CString::new(n).unwrap());
        let name_ptr = c_name.as_ref().map_or(ptr::null(), |c| c.as_ptr());
        let mut dbi: ffi::MDB_dbi = 0;
        lmdb_result(ffi::mdb_dbi_open(self.txn(), name_ptr, flags.bits() | CREATE, &mut dbi))?;
        Ok(Database::new(dbi))
    }

    /// Stores a key/data pair into a database.
    fn put(&self, database: Database, key: &[u8], data: &[u8], flags: WriteFlags) -> Result<()> {
        let mut key_val = slice_to_val(Some(key));
        let mut data_val = slice_to_val(Some(data));
        unsafe { lmdb_result(ffi::mdb_put(self.txn(), database.dbi(), &mut key_val, &mut data_val, flags.bits())) }
    }

    /// Removes a key/data pair from a database.
    fn del(&self, database: Database, key: &[u8]) -> Result<()> {
        let mut key_val = slice_to_val(Some(key));
        unsafe { lmdb_result(ffi::mdb_del(self.txn(), database.dbi(), &mut key_val, ptr::null_mut())) }
    }

    /// Opens a read-write cursor on the given database, bound to this transaction.
    fn open_rw_cursor<'txn>(&'txn self, database: Database) -> Result<RwCursor<'txn>>
    where
        Self: Sized,
    {
        RwCursor::new(self.txn(), database)
    }
}

fn slice_to_val(slice: Option<&[u8]>) -> ffi::MDB_val {
    match slice {
        Some(slice) => ffi::MDB_val { mv_size: slice.len() as size_t, mv_data: slice.as_ptr() as *mut c_void },
        None => ffi::MDB_val { mv_size: 0, mv_data: ptr::null_mut() },
    }
}

unsafe fn val_to_slice<'a>(val: ffi::MDB_val) -> &'a [u8] {
    std::slice::from_raw_parts(val.mv_data as *const u8, val.mv_size as usize)
}

/// A read-only transaction.
pub struct RoTransaction<'env> {
    txn: *mut ffi::MDB_txn,
    _env: &'env Environment,
}

impl<'env> RoTransaction<'env> {
    pub(crate) fn new(env: &'env Environment) -> Result<RoTransaction<'env>> {
        let mut txn: *mut ffi::MDB_txn = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_txn_begin(env.env(), ptr::null_mut(), ffi::MDB_RDONLY, &mut txn))?;
        }
        Ok(RoTransaction { txn, _env: env })
    }

    /// Commits the transaction. Read-only transactions never fail to commit, but calling this
    /// releases the backend snapshot promptly instead of waiting for `Drop`.
    pub fn commit(self) -> Result<()> {
        let txn = self.txn;
        std::mem::forget(self);
        unsafe { lmdb_result(ffi::mdb_txn_commit(txn)) }
    }
}

impl<'env> Transaction for RoTransaction<'env> {
    fn txn(&self) -> *mut ffi::MDB_txn {
        self.txn
    }
}

impl<'env> Drop for RoTransaction<'env> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_txn_abort(self.txn) }
    }
}

unsafe impl<'env> Send for RoTransaction<'env> {}

/// A read-write transaction.
pub struct RwTransaction<'env> {
    txn: *mut ffi::MDB_txn,
    _env: &'env Environment,
}

impl<'env> RwTransaction<'env> {
    pub(crate) fn new(env: &'env Environment) -> Result<RwTransaction<'env>> {
        let mut txn: *mut ffi::MDB_txn = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_txn_begin(env.env(), ptr::null_mut(), 0, &mut txn))?;
        }
        Ok(RwTransaction { txn, _env: env })
    }

    /// Commits the transaction, making its writes durable and visible to future transactions.
    pub fn commit(self) -> Result<()> {
        let txn = self.txn;
        std::mem::forget(self);
        unsafe { lmdb_result(ffi::mdb_txn_commit(txn)) }
    }

    /// Aborts the transaction, discarding every write staged within it.
    pub fn abort(self) {
        let txn = self.txn;
        std::mem::forget(self);
        unsafe { ffi::mdb_txn_abort(txn) }
    }
}

impl<'env> Transaction for RwTransaction<'env> {
    fn txn(&self) -> *mut ffi::MDB_txn {
        self.txn
    }
}

impl<'env> TransactionExt for RwTransaction<'env> {}

impl<'env> Drop for RwTransaction<'env> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_txn_abort(self.txn) }
    }
}

unsafe impl<'env> Send for RwTransaction<'env> {}

#[cfg(test)]
mod test {
    use crate::flags::*;

    use super::*;

    #[test]
    fn test_put_get_del() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new().open(&dir.path()).unwrap();
        let db = env.open_db(None).unwrap();

        let txn = env.begin_rw_txn().unwrap();
        txn.put(db, b"key1", b"val1", WriteFlags::empty()).unwrap();
        txn.put(db, b"key2", b"val2", WriteFlags::empty()).unwrap();
        txn.put(db, b"key3", b"val3", WriteFlags::empty()).unwrap();
        txn.commit().unwrap();

        let txn = env.begin_ro_txn().unwrap();
        assert_eq!(b"val1", txn.get(db, b"key1").unwrap());
        assert_eq!(b"val2", txn.get(db, b"key2").unwrap());
        assert_eq!(b"val3", txn.get(db, b"key3").unwrap());
        assert!(txn.get(db, b"key4").is_err());
        drop(txn);

        let txn = env.begin_rw_txn().unwrap();
        txn.del(db, b"key1").unwrap();
        assert!(txn.get(db, b"key1").is_err());
        txn.commit().unwrap();
    }
}
