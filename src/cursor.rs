use std::ptr;

use libc::{c_uint, c_void, size_t};

use lmdb_sys as ffi;

use crate::database::Database;
use crate::error::{lmdb_result, Result};
use crate::flags::WriteFlags;

/// A cursor over an ordered key-value database.
///
/// Every method that repositions the cursor returns the key/value pair at the new position, or
/// `Ok(None)` if the operation ran off either end of the table. Errors other than "not found" are
/// propagated. This is the `seek_to_first_key_ge` / `first` / `next` / `current` contract the
/// storage engine is built against.
pub trait Cursor<'txn> {
    #[doc(hidden)]
    fn cursor(&self) -> *mut ffi::MDB_cursor;

    /// Moves to the first key/value pair in the database.
    fn first(&mut self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        self.get(None, ffi::MDB_FIRST)
    }

    /// Moves to the next key/value pair.
    fn next(&mut self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        self.get(None, ffi::MDB_NEXT)
    }

    /// Returns the key/value pair at the current position without moving.
    fn current(&self) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        self.get(None, ffi::MDB_GET_CURRENT)
    }

    /// Positions the cursor at the first key greater than or equal to `key`. This is the
    /// operation the entries table's "newest entry not after T" and "next middle-key" walks are
    /// built out of.
    fn seek_to_first_key_ge(&mut self, key: &[u8]) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        self.get(Some(key), ffi::MDB_SET_RANGE)
    }

    #[doc(hidden)]
    fn get(&self, key: Option<&[u8]>, op: c_uint) -> Result<Option<(&'txn [u8], &'txn [u8])>> {
        let mut key_val = slice_to_val(key);
        let mut data_val = slice_to_val(None);
        unsafe {
            let code = ffi::mdb_cursor_get(self.cursor(), &mut key_val, &mut data_val, op);
            if code == ffi::MDB_NOTFOUND {
                return Ok(None);
            }
            lmdb_result(code)?;
            Ok(Some((val_to_slice(key_val), val_to_slice(data_val))))
        }
    }
}

fn slice_to_val(slice: Option<&[u8]>) -> ffi::MDB_val {
    match slice {
        Some(slice) => ffi::MDB_val { mv_size: slice.len() as size_t, mv_data: slice.as_ptr() as *mut c_void },
        None => ffi::MDB_val { mv_size: 0, mv_data: ptr::null_mut() },
    }
}

unsafe fn val_to_slice<'a>(val: ffi::MDB_val) -> &'a [u8] {
    if val.mv_data.is_null() {
        &[]
    } else {
        std::slice::from_raw_parts(val.mv_data as *const u8, val.mv_size as usize)
    }
}

/// A read-only cursor for navigating items within a database.
pub struct RoCursor<'txn> {
    cursor: *mut ffi::MDB_cursor,
    _marker: std::marker::PhantomData<&'txn ()>,
}

impl<'txn> RoCursor<'txn> {
    pub(crate) fn new(txn: *mut ffi::MDB_txn, db: Database) -> Result<RoCursor<'txn>> {
        let mut cursor: *mut ffi::MDB_cursor = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_cursor_open(txn, db.dbi(), &mut cursor))?;
        }
        Ok(RoCursor { cursor, _marker: std::marker::PhantomData })
    }
}

impl<'txn> Cursor<'txn> for RoCursor<'txn> {
    fn cursor(&self) -> *mut ffi::MDB_cursor {
        self.cursor
    }
}

impl<'txn> Drop for RoCursor<'txn> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.cursor) }
    }
}

/// A read-write cursor for navigating and mutating items within a database.
pub struct RwCursor<'txn> {
    cursor: *mut ffi::MDB_cursor,
    _marker: std::marker::PhantomData<&'txn ()>,
}

impl<'txn> RwCursor<'txn> {
    pub(crate) fn new(txn: *mut ffi::MDB_txn, db: Database) -> Result<RwCursor<'txn>> {
        let mut cursor: *mut ffi::MDB_cursor = ptr::null_mut();
        unsafe {
            lmdb_result(ffi::mdb_cursor_open(txn, db.dbi(), &mut cursor))?;
        }
        Ok(RwCursor { cursor, _marker: std::marker::PhantomData })
    }

    /// Puts a key/value pair into the database at the cursor's current position.
    pub fn put(&mut self, key: &[u8], data: &[u8], flags: WriteFlags) -> Result<()> {
        let mut key_val = slice_to_val(Some(key));
        let mut data_val = slice_to_val(Some(data));
        unsafe { lmdb_result(ffi::mdb_cursor_put(self.cursor, &mut key_val, &mut data_val, flags.bits())) }
    }

    /// Deletes the key/value pair at the cursor's current position.
    pub fn del(&mut self, flags: WriteFlags) -> Result<()> {
        unsafe { lmdb_result(ffi::mdb_cursor_del(self.cursor, flags.bits())) }
    }
}

impl<'txn> Cursor<'txn> for RwCursor<'txn> {
    fn cursor(&self) -> *mut ffi::MDB_cursor {
        self.cursor
    }
}

impl<'txn> Drop for RwCursor<'txn> {
    fn drop(&mut self) {
        unsafe { ffi::mdb_cursor_close(self.cursor) }
    }
}

#[cfg(test)]
mod test {
    use crate::environment::Environment;
    use crate::flags::*;
    use crate::transaction::{Transaction, TransactionExt};

    use super::*;

    #[test]
    fn test_seek_to_first_key_ge() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new().open(&dir.path()).unwrap();
        let db = env.open_db(None).unwrap();

        let txn = env.begin_rw_txn().unwrap();
        txn.put(db, b"key1", b"val1", WriteFlags::empty()).unwrap();
        txn.put(db, b"key3", b"val3", WriteFlags::empty()).unwrap();
        txn.commit().unwrap();

        let txn = env.begin_ro_txn().unwrap();
        let mut cursor = txn.open_ro_cursor(db).unwrap();
        assert_eq!(cursor.seek_to_first_key_ge(b"key2").unwrap(), Some((&b"key3"[..], &b"val3"[..])));
        assert_eq!(cursor.seek_to_first_key_ge(b"key9").unwrap(), None);
    }

    #[test]
    fn test_put_del() {
        let dir = tempfile::tempdir().unwrap();
        let env = Environment::new().open(&dir.path()).unwrap();
        let db = env.open_db(None).unwrap();

        let txn = env.begin_rw_txn().unwrap();
        {
            let mut cursor = txn.open_rw_cursor(db).unwrap();
            cursor.put(b"key1", b"val1", WriteFlags::empty()).unwrap();
            cursor.put(b"key2", b"val2", WriteFlags::empty()).unwrap();
            assert_eq!(cursor.current().unwrap(), Some((&b"key2"[..], &b"val2"[..])));
            cursor.del(WriteFlags::empty()).unwrap();
        }
        txn.commit().unwrap();

        let txn = env.begin_ro_txn().unwrap();
        let mut cursor = txn.open_ro_cursor(db).unwrap();
        assert_eq!(cursor.first().unwrap(), Some((&b"key1"[..], &b"val1"[..])));
        assert_eq!(cursor.next().unwrap(), None);
    }
}
