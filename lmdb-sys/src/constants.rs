use libc::{c_int, c_uint};

bitflags::bitflags! {
    /// Environment Options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EnvironmentFlags: c_uint {
        /// Use a fixed address for the mmap region. This flag must be specified
        /// when creating the environment, and is stored persistently in the environment.
        /// If successful, the memory map will always reside at the same virtual address
        /// and pointers used to reference data items in the database will be constant
        /// across multiple invocations. This option may not always work, depending on
        /// how the operating system has allocated memory to shared libraries and other uses.
        /// The feature is highly experimental.
        const MDB_FIXEDMAP = 0x01;

        /// By default, LMDB creates its environment in a directory whose
        /// pathname is given in *path*, and creates its data and lock files
        /// under that directory. With this option, *path* is used as-is for
        /// the database main data file. The database lock file is the *path*
        /// with `-lock` appended.
        const MDB_NOSUBDIR = 0x4000;

        /// Use a writeable memory map unless `MDB_RDONLY` is set. This is faster
        /// and uses fewer mallocs, but loses protection from application bugs
        /// like wild pointer writes and other bad updates into the database.
        /// Incompatible with nested transactions.
        const MDB_WRITEMAP = 0x80000;

        /// Open the environment or transaction in read-only mode. No write operations
        /// will be allowed. When opening an environment, LMDB will still modify the lock
        /// file - except on read-only filesystems, where LMDB does not use locks.
        const MDB_RDONLY = 0x20000;

        /// Flush system buffers to disk only once per transaction, omit the
        /// metadata flush. Defer that until the system flushes files to disk,
        /// or next non-`MDB_RDONLY` commit or `mdb_env_sync()`.
        const MDB_NOMETASYNC = 0x40000;

        /// Don't flush system buffers to disk when committing a transaction.
        /// This optimization means a system crash can corrupt the database or
        /// lose the last transactions if buffers are not yet flushed to disk.
        const MDB_NOSYNC = 0x10000;

        /// When using `MDB_WRITEMAP`, use asynchronous flushes to disk.
        /// As with `MDB_NOSYNC`, a system crash can then corrupt the
        /// database or lose the last transactions.
        const MDB_MAPASYNC = 0x100000;

        /// Don't use Thread-Local Storage. Tie reader locktable slots to
        /// `MDB_txn` objects instead of to threads.
        const MDB_NOTLS = 0x200000;

        /// Don't do any locking. If concurrent access is anticipated, the
        /// caller must manage all concurrency itself.
        const MDB_NOLOCK = 0x400000;

        /// Turn off readahead. Most operating systems perform readahead on
        /// read requests by default.
        const MDB_NORDAHEAD = 0x800000;

        /// Don't initialize malloc'd memory before writing to unused spaces
        /// in the data file.
        const MDB_NOMEMINIT = 0x1000000;
    }
}

bitflags::bitflags! {
    /// Database Options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct DatabaseFlags: c_uint {
        /// Keys are strings to be compared in reverse order, from the end
        /// of the strings to the beginning.
        const MDB_REVERSEKEY = 0x02;

        /// Duplicate keys may be used in the database.
        const MDB_DUPSORT = 0x04;

        /// Keys are binary integers in native byte order.
        const MDB_INTEGERKEY = 0x08;

        /// This flag may only be used in combination with `MDB_DUPSORT`. Tells
        /// the library that the data items for this database are all the same size.
        const MDB_DUPFIXED = 0x10;

        /// This option specifies that duplicate data items are also integers,
        /// and should be sorted as such.
        const MDB_INTEGERDUP = 0x20;

        /// This option specifies that duplicate data items should be compared
        /// as strings in reverse order.
        const MDB_REVERSEDUP = 0x40;
    }
}

/// Create the named database if it doesn't exist. This option is not
/// allowed in a read-only transaction or a read-only environment.
pub const MDB_CREATE: c_uint = 0x40000;

bitflags::bitflags! {
    /// Write Options
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WriteFlags: c_uint {
        /// Enter the new key/data pair only if the key does not already
        /// appear in the database.
        const MDB_NOOVERWRITE = 0x10;

        /// Enter the new key/data pair only if it does not already appear
        /// in the database. Requires `MDB_DUPSORT`.
        const MDB_NODUPDATA = 0x20;

        /// For `Cursor::put`. Replace the item at the current cursor position.
        const MDB_CURRENT = 0x40;

        /// Append the given key/data pair to the end of the database. No key
        /// comparisons are performed.
        const MDB_APPEND = 0x20000;

        /// Same as `MDB_APPEND`, but for sorted dup data.
        const MDB_APPENDDUP = 0x40000;
    }
}

/// Reserve space for data of the given size, but don't copy the given data.
pub const MDB_RESERVE: c_uint = 0x10000;

///////////////////////////////////////////////////////////////////////////
// Return Codes
///////////////////////////////////////////////////////////////////////////

/// Successful result.
pub const MDB_SUCCESS: c_int = 0;
/// key/data pair already exists.
pub const MDB_KEYEXIST: c_int = -30799;
/// key/data pair not found (EOF).
pub const MDB_NOTFOUND: c_int = -30798;
/// Requested page not found - this usually indicates corruption.
pub const MDB_PAGE_NOTFOUND: c_int = -30797;
/// Located page was wrong type.
pub const MDB_CORRUPTED: c_int = -30796;
/// Update of meta page failed or environment had fatal error.
pub const MDB_PANIC: c_int = -30795;
/// Environment version mismatch.
pub const MDB_VERSION_MISMATCH: c_int = -30794;
/// File is not a valid LMDB file.
pub const MDB_INVALID: c_int = -30793;
/// Environment mapsize reached.
pub const MDB_MAP_FULL: c_int = -30792;
/// Environment maxdbs reached.
pub const MDB_DBS_FULL: c_int = -30791;
/// Environment maxreaders reached.
pub const MDB_READERS_FULL: c_int = -30790;
/// Too many TLS keys in use - Windows only.
pub const MDB_TLS_FULL: c_int = -30789;
/// Txn has too many dirty pages.
pub const MDB_TXN_FULL: c_int = -30788;
/// Cursor stack too deep - internal error.
pub const MDB_CURSOR_FULL: c_int = -30787;
/// Page has not enough space - internal error.
pub const MDB_PAGE_FULL: c_int = -30786;
/// Database contents grew beyond environment mapsize.
pub const MDB_MAP_RESIZED: c_int = -30785;
/// Operation and DB incompatible, or DB flags changed.
pub const MDB_INCOMPATIBLE: c_int = -30784;
/// Invalid reuse of reader locktable slot.
pub const MDB_BAD_RSLOT: c_int = -30783;
/// Transaction cannot recover - it must be aborted.
pub const MDB_BAD_TXN: c_int = -30782;
/// Unsupported size of key/DB name/data, or wrong DUPFIXED size.
pub const MDB_BAD_VALSIZE: c_int = -30781;
/// The specified DBI was changed unexpectedly.
pub const MDB_BAD_DBI: c_int = -30780;
/// The last defined error code.
pub const MDB_LAST_ERRCODE: c_int = MDB_BAD_DBI;

/// Position at first key/data item.
pub const MDB_FIRST: c_uint = 0;
/// Position at first data item of current key. Only for `MDB_DUPSORT`.
pub const MDB_FIRST_DUP: c_uint = 1;
/// Position at key/data pair. Only for `MDB_DUPSORT`.
pub const MDB_GET_BOTH: c_uint = 2;
/// Position at key, nearest data. Only for `MDB_DUPSORT`.
pub const MDB_GET_BOTH_RANGE: c_uint = 3;
/// Return key/data at current cursor position.
pub const MDB_GET_CURRENT: c_uint = 4;
/// Return up to a page of duplicate data items from current cursor position.
pub const MDB_GET_MULTIPLE: c_uint = 5;
/// Position at last key/data item.
pub const MDB_LAST: c_uint = 6;
/// Position at last data item of current key. Only for `MDB_DUPSORT`.
pub const MDB_LAST_DUP: c_uint = 7;
/// Position at next data item.
pub const MDB_NEXT: c_uint = 8;
/// Position at next data item of current key. Only for `MDB_DUPSORT`.
pub const MDB_NEXT_DUP: c_uint = 9;
/// Return up to a page of duplicate data items from next cursor position.
pub const MDB_NEXT_MULTIPLE: c_uint = 10;
/// Position at first data item of next key.
pub const MDB_NEXT_NODUP: c_uint = 11;
/// Position at previous data item.
pub const MDB_PREV: c_uint = 12;
/// Position at previous data item of current key. Only for `MDB_DUPSORT`.
pub const MDB_PREV_DUP: c_uint = 13;
/// Position at last data item of previous key.
pub const MDB_PREV_NODUP: c_uint = 14;
/// Position at specified key.
pub const MDB_SET: c_uint = 15;
/// Position at specified key, return key + data.
pub const MDB_SET_KEY: c_uint = 16;
/// Position at first key greater than or equal to specified key.
pub const MDB_SET_RANGE: c_uint = 17;
