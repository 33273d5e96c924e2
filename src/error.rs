use std::ffi::CStr;
use std::io;

use libc::c_int;

use lmdb_sys as ffi;

/// An error returned by the LMDB backend.
#[derive(Debug)]
pub enum Error {
    KeyExist,
    NotFound,
    PageNotFound,
    Corrupted,
    Panic,
    VersionMismatch,
    Invalid,
    MapFull,
    DbsFull,
    ReadersFull,
    TlsFull,
    TxnFull,
    CursorFull,
    PageFull,
    MapResized,
    Incompatible,
    BadRslot,
    BadTxn,
    BadValSize,
    BadDbi,
    Unknown(c_int),
    Io(io::Error),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Error::Io(ref e) => return write!(f, "{e}"),
            Error::Unknown(code) => {
                let msg = unsafe { CStr::from_ptr(ffi::mdb_strerror(code)) };
                return write!(f, "{}", msg.to_string_lossy());
            }
            _ => {}
        }
        let code = self.to_err_code();
        let msg = unsafe { CStr::from_ptr(ffi::mdb_strerror(code)) };
        write!(f, "{}", msg.to_string_lossy())
    }
}

impl std::error::Error for Error {}

impl Error {
    fn to_err_code(&self) -> c_int {
        match *self {
            Error::KeyExist => ffi::MDB_KEYEXIST,
            Error::NotFound => ffi::MDB_NOTFOUND,
            Error::PageNotFound => ffi::MDB_PAGE_NOTFOUND,
            Error::Corrupted => ffi::MDB_CORRUPTED,
            Error::Panic => ffi::MDB_PANIC,
            Error::VersionMismatch => ffi::MDB_VERSION_MISMATCH,
            Error::Invalid => ffi::MDB_INVALID,
            Error::MapFull => ffi::MDB_MAP_FULL,
            Error::DbsFull => ffi::MDB_DBS_FULL,
            Error::ReadersFull => ffi::MDB_READERS_FULL,
            Error::TlsFull => ffi::MDB_TLS_FULL,
            Error::TxnFull => ffi::MDB_TXN_FULL,
            Error::CursorFull => ffi::MDB_CURSOR_FULL,
            Error::PageFull => ffi::MDB_PAGE_FULL,
            Error::MapResized => ffi::MDB_MAP_RESIZED,
            Error::Incompatible => ffi::MDB_INCOMPATIBLE,
            Error::BadRslot => ffi::MDB_BAD_RSLOT,
            Error::BadTxn => ffi::MDB_BAD_TXN,
            Error::BadValSize => ffi::MDB_BAD_VALSIZE,
            Error::BadDbi => ffi::MDB_BAD_DBI,
            Error::Unknown(i) => i,
            Error::Io(_) => 0,
        }
    }

    pub fn from_err_code(err_code: c_int) -> Error {
        match err_code {
            i if i > 0 => Error::Io(io::Error::from_raw_os_error(i)),
            ffi::MDB_KEYEXIST => Error::KeyExist,
            ffi::MDB_NOTFOUND => Error::NotFound,
            ffi::MDB_PAGE_NOTFOUND => Error::PageNotFound,
            ffi::MDB_CORRUPTED => Error::Corrupted,
            ffi::MDB_PANIC => Error::Panic,
            ffi::MDB_VERSION_MISMATCH => Error::VersionMismatch,
            ffi::MDB_INVALID => Error::Invalid,
            ffi::MDB_MAP_FULL => Error::MapFull,
            ffi::MDB_DBS_FULL => Error::DbsFull,
            ffi::MDB_READERS_FULL => Error::ReadersFull,
            ffi::MDB_TLS_FULL => Error::TlsFull,
            ffi::MDB_TXN_FULL => Error::TxnFull,
            ffi::MDB_CURSOR_FULL => Error::CursorFull,
            ffi::MDB_PAGE_FULL => Error::PageFull,
            ffi::MDB_MAP_RESIZED => Error::MapResized,
            ffi::MDB_INCOMPATIBLE => Error::Incompatible,
            ffi::MDB_BAD_RSLOT => Error::BadRslot,
            ffi::MDB_BAD_TXN => Error::BadTxn,
            ffi::MDB_BAD_VALSIZE => Error::BadValSize,
            ffi::MDB_BAD_DBI => Error::BadDbi,
            i => Error::Unknown(i),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub fn lmdb_result(err_code: c_int) -> Result<()> {
    if err_code == ffi::MDB_SUCCESS {
        Ok(())
    } else {
        Err(Error::from_err_code(err_code))
    }
}

/// Errors surfaced by the storage engine.
///
/// Rejection of a bundle by the chain-acceptance rule is not an error — it is the
/// `accepted: bool = false` return value of `add_bundle`, so there is deliberately no
/// "chain broken" variant here.
#[derive(Debug, thiserror::Error)]
pub enum GinkError {
    /// A caller passed arguments that can never be satisfied, e.g. a `key` without a
    /// `container` in `get_reset_changes`. Non-retryable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A bundle's own contents are malformed — a change that is neither a container
    /// definition nor an entry, or a muid field that resolves to zero with no context to
    /// inherit from. The write transaction is aborted; nothing is persisted.
    #[error("corrupt bundle: {0}")]
    CorruptBundle(String),

    /// I/O or transaction failure propagated from the backend. Fatal for the current call;
    /// the engine remains usable for subsequent calls if the backend does.
    #[error(transparent)]
    BackendError(#[from] Error),
}

pub type GinkResult<T> = std::result::Result<T, GinkError>;
