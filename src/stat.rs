use lmdb_sys as ffi;

/// Environment statistics.
///
/// Contains information about the size and layout of an LMDB environment's B-tree.
#[derive(Clone, Copy, Default)]
pub struct Stat(ffi::MDB_stat);

impl Stat {
    pub(crate) fn new() -> Stat {
        Stat(ffi::MDB_stat::default())
    }

    #[doc(hidden)]
    pub fn stat_mut(&mut self) -> *mut ffi::MDB_stat {
        &mut self.0
    }

    /// Size of a database page. This is the same for all databases in the environment.
    pub fn page_size(&self) -> u32 {
        self.0.ms_psize
    }

    /// Depth (height) of the B-tree.
    pub fn depth(&self) -> u32 {
        self.0.ms_depth
    }

    /// Number of internal (non-leaf) pages.
    pub fn branch_pages(&self) -> usize {
        self.0.ms_branch_pages as usize
    }

    /// Number of leaf pages.
    pub fn leaf_pages(&self) -> usize {
        self.0.ms_leaf_pages as usize
    }

    /// Number of overflow pages.
    pub fn overflow_pages(&self) -> usize {
        self.0.ms_overflow_pages as usize
    }

    /// Number of data items.
    pub fn entries(&self) -> usize {
        self.0.ms_entries as usize
    }
}
