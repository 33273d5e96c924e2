//! Composite entry-table keys: `container-muid ‖ middle-key ‖ inv(entry-muid) ‖ expiry`.
//!
//! The middle-key envelope varies by container
//! behavior (DIRECTORY carries an opaque user-key blob, SEQUENCE carries a
//! position, PROPERTY carries nothing); the entry-muid is stored inverted so
//! that a forward seek realises "newest entry not after T" in one step, and
//! the trailing fixed-width expiry keeps the whole key length-decodable from
//! the back: the last 24 bytes are always `inv(entry-muid) ‖ expiry`, so the
//! middle-key is "whatever's left" after stripping the 16-byte container
//! prefix and the 24-byte suffix.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::muid::Muid;

const TRAILER_LEN: usize = 24; // 16 B inverted entry-muid + 8 B expiry

/// The per-behavior envelope slotted between the container muid and the entry muid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddleKey {
    /// DIRECTORY: an opaque, caller-serialized user key.
    Directory(Vec<u8>),
    /// SEQUENCE: a position plus the muid of the entry that placed the occupant there. The
    /// move-muid equals the entry-muid itself on initial placement.
    Sequence { effective_time: i64, move_muid: Muid },
    /// PROPERTY, or any other container with no per-entry key: the envelope is empty.
    None,
}

impl MiddleKey {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            MiddleKey::Directory(bytes) => bytes.clone(),
            MiddleKey::Sequence { effective_time, move_muid } => {
                let mut buf = Vec::with_capacity(24);
                buf.write_i64::<BigEndian>(*effective_time).unwrap();
                buf.extend_from_slice(&move_muid.to_bytes());
                buf
            }
            MiddleKey::None => Vec::new(),
        }
    }
}

/// A fully assembled entries-table key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryKey {
    pub container: Muid,
    pub middle_key: MiddleKey,
    pub entry_muid: Muid,
    /// 0 means no expiry.
    pub expiry: i64,
}

impl EntryKey {
    pub fn new(container: Muid, middle_key: MiddleKey, entry_muid: Muid, expiry: i64) -> EntryKey {
        EntryKey { container, middle_key, entry_muid, expiry }
    }

    /// The `container ‖ middle-key` prefix shared by every entry for this (container, key).
    pub fn prefix(container: Muid, middle_key: &MiddleKey) -> Vec<u8> {
        let mut buf = Vec::with_capacity(16 + 24);
        buf.extend_from_slice(&container.to_bytes());
        buf.extend_from_slice(&middle_key.to_bytes());
        buf
    }

    /// A seek target landing on the newest entry of `(container, middle_key)` with an
    /// entry-muid timestamp ≤ `as_of`: the prefix followed by `inv(Muid(as_of, 0, 0))`.
    pub fn seek_at_or_before(container: Muid, middle_key: &MiddleKey, as_of: i64) -> Vec<u8> {
        let mut buf = Self::prefix(container, middle_key);
        buf.extend_from_slice(&Muid::new(as_of, 0, 0).invert().to_bytes());
        buf
    }

    /// A seek target landing just past every entry of `(container, middle_key)`: the prefix
    /// followed by `inv(Muid(0, 0, 0))`, i.e. all-ones. One cursor step past this advances to
    /// the next middle-key.
    pub fn seek_past_all(container: Muid, middle_key: &MiddleKey) -> Vec<u8> {
        let mut buf = Self::prefix(container, middle_key);
        buf.extend_from_slice(&Muid::new(0, 0, 0).invert().to_bytes());
        buf
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Self::prefix(self.container, &self.middle_key);
        buf.extend_from_slice(&self.entry_muid.invert().to_bytes());
        buf.write_i64::<BigEndian>(self.expiry).unwrap();
        buf
    }

    /// Parses a raw entries-table key, given the behavior tag needed to know how to carve up
    /// the middle section (the key bytes alone don't self-describe DIRECTORY vs. SEQUENCE).
    pub fn parse(data: &[u8], kind: MiddleKeyKind) -> EntryKey {
        assert!(data.len() >= 16 + TRAILER_LEN, "entry key too short: {} bytes", data.len());
        let container = Muid::from_bytes(&data[0..16]);
        let middle_bytes = &data[16..data.len() - TRAILER_LEN];
        let trailer = &data[data.len() - TRAILER_LEN..];

        let middle_key = match kind {
            MiddleKeyKind::Directory => MiddleKey::Directory(middle_bytes.to_vec()),
            MiddleKeyKind::Sequence => {
                let mut cursor = middle_bytes;
                let effective_time = cursor.read_i64::<BigEndian>().unwrap();
                let move_muid = Muid::from_bytes(cursor);
                MiddleKey::Sequence { effective_time, move_muid }
            }
            MiddleKeyKind::None => {
                assert!(middle_bytes.is_empty());
                MiddleKey::None
            }
        };

        let entry_muid = Muid::from_bytes(&trailer[0..16]).invert();
        let expiry = i64::from_be_bytes(trailer[16..24].try_into().unwrap());
        EntryKey { container, middle_key, entry_muid, expiry }
    }
}

/// Which [`MiddleKey`] variant a raw key's bytes should be parsed as; determined by the
/// container's behavior tag, which the caller already knows from `container-defs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MiddleKeyKind {
    Directory,
    Sequence,
    None,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_round_trip() {
        let container = Muid::new(50, 7, 1);
        let entry_muid = Muid::new(200, 7, 3);
        let key = EntryKey::new(container, MiddleKey::Directory(b"a".to_vec()), entry_muid, 0);
        let bytes = key.to_bytes();
        let parsed = EntryKey::parse(&bytes, MiddleKeyKind::Directory);
        assert_eq!(parsed, key);
    }

    #[test]
    fn sequence_round_trip() {
        let container = Muid::new(50, 7, 1);
        let entry_muid = Muid::new(200, 7, 3);
        let middle = MiddleKey::Sequence { effective_time: 200, move_muid: entry_muid };
        let key = EntryKey::new(container, middle, entry_muid, 0);
        let bytes = key.to_bytes();
        let parsed = EntryKey::parse(&bytes, MiddleKeyKind::Sequence);
        assert_eq!(parsed, key);
    }

    #[test]
    fn newest_entry_sorts_first_within_prefix() {
        let container = Muid::new(50, 7, 1);
        let middle = MiddleKey::Directory(b"a".to_vec());
        let older = EntryKey::new(container, middle.clone(), Muid::new(100, 7, 2), 0).to_bytes();
        let newer = EntryKey::new(container, middle, Muid::new(200, 7, 2), 0).to_bytes();
        assert!(newer < older, "newest entry must sort first within its (container, middle-key) prefix");
    }

    #[test]
    fn seek_at_or_before_lands_on_newest_not_after() {
        let container = Muid::new(50, 7, 1);
        let middle = MiddleKey::Directory(b"a".to_vec());
        let e1 = EntryKey::new(container, middle.clone(), Muid::new(100, 7, 2), 0).to_bytes();
        let e2 = EntryKey::new(container, middle.clone(), Muid::new(200, 7, 2), 0).to_bytes();

        let seek = EntryKey::seek_at_or_before(container, &middle, 150);
        assert!(seek > e2 && seek < e1, "seek target for T=150 must fall strictly between the T=200 and T=100 rows");
    }
}
