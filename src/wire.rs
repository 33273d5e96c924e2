//! Decoded shape of a bundle blob: the header fields and per-offset changes the
//! engine pulls out of an otherwise-opaque bundle, consumed in a format fixed
//! by the surrounding ecosystem rather than this crate.
//!
//! The real wire format (bundle authoring, serialization) is an external
//! collaborator this crate does not own. What lives here is the minimal
//! self-contained codec the engine and its tests exercise against: a flat,
//! versionless binary layout good enough to stand in for "decode the bundle
//! to extract the fields the engine needs."

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

use crate::bundle_info::BundleInfo;
use crate::muid::RelativeMuid;

/// A container's behavior tag, determining how its entries' middle-keys are shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Directory,
    Sequence,
    Property,
}

impl Behavior {
    fn to_byte(self) -> u8 {
        match self {
            Behavior::Directory => 0,
            Behavior::Sequence => 1,
            Behavior::Property => 2,
        }
    }

    fn from_byte(b: u8) -> io::Result<Behavior> {
        match b {
            0 => Ok(Behavior::Directory),
            1 => Ok(Behavior::Sequence),
            2 => Ok(Behavior::Property),
            _ => Err(io::Error::new(io::ErrorKind::InvalidData, "unknown behavior tag")),
        }
    }
}

/// The relative middle-key material carried inline in a bundle; entry-muid references inside
/// it may be zero, meaning "inherit from this change's own entry-muid" (true on initial
/// placement in a SEQUENCE).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelativeMiddleKey {
    Directory(Vec<u8>),
    Sequence { effective_time: i64, move_muid: RelativeMuid },
    None,
}

/// The payload of an entry change: a value, a deletion tombstone, or a pointer to another
/// container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryValue {
    Value(Vec<u8>),
    Tombstone,
    Pointee(RelativeMuid),
}

/// An entry-shaped change: a new row to place in the `entries` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryChange {
    pub container: RelativeMuid,
    pub middle_key: RelativeMiddleKey,
    pub expiry: i64,
    pub value: EntryValue,
}

/// One change within a bundle, identified by its offset (1-based position within the bundle).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    ContainerDef { behavior: Behavior, definition: Vec<u8> },
    Entry(EntryChange),
}

/// A decoded bundle: header fields plus its changes, keyed by offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bundle {
    pub timestamp: i64,
    pub medallion: i64,
    pub chain_start: i64,
    pub prior_time: i64,
    pub comment: Option<String>,
    pub changes: Vec<(i32, Change)>,
}

impl Bundle {
    /// The `BundleInfo` this bundle would produce on ingestion; `hash` is derived from the
    /// encoded bytes so that two distinct bundles never collide in the `bundles` table even if
    /// they happen to share every other field.
    pub fn info(&self, raw_bytes: &[u8]) -> BundleInfo {
        BundleInfo {
            timestamp: self.timestamp,
            medallion: self.medallion,
            chain_start: self.chain_start,
            prior_time: self.prior_time,
            hash: fnv1a(raw_bytes),
            comment: self.comment.clone(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.write_i64::<BigEndian>(self.timestamp).unwrap();
        buf.write_i64::<BigEndian>(self.medallion).unwrap();
        buf.write_i64::<BigEndian>(self.chain_start).unwrap();
        buf.write_i64::<BigEndian>(self.prior_time).unwrap();
        match &self.comment {
            Some(c) => {
                buf.write_u32::<BigEndian>(c.len() as u32).unwrap();
                buf.extend_from_slice(c.as_bytes());
            }
            None => buf.write_u32::<BigEndian>(u32::MAX).unwrap(),
        }
        buf.write_u32::<BigEndian>(self.changes.len() as u32).unwrap();
        for (offset, change) in &self.changes {
            buf.write_i32::<BigEndian>(*offset).unwrap();
            write_change(&mut buf, change);
        }
        buf
    }

    pub fn from_bytes(data: &[u8]) -> io::Result<Bundle> {
        let mut cursor = Cursor::new(data);
        let timestamp = cursor.read_i64::<BigEndian>()?;
        let medallion = cursor.read_i64::<BigEndian>()?;
        let chain_start = cursor.read_i64::<BigEndian>()?;
        let prior_time = cursor.read_i64::<BigEndian>()?;
        let comment_len = cursor.read_u32::<BigEndian>()?;
        let comment = if comment_len == u32::MAX {
            None
        } else {
            let mut s = vec![0u8; comment_len as usize];
            cursor.read_exact(&mut s)?;
            Some(String::from_utf8(s).map_err(|_| io::Error::new(io::ErrorKind::InvalidData, "bad comment utf8"))?)
        };
        let change_count = cursor.read_u32::<BigEndian>()?;
        let mut changes = Vec::with_capacity(change_count as usize);
        for _ in 0..change_count {
            let offset = cursor.read_i32::<BigEndian>()?;
            let change = read_change(&mut cursor)?;
            changes.push((offset, change));
        }
        Ok(Bundle { timestamp, medallion, chain_start, prior_time, comment, changes })
    }
}

fn write_relative_muid(buf: &mut Vec<u8>, m: &RelativeMuid) {
    buf.write_i64::<BigEndian>(m.timestamp).unwrap();
    buf.write_i64::<BigEndian>(m.medallion).unwrap();
    buf.write_i32::<BigEndian>(m.offset).unwrap();
}

fn read_relative_muid(cursor: &mut Cursor<&[u8]>) -> io::Result<RelativeMuid> {
    let timestamp = cursor.read_i64::<BigEndian>()?;
    let medallion = cursor.read_i64::<BigEndian>()?;
    let offset = cursor.read_i32::<BigEndian>()?;
    Ok(RelativeMuid { timestamp, medallion, offset })
}

/// Encodes an [`EntryValue`] as it is stored in the `entries` table: this is the value half of
/// an entries-table row, independent of the key.
pub fn encode_entry_value(buf: &mut Vec<u8>, value: &EntryValue) {
    match value {
        EntryValue::Value(bytes) => {
            buf.push(0);
            buf.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
            buf.extend_from_slice(bytes);
        }
        EntryValue::Tombstone => buf.push(1),
        EntryValue::Pointee(muid) => {
            buf.push(2);
            write_relative_muid(buf, muid);
        }
    }
}

pub fn decode_entry_value(cursor: &mut Cursor<&[u8]>) -> io::Result<EntryValue> {
    match cursor.read_u8()? {
        0 => {
            let len = cursor.read_u32::<BigEndian>()?;
            let mut bytes = vec![0u8; len as usize];
            cursor.read_exact(&mut bytes)?;
            Ok(EntryValue::Value(bytes))
        }
        1 => Ok(EntryValue::Tombstone),
        2 => Ok(EntryValue::Pointee(read_relative_muid(cursor)?)),
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "unknown entry-value tag")),
    }
}

/// Encodes a `container-defs` table value: behavior tag followed by the opaque definition.
pub fn encode_container_def(behavior: Behavior, definition: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(1 + definition.len());
    buf.push(behavior.to_byte());
    buf.extend_from_slice(definition);
    buf
}

pub fn decode_container_def(data: &[u8]) -> io::Result<(Behavior, &[u8])> {
    if data.is_empty() {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "empty container def"));
    }
    Ok((Behavior::from_byte(data[0])?, &data[1..]))
}

fn write_change(buf: &mut Vec<u8>, change: &Change) {
    match change {
        Change::ContainerDef { behavior, definition } => {
            buf.push(0);
            buf.push(behavior.to_byte());
            buf.write_u32::<BigEndian>(definition.len() as u32).unwrap();
            buf.extend_from_slice(definition);
        }
        Change::Entry(entry) => {
            buf.push(1);
            write_relative_muid(buf, &entry.container);
            match &entry.middle_key {
                RelativeMiddleKey::Directory(bytes) => {
                    buf.push(0);
                    buf.write_u32::<BigEndian>(bytes.len() as u32).unwrap();
                    buf.extend_from_slice(bytes);
                }
                RelativeMiddleKey::Sequence { effective_time, move_muid } => {
                    buf.push(1);
                    buf.write_i64::<BigEndian>(*effective_time).unwrap();
                    write_relative_muid(buf, move_muid);
                }
                RelativeMiddleKey::None => buf.push(2),
            }
            buf.write_i64::<BigEndian>(entry.expiry).unwrap();
            encode_entry_value(buf, &entry.value);
        }
    }
}

fn read_change(cursor: &mut Cursor<&[u8]>) -> io::Result<Change> {
    let tag = cursor.read_u8()?;
    match tag {
        0 => {
            let behavior = Behavior::from_byte(cursor.read_u8()?)?;
            let len = cursor.read_u32::<BigEndian>()?;
            let mut definition = vec![0u8; len as usize];
            cursor.read_exact(&mut definition)?;
            Ok(Change::ContainerDef { behavior, definition })
        }
        1 => {
            let container = read_relative_muid(cursor)?;
            let middle_key = match cursor.read_u8()? {
                0 => {
                    let len = cursor.read_u32::<BigEndian>()?;
                    let mut bytes = vec![0u8; len as usize];
                    cursor.read_exact(&mut bytes)?;
                    RelativeMiddleKey::Directory(bytes)
                }
                1 => {
                    let effective_time = cursor.read_i64::<BigEndian>()?;
                    let move_muid = read_relative_muid(cursor)?;
                    RelativeMiddleKey::Sequence { effective_time, move_muid }
                }
                2 => RelativeMiddleKey::None,
                _ => return Err(io::Error::new(io::ErrorKind::InvalidData, "unknown middle-key tag")),
            };
            let expiry = cursor.read_i64::<BigEndian>()?;
            let value = decode_entry_value(cursor)?;
            Ok(Change::Entry(EntryChange { container, middle_key, expiry, value }))
        }
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "unknown change tag")),
    }
}

/// FNV-1a, used only to give otherwise-identical bundles distinct canonical keys. Not a
/// cryptographic hash; collision resistance is not a requirement here since bundle rows are
/// append-only and addressed primarily by `(timestamp, medallion, chain_start)`, which are
/// already unique per well-behaved producer.
fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_empty_bundle() {
        let bundle = Bundle {
            timestamp: 100,
            medallion: 7,
            chain_start: 100,
            prior_time: 0,
            comment: None,
            changes: vec![],
        };
        let bytes = bundle.to_bytes();
        assert_eq!(Bundle::from_bytes(&bytes).unwrap(), bundle);
    }

    #[test]
    fn round_trip_with_changes() {
        let bundle = Bundle {
            timestamp: 100,
            medallion: 7,
            chain_start: 100,
            prior_time: 0,
            comment: Some("init".to_string()),
            changes: vec![
                (1, Change::ContainerDef { behavior: Behavior::Directory, definition: vec![] }),
                (
                    2,
                    Change::Entry(EntryChange {
                        container: RelativeMuid::at_offset(1),
                        middle_key: RelativeMiddleKey::Directory(b"a".to_vec()),
                        expiry: 0,
                        value: EntryValue::Value(b"x".to_vec()),
                    }),
                ),
            ],
        };
        let bytes = bundle.to_bytes();
        assert_eq!(Bundle::from_bytes(&bytes).unwrap(), bundle);
    }
}
