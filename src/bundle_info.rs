//! Canonical metadata of a bundle: `(timestamp, medallion, chain_start, prior_time, hash)`.
//!
//! Used verbatim as the key of the `bundles` table and, narrowed to its
//! `medallion ‖ chain_start` pair, as the lookup key into `chain-infos`. The
//! comment field is carried for display purposes only and is not part of the
//! canonical byte form — two bundles that differ only in comment are, for
//! ordering and deduplication purposes, never produced by a well-behaved
//! producer in the first place.

use byteorder::{BigEndian, WriteBytesExt};

/// Canonical metadata identifying one bundle on one chain.
///
/// `prior_time == 0` iff this is the chain's first bundle, in which case
/// `timestamp` must equal `chain_start` (see [`BundleInfo::is_chain_start`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BundleInfo {
    pub timestamp: i64,
    pub medallion: i64,
    pub chain_start: i64,
    pub prior_time: i64,
    /// Content hash of the raw bundle bytes, carried to make the canonical key unique even in
    /// the (disallowed but not trusted) case of two distinct bundles sharing a timestamp.
    pub hash: u64,
    pub comment: Option<String>,
}

impl BundleInfo {
    /// The `(medallion, chain_start)` pair identifying this bundle's chain.
    pub fn chain(&self) -> crate::chain::Chain {
        crate::chain::Chain { medallion: self.medallion, chain_start: self.chain_start }
    }

    /// True iff this is the first bundle on its chain.
    pub fn is_chain_start(&self) -> bool {
        self.prior_time == 0
    }

    /// Packs `(timestamp, medallion, chain_start, prior_time, hash)` as fixed-width big-endian
    /// integers, in that order, so that unsigned byte comparison of two encodings agrees with
    /// `(timestamp, medallion, chain_start, prior_time, hash)` tuple comparison for any two
    /// infos with non-negative timestamps, medallions and chain-starts — the only values real
    /// producers emit.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(40);
        buf.write_i64::<BigEndian>(self.timestamp).unwrap();
        buf.write_i64::<BigEndian>(self.medallion).unwrap();
        buf.write_i64::<BigEndian>(self.chain_start).unwrap();
        buf.write_i64::<BigEndian>(self.prior_time).unwrap();
        buf.write_u64::<BigEndian>(self.hash).unwrap();
        buf
    }

    /// Parses the fixed 40-byte canonical form produced by [`BundleInfo::to_bytes`].
    ///
    /// The comment is not recoverable from the canonical bytes (it is not part of the key); the
    /// returned info always has `comment: None`.
    pub fn from_bytes(data: &[u8]) -> BundleInfo {
        assert!(data.len() >= 40, "bundle info bytes must be at least 40 bytes, got {}", data.len());
        let timestamp = i64::from_be_bytes(data[0..8].try_into().unwrap());
        let medallion = i64::from_be_bytes(data[8..16].try_into().unwrap());
        let chain_start = i64::from_be_bytes(data[16..24].try_into().unwrap());
        let prior_time = i64::from_be_bytes(data[24..32].try_into().unwrap());
        let hash = u64::from_be_bytes(data[32..40].try_into().unwrap());
        BundleInfo { timestamp, medallion, chain_start, prior_time, hash, comment: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BundleInfo {
        BundleInfo {
            timestamp: 200,
            medallion: 7,
            chain_start: 100,
            prior_time: 100,
            hash: 0xDEAD_BEEF,
            comment: Some("hello".to_string()),
        }
    }

    #[test]
    fn round_trip_drops_comment() {
        let info = sample();
        let bytes = info.to_bytes();
        assert_eq!(bytes.len(), 40);
        let back = BundleInfo::from_bytes(&bytes);
        assert_eq!(back.timestamp, info.timestamp);
        assert_eq!(back.medallion, info.medallion);
        assert_eq!(back.chain_start, info.chain_start);
        assert_eq!(back.prior_time, info.prior_time);
        assert_eq!(back.hash, info.hash);
        assert_eq!(back.comment, None);
    }

    #[test]
    fn byte_order_matches_timestamp_order() {
        let earlier = BundleInfo { timestamp: 100, prior_time: 0, ..sample() };
        let later = BundleInfo { timestamp: 200, ..sample() };
        assert!(earlier.to_bytes() < later.to_bytes());
    }

    #[test]
    fn chain_start_has_no_prior() {
        let first = BundleInfo { prior_time: 0, timestamp: 100, chain_start: 100, ..sample() };
        assert!(first.is_chain_start());
        assert_eq!(first.chain().chain_start, 100);
    }
}
