//! Global addresses (`Muid`) and their packed byte encoding.
//!
//! Grounded on `original_source/python/gink/impl/muid.py`: a `Muid` is a
//! `(timestamp, medallion, offset)` triple that packs into 16 bytes by
//! masking each field to a hex-digit budget (14/13/5 digits, i.e. 56/52/20
//! bits) and laying them out high-to-low as one 128-bit big-endian integer.
//! `from_bytes` re-signs each field using the Python original's "value
//! whose top bit is set is negative" rule, which falls out of treating each
//! budget as a power-of-two modulus.

use std::fmt;

use crate::bundle_info::BundleInfo;
use crate::error::GinkError;

const TIMESTAMP_BITS: u32 = 56; // 14 hex digits
const MEDALLION_BITS: u32 = 52; // 13 hex digits
const OFFSET_BITS: u32 = 20; // 5 hex digits

const TIMESTAMP_MOD: u128 = 1 << TIMESTAMP_BITS;
const MEDALLION_MOD: u128 = 1 << MEDALLION_BITS;
const OFFSET_MOD: u128 = 1 << OFFSET_BITS;

/// A 96-bit global address `(timestamp, medallion, offset)`.
///
/// A zero-valued field used inside a bundle means "inherit the containing
/// bundle's value for this field" — see [`RelativeMuid`]. A fully resolved
/// `Muid`, such as one returned from the store, always has non-zero
/// `medallion` and `offset` (the chain and position that minted it), though
/// `timestamp` may legitimately be any value a producer assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Muid {
    pub timestamp: i64,
    pub medallion: i64,
    pub offset: i32,
}

impl Muid {
    pub fn new(timestamp: i64, medallion: i64, offset: i32) -> Muid {
        Muid { timestamp, medallion, offset }
    }

    /// Packs this muid into its canonical 16-byte form.
    pub fn to_bytes(&self) -> [u8; 16] {
        let ts = mask(self.timestamp as i128, TIMESTAMP_MOD);
        let med = mask(self.medallion as i128, MEDALLION_MOD);
        let off = mask(self.offset as i128, OFFSET_MOD);
        let combined: u128 = (ts << (MEDALLION_BITS + OFFSET_BITS)) | (med << OFFSET_BITS) | off;
        combined.to_be_bytes()
    }

    /// Parses a muid from its canonical 16-byte form.
    ///
    /// # Panics
    /// Panics if `data` is shorter than 16 bytes; callers that parse composite keys are
    /// expected to have already validated their layout.
    pub fn from_bytes(data: &[u8]) -> Muid {
        assert!(data.len() >= 16, "muid bytes must be at least 16 bytes, got {}", data.len());
        let mut buf = [0u8; 16];
        buf.copy_from_slice(&data[..16]);
        let combined = u128::from_be_bytes(buf);

        let ts_raw = (combined >> (MEDALLION_BITS + OFFSET_BITS)) & (TIMESTAMP_MOD - 1);
        let med_raw = (combined >> OFFSET_BITS) & (MEDALLION_MOD - 1);
        let off_raw = combined & (OFFSET_MOD - 1);

        Muid {
            timestamp: unmask(ts_raw, TIMESTAMP_MOD) as i64,
            medallion: unmask(med_raw, MEDALLION_MOD) as i64,
            offset: unmask(off_raw, OFFSET_MOD) as i32,
        }
    }

    /// Returns a muid with each component bitwise-inverted. Used to store time-descending keys
    /// in a forward-sorted table: for `u < v`, `inv(u).to_bytes() > inv(v).to_bytes()`.
    ///
    /// Self-inverse: `m.invert().invert() == m`.
    pub fn invert(&self) -> Muid {
        Muid { timestamp: !self.timestamp, medallion: !self.medallion, offset: !self.offset }
    }

    /// Materializes a muid from a bundle-local reference, resolving any zero ("inherit")
    /// component against the containing bundle's `BundleInfo`.
    ///
    /// `offset` overrides the relative muid's own offset when given (used when minting a muid
    /// for a change at a known offset within the bundle being ingested).
    ///
    /// # Errors
    /// Returns `GinkError::CorruptBundle` if any component still resolves to zero after
    /// inheriting from `context` — a producer must never emit a bundle whose own context has a
    /// zero field, so this only happens on malformed or adversarial input, and the caller (an
    /// `add_bundle` decode path) is expected to reject it rather than have the engine panic.
    pub fn create(relative: RelativeMuid, context: &BundleInfo, offset: Option<i32>) -> Result<Muid, GinkError> {
        let timestamp = if relative.timestamp != 0 { relative.timestamp } else { context.timestamp };
        let medallion = if relative.medallion != 0 { relative.medallion } else { context.medallion };
        let offset = offset.unwrap_or(relative.offset);
        if offset == 0 {
            return Err(GinkError::CorruptBundle("muid offset resolves to zero with no context".to_string()));
        }
        if medallion == 0 {
            return Err(GinkError::CorruptBundle("muid medallion resolves to zero with no context".to_string()));
        }
        if timestamp == 0 {
            return Err(GinkError::CorruptBundle("muid timestamp resolves to zero with no context".to_string()));
        }
        Ok(Muid { timestamp, medallion, offset })
    }

    /// 34-character string form: `TTTTTTTTTTTTTT-MMMMMMMMMMMMM-OOOOO`.
    pub fn to_string_form(&self) -> String {
        format!(
            "{:014X}-{:013X}-{:05X}",
            mask(self.timestamp as i128, TIMESTAMP_MOD),
            mask(self.medallion as i128, MEDALLION_MOD),
            mask(self.offset as i128, OFFSET_MOD),
        )
    }
}

impl fmt::Display for Muid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_string_form())
    }
}

/// A muid as it appears inline in a bundle, where any field may be zero to mean "inherit from
/// the containing `BundleInfo`". Never persisted in a key — always resolved via `Muid::create`
/// before being written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelativeMuid {
    pub timestamp: i64,
    pub medallion: i64,
    pub offset: i32,
}

impl RelativeMuid {
    pub fn new(timestamp: i64, medallion: i64, offset: i32) -> RelativeMuid {
        RelativeMuid { timestamp, medallion, offset }
    }

    /// A relative muid with only the offset set; timestamp and medallion are inherited.
    pub fn at_offset(offset: i32) -> RelativeMuid {
        RelativeMuid { timestamp: 0, medallion: 0, offset }
    }
}

fn mask(value: i128, modulus: u128) -> u128 {
    value.rem_euclid(modulus as i128) as u128
}

fn unmask(raw: u128, modulus: u128) -> i128 {
    if raw > modulus / 2 {
        raw as i128 - modulus as i128
    } else {
        raw as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Legal muids carry non-negative components (timestamps, medallions and offsets are all
    // minted from monotonically increasing counters); negative values only arise internally as
    // an artifact of `invert()`, which is covered separately below.
    fn arb_muid() -> impl Strategy<Value = Muid> {
        (1i64..(1i64 << 55), 1i64..(1i64 << 51), 1i32..(1i32 << 19)).prop_map(|(t, m, o)| Muid::new(t, m, o))
    }

    #[test]
    fn round_trip_examples() {
        for m in [Muid::new(100, 7, 1), Muid::new(0, 0, 0), Muid::new(400, 7, 1)] {
            assert_eq!(Muid::from_bytes(&m.to_bytes()), m);
        }
    }

    #[test]
    fn string_form_length() {
        let m = Muid::new(100, 7, 1);
        assert_eq!(m.to_string_form().len(), 34);
    }

    #[test]
    fn invert_self_inverse() {
        let m = Muid::new(100, 7, 1);
        assert_eq!(m.invert().invert(), m);
    }

    proptest! {
        #[test]
        fn prop_round_trip(m in arb_muid()) {
            prop_assert_eq!(Muid::from_bytes(&m.to_bytes()), m);
            prop_assert_eq!(Muid::from_bytes(&m.invert().to_bytes()), m.invert());
        }

        #[test]
        fn prop_inversion_order(a in arb_muid(), b in arb_muid()) {
            prop_assume!(a != b);
            let (lo, hi) = if a < b { (a, b) } else { (b, a) };
            // lo < hi componentwise-as-tuple implies inv(lo) > inv(hi) in unsigned byte order.
            prop_assert!(lo.invert().to_bytes() > hi.invert().to_bytes());
        }
    }

    #[test]
    fn create_resolves_relative_fields() {
        let context = BundleInfo {
            timestamp: 100,
            medallion: 7,
            chain_start: 100,
            prior_time: 0,
            hash: 0,
            comment: None,
        };
        let resolved = Muid::create(RelativeMuid::at_offset(1), &context, None).unwrap();
        assert_eq!(resolved, Muid::new(100, 7, 1));

        let resolved = Muid::create(RelativeMuid::default(), &context, Some(3)).unwrap();
        assert_eq!(resolved, Muid::new(100, 7, 3));
    }

    #[test]
    fn create_rejects_unresolved_zero_fields() {
        let context = BundleInfo { timestamp: 0, medallion: 0, chain_start: 0, prior_time: 0, hash: 0, comment: None };
        assert!(matches!(
            Muid::create(RelativeMuid::default(), &context, None),
            Err(GinkError::CorruptBundle(_))
        ));
        assert!(matches!(
            Muid::create(RelativeMuid::default(), &context, Some(0)),
            Err(GinkError::CorruptBundle(_))
        ));
    }
}
