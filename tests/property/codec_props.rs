//! Varint and delta-encoding invariants.

use proptest::prelude::*;
use rummage::codec;

proptest! {
    #[test]
    fn varint_u32_roundtrip(value in 0u32..u32::MAX) {
        let mut buf = Vec::new();
        codec::write_u32(value, &mut buf);
        let (decoded, consumed) = codec::read_u32(&buf).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, buf.len());
        prop_assert!(buf.len() <= 5);
    }

    #[test]
    fn varint_u64_roundtrip(value in any::<u64>()) {
        let mut buf = Vec::new();
        codec::write_u64(value, &mut buf);
        let (decoded, consumed) = codec::read_u64(&buf).unwrap();
        prop_assert_eq!(decoded, value);
        prop_assert_eq!(consumed, buf.len());
        prop_assert!(buf.len() <= 10);
    }

    #[test]
    fn size_estimate_is_exact(value in any::<u64>()) {
        let mut buf = Vec::new();
        codec::write_u64(value, &mut buf);
        prop_assert_eq!(codec::encoded_len(value), buf.len());
    }

    /// Any strictly increasing sequence survives delta encoding.
    #[test]
    fn monotone_roundtrip(gaps in prop::collection::vec(1u32..10_000, 0..300), first in 0u32..1_000_000) {
        let mut values = Vec::with_capacity(gaps.len() + 1);
        let mut current = first;
        values.push(current);
        for gap in gaps {
            current = current.saturating_add(gap);
            values.push(current);
        }
        values.dedup(); // saturation at u32::MAX could repeat

        let mut buf = Vec::new();
        codec::write_monotone(&values, &mut buf).unwrap();
        prop_assert_eq!(codec::monotone_encoded_len(&values).unwrap(), buf.len());
        let (decoded, consumed) = codec::read_monotone(&buf, values.len()).unwrap();
        prop_assert_eq!(decoded, values);
        prop_assert_eq!(consumed, buf.len());
    }

    /// Decoding random bytes never panics; it errors or consumes sanely.
    #[test]
    fn decode_arbitrary_bytes_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..16)) {
        match codec::read_u32(&bytes) {
            Ok((_, consumed)) => prop_assert!(consumed <= bytes.len()),
            Err(_) => {}
        }
    }
}
