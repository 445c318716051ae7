//! Fixed, little-endian wire types for collective exchanges.
//!
//! Records are `#[repr(C)]` and `Pod` so they can be cast to and from byte
//! buffers without a serializer. Received buffers are never assumed to be
//! aligned; decoding copies into freshly allocated storage.

use bytemuck::{Pod, Zeroable};
use static_assertions::const_assert_eq;
use std::mem::size_of;

use crate::la_error::LinalgError;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

/// Decode a byte buffer received from `peer` into a vector of `T`.
pub fn decode_vec<T: Pod>(peer: usize, bytes: &[u8]) -> Result<Vec<T>, LinalgError> {
    if bytes.len() % size_of::<T>() != 0 {
        return Err(LinalgError::CommError {
            neighbor: peer,
            reason: format!(
                "payload of {} bytes is not a multiple of the {}-byte record",
                bytes.len(),
                size_of::<T>()
            ),
        });
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Decode exactly one `T` from a byte buffer received from `peer`.
pub fn decode_one<T: Pod>(peer: usize, bytes: &[u8]) -> Result<T, LinalgError> {
    expect_exact_len(bytes.len(), size_of::<T>()).map_err(|reason| LinalgError::CommError {
        neighbor: peer,
        reason,
    })?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

pub fn expect_exact_len(actual: usize, expected: usize) -> Result<(), String> {
    if actual == expected {
        Ok(())
    } else {
        Err(format!("expected {expected} bytes, got {actual}"))
    }
}

/// Number of bytes that follow in the next message on the same channel.
///
/// `u32::MAX` is reserved: a sender whose payload does not fit announces it
/// with [`WireCount::oversized`] so the receiver fails instead of waiting.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    const OVERSIZED: u32 = u32::MAX;

    /// Header for an `n`-byte payload, or `None` if `n` cannot be announced.
    pub fn new(n: usize) -> Option<Self> {
        u32::try_from(n)
            .ok()
            .filter(|&n| n != Self::OVERSIZED)
            .map(|n| Self { n_le: n.to_le() })
    }
    pub fn oversized() -> Self {
        Self {
            n_le: Self::OVERSIZED.to_le(),
        }
    }
    /// Announced length, `None` for the oversized marker.
    pub fn get(&self) -> Option<usize> {
        match u32::from_le(self.n_le) {
            Self::OVERSIZED => None,
            n => Some(n as usize),
        }
    }
}

/// Size header for a payload sent to `peer`, failing when it does not fit.
pub fn count_for(peer: usize, n: usize) -> Result<WireCount, LinalgError> {
    WireCount::new(n).ok_or_else(|| LinalgError::CommError {
        neighbor: peer,
        reason: format!("payload of {n} bytes exceeds the {}-byte header limit", u32::MAX - 1),
    })
}

/// Half-open ownership range `[start, end)` of one rank.
#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable, Debug)]
pub struct WireRange {
    pub start_le: u64,
    pub end_le: u64,
}

impl WireRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start_le: start.to_le(),
            end_le: end.to_le(),
        }
    }
    pub fn start(&self) -> u64 {
        u64::from_le(self.start_le)
    }
    pub fn end(&self) -> u64 {
        u64::from_le(self.end_le)
    }
}

const_assert_eq!(size_of::<WireCount>(), 4);
const_assert_eq!(size_of::<WireRange>(), 16);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_unaligned_payload() {
        let values = [1.5f64, -2.0, 42.0];
        let mut bytes = vec![0u8];
        bytes.extend_from_slice(cast_slice(&values));
        let got: Vec<f64> = decode_vec(3, &bytes[1..]).unwrap();
        assert_eq!(got, values);
    }

    #[test]
    fn decode_rejects_ragged_payload() {
        let err = decode_vec::<u64>(1, &[0u8; 12]).unwrap_err();
        assert!(matches!(err, LinalgError::CommError { neighbor: 1, .. }));
    }

    #[test]
    fn count_rejects_lengths_past_header_range() {
        assert_eq!(WireCount::new(17).and_then(|c| c.get()), Some(17));
        assert!(WireCount::new(u32::MAX as usize).is_none());
        assert!(WireCount::oversized().get().is_none());
        let err = count_for(2, u32::MAX as usize).unwrap_err();
        assert!(matches!(err, LinalgError::CommError { neighbor: 2, .. }));
    }

    #[cfg(target_pointer_width = "64")]
    #[test]
    fn count_does_not_truncate_wide_lengths() {
        // 2^32 + 5 would wrap to 5 under a plain cast
        assert!(WireCount::new((1usize << 32) + 5).is_none());
    }

    #[test]
    fn range_round_trips_through_le() {
        let r = WireRange::new(7, 301);
        let back: WireRange = decode_one(0, cast_slice(std::slice::from_ref(&r))).unwrap();
        assert_eq!((back.start(), back.end()), (7, 301));
    }
}
