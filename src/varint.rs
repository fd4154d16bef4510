//! Length prefixes for messages inside a batch.
//!
//! The encoding is LEB128 as implemented by `bytes-varint`: seven payload bits per byte, with
//!  the high bit set on every byte except the last. Values below 128 take exactly one byte,
//!  which covers the vast majority of message lengths in practice.

use bytes::{Buf, BufMut};
use bytes_varint::{VarIntError, VarIntSupport, VarIntSupportMut};
use crate::error::VarIntDecodeError;

/// The maximum number of bytes a `u64` varint can occupy
pub const MAX_VARINT_LEN: usize = 10;

/// number of bytes [encode] writes for `value`
pub fn size(value: u64) -> usize {
    if value == 0 {
        return 1;
    }
    let significant_bits = (u64::BITS - value.leading_zeros()) as usize;
    significant_bits.div_ceil(7)
}

pub fn encode(value: u64, buf: &mut impl BufMut) {
    buf.put_u64_varint(value);
}

/// Reads a varint from the front of `buf`.
///
/// NB: On failure, `buf` may be partially consumed. Callers that need to retain their read
///  position should decode from a copy of the slice.
pub fn decode(buf: &mut impl Buf) -> Result<u64, VarIntDecodeError> {
    buf.try_get_u64_varint()
        .map_err(|e| match e {
            VarIntError::BufferUnderflow => VarIntDecodeError::Truncated,
            _ => VarIntDecodeError::Overflow,
        })
}
