use bytes::{Buf, BufMut};
use crate::error::UnbatchError;
use crate::varint;

/// The fixed-size prefix of every batch: the sender's timestamp for the tick the batch was
///  started in, as a little-endian IEEE-754 double.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchHeader {
    pub timestamp: f64,
}

impl BatchHeader {
    pub const SERIALIZED_LEN: usize = size_of::<f64>();

    pub fn ser(&self, buf: &mut impl BufMut) {
        buf.put_f64_le(self.timestamp);
    }

    pub fn deser(buf: &mut impl Buf) -> Result<Self, UnbatchError> {
        if buf.remaining() < Self::SERIALIZED_LEN {
            return Err(UnbatchError::BatchTooShort { len: buf.remaining() });
        }
        Ok(BatchHeader {
            timestamp: buf.get_f64_le(),
        })
    }

    /// Worst-case number of bytes that batching adds to a message of the given length, i.e.
    ///  the overhead when the message ends up alone in its batch. Transports use this to check
    ///  messages against their maximum packet size before handing them to a `Batcher`.
    pub fn max_message_overhead(message_len: usize) -> usize {
        Self::SERIALIZED_LEN + varint::size(message_len as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use rstest::rstest;

    #[rstest]
    #[case::zero(0.0, vec![0,0,0,0,0,0,0,0])]
    #[case::one(1.0, vec![0,0,0,0,0,0,0xf0,0x3f])]
    #[case::negative(-2.5, vec![0,0,0,0,0,0,4,0xc0])]
    fn test_ser(#[case] timestamp: f64, #[case] expected: Vec<u8>) {
        let mut buf = BytesMut::new();
        BatchHeader { timestamp }.ser(&mut buf);
        assert_eq!(buf.as_ref(), expected.as_slice());

        let mut b: &[u8] = &buf;
        assert_eq!(BatchHeader::deser(&mut b).unwrap(), BatchHeader { timestamp });
        assert!(b.is_empty());
    }

    #[rstest]
    #[case::empty(0)]
    #[case::one(1)]
    #[case::seven(7)]
    fn test_deser_too_short(#[case] len: usize) {
        let data = vec![0u8; len];
        let mut b: &[u8] = &data;
        assert_eq!(BatchHeader::deser(&mut b), Err(UnbatchError::BatchTooShort { len }));
    }

    #[rstest]
    #[case::empty(0, 9)]
    #[case::single_byte_prefix(127, 9)]
    #[case::two_byte_prefix(128, 10)]
    #[case::large(70_000, 11)]
    fn test_max_message_overhead(#[case] message_len: usize, #[case] expected: usize) {
        assert_eq!(BatchHeader::max_message_overhead(message_len), expected);
    }
}
