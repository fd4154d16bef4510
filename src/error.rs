use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VarIntDecodeError {
    #[error("input ended inside a varint")]
    Truncated,
    #[error("varint does not fit into 64 bits")]
    Overflow,
}

/// A framing violation in received data.
///
/// Every variant means the peer sent something that can not have been produced by a
///  well-behaved `Batcher`. The connection should be dropped; the error is never a reason to
///  take down anything beyond that connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnbatchError {
    #[error("batch of {len} bytes is too short to contain the batch timestamp")]
    BatchTooShort { len: usize },
    #[error("{queued} unconsumed batches are already queued")]
    TooManyQueuedBatches { queued: usize },
    #[error("batch ends inside a message length prefix")]
    TruncatedLengthPrefix,
    #[error("message length prefix does not fit into 64 bits")]
    InvalidLengthPrefix,
    #[error("declared message length {declared} exceeds the {remaining} bytes remaining in the batch")]
    LengthExceedsBatch { declared: u64, remaining: usize },
}

impl From<VarIntDecodeError> for UnbatchError {
    fn from(value: VarIntDecodeError) -> Self {
        match value {
            VarIntDecodeError::Truncated => UnbatchError::TruncatedLengthPrefix,
            VarIntDecodeError::Overflow => UnbatchError::InvalidLengthPrefix,
        }
    }
}
