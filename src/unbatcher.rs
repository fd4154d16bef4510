use bytes::BufMut;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{trace, warn};
use crate::batch_header::BatchHeader;
use crate::buffers::{BufferPool, PooledBuffer};
use crate::config::BatchingConfig;
use crate::error::UnbatchError;
use crate::varint;

/// Splits received batches into the messages they contain.
///
/// Received data is untrusted: all framing problems are reported as [UnbatchError] and never
///  cause a panic or an out-of-bounds read. The expected reaction to an error is to drop the
///  connection (and with it the `Unbatcher`).
pub struct Unbatcher {
    buffer_pool: Arc<BufferPool>,
    max_queued_batches: Option<usize>,

    /// received batches that are not fully consumed yet. The front batch is the one being read.
    batches: VecDeque<PooledBuffer>,
    /// offset of the next message's length prefix in the front batch
    read_pos: usize,
    /// timestamp of the front batch
    timestamp: f64,
}

impl Unbatcher {
    pub fn new(buffer_pool: Arc<BufferPool>) -> Unbatcher {
        Unbatcher {
            buffer_pool,
            max_queued_batches: None,
            batches: VecDeque::new(),
            read_pos: 0,
            timestamp: 0.0,
        }
    }

    pub fn from_config(config: &BatchingConfig, buffer_pool: Arc<BufferPool>) -> Unbatcher {
        Unbatcher {
            max_queued_batches: config.max_queued_batches,
            ..Self::new(buffer_pool)
        }
    }

    /// Copies a received batch into the queue of batches to be read. Rejected input is not
    ///  queued.
    pub fn add_batch(&mut self, raw: &[u8]) -> Result<(), UnbatchError> {
        if raw.len() < BatchHeader::SERIALIZED_LEN {
            warn!("received batch of {} bytes which is too short for a batch header", raw.len());
            return Err(UnbatchError::BatchTooShort { len: raw.len() });
        }
        if let Some(max_queued) = self.max_queued_batches {
            if self.batches.len() >= max_queued {
                warn!("{} received batches are waiting to be read - rejecting additional batch", self.batches.len());
                return Err(UnbatchError::TooManyQueuedBatches { queued: self.batches.len() });
            }
        }

        let mut buf = self.buffer_pool.take(raw.len());
        buf.put_slice(raw);
        self.batches.push_back(buf);
        trace!("queued batch of {} bytes", raw.len());

        if self.batches.len() == 1 {
            self.start_reading_front()?;
        }
        Ok(())
    }

    /// Returns the next message together with the timestamp of the batch it was sent in, or
    ///  `Ok(None)` when all queued batches are consumed.
    ///
    /// The message is a view into the batch's buffer, so it is only available until the next
    ///  call.
    ///
    /// NB: A framing error leaves the read position unchanged, i.e. repeated calls return the
    ///      same error.
    pub fn next_message(&mut self) -> Result<Option<(&[u8], f64)>, UnbatchError> {
        loop {
            match self.batches.front() {
                None => return Ok(None),
                Some(batch) if self.read_pos < batch.len() => break,
                Some(_) => self.retire_front()?,
            }
        }

        let Some(batch) = self.batches.front() else {
            return Ok(None);
        };

        let mut remaining: &[u8] = &batch[self.read_pos..];
        let message_len = varint::decode(&mut remaining)
            .inspect_err(|e| warn!("invalid message length prefix in received batch: {}", e))?;

        if message_len > remaining.len() as u64 {
            warn!("received message length {} exceeds the {} bytes remaining in the batch", message_len, remaining.len());
            return Err(UnbatchError::LengthExceedsBatch { declared: message_len, remaining: remaining.len() });
        }
        let message_len = message_len as usize;

        let start = batch.len() - remaining.len();
        let end = start + message_len;
        self.read_pos = end;

        trace!("unbatched message of {} bytes", message_len);
        Ok(Some((&batch[start..end], self.timestamp)))
    }

    pub fn num_queued_batches(&self) -> usize {
        self.batches.len()
    }

    /// Discard all received data, e.g. when the connection is closed
    pub fn clear(&mut self) {
        self.batches.clear();
        self.read_pos = 0;
        self.timestamp = 0.0;
    }

    fn retire_front(&mut self) -> Result<(), UnbatchError> {
        self.batches.pop_front();
        if self.batches.is_empty() {
            self.read_pos = 0;
            Ok(())
        }
        else {
            self.start_reading_front()
        }
    }

    fn start_reading_front(&mut self) -> Result<(), UnbatchError> {
        if let Some(batch) = self.batches.front() {
            let mut b: &[u8] = batch;
            self.timestamp = BatchHeader::deser(&mut b)?.timestamp;
            self.read_pos = BatchHeader::SERIALIZED_LEN;
        }
        Ok(())
    }
}
