use bytes::BufMut;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;
use crate::batch_header::BatchHeader;
use crate::buffers::{BufferPool, PooledBuffer};
use crate::config::BatchingConfig;
use crate::varint;

/// Accumulates outgoing messages into batches of roughly `threshold` bytes.
///
/// Each batch starts with the timestamp of the first message that went into it, followed by
///  the messages, each prefixed with its length as a varint. Messages are never split: a
///  message that does not fit into the current batch starts a new one, and a message that is
///  bigger than the threshold is sent in a batch of its own.
///
/// A `Batcher` belongs to a single connection and is not meant to be shared between threads.
pub struct Batcher {
    threshold: usize,
    buffer_pool: Arc<BufferPool>,
    /// complete batches in the order they were finished
    ready: VecDeque<PooledBuffer>,
    work_in_progress: Option<PooledBuffer>,
}

impl Batcher {
    pub fn new(threshold: usize, buffer_pool: Arc<BufferPool>) -> Batcher {
        Batcher {
            threshold,
            buffer_pool,
            ready: VecDeque::new(),
            work_in_progress: None,
        }
    }

    pub fn from_config(config: &BatchingConfig, buffer_pool: Arc<BufferPool>) -> Batcher {
        Self::new(config.batch_threshold, buffer_pool)
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn add_message(&mut self, message: &[u8], timestamp: f64) {
        let needed_size = varint::size(message.len() as u64) + message.len();

        let wip_is_full = self.work_in_progress.as_ref()
            .is_some_and(|wip| wip.len() + needed_size > self.threshold);
        if wip_is_full {
            if let Some(finished) = self.work_in_progress.take() {
                trace!("batch of {} bytes is complete", finished.len());
                self.ready.push_back(finished);
            }
        }

        let threshold = self.threshold;
        let buffer_pool = &self.buffer_pool;
        let wip = self.work_in_progress.get_or_insert_with(|| {
            let mut new_batch = buffer_pool.take(threshold.max(BatchHeader::SERIALIZED_LEN + needed_size));
            BatchHeader { timestamp }.ser(&mut *new_batch);
            new_batch
        });

        trace!("adding message of {} bytes to batch", message.len());
        varint::encode(message.len() as u64, &mut **wip);
        wip.put_slice(message);
    }

    /// Returns the oldest complete batch, or the batch that is currently being filled if there
    ///  are no complete batches. Returns `None` if there is nothing to send.
    ///
    /// Dropping the returned buffer returns it to the pool, so it should be dropped as soon as
    ///  the transport is done with it.
    pub fn get_batch(&mut self) -> Option<PooledBuffer> {
        if let Some(batch) = self.ready.pop_front() {
            return Some(batch);
        }
        self.work_in_progress.take()
    }

    pub fn num_ready_batches(&self) -> usize {
        self.ready.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.ready.is_empty() || self.work_in_progress.is_some()
    }

    /// Discard all unsent messages, e.g. when the connection is reset
    pub fn clear(&mut self) {
        self.ready.clear();
        self.work_in_progress = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn batcher(threshold: usize) -> Batcher {
        Batcher::new(threshold, Arc::new(BufferPool::new(threshold, 16, 1024*1024)))
    }

    fn batch_bytes(timestamp: f64, framed_messages: &[u8]) -> Vec<u8> {
        let mut result = timestamp.to_le_bytes().to_vec();
        result.extend_from_slice(framed_messages);
        result
    }

    #[test]
    fn test_empty() {
        let mut batcher = batcher(16);
        assert!(batcher.get_batch().is_none());
        assert!(batcher.get_batch().is_none());
        assert!(!batcher.has_pending());
    }

    #[test]
    fn test_single_message() {
        let mut batcher = batcher(100);
        batcher.add_message(&[1, 2, 3], 2.0);

        assert!(batcher.has_pending());
        assert_eq!(batcher.num_ready_batches(), 0);
        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(2.0, &[3, 1, 2, 3]).as_slice());
        assert!(batcher.get_batch().is_none());
    }

    #[test]
    fn test_empty_message() {
        let mut batcher = batcher(100);
        batcher.add_message(&[], 1.0);
        batcher.add_message(&[], 1.0);

        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(1.0, &[0, 0]).as_slice());
    }

    #[test]
    fn test_timestamp_of_first_message_wins() {
        let mut batcher = batcher(100);
        batcher.add_message(&[1], 3.0);
        batcher.add_message(&[2], 4.0);

        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(3.0, &[1, 1, 1, 2]).as_slice());
    }

    #[test]
    fn test_oversized_message_in_own_batch() {
        let mut batcher = batcher(16);
        batcher.add_message(&[0xaa; 3], 1.0);
        batcher.add_message(&[0xbb; 20], 1.0);

        assert_eq!(batcher.num_ready_batches(), 1);

        let first = batcher.get_batch().unwrap();
        assert_eq!(first.as_ref(), batch_bytes(1.0, &[3, 0xaa, 0xaa, 0xaa]).as_slice());
        assert_eq!(first.len(), 12);

        let second = batcher.get_batch().unwrap();
        let mut expected = vec![20];
        expected.extend_from_slice(&[0xbb; 20]);
        assert_eq!(second.as_ref(), batch_bytes(1.0, &expected).as_slice());
        assert_eq!(second.len(), 29);

        assert!(batcher.get_batch().is_none());
    }

    #[test]
    fn test_oversized_message_in_empty_batcher() {
        let mut batcher = batcher(16);
        batcher.add_message(&[7; 100], 1.0);
        batcher.add_message(&[8], 1.0);

        assert_eq!(batcher.get_batch().unwrap().len(), 8 + 1 + 100);
        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(1.0, &[1, 8]).as_slice());
        assert!(batcher.get_batch().is_none());
    }

    #[rstest]
    #[case::exact_fit(12, vec![vec![1], vec![2]], vec![vec![1, 1, 1, 2]])]
    #[case::one_byte_over(11, vec![vec![1], vec![2]], vec![vec![1, 1], vec![1, 2]])]
    #[case::three_batches(10, vec![vec![1], vec![2], vec![3]], vec![vec![1, 1], vec![1, 2], vec![1, 3]])]
    #[case::two_plus_one(14, vec![vec![1, 1], vec![2, 2], vec![3, 3]], vec![vec![2, 1, 1, 2, 2, 2], vec![2, 3, 3]])]
    fn test_threshold(#[case] threshold: usize, #[case] messages: Vec<Vec<u8>>, #[case] expected_framed: Vec<Vec<u8>>) {
        let mut batcher = batcher(threshold);
        for msg in &messages {
            batcher.add_message(msg, 5.0);
        }

        for framed in expected_framed {
            assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(5.0, &framed).as_slice());
        }
        assert!(batcher.get_batch().is_none());
    }

    #[test]
    fn test_fifo_with_interleaved_get_batch() {
        let mut batcher = batcher(10);
        batcher.add_message(&[1], 1.0);
        batcher.add_message(&[2], 2.0);
        assert_eq!(batcher.num_ready_batches(), 1);

        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(1.0, &[1, 1]).as_slice());

        batcher.add_message(&[3], 3.0);
        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(2.0, &[1, 2]).as_slice());
        assert_eq!(batcher.get_batch().unwrap().as_ref(), batch_bytes(3.0, &[1, 3]).as_slice());
        assert!(batcher.get_batch().is_none());
    }

    #[test]
    fn test_batch_size_bounded_by_threshold() {
        let threshold = 64;
        let mut batcher = batcher(threshold);
        for i in 0..200usize {
            batcher.add_message(&vec![i as u8; i % 70], i as f64);
        }

        while let Some(batch) = batcher.get_batch() {
            if batch.len() > threshold {
                let mut b: &[u8] = &batch[BatchHeader::SERIALIZED_LEN..];
                let len = varint::decode(&mut b).unwrap() as usize;
                assert_eq!(b.len(), len, "an oversized batch must contain exactly one message");
            }
        }
    }

    #[test]
    fn test_buffers_return_to_pool() {
        let pool = Arc::new(BufferPool::new(16, 16, 1024));
        let mut batcher = Batcher::new(16, pool.clone());

        batcher.add_message(&[1; 5], 1.0);
        batcher.add_message(&[2; 5], 1.0);
        assert_eq!(pool.idle_count(), 0);

        batcher.get_batch().unwrap().release();
        assert_eq!(pool.idle_count(), 1);

        batcher.clear();
        assert_eq!(pool.idle_count(), 2);
        assert!(batcher.get_batch().is_none());
    }
}
