use anyhow::bail;
use crate::batch_header::BatchHeader;

pub struct BatchingConfig {
    /// The size in bytes at which a `Batcher` stops adding messages to a batch and starts a
    ///  new one. This is a threshold rather than a hard limit: a message that does not fit into
    ///  an empty batch is still sent, alone in a batch of its own.
    ///
    /// This should normally be the transport's maximum payload per packet, e.g.
    ///  `1500 - 20 - 8 = 1472` for UDP over IPV4 with full Ethernet frames.
    pub batch_threshold: usize,

    /// This is the number of idle buffers that will be pooled at a given time - buffers in excess
    ///  of this number are discarded when they are returned.
    pub buffer_pool_size: usize,

    /// Buffers can grow beyond the threshold when an oversized message is batched. Buffers that
    ///  grew beyond this capacity are discarded rather than pooled when they are returned, so
    ///  a burst of big messages does not pin memory indefinitely.
    pub max_pooled_capacity: usize,

    /// Upper bound for the number of received but not fully consumed batches per `Unbatcher`.
    ///  `None` means unbounded.
    pub max_queued_batches: Option<usize>,
}

impl BatchingConfig {
    pub fn default_ipv4() -> BatchingConfig {
        Self::for_threshold(1472)
    }

    pub fn for_threshold(batch_threshold: usize) -> BatchingConfig {
        BatchingConfig {
            batch_threshold,
            buffer_pool_size: 1024,
            max_pooled_capacity: 64*1024,
            max_queued_batches: None,
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        // timestamp + single-byte length + single-byte message
        let min_threshold = BatchHeader::SERIALIZED_LEN + 2;
        if self.batch_threshold < min_threshold {
            bail!("batch threshold of {} bytes is too small - it must be at least {} bytes", self.batch_threshold, min_threshold);
        }
        if self.max_pooled_capacity < self.batch_threshold {
            bail!("max pooled capacity ({}) must not be smaller than the batch threshold ({})", self.max_pooled_capacity, self.batch_threshold);
        }
        if self.max_queued_batches == Some(0) {
            bail!("max queued batches must be positive");
        }
        Ok(())
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self::default_ipv4()
    }
}
