use bytes::BytesMut;
use std::fmt::{Debug, Formatter};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};
use crate::config::BatchingConfig;

/// A pool of reusable byte buffers for batches, shared between all connections of a process.
///
/// Buffers are handed out as [PooledBuffer] handles which return their buffer to the pool when
///  they are dropped.
pub struct BufferPool {
    default_capacity: usize,
    max_pooled_capacity: usize,
    buffers: Mutex<Vec<BytesMut>>,
}

impl BufferPool {
    pub fn new(default_capacity: usize, max_pool_size: usize, max_pooled_capacity: usize) -> BufferPool {
        BufferPool {
            default_capacity,
            max_pooled_capacity,
            buffers: Mutex::new(Vec::with_capacity(max_pool_size)),
        }
    }

    pub fn from_config(config: &BatchingConfig) -> BufferPool {
        Self::new(config.batch_threshold, config.buffer_pool_size, config.max_pooled_capacity)
    }

    /// Returns an empty buffer with a capacity of at least `min_capacity` bytes
    pub fn take(self: &Arc<Self>, min_capacity: usize) -> PooledBuffer {
        PooledBuffer {
            buf: self.take_raw(min_capacity),
            pool: self.clone(),
        }
    }

    fn take_raw(&self, min_capacity: usize) -> BytesMut {
        {
            let mut buffers = self.lock_buffers();
            if let Some(idx) = buffers.iter().rposition(|b| b.capacity() >= min_capacity) {
                trace!("returning buffer from pool");
                return buffers.swap_remove(idx);
            }
        }

        debug!("no buffer with capacity {} in pool: creating new buffer", min_capacity);
        BytesMut::with_capacity(min_capacity.max(self.default_capacity))
    }

    fn release(&self, mut buffer: BytesMut) {
        if buffer.capacity() == 0 {
            return;
        }
        if buffer.capacity() > self.max_pooled_capacity {
            debug!("discarding returned buffer with capacity {}", buffer.capacity());
            return;
        }

        buffer.clear();

        let mut buffers = self.lock_buffers();
        if buffers.capacity() > buffers.len() {
            trace!("returning buffer to pool");
            buffers.push(buffer);
        }
        else {
            debug!("pool is full: discarding returned buffer");
        }
    }

    /// number of buffers currently available for reuse
    pub fn idle_count(&self) -> usize {
        self.lock_buffers().len()
    }

    fn lock_buffers(&self) -> MutexGuard<'_, Vec<BytesMut>> {
        // the pool's invariants hold between any two statements, so a panic while holding the
        //  lock leaves nothing half-updated
        self.buffers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A buffer on loan from a [BufferPool]. Dropping it returns the buffer to the pool.
pub struct PooledBuffer {
    buf: BytesMut,
    pool: Arc<BufferPool>,
}

impl PooledBuffer {
    /// Explicitly return the buffer to its pool - equivalent to dropping it
    pub fn release(self) {}

    /// Detach the buffer from its pool, e.g. to hand it to an API that needs ownership
    pub fn into_inner(mut self) -> BytesMut {
        std::mem::take(&mut self.buf)
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

impl Deref for PooledBuffer {
    type Target = BytesMut;

    fn deref(&self) -> &BytesMut {
        &self.buf
    }
}
impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.buf
    }
}

impl Debug for PooledBuffer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        self.buf.as_ref().fmt(f)
    }
}
