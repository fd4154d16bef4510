//! Glue between batching and the code around it: the transport that sends batches and the
//!  application that handles received messages.

#[cfg(test)] use mockall::automock;
use std::sync::Arc;
use tracing::{debug, trace};
use crate::batcher::Batcher;
use crate::buffers::BufferPool;
use crate::config::BatchingConfig;
use crate::error::UnbatchError;
use crate::unbatcher::Unbatcher;

/// This is an abstraction for handing a complete batch to the transport. The transport must send
///  it as a single unit, without splitting it or merging it with other batches.
#[cfg_attr(test, automock)]
pub trait BatchSink {
    fn send_batch(&mut self, batch: &[u8]);
}

impl <F: FnMut(&[u8])> BatchSink for F {
    fn send_batch(&mut self, batch: &[u8]) {
        self(batch)
    }
}

#[cfg_attr(test, automock)]
pub trait MessageHandler {
    fn on_message(&mut self, message: &[u8], timestamp: f64);
}

impl <F: FnMut(&[u8], f64)> MessageHandler for F {
    fn on_message(&mut self, message: &[u8], timestamp: f64) {
        self(message, timestamp)
    }
}

/// Sends all pending batches in FIFO order, returning the number of batches sent
pub fn flush(batcher: &mut Batcher, sink: &mut impl BatchSink) -> usize {
    let mut num_sent = 0;
    while let Some(batch) = batcher.get_batch() {
        trace!("sending batch of {} bytes", batch.len());
        sink.send_batch(batch.as_ref());
        num_sent += 1;
    }
    num_sent
}

/// Passes all received messages to the handler, returning the number of dispatched messages.
///  Stops at the first framing error.
pub fn dispatch_all(unbatcher: &mut Unbatcher, handler: &mut impl MessageHandler) -> Result<usize, UnbatchError> {
    let mut num_dispatched = 0;
    while let Some((message, timestamp)) = unbatcher.next_message()? {
        handler.on_message(message, timestamp);
        num_dispatched += 1;
    }
    Ok(num_dispatched)
}

/// Batching state for a single connection: a [Batcher] for outgoing and an [Unbatcher] for
///  incoming messages
pub struct BatchingChannel {
    batcher: Batcher,
    unbatcher: Unbatcher,
}

impl BatchingChannel {
    pub fn new(config: &BatchingConfig, buffer_pool: Arc<BufferPool>) -> anyhow::Result<BatchingChannel> {
        config.validate()?;

        Ok(BatchingChannel {
            batcher: Batcher::from_config(config, buffer_pool.clone()),
            unbatcher: Unbatcher::from_config(config, buffer_pool),
        })
    }

    pub fn send(&mut self, message: &[u8], timestamp: f64) {
        self.batcher.add_message(message, timestamp);
    }

    pub fn flush_to(&mut self, sink: &mut impl BatchSink) -> usize {
        flush(&mut self.batcher, sink)
    }

    /// Handles a batch received from the transport. An error means the peer violated the
    ///  framing protocol, and the connection should be closed.
    ///
    /// NB: Messages preceding a framing error in the same batch are dispatched before the error
    ///      is returned
    pub fn receive(&mut self, raw: &[u8], handler: &mut impl MessageHandler) -> Result<usize, UnbatchError> {
        self.unbatcher.add_batch(raw)?;
        dispatch_all(&mut self.unbatcher, handler)
    }

    /// Discard all pending data in both directions
    pub fn reset(&mut self) {
        debug!("resetting batching channel");
        self.batcher.clear();
        self.unbatcher.clear();
    }

    pub fn batcher(&self) -> &Batcher {
        &self.batcher
    }

    pub fn unbatcher(&self) -> &Unbatcher {
        &self.unbatcher
    }
}
