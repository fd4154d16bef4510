//! Batching of small messages into bigger transport-level writes, and splitting them up again
//!  on the receiving side.
//!
//! Real-time applications send many small messages per tick. Sending each of them as a packet
//!  of its own wastes bandwidth on per-packet overhead, so a [batcher::Batcher] collects them into
//!  batches of roughly the transport's packet size, and an [unbatcher::Unbatcher] takes them
//!  apart on the other end.
//!
//! ## Design goals
//!
//! * Messages are opaque byte sequences - this layer does not interpret them
//! * Messages are delivered in the order they were added, across batch boundaries
//! * Messages are never split: a message bigger than the batch threshold is sent in a batch of
//!   its own. Fragmentation is the transport's business.
//! * Reliability, ordering of batches, encryption etc. are left to the transport
//! * Received data is untrusted. Malformed batches are reported as errors so the offending
//!   connection can be closed, they never panic
//! * Buffers are pooled to avoid per-message allocation. A [buffers::BufferPool] can be shared
//!   between connections, while `Batcher` and `Unbatcher` are per connection and not thread safe
//!
//! ## Batch format
//!
//! ```ascii
//!  0: timestamp (f64 LE) - the sender's time of the tick in which the batch was started
//!  8: message length (varint), followed by the message's bytes
//!  *: (repeated) message length + message
//! ```
//!
//! Lengths are LEB128 varints (see [varint]), so messages shorter than 128 bytes have a single
//!  byte of overhead.
//!
//! All messages in a batch share the batch's timestamp: it represents the tick the batch
//!  was sent in, not individual send times.

pub mod batch_header;
pub mod batcher;
pub mod buffers;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod unbatcher;
pub mod varint;

pub use batcher::Batcher;
pub use buffers::{BufferPool, PooledBuffer};
pub use config::BatchingConfig;
pub use error::{UnbatchError, VarIntDecodeError};
pub use pipeline::{BatchSink, BatchingChannel, MessageHandler};
pub use unbatcher::Unbatcher;
