// Copyright 2023 Strixpyrr
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Concurrent adapters reshaping byte-stream IO.
//!
//! - [`Broadcaster`] reads one source and delivers the whole stream to any
//!   number of [`BroadcasterReader`]s, each consuming at its own pace.
//! - [`MultiWriter`] replicates each write to many sinks, each written on its own
//!   thread.
//! - [`AsyncReader`] prefetches a slow source on a background thread, hiding its
//!   latency behind a queue of filled segments.
//! - [`ScannerWriter`] splits a sequence of writes into tokens, passing each to a
//!   callback as soon as its boundary is written.
//!
//! ## How it works
//!
//! Data moves between threads in *segments*: owned chunks of bytes, handed over
//! through bounded queues. A full queue blocks its producer until the consumer
//! catches up, so memory use is bounded by the queue length times the segment
//! size. Every blocking point also waits on the adapter's cancellation signal;
//! closing or aborting an adapter wakes anything blocked on it.
//!
//! Segments consumed by an [`AsyncReader`] are collected into a [`SegmentPool`],
//! one per segment size, and claimed again by the next prefetch. Broadcast and
//! fanned-out segments are shared [`Bytes`](bytes::Bytes) instead, read by every
//! consumer without copying.
//!
//! ## Errors
//!
//! All adapters fail with [`Error`], carrying the operation that failed, an
//! [`ErrorKind`], and the underlying source or sink error, if any. Failures in a
//! background thread are delivered once, at the next call that can observe them.
//! An adapter's terminal conditions, [`Closed`](ErrorKind::Closed) and
//! [`Aborted`](ErrorKind::Aborted), are permanent. End-of-data is never an error;
//! it's signaled by a read returning `Ok(0)`.

#[macro_use]
extern crate tracing;

mod async_reader;
mod broadcast;
mod cancel;
pub mod error;
mod multi_writer;
pub mod options;
pub mod pool;
pub mod scan;
pub mod streams;

pub use async_reader::AsyncReader;
pub use broadcast::{Broadcaster, BroadcasterReader};
pub use cancel::AbortHandle;
pub use error::{Error, ErrorKind, OperationKind, Result};
pub use multi_writer::MultiWriter;
pub use options::{AsyncReaderOptions, BroadcastOptions, MultiWriterOptions};
pub use pool::{SegmentPool, shared_pool};
pub use scan::ScannerWriter;
pub use streams::{Sink, Stream, WriterSink};

/// The default broadcast segment size, 8KiB.
pub const DEFAULT_BUFFER_SIZE: usize = 8 << 10;
/// The default prefetch segment size, 2MiB.
pub const DEFAULT_PREFETCH_SIZE: usize = 2 << 20;
/// The default number of segments queued ahead of each reader.
pub const DEFAULT_READ_QUEUE_LEN: usize = 32;
/// The default number of writes queued for each sink.
pub const DEFAULT_WRITE_QUEUE_LEN: usize = 32;
/// The default maximum number of bytes a [`ScannerWriter`] keeps pending.
pub const DEFAULT_MAX_SCAN_SIZE: usize = 64 << 10;
