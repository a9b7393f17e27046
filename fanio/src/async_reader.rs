// SPDX-License-Identifier: Apache-2.0

//! Background prefetching for slow sources.
//!
//! An [`AsyncReader`] moves its source onto a background thread, which reads
//! one full segment at a time and queues it. Reads are served from the queue,
//! so source latency overlaps with whatever the consumer does between reads.

use std::io;
use std::io::Read;
use std::thread;
use std::thread::JoinHandle;
use flume::{Receiver, Selector, Sender};
use crate::cancel::{AbortHandle, CancelToken};
use crate::error::{Error, ErrorKind, OperationKind, Result};
use crate::options::AsyncReaderOptions;
use crate::pool::{SegmentPool, shared_pool};
use crate::streams::{End, read_full, SegmentQueue};

/// A filled segment, possibly carrying how the source ended.
struct Segment {
	data: Vec<u8>,
	end: Option<End>,
}

enum Next {
	Segment(Segment),
	Drained,
	Aborted,
}

/// A [`Read`]er prefetching from a wrapped source on a background thread.
///
/// The thread is spawned by [`start`](Self::start), or by the first read. It
/// fills segments of [`AsyncReaderOptions::segment_size`] bytes and queues up to
/// [`AsyncReaderOptions::queue_len`] of them ahead of the reader. A source error
/// is returned by the read reaching it, exactly once; end-of-data is returned
/// as `Ok(0)` once all prefetched bytes are consumed.
///
/// Closing the reader, or dropping it, stops prefetching. A read blocked on the
/// queue when the reader is closed through an [`AbortHandle`] returns `Ok(0)`.
pub struct AsyncReader<R> {
	source: Option<R>,
	options: AsyncReaderOptions,
	pool: SegmentPool,
	queue: Option<Receiver<Segment>>,
	abort: CancelToken,
	buf: SegmentQueue<Vec<u8>>,
	handle: Option<JoinHandle<()>>,
}

impl<R: Read + Send + 'static> AsyncReader<R> {
	/// Creates a reader with default options. Prefetching doesn't begin until
	/// [`start`](Self::start) or the first read.
	pub fn new(source: R) -> Self {
		Self::with_options(source, AsyncReaderOptions::default())
	}

	/// Creates a reader with `options`.
	pub fn with_options(source: R, options: AsyncReaderOptions) -> Self {
		Self {
			source: Some(source),
			options,
			pool: shared_pool(options.segment_size()),
			queue: None,
			abort: CancelToken::new(),
			buf: SegmentQueue::default(),
			handle: None,
		}
	}

	/// Returns the reader options.
	pub fn options(&self) -> &AsyncReaderOptions { &self.options }

	/// Returns `true` if prefetching was started.
	pub fn is_started(&self) -> bool { self.handle.is_some() }

	/// Returns `true` if the reader was closed.
	pub fn is_closed(&self) -> bool { self.abort.is_cancelled() }

	/// Returns a handle which closes the reader from another thread.
	pub fn abort_handle(&self) -> AbortHandle {
		AbortHandle::new(self.abort.clone())
	}

	/// Spawns the background thread. Fails if the reader was already started or
	/// closed.
	pub fn start(&mut self) -> Result {
		if self.is_closed() {
			return Err(Error::closed(OperationKind::Start))
		}
		let Some(source) = self.source.take() else {
			return Err(Error::new(OperationKind::Start, ErrorKind::AlreadyStarted, None))
		};

		let (sender, receiver) = flume::bounded(self.options.queue_len());
		let abort = self.abort.clone();
		let pool = self.pool.clone();
		let handle = thread::Builder::new()
			.name("fanio-prefetch".into())
			.spawn(move || prefetch(source, sender, abort, pool))
			.map_err(|err| Error::io(OperationKind::Start, err))?;

		self.queue = Some(receiver);
		self.handle = Some(handle);
		Ok(())
	}

	/// Stops prefetching. Subsequent reads return `Ok(0)`. Closing is idempotent.
	pub fn close(&mut self) -> Result {
		self.abort.cancel();
		self.queue = None;
		self.buf.clear();
		Ok(())
	}

	/// Waits for the next queued segment, until the queue is drained or the
	/// reader is closed.
	fn next_segment(&mut self) -> Next {
		let Some(queue) = &self.queue else { return Next::Drained };
		Selector::new()
			.recv(queue, |segment| segment.map_or(Next::Drained, Next::Segment))
			.recv(self.abort.signal(), |_| Next::Aborted)
			.wait()
	}
}

impl<R: Read + Send + 'static> Read for AsyncReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.is_closed() { return Ok(0) }
		if !self.is_started() {
			self.start()?;
		}

		while self.buf.len() < buf.len() {
			if self.is_closed() { return Ok(0) }

			match self.next_segment() {
				Next::Segment(Segment { data, end }) => {
					if let Some(End::Failed(err)) = end {
						self.pool.collect(data);
						self.queue = None;
						return Err(err)
					}

					self.buf.push(data);
				}
				Next::Drained => {
					self.queue = None;
					break
				}
				Next::Aborted => return Ok(0)
			}
		}

		let pool = &self.pool;
		Ok(self.buf.read_into(buf, |segment| pool.collect(segment)))
	}
}

impl<R> Drop for AsyncReader<R> {
	fn drop(&mut self) {
		// The thread may be blocked on the source; it exits once the read returns.
		self.abort.cancel();
	}
}

fn prefetch<R: Read>(
	mut source: R,
	queue: Sender<Segment>,
	abort: CancelToken,
	pool: SegmentPool
) {
	debug!(segment_size = pool.segment_size(), "prefetch started");
	loop {
		if abort.is_cancelled() { break }

		let mut data = pool.claim();
		let (count, end) = read_full(&mut source, &mut data);
		data.truncate(count);

		let done = end.is_some();
		if let Some(End::Failed(err)) = &end {
			debug!(%err, "prefetch source failed");
		}

		let sent = !abort.is_cancelled() && Selector::new()
			.send(&queue, Segment { data, end }, |result| result.is_ok())
			.recv(abort.signal(), |_| false)
			.wait();
		if !sent || done { break }
		trace!(count, "segment prefetched");
	}
	debug!(aborted = abort.is_cancelled(), "prefetch stopped");
}
