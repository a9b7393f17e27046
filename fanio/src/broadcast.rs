// SPDX-License-Identifier: Apache-2.0

//! One source, many readers.
//!
//! A [`Broadcaster`] reads its source in segments and hands every segment to
//! each of its [`BroadcasterReader`]s, through a queue per reader. Readers are
//! registered before broadcasting, usually moved onto their own threads, and
//! consume the stream independently. Segments are shared [`Bytes`], so readers
//! never copy each other's data.
//!
//! ```
//! use std::io::Read;
//! use std::thread;
//! use fanio::Broadcaster;
//!
//! let mut broadcaster = Broadcaster::new(&b"Hello, world!"[..]);
//! let handles: Vec<_> = (0..3).map(|_| {
//!     let mut reader = broadcaster.new_reader();
//!     thread::spawn(move || {
//!         let mut text = String::new();
//!         reader.read_to_string(&mut text).map(|_| text)
//!     })
//! }).collect();
//!
//! broadcaster.broadcast().unwrap();
//! for handle in handles {
//!     assert_eq!(handle.join().unwrap().unwrap(), "Hello, world!");
//! }
//! ```

use std::collections::VecDeque;
use std::io;
use std::io::Read;
use std::mem::take;
use bytes::Bytes;
use flume::{Receiver, Selector, Sender, TryRecvError};
use crate::cancel::{AbortHandle, CancelToken};
use crate::error::{Error, OperationKind, Result};
use crate::options::BroadcastOptions;
use crate::streams::{End, read_full, SegmentQueue};

/// How a broadcast ended for a reader. The slot holds at most two: the end of
/// the broadcast, and the reader being closed.
#[derive(Clone, Debug)]
enum Terminal {
	Eof,
	Failed(Error),
	Closed,
	Aborted,
}

const SLOT_LEN: usize = 2;

/// The broadcaster's end of a reader.
struct Registration {
	id: usize,
	data: Sender<Bytes>,
	slot: Sender<Terminal>,
	detach: CancelToken,
}

enum Offer {
	Sent,
	Detached,
	Aborted,
}

/// Broadcasts a single source to many readers.
///
/// Readers are created with [`new_reader`](Self::new_reader) before calling
/// [`broadcast`](Self::broadcast), which runs on the calling thread until the
/// source is exhausted, fails, or the broadcast is aborted. A slow reader holds
/// back the broadcast only once its queue of
/// [`BroadcastOptions::queue_len`] segments is full; a closed reader is dropped
/// from the broadcast without holding anything back.
///
/// Dropping a broadcaster that never broadcast closes its readers.
pub struct Broadcaster<R> {
	source: R,
	options: BroadcastOptions,
	readers: VecDeque<Registration>,
	next_id: usize,
	abort: CancelToken,
	finished: bool,
}

impl<R: Read> Broadcaster<R> {
	/// Creates a broadcaster with default options.
	pub fn new(source: R) -> Self {
		Self::with_options(source, BroadcastOptions::default())
	}

	/// Creates a broadcaster with `options`.
	pub fn with_options(source: R, options: BroadcastOptions) -> Self {
		Self {
			source,
			options,
			readers: VecDeque::new(),
			next_id: 0,
			abort: CancelToken::new(),
			finished: false,
		}
	}

	/// Returns the broadcast options.
	pub fn options(&self) -> &BroadcastOptions { &self.options }

	/// Returns the number of registered readers.
	pub fn reader_count(&self) -> usize { self.readers.len() }

	/// Registers a new reader. A reader created after the broadcast finished is
	/// closed.
	pub fn new_reader(&mut self) -> BroadcasterReader {
		let (data_tx, data) = flume::bounded(self.options.queue_len());
		let (slot_tx, slot) = flume::bounded(SLOT_LEN);
		let detach = CancelToken::new();
		let reader = BroadcasterReader {
			buf: SegmentQueue::default(),
			data,
			slot,
			slot_tx: slot_tx.clone(),
			detach: detach.clone(),
			abort: self.abort.clone(),
			last: None,
		};

		if self.finished {
			let _ = slot_tx.try_send(Terminal::Closed);
		} else {
			self.readers.push_back(Registration {
				id: self.next_id,
				data: data_tx,
				slot: slot_tx,
				detach,
			});
			self.next_id += 1;
		}
		reader
	}

	/// Aborts the broadcast. Safe to call before or during broadcasting; use an
	/// [`AbortHandle`] to abort from another thread.
	pub fn abort(&self) { self.abort.cancel() }

	/// Returns a handle which aborts the broadcast from another thread.
	pub fn abort_handle(&self) -> AbortHandle {
		AbortHandle::new(self.abort.clone())
	}

	/// Reads the source to its end, broadcasting it to all readers. Returns once
	/// the source is exhausted and every segment is queued, not once every reader
	/// has consumed its data.
	///
	/// # Errors
	///
	/// Returns the source's failure, which every reader receives as well, or an
	/// [`Aborted`](crate::ErrorKind::Aborted) error if the broadcast was aborted.
	/// Calling this again returns [`Closed`](crate::ErrorKind::Closed).
	pub fn broadcast(&mut self) -> Result {
		if self.finished {
			return Err(Error::closed(OperationKind::Broadcast))
		}
		self.finished = true;

		debug!(readers = self.readers.len(), "broadcast started");
		let result = self.pump();

		let terminal = match &result {
			Ok(()) => Some(Terminal::Eof),
			Err(error) if error.is_aborted() => None,
			Err(error) => Some(Terminal::Failed(error.clone())),
		};

		// Fill each slot before disconnecting its queue, so a reader finding its
		// queue disconnected always finds its slot filled.
		let readers = take(&mut self.readers);
		for reader in readers {
			if let Some(terminal) = &terminal {
				let _ = reader.slot.try_send(terminal.clone());
			}
		}

		match &result {
			Ok(()) => debug!("broadcast finished"),
			Err(error) => debug!(%error, "broadcast stopped"),
		}
		result
	}

	fn pump(&mut self) -> Result {
		let size = self.options.segment_size();
		loop {
			if self.abort.is_cancelled() {
				return Err(Error::aborted(OperationKind::Broadcast))
			}

			let mut segment = vec![0; size];
			let (count, end) = read_full(&mut self.source, &mut segment);
			if count > 0 {
				segment.truncate(count);
				self.distribute(segment.into())?;
			}

			match end {
				None => { }
				Some(End::Eof) => return Ok(()),
				Some(End::Failed(error)) => return Err(Error::io(OperationKind::Broadcast, error))
			}
		}
	}

	/// Queues `segment` to every reader, removing readers that detach while
	/// waiting.
	fn distribute(&mut self, segment: Bytes) -> Result {
		let mut i = 0;
		while i < self.readers.len() {
			let reader = &self.readers[i];
			let offer = if self.abort.is_cancelled() {
				Offer::Aborted
			} else if reader.detach.is_cancelled() {
				Offer::Detached
			} else {
				Selector::new()
					.send(&reader.data, segment.clone(), |result|
						if result.is_ok() { Offer::Sent } else { Offer::Detached }
					)
					.recv(reader.detach.signal(), |_| Offer::Detached)
					.recv(self.abort.signal(), |_| Offer::Aborted)
					.wait()
			};

			match offer {
				Offer::Sent => i += 1,
				// The front reader takes this one's place; the next reader to visit
				// is now at the same index.
				Offer::Detached => {
					if let Some(Registration { id, .. }) = self.readers.swap_remove_front(i) {
						debug!(id, "reader detached");
					}
				}
				Offer::Aborted => return Err(Error::aborted(OperationKind::Broadcast))
			}
		}
		trace!(len = segment.len(), readers = self.readers.len(), "segment broadcast");
		Ok(())
	}
}

impl<R> Drop for Broadcaster<R> {
	fn drop(&mut self) {
		if self.finished { return }
		// Readers would otherwise see their queue disconnect with an empty slot,
		// indistinguishable from the end of the stream.
		for reader in self.readers.drain(..) {
			let _ = reader.slot.try_send(Terminal::Closed);
		}
	}
}

/// A reader receiving a [`Broadcaster`]'s stream.
///
/// Reads block until the read buffer can be filled or the broadcast ends. Once
/// the broadcast ends, reads return any remaining data, then `Ok(0)` or the
/// source's failure. If the broadcast is aborted, reads fail with
/// [`Aborted`](crate::ErrorKind::Aborted) from then on, discarding any data not
/// yet read.
///
/// Closing the reader, or dropping it, removes it from the broadcast.
pub struct BroadcasterReader {
	buf: SegmentQueue<Bytes>,
	data: Receiver<Bytes>,
	slot: Receiver<Terminal>,
	slot_tx: Sender<Terminal>,
	detach: CancelToken,
	abort: CancelToken,
	last: Option<Terminal>,
}

enum Next {
	Data(Bytes),
	Disconnected,
	Aborted,
}

impl BroadcasterReader {
	/// Reads broadcast data into `buf`, returning the number of bytes read.
	///
	/// `Ok(0)` means the broadcast ended, or has no data for this reader yet if
	/// the read buffer is empty.
	///
	/// # Errors
	///
	/// Fails with the source's failure, with an
	/// [`Aborted`](crate::ErrorKind::Aborted) error if the broadcast was aborted,
	/// or with a [`Closed`](crate::ErrorKind::Closed) error if this reader was
	/// closed and has no queued data left.
	pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
		if matches!(self.last, Some(Terminal::Closed | Terminal::Aborted)) {
			return self.terminal()
		}
		if self.abort.is_cancelled() {
			return self.aborted()
		}

		if self.detach.is_cancelled() {
			while self.buf.len() < buf.len() {
				let Ok(data) = self.data.try_recv() else { break };
				self.buf.push(data);
			}

			if self.buf.is_empty() {
				self.last = Some(Terminal::Closed);
				return self.terminal()
			}
			return Ok(self.copy_to(buf))
		}

		while self.buf.len() < buf.len() {
			let next = Selector::new()
				.recv(&self.data, |data| data.map_or(Next::Disconnected, Next::Data))
				.recv(self.abort.signal(), |_| Next::Aborted)
				.wait();
			match next {
				Next::Data(data) => self.buf.push(data),
				Next::Disconnected => break,
				Next::Aborted => return self.aborted()
			}
		}

		if !self.buf.is_empty() {
			return Ok(self.copy_to(buf))
		}

		// A broadcast aborted after disconnecting the queue.
		if self.abort.is_cancelled() {
			return self.aborted()
		}

		match self.slot.try_recv() {
			Ok(terminal) => self.last = Some(terminal),
			Err(TryRecvError::Empty | TryRecvError::Disconnected) => { }
		}
		self.terminal()
	}

	/// Removes the reader from the broadcast, without blocking. Data already
	/// queued can still be read, after which reads fail with
	/// [`Closed`](crate::ErrorKind::Closed).
	pub fn close(&mut self) -> Result {
		if !self.detach.is_cancelled() {
			self.detach.cancel();
			let _ = self.slot_tx.try_send(Terminal::Closed);
		}
		Ok(())
	}

	/// Returns `true` if the reader was closed.
	pub fn is_closed(&self) -> bool { self.detach.is_cancelled() }

	fn copy_to(&mut self, buf: &mut [u8]) -> usize {
		self.buf.read_into(buf, drop)
	}

	fn aborted(&mut self) -> Result<usize> {
		self.buf.clear();
		self.last = Some(Terminal::Aborted);
		self.terminal()
	}

	fn terminal(&self) -> Result<usize> {
		match &self.last {
			None | Some(Terminal::Eof) => Ok(0),
			Some(Terminal::Failed(error)) => Err(error.clone()),
			Some(Terminal::Closed) => Err(Error::closed(OperationKind::Read)),
			Some(Terminal::Aborted) => Err(Error::aborted(OperationKind::Read)),
		}
	}
}

impl Read for BroadcasterReader {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(BroadcasterReader::read(self, buf)?)
	}
}

impl Drop for BroadcasterReader {
	fn drop(&mut self) {
		self.detach.cancel();
	}
}

#[cfg(test)]
mod test {
	use bytes::Bytes;
	use pretty_assertions::assert_eq;
	use crate::options::BroadcastOptions;
	use super::Broadcaster;

	#[test]
	fn detached_readers_are_removed() {
		let options = BroadcastOptions::default().with_queue_len(4);
		let mut broadcaster = Broadcaster::with_options(&b""[..], options);
		let mut readers: Vec<_> = (0..4).map(|_| broadcaster.new_reader()).collect();

		readers[1].close().unwrap();
		readers[3].close().unwrap();
		broadcaster.distribute(Bytes::from_static(b"abc")).unwrap();
		assert_eq!(broadcaster.reader_count(), 2);

		readers[0].close().unwrap();
		broadcaster.distribute(Bytes::from_static(b"def")).unwrap();
		assert_eq!(broadcaster.reader_count(), 1);

		let mut buf = [0; 6];
		assert_eq!(readers[2].read(&mut buf).unwrap(), 6);
		assert_eq!(&buf, b"abcdef");
		// Closed readers keep what was queued before they closed.
		assert_eq!(readers[0].read(&mut buf).unwrap(), 3);
		assert_eq!(&buf[..3], b"abc");
		assert!(readers[0].read(&mut buf).unwrap_err().is_closed());
	}

	#[test]
	fn second_broadcast_is_closed() {
		let mut broadcaster = Broadcaster::new(&b"abc"[..]);
		broadcaster.broadcast().unwrap();
		assert!(broadcaster.broadcast().unwrap_err().is_closed());

		let mut late = broadcaster.new_reader();
		assert!(late.read(&mut [0; 1]).unwrap_err().is_closed());
	}
}
