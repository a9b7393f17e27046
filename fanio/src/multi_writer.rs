// SPDX-License-Identifier: Apache-2.0

//! Concurrent write fan-out.

use std::io;
use std::io::Write;
use std::mem::{replace, take};
use std::sync::Arc;
use std::thread;
use std::thread::JoinHandle;
use bytes::Bytes;
use flume::{Receiver, Selector, Sender};
use crate::error::{Error, ErrorKind, OperationKind, Result, WorkerPanic};
use crate::options::MultiWriterOptions;
use crate::streams::{Sink, Stream, WriterSink};

type BoxedSink = Box<dyn Sink + Send>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
	Idle,
	Running,
	Closed,
}

struct Worker {
	queue: Sender<Bytes>,
	handle: JoinHandle<()>,
}

/// A [`Write`]r replicating each write to many sinks, each written by its own
/// thread.
///
/// Worker threads are spawned by the first write, one per sink, each fed by a
/// queue of up to [`MultiWriterOptions::queue_len`] writes. Every sink receives
/// the same shared buffer. Since sinks are written in the background, a sink's
/// failure is returned by a later write than the one that failed; once a failure
/// is returned, every later write returns it too.
///
/// [`close`](Self::close) waits for every sink to write its queued data, then
/// closes them. Dropping the writer closes it.
///
/// ```
/// use fanio::MultiWriter;
///
/// let mut writer = MultiWriter::new()
///     .with_writer(Vec::new())
///     .with_writer(std::io::sink());
/// writer.write(b"Hello, world!").unwrap();
/// writer.close().unwrap();
/// ```
pub struct MultiWriter {
	sinks: Vec<BoxedSink>,
	workers: Vec<Worker>,
	options: MultiWriterOptions,
	error_tx: Sender<Error>,
	error_rx: Receiver<Error>,
	failure: Option<Error>,
	state: State,
}

impl Default for MultiWriter {
	fn default() -> Self { Self::new() }
}

impl MultiWriter {
	/// Creates a writer with no sinks and default options.
	pub fn new() -> Self {
		Self::with_options(MultiWriterOptions::default())
	}

	/// Creates a writer with no sinks.
	pub fn with_options(options: MultiWriterOptions) -> Self {
		let (error_tx, error_rx) = flume::unbounded();
		Self {
			sinks: Vec::new(),
			workers: Vec::new(),
			options,
			error_tx,
			error_rx,
			failure: None,
			state: State::Idle,
		}
	}

	/// Creates a writer over `sinks` with default options.
	pub fn from_sinks<S: Sink + Send + 'static>(sinks: impl IntoIterator<Item = S>) -> Self {
		sinks.into_iter().fold(Self::new(), Self::with_sink)
	}

	/// Adds a sink. A sink added after writing has started receives only later
	/// writes; one added after closing is dropped.
	pub fn with_sink<S: Sink + Send + 'static>(mut self, sink: S) -> Self {
		let sink = Box::new(sink);
		match self.state {
			State::Idle => self.sinks.push(sink),
			State::Running => {
				if let Err(error) = self.spawn(sink) {
					self.fail(error);
				}
			}
			State::Closed => { }
		}
		self
	}

	/// Adds a plain writer as a sink. It's flushed when closed.
	pub fn with_writer<W: Write + Send + 'static>(self, writer: W) -> Self {
		self.with_sink(WriterSink::from(writer))
	}

	/// Returns the writer options.
	pub fn options(&self) -> &MultiWriterOptions { &self.options }

	/// Returns the number of sinks written to.
	pub fn sink_count(&self) -> usize {
		self.sinks.len() + self.workers.len()
	}

	/// Returns `true` if the writer was closed.
	pub fn is_closed(&self) -> bool { self.state == State::Closed }

	/// Copies `data` into a shared buffer and queues it to every sink. Returns the
	/// length of `data` if successful.
	///
	/// # Errors
	///
	/// Fails with [`Closed`](ErrorKind::Closed) if the writer was closed, or with
	/// the first failure reported by any sink.
	pub fn write(&mut self, data: &[u8]) -> Result<usize> {
		self.write_bytes(Bytes::copy_from_slice(data))
	}

	/// Queues `data` to every sink without copying it.
	pub fn write_bytes(&mut self, data: Bytes) -> Result<usize> {
		match self.state {
			State::Closed => return Err(Error::closed(OperationKind::Write)),
			State::Idle => self.start()?,
			State::Running => { }
		}

		if let Some(failure) = &self.failure {
			return Err(failure.clone())
		}

		let len = data.len();
		for index in 0..self.workers.len() {
			let sent = Selector::new()
				.send(&self.workers[index].queue, data.clone(), |result| result.map_err(|_| None))
				.recv(&self.error_rx, |error| Err(error.ok()))
				.wait();

			if let Err(error) = sent {
				// The worker only stops early after reporting its failure, unless it
				// panicked.
				let error = error
					.or_else(|| self.error_rx.try_recv().ok())
					.unwrap_or_else(|| worker_panic(OperationKind::Write, index));
				return Err(self.fail(error))
			}
		}
		Ok(len)
	}

	/// Closes every sink, waiting for each to write its queued data. Returns the
	/// first failure reported by any sink, including one previously returned by a
	/// write.
	///
	/// # Errors
	///
	/// Fails with [`Closed`](ErrorKind::Closed) if the writer was already closed.
	pub fn close(&mut self) -> Result {
		match replace(&mut self.state, State::Closed) {
			State::Closed => return Err(Error::closed(OperationKind::Close)),
			State::Idle => {
				for mut sink in take(&mut self.sinks) {
					if let Err(error) = sink.close() {
						self.fail(Error::io(OperationKind::Close, error));
					}
				}
			}
			State::Running => {
				let handles: Vec<_> =
					take(&mut self.workers)
						.into_iter()
						.map(|Worker { handle, .. }| handle)
						.collect();
				let mut panicked = Vec::new();
				for (index, handle) in handles.into_iter().enumerate() {
					if handle.join().is_err() {
						panicked.push(index);
					}
				}

				while let Ok(error) = self.error_rx.try_recv() {
					self.fail(error);
				}
				for index in panicked {
					self.fail(worker_panic(OperationKind::Close, index));
				}
			}
		}

		debug!(failed = self.failure.is_some(), "multi-writer closed");
		match &self.failure {
			Some(failure) => Err(failure.clone()),
			None => Ok(())
		}
	}

	fn start(&mut self) -> Result {
		self.state = State::Running;
		for sink in take(&mut self.sinks) {
			self.spawn(sink)?;
		}
		Ok(())
	}

	fn spawn(&mut self, sink: BoxedSink) -> Result {
		let index = self.workers.len();
		let (queue, receiver) = flume::bounded(self.options.queue_len());
		let errors = self.error_tx.clone();
		let handle = thread::Builder::new()
			.name(format!("fanio-sink-{index}"))
			.spawn(move || drain(index, sink, receiver, errors))
			.map_err(|error| Error::io(OperationKind::Start, error))?;
		self.workers.push(Worker { queue, handle });
		Ok(())
	}

	/// Records the first failure, returning it.
	fn fail(&mut self, error: Error) -> Error {
		self.failure.get_or_insert(error).clone()
	}
}

impl Write for MultiWriter {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		Ok(MultiWriter::write(self, buf)?)
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Drop for MultiWriter {
	fn drop(&mut self) {
		if !self.is_closed() {
			let _ = self.close();
		}
	}
}

fn worker_panic(op: OperationKind, index: usize) -> Error {
	Error::new(op, ErrorKind::Io, Some(Arc::new(WorkerPanic { index })))
}

/// Writes queued data to `sink` until the queue closes or a write fails, then
/// closes the sink.
fn drain(index: usize, mut sink: BoxedSink, queue: Receiver<Bytes>, errors: Sender<Error>) {
	debug!(index, "sink worker started");
	let mut failed = false;
	for data in queue.iter() {
		if let Err(error) = write_once(&mut sink, &data) {
			warn!(index, %error, "sink write failed");
			let _ = errors.send(error);
			failed = true;
			break
		}
		trace!(index, len = data.len(), "segment written");
	}
	// Disconnect before closing, so a blocked write wakes.
	drop(queue);

	if let Err(error) = sink.close() {
		warn!(index, %error, "sink close failed");
		let _ = errors.send(Error::io(OperationKind::Close, error));
	}
	debug!(index, failed, "sink worker stopped");
}

/// Writes `data` with a single call, failing if the sink accepts less than all
/// of it.
fn write_once(sink: &mut BoxedSink, data: &[u8]) -> Result {
	loop {
		match sink.write(data) {
			Ok(count) if count < data.len() => break Err(Error::short_write(count, data.len())),
			Ok(_) => break Ok(()),
			Err(error) if error.kind() == io::ErrorKind::Interrupted => { }
			Err(error) => break Err(Error::io(OperationKind::Write, error))
		}
	}
}
