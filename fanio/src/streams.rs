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

use std::collections::VecDeque;
use std::fs::File;
use std::io;
use std::io::{BufWriter, Read, Write};

/// A data stream which may be closed.
pub trait Stream {
	/// Closes the stream. The default implementation does nothing.
	fn close(&mut self) -> io::Result<()> { Ok(()) }
}

/// A data sink: a [`Write`]r that can be closed once all data is written.
pub trait Sink: Write + Stream { }

impl<S: Write + Stream + ?Sized> Sink for S { }

impl<S: Stream + ?Sized> Stream for Box<S> {
	fn close(&mut self) -> io::Result<()> { (**self).close() }
}

impl Stream for Vec<u8> { }

impl Stream for io::Sink { }

impl Stream for File {
	/// Flushes the file. The file itself is closed when dropped.
	fn close(&mut self) -> io::Result<()> { self.flush() }
}

impl<W: Write> Stream for BufWriter<W> {
	/// Flushes buffered data to the inner writer.
	fn close(&mut self) -> io::Result<()> { self.flush() }
}

/// A [`Sink`] writing to a wrapped [`Write`]r.
#[derive(Debug)]
pub struct WriterSink<W: Write> {
	writer: Option<W>,
}

impl<W: Write> From<W> for WriterSink<W> {
	fn from(writer: W) -> Self {
		Self { writer: Some(writer) }
	}
}

impl<W: Write> WriterSink<W> {
	/// Returns `true` if the sink was closed.
	pub fn is_closed(&self) -> bool { self.writer.is_none() }

	fn writer(&mut self) -> io::Result<&mut W> {
		self.writer
			.as_mut()
			.ok_or_else(|| io::ErrorKind::BrokenPipe.into())
	}
}

impl<W: Write> Write for WriterSink<W> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.writer()?.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.writer()?.flush()
	}
}

impl<W: Write> Stream for WriterSink<W> {
	/// Flushes the underlying writer, then closes it by letting it fall out of
	/// scope. Subsequent writes will fail. Closing is idempotent.
	fn close(&mut self) -> io::Result<()> {
		match self.writer.take() {
			Some(mut writer) => writer.flush(),
			None => Ok(())
		}
	}
}

/// How a source ended.
#[derive(Debug)]
pub(crate) enum End {
	/// The source has no more data.
	Eof,
	/// The source failed.
	Failed(io::Error),
}

/// Reads from `reader` until `buf` is full or the source ends, returning the
/// number of bytes read and how the source ended, if it did. Interrupted reads
/// are retried.
pub(crate) fn read_full<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> (usize, Option<End>) {
	let mut count = 0;
	while count < buf.len() {
		match reader.read(&mut buf[count..]) {
			Ok(0) => return (count, Some(End::Eof)),
			Ok(n) => count += n,
			Err(err) if err.kind() == io::ErrorKind::Interrupted => { }
			Err(err) => return (count, Some(End::Failed(err)))
		}
	}
	(count, None)
}

/// Received segments awaiting a reader. Segments are read in place, from an
/// offset into the front segment, and handed back once fully read.
#[derive(Debug)]
pub(crate) struct SegmentQueue<T> {
	segments: VecDeque<T>,
	offset: usize,
	len: usize,
}

impl<T> Default for SegmentQueue<T> {
	fn default() -> Self {
		Self {
			segments: VecDeque::new(),
			offset: 0,
			len: 0,
		}
	}
}

impl<T: AsRef<[u8]>> SegmentQueue<T> {
	/// Returns the number of unread bytes.
	pub fn len(&self) -> usize { self.len }

	pub fn is_empty(&self) -> bool { self.len == 0 }

	pub fn push(&mut self, segment: T) {
		self.len += segment.as_ref().len();
		self.segments.push_back(segment);
	}

	/// Copies unread bytes into `buf`, passing each fully read segment to
	/// `consumed`. Returns the number of bytes copied.
	pub fn read_into(&mut self, buf: &mut [u8], mut consumed: impl FnMut(T)) -> usize {
		let mut count = 0;
		while let Some(front) = self.segments.front() {
			let rest = &front.as_ref()[self.offset..];
			let n = rest.len().min(buf.len() - count);
			buf[count..count + n].copy_from_slice(&rest[..n]);
			count += n;
			if n < rest.len() {
				self.offset += n;
				break
			}

			self.offset = 0;
			if let Some(segment) = self.segments.pop_front() {
				consumed(segment);
			}
		}
		self.len -= count;
		count
	}

	/// Discards all unread bytes.
	pub fn clear(&mut self) {
		self.segments.clear();
		self.offset = 0;
		self.len = 0;
	}
}
