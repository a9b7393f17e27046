// SPDX-License-Identifier: Apache-2.0

//! Tokenizing writes.
//!
//! A [`ScannerWriter`] turns a sequence of writes into a sequence of tokens: it
//! buffers what it's given, runs a [`Splitter`] over the buffer, and passes each
//! token found to a callback. Bytes following the last boundary are held until
//! the next write, or until the writer is flushed.
//!
//! ```
//! use fanio::ScannerWriter;
//! use fanio::scan::split::Words;
//!
//! let mut words = Vec::new();
//! let mut scanner = ScannerWriter::new(Words::new(), 1024, |token: &[u8]| {
//!     words.push(token.to_vec());
//!     Ok(())
//! });
//! scanner.write(b"a b").unwrap();
//! scanner.write(b"c").unwrap();
//! scanner.close().unwrap();
//! drop(scanner);
//! assert_eq!(words, [b"a".to_vec(), b"bc".to_vec()]);
//! ```

pub mod split;

use std::io;
use crate::error::{Error, ErrorBox, ErrorKind, OperationKind, Result};
pub use split::{split_fn, Split, SplitFn, SplitResult, Splitter};

/// The number of consecutive empty tokens a splitter may return without
/// advancing before scanning fails.
const MAX_EMPTY_TOKENS: usize = 100;

/// The result of a token callback.
pub type CallbackResult = std::result::Result<(), ErrorBox>;

/// A writer passing tokens found in written data to a callback.
///
/// Tokens are emitted during [`write`](Self::write) as soon as their boundary is
/// found. The unterminated remainder is kept pending, up to a maximum size, and
/// is split one last time by [`flush`](Self::flush) or [`close`](Self::close).
/// Token boundaries don't depend on how data is divided between writes.
///
/// Any error returned by the splitter or callback fails the write, discarding
/// pending data.
pub struct ScannerWriter<S, T> {
	splitter: S,
	on_token: T,
	buf: Vec<u8>,
	max_buf_size: usize,
	closed: bool,
}

impl<S: Splitter, T: FnMut(&[u8]) -> CallbackResult> ScannerWriter<S, T> {
	/// Creates a writer splitting with `splitter`, keeping at most `max_buf_size`
	/// pending bytes, and passing tokens to `on_token`.
	pub fn new(splitter: S, max_buf_size: usize, on_token: T) -> Self {
		Self {
			splitter,
			on_token,
			buf: Vec::new(),
			max_buf_size,
			closed: false,
		}
	}

	/// Returns the bytes written but not yet part of a token.
	pub fn pending(&self) -> &[u8] { &self.buf }

	/// Returns the maximum number of pending bytes.
	pub fn max_buf_size(&self) -> usize { self.max_buf_size }

	/// Returns `true` if the writer was closed.
	pub fn is_closed(&self) -> bool { self.closed }

	/// Splits `data`, following any pending bytes, into tokens. Returns the
	/// length of `data` if successful.
	///
	/// # Errors
	///
	/// Fails with [`Closed`](ErrorKind::Closed) if the writer was closed, with
	/// [`Overflow`](ErrorKind::Overflow) if the unterminated remainder exceeds
	/// the maximum buffer size, or with any error from the splitter or callback.
	/// Pending data is discarded on error.
	pub fn write(&mut self, data: &[u8]) -> Result<usize> {
		if self.closed {
			return Err(Error::closed(OperationKind::Write))
		}

		let Self { splitter, on_token, buf, max_buf_size, .. } = self;
		let direct = buf.is_empty();
		let input = if direct {
			data
		} else {
			buf.extend_from_slice(data);
			&buf[..]
		};

		let (consumed, result) = scan(splitter, on_token, input, false);
		let remaining = input.len() - consumed;
		let result = result.and_then(|_|
			if remaining > *max_buf_size {
				Err(Error::overflow(remaining, *max_buf_size))
			} else {
				Ok(())
			}
		);

		if let Err(error) = result {
			buf.clear();
			return Err(error)
		}

		if direct {
			buf.extend_from_slice(&data[consumed..]);
		} else {
			buf.drain(..consumed);
		}
		Ok(data.len())
	}

	/// Splits pending bytes as the final input, emitting every remaining token,
	/// then clears them. Does nothing if no bytes are pending.
	///
	/// The splitter is called with the final flag repeatedly, until it consumes
	/// all pending bytes or stops advancing, not just once. A splitter returning
	/// one token per call at the end of input yields all of them, rather than
	/// the first with the rest discarded.
	///
	/// This ends the current input: a token spanning the flush is split in two.
	/// Flush only where the input actually ends.
	///
	/// A splitter error leaves its input pending; a callback error discards it.
	pub fn flush(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(OperationKind::Flush))
		}
		if self.buf.is_empty() {
			return Ok(())
		}

		let Self { splitter, on_token, buf, .. } = self;
		let (consumed, result) = scan(splitter, on_token, &buf[..], true);
		match result {
			Err(error) if error.operation() == OperationKind::Split => {
				buf.drain(..consumed);
				Err(error.with_operation(OperationKind::Flush))
			}
			result => {
				buf.clear();
				result.map_err(|error| error.with_operation(OperationKind::Flush))
			}
		}
	}

	/// Flushes, then closes the writer. If flushing fails, the writer stays open.
	pub fn close(&mut self) -> Result {
		if self.closed {
			return Err(Error::closed(OperationKind::Close))
		}
		self.flush()?;
		self.closed = true;
		Ok(())
	}
}

/// Splits `data` into tokens until the splitter requests more data, returning
/// the number of bytes consumed. At EOF, empty tokens aren't emitted.
fn scan<S: Splitter, T: FnMut(&[u8]) -> CallbackResult>(
	splitter: &mut S,
	on_token: &mut T,
	data: &[u8],
	at_eof: bool
) -> (usize, Result) {
	let mut start = 0;
	let mut empties = 0;
	while start < data.len() {
		let rest = &data[start..];
		let Split { advance, token } = match splitter.split(rest, at_eof) {
			Ok(split) => split,
			Err(error) => return (start, Err(Error::callback(OperationKind::Split, error)))
		};

		if advance > rest.len() {
			let error = Error::new(OperationKind::Split, ErrorKind::AdvanceTooFar, None);
			return (start, Err(error))
		}

		let Some(token) = token else {
			if advance == 0 { break }
			start += advance;
			continue
		};

		if !(at_eof && token.is_empty()) {
			if let Err(error) = on_token(token) {
				return (start, Err(Error::callback(OperationKind::Token, error)))
			}
		}

		if advance == 0 {
			empties += 1;
			if empties > MAX_EMPTY_TOKENS {
				let error = Error::new(OperationKind::Split, ErrorKind::NoProgress, None);
				return (start, Err(error))
			}
		} else {
			empties = 0;
		}
		start += advance;
	}
	(start, Ok(()))
}

/// Writing through [`io::Write`] behaves like the inherent methods, with one
/// caveat: [`flush`](io::Write::flush) is the *final* flush, ending the input.
///
/// Pending bytes are split as if no more data will follow, so a token spanning
/// the flush is emitted as two. Generic code flushing part-way through a stream
/// splits tokens wherever it flushes. Write directly, or flush only once all
/// data is written.
impl<S: Splitter, T: FnMut(&[u8]) -> CallbackResult> io::Write for ScannerWriter<S, T> {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		Ok(ScannerWriter::write(self, buf)?)
	}

	/// Ends the input, emitting pending bytes as the final tokens. See
	/// [`ScannerWriter::flush`].
	fn flush(&mut self) -> io::Result<()> {
		Ok(ScannerWriter::flush(self)?)
	}
}
