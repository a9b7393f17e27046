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

use std::{fmt, io, result};
use std::error::Error as StdError;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use amplify_derive::Display;

/// A boxed error, returned by user-supplied splitters and token callbacks.
pub type ErrorBox = Box<dyn StdError + Send + Sync>;

/// A shared error source. Sources are reference-counted so that one failure can
/// be handed to every consumer of a broadcast.
pub type ErrorSource = Arc<dyn StdError + Send + Sync>;

pub type Result<T = ()> = result::Result<T, Error>;

#[derive(Copy, Clone, Debug, Default, Display, Eq, PartialEq)]
pub enum OperationKind {
	#[default]
	#[display("unknown operation")]
	Unknown,
	#[display("start")]
	Start,
	#[display("read")]
	Read,
	#[display("write")]
	Write,
	#[display("flush")]
	Flush,
	#[display("close")]
	Close,
	#[display("broadcast")]
	Broadcast,
	#[display("split")]
	Split,
	#[display("token callback")]
	Token,
}

#[derive(Copy, Clone, Debug, Display, Eq, PartialEq)]
pub enum ErrorKind {
	/// The adapter was permanently shut down.
	#[display("closed")]
	Closed,
	/// The operation was cancelled by an abort.
	#[display("aborted")]
	Aborted,
	/// No token boundary was found within the maximum buffer size.
	#[display("buffer overflow")]
	Overflow,
	/// A sink accepted fewer bytes than it was given.
	#[display("short write")]
	ShortWrite,
	/// A wrapped source or sink failed; the original error is the source.
	#[display("IO error")]
	Io,
	/// A splitter or token callback returned an error.
	#[display("callback error")]
	Callback,
	/// A splitter advanced past the end of its input.
	#[display("split advanced past the end of input")]
	AdvanceTooFar,
	/// A splitter produced too many empty tokens without advancing.
	#[display("split made no progress")]
	NoProgress,
	/// A background task was already started.
	#[display("already started")]
	AlreadyStarted,
}

#[derive(Clone, Debug)]
pub struct Error {
	op: OperationKind,
	kind: ErrorKind,
	source: Option<ErrorSource>,
}

/// The number of bytes a sink accepted, when less than it was given.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("sink accepted {written} of {len} bytes")]
pub struct ShortWrite {
	pub written: usize,
	pub len: usize,
}

/// The size of a pending token which outgrew the scan buffer limit.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("pending {len} bytes exceed the {limit} byte limit")]
pub struct Overflow {
	pub len: usize,
	pub limit: usize,
}

/// A sink worker thread panicked before reporting its result.
#[derive(Copy, Clone, Debug, thiserror::Error)]
#[error("sink worker {index} panicked")]
pub struct WorkerPanic {
	pub index: usize,
}

impl Display for Error {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		let Self { op, kind, source } = self;
		if let Some(source) = source {
			write!(f, "{op} failed; {kind} ({source})")
		} else {
			write!(f, "{op} failed; {kind}")
		}
	}
}

impl StdError for Error {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.source
			.as_deref()
			.map(|source| source as &(dyn StdError + 'static))
	}
}

impl Error {
	pub(crate) fn new(
		op: OperationKind,
		kind: ErrorKind,
		source: Option<ErrorSource>
	) -> Self {
		Self { op, kind, source }
	}

	/// Creates a new "closed" error.
	pub fn closed(op: OperationKind) -> Self {
		Self::new(op, ErrorKind::Closed, None)
	}

	/// Creates a new "aborted" error.
	pub fn aborted(op: OperationKind) -> Self {
		Self::new(op, ErrorKind::Aborted, None)
	}

	/// Creates a new IO error wrapping a source or sink failure.
	pub fn io(op: OperationKind, error: io::Error) -> Self {
		Self::new(op, ErrorKind::Io, Some(Arc::new(error)))
	}

	/// Creates a new error wrapping a failure returned by a callback.
	pub fn callback(op: OperationKind, error: ErrorBox) -> Self {
		Self::new(op, ErrorKind::Callback, Some(error.into()))
	}

	pub(crate) fn short_write(written: usize, len: usize) -> Self {
		Self::new(
			OperationKind::Write,
			ErrorKind::ShortWrite,
			Some(Arc::new(ShortWrite { written, len }))
		)
	}

	pub(crate) fn overflow(len: usize, limit: usize) -> Self {
		Self::new(
			OperationKind::Write,
			ErrorKind::Overflow,
			Some(Arc::new(Overflow { len, limit }))
		)
	}

	/// Returns the operation kind.
	pub fn operation(&self) -> OperationKind { self.op }

	/// Sets the operation kind.
	pub fn with_operation(mut self, op: OperationKind) -> Self {
		self.op = op;
		self
	}

	/// Returns the error kind.
	pub fn kind(&self) -> ErrorKind { self.kind }

	/// Returns `true` if the error is a [`Closed`](ErrorKind::Closed) error.
	pub fn is_closed(&self) -> bool { self.kind == ErrorKind::Closed }

	/// Returns `true` if the error is an [`Aborted`](ErrorKind::Aborted) error.
	pub fn is_aborted(&self) -> bool { self.kind == ErrorKind::Aborted }

	/// Returns the source downcast into an IO Error, if possible.
	pub fn io_source(&self) -> Option<&io::Error> {
		self.downcast_source()
	}

	/// Returns the source downcast into `E`, if possible.
	pub fn downcast_source<E: StdError + 'static>(&self) -> Option<&E> {
		self.source.as_deref()?.downcast_ref()
	}

	/// Recovers an error previously converted into an [`io::Error`].
	pub fn from_io(error: &io::Error) -> Option<&Self> {
		error.get_ref()?.downcast_ref()
	}

	fn io_kind(&self) -> io::ErrorKind {
		use io::ErrorKind as Io;
		match self.kind {
			ErrorKind::Closed => Io::BrokenPipe,
			ErrorKind::Aborted => Io::ConnectionAborted,
			ErrorKind::ShortWrite => Io::WriteZero,
			ErrorKind::Overflow |
			ErrorKind::AdvanceTooFar |
			ErrorKind::NoProgress => Io::InvalidData,
			ErrorKind::Io => self.io_source().map_or(Io::Other, io::Error::kind),
			ErrorKind::Callback |
			ErrorKind::AlreadyStarted => Io::Other,
		}
	}
}

impl From<Error> for io::Error {
	fn from(value: Error) -> Self {
		io::Error::new(value.io_kind(), value)
	}
}
