// SPDX-License-Identifier: Apache-2.0

use crate::{DEFAULT_BUFFER_SIZE, DEFAULT_PREFETCH_SIZE, DEFAULT_READ_QUEUE_LEN, DEFAULT_WRITE_QUEUE_LEN};

/// Options for tuning [`AsyncReader`](crate::AsyncReader)'s prefetching.
///
/// # Segment size
///
/// The number of bytes read from the source per background read. The background
/// thread fills a whole segment before handing it over, so larger segments mean
/// fewer handoffs but more latency before the first byte arrives. Defaults to
/// `2MiB`. A size of zero is treated as one byte.
///
/// # Queue length
///
/// The number of filled segments the background thread may buffer ahead of the
/// reader. Once the queue is full, prefetching blocks until the reader catches
/// up. Defaults to `32`. A length of zero hands each segment over directly.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct AsyncReaderOptions {
	pub segment_size: usize,
	pub queue_len: usize,
}

impl Default for AsyncReaderOptions {
	fn default() -> Self { Self::new() }
}

impl AsyncReaderOptions {
	/// Creates a new set of prefetch options.
	pub const fn new() -> Self {
		Self {
			segment_size: DEFAULT_PREFETCH_SIZE,
			queue_len: DEFAULT_READ_QUEUE_LEN,
		}
	}

	/// Returns the segment size, at least one byte.
	#[inline]
	pub const fn segment_size(&self) -> usize {
		if self.segment_size == 0 { 1 } else { self.segment_size }
	}

	/// Returns the queue length.
	#[inline]
	pub const fn queue_len(&self) -> usize { self.queue_len }

	/// Sets the segment size.
	#[inline]
	pub fn set_segment_size(&mut self, value: usize) {
		self.segment_size = value;
	}

	/// Sets the queue length.
	#[inline]
	pub fn set_queue_len(&mut self, value: usize) {
		self.queue_len = value;
	}

	/// Sets the segment size.
	#[inline]
	pub const fn with_segment_size(mut self, value: usize) -> Self {
		self.segment_size = value;
		self
	}

	/// Sets the queue length.
	#[inline]
	pub const fn with_queue_len(mut self, value: usize) -> Self {
		self.queue_len = value;
		self
	}
}

/// Options for tuning [`Broadcaster`](crate::Broadcaster).
///
/// # Segment size
///
/// The number of bytes read from the source before being broadcast, similar to
/// the capacity of a [`BufReader`](std::io::BufReader). Defaults to `8KiB`. A
/// size of zero is treated as one byte.
///
/// # Queue length
///
/// The number of segments buffered per reader. This allows readers to consume
/// at their own pace without lock-step synchronization; the broadcast only
/// blocks on a reader whose queue is full. Defaults to `32`.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct BroadcastOptions {
	pub segment_size: usize,
	pub queue_len: usize,
}

impl Default for BroadcastOptions {
	fn default() -> Self { Self::new() }
}

impl BroadcastOptions {
	/// Creates a new set of broadcast options.
	pub const fn new() -> Self {
		Self {
			segment_size: DEFAULT_BUFFER_SIZE,
			queue_len: DEFAULT_READ_QUEUE_LEN,
		}
	}

	/// Returns the segment size, at least one byte.
	#[inline]
	pub const fn segment_size(&self) -> usize {
		if self.segment_size == 0 { 1 } else { self.segment_size }
	}

	/// Returns the per-reader queue length.
	#[inline]
	pub const fn queue_len(&self) -> usize { self.queue_len }

	/// Sets the segment size.
	#[inline]
	pub fn set_segment_size(&mut self, value: usize) {
		self.segment_size = value;
	}

	/// Sets the per-reader queue length.
	#[inline]
	pub fn set_queue_len(&mut self, value: usize) {
		self.queue_len = value;
	}

	/// Sets the segment size.
	#[inline]
	pub const fn with_segment_size(mut self, value: usize) -> Self {
		self.segment_size = value;
		self
	}

	/// Sets the per-reader queue length.
	#[inline]
	pub const fn with_queue_len(mut self, value: usize) -> Self {
		self.queue_len = value;
		self
	}
}

/// Options for tuning [`MultiWriter`](crate::MultiWriter).
///
/// The queue length is the number of writes buffered per sink. Defaults to `32`.
/// With a length of zero, each write is handed to every sink directly, so a sink
/// failure surfaces on the next write.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub struct MultiWriterOptions {
	pub queue_len: usize,
}

impl Default for MultiWriterOptions {
	fn default() -> Self { Self::new() }
}

impl MultiWriterOptions {
	pub const fn new() -> Self {
		Self { queue_len: DEFAULT_WRITE_QUEUE_LEN }
	}

	#[inline]
	pub const fn queue_len(&self) -> usize { self.queue_len }

	#[inline]
	pub fn set_queue_len(&mut self, value: usize) {
		self.queue_len = value;
	}

	#[inline]
	pub const fn with_queue_len(mut self, value: usize) -> Self {
		self.queue_len = value;
		self
	}
}
