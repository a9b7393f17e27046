// SPDX-License-Identifier: Apache-2.0

//! Reusable fixed-size segment buffers.
//!
//! A pool holds buffers of exactly one size. Consumed segments are collected
//! back into their pool, and claimed again by the next producer, so sustained
//! throughput doesn't reallocate. The pool keeps up to a *retention limit* of
//! buffers; the rest are dropped when collected.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use once_cell::sync::Lazy;

/// The number of bytes a pool retains by default, divided into segments.
const RETAINED_BYTES: usize = 16 << 20;

/// A thread-safe pool of segment buffers of one size. Clones share the same
/// buffers.
#[derive(Clone, Debug)]
pub struct SegmentPool(Arc<Inner>);

#[derive(Debug)]
struct Inner {
	size: usize,
	limit: usize,
	segments: Mutex<Vec<Vec<u8>>>,
}

impl SegmentPool {
	/// Creates a pool of `size` byte segments, retaining up to 16MiB worth of
	/// segments, and at least one.
	pub fn new(size: usize) -> Self {
		let size = size.max(1);
		Self::with_limit(size, (RETAINED_BYTES / size).max(1))
	}

	/// Creates a pool of `size` byte segments, retaining at most `limit` of them.
	pub fn with_limit(size: usize, limit: usize) -> Self {
		Self(Arc::new(Inner {
			size: size.max(1),
			limit,
			segments: Mutex::default(),
		}))
	}

	/// Returns the size of segments in this pool.
	pub fn segment_size(&self) -> usize { self.0.size }

	/// Returns the maximum number of segments retained.
	pub fn limit(&self) -> usize { self.0.limit }

	/// Returns the number of segments currently retained.
	pub fn len(&self) -> usize { self.lock().len() }

	/// Returns `true` if no segments are retained.
	pub fn is_empty(&self) -> bool { self.len() == 0 }

	/// Claims a segment of exactly [`segment_size`](Self::segment_size) bytes,
	/// reusing a collected one if available. The contents are unspecified.
	pub fn claim(&self) -> Vec<u8> {
		let size = self.0.size;
		match self.lock().pop() {
			Some(mut segment) => {
				segment.resize(size, 0);
				segment
			}
			None => vec![0; size]
		}
	}

	/// Collects a segment back into the pool. Segments not allocated for this
	/// pool's size, or collected past the retention limit, are dropped.
	pub fn collect(&self, mut segment: Vec<u8>) {
		let size = self.0.size;
		if !(size..=size.saturating_mul(2)).contains(&segment.capacity()) {
			return
		}

		let mut segments = self.lock();
		if segments.len() < self.0.limit {
			segment.clear();
			segments.push(segment);
		}
	}

	/// Drops all retained segments.
	pub fn shed(&self) {
		self.lock().clear()
	}

	fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
		self.0
			.segments
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
	}
}

static POOLS: Lazy<Mutex<HashMap<usize, SegmentPool>>> = Lazy::new(Mutex::default);

/// Returns the process-wide pool for `size` byte segments, creating it on first
/// use.
pub fn shared_pool(size: usize) -> SegmentPool {
	let size = size.max(1);
	POOLS.lock()
		 .unwrap_or_else(PoisonError::into_inner)
		 .entry(size)
		 .or_insert_with(|| SegmentPool::new(size))
		 .clone()
}
