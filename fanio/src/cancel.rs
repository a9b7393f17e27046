// SPDX-License-Identifier: Apache-2.0

//! One-shot cancellation, observable from any number of blocked threads.
//!
//! A token is a channel that never carries a message. Cancelling drops its only
//! sender, disconnecting the channel; every receiver blocked on it (directly or
//! through a [`flume::Selector`]) wakes, and every later receive returns
//! immediately. Waiters can't miss the wakeup, since disconnection is a state
//! rather than an event.

use std::sync::{Arc, Mutex, PoisonError};
use flume::{Receiver, Sender};

#[derive(Clone, Debug)]
pub(crate) struct CancelToken(Arc<Inner>);

#[derive(Debug)]
struct Inner {
	trigger: Mutex<Option<Sender<()>>>,
	signal: Receiver<()>,
}

impl Default for CancelToken {
	fn default() -> Self { Self::new() }
}

impl CancelToken {
	pub fn new() -> Self {
		let (trigger, signal) = flume::bounded(0);
		Self(Arc::new(Inner {
			trigger: Mutex::new(Some(trigger)),
			signal,
		}))
	}

	/// Raises the signal. Raising it again has no effect.
	pub fn cancel(&self) {
		self.0
			.trigger
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
	}

	pub fn is_cancelled(&self) -> bool {
		self.0.signal.is_disconnected()
	}

	/// The receiver to select on. Receiving from it only ever returns once the
	/// token is cancelled, with a disconnection error.
	pub fn signal(&self) -> &Receiver<()> { &self.0.signal }

	/// Blocks until the token is cancelled.
	#[cfg(test)]
	pub fn wait(&self) {
		let _ = self.0.signal.recv();
	}
}

/// A handle that aborts an adapter from any thread. Aborting is permanent and
/// idempotent.
#[derive(Clone, Debug)]
pub struct AbortHandle(CancelToken);

impl AbortHandle {
	pub(crate) fn new(token: CancelToken) -> Self { Self(token) }

	/// Raises the abort signal.
	pub fn abort(&self) { self.0.cancel() }

	/// Returns `true` if the abort signal was raised.
	pub fn is_aborted(&self) -> bool { self.0.is_cancelled() }
}

#[cfg(test)]
mod test {
	use std::thread;
	use std::time::Duration;
	use super::CancelToken;

	#[test]
	fn cancel_is_idempotent() {
		let token = CancelToken::new();
		assert!(!token.is_cancelled());
		token.cancel();
		token.cancel();
		assert!(token.is_cancelled());
		assert!(token.signal().recv().is_err());
	}

	#[test]
	fn wakes_every_waiter() {
		let token = CancelToken::new();
		let waiters: Vec<_> = (0..4).map(|_| {
			let token = token.clone();
			thread::spawn(move || token.wait())
		}).collect();

		thread::sleep(Duration::from_millis(20));
		token.cancel();

		for waiter in waiters {
			waiter.join().unwrap();
		}
	}
}
