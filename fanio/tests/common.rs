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

#![allow(dead_code)]

use std::fmt::{Arguments, Debug};
use std::io;
use std::io::{Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use fanio::Stream;
use tracing_subscriber::EnvFilter;

macro_rules! qc_assert_eq {
	($left:expr,$right:expr) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, None)
			)
		}
	}};
    ($left:expr,$right:expr,$($arg:tt)+) => {{
		let left = $left;
		let right = $right;
		if left == right {
			TestResult::passed()
		} else {
			TestResult::error(
				common::format_qc_assert_error(&left, &right, Some(format_args!($($arg)+)))
			)
		}
	}};
}

pub fn format_qc_assert_error<L: Debug, R: Debug>(left: &L, right: &R, msg: Option<Arguments>) -> String {
	if let Some(msg) = msg {
		format!(
			"assertion failed `(left == right)`: {msg}\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	} else {
		format!(
			"assertion failed `(left == right)`:\n \
			left: `{left:?}`,\nright: `{right:?}`",
		)
	}
}

#[ctor::ctor]
fn init_tracing() {
	let _ = tracing_subscriber::fmt()
		.with_env_filter(EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

/// Sample text with multi-byte characters, blank lines, and indentation.
pub const GIBBONS: &str = "

	https://en.wikipedia.org/wiki/Gibbon

	Gibbons (/ˈɡɪbənz/[3]) are apes in the family Hylobatidae /ˌhaɪloʊbəˈtaɪdeɪ, -diː/[4].
	The family historically contained one genus, but now is split into four genera and 17
	species. Gibbons occur in tropical and subtropical rainforests from eastern Bangladesh
	and northeast India to southern China and Indonesia (including the islands of Sumatra,
	Borneo, and Java).

	Also called the smaller apes,[5] gibbons differ from great apes (chimpanzees, bonobos,
	gorillas, orangutans, and humans) in being smaller, exhibiting low sexual dimorphism
	and not making nests. In certain anatomical details they superficially more closely
	resemble monkeys than great apes do, but like all apes, gibbons are tailless. Gibbons
	also display pair-bonding, maintaining the same mate for life, unlike most of the great
	apes (this has been disputed by Palombit and others, who have found that gibbons might
	be socially monogamous, with occasional \"divorce\", but not sexually monogamous[6][7]).
	Gibbons are masters of their primary mode of locomotion, brachiation, swinging from
	branch to branch for distances of up to 15 m (50 ft), at speeds as high as 55 km/h
	(34 mph). They can also make leaps of up to 8 m (26 ft), and walk bipedally with their
	arms raised for balance. They are the fastest and most agile of all tree-dwelling,
	nonflying mammals.[8]

	Depending on species and sex, gibbons' fur coloration varies from dark to light
	brown shades, and any shade between black and white. Seeing a completely \"white\"
	gibbon is rare.

";

/// Generates `len` bytes of deterministic, non-repeating-looking data.
pub fn pattern(len: usize) -> Vec<u8> {
	let mut state = 0x2545_F491_4F6C_DD1Du64;
	(0..len).map(|_| {
		state ^= state << 13;
		state ^= state >> 7;
		state ^= state << 17;
		state as u8
	}).collect()
}

/// A sink recording writes into a buffer shared with the test.
#[derive(Clone, Debug, Default)]
pub struct SharedBuf {
	data: Arc<Mutex<Vec<u8>>>,
	closes: Arc<Mutex<usize>>,
}

impl SharedBuf {
	pub fn contents(&self) -> Vec<u8> {
		self.data.lock().unwrap().clone()
	}

	pub fn close_count(&self) -> usize {
		*self.closes.lock().unwrap()
	}
}

impl Write for SharedBuf {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.data.lock().unwrap().extend_from_slice(buf);
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Stream for SharedBuf {
	fn close(&mut self) -> io::Result<()> {
		*self.closes.lock().unwrap() += 1;
		Ok(())
	}
}

/// A sink failing every write.
pub struct FailingSink(pub io::ErrorKind);

impl Write for FailingSink {
	fn write(&mut self, _: &[u8]) -> io::Result<usize> {
		Err(self.0.into())
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Stream for FailingSink { }

/// A sink accepting all but the last byte of every write.
pub struct ShortSink;

impl Write for ShortSink {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		Ok(buf.len().saturating_sub(1))
	}

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Stream for ShortSink { }

/// A sink failing to close.
pub struct UnclosableSink;

impl Write for UnclosableSink {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> { Ok(buf.len()) }

	fn flush(&mut self) -> io::Result<()> { Ok(()) }
}

impl Stream for UnclosableSink {
	fn close(&mut self) -> io::Result<()> {
		Err(io::Error::new(io::ErrorKind::Other, "close failed"))
	}
}

/// A source sleeping before every read.
pub struct SleepyReader<R> {
	pub inner: R,
	pub delay: Duration,
}

impl<R: Read> Read for SleepyReader<R> {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		thread::sleep(self.delay);
		self.inner.read(buf)
	}
}

/// A source failing every read.
pub struct FailingReader(pub io::ErrorKind);

impl Read for FailingReader {
	fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
		Err(io::Error::new(self.0, "source failed"))
	}
}

/// A source returning at most `max` bytes per read, then failing with `error`
/// if set, instead of ending.
pub struct ChunkedReader {
	pub data: io::Cursor<Vec<u8>>,
	pub max: usize,
	pub error: Option<io::ErrorKind>,
}

impl ChunkedReader {
	pub fn new(data: Vec<u8>, max: usize) -> Self {
		Self { data: io::Cursor::new(data), max: max.max(1), error: None }
	}

	pub fn failing(data: Vec<u8>, max: usize, error: io::ErrorKind) -> Self {
		Self { error: Some(error), ..Self::new(data, max) }
	}
}

impl Read for ChunkedReader {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		let len = buf.len().min(self.max);
		match self.data.read(&mut buf[..len])? {
			0 if !buf.is_empty() => match self.error {
				Some(kind) => Err(io::Error::new(kind, "source failed")),
				None => Ok(0)
			},
			n => Ok(n)
		}
	}
}
