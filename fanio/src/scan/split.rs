// SPDX-License-Identifier: Apache-2.0

//! Splitters: boundary functions dividing buffered bytes into tokens.
//!
//! The built-in splitters behave like the standard scanner split functions:
//! [`Lines`], [`Words`], [`Runes`] and [`Bytes`]. Closures are adapted with
//! [`split_fn`].

use std::str::from_utf8;
use crate::error::ErrorBox;

/// The replacement character, returned as the token for invalid UTF-8.
const REPLACEMENT: &[u8] = "\u{FFFD}".as_bytes();

/// The outcome of one split: how far to advance, and the token found, if any.
/// Advancing without a token skips bytes; neither advancing nor returning a
/// token requests more data.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Split<'a> {
	pub advance: usize,
	pub token: Option<&'a [u8]>,
}

impl<'a> Split<'a> {
	/// Requests more data.
	pub const fn more() -> Self {
		Self { advance: 0, token: None }
	}

	/// Skips `advance` bytes without producing a token.
	pub const fn skip(advance: usize) -> Self {
		Self { advance, token: None }
	}

	/// Produces `token`, then advances `advance` bytes.
	pub const fn token(advance: usize, token: &'a [u8]) -> Self {
		Self { advance, token: Some(token) }
	}
}

pub type SplitResult<'a> = Result<Split<'a>, ErrorBox>;

/// A boundary function. Given the bytes buffered so far, and whether no more
/// data will ever arrive, finds the next token.
pub trait Splitter {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a>;
}

impl<S: Splitter + ?Sized> Splitter for &mut S {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		(**self).split(data, at_eof)
	}
}

impl<S: Splitter + ?Sized> Splitter for Box<S> {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		(**self).split(data, at_eof)
	}
}

/// A [`Splitter`] calling a closure.
#[derive(Copy, Clone, Debug)]
pub struct SplitFn<F>(F);

/// Adapts a closure into a [`Splitter`].
///
/// ```
/// use fanio::scan::{split_fn, Split};
///
/// // Comma-separated fields.
/// let splitter = split_fn(|data, at_eof| {
///     Ok(match data.iter().position(|&b| b == b',') {
///         Some(i) => Split::token(i + 1, &data[..i]),
///         None if at_eof => Split::token(data.len(), data),
///         None => Split::more(),
///     })
/// });
/// # drop(splitter);
/// ```
pub fn split_fn<F>(f: F) -> SplitFn<F>
where F: for<'a> FnMut(&'a [u8], bool) -> SplitResult<'a> {
	SplitFn(f)
}

impl<F> Splitter for SplitFn<F>
where F: for<'a> FnMut(&'a [u8], bool) -> SplitResult<'a> {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		(self.0)(data, at_eof)
	}
}

/// Splits lines, stripping the line terminator. A line ends at `\n`, with an
/// optional preceding `\r`. The last line may be empty or unterminated.
#[derive(Copy, Clone, Debug, Default)]
pub struct Lines;

/// Splits one byte at a time.
#[derive(Copy, Clone, Debug, Default)]
pub struct Bytes;

/// Splits UTF-8 characters. Invalid or incomplete sequences are returned as
/// the replacement character, one byte at a time.
#[derive(Copy, Clone, Debug, Default)]
pub struct Runes;

/// Splits words separated by whitespace. Whitespace is never part of a token,
/// empty tokens are never returned.
#[derive(Copy, Clone, Debug, Default)]
pub struct Words(pub Whitespace);

/// The whitespace definition used by [`Words`].
#[derive(Copy, Clone, Debug, Default, Ord, PartialOrd, Eq, PartialEq)]
pub enum Whitespace {
	/// Matches ASCII whitespace as defined by [`u8::is_ascii_whitespace`], i.e.
	/// ` `, `\t`, `\n`, `\u{0C}`, and `\r`.
	Ascii,
	/// Matches Unicode whitespace as defined by [`char::is_whitespace`].
	#[default]
	Unicode
}

impl Words {
	/// Splits words on Unicode whitespace.
	pub const fn new() -> Self { Self(Whitespace::Unicode) }

	/// Splits words on ASCII whitespace.
	pub const fn ascii() -> Self { Self(Whitespace::Ascii) }
}

fn drop_cr(line: &[u8]) -> &[u8] {
	line.strip_suffix(b"\r").unwrap_or(line)
}

impl Splitter for Lines {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		if at_eof && data.is_empty() {
			return Ok(Split::more())
		}

		Ok(match data.iter().position(|&b| b == b'\n') {
			Some(i) => Split::token(i + 1, drop_cr(&data[..i])),
			None if at_eof => Split::token(data.len(), drop_cr(data)),
			None => Split::more()
		})
	}
}

impl Splitter for Bytes {
	fn split<'a>(&mut self, data: &'a [u8], _: bool) -> SplitResult<'a> {
		Ok(match data.first() {
			Some(_) => Split::token(1, &data[..1]),
			None => Split::more()
		})
	}
}

impl Splitter for Runes {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		let Some(&first) = data.first() else {
			return Ok(Split::more())
		};

		if first.is_ascii() {
			return Ok(Split::token(1, &data[..1]))
		}

		if let Some((_, width)) = decode_char(data) {
			return Ok(Split::token(width, &data[..width]))
		}

		if !at_eof && !is_full_char(data) {
			return Ok(Split::more())
		}

		Ok(Split::token(1, REPLACEMENT))
	}
}

impl Whitespace {
	fn matches(self, char: char) -> bool {
		match self {
			Self::Ascii => char.is_ascii_whitespace(),
			Self::Unicode => char.is_whitespace(),
		}
	}
}

impl Splitter for Words {
	fn split<'a>(&mut self, data: &'a [u8], at_eof: bool) -> SplitResult<'a> {
		let Self(whitespace) = *self;

		// Skip leading whitespace.
		let mut start = 0;
		while start < data.len() {
			let (char, width) = decode_lossy(&data[start..]);
			if !whitespace.matches(char) { break }
			start += width;
		}

		// Scan until whitespace, marking the end of the word.
		let mut i = start;
		while i < data.len() {
			let (char, width) = decode_lossy(&data[i..]);
			if whitespace.matches(char) {
				return Ok(Split::token(i + width, &data[start..i]))
			}
			i += width;
		}

		if at_eof && data.len() > start {
			return Ok(Split::token(data.len(), &data[start..]))
		}

		Ok(Split::skip(start))
	}
}

/// Returns the width of the UTF-8 character starting with `first`, or `0` if
/// the byte can't start a character.
fn char_width(first: u8) -> usize {
	match first {
		0x00..=0x7F => 1,
		0xC2..=0xDF => 2,
		0xE0..=0xEF => 3,
		0xF0..=0xF4 => 4,
		_ => 0
	}
}

/// Decodes the first character of `data`, returning it and its width, or `None`
/// if the sequence is invalid or incomplete.
fn decode_char(data: &[u8]) -> Option<(char, usize)> {
	let width = char_width(*data.first()?);
	if width == 0 || data.len() < width { return None }
	let char = from_utf8(&data[..width]).ok()?.chars().next()?;
	Some((char, width))
}

/// Decodes the first character of `data`, substituting the replacement
/// character for a single byte if the sequence is invalid or incomplete.
fn decode_lossy(data: &[u8]) -> (char, usize) {
	decode_char(data).unwrap_or((char::REPLACEMENT_CHARACTER, 1))
}

/// Returns `true` if `data` begins with a full character sequence, or with an
/// invalid sequence which more data can't complete.
fn is_full_char(data: &[u8]) -> bool {
	let width = char_width(data[0]);
	width == 0 ||
	data.len() >= width ||
	!data[1..].iter().all(|&b| (0x80..=0xBF).contains(&b))
}
