// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::io::Read;
use std::thread;
use std::time::Duration;
use pretty_assertions::assert_eq;
use quickcheck::TestResult;
use quickcheck_macros::quickcheck;
use fanio::{BroadcastOptions, Broadcaster, BroadcasterReader, Error, ErrorKind};
use common::{ChunkedReader, FailingReader, GIBBONS, pattern, SleepyReader};

#[macro_use]
mod common;

/// Reads `reader` to its end on a new thread.
fn consume(mut reader: BroadcasterReader) -> thread::JoinHandle<io::Result<Vec<u8>>> {
	thread::spawn(move || {
		let mut data = Vec::new();
		reader.read_to_end(&mut data).map(|_| data)
	})
}

#[quickcheck]
fn every_reader_gets_everything(readers: u8, len: u16, segment_size: u16, queue_len: u8) -> TestResult {
	let data = pattern(len as usize % 8192);
	let options = BroadcastOptions::default()
		.with_segment_size(segment_size as usize % 1024)
		.with_queue_len(queue_len as usize % 8);
	let mut broadcaster = Broadcaster::with_options(ChunkedReader::new(data.clone(), 100), options);
	let handles: Vec<_> = (0..readers % 8).map(|_| consume(broadcaster.new_reader())).collect();

	broadcaster.broadcast().unwrap();
	for handle in handles {
		let read = handle.join().unwrap().unwrap();
		if read != data {
			return qc_assert_eq!(read, data)
		}
	}
	TestResult::passed()
}

#[test]
fn large_broadcast() {
	let data = pattern((2 << 20) + 21);
	let mut broadcaster = Broadcaster::new(io::Cursor::new(data.clone()));
	let handles: Vec<_> = (0..3).map(|_| consume(broadcaster.new_reader())).collect();

	broadcaster.broadcast().unwrap();
	for handle in handles {
		assert!(handle.join().unwrap().unwrap() == data, "reader output differs");
	}
}

#[test]
fn abort() {
	let source = SleepyReader {
		inner: GIBBONS.as_bytes(),
		delay: Duration::from_millis(100),
	};
	let mut broadcaster = Broadcaster::new(source);
	let handles: Vec<_> = (0..3).map(|_| {
		let mut reader = broadcaster.new_reader();
		thread::spawn(move || {
			let mut data = Vec::new();
			let error = reader.read_to_end(&mut data).unwrap_err();
			let error = Error::from_io(&error).map(Error::kind);
			let again = reader.read(&mut []).unwrap_err().kind();
			(data, error, again)
		})
	}).collect();

	// Aborting before broadcasting is allowed.
	broadcaster.abort();
	let error = broadcaster.broadcast().unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Aborted);

	for handle in handles {
		let (data, error, again) = handle.join().unwrap();
		assert!(data.is_empty());
		assert_eq!(error, Some(ErrorKind::Aborted));
		assert_eq!(again, ErrorKind::Aborted);
	}
}

#[test]
fn abort_during_broadcast() {
	let options = BroadcastOptions::default().with_segment_size(8);
	let mut broadcaster = Broadcaster::with_options(io::repeat(1), options);
	let handle = broadcaster.abort_handle();
	let mut reader = broadcaster.new_reader();

	let aborter = thread::spawn(move || {
		let mut buf = [0; 8];
		reader.read_exact(&mut buf).unwrap();
		handle.abort();
		assert!(handle.is_aborted());
		reader.read(&mut buf).unwrap_err().kind()
	});

	assert_eq!(broadcaster.broadcast().unwrap_err().kind(), ErrorKind::Aborted);
	assert_eq!(aborter.join().unwrap(), ErrorKind::Aborted);
}

#[test]
fn abort_discards_queued_data() {
	let data = pattern(100);
	let options = BroadcastOptions::default()
		.with_segment_size(10)
		.with_queue_len(16);
	let mut broadcaster = Broadcaster::with_options(&data[..], options);
	let mut reader = broadcaster.new_reader();
	broadcaster.broadcast().unwrap();

	// Part of the first segment is left over in the reader, the rest is queued.
	let mut buf = [0; 4];
	assert_eq!(reader.read(&mut buf).unwrap(), 4);
	assert_eq!(&buf, &data[..4]);

	broadcaster.abort();
	let mut buf = [0; 10];
	assert_eq!(reader.read(&mut buf).unwrap_err().kind(), ErrorKind::Aborted);
	assert_eq!(buf, [0; 10], "no bytes are delivered after an abort");
	// Nothing is left to block on.
	assert_eq!(reader.read(&mut buf).unwrap_err().kind(), ErrorKind::Aborted);
	assert_eq!(reader.read(&mut []).unwrap_err().kind(), ErrorKind::Aborted);
}

#[test]
fn dropped_broadcaster_closes_readers() {
	let mut broadcaster = Broadcaster::new(io::empty());
	let mut reader = broadcaster.new_reader();
	let mut io_reader = broadcaster.new_reader();
	drop(broadcaster);

	assert_eq!(reader.read(&mut [0; 8]).unwrap_err().kind(), ErrorKind::Closed);
	assert_eq!(reader.read(&mut [0; 8]).unwrap_err().kind(), ErrorKind::Closed);

	// Not mistaken for the end of the stream.
	let error = io_reader.read_to_end(&mut Vec::new()).unwrap_err();
	assert_eq!(Error::from_io(&error).map(Error::kind), Some(ErrorKind::Closed));
}

#[test]
fn close_after_eof() {
	let mut broadcaster = Broadcaster::new(io::Cursor::new(vec![0; 32]));
	let mut reader = broadcaster.new_reader();
	let broadcast = thread::spawn(move || broadcaster.broadcast());

	let mut buf = [0; 32];
	assert_eq!(reader.read(&mut buf).unwrap(), 32);
	assert_eq!(reader.read(&mut buf).unwrap(), 0);
	reader.close().unwrap();
	assert!(reader.is_closed());
	assert_eq!(reader.read(&mut buf).unwrap_err().kind(), ErrorKind::Closed);
	broadcast.join().unwrap().unwrap();
}

#[test]
fn close_during_broadcast() {
	let source = SleepyReader {
		inner: GIBBONS.as_bytes(),
		delay: Duration::from_millis(1),
	};
	let options = BroadcastOptions::default()
		.with_segment_size(8)
		.with_queue_len(1);
	let mut broadcaster = Broadcaster::with_options(source, options);
	let mut closing = broadcaster.new_reader();
	let staying = consume(broadcaster.new_reader());

	let closer = thread::spawn(move || {
		let mut buf = [0; 2];
		closing.read(&mut buf).unwrap();
		closing.close().unwrap();

		let mut prefix = buf.to_vec();
		let error = loop {
			match closing.read(&mut buf) {
				Ok(n) => prefix.extend_from_slice(&buf[..n]),
				Err(error) => break error
			}
		};
		(prefix, error.kind())
	});

	// A closed reader with a full queue mustn't stall the broadcast.
	broadcaster.broadcast().unwrap();
	assert_eq!(broadcaster.reader_count(), 0);

	let (prefix, error) = closer.join().unwrap();
	assert_eq!(error, ErrorKind::Closed);
	assert!(GIBBONS.as_bytes().starts_with(&prefix));
	assert_eq!(staying.join().unwrap().unwrap(), GIBBONS.as_bytes());
}

#[test]
fn source_failure() {
	let mut broadcaster = Broadcaster::new(FailingReader(io::ErrorKind::ConnectionReset));
	let mut reader = broadcaster.new_reader();
	let broadcast = thread::spawn(move || broadcaster.broadcast());

	let mut buf = [0; 2];
	let error = reader.read(&mut buf).unwrap_err();
	assert_eq!(error.kind(), ErrorKind::Io);
	assert_eq!(error.io_source().map(io::Error::kind), Some(io::ErrorKind::ConnectionReset));
	// Closing doesn't surface the failure.
	reader.close().unwrap();

	let error = broadcast.join().unwrap().unwrap_err();
	assert_eq!(error.io_source().map(io::Error::kind), Some(io::ErrorKind::ConnectionReset));
}

#[test]
fn failure_after_data() {
	let data = pattern(100);
	let source = ChunkedReader::failing(data.clone(), 30, io::ErrorKind::UnexpectedEof);
	let options = BroadcastOptions::default().with_segment_size(64);
	let mut broadcaster = Broadcaster::with_options(source, options);
	let handle = consume(broadcaster.new_reader());

	assert!(broadcaster.broadcast().is_err());
	let error = handle.join().unwrap().unwrap_err();
	assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
	assert_eq!(Error::from_io(&error).map(Error::kind), Some(ErrorKind::Io));
}
