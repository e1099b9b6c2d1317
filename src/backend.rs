//! Types that can exchange (read/write) bytes with a connected instrument.
//!
//! The [`Backend`] trait represents all such types.

use std::io;
use std::time::Duration;

use serialport as sp;

use crate::error::TransportError;

#[cfg(any(test, feature = "mock"))]
use std::collections::{HashMap, VecDeque};

#[cfg(windows)]
use sp::COMPort as ExternSerial;
use sp::SerialPort;
#[cfg(unix)]
use sp::TTYPort as ExternSerial;

/// The placeholder name for a backend that doesn't have a name.
pub(crate) const UNKNOWN_BACKEND_NAME: &str = "<unknown backend>";

/// Types that allow reading and writing bytes with a connected instrument.
pub trait Backend: io::Read + io::Write + private::Sealed {
	/// Open the underlying link. Opening an open backend does nothing.
	fn open(&mut self) -> Result<(), TransportError>;

	/// Close the underlying link. Closing a closed backend does nothing.
	fn close(&mut self);

	/// Whether the link is currently open.
	fn is_open(&self) -> bool;

	/// Set the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error>;

	/// Get the read timeout.
	///
	/// If timeout is `None`, reads will block indefinitely.
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error>;

	/// Get the "name" of the backend.
	///
	/// This can be in any format, but should uniquely identify the backend
	/// instance.
	fn name(&self) -> Option<String>;
}

impl<C: Backend + ?Sized> Backend for Box<C> {
	fn open(&mut self) -> Result<(), TransportError> {
		(**self).open()
	}
	fn close(&mut self) {
		(**self).close();
	}
	fn is_open(&self) -> bool {
		(**self).is_open()
	}
	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		(**self).set_read_timeout(timeout)
	}
	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		(**self).read_timeout()
	}
	fn name(&self) -> Option<String> {
		(**self).name()
	}
}

/// A platform agnostic serial port backend.
///
/// Unlike the native `serialport` types, a `Serial` remembers where and how it
/// was opened, so it can be closed and re-opened when the instrument drops off
/// the bus.
//
// `serialport` exposes `COMPort` and `TTYPort` for windows and unix. The one
// for the current platform is picked at compile time, which keeps consumers
// free of both dynamic dispatch and an extra type parameter.
#[derive(Debug)]
pub struct Serial {
	/// The device path, e.g. `/dev/ttyACM0`.
	path: String,
	/// The configured baud rate.
	baud_rate: u32,
	/// The read timeout applied every time the port is opened.
	timeout: Option<Duration>,
	/// The native port while open.
	port: Option<ExternSerial>,
}

impl Serial {
	/// Create a closed serial backend for the specified path.
	pub(crate) fn new(path: &str, baud_rate: u32, timeout: Option<Duration>) -> Self {
		Serial {
			path: path.to_string(),
			baud_rate,
			timeout,
			port: None,
		}
	}

	/// The device path this backend opens.
	pub fn path(&self) -> &str {
		&self.path
	}

	fn port_mut(&mut self) -> io::Result<&mut ExternSerial> {
		self.port
			.as_mut()
			.ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "serial port is closed"))
	}
}

impl io::Read for Serial {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		self.port_mut()?.read(buf)
	}
}

impl io::Write for Serial {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.port_mut()?.write(buf)
	}

	fn flush(&mut self) -> io::Result<()> {
		self.port_mut()?.flush()
	}
}

impl Backend for Serial {
	fn open(&mut self) -> Result<(), TransportError> {
		if self.port.is_some() {
			return Ok(());
		}
		// Due to https://gitlab.com/susurrus/serialport-rs/-/issues/102, the
		// baud rate passed to new is ignored, so it is set again below.
		let port = sp::new(&self.path, self.baud_rate)
			.data_bits(sp::DataBits::Eight)
			.parity(sp::Parity::None)
			.flow_control(sp::FlowControl::None)
			.stop_bits(sp::StopBits::One)
			// The serialport API does not support infinite timeouts, so simply
			// set the timeout to the largest possible duration if `timeout` is
			// `None`, which is practically infinite.
			.timeout(self.timeout.unwrap_or(Duration::MAX))
			.baud_rate(self.baud_rate)
			.open_native()?;
		self.port = Some(port);
		Ok(())
	}

	fn close(&mut self) {
		// Dropping the native port releases the device.
		self.port = None;
	}

	fn is_open(&self) -> bool {
		self.port.is_some()
	}

	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		self.timeout = timeout;
		if let Some(port) = self.port.as_mut() {
			port.set_timeout(timeout.unwrap_or(Duration::MAX))?;
		}
		Ok(())
	}

	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(self.timeout)
	}

	fn name(&self) -> Option<String> {
		Some(self.path.clone())
	}
}

/// A scripted backend for use in testing.
///
/// It has the following features:
///   * Replies can be registered for exact byte strings. When those bytes are
///     written, the reply is queued for reading. Several replies registered
///     for the same bytes are handed out in order; the last one then repeats.
///   * It can be filled with data for reading directly.
///   * Every write is recorded.
///   * Specific errors can be inserted for calls to `read`, `write`, `flush`,
///     and `set_read_timeout`.
///   * Reading with nothing queued fails immediately with a timeout, the way a
///     real port does after its read timeout elapses.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug)]
pub struct Mock {
	/// The buffer data is read from
	buffer: io::Cursor<Vec<u8>>,
	/// Replies keyed by the exact bytes that trigger them.
	replies: HashMap<Vec<u8>, VecDeque<Vec<u8>>>,
	/// Every successful write, in order.
	written: Vec<Vec<u8>>,
	/// Whether the mock link is open.
	open: bool,
	/// How many times the mock has been opened.
	open_count: usize,
	/// The error to surface on the next read, if any. It is only surfaced once.
	read_error: Option<io::Error>,
	/// The error to surface on the next write, if any. It is only surfaced once.
	write_error: Option<io::Error>,
	/// The error to surface on the next flush, if any. It is only surfaced once.
	flush_error: Option<io::Error>,
	/// The error to surface on the next set_read_timeout, if any. It is only surfaced once.
	set_read_timeout_error: Option<io::Error>,
	/// The read timeout, which is ignored.
	ignored_read_timeout: Option<Duration>,
}

#[cfg(any(test, feature = "mock"))]
impl Mock {
	/// Create a new, already open, Mock backend.
	pub fn new() -> Self {
		Mock {
			buffer: io::Cursor::new(Vec::new()),
			replies: HashMap::new(),
			written: Vec::new(),
			open: true,
			open_count: 0,
			read_error: None,
			write_error: None,
			flush_error: None,
			set_read_timeout_error: None,
			ignored_read_timeout: Some(Duration::ZERO),
		}
	}
	/// Append data to the read buffer.
	///
	/// The data is not validated in any way.
	pub fn append_data<T: AsRef<[u8]>>(&mut self, bytes: T) {
		self.buffer.get_mut().extend_from_slice(bytes.as_ref());
	}
	/// Queue `response` to be readable after exactly `request` is written.
	pub fn reply<Q: AsRef<[u8]>, R: AsRef<[u8]>>(&mut self, request: Q, response: R) {
		self.replies
			.entry(request.as_ref().to_vec())
			.or_default()
			.push_back(response.as_ref().to_vec());
	}
	/// Clear the read buffer.
	pub fn clear_buffer(&mut self) {
		self.buffer.get_mut().clear();
		self.buffer.set_position(0);
	}
	/// Whether the mock has any data available or not
	#[allow(clippy::cast_possible_truncation)]
	pub fn is_empty(&self) -> bool {
		self.buffer.position() as usize >= self.buffer.get_ref().len()
	}
	/// Every write so far, in order.
	pub fn written(&self) -> &[Vec<u8>] {
		&self.written
	}
	/// Forget the recorded writes.
	pub fn clear_written(&mut self) {
		self.written.clear();
	}
	/// How many times [`open`](Backend::open) actually opened the mock.
	pub fn open_count(&self) -> usize {
		self.open_count
	}
	/// Set the error for the next `read`, if any.
	pub fn read_error(&mut self, err: Option<io::Error>) {
		self.read_error = err;
	}
	/// Set the error for the next `write`, if any.
	pub fn write_error(&mut self, err: Option<io::Error>) {
		self.write_error = err;
	}
	/// Set the error for the next `flush`, if any.
	pub fn flush_error(&mut self, err: Option<io::Error>) {
		self.flush_error = err;
	}
	/// Set the error for the next `set_read_timeout`, if any.
	pub fn set_read_timeout_error(&mut self, err: Option<io::Error>) {
		self.set_read_timeout_error = err;
	}

	#[allow(clippy::cast_possible_truncation)]
	fn queue_reply(&mut self, request: &[u8]) {
		let Some(queue) = self.replies.get_mut(request) else {
			return;
		};
		let response = if queue.len() > 1 {
			queue.pop_front()
		} else {
			queue.front().cloned()
		};
		if let Some(response) = response {
			// Drop what was already consumed so the cursor doesn't grow forever.
			let position = self.buffer.position() as usize;
			let remaining = self.buffer.get_ref()[position.min(self.buffer.get_ref().len())..].to_vec();
			self.buffer = io::Cursor::new(remaining);
			self.buffer.get_mut().extend_from_slice(&response);
		}
	}
}

#[cfg(any(test, feature = "mock"))]
impl Default for Mock {
	fn default() -> Self {
		Self::new()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Backend for Mock {
	fn open(&mut self) -> Result<(), TransportError> {
		if !self.open {
			self.open = true;
			self.open_count += 1;
		}
		Ok(())
	}

	fn close(&mut self) {
		self.open = false;
	}

	fn is_open(&self) -> bool {
		self.open
	}

	fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), io::Error> {
		if let Some(err) = self.set_read_timeout_error.take() {
			Err(err)
		} else {
			self.ignored_read_timeout = timeout;
			Ok(())
		}
	}

	fn read_timeout(&self) -> Result<Option<Duration>, io::Error> {
		Ok(self.ignored_read_timeout)
	}

	fn name(&self) -> Option<String> {
		Some(format!("<mock {self:p}>"))
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Read for Mock {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if let Some(err) = self.read_error.take() {
			Err(err)
		} else if self.is_empty() {
			// For a real device, having no data ready would result in a wait
			// and then eventual timeout error. However, as our data is in
			// memory that does not happen here. So simulate that behaviour by
			// returning a timeout error immediately.
			Err(io::Error::new(
				io::ErrorKind::TimedOut,
				"Simulated timeout error",
			))
		} else {
			self.buffer.read(buf)
		}
	}
}

#[cfg(any(test, feature = "mock"))]
impl io::Write for Mock {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		if let Some(err) = self.write_error.take() {
			Err(err)
		} else {
			self.written.push(buf.to_vec());
			self.queue_reply(buf);
			Ok(buf.len())
		}
	}

	fn flush(&mut self) -> io::Result<()> {
		if let Some(err) = self.flush_error.take() {
			Err(err)
		} else {
			Ok(())
		}
	}
}

mod private {
	pub trait Sealed {}

	impl Sealed for super::Serial {}
	#[cfg(any(test, feature = "mock"))]
	impl Sealed for super::Mock {}
	impl<C: super::Backend + ?Sized> Sealed for Box<C> {}
}

#[cfg(test)]
mod test {
	use super::*;
	use std::io::{Read, Write};

	#[test]
	fn mock_replies_in_order_then_repeats_the_last() {
		let mut mock = Mock::new();
		mock.reply("info\r", "first\r\n");
		mock.reply("info\r", "second\r\n");

		let mut buf = [0u8; 32];
		mock.write_all(b"info\r").unwrap();
		let n = mock.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"first\r\n");

		mock.write_all(b"info\r").unwrap();
		let n = mock.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"second\r\n");

		mock.write_all(b"info\r").unwrap();
		let n = mock.read(&mut buf).unwrap();
		assert_eq!(&buf[..n], b"second\r\n");

		assert_eq!(mock.written().len(), 3);
		let err = mock.read(&mut buf).unwrap_err();
		assert_eq!(err.kind(), io::ErrorKind::TimedOut);
	}

	#[test]
	fn mock_reopen_is_counted() {
		let mut mock = Mock::new();
		mock.open().unwrap();
		assert_eq!(mock.open_count(), 0);
		mock.close();
		assert!(!mock.is_open());
		mock.open().unwrap();
		assert!(mock.is_open());
		assert_eq!(mock.open_count(), 1);
	}
}
