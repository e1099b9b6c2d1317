//! Exclusive access to the link with an instrument.
//!
//! A [`Transport`] owns a [`Backend`] behind a mutex. The only way to talk to
//! the instrument is through the [`Exchange`] returned by [`Transport::lock`],
//! so the bytes of two logical commands can never interleave, regardless of
//! how many threads share the transport.
//!
//! ```rust
//! # use nanovna::transport::OpenSerialOptions;
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = OpenSerialOptions::new()
//!     .timeout(Some(Duration::from_millis(100)))
//!     .open("/dev/ttyACM0")?;
//! let mut exchange = transport.lock()?;
//! exchange.drain()?;
//! exchange.write(b"info\r")?;
//! let banner = exchange.read_line()?;
//! # Ok(())
//! # }
//! ```

#[cfg(any(test, feature = "mock"))]
use crate::backend::Mock;
use crate::{
	backend::{Backend, Serial, UNKNOWN_BACKEND_NAME},
	error::{LockPoisonedError, PortClosedError, TransportError},
	timeout_guard::TimeoutGuard,
};
use std::{
	io,
	sync::{Mutex, MutexGuard},
	thread,
	time::Duration,
};

/// The read timeout used while draining stale input.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(50);
/// The size of each read performed while draining.
const DRAIN_CHUNK: usize = 128;
/// The maximum number of reads performed by a single drain.
const DRAIN_MAX_READS: usize = 512;

/// Options for configuring and opening a serial port.
///
/// ## Example
///
/// ```rust
/// # use nanovna::transport::OpenSerialOptions;
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = OpenSerialOptions::new()
///     .baud_rate(115_200)
///     .timeout(Some(Duration::from_millis(50)))
///     .open("/dev/ttyACM0")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct OpenSerialOptions {
	/// The custom baud rate
	baud_rate: u32,
	/// The custom timeout
	timeout: Option<Duration>,
}

impl OpenSerialOptions {
	/// The default baud rate of the instruments' USB CDC link.
	const DEFAULT_BAUD_RATE: u32 = 115_200;

	/// Create a blank set of options ready for configuration.
	///
	/// The default baud rate and read timeout are 115,200 and 50 ms, respectively.
	///
	/// Equivalent to [`default`](OpenSerialOptions::default).
	pub fn new() -> Self {
		OpenSerialOptions {
			baud_rate: OpenSerialOptions::DEFAULT_BAUD_RATE,
			timeout: Some(DRAIN_TIMEOUT),
		}
	}

	/// Set a custom baud rate.
	pub fn baud_rate(&mut self, baud_rate: u32) -> &mut Self {
		self.baud_rate = baud_rate;
		self
	}

	/// Set a custom read timeout.
	///
	/// If duration is `None`, reads will block indefinitely.
	pub fn timeout(&mut self, duration: Option<Duration>) -> &mut Self {
		self.timeout = duration;
		self
	}

	/// Open the port at the specified path with the custom options.
	pub fn open(&self, path: &str) -> Result<Transport<Serial>, TransportError> {
		let transport = Transport::from_backend(Serial::new(path, self.baud_rate, self.timeout));
		transport.open()?;
		Ok(transport)
	}

	/// Open the port at the specified path with the custom options.
	///
	/// The type of the underlying backend is erased via dynamic dispatch,
	/// which does have runtime overhead. [`open`](OpenSerialOptions::open)
	/// should generally be used instead, except when the type of the underlying
	/// backend may not be known at compile time.
	pub fn open_dyn(&self, path: &str) -> Result<Transport<Box<dyn Backend + Send>>, TransportError> {
		let backend: Box<dyn Backend + Send> = Box::new(Serial::new(path, self.baud_rate, self.timeout));
		let transport = Transport::from_backend(backend);
		transport.open()?;
		Ok(transport)
	}
}

impl Default for OpenSerialOptions {
	fn default() -> Self {
		OpenSerialOptions::new()
	}
}

/// The state behind the transport's mutex.
#[derive(Debug)]
struct Link<B> {
	/// The underlying backend
	backend: B,
	/// If populated, the error that has "poisoned" the link. This error MUST be
	/// returned to the user the next time the link is locked.
	///
	/// A link becomes "poisoned" when an error occurs that leaves it in an
	/// unknown state, e.g. a [`TimeoutGuard`] failing to restore the
	/// original read timeout.
	poison: Option<io::Error>,
}

/// A serial link shared by every command sent to one instrument.
#[derive(Debug)]
pub struct Transport<B> {
	link: Mutex<Link<B>>,
	name: String,
}

impl Transport<Serial> {
	/// Open a serial port with the default options.
	///
	/// Alternatively, use [`OpenSerialOptions`] to customize how the port is opened.
	pub fn open_serial(path: &str) -> Result<Transport<Serial>, TransportError> {
		OpenSerialOptions::new().open(path)
	}

	/// Get an [`OpenSerialOptions`] to customize how a serial port is opened.
	pub fn open_serial_options() -> OpenSerialOptions {
		OpenSerialOptions::default()
	}
}

#[cfg(any(test, feature = "mock"))]
impl Transport<Mock> {
	/// Create a transport over a [`Mock`] backend.
	pub fn open_mock(mock: Mock) -> Self {
		Transport::from_backend(mock)
	}
}

impl<B: Backend> Transport<B> {
	/// Wrap an existing backend. The backend is used as is: it is not opened.
	pub fn from_backend(backend: B) -> Self {
		let name = backend
			.name()
			.unwrap_or_else(|| UNKNOWN_BACKEND_NAME.to_string());
		Transport {
			link: Mutex::new(Link {
				backend,
				poison: None,
			}),
			name,
		}
	}

	/// The name of the underlying backend, used in log messages.
	pub fn name(&self) -> &str {
		&self.name
	}

	fn link(&self) -> Result<MutexGuard<'_, Link<B>>, TransportError> {
		self.link
			.lock()
			.map_err(|_| LockPoisonedError::new("transport").into())
	}

	/// Open the link. Opening an open link does nothing.
	pub fn open(&self) -> Result<(), TransportError> {
		let mut link = self.link()?;
		if !link.backend.is_open() {
			link.backend.open()?;
			log::info!("{} opened", self.name);
		}
		Ok(())
	}

	/// Close the link. Closing a closed link does nothing.
	pub fn close(&self) -> Result<(), TransportError> {
		let mut link = self.link()?;
		if link.backend.is_open() {
			link.backend.close();
			log::info!("{} closed", self.name);
		}
		Ok(())
	}

	/// Whether the link is open.
	///
	/// A link whose lock was poisoned by a panicking thread reports closed.
	pub fn is_open(&self) -> bool {
		self.link().map(|link| link.backend.is_open()).unwrap_or(false)
	}

	/// Close the link, wait, open it again, and wait for the instrument to
	/// settle.
	pub fn reconnect(&self, wait: Duration) -> Result<(), TransportError> {
		log::info!("{} reconnecting", self.name);
		self.close()?;
		thread::sleep(wait);
		self.open()?;
		thread::sleep(wait);
		Ok(())
	}

	/// Take exclusive use of the link for one request/response exchange.
	///
	/// The lock is released when the returned [`Exchange`] is dropped.
	pub fn lock(&self) -> Result<Exchange<'_, B>, TransportError> {
		let mut link = self.link()?;
		if let Some(poison) = link.poison.take() {
			return Err(poison.into());
		}
		if !link.backend.is_open() {
			return Err(PortClosedError::new(self.name.as_str()).into());
		}
		Ok(Exchange {
			link,
			name: &self.name,
		})
	}

	/// Consume the transport, returning the backend.
	pub fn into_backend(self) -> Result<B, TransportError> {
		self.link
			.into_inner()
			.map(|link| link.backend)
			.map_err(|_| LockPoisonedError::new("transport").into())
	}
}

/// Exclusive use of a [`Transport`] for the duration of one logical command.
#[derive(Debug)]
pub struct Exchange<'a, B> {
	link: MutexGuard<'a, Link<B>>,
	name: &'a str,
}

impl<'a, B: Backend> Exchange<'a, B> {
	/// The name of the underlying backend.
	pub fn name(&self) -> &str {
		self.name
	}

	/// Get a mutable reference to the underlying backend.
	pub fn backend_mut(&mut self) -> &mut B {
		&mut self.link.backend
	}

	/// Write all of `bytes` and flush them.
	pub fn write(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
		log::debug!("{} TX: {:?}", self.name, Printable(bytes));
		let backend = &mut self.link.backend;
		backend.write_all(bytes)?;
		backend.flush()?;
		Ok(())
	}

	/// Read up to `n` bytes.
	///
	/// Reading stops early when the read timeout elapses, so fewer than `n`
	/// bytes may be returned.
	pub fn read(&mut self, n: usize) -> Result<Vec<u8>, TransportError> {
		let mut buf = vec![0u8; n];
		let mut filled = 0;
		while filled < n {
			match self.link.backend.read(&mut buf[filled..]) {
				Ok(0) => break,
				Ok(count) => filled += count,
				Err(e) if is_expired(&e) => break,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e.into()),
			}
		}
		buf.truncate(filled);
		if !buf.is_empty() {
			log::debug!("{} RECV: {:?}", self.name, Printable(&buf));
		}
		Ok(buf)
	}

	/// Read until a line feed or until the read timeout elapses.
	///
	/// The terminator (if any) is included, undecoded bytes are replaced, and
	/// an empty string means nothing arrived before the timeout.
	pub fn read_line(&mut self) -> Result<String, TransportError> {
		let mut line = Vec::new();
		let mut byte = [0u8; 1];
		loop {
			match self.link.backend.read(&mut byte) {
				Ok(0) => break,
				Ok(_) => {
					line.push(byte[0]);
					if byte[0] == b'\n' {
						break;
					}
				}
				Err(e) if is_expired(&e) => break,
				Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
				Err(e) => return Err(e.into()),
			}
		}
		let line = String::from_utf8_lossy(&line).into_owned();
		if !line.is_empty() {
			log::debug!("{} RECV: {:?}", self.name, line);
		}
		Ok(line)
	}

	/// Read and discard input until nothing arrives within [`DRAIN_TIMEOUT`].
	///
	/// At most 512 reads of 128 bytes are performed. If the instrument is
	/// still sending after that, a warning is logged and the rest is left in
	/// the buffer.
	pub fn drain(&mut self) -> Result<(), TransportError> {
		let mut guard = self.timeout_guard(Some(DRAIN_TIMEOUT))?;
		let mut discarded = 0;
		for _ in 0..DRAIN_MAX_READS {
			let chunk = guard.read(DRAIN_CHUNK)?;
			if chunk.is_empty() {
				if discarded > 0 {
					log::debug!("{} drained {} stale bytes", guard.name, discarded);
				}
				return Ok(());
			}
			discarded += chunk.len();
		}
		log::warn!(
			"{} still receiving data after discarding {} bytes",
			guard.name,
			discarded
		);
		Ok(())
	}

	/// Nudge the instrument with blank lines and throw away whatever it sends
	/// back, leaving the link at a fresh prompt.
	pub fn flush_buffers(&mut self) -> Result<(), TransportError> {
		self.write(b"\r\n\r\n")?;
		self.drain()
	}

	/// Set the port's timeout and return a [`TimeoutGuard`] that will reset the
	/// timeout when it goes out of scope.
	///
	/// While the guard is in scope, the exchange can only be used through the
	/// guard, which dereferences to the exchange.
	pub fn timeout_guard(
		&mut self,
		timeout: Option<Duration>,
	) -> Result<TimeoutGuard<'_, 'a, B>, TransportError> {
		TimeoutGuard::new(self, timeout).map_err(Into::into)
	}

	/// Report `e` the next time the transport is locked.
	pub(crate) fn poison(&mut self, e: io::Error) {
		self.link.poison = Some(e);
	}
}

/// Whether a read error only means the read timeout elapsed.
fn is_expired(e: &io::Error) -> bool {
	matches!(
		e.kind(),
		io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
	)
}

/// Formats bytes as text when they are printable and as a byte array otherwise.
struct Printable<'a>(&'a [u8]);

impl std::fmt::Debug for Printable<'_> {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match std::str::from_utf8(self.0) {
			Ok(text) if text.chars().all(|c| !c.is_control() || c.is_ascii_whitespace()) => {
				write!(f, "{text:?}")
			}
			_ => write!(f, "{:?}", self.0),
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;
	use static_assertions::assert_impl_all;

	assert_impl_all!(Transport<Mock>: Send, Sync);
	assert_impl_all!(Transport<Serial>: Send, Sync);

	#[test]
	fn lock_requires_an_open_link() {
		let mut mock = Mock::new();
		mock.close();
		let transport = Transport::open_mock(mock);
		let err = transport.lock().unwrap_err();
		assert!(matches!(err, TransportError::PortClosed(_)));

		transport.open().unwrap();
		transport.open().unwrap();
		assert!(transport.lock().is_ok());
		transport.close().unwrap();
		transport.close().unwrap();
		assert!(!transport.is_open());
	}

	#[test]
	fn read_returns_partial_data_on_timeout() {
		let mut mock = Mock::new();
		mock.append_data(b"abc");
		let transport = Transport::open_mock(mock);
		let mut exchange = transport.lock().unwrap();
		assert_eq!(exchange.read(8).unwrap(), b"abc");
		assert!(exchange.read(8).unwrap().is_empty());
	}

	#[test]
	fn read_line_stops_at_line_feed() {
		let mut mock = Mock::new();
		mock.append_data(b"first\r\nsecond");
		let transport = Transport::open_mock(mock);
		let mut exchange = transport.lock().unwrap();
		assert_eq!(exchange.read_line().unwrap(), "first\r\n");
		assert_eq!(exchange.read_line().unwrap(), "second");
		assert_eq!(exchange.read_line().unwrap(), "");
	}

	#[test]
	fn drain_discards_stale_input_and_restores_timeout() {
		let mut mock = Mock::new();
		mock.append_data(vec![b'x'; 1000]);
		mock.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
		let transport = Transport::open_mock(mock);
		let mut exchange = transport.lock().unwrap();
		exchange.drain().unwrap();
		assert!(exchange.backend_mut().is_empty());
		assert_eq!(
			exchange.backend_mut().read_timeout().unwrap(),
			Some(Duration::from_secs(1))
		);
	}

	#[test]
	fn failed_timeout_restore_poisons_the_link() {
		let transport = Transport::open_mock(Mock::new());
		{
			let mut exchange = transport.lock().unwrap();
			let mut guard = exchange.timeout_guard(Some(DRAIN_TIMEOUT)).unwrap();
			guard.backend_mut().set_read_timeout_error(Some(io::Error::new(
				io::ErrorKind::Other,
				"oops",
			)));
		}
		let err = transport.lock().unwrap_err();
		assert!(matches!(err, TransportError::Io(_)));
		// The poison is only reported once.
		assert!(transport.lock().is_ok());
	}

	#[test]
	fn reconnect_reopens_the_backend() {
		let transport = Transport::open_mock(Mock::new());
		transport.reconnect(Duration::ZERO).unwrap();
		let mut backend = transport.into_backend().unwrap();
		assert!(backend.is_open());
		assert_eq!(backend.open_count(), 1);
		backend.close();
	}
}
