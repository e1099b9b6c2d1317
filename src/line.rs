//! The text command/response protocol spoken by line-firmware instruments.
//!
//! A command is an ASCII line terminated by a carriage return. The instrument
//! echoes the command, prints zero or more lines of output, and then prints
//! its interactive prompt ([`PROMPT`]). [`exec_command`] performs one such
//! cycle and returns the output lazily:
//!
//! ```rust
//! # use nanovna::{line::{self, Timing}, transport::Transport};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Transport::open_serial("/dev/ttyACM0")?;
//! let timing = Timing::new(Duration::from_millis(50), 1000, 101);
//! for line in line::exec_command(&transport, "frequencies", timing)? {
//!     let frequency: u64 = line?.parse()?;
//!     // ...
//! }
//! # Ok(())
//! # }
//! ```

use crate::{
	backend::Backend,
	error::{LineError, ProtocolTimeoutError},
	transport::{Exchange, Transport},
};
use std::{thread, time::Duration};

/// The prefix of the line an instrument prints once it is ready for the next command.
pub const PROMPT: &str = "ch>";

/// The number of empty reads tolerated while waiting for a command to finish.
///
/// The allowance grows with the number of datapoints and shrinks with the IF
/// bandwidth, following how long a sweep of that size is expected to take.
/// A `bandwidth` of zero is treated as 1 Hz.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn max_retries(bandwidth: u32, datapoints: u32) -> u32 {
	let points = f64::from(datapoints) / 101.0;
	let slowness = (1000.0 / f64::from(bandwidth.max(1))).powf(1.30);
	(20.0 + 20.0 * points + slowness * points).round() as u32
}

/// How long to pause between reads and how many empty reads to tolerate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
	/// The session's base wait.
	pub wait: Duration,
	/// A per-command override. The pause is the shorter of the two.
	pub overwrite: Duration,
	/// See [`max_retries`].
	pub max_retries: u32,
}

impl Timing {
	/// Timing for a session with the given base wait, bandwidth and datapoints.
	///
	/// The override starts at zero, so by default there is no pause between
	/// reads other than the link's own read timeout.
	pub fn new(wait: Duration, bandwidth: u32, datapoints: u32) -> Self {
		Timing {
			wait,
			overwrite: Duration::ZERO,
			max_retries: max_retries(bandwidth, datapoints),
		}
	}

	/// Use a per-command override for the pause.
	#[must_use]
	pub fn overwrite(mut self, overwrite: Duration) -> Self {
		self.overwrite = overwrite;
		self
	}

	/// The pause after writing the command and after each empty read.
	pub fn pause(&self) -> Duration {
		self.wait.min(self.overwrite)
	}
}

/// Send `command` and return an iterator over the lines it prints.
///
/// Stale input is drained before the command is written. The transport stays
/// locked until the iterator is exhausted or dropped, so no other command can
/// be interleaved with this one.
///
/// The echoed command is never yielded, and the iteration ends cleanly at the
/// prompt. If more than `timing.max_retries` reads come back empty, the
/// iterator yields a [`ProtocolTimeoutError`] and then ends.
pub fn exec_command<'t, B: Backend>(
	transport: &'t Transport<B>,
	command: &str,
	timing: Timing,
) -> Result<Lines<'t, B>, LineError> {
	log::debug!("exec_command({command})");
	let mut exchange = transport.lock()?;
	exchange.drain()?;
	exchange.write(format!("{command}\r").as_bytes())?;
	thread::sleep(timing.pause());
	Ok(Lines {
		exchange,
		command: command.to_string(),
		timing,
		retries: 0,
		done: false,
	})
}

/// Like [`exec_command`], but collect every line, failing on the first error.
pub fn exec_collect<B: Backend>(
	transport: &Transport<B>,
	command: &str,
	timing: Timing,
) -> Result<Vec<String>, LineError> {
	exec_command(transport, command, timing)?.collect()
}

/// The output of a single command. See [`exec_command`].
#[derive(Debug)]
pub struct Lines<'t, B: Backend> {
	exchange: Exchange<'t, B>,
	command: String,
	timing: Timing,
	/// The number of empty reads so far.
	retries: u32,
	/// Whether the iterator has finished.
	done: bool,
}

impl<'t, B: Backend> Lines<'t, B> {
	/// The number of empty reads so far.
	pub fn retries(&self) -> u32 {
		self.retries
	}
}

impl<'t, B: Backend> Iterator for Lines<'t, B> {
	type Item = Result<String, LineError>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.done {
			return None;
		}
		loop {
			let raw = match self.exchange.read_line() {
				Ok(raw) => raw,
				Err(e) => {
					self.done = true;
					return Some(Err(e.into()));
				}
			};
			let line = raw.trim();
			if line.is_empty() {
				self.retries += 1;
				if self.retries > self.timing.max_retries {
					self.done = true;
					return Some(Err(ProtocolTimeoutError::new(
						self.command.as_str(),
						self.retries,
					)
					.into()));
				}
				thread::sleep(self.timing.pause());
				continue;
			}
			if line == self.command {
				continue;
			}
			if line.starts_with(PROMPT) {
				log::debug!("needed retries: {}", self.retries);
				self.done = true;
				return None;
			}
			return Some(Ok(line.to_string()));
		}
	}
}

impl<'t, B: Backend> std::iter::FusedIterator for Lines<'t, B> {}

#[cfg(test)]
mod test {
	use super::*;
	use crate::backend::Mock;

	fn timing(max_retries: u32) -> Timing {
		Timing {
			wait: Duration::ZERO,
			overwrite: Duration::ZERO,
			max_retries,
		}
	}

	#[test]
	fn max_retries_values() {
		assert_eq!(max_retries(1000, 101), 41);
		assert_eq!(max_retries(10, 101), 438);
		assert_eq!(max_retries(1000, 11), 22);
	}

	#[test]
	fn max_retries_is_bounded_without_a_bandwidth() {
		assert_eq!(max_retries(0, 101), max_retries(1, 101));
		assert!(max_retries(0, 101) < u32::MAX);
	}

	#[test]
	fn max_retries_is_monotonic() {
		let bandwidths = [1, 10, 33, 50, 100, 200, 250, 333, 500, 1000, 2000, 4000];
		let datapoints = [11, 51, 101, 201, 301, 401, 501, 1001, 1023];
		for &points in &datapoints {
			for pair in bandwidths.windows(2) {
				assert!(max_retries(pair[0], points) >= max_retries(pair[1], points));
			}
		}
		for &bandwidth in &bandwidths {
			for pair in datapoints.windows(2) {
				assert!(max_retries(bandwidth, pair[0]) <= max_retries(bandwidth, pair[1]));
			}
		}
	}

	#[test]
	fn echo_then_prompt_is_empty() {
		let mut mock = Mock::new();
		mock.reply("resume\r", "resume\r\nch> ");
		let transport = Transport::open_mock(mock);

		let mut lines = exec_command(&transport, "resume", timing(0)).unwrap();
		assert!(lines.next().is_none());
		assert_eq!(lines.retries(), 0);
		assert!(lines.next().is_none());
		drop(lines);

		let backend = transport.into_backend().unwrap();
		assert_eq!(backend.written(), [b"resume\r".to_vec()]);
	}

	#[test]
	fn output_lines_are_trimmed() {
		let mut mock = Mock::new();
		mock.reply(
			"data 0\r",
			"data 0\r\n 0.5 -0.25 \r\n1.0 0.0\r\nch> ",
		);
		let transport = Transport::open_mock(mock);
		let lines = exec_collect(&transport, "data 0", timing(3)).unwrap();
		assert_eq!(lines, ["0.5 -0.25", "1.0 0.0"]);
	}

	#[test]
	fn silence_exhausts_retries() {
		let transport = Transport::open_mock(Mock::new());
		let mut lines = exec_command(&transport, "info", timing(41)).unwrap();
		let err = lines.next().unwrap().unwrap_err();
		let err = ProtocolTimeoutError::try_from(err).unwrap();
		assert_eq!(err.retries(), 42);
		assert_eq!(err.command(), "info");
		assert!(lines.next().is_none());
	}

	#[test]
	fn read_error_ends_iteration() {
		let mut mock = Mock::new();
		mock.reply("sn\r", "sn\r\n");
		let transport = Transport::open_mock(mock);
		let mut lines = exec_command(&transport, "sn", timing(3)).unwrap();
		lines
			.exchange
			.backend_mut()
			.read_error(Some(std::io::Error::new(
				std::io::ErrorKind::BrokenPipe,
				"unplugged",
			)));
		assert!(matches!(lines.next(), Some(Err(LineError::Io(_)))));
		assert!(lines.next().is_none());
	}

	#[test]
	fn pause_is_the_shorter_wait() {
		let timing = Timing::new(Duration::from_millis(50), 1000, 101);
		assert_eq!(timing.pause(), Duration::ZERO);
		let timing = timing.overwrite(Duration::from_millis(80));
		assert_eq!(timing.pause(), Duration::from_millis(50));
	}
}
