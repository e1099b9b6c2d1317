//! A library for acquiring S-parameter sweeps from NanoVNA-family vector
//! network analyzers.
//!
//! Instruments speak one of two protocols over their USB serial link: a
//! [text command/response protocol](line) or, for the NanoVNA-V2, a
//! [register/FIFO protocol](binary). A [`Device`](device::Device) hides the
//! difference, and the [`Worker`](worker::Worker) turns a requested
//! [`Sweep`](sweep::Sweep) into segmented, averaged acquisitions published to
//! a shared buffer.
//!
//! ```rust
//! # use nanovna::{device::DeviceOptions, stream::Stream, calibration::Uncalibrated};
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut device = DeviceOptions::new().open("/dev/ttyACM0")?;
//! device.set_datapoints(101)?;
//! device.set_sweep(1_000_000, 30_000_000)?;
//!
//! let calibration = Uncalibrated;
//! for sweep in Stream::new(&mut device, &calibration).take(3) {
//!     let sweep = sweep?;
//!     println!("{} points, first S11 {:?}", sweep.len(), sweep.reflection()[0]);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(rustdoc::missing_crate_level_docs)]
#![deny(missing_debug_implementations)]

pub mod backend;
pub mod binary;
pub mod calibration;
pub mod device;
pub mod error;
pub mod line;
pub mod record;
pub mod stream;
pub mod sweep;
pub mod timeout_guard;
pub mod transport;
pub mod worker;

pub use device::Vna;

use error::InvalidSweepError;
use num_complex::Complex64;

/// A complex sample as read from the instrument, before calibration.
pub type RawSample = Complex64;

/// One complex sample of one channel at one frequency.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Datapoint {
	/// The frequency, in Hz.
	pub frequency: u64,
	/// The real part.
	pub re: f64,
	/// The imaginary part.
	pub im: f64,
}

impl Datapoint {
	/// Create a new datapoint.
	pub const fn new(frequency: u64, re: f64, im: f64) -> Self {
		Datapoint { frequency, re, im }
	}

	/// A zero-valued datapoint.
	pub const fn zero(frequency: u64) -> Self {
		Datapoint::new(frequency, 0.0, 0.0)
	}

	/// Pair a sample with its frequency.
	pub const fn from_sample(frequency: u64, sample: RawSample) -> Self {
		Datapoint::new(frequency, sample.re, sample.im)
	}

	/// The value as a complex number.
	pub const fn z(&self) -> Complex64 {
		Complex64::new(self.re, self.im)
	}
}

/// A measurement channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
	/// S11, the port 1 reflection.
	Reflection,
	/// S21, the transmission from port 1 to port 2.
	Through,
}

impl Channel {
	/// The line-protocol command reading the channel.
	pub const fn command(self) -> &'static str {
		match self {
			Channel::Reflection => "data 0",
			Channel::Through => "data 1",
		}
	}

	/// The S-parameter name.
	pub const fn name(self) -> &'static str {
		match self {
			Channel::Reflection => "S11",
			Channel::Through => "S21",
		}
	}
}

/// The reflection and through datapoints of one sweep.
///
/// Both channels always have the same length and the same frequencies.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SweepResult {
	reflection: Vec<Datapoint>,
	through: Vec<Datapoint>,
}

impl SweepResult {
	/// Pair up the channels, which must cover the same frequencies.
	pub fn new(reflection: Vec<Datapoint>, through: Vec<Datapoint>) -> Result<Self, InvalidSweepError> {
		if reflection.len() != through.len() {
			return Err(InvalidSweepError::new(format!(
				"{} reflection datapoints but {} through datapoints",
				reflection.len(),
				through.len()
			)));
		}
		if let Some((r, t)) = reflection
			.iter()
			.zip(&through)
			.find(|(r, t)| r.frequency != t.frequency)
		{
			return Err(InvalidSweepError::new(format!(
				"channels disagree on frequency: {} Hz vs {} Hz",
				r.frequency, t.frequency
			)));
		}
		Ok(SweepResult { reflection, through })
	}

	/// Build a result from `(frequency, reflection, through)` rows.
	pub fn from_rows<I>(rows: I) -> Self
	where
		I: IntoIterator<Item = (u64, Complex64, Complex64)>,
	{
		let (reflection, through) = rows
			.into_iter()
			.map(|(frequency, s11, s21)| {
				(
					Datapoint::from_sample(frequency, s11),
					Datapoint::from_sample(frequency, s21),
				)
			})
			.unzip();
		SweepResult { reflection, through }
	}

	/// Zero-valued datapoints at each frequency.
	pub fn zeroed(frequencies: &[u64]) -> Self {
		SweepResult::from_rows(
			frequencies
				.iter()
				.map(|&f| (f, Complex64::default(), Complex64::default())),
		)
	}

	/// The S11 datapoints.
	pub fn reflection(&self) -> &[Datapoint] {
		&self.reflection
	}

	/// The S21 datapoints.
	pub fn through(&self) -> &[Datapoint] {
		&self.through
	}

	/// The datapoints of a channel.
	pub fn channel(&self, channel: Channel) -> &[Datapoint] {
		match channel {
			Channel::Reflection => &self.reflection,
			Channel::Through => &self.through,
		}
	}

	/// The frequencies, in order.
	pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
		self.reflection.iter().map(|d| d.frequency)
	}

	/// The `(frequency, reflection, through)` rows.
	pub fn rows(&self) -> impl Iterator<Item = (u64, Complex64, Complex64)> + '_ {
		self.reflection
			.iter()
			.zip(&self.through)
			.map(|(r, t)| (r.frequency, r.z(), t.z()))
	}

	/// The number of frequencies.
	pub fn len(&self) -> usize {
		self.reflection.len()
	}

	/// Whether there are no frequencies.
	pub fn is_empty(&self) -> bool {
		self.reflection.is_empty()
	}

	/// Split into the reflection and through datapoints.
	pub fn into_parts(self) -> (Vec<Datapoint>, Vec<Datapoint>) {
		(self.reflection, self.through)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn channels_must_agree() {
		let a = vec![Datapoint::zero(1), Datapoint::zero(2)];
		let b = vec![Datapoint::zero(1)];
		assert!(SweepResult::new(a.clone(), b).is_err());
		let c = vec![Datapoint::zero(1), Datapoint::zero(3)];
		assert!(SweepResult::new(a.clone(), c).is_err());
		let result = SweepResult::new(a.clone(), a).unwrap();
		assert_eq!(result.frequencies().collect::<Vec<_>>(), [1, 2]);
	}

	#[test]
	fn rows_pair_the_channels() {
		let result = SweepResult::from_rows([
			(10, Complex64::new(1.0, 0.5), Complex64::new(0.0, -1.0)),
			(20, Complex64::new(0.25, 0.0), Complex64::new(2.0, 0.0)),
		]);
		assert_eq!(result.len(), 2);
		assert_eq!(result.reflection()[1], Datapoint::new(20, 0.25, 0.0));
		assert_eq!(result.channel(Channel::Through)[0].z(), Complex64::new(0.0, -1.0));
		assert_eq!(result.rows().nth(1).unwrap().0, 20);
	}

	#[test]
	fn zeroed() {
		let result = SweepResult::zeroed(&[5, 6, 7]);
		assert_eq!(result.len(), 3);
		assert!(result.through().iter().all(|d| d.z() == Complex64::default()));
	}
}
