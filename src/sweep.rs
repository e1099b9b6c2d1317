//! Describing what the [`Worker`](crate::worker::Worker) should acquire.
//!
//! A [`Sweep`] spans `start` to `stop` Hz with `points × segments` equally
//! spaced frequencies. Instruments limit how many points one hardware sweep
//! can hold, so wide or dense sweeps are split into `segments` consecutive
//! sub-sweeps of `points` frequencies each.

use crate::error::InvalidSweepError;
use std::fmt;

/// How often the worker repeats a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SweepMode {
	/// Acquire every segment once.
	#[default]
	Single,
	/// Keep acquiring until stopped.
	Continuous,
	/// Acquire every segment once, averaging repeated reads.
	Average,
}

impl fmt::Display for SweepMode {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			SweepMode::Single => "SINGLE",
			SweepMode::Continuous => "CONTINUOUS",
			SweepMode::Average => "AVERAGE",
		})
	}
}

/// The averaging policy of [`SweepMode::Average`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Averages {
	/// How many reads of each segment are averaged.
	pub count: u32,
	/// How many of those reads, the ones furthest from the mean, are dropped
	/// per frequency before averaging.
	pub truncate: u32,
}

impl Default for Averages {
	fn default() -> Self {
		Averages {
			count: 3,
			truncate: 0,
		}
	}
}

/// A requested sweep.
///
/// ## Example
///
/// ```rust
/// # use nanovna::sweep::{Sweep, SweepMode};
/// let mut sweep = Sweep::new(1_000_000, 1_201_000, 101, 2)?;
/// sweep.set_mode(SweepMode::Continuous);
/// assert_eq!(sweep.stepsize(), 1_000);
/// assert_eq!(sweep.index_range(1), (1_101_000, 1_201_000));
/// # Ok::<(), nanovna::error::InvalidSweepError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sweep {
	start: u64,
	stop: u64,
	points: u32,
	segments: u32,
	mode: SweepMode,
	averages: Averages,
}

impl Sweep {
	/// Create a single-shot sweep, checking that its frequencies are distinct.
	pub fn new(start: u64, stop: u64, points: u32, segments: u32) -> Result<Self, InvalidSweepError> {
		let sweep = Sweep {
			start,
			stop,
			points,
			segments,
			mode: SweepMode::default(),
			averages: Averages::default(),
		};
		sweep.check()?;
		Ok(sweep)
	}

	fn check(&self) -> Result<(), InvalidSweepError> {
		if self.points == 0 || self.segments == 0 {
			return Err(InvalidSweepError::new(format!(
				"{} points × {} segments is empty",
				self.points, self.segments
			)));
		}
		if self.start == 0 || self.stop <= self.start {
			return Err(InvalidSweepError::new(format!(
				"{} Hz to {} Hz is not an increasing range",
				self.start, self.stop
			)));
		}
		if self.total_points() > 1 && self.stepsize() < 1 {
			return Err(InvalidSweepError::new(format!(
				"{} points do not fit in {} Hz",
				self.total_points(),
				self.span()
			)));
		}
		Ok(())
	}

	/// The first frequency, in Hz.
	pub fn start(&self) -> u64 {
		self.start
	}

	/// The requested last frequency, in Hz.
	///
	/// Frequencies are rounded to a whole step, so the last frequency
	/// actually swept may differ slightly.
	pub fn stop(&self) -> u64 {
		self.stop
	}

	/// The number of points per segment.
	pub fn points(&self) -> u32 {
		self.points
	}

	/// The number of segments.
	pub fn segments(&self) -> u32 {
		self.segments
	}

	/// The repeat mode.
	pub fn mode(&self) -> SweepMode {
		self.mode
	}

	/// Set the repeat mode.
	pub fn set_mode(&mut self, mode: SweepMode) -> &mut Self {
		self.mode = mode;
		self
	}

	/// The averaging policy.
	pub fn averages(&self) -> Averages {
		self.averages
	}

	/// Set the averaging policy, used in [`SweepMode::Average`].
	pub fn set_averages(&mut self, count: u32, truncate: u32) -> &mut Self {
		self.averages = Averages { count, truncate };
		self
	}

	/// `stop - start`, in Hz.
	pub fn span(&self) -> u64 {
		self.stop - self.start
	}

	/// The number of frequencies over all segments.
	pub fn total_points(&self) -> u64 {
		u64::from(self.points) * u64::from(self.segments)
	}

	/// The distance between consecutive frequencies, in Hz.
	#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub fn stepsize(&self) -> u64 {
		match self.total_points() {
			0 | 1 => 0,
			n => (self.span() as f64 / (n - 1) as f64).round() as u64,
		}
	}

	/// The number of reads averaged per segment in this sweep's mode.
	pub fn reads_per_segment(&self) -> u32 {
		match self.mode {
			SweepMode::Average => self.averages.count.max(1),
			SweepMode::Single | SweepMode::Continuous => 1,
		}
	}

	/// Every frequency of the sweep, in order.
	pub fn frequencies(&self) -> impl Iterator<Item = u64> + '_ {
		let step = self.stepsize();
		(0..self.total_points()).map(move |i| self.start + i * step)
	}

	/// The first and last frequency of segment `index`.
	pub fn index_range(&self, index: u32) -> (u64, u64) {
		let step = self.stepsize();
		let start = self.start + u64::from(index) * u64::from(self.points) * step;
		(start, start + u64::from(self.points.saturating_sub(1)) * step)
	}
}

impl Default for Sweep {
	fn default() -> Self {
		Sweep {
			start: 3_600_000,
			stop: 30_000_000,
			points: 101,
			segments: 1,
			mode: SweepMode::default(),
			averages: Averages::default(),
		}
	}
}

impl fmt::Display for Sweep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{} Hz to {} Hz, {} points × {} segments, {}",
			self.start, self.stop, self.points, self.segments, self.mode
		)
	}
}

#[cfg(test)]
mod test {
	use super::*;

	#[test]
	fn defaults() {
		let sweep = Sweep::default();
		assert_eq!(sweep.start(), 3_600_000);
		assert_eq!(sweep.stop(), 30_000_000);
		assert_eq!(sweep.points(), 101);
		assert_eq!(sweep.segments(), 1);
		assert_eq!(sweep.mode(), SweepMode::Single);
		assert_eq!(sweep.averages(), Averages { count: 3, truncate: 0 });
		assert_eq!(sweep.stepsize(), 264_000);
		assert!(sweep.check().is_ok());
	}

	#[test]
	fn segments_tile_the_frequencies() {
		let sweep = Sweep::new(1_000_000, 1_000_299, 100, 3).unwrap();
		assert_eq!(sweep.stepsize(), 1);
		let frequencies: Vec<_> = sweep.frequencies().collect();
		assert_eq!(frequencies.len(), 300);
		for index in 0..3 {
			let (start, stop) = sweep.index_range(index);
			let offset = (index * 100) as usize;
			assert_eq!(start, frequencies[offset]);
			assert_eq!(stop, frequencies[offset + 99]);
		}
		assert_eq!(sweep.index_range(2).1, 1_000_299);
	}

	#[test]
	fn rejects_degenerate_sweeps() {
		assert!(Sweep::new(0, 10, 11, 1).is_err());
		assert!(Sweep::new(10, 10, 11, 1).is_err());
		assert!(Sweep::new(20, 10, 11, 1).is_err());
		assert!(Sweep::new(10, 20, 0, 1).is_err());
		assert!(Sweep::new(10, 20, 11, 0).is_err());
		assert!(Sweep::new(10, 14, 101, 1).is_err());
		assert!(Sweep::new(10, 20, 1, 1).is_ok());
	}

	#[test]
	fn reads_per_segment() {
		let mut sweep = Sweep::default();
		sweep.set_averages(5, 2);
		assert_eq!(sweep.reads_per_segment(), 1);
		sweep.set_mode(SweepMode::Average);
		assert_eq!(sweep.reads_per_segment(), 5);
		sweep.set_averages(0, 0);
		assert_eq!(sweep.reads_per_segment(), 1);
	}
}
