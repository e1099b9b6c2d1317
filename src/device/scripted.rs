//! An in-memory instrument for exercising the acquisition layers.

use super::Vna;
use crate::{error::Error, Channel, RawSample};
use std::{
	collections::VecDeque,
	sync::{
		atomic::{AtomicBool, Ordering},
		Arc,
	},
};

/// A [`Vna`] that sweeps evenly spaced frequencies and returns scripted or
/// synthesized samples.
///
/// Unless a read has been scripted with [`push_values`](ScriptedVna::push_values),
/// S11 at frequency `f` is `f / 1e9` and S21 is `j·f / 1e9`. Every call is
/// recorded and can be inspected with [`calls`](ScriptedVna::calls).
#[derive(Debug)]
pub struct ScriptedVna {
	datapoints: u32,
	fixed_points: Option<u32>,
	validate_input: bool,
	connected: bool,
	range: (u64, u64),
	values: VecDeque<Result<Vec<RawSample>, Error>>,
	calls: Vec<String>,
	sweeps: usize,
	clear_after: Option<(usize, Arc<AtomicBool>)>,
}

impl ScriptedVna {
	/// Create a connected instrument with the given points per sweep.
	pub fn new(datapoints: u32) -> Self {
		ScriptedVna {
			datapoints,
			fixed_points: None,
			validate_input: false,
			connected: true,
			range: (1_000_000, 2_000_000),
			values: VecDeque::new(),
			calls: Vec::new(),
			sweeps: 0,
			clear_after: None,
		}
	}

	/// Sweep `points` frequencies whatever the datapoints setting, like an
	/// instrument that ignores the requested count.
	pub fn set_fixed_points(&mut self, points: Option<u32>) -> &mut Self {
		self.fixed_points = points;
		self
	}

	/// Enable or disable the plausibility check on read samples.
	pub fn set_validate_input(&mut self, validate: bool) -> &mut Self {
		self.validate_input = validate;
		self
	}

	/// Mark the link as open or closed.
	pub fn set_connected(&mut self, connected: bool) -> &mut Self {
		self.connected = connected;
		self
	}

	/// Queue the result of the next unscripted [`read_values`](Vna::read_values).
	pub fn push_values(&mut self, values: Result<Vec<RawSample>, Error>) -> &mut Self {
		self.values.push_back(values);
		self
	}

	/// Clear `flag` once `sweeps` sweeps have been programmed.
	pub fn clear_after(&mut self, sweeps: usize, flag: Arc<AtomicBool>) -> &mut Self {
		self.clear_after = Some((sweeps, flag));
		self
	}

	/// Every call so far, in order.
	pub fn calls(&self) -> &[String] {
		&self.calls
	}

	/// The number of sweeps programmed so far.
	pub fn sweeps(&self) -> usize {
		self.sweeps
	}

	fn frequencies(&self) -> Vec<u64> {
		let (start, stop) = self.range;
		let points = self.fixed_points.unwrap_or(self.datapoints);
		let intervals = u64::from(points.saturating_sub(1).max(1));
		(0..u64::from(points))
			.map(|i| start + (stop - start) * i / intervals)
			.collect()
	}
}

impl Vna for ScriptedVna {
	fn datapoints(&self) -> u32 {
		self.datapoints
	}

	fn set_datapoints(&mut self, points: u32) -> Result<(), Error> {
		self.calls.push(format!("set_datapoints {points}"));
		self.datapoints = points;
		Ok(())
	}

	fn validate_input(&self) -> bool {
		self.validate_input
	}

	fn is_connected(&self) -> bool {
		self.connected
	}

	fn set_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		self.calls.push(format!("set_sweep {start} {stop}"));
		self.range = (start, stop);
		self.sweeps += 1;
		if let Some((after, flag)) = &self.clear_after {
			if self.sweeps >= *after {
				flag.store(false, Ordering::SeqCst);
			}
		}
		Ok(())
	}

	fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		self.calls.push(format!("reset_sweep {start} {stop}"));
		self.range = (start, stop);
		Ok(())
	}

	fn read_frequencies(&mut self) -> Result<Vec<u64>, Error> {
		self.calls.push("read_frequencies".to_string());
		Ok(self.frequencies())
	}

	#[allow(clippy::cast_precision_loss)]
	fn read_values(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error> {
		self.calls.push(format!("read_values {}", channel.name()));
		if let Some(values) = self.values.pop_front() {
			return values;
		}
		Ok(self
			.frequencies()
			.into_iter()
			.map(|f| {
				let level = f as f64 / 1e9;
				match channel {
					Channel::Reflection => RawSample::new(level, 0.0),
					Channel::Through => RawSample::new(0.0, level),
				}
			})
			.collect())
	}

	fn reconnect(&mut self) -> Result<(), Error> {
		self.calls.push("reconnect".to_string());
		self.connected = true;
		Ok(())
	}
}
