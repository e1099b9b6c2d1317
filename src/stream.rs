//! Reading calibrated sweeps straight from an instrument, one at a time.
//!
//! Unlike the [`Worker`](crate::worker::Worker), a [`Stream`] does not program
//! any sweep: it repeatedly reads whatever the instrument is currently
//! sweeping, on the calling thread.

use crate::{
	calibration::{self, Calibration},
	device::Vna,
	error::{Error, InvalidSweepError},
	Channel, Datapoint, RawSample, SweepResult,
};
use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

/// The outcome of one [`Stream::step`].
#[derive(Debug)]
pub enum Step {
	/// A sweep was read.
	Continue(SweepResult),
	/// The stream was cancelled, or had already failed.
	Done,
	/// Reading failed. The stream is finished until [restarted](Stream::restart).
	Failed(Error),
}

/// A restartable sequence of calibrated sweeps.
///
/// The frequencies are read once, on the first step, and reused for every
/// sweep after that. Iterating yields `Ok` sweeps until the stream is
/// cancelled, or one `Err` if reading fails.
#[derive(Debug)]
pub struct Stream<'a, V: ?Sized, C: ?Sized> {
	vna: &'a mut V,
	calibration: &'a C,
	offset_delay: f64,
	cancel: Arc<AtomicBool>,
	frequencies: Option<Vec<u64>>,
	finished: bool,
}

impl<'a, V, C> Stream<'a, V, C>
where
	V: Vna + ?Sized,
	C: Calibration + ?Sized,
{
	/// Stream from `vna`, correcting with `calibration`.
	pub fn new(vna: &'a mut V, calibration: &'a C) -> Self {
		Stream {
			vna,
			calibration,
			offset_delay: 0.0,
			cancel: Arc::new(AtomicBool::new(false)),
			frequencies: None,
			finished: false,
		}
	}

	/// Remove a fixed electrical delay, in seconds, from every sweep.
	#[must_use]
	pub fn with_offset_delay(mut self, delay: f64) -> Self {
		self.offset_delay = delay;
		self
	}

	/// A flag that ends the stream at the next step once set, from any thread.
	pub fn cancel_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.cancel)
	}

	/// End the stream at the next step.
	pub fn cancel(&self) {
		self.cancel.store(true, Ordering::SeqCst);
	}

	/// Read the next sweep.
	pub fn step(&mut self) -> Step {
		if self.finished {
			return Step::Done;
		}
		if self.cancel.load(Ordering::SeqCst) {
			log::debug!("stream cancelled");
			self.finished = true;
			return Step::Done;
		}
		match self.read() {
			Ok(sweep) => Step::Continue(sweep),
			Err(e) => {
				log::error!("exception in data stream: {e}");
				self.finished = true;
				Step::Failed(e)
			}
		}
	}

	fn read(&mut self) -> Result<SweepResult, Error> {
		let frequencies = match self.frequencies.take() {
			Some(frequencies) => frequencies,
			None => {
				let frequencies = self.vna.read_frequencies()?;
				log::debug!("frequencies read: {} values", frequencies.len());
				frequencies
			}
		};
		let frequencies = self.frequencies.insert(frequencies);
		let s11 = self.vna.read_values(Channel::Reflection)?;
		let s21 = self.vna.read_values(Channel::Through)?;
		correct(self.calibration, frequencies, &s11, &s21, self.offset_delay)
	}

	/// Clear the cancel flag and any failure, and read the frequencies again
	/// on the next step.
	pub fn restart(&mut self) {
		self.cancel.store(false, Ordering::SeqCst);
		self.frequencies = None;
		self.finished = false;
	}
}

impl<'a, V, C> Iterator for Stream<'a, V, C>
where
	V: Vna + ?Sized,
	C: Calibration + ?Sized,
{
	type Item = Result<SweepResult, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		match self.step() {
			Step::Continue(sweep) => Some(Ok(sweep)),
			Step::Done => None,
			Step::Failed(e) => Some(Err(e)),
		}
	}
}

/// Read the instrument's current sweep once.
pub fn single_sweep<V, C>(vna: &mut V, calibration: &C, offset_delay: f64) -> Result<SweepResult, Error>
where
	V: Vna + ?Sized,
	C: Calibration + ?Sized,
{
	let frequencies = vna.read_frequencies()?;
	let s11 = vna.read_values(Channel::Reflection)?;
	let s21 = vna.read_values(Channel::Through)?;
	correct(calibration, &frequencies, &s11, &s21, offset_delay)
}

/// Pair raw samples with their frequencies and correct them.
fn correct<C: Calibration + ?Sized>(
	calibration: &C,
	frequencies: &[u64],
	s11: &[RawSample],
	s21: &[RawSample],
	offset_delay: f64,
) -> Result<SweepResult, Error> {
	if s11.len() != frequencies.len() || s21.len() != frequencies.len() {
		return Err(InvalidSweepError::new(format!(
			"{} frequencies but {} S11 and {} S21 values",
			frequencies.len(),
			s11.len(),
			s21.len()
		))
		.into());
	}
	let pair = |values: &[RawSample]| -> Vec<Datapoint> {
		frequencies
			.iter()
			.zip(values)
			.map(|(&f, &z)| Datapoint::from_sample(f, z))
			.collect()
	};
	let (data11, data21) = calibration::apply(calibration, &pair(s11), &pair(s21), offset_delay);
	Ok(SweepResult::new(data11, data21)?)
}

#[cfg(test)]
mod test {
	use super::*;
	use crate::{
		calibration::Uncalibrated,
		device::ScriptedVna,
		error::{LineError, ProtocolTimeoutError},
	};

	#[test]
	fn frequencies_are_read_once() {
		let mut vna = ScriptedVna::new(11);
		let sweeps: Vec<_> = Stream::new(&mut vna, &Uncalibrated)
			.take(3)
			.collect::<Result<_, _>>()
			.unwrap();
		assert_eq!(sweeps.len(), 3);
		assert_eq!(sweeps[0].len(), 11);
		assert_eq!(sweeps[2].reflection()[10], Datapoint::new(2_000_000, 0.002, 0.0));
		assert_eq!(sweeps[2].through()[0], Datapoint::new(1_000_000, 0.0, 0.001));
		let frequency_reads = vna.calls().iter().filter(|c| *c == "read_frequencies").count();
		assert_eq!(frequency_reads, 1);
		assert!(vna.calls().iter().all(|c| !c.starts_with("set_sweep")));
	}

	#[test]
	fn cancel_and_restart() {
		let mut vna = ScriptedVna::new(5);
		let mut stream = Stream::new(&mut vna, &Uncalibrated);
		let cancel = stream.cancel_flag();
		assert!(matches!(stream.step(), Step::Continue(_)));
		cancel.store(true, Ordering::SeqCst);
		assert!(matches!(stream.step(), Step::Done));
		assert!(stream.next().is_none());

		stream.restart();
		assert!(matches!(stream.step(), Step::Continue(_)));
		drop(stream);
		let frequency_reads = vna.calls().iter().filter(|c| *c == "read_frequencies").count();
		assert_eq!(frequency_reads, 2);
	}

	#[test]
	fn failure_ends_the_stream() {
		let mut vna = ScriptedVna::new(5);
		let timeout: LineError = ProtocolTimeoutError::new("data 0", 42).into();
		vna.push_values(Err(timeout.into()));
		let mut stream = Stream::new(&mut vna, &Uncalibrated);
		let err = stream.next().unwrap().unwrap_err();
		assert!(err.is_recoverable());
		assert!(stream.next().is_none());
	}

	#[test]
	fn mismatched_lengths_are_invalid() {
		let mut vna = ScriptedVna::new(5);
		vna.push_values(Ok(vec![RawSample::new(0.1, 0.0); 4]));
		let err = single_sweep(&mut vna, &Uncalibrated, 0.0).unwrap_err();
		assert!(matches!(err, Error::InvalidSweep(_)));
	}
}
