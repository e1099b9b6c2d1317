//! Segmented, averaged acquisition on a background thread.
//!
//! A [`Worker`] turns the requested [`Sweep`] into one hardware sweep per
//! segment, averages repeated reads of each segment with outlier rejection,
//! corrects the result, and publishes it to a shared [`SweepData`] sink. The
//! sink is updated a whole segment at a time, so readers never observe a
//! partially written segment.
//!
//! ```rust
//! # use nanovna::{device::DeviceOptions, calibration::Uncalibrated, sweep::{Sweep, SweepMode}};
//! # use nanovna::worker::{Worker, WorkerOptions};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let device = DeviceOptions::new().open("/dev/ttyACM0")?;
//! let mut sweep = Sweep::new(1_000_000, 900_000_000, 101, 4)?;
//! sweep.set_mode(SweepMode::Continuous);
//!
//! let worker = Worker::new(device, Uncalibrated, WorkerOptions::new());
//! worker.set_sweep(sweep)?;
//! let handle = worker.spawn()?;
//! let data = handle.data();
//! if let Some(sweep) = data.wait_for_pass(0, Duration::from_secs(30))? {
//!     println!("{} points", sweep.len());
//! }
//! handle.stop();
//! handle.join().map_err(|_| "worker panicked")?;
//! # Ok(())
//! # }
//! ```

use crate::{
	calibration::{self, Calibration},
	device::Vna,
	error::{DataValidationError, Error, InvalidSweepError, LockPoisonedError, NoValidDataError},
	sweep::{Sweep, SweepMode},
	Channel, Datapoint, RawSample, SweepResult,
};
use num_complex::Complex64;
use std::{
	io,
	sync::{
		atomic::{AtomicBool, AtomicU64, Ordering},
		Arc, Condvar, Mutex, MutexGuard,
	},
	thread,
	time::Duration,
};

/// Tuning for the acquisition loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOptions {
	/// A fixed electrical delay removed from the corrected data, in seconds.
	offset_delay: f64,
	/// How many times a failed segment read is attempted.
	read_retries: u32,
	/// The pause before the `n`th attempt is `n × retry_backoff`.
	retry_backoff: Duration,
	/// How many implausible reads of a channel are tolerated.
	validation_retries: u32,
	/// Reconnect after this many implausible reads of a channel.
	reconnect_after: u32,
	/// The largest plausible magnitude of either component of a sample.
	plausible_magnitude: f64,
	/// The pause before re-reading an implausible channel.
	validation_pause: Duration,
	/// Attenuation, in dB, between the device under test and port 2.
	s21_attenuation: f64,
}

impl WorkerOptions {
	/// Create the default options.
	pub fn new() -> Self {
		WorkerOptions {
			offset_delay: 0.0,
			read_retries: 5,
			retry_backoff: Duration::from_millis(500),
			validation_retries: 10,
			reconnect_after: 5,
			plausible_magnitude: 9.5,
			validation_pause: Duration::from_millis(200),
			s21_attenuation: 0.0,
		}
	}

	/// Set the electrical delay removed from the corrected data, in seconds.
	pub fn offset_delay(&mut self, delay: f64) -> &mut Self {
		self.offset_delay = delay;
		self
	}

	/// Set how many times a failed segment read is attempted.
	pub fn read_retries(&mut self, retries: u32) -> &mut Self {
		self.read_retries = retries.max(1);
		self
	}

	/// Set the linear backoff between segment read attempts.
	pub fn retry_backoff(&mut self, backoff: Duration) -> &mut Self {
		self.retry_backoff = backoff;
		self
	}

	/// Set how implausible reads are handled: re-read after `pause`,
	/// reconnect after `reconnect_after` failures, and give up after `retries`.
	pub fn validation(&mut self, retries: u32, reconnect_after: u32, pause: Duration) -> &mut Self {
		self.validation_retries = retries;
		self.reconnect_after = reconnect_after;
		self.validation_pause = pause;
		self
	}

	/// Set the largest plausible magnitude of either sample component.
	pub fn plausible_magnitude(&mut self, magnitude: f64) -> &mut Self {
		self.plausible_magnitude = magnitude;
		self
	}

	/// Compensate for an attenuator, in dB, in front of port 2.
	pub fn s21_attenuation(&mut self, attenuation: f64) -> &mut Self {
		self.s21_attenuation = attenuation;
		self
	}
}

impl Default for WorkerOptions {
	fn default() -> Self {
		WorkerOptions::new()
	}
}

#[derive(Debug, Clone, Default)]
struct Buffers {
	data11: Vec<Datapoint>,
	data21: Vec<Datapoint>,
	raw11: Vec<Datapoint>,
	raw21: Vec<Datapoint>,
	passes: u64,
	error: Option<String>,
}

/// The published results of a [`Worker`].
///
/// Holds the corrected and raw datapoints of the whole sweep. Every method
/// copies under the same lock the worker writes under.
#[derive(Debug, Default)]
pub struct SweepData {
	buffers: Mutex<Buffers>,
	pass_done: Condvar,
}

impl SweepData {
	fn lock(&self) -> Result<MutexGuard<'_, Buffers>, LockPoisonedError> {
		self.buffers.lock().map_err(|_| LockPoisonedError::new("sweep data"))
	}

	/// The corrected datapoints.
	pub fn snapshot(&self) -> Result<SweepResult, Error> {
		let buffers = self.lock()?;
		Ok(SweepResult {
			reflection: buffers.data11.clone(),
			through: buffers.data21.clone(),
		})
	}

	/// The datapoints as read, before correction.
	pub fn raw_snapshot(&self) -> Result<SweepResult, Error> {
		let buffers = self.lock()?;
		Ok(SweepResult {
			reflection: buffers.raw11.clone(),
			through: buffers.raw21.clone(),
		})
	}

	/// The number of complete passes over every segment.
	pub fn passes(&self) -> Result<u64, Error> {
		Ok(self.lock()?.passes)
	}

	/// Wait until more than `seen` passes are complete, and return the
	/// corrected datapoints. Returns `None` on timeout.
	pub fn wait_for_pass(&self, seen: u64, timeout: Duration) -> Result<Option<SweepResult>, Error> {
		let buffers = self.lock()?;
		let (buffers, result) = self
			.pass_done
			.wait_timeout_while(buffers, timeout, |b| b.passes <= seen)
			.map_err(|_| LockPoisonedError::new("sweep data"))?;
		if result.timed_out() {
			return Ok(None);
		}
		Ok(Some(SweepResult {
			reflection: buffers.data11.clone(),
			through: buffers.data21.clone(),
		}))
	}

	/// The error that ended the last run, if any.
	pub fn last_error(&self) -> Result<Option<String>, Error> {
		Ok(self.lock()?.error.clone())
	}

	/// Zero every buffer at the given frequencies.
	fn reset(&self, frequencies: &[u64]) -> Result<(), LockPoisonedError> {
		let zeroed: Vec<_> = frequencies.iter().map(|&f| Datapoint::zero(f)).collect();
		let mut buffers = self.lock()?;
		buffers.data11 = zeroed.clone();
		buffers.data21 = zeroed.clone();
		buffers.raw11 = zeroed.clone();
		buffers.raw21 = zeroed;
		log::debug!("init data length: {}", frequencies.len());
		Ok(())
	}

	fn publish(&self, offset: usize, segment: Corrected) -> Result<(), Error> {
		let mut buffers = self.lock()?;
		let end = offset + segment.data11.len();
		if end > buffers.data11.len() {
			return Err(InvalidSweepError::new(format!(
				"segment of {} points at offset {offset} overruns the {} point sweep",
				segment.data11.len(),
				buffers.data11.len()
			))
			.into());
		}
		buffers.data11[offset..end].copy_from_slice(&segment.data11);
		buffers.data21[offset..end].copy_from_slice(&segment.data21);
		buffers.raw11[offset..end].copy_from_slice(&segment.raw11);
		buffers.raw21[offset..end].copy_from_slice(&segment.raw21);
		Ok(())
	}

	fn finish_pass(&self) -> Result<(), LockPoisonedError> {
		self.lock()?.passes += 1;
		self.pass_done.notify_all();
		Ok(())
	}

	fn set_error(&self, error: Option<String>) -> Result<(), LockPoisonedError> {
		self.lock()?.error = error;
		Ok(())
	}
}

/// The averaged samples of one segment.
#[derive(Debug, Clone, PartialEq)]
struct Segment {
	frequencies: Vec<u64>,
	s11: Vec<RawSample>,
	s21: Vec<RawSample>,
}

/// A segment paired with its frequencies, before and after correction.
#[derive(Debug)]
struct Corrected {
	data11: Vec<Datapoint>,
	data21: Vec<Datapoint>,
	raw11: Vec<Datapoint>,
	raw21: Vec<Datapoint>,
}

/// Drop, per frequency, the `count` reads furthest from the mean.
///
/// `reads` holds one row of samples per read. If `count` is zero, or would
/// leave no reads at all, `reads` is returned unchanged.
#[allow(clippy::cast_precision_loss)]
pub fn truncate(reads: Vec<Vec<RawSample>>, count: usize) -> Vec<Vec<RawSample>> {
	if count < 1 || count >= reads.len() {
		log::debug!("not truncating {} reads by {count}", reads.len());
		return reads;
	}
	let keep = reads.len() - count;
	log::debug!("truncating from {} reads to {keep}", reads.len());
	let points = reads.iter().map(Vec::len).min().unwrap_or(0);
	let mut kept = vec![Vec::with_capacity(points); keep];
	for index in 0..points {
		let mut column: Vec<RawSample> = reads.iter().map(|read| read[index]).collect();
		let mean = column.iter().sum::<Complex64>() / column.len() as f64;
		column.sort_by(|a, b| (a - mean).norm().total_cmp(&(b - mean).norm()));
		for (row, sample) in kept.iter_mut().zip(column) {
			row.push(sample);
		}
	}
	kept
}

/// The per-frequency mean of `reads`.
#[allow(clippy::cast_precision_loss)]
pub fn average(reads: &[Vec<RawSample>]) -> Vec<RawSample> {
	let points = reads.iter().map(Vec::len).min().unwrap_or(0);
	(0..points)
		.map(|index| reads.iter().map(|read| read[index]).sum::<Complex64>() / reads.len() as f64)
		.collect()
}

/// Acquires the requested sweep from a [`Vna`] and publishes it.
#[derive(Debug)]
pub struct Worker<V, C> {
	vna: V,
	calibration: Arc<Mutex<C>>,
	options: WorkerOptions,
	requested: Arc<Mutex<Sweep>>,
	/// The sweep the buffers were last laid out for.
	active: Option<Sweep>,
	data: Arc<SweepData>,
	running: Arc<AtomicBool>,
	/// The progress percentage, as `f64` bits.
	progress: Arc<AtomicU64>,
}

impl<V: Vna, C: Calibration> Worker<V, C> {
	/// Create a worker for the default [`Sweep`].
	pub fn new(vna: V, calibration: C, options: WorkerOptions) -> Self {
		Worker {
			vna,
			calibration: Arc::new(Mutex::new(calibration)),
			options,
			requested: Arc::new(Mutex::new(Sweep::default())),
			active: None,
			data: Arc::new(SweepData::default()),
			running: Arc::new(AtomicBool::new(false)),
			progress: Arc::new(AtomicU64::new(0)),
		}
	}

	/// The instrument.
	pub fn vna(&self) -> &V {
		&self.vna
	}

	/// The instrument, mutably. Not available while the worker is spawned.
	pub fn vna_mut(&mut self) -> &mut V {
		&mut self.vna
	}

	/// The calibration, shared with the running acquisition.
	pub fn calibration(&self) -> Arc<Mutex<C>> {
		Arc::clone(&self.calibration)
	}

	/// The published results.
	pub fn data(&self) -> Arc<SweepData> {
		Arc::clone(&self.data)
	}

	/// Request a sweep. It takes effect at the start of the next run.
	pub fn set_sweep(&self, sweep: Sweep) -> Result<(), Error> {
		*lock_sweep(&self.requested)? = sweep;
		Ok(())
	}

	/// Change the electrical delay removed from the corrected data, in seconds.
	pub fn set_offset_delay(&mut self, delay: f64) {
		self.options.offset_delay = delay;
	}

	/// The flag that keeps the acquisition going. Clearing it stops the run
	/// at the next segment boundary.
	pub fn running_flag(&self) -> Arc<AtomicBool> {
		Arc::clone(&self.running)
	}

	/// Whether a run is in progress.
	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	/// The progress of the current run, in percent.
	pub fn percentage(&self) -> f64 {
		f64::from_bits(self.progress.load(Ordering::Relaxed))
	}

	fn set_percentage(&self, percentage: f64) {
		self.progress.store(percentage.to_bits(), Ordering::Relaxed);
	}

	/// Acquire the requested sweep on this thread.
	///
	/// Errors are logged and recorded in [`SweepData::last_error`] rather
	/// than returned.
	pub fn run(&mut self) {
		self.running.store(true, Ordering::SeqCst);
		self.run_started();
	}

	fn run_started(&mut self) {
		let result = self.acquire();
		if let Err(e) = &result {
			log::error!("error during sweep, stopped: {e}");
		}
		if let Err(e) = self.data.set_error(result.err().map(|e| e.to_string())) {
			log::error!("{e}");
		}
		self.running.store(false, Ordering::SeqCst);
	}

	/// Acquire the requested sweep on this thread, returning the first error.
	pub fn try_run(&mut self) -> Result<(), Error> {
		self.running.store(true, Ordering::SeqCst);
		let result = self.acquire();
		self.running.store(false, Ordering::SeqCst);
		result
	}

	fn acquire(&mut self) -> Result<(), Error> {
		if !self.vna.is_connected() {
			log::warn!("attempted to run without being connected to the instrument");
			return Ok(());
		}
		self.set_percentage(0.0);

		let sweep = lock_sweep(&self.requested)?.clone();
		if self.active.as_ref() != Some(&sweep) {
			log::debug!("sweep changed to {sweep}");
			if self.vna.datapoints() != sweep.points() {
				self.vna.set_datapoints(sweep.points())?;
			}
			let frequencies: Vec<u64> = sweep.frequencies().collect();
			self.data.reset(&frequencies)?;
			self.active = Some(sweep.clone());
		}

		self.sweep_segments(&sweep)?;

		if sweep.segments() > 1 {
			log::debug!("resetting sweep to full range: {} to {}", sweep.start(), sweep.stop());
			self.vna.reset_sweep(sweep.start(), sweep.stop())?;
		}
		self.set_percentage(100.0);
		log::debug!("sweep is finished");
		Ok(())
	}

	fn sweep_segments(&mut self, sweep: &Sweep) -> Result<(), Error> {
		let reads = sweep.reads_per_segment();
		log::debug!("averages: {reads}");
		loop {
			let mut complete = true;
			for index in 0..sweep.segments() {
				if !self.is_running() {
					log::debug!("stopping sweeping as signalled");
					complete = false;
					break;
				}
				log::debug!("sweep segment no {index}");
				let (start, stop) = sweep.index_range(index);
				let segment = self.read_averaged_segment(sweep, start, stop, reads)?;
				self.set_percentage(f64::from(index + 1) * 100.0 / f64::from(sweep.segments()));
				match segment {
					Some(segment) => self.update_data(sweep, segment, index)?,
					None => complete = false,
				}
			}
			if complete {
				self.data.finish_pass()?;
			}
			if sweep.mode() != SweepMode::Continuous || !self.is_running() {
				return Ok(());
			}
		}
	}

	/// Read a segment `reads` times and average the reads.
	///
	/// Returns `None` if the run was stopped before the reads were complete.
	fn read_averaged_segment(
		&mut self,
		sweep: &Sweep,
		start: u64,
		stop: u64,
		reads: u32,
	) -> Result<Option<Segment>, Error> {
		log::debug!("reading from {start} to {stop}, averaging {reads} values");
		let mut frequencies = Vec::new();
		let mut batch11 = Vec::with_capacity(reads as usize);
		let mut batch21 = Vec::with_capacity(reads as usize);
		let step = 100.0 / (f64::from(sweep.segments()) * f64::from(reads));
		for read in 0..reads {
			if !self.is_running() {
				if read > 0 {
					log::debug!("stop during average, discarding sweep result");
				}
				return Ok(None);
			}
			log::debug!("reading average no {} / {reads}", read + 1);
			let segment = self.read_segment_retrying(sweep, start, stop)?;
			frequencies = segment.frequencies;
			batch11.push(segment.s11);
			batch21.push(segment.s21);
			self.set_percentage(self.percentage() + step);
		}

		let truncates = sweep.averages().truncate as usize;
		if truncates > 0 && reads > 1 {
			log::debug!("truncating {} values by {truncates}", batch11.len());
			batch11 = truncate(batch11, truncates);
			batch21 = truncate(batch21, truncates);
		}
		log::debug!("averaging {} values", batch11.len());
		Ok(Some(Segment {
			frequencies,
			s11: average(&batch11),
			s21: average(&batch21),
		}))
	}

	fn read_segment_retrying(
		&mut self,
		sweep: &Sweep,
		start: u64,
		stop: u64,
	) -> Result<Segment, Error> {
		for attempt in 0..self.options.read_retries {
			thread::sleep(self.options.retry_backoff * attempt);
			if attempt > 0 {
				log::debug!("retry {} read_segment({start}, {stop})", attempt + 1);
			}
			if let Some(segment) = self.read_segment(sweep, start, stop)? {
				return Ok(segment);
			}
		}
		Err(NoValidDataError::new(start, stop).into())
	}

	/// Program and read one segment. A timed out or inconsistent read yields `None`.
	///
	/// A read is inconsistent if its channels differ in length, or if it does
	/// not hold exactly the sweep's points per segment.
	fn read_segment(
		&mut self,
		sweep: &Sweep,
		start: u64,
		stop: u64,
	) -> Result<Option<Segment>, Error> {
		log::debug!("setting sweep range to {start} to {stop}");
		let read = (|| -> Result<Segment, Error> {
			self.vna.set_sweep(start, stop)?;
			let frequencies = self.vna.read_frequencies()?;
			log::debug!("read {} frequencies", frequencies.len());
			let s11 = self.read_data(Channel::Reflection)?;
			let s21 = self.read_data(Channel::Through)?;
			Ok(Segment { frequencies, s11, s21 })
		})();
		match read {
			Ok(segment)
				if segment.frequencies.len() == sweep.points() as usize
					&& segment.s11.len() == segment.frequencies.len()
					&& segment.s21.len() == segment.frequencies.len() =>
			{
				Ok(Some(segment))
			}
			Ok(segment) => {
				log::debug!(
					"no valid data during this run: {} frequencies, {} S11, {} S21 for {} points",
					segment.frequencies.len(),
					segment.s11.len(),
					segment.s21.len(),
					sweep.points()
				);
				Ok(None)
			}
			Err(e) if e.is_recoverable() => {
				log::warn!("{e}, abandoning read");
				Ok(None)
			}
			Err(e) => Err(e),
		}
	}

	/// Read a channel until its samples are plausible.
	fn read_data(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error> {
		log::debug!("reading {}", channel.command());
		let mut failures = 0;
		loop {
			match self.vna.read_values(channel) {
				Ok(values) => {
					log::debug!("read {} values", values.len());
					match values.iter().find(|&&z| !self.plausible(z)) {
						Some(z) => log::debug!("got a non plausible data value: {z}"),
						None => return Ok(values),
					}
				}
				Err(Error::MalformedResponse(e)) => {
					log::warn!("an exception occurred reading {}: {e}", channel.command());
				}
				Err(e) => return Err(e),
			}

			log::debug!("re-reading {}", channel.command());
			thread::sleep(self.options.validation_pause);
			failures += 1;
			if failures == self.options.reconnect_after {
				log::debug!("tried and failed to read {} {failures} times, trying to reconnect", channel.command());
				self.vna.reconnect()?;
			}
			if failures >= self.options.validation_retries {
				log::error!("tried and failed to read {} {failures} times, giving up", channel.command());
				return Err(DataValidationError::new(channel.command(), failures).into());
			}
		}
	}

	fn plausible(&self, z: RawSample) -> bool {
		let limit = self.options.plausible_magnitude;
		!self.vna.validate_input() || (z.re.abs() <= limit && z.im.abs() <= limit)
	}

	/// Correct a segment and publish it at its offset.
	fn update_data(&self, sweep: &Sweep, segment: Segment, index: u32) -> Result<(), Error> {
		log::debug!("calculating data and inserting in existing data at index {index}");
		let offset = sweep.points() as usize * index as usize;
		let pair = |values: &[RawSample]| -> Vec<Datapoint> {
			segment
				.frequencies
				.iter()
				.zip(values)
				.map(|(&f, &z)| Datapoint::from_sample(f, z))
				.collect()
		};
		let raw11 = pair(&segment.s11);
		let raw21 = pair(&segment.s21);
		let corrected = self.correct(raw11, raw21)?;
		log::debug!("update freqs: {}, offset: {offset}", segment.frequencies.len());
		self.data.publish(offset, corrected)?;
		Ok(())
	}

	fn correct(&self, raw11: Vec<Datapoint>, raw21: Vec<Datapoint>) -> Result<Corrected, Error> {
		let (data11, mut data21) = {
			let calibration = self
				.calibration
				.lock()
				.map_err(|_| LockPoisonedError::new("calibration"))?;
			calibration::apply(&*calibration, &raw11, &raw21, self.options.offset_delay)
		};
		if self.options.s21_attenuation > 0.0 {
			let gain = 10f64.powf(self.options.s21_attenuation / 20.0);
			for dp in &mut data21 {
				*dp = Datapoint::from_sample(dp.frequency, dp.z() * gain);
			}
		}
		Ok(Corrected {
			data11,
			data21,
			raw11,
			raw21,
		})
	}

	/// Correct the retained raw data again, after the calibration or the
	/// offset delay changed.
	pub fn recalibrate(&self) -> Result<(), Error> {
		let raw = self.data.raw_snapshot()?;
		let (raw11, raw21) = raw.into_parts();
		let corrected = self.correct(raw11, raw21)?;
		self.data.publish(0, corrected)?;
		Ok(())
	}
}

impl<V, C> Worker<V, C>
where
	V: Vna + Send + 'static,
	C: Calibration + Send + 'static,
{
	/// Run the acquisition on a background thread.
	pub fn spawn(mut self) -> io::Result<WorkerHandle<V, C>> {
		self.running.store(true, Ordering::SeqCst);
		let running = Arc::clone(&self.running);
		let progress = Arc::clone(&self.progress);
		let requested = Arc::clone(&self.requested);
		let data = Arc::clone(&self.data);
		let calibration = Arc::clone(&self.calibration);
		let thread = thread::Builder::new()
			.name("sweep-worker".to_string())
			.spawn(move || {
				self.run_started();
				self
			})
			.inspect_err(|_| running.store(false, Ordering::SeqCst))?;
		Ok(WorkerHandle {
			thread,
			running,
			progress,
			requested,
			data,
			calibration,
		})
	}
}

/// A [`Worker`] running on a background thread.
#[derive(Debug)]
pub struct WorkerHandle<V, C> {
	thread: thread::JoinHandle<Worker<V, C>>,
	running: Arc<AtomicBool>,
	progress: Arc<AtomicU64>,
	requested: Arc<Mutex<Sweep>>,
	data: Arc<SweepData>,
	calibration: Arc<Mutex<C>>,
}

impl<V, C> WorkerHandle<V, C> {
	/// Stop at the next segment boundary.
	pub fn stop(&self) {
		self.running.store(false, Ordering::SeqCst);
	}

	/// Whether the run is still in progress.
	pub fn is_running(&self) -> bool {
		self.running.load(Ordering::SeqCst)
	}

	/// The progress of the run, in percent.
	pub fn percentage(&self) -> f64 {
		f64::from_bits(self.progress.load(Ordering::Relaxed))
	}

	/// Request a sweep for the worker's next run.
	pub fn set_sweep(&self, sweep: Sweep) -> Result<(), Error> {
		*lock_sweep(&self.requested)? = sweep;
		Ok(())
	}

	/// The published results.
	pub fn data(&self) -> Arc<SweepData> {
		Arc::clone(&self.data)
	}

	/// The calibration, shared with the running acquisition.
	pub fn calibration(&self) -> Arc<Mutex<C>> {
		Arc::clone(&self.calibration)
	}

	/// Wait for the run to end and take the worker back.
	pub fn join(self) -> thread::Result<Worker<V, C>> {
		self.thread.join()
	}
}

fn lock_sweep(sweep: &Mutex<Sweep>) -> Result<MutexGuard<'_, Sweep>, LockPoisonedError> {
	sweep.lock().map_err(|_| LockPoisonedError::new("sweep"))
}

#[cfg(test)]
mod test;
