//! The seam between acquisition and calibration.
//!
//! The error-term math lives behind the [`Calibration`] trait. Acquisition
//! only asks whether corrections are available, applies them with [`apply`],
//! and feeds standards measurements in with [`record_step`].

use crate::{
	device::Vna,
	error::{CalibrationStateError, Error},
	stream, Datapoint, SweepResult,
};
use num_complex::Complex64;
use std::{f64::consts::PI, fmt, path::Path};

/// A calibration standard measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalibrationStep {
	/// A short on port 1.
	Short,
	/// An open on port 1.
	Open,
	/// A matched load on port 1.
	Load,
	/// Loads on both ports.
	Isolation,
	/// Port 1 connected to port 2, as seen on port 2.
	Through,
	/// Port 1 connected to port 2, as seen on port 1.
	ThruRefl,
}

impl CalibrationStep {
	/// The conventional name of the step.
	pub const fn name(self) -> &'static str {
		match self {
			CalibrationStep::Short => "short",
			CalibrationStep::Open => "open",
			CalibrationStep::Load => "load",
			CalibrationStep::Isolation => "isolation",
			CalibrationStep::Through => "through",
			CalibrationStep::ThruRefl => "thrurefl",
		}
	}

	/// Find the step with the given [`name`](CalibrationStep::name).
	pub fn from_name(name: &str) -> Option<CalibrationStep> {
		[
			CalibrationStep::Short,
			CalibrationStep::Open,
			CalibrationStep::Load,
			CalibrationStep::Isolation,
			CalibrationStep::Through,
			CalibrationStep::ThruRefl,
		]
		.into_iter()
		.find(|step| step.name() == name)
	}
}

impl fmt::Display for CalibrationStep {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// A calibration engine.
pub trait Calibration {
	/// Whether corrections have been computed.
	fn is_calculated(&self) -> bool;
	/// Whether the reflection corrections are usable.
	fn is_valid_1_port(&self) -> bool;
	/// Whether the through corrections are usable.
	fn is_valid_2_port(&self) -> bool;
	/// Correct a raw S11 datapoint.
	fn correct_reflection(&self, raw: Datapoint) -> Datapoint;
	/// Correct a raw S21 datapoint, given the raw S11 at the same frequency.
	fn correct_through(&self, raw: Datapoint, reflection_raw: Datapoint) -> Datapoint;

	/// Remove a fixed electrical delay, in seconds.
	///
	/// A reflection travels the delay twice.
	#[allow(clippy::cast_precision_loss)]
	fn correct_delay(&self, datapoint: Datapoint, delay: f64, reflect: bool) -> Datapoint {
		let trips = if reflect { 2.0 } else { 1.0 };
		let phase = -2.0 * PI * datapoint.frequency as f64 * delay * trips;
		let z = datapoint.z() * Complex64::from_polar(1.0, phase);
		Datapoint::from_sample(datapoint.frequency, z)
	}

	/// Record the measurement of a standard.
	fn insert(&mut self, step: CalibrationStep, sweep: &SweepResult);
	/// Compute corrections from the recorded steps.
	fn calc_corrections(&mut self) -> Result<(), CalibrationStateError>;
	/// Persist the computed corrections.
	fn save(&self, path: &Path) -> Result<(), Error>;
	/// Restore persisted corrections.
	fn load(&mut self, path: &Path) -> Result<(), Error>;
}

impl<C: Calibration + ?Sized> Calibration for &mut C {
	fn is_calculated(&self) -> bool {
		(**self).is_calculated()
	}
	fn is_valid_1_port(&self) -> bool {
		(**self).is_valid_1_port()
	}
	fn is_valid_2_port(&self) -> bool {
		(**self).is_valid_2_port()
	}
	fn correct_reflection(&self, raw: Datapoint) -> Datapoint {
		(**self).correct_reflection(raw)
	}
	fn correct_through(&self, raw: Datapoint, reflection_raw: Datapoint) -> Datapoint {
		(**self).correct_through(raw, reflection_raw)
	}
	fn correct_delay(&self, datapoint: Datapoint, delay: f64, reflect: bool) -> Datapoint {
		(**self).correct_delay(datapoint, delay, reflect)
	}
	fn insert(&mut self, step: CalibrationStep, sweep: &SweepResult) {
		(**self).insert(step, sweep)
	}
	fn calc_corrections(&mut self) -> Result<(), CalibrationStateError> {
		(**self).calc_corrections()
	}
	fn save(&self, path: &Path) -> Result<(), Error> {
		(**self).save(path)
	}
	fn load(&mut self, path: &Path) -> Result<(), Error> {
		(**self).load(path)
	}
}

/// No calibration at all: data passes through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Uncalibrated;

impl Calibration for Uncalibrated {
	fn is_calculated(&self) -> bool {
		false
	}
	fn is_valid_1_port(&self) -> bool {
		false
	}
	fn is_valid_2_port(&self) -> bool {
		false
	}
	fn correct_reflection(&self, raw: Datapoint) -> Datapoint {
		raw
	}
	fn correct_through(&self, raw: Datapoint, _: Datapoint) -> Datapoint {
		raw
	}
	fn insert(&mut self, step: CalibrationStep, _: &SweepResult) {
		log::debug!("ignoring {step} step");
	}
	fn calc_corrections(&mut self) -> Result<(), CalibrationStateError> {
		Err(CalibrationStateError::new("no calibration engine"))
	}
	fn save(&self, _: &Path) -> Result<(), Error> {
		Err(CalibrationStateError::new("cannot save an unapplied calibration state").into())
	}
	fn load(&mut self, _: &Path) -> Result<(), Error> {
		Err(CalibrationStateError::new("no calibration engine").into())
	}
}

/// Correct a segment of raw datapoints.
///
/// Each channel is corrected only if corrections have been computed and are
/// valid for it; otherwise it is passed through unchanged. A non-zero
/// `offset_delay`, in seconds, is then removed from both channels.
pub fn apply<C: Calibration + ?Sized>(
	calibration: &C,
	raw11: &[Datapoint],
	raw21: &[Datapoint],
	offset_delay: f64,
) -> (Vec<Datapoint>, Vec<Datapoint>) {
	let calculated = calibration.is_calculated();
	let mut data11 = if calculated && calibration.is_valid_1_port() {
		raw11.iter().map(|&dp| calibration.correct_reflection(dp)).collect()
	} else {
		if calculated {
			log::warn!("{}", CalibrationStateError::new("not a valid 1 port calibration"));
		}
		raw11.to_vec()
	};
	let mut data21 = if calculated && calibration.is_valid_2_port() {
		raw21
			.iter()
			.zip(raw11)
			.map(|(&dp, &dp11)| calibration.correct_through(dp, dp11))
			.collect()
	} else {
		raw21.to_vec()
	};

	if offset_delay != 0.0 {
		for dp in &mut data11 {
			*dp = calibration.correct_delay(*dp, offset_delay, true);
		}
		for dp in &mut data21 {
			*dp = calibration.correct_delay(*dp, offset_delay, false);
		}
	}
	(data11, data21)
}

/// Measure a standard and record it.
///
/// The instrument's current sweep is read without corrections. A
/// [`Through`](CalibrationStep::Through) measurement is recorded as
/// [`ThruRefl`](CalibrationStep::ThruRefl) as well.
pub fn record_step<V, C>(vna: &mut V, calibration: &mut C, step: CalibrationStep) -> Result<SweepResult, Error>
where
	V: Vna + ?Sized,
	C: Calibration + ?Sized,
{
	if step == CalibrationStep::Short {
		log::info!("make sure the sweep covers the intended measurement range before calibrating");
	}
	let sweep = stream::single_sweep(vna, &Uncalibrated, 0.0)?;
	calibration.insert(step, &sweep);
	if step == CalibrationStep::Through {
		log::debug!("recording thrurefl along with through");
		calibration.insert(CalibrationStep::ThruRefl, &sweep);
		log::info!("if all steps were recorded, compute the corrections to enable the calibration");
	}
	Ok(sweep)
}

#[cfg(test)]
mod test {
	use super::*;

	/// Scales S11 by 2 and S21 by 3, recording the steps it is given.
	#[derive(Default)]
	struct Scaling {
		calculated: bool,
		two_port: bool,
		steps: Vec<(CalibrationStep, usize)>,
	}

	impl Calibration for Scaling {
		fn is_calculated(&self) -> bool {
			self.calculated
		}
		fn is_valid_1_port(&self) -> bool {
			true
		}
		fn is_valid_2_port(&self) -> bool {
			self.two_port
		}
		fn correct_reflection(&self, raw: Datapoint) -> Datapoint {
			Datapoint::new(raw.frequency, raw.re * 2.0, raw.im * 2.0)
		}
		fn correct_through(&self, raw: Datapoint, _: Datapoint) -> Datapoint {
			Datapoint::new(raw.frequency, raw.re * 3.0, raw.im * 3.0)
		}
		fn insert(&mut self, step: CalibrationStep, sweep: &SweepResult) {
			self.steps.push((step, sweep.len()));
		}
		fn calc_corrections(&mut self) -> Result<(), CalibrationStateError> {
			self.calculated = true;
			Ok(())
		}
		fn save(&self, _: &Path) -> Result<(), Error> {
			Ok(())
		}
		fn load(&mut self, _: &Path) -> Result<(), Error> {
			Ok(())
		}
	}

	fn segment() -> Vec<Datapoint> {
		vec![Datapoint::new(1_000_000, 1.0, 0.5), Datapoint::new(2_000_000, -0.5, 0.0)]
	}

	#[test]
	fn uncalculated_passes_through() {
		let (d11, d21) = apply(&Scaling::default(), &segment(), &segment(), 0.0);
		assert_eq!(d11, segment());
		assert_eq!(d21, segment());
	}

	#[test]
	fn corrects_valid_ports_only() {
		let mut calibration = Scaling::default();
		calibration.calc_corrections().unwrap();
		let (d11, d21) = apply(&calibration, &segment(), &segment(), 0.0);
		assert_eq!(d11[0], Datapoint::new(1_000_000, 2.0, 1.0));
		assert_eq!(d21, segment());

		calibration.two_port = true;
		let (_, d21) = apply(&calibration, &segment(), &segment(), 0.0);
		assert_eq!(d21[1], Datapoint::new(2_000_000, -1.5, 0.0));
	}

	#[test]
	fn delay_rotates_phase() {
		let dp = Datapoint::new(250_000_000, 1.0, 0.0);
		// A quarter period at 250 MHz.
		let delay = 1e-9;
		let through = Uncalibrated.correct_delay(dp, delay, false).z();
		assert!((through - Complex64::new(0.0, -1.0)).norm() < 1e-9);
		let reflection = Uncalibrated.correct_delay(dp, delay, true).z();
		assert!((reflection - Complex64::new(-1.0, 0.0)).norm() < 1e-9);

		let (d11, d21) = apply(&Uncalibrated, &[dp], &[dp], delay);
		assert!((d11[0].z() - reflection).norm() < 1e-12);
		assert!((d21[0].z() - through).norm() < 1e-12);
		assert_eq!(d11[0].frequency, 250_000_000);
	}

	#[test]
	fn uncalibrated_refuses_state_changes() {
		let mut calibration = Uncalibrated;
		assert!(calibration.calc_corrections().is_err());
		let err = calibration.save(Path::new("cal.s1p")).unwrap_err();
		assert!(matches!(err, Error::CalibrationState(_)));
	}

	#[test]
	fn through_is_recorded_twice() {
		let mut vna = crate::device::ScriptedVna::new(7);
		let mut calibration = Scaling::default();
		calibration.calc_corrections().unwrap();
		let sweep = record_step(&mut vna, &mut calibration, CalibrationStep::Through).unwrap();
		// Standards are recorded raw, whatever the current corrections.
		assert_eq!(sweep.reflection()[6], Datapoint::new(2_000_000, 0.002, 0.0));
		assert_eq!(
			calibration.steps,
			[(CalibrationStep::Through, 7), (CalibrationStep::ThruRefl, 7)]
		);

		record_step(&mut vna, &mut calibration, CalibrationStep::Open).unwrap();
		assert_eq!(calibration.steps.len(), 3);
	}

	#[test]
	fn step_names() {
		assert_eq!(CalibrationStep::ThruRefl.name(), "thrurefl");
		assert_eq!(CalibrationStep::from_name("isolation"), Some(CalibrationStep::Isolation));
		assert_eq!(CalibrationStep::from_name("match"), None);
	}
}
