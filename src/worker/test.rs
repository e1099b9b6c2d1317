use super::*;
use crate::{
	calibration::Uncalibrated,
	device::ScriptedVna,
	error::{FirmwareUpdateModeError, LineError, MalformedResponseError, ProtocolTimeoutError},
};
use static_assertions::assert_impl_all;

assert_impl_all!(SweepData: Send, Sync);
assert_impl_all!(Worker<ScriptedVna, Uncalibrated>: Send);

fn z(re: f64) -> RawSample {
	RawSample::new(re, 0.0)
}

fn quick() -> WorkerOptions {
	let mut options = WorkerOptions::new();
	options
		.retry_backoff(Duration::ZERO)
		.validation(10, 5, Duration::ZERO);
	options
}

/// Two segments of 11 points, 1 kHz apart, from 1 MHz.
fn two_segments() -> Sweep {
	Sweep::new(1_000_000, 1_021_000, 11, 2).unwrap()
}

fn worker(vna: ScriptedVna, sweep: Sweep, options: WorkerOptions) -> Worker<ScriptedVna, Uncalibrated> {
	let worker = Worker::new(vna, Uncalibrated, options);
	worker.set_sweep(sweep).unwrap();
	worker
}

fn timeout() -> Error {
	LineError::from(ProtocolTimeoutError::new("data 0", 42)).into()
}

fn count(vna: &ScriptedVna, call: &str) -> usize {
	vna.calls().iter().filter(|c| *c == call).count()
}

#[test]
fn truncate_drops_outliers() {
	let reads = vec![vec![z(1.0), z(2.0)], vec![z(1.0), z(9.0)], vec![z(10.0), z(2.0)]];
	let kept = truncate(reads.clone(), 1);
	assert_eq!(kept.len(), 2);
	assert_eq!(average(&kept), [z(1.0), z(2.0)]);

	// Nothing to drop, or nothing would be left.
	assert_eq!(truncate(reads.clone(), 0), reads);
	assert_eq!(truncate(reads.clone(), 3), reads);
	assert_eq!(truncate(reads.clone(), 4), reads);
}

#[test]
fn untruncated_average_is_the_mean() {
	let reads = vec![vec![z(1.0), RawSample::new(0.0, 2.0)], vec![z(3.0), RawSample::new(0.0, -4.0)]];
	assert_eq!(average(&truncate(reads.clone(), 0)), [z(2.0), RawSample::new(0.0, -1.0)]);
	assert!(average(&[]).is_empty());
}

#[test]
fn single_run_publishes_every_segment() {
	let mut worker = worker(ScriptedVna::new(101), two_segments(), quick());
	worker.try_run().unwrap();
	assert!(!worker.is_running());
	assert_eq!(worker.percentage(), 100.0);

	let data = worker.data();
	assert_eq!(data.passes().unwrap(), 1);
	let sweep = data.snapshot().unwrap();
	assert_eq!(sweep.len(), 22);
	assert_eq!(sweep.frequencies().collect::<Vec<_>>(), two_segments().frequencies().collect::<Vec<_>>());
	assert_eq!(sweep.reflection()[15], Datapoint::new(1_015_000, 0.001015, 0.0));
	assert_eq!(sweep.through()[3], Datapoint::new(1_003_000, 0.0, 0.001003));
	assert_eq!(data.raw_snapshot().unwrap(), sweep);

	let vna = worker.vna();
	assert_eq!(
		vna.calls()[0..2],
		["set_datapoints 11".to_string(), "set_sweep 1000000 1010000".to_string()]
	);
	assert_eq!(vna.calls().last().unwrap(), "reset_sweep 1000000 1021000");
	assert_eq!(vna.sweeps(), 2);
}

#[test]
fn unchanged_sweep_keeps_the_buffers() {
	let sweep = Sweep::new(1_000_000, 1_010_000, 11, 1).unwrap();
	let mut worker = worker(ScriptedVna::new(11), sweep, quick());
	worker.try_run().unwrap();
	worker.try_run().unwrap();
	let vna = worker.vna();
	assert_eq!(count(vna, "set_datapoints 11"), 0);
	// One segment, so the instrument is left on it.
	assert!(vna.calls().iter().all(|c| !c.starts_with("reset_sweep")));
	assert_eq!(worker.data().passes().unwrap(), 2);
}

#[test]
fn continuous_stops_at_a_segment_boundary() {
	let mut sweep = two_segments();
	sweep.set_mode(SweepMode::Continuous);
	let mut worker = worker(ScriptedVna::new(11), sweep, quick());
	// Cleared while the first segment of the second pass is in flight.
	let flag = worker.running_flag();
	worker.vna_mut().clear_after(3, flag);
	worker.try_run().unwrap();

	let vna = worker.vna();
	assert_eq!(vna.sweeps(), 3);
	assert_eq!(count(vna, "read_values S11"), 3);
	assert_eq!(count(vna, "read_values S21"), 3);
	assert_eq!(vna.calls().last().unwrap(), "reset_sweep 1000000 1021000");
	assert_eq!(worker.data().passes().unwrap(), 1);
}

#[test]
fn averaging_rejects_outliers() {
	let mut sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	sweep.set_mode(SweepMode::Average).set_averages(3, 1);
	let mut vna = ScriptedVna::new(3);
	for s11 in [0.1, 0.1, 5.0] {
		vna.push_values(Ok(vec![z(s11); 3]));
		vna.push_values(Ok(vec![z(0.2); 3]));
	}
	let mut worker = worker(vna, sweep, quick());
	worker.try_run().unwrap();

	let result = worker.data().snapshot().unwrap();
	for dp in result.reflection() {
		assert!((dp.z() - z(0.1)).norm() < 1e-12);
	}
	for dp in result.through() {
		assert!((dp.z() - z(0.2)).norm() < 1e-12);
	}
	assert_eq!(worker.vna().sweeps(), 3);
}

#[test]
fn stop_during_average_discards_the_segment() {
	let mut sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	sweep.set_mode(SweepMode::Average).set_averages(3, 0);
	let mut worker = worker(ScriptedVna::new(3), sweep, quick());
	let flag = worker.running_flag();
	worker.vna_mut().clear_after(1, flag);
	worker.try_run().unwrap();

	assert_eq!(worker.vna().sweeps(), 1);
	let data = worker.data();
	assert_eq!(data.passes().unwrap(), 0);
	assert!(data.snapshot().unwrap().reflection().iter().all(|dp| dp.z() == z(0.0)));
}

#[test]
fn implausible_reads_are_repeated() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut vna = ScriptedVna::new(3);
	vna.set_validate_input(true);
	vna.push_values(Ok(vec![z(10.0); 3]));
	vna.push_values(Err(MalformedResponseError::new("<re> <im>", "0.5 oops").into()));
	let mut worker = worker(vna, sweep, quick());
	worker.try_run().unwrap();

	let vna = worker.vna();
	assert_eq!(count(vna, "read_values S11"), 3);
	assert_eq!(count(vna, "reconnect"), 0);
	assert_eq!(worker.data().snapshot().unwrap().reflection()[0].re, 0.001);
}

#[test]
fn implausible_reads_reconnect_then_fail() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut vna = ScriptedVna::new(3);
	vna.set_validate_input(true);
	for _ in 0..10 {
		vna.push_values(Ok(vec![RawSample::new(0.0, -9.6); 3]));
	}
	let mut worker = worker(vna, sweep, quick());
	worker.run();
	assert!(!worker.is_running());

	let vna = worker.vna();
	assert_eq!(count(vna, "read_values S11"), 10);
	assert_eq!(count(vna, "reconnect"), 1);
	let error = worker.data().last_error().unwrap().unwrap();
	assert!(error.contains("data 0"), "{error}");
}

#[test]
fn timeouts_are_retried() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut vna = ScriptedVna::new(3);
	vna.push_values(Err(timeout())).push_values(Err(timeout()));
	let mut worker = worker(vna, sweep, quick());
	worker.try_run().unwrap();
	assert_eq!(worker.vna().sweeps(), 3);
	assert_eq!(worker.data().passes().unwrap(), 1);
}

#[test]
fn wrong_point_count_is_never_published() {
	let mut vna = ScriptedVna::new(11);
	vna.set_fixed_points(Some(101));
	let mut worker = worker(vna, two_segments(), quick());
	let err = worker.try_run().unwrap_err();
	assert!(matches!(err, Error::NoValidData(_)));
	// Every attempt on the first segment was rejected.
	assert_eq!(worker.vna().sweeps(), 5);
	let data = worker.data();
	assert_eq!(data.passes().unwrap(), 0);
	assert!(data.snapshot().unwrap().reflection().iter().all(|dp| dp.z() == RawSample::new(0.0, 0.0)));
}

#[test]
fn overrunning_segment_is_an_error() {
	let data = SweepData::default();
	data.reset(&[1, 2, 3]).unwrap();
	let points: Vec<_> = [3, 4].iter().map(|&f| Datapoint::new(f, 1.0, 0.0)).collect();
	let segment = || Corrected {
		data11: points.clone(),
		data21: points.clone(),
		raw11: points.clone(),
		raw21: points.clone(),
	};
	let err = data.publish(2, segment()).unwrap_err();
	assert!(matches!(err, Error::InvalidSweep(_)));
	assert_eq!(data.snapshot().unwrap().reflection()[2], Datapoint::zero(3));

	data.publish(1, segment()).unwrap();
	assert_eq!(data.snapshot().unwrap().reflection()[2], Datapoint::new(4, 1.0, 0.0));
}

#[test]
fn exhausted_retries_end_the_run() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut vna = ScriptedVna::new(3);
	for _ in 0..5 {
		vna.push_values(Err(timeout()));
	}
	let mut worker = worker(vna, sweep, quick());
	let err = worker.try_run().unwrap_err();
	assert!(matches!(err, Error::NoValidData(_)));
	assert_eq!(worker.vna().sweeps(), 5);
	assert!(!worker.is_running());
}

#[test]
fn fatal_errors_are_not_retried() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut vna = ScriptedVna::new(3);
	vna.push_values(Err(FirmwareUpdateModeError.into()));
	let mut worker = worker(vna, sweep, quick());
	let err = worker.try_run().unwrap_err();
	assert!(matches!(err, Error::FirmwareUpdateMode(_)));
	assert_eq!(worker.vna().sweeps(), 1);
}

#[test]
fn disconnected_does_nothing() {
	let mut vna = ScriptedVna::new(11);
	vna.set_connected(false);
	let mut worker = worker(vna, two_segments(), quick());
	worker.run();
	assert!(worker.vna().calls().is_empty());
	assert_eq!(worker.data().last_error().unwrap(), None);
}

#[test]
fn attenuation_and_delay() {
	let sweep = Sweep::new(1_000_000, 1_002_000, 3, 1).unwrap();
	let mut options = quick();
	options.s21_attenuation(20.0);
	let mut worker = worker(ScriptedVna::new(3), sweep, options);
	worker.try_run().unwrap();

	let data = worker.data();
	let raw = data.raw_snapshot().unwrap();
	let corrected = data.snapshot().unwrap();
	assert_eq!(corrected.reflection(), raw.reflection());
	assert!((corrected.through()[0].z() - raw.through()[0].z() * 10.0).norm() < 1e-12);

	worker.set_offset_delay(1e-7);
	worker.recalibrate().unwrap();
	let (raw11, _) = raw.into_parts();
	let (expected, _) = calibration::apply(&Uncalibrated, &raw11, &[], 1e-7);
	assert_eq!(data.snapshot().unwrap().reflection(), expected);
}

#[test]
fn spawned_worker_publishes_passes() {
	let mut sweep = two_segments();
	sweep.set_mode(SweepMode::Continuous);
	let worker = worker(ScriptedVna::new(11), sweep, quick());
	let handle = worker.spawn().unwrap();
	let data = handle.data();
	let first = data.wait_for_pass(0, Duration::from_secs(10)).unwrap().unwrap();
	assert_eq!(first.len(), 22);
	assert!(handle.is_running());

	handle.stop();
	let worker = handle.join().unwrap();
	assert!(!worker.is_running());
	assert!(worker.vna().sweeps() >= 2);
	assert!(data.passes().unwrap() >= 1);
}
