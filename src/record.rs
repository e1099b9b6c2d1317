//! Recording sweeps to CSV and replaying them.
//!
//! The format has a `S11,S21,Freq` header, then for every sweep a divider
//! row (`sweepnumber: ,<n>`) followed by one row per frequency:
//!
//! ```text
//! S11,S21,Freq
//! sweepnumber: ,0
//! (0.5-0.25j),(0.001+0j),1000000
//! (0.49-0.26j),(0.002+0j),2000000
//! sweepnumber: ,1
//! ...
//! ```
//!
//! Complex values use the `(re+imj)` notation, so recordings made by other
//! NanoVNA tooling can be replayed too.

use crate::{
	error::{Error, MalformedResponseError},
	RawSample, SweepResult,
};
use std::{io, thread, time::Duration};

/// The default divider text.
pub const DIVIDER: &str = "sweepnumber: ";

/// Options for [`write_stream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordOptions {
	sweeps: Option<usize>,
	skip_start: usize,
	divider: String,
}

impl RecordOptions {
	/// Record every sweep after the first 5, with the default divider.
	pub fn new() -> Self {
		RecordOptions {
			sweeps: None,
			skip_start: 5,
			divider: DIVIDER.to_string(),
		}
	}

	/// Stop after recording this many sweeps. By default, record until the
	/// sweeps run out.
	pub fn sweeps(&mut self, sweeps: Option<usize>) -> &mut Self {
		self.sweeps = sweeps;
		self
	}

	/// The number of leading sweeps written as a divider only.
	///
	/// Instruments tend to return poor data right after connecting.
	pub fn skip_start(&mut self, skip: usize) -> &mut Self {
		self.skip_start = skip;
		self
	}

	/// The text that marks the start of a sweep.
	pub fn divider<S: Into<String>>(&mut self, divider: S) -> &mut Self {
		self.divider = divider.into();
		self
	}
}

impl Default for RecordOptions {
	fn default() -> Self {
		RecordOptions::new()
	}
}

/// Write sweeps as CSV, returning the number of sweeps recorded.
///
/// Every sweep pulled from `sweeps` gets a divider row, numbered from zero.
/// Its datapoints are only written once the leading sweeps have been skipped.
/// An error from `sweeps` stops the recording and is returned after the
/// output has been flushed.
pub fn write_stream<W, I>(writer: W, sweeps: I, options: &RecordOptions) -> Result<usize, Error>
where
	W: io::Write,
	I: IntoIterator<Item = Result<SweepResult, Error>>,
{
	let mut csv = csv::WriterBuilder::new().flexible(true).from_writer(writer);
	csv.write_record(["S11", "S21", "Freq"])?;
	log::debug!("csv header written, starting stream");

	let mut counter = 0_usize;
	let mut recorded = 0_usize;
	let mut failure = None;
	for sweep in sweeps {
		let sweep = match sweep {
			Ok(sweep) => sweep,
			Err(e) => {
				failure = Some(e);
				break;
			}
		};
		csv.write_record([options.divider.as_str(), counter.to_string().as_str()])?;
		counter += 1;
		if counter > options.skip_start {
			for (frequency, s11, s21) in sweep.rows() {
				csv.write_record([format_complex(s11), format_complex(s21), frequency.to_string()])?;
			}
			recorded += 1;
			if options.sweeps.is_some_and(|limit| recorded >= limit) {
				break;
			}
		}
	}
	csv.flush()?;
	log::info!("recorded {recorded} of {counter} sweeps");
	match failure {
		Some(e) => Err(e),
		None => Ok(recorded),
	}
}

/// Format a complex number as `(re+imj)`.
pub fn format_complex(z: RawSample) -> String {
	let sign = if z.im.is_sign_negative() { '-' } else { '+' };
	format!("({}{}{}j)", z.re, sign, z.im.abs())
}

/// Parse a complex number written as `(re+imj)`, `imj` or `re`.
pub fn parse_complex(text: &str) -> Option<RawSample> {
	let text = text.trim();
	let text = text
		.strip_prefix('(')
		.and_then(|t| t.strip_suffix(')'))
		.unwrap_or(text)
		.trim();
	let Some(body) = text.strip_suffix(|c: char| c == 'j' || c == 'J') else {
		return text.parse().ok().map(|re| RawSample::new(re, 0.0));
	};
	// The imaginary part starts at the last sign that is not an exponent's.
	let bytes = body.as_bytes();
	let split = (1..bytes.len())
		.rev()
		.find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E'));
	match split {
		Some(i) => Some(RawSample::new(body[..i].parse().ok()?, body[i..].parse().ok()?)),
		None => body.parse().ok().map(|im| RawSample::new(0.0, im)),
	}
}

/// Replay sweeps recorded by [`write_stream`].
pub fn read_stream<R: io::Read>(reader: R) -> SweepReader<R> {
	SweepReader {
		csv: csv::ReaderBuilder::new()
			.flexible(true)
			.has_headers(true)
			.from_reader(reader),
		divider: DIVIDER.trim().to_string(),
		delay: Duration::ZERO,
		record: csv::StringRecord::new(),
		package: Vec::new(),
		finished: false,
	}
}

/// An iterator over the sweeps of a CSV recording.
///
/// A sweep ends at the next divider row or at the end of the input. Dividers
/// with no rows before them are skipped. After an error the iterator is
/// finished.
#[derive(Debug)]
pub struct SweepReader<R> {
	csv: csv::Reader<R>,
	divider: String,
	delay: Duration,
	record: csv::StringRecord,
	package: Vec<(u64, RawSample, RawSample)>,
	finished: bool,
}

impl<R: io::Read> SweepReader<R> {
	/// Sleep before yielding each sweep, to pace a replay like a live
	/// instrument.
	#[must_use]
	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Use a divider other than [`DIVIDER`].
	#[must_use]
	pub fn with_divider(mut self, divider: &str) -> Self {
		self.divider = divider.trim().to_string();
		self
	}

	fn emit(&mut self) -> Option<SweepResult> {
		if self.package.is_empty() {
			return None;
		}
		if !self.delay.is_zero() {
			thread::sleep(self.delay);
		}
		Some(SweepResult::from_rows(self.package.drain(..)))
	}

	fn is_divider(&self) -> bool {
		self.record.iter().any(|field| field.contains(self.divider.as_str()))
	}

	fn parse_row(&self) -> Result<(u64, RawSample, RawSample), Error> {
		let malformed = || MalformedResponseError::new("<S11>,<S21>,<frequency>", self.record.as_slice());
		let (Some(s11), Some(s21), Some(frequency)) = (
			self.record.get(0).and_then(parse_complex),
			self.record.get(1).and_then(parse_complex),
			self.record
				.iter()
				.last()
				.filter(|_| self.record.len() >= 3)
				.and_then(|f| f.trim().parse().ok()),
		) else {
			return Err(malformed().into());
		};
		Ok((frequency, s11, s21))
	}
}

impl<R: io::Read> Iterator for SweepReader<R> {
	type Item = Result<SweepResult, Error>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.finished {
			return None;
		}
		loop {
			match self.csv.read_record(&mut self.record) {
				Ok(true) => {}
				Ok(false) => {
					self.finished = true;
					return self.emit().map(Ok);
				}
				Err(e) => {
					self.finished = true;
					return Some(Err(e.into()));
				}
			}
			if self.is_divider() {
				if let Some(sweep) = self.emit() {
					return Some(Ok(sweep));
				}
				continue;
			}
			match self.parse_row() {
				Ok(row) => self.package.push(row),
				Err(e) => {
					log::error!("exception when streaming from csv: {e}");
					self.finished = true;
					return Some(Err(e));
				}
			}
		}
	}
}

#[cfg(test)]
mod test {
	use super::*;

	fn sweep(offset: f64) -> SweepResult {
		SweepResult::from_rows([
			(1_000_000, RawSample::new(0.5 + offset, -0.25), RawSample::new(0.001, 0.0)),
			(2_000_000, RawSample::new(-0.125, 1e-7), RawSample::new(0.0, -2.0)),
		])
	}

	#[allow(clippy::cast_precision_loss)]
	fn record(options: &RecordOptions, sweeps: usize) -> (String, usize) {
		let mut out = Vec::new();
		let source = (0..sweeps).map(|i| Ok(sweep(i as f64)));
		let recorded = write_stream(&mut out, source, options).unwrap();
		(String::from_utf8(out).unwrap(), recorded)
	}

	#[test]
	fn complex_notation() {
		assert_eq!(format_complex(RawSample::new(0.5, -0.25)), "(0.5-0.25j)");
		assert_eq!(format_complex(RawSample::new(-1.0, 0.0)), "(-1+0j)");
		assert_eq!(parse_complex("(0.5-0.25j)"), Some(RawSample::new(0.5, -0.25)));
		assert_eq!(parse_complex("(1e-05+2.5E-3j)"), Some(RawSample::new(1e-5, 2.5e-3)));
		assert_eq!(parse_complex("(-1.5e+2-3j)"), Some(RawSample::new(-150.0, -3.0)));
		assert_eq!(parse_complex("-2j"), Some(RawSample::new(0.0, -2.0)));
		assert_eq!(parse_complex(" 3 "), Some(RawSample::new(3.0, 0.0)));
		assert_eq!(parse_complex("(1+j)"), None);
		assert_eq!(parse_complex("S11"), None);
	}

	#[test]
	fn leading_sweeps_are_skipped() {
		let mut options = RecordOptions::new();
		options.skip_start(1);
		let (text, recorded) = record(&options, 3);
		assert_eq!(recorded, 2);
		let lines: Vec<_> = text.lines().collect();
		assert_eq!(lines[0], "S11,S21,Freq");
		assert_eq!(lines[1], "sweepnumber: ,0");
		assert_eq!(lines[2], "sweepnumber: ,1");
		assert_eq!(lines[3], "(1.5-0.25j),(0.001+0j),1000000");
		assert_eq!(lines[4], "(-0.125+0.0000001j),(0-2j),2000000");
		assert_eq!(lines[5], "sweepnumber: ,2");
		assert_eq!(lines.len(), 8);
	}

	#[test]
	fn sweep_limit() {
		let mut options = RecordOptions::new();
		options.skip_start(2).sweeps(Some(1));
		let (text, recorded) = record(&options, 10);
		assert_eq!(recorded, 1);
		// Three dividers, then the one recorded sweep.
		assert_eq!(text.lines().count(), 1 + 3 + 2);
		assert!(text.lines().last().unwrap().ends_with(",2000000"));
	}

	#[test]
	fn failures_end_the_recording() {
		let mut options = RecordOptions::new();
		options.skip_start(0);
		let source = vec![
			Ok(sweep(0.0)),
			Err(MalformedResponseError::new("<re> <im>", "?").into()),
			Ok(sweep(1.0)),
		];
		let mut out = Vec::new();
		let err = write_stream(&mut out, source, &options).unwrap_err();
		assert!(matches!(err, Error::MalformedResponse(_)));
		let text = String::from_utf8(out).unwrap();
		assert_eq!(text.lines().count(), 1 + 1 + 2);
	}

	#[test]
	fn replay_recovers_recorded_sweeps() {
		let mut options = RecordOptions::new();
		options.skip_start(1);
		let (text, _) = record(&options, 3);
		let sweeps = read_stream(text.as_bytes())
			.collect::<Result<Vec<_>, _>>()
			.unwrap();
		// The skipped sweep's divider is followed directly by the next one.
		assert_eq!(sweeps, [sweep(1.0), sweep(2.0)]);
	}

	#[test]
	fn replay_with_custom_divider() {
		let text = "S11,S21,Freq\n--- sweep,0\n(1+0j),0j,5\n(0+1j),(0-1j),6\n--- sweep,1\n2,3,7\n";
		let sweeps: Vec<_> = read_stream(text.as_bytes())
			.with_divider("--- sweep")
			.map(Result::unwrap)
			.collect();
		assert_eq!(sweeps.len(), 2);
		assert_eq!(sweeps[0].frequencies().collect::<Vec<_>>(), [5, 6]);
		assert_eq!(sweeps[0].through()[1].z(), RawSample::new(0.0, -1.0));
		assert_eq!(sweeps[1].reflection()[0].z(), RawSample::new(2.0, 0.0));
	}

	#[test]
	fn malformed_rows_end_the_replay() {
		let text = "S11,S21,Freq\nsweepnumber: ,0\n(1+0j),(0+1j),5\n(1+0j),oops,6\n(1+0j),(0+1j),7\n";
		let mut replay = read_stream(text.as_bytes());
		let err = replay.next().unwrap().unwrap_err();
		match err {
			Error::MalformedResponse(e) => assert!(e.line().contains("oops")),
			e => panic!("unexpected error {e}"),
		}
		assert!(replay.next().is_none());
	}
}
