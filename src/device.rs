//! Sessions with a connected instrument.
//!
//! [`DeviceOptions::connect`] works out which instrument is on a
//! [`Transport`], reads its version and discovers its features, and returns a
//! [`Device`]. The device then translates sweep, bandwidth and read requests
//! into whichever dialect the instrument speaks:
//!
//! ```rust
//! # use nanovna::{device::DeviceOptions, Channel};
//! # use std::time::Duration;
//! # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
//! let mut device = DeviceOptions::new()
//!     .wait(Duration::from_millis(50))
//!     .validate_input(true)
//!     .open("/dev/ttyACM0")?;
//! println!("connected to {} {}", device.session().name(), device.session().version());
//!
//! device.set_sweep(50_000_000, 150_000_000)?;
//! let frequencies = device.read_frequencies()?;
//! let s11 = device.read_values(Channel::Reflection)?;
//! # Ok(())
//! # }
//! ```

mod detect;
#[cfg(any(test, feature = "mock"))]
mod scripted;
mod variant;
mod version;

pub use detect::{available_ports, detect_identity, identify, read_banner, usb_family, Identity, PortInfo};
pub use variant::{
	Capabilities, Dialect, Encoding, ResetSweep, Screen, SweepForm, SweepSelection, Variant,
};
pub use version::Version;
#[cfg(any(test, feature = "mock"))]
pub use scripted::ScriptedVna;

use crate::{
	backend::{Backend, Serial},
	binary::{self, register, SweepProgram, TxPower},
	error::{
		CommandRejectedError, Error, FirmwareUpdateModeError, InvalidSweepError,
		MalformedResponseError, SerialDeviceInUseOrDisconnectedError, UnsupportedBandwidthError,
		UnsupportedDatapointsError, UnsupportedFeatureError,
	},
	line::{self, Timing},
	transport::Transport,
	Channel, RawSample,
};
use std::{collections::BTreeSet, fmt, io, thread, time::Duration};

/// The sweep range used when the instrument cannot report its own, in Hz.
const FALLBACK_RANGE: (u64, u64) = (27_000_000, 30_000_000);
/// The initial sweep programmed into a NanoVNA-V2: start and step, in Hz.
const V2_INITIAL_SWEEP: (u64, f64) = (200_000_000, 1_000_000.0);
/// How long a screen dump may take to arrive.
const CAPTURE_TIMEOUT: Duration = Duration::from_secs(4);
/// The shortest wait that is known to be reliable.
const MIN_RELIABLE_WAIT: Duration = Duration::from_millis(50);

/// A capability tag discovered when a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Feature {
	/// The `sn` command reports a serial number.
	SerialNumber,
	/// The `bandwidth` command sets the IF bandwidth.
	Bandwidth,
	/// More than one datapoint count is accepted.
	CustomizableDatapoints,
	/// Sweeps are programmed with `scan`.
	ScanCommand,
	/// `scan` accepts a channel mask.
	ScanMaskCommand,
	/// More than one value per frequency.
	MultiDataPoints,
	/// The first point of each sweep is garbage and is swept twice.
	S21Hack,
	/// The output power can be set over part of the range.
	SetTxPowerPartial,
	/// On-device averaging.
	SetAverage,
	/// The screen can be captured.
	Screenshots,
}

impl Feature {
	/// A human readable name.
	pub const fn name(self) -> &'static str {
		match self {
			Feature::SerialNumber => "SN",
			Feature::Bandwidth => "Bandwidth",
			Feature::CustomizableDatapoints => "Customizable data points",
			Feature::ScanCommand => "Scan command",
			Feature::ScanMaskCommand => "Scan mask command",
			Feature::MultiDataPoints => "Multi data points",
			Feature::S21Hack => "S21 hack",
			Feature::SetTxPowerPartial => "Set TX power partial",
			Feature::SetAverage => "Set Average",
			Feature::Screenshots => "Screenshots",
		}
	}
}

impl fmt::Display for Feature {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.name())
	}
}

/// Nominal bandwidths, in Hz, and the register values Dislord firmware
/// expects for them.
pub const DISLORD_BANDWIDTHS: [(u32, u32); 11] = [
	(10, 363),
	(33, 117),
	(50, 78),
	(100, 39),
	(200, 19),
	(250, 15),
	(333, 11),
	(500, 7),
	(1000, 3),
	(2000, 1),
	(4000, 0),
];

/// How the `bandwidth` command expects its argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BandwidthMethod {
	/// The bandwidth in Hz.
	Ttrftech,
	/// A divider looked up in [`DISLORD_BANDWIDTHS`].
	Dislord,
}

impl BandwidthMethod {
	/// The argument sent for `bandwidth`, in Hz.
	pub fn encode(self, bandwidth: u32) -> Result<u32, UnsupportedBandwidthError> {
		match self {
			BandwidthMethod::Ttrftech if bandwidth > 0 => Ok(bandwidth),
			BandwidthMethod::Ttrftech => Err(UnsupportedBandwidthError::new(bandwidth)),
			BandwidthMethod::Dislord => DISLORD_BANDWIDTHS
				.iter()
				.find(|&&(nominal, _)| nominal == bandwidth)
				.map(|&(_, value)| value)
				.ok_or(UnsupportedBandwidthError::new(bandwidth)),
		}
	}
}

/// Options for connecting to an instrument.
///
/// ## Example
///
/// ```rust
/// # use nanovna::{device::DeviceOptions, transport::Transport};
/// # use std::time::Duration;
/// # fn wrapper() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = Transport::open_serial("/dev/ttyACM0")?;
/// let device = DeviceOptions::new()
///     .detect_retries(5)
///     .connect(transport)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DeviceOptions {
	/// The base pause between protocol steps.
	wait: Duration,
	/// How long the V2 takes to answer an identity register read.
	version_settle: Duration,
	/// Whether read samples are checked for plausibility.
	validate_input: bool,
	/// How many times to poke the instrument before giving up on detection.
	detect_retries: u32,
}

impl DeviceOptions {
	/// Create the default options.
	///
	/// The defaults are a 50 ms wait, a 2 s identity settle time, no input
	/// validation, and 3 detection attempts.
	pub fn new() -> Self {
		DeviceOptions {
			wait: MIN_RELIABLE_WAIT,
			version_settle: Duration::from_secs(2),
			validate_input: false,
			detect_retries: 3,
		}
	}

	/// Set the base pause between protocol steps.
	///
	/// Waits below 50 ms are accepted but may upset the serial link.
	pub fn wait(&mut self, wait: Duration) -> &mut Self {
		warn_short_wait(wait);
		self.wait = wait;
		self
	}

	/// Set how long the V2 takes to answer an identity register read.
	pub fn version_settle(&mut self, settle: Duration) -> &mut Self {
		self.version_settle = settle;
		self
	}

	/// Enable or disable the plausibility check on read samples.
	pub fn validate_input(&mut self, validate: bool) -> &mut Self {
		self.validate_input = validate;
		self
	}

	/// Set the number of detection attempts.
	pub fn detect_retries(&mut self, retries: u32) -> &mut Self {
		self.detect_retries = retries;
		self
	}

	/// Identify the instrument on `transport` and start a session with it.
	pub fn connect<B: Backend>(&self, transport: Transport<B>) -> Result<Device<B>, Error> {
		let variant = detect::identify(&transport, self.detect_retries, self.wait)?;
		self.connect_as(transport, variant)
	}

	/// Start a session, trusting that the instrument is a `variant`.
	pub fn connect_as<B: Backend>(&self, transport: Transport<B>, variant: Variant) -> Result<Device<B>, Error> {
		log::info!("connecting to {variant} on {}", transport.name());
		let mut device = Device {
			transport,
			settle: self.version_settle,
			session: Session::new(variant, self),
			cache: Vec::new(),
		};
		match device.session.capabilities.dialect {
			Dialect::Line => device.start_line()?,
			Dialect::Binary => device.start_binary()?,
		}
		log::debug!("features: {:?}", device.session.features);
		Ok(device)
	}

	/// Open the serial port at `path` and connect to the instrument on it.
	pub fn open(&self, path: &str) -> Result<Device<Serial>, Error> {
		let transport = Transport::open_serial(path)?;
		self.connect(transport)
	}

	/// Connect to the `index`th instrument found by [`available_ports`].
	pub fn open_nth(&self, index: usize) -> Result<Device<Serial>, Error> {
		let ports = available_ports()?;
		let Some(port) = ports.get(index) else {
			log::error!("NanoVNA not found, is it connected and turned on?");
			return Err(SerialDeviceInUseOrDisconnectedError::new(format!(
				"no instrument at index {index} ({} found)",
				ports.len()
			))
			.into());
		};
		log::info!("opening {} at {}", port.family, port.path);
		self.open(&port.path)
	}
}

impl Default for DeviceOptions {
	fn default() -> Self {
		DeviceOptions::new()
	}
}

fn warn_short_wait(wait: Duration) {
	if wait < MIN_RELIABLE_WAIT {
		log::warn!(
			"wait set to {} ms, below the standard {} ms; the serial link may misbehave",
			wait.as_millis(),
			MIN_RELIABLE_WAIT.as_millis()
		);
	}
}

/// The state of a session, as discovered at connect time and updated by the
/// sweep and bandwidth setters.
#[derive(Debug, Clone)]
pub struct Session {
	variant: Variant,
	capabilities: Capabilities,
	version: Version,
	board_revision: Option<Version>,
	features: BTreeSet<Feature>,
	bandwidth: u32,
	bandwidth_method: BandwidthMethod,
	datapoints: u32,
	valid_datapoints: &'static [u32],
	sweep_form: SweepForm,
	start: u64,
	stop: u64,
	/// The distance between frequencies of a register-programmed sweep.
	step: f64,
	max_frequency: u64,
	serial_number: Option<String>,
	wait: Duration,
	validate_input: bool,
}

impl Session {
	fn new(variant: Variant, options: &DeviceOptions) -> Self {
		let capabilities = variant.capabilities();
		let sweep_form = match capabilities.sweep_selection {
			SweepSelection::Fixed(form) => form,
			SweepSelection::ByVersion { floor } => floor,
		};
		Session {
			variant,
			capabilities,
			version: Version::default(),
			board_revision: None,
			features: capabilities
				.fixed_features
				.map(|fixed| fixed.iter().copied().collect())
				.unwrap_or_default(),
			bandwidth: 1000,
			bandwidth_method: BandwidthMethod::Ttrftech,
			datapoints: capabilities.valid_datapoints[0],
			valid_datapoints: capabilities.valid_datapoints,
			sweep_form,
			start: FALLBACK_RANGE.0,
			stop: FALLBACK_RANGE.1,
			step: 0.0,
			max_frequency: capabilities.max_frequency,
			serial_number: None,
			wait: options.wait,
			validate_input: options.validate_input,
		}
	}

	/// The instrument.
	pub fn variant(&self) -> Variant {
		self.variant
	}

	/// The instrument's display name.
	pub fn name(&self) -> &'static str {
		self.capabilities.name
	}

	/// What the instrument can do.
	pub fn capabilities(&self) -> &Capabilities {
		&self.capabilities
	}

	/// The firmware version.
	pub fn version(&self) -> &Version {
		&self.version
	}

	/// The board revision, for instruments that report one.
	pub fn board_revision(&self) -> Option<&Version> {
		self.board_revision.as_ref()
	}

	/// The discovered features.
	pub fn features(&self) -> &BTreeSet<Feature> {
		&self.features
	}

	/// Whether a feature was discovered.
	pub fn has(&self, feature: Feature) -> bool {
		self.features.contains(&feature)
	}

	/// The IF bandwidth, in Hz.
	pub fn bandwidth(&self) -> u32 {
		self.bandwidth
	}

	/// How the bandwidth is encoded.
	pub fn bandwidth_method(&self) -> BandwidthMethod {
		self.bandwidth_method
	}

	/// The number of points per sweep.
	pub fn datapoints(&self) -> u32 {
		self.datapoints
	}

	/// The accepted datapoint counts.
	pub fn valid_datapoints(&self) -> &'static [u32] {
		self.valid_datapoints
	}

	/// The command form used to program sweeps.
	pub fn sweep_form(&self) -> SweepForm {
		self.sweep_form
	}

	/// The programmed sweep range, in Hz.
	pub fn sweep_range(&self) -> (u64, u64) {
		(self.start, self.stop)
	}

	/// The highest frequency the instrument can sweep to, in Hz.
	pub fn max_frequency(&self) -> u64 {
		self.max_frequency
	}

	/// The frequency range the TX power setting applies to, if it can be set.
	pub fn tx_power_range(&self) -> Option<(u64, u64)> {
		self.has(Feature::SetTxPowerPartial)
			.then_some((TxPower::RANGE_START, self.max_frequency))
	}

	/// The serial number, if the instrument reports one.
	pub fn serial_number(&self) -> Option<&str> {
		self.serial_number.as_deref()
	}

	/// The base pause between protocol steps.
	pub fn wait(&self) -> Duration {
		self.wait
	}

	/// Whether read samples are checked for plausibility.
	pub fn validate_input(&self) -> bool {
		self.validate_input
	}

	fn timing(&self) -> Timing {
		Timing::new(self.wait, self.bandwidth, self.datapoints)
	}
}

/// A snapshot of what is known about a connected instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
	/// The instrument's display name.
	pub name: &'static str,
	/// The serial number, if reported.
	pub serial_number: Option<String>,
	/// The firmware version.
	pub version: Version,
	/// The discovered features.
	pub features: BTreeSet<Feature>,
	/// How the bandwidth is encoded.
	pub bandwidth_method: BandwidthMethod,
	/// The IF bandwidth, in Hz.
	pub bandwidth: u32,
	/// The accepted datapoint counts.
	pub valid_datapoints: &'static [u32],
	/// The smallest number of points per segment.
	pub points_min: u32,
	/// The name of the link.
	pub interface: String,
	/// The `info` banner, empty for instruments without one.
	pub banner: String,
}

impl fmt::Display for Info {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "Device: {}", self.name)?;
		writeln!(
			f,
			"Serial Number: {}",
			self.serial_number.as_deref().unwrap_or("NOT SUPPORTED")
		)?;
		writeln!(f, "Version: {}", self.version)?;
		let features: Vec<_> = self.features.iter().map(|f| f.name()).collect();
		writeln!(f, "Features: {}", features.join(", "))?;
		writeln!(f, "Bandwidth Method: {:?}", self.bandwidth_method)?;
		writeln!(f, "Bandwidth: {}", self.bandwidth)?;
		writeln!(f, "Valid Datapoints: {:?}", self.valid_datapoints)?;
		writeln!(f, "Minimum Sweep Points: {}", self.points_min)?;
		writeln!(f, "Interface: {}", self.interface)?;
		write!(f, "Info: {}", self.banner)
	}
}

/// A screen dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
	/// The geometry.
	pub screen: Screen,
	/// The pixels, row by row, as `0xAARRGGBB`.
	pub pixels: Vec<u32>,
}

impl Screenshot {
	/// Convert a big-endian RGB565 dump.
	pub fn from_rgb565(screen: Screen, bytes: &[u8]) -> Self {
		let pixels = bytes
			.chunks_exact(2)
			.map(|pair| {
				let v = u32::from(u16::from_be_bytes([pair[0], pair[1]]));
				0xFF00_0000 + ((v & 0xF800) << 8) + ((v & 0x07E0) << 5) + ((v & 0x001F) << 3)
			})
			.collect();
		Screenshot { screen, pixels }
	}
}

/// The operations the acquisition layers need from an instrument.
///
/// [`Device`] is the real implementation; tests substitute scripted ones.
pub trait Vna {
	/// The number of points per sweep.
	fn datapoints(&self) -> u32;
	/// Set the number of points per sweep.
	fn set_datapoints(&mut self, points: u32) -> Result<(), Error>;
	/// Whether read samples should be checked for plausibility.
	fn validate_input(&self) -> bool;
	/// Whether the link is open.
	fn is_connected(&self) -> bool;
	/// Program a sweep from `start` to `stop` Hz.
	fn set_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error>;
	/// Leave the instrument sweeping `start` to `stop` Hz on its own.
	fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error>;
	/// The frequencies of the programmed sweep.
	fn read_frequencies(&mut self) -> Result<Vec<u64>, Error>;
	/// The samples of one channel of the programmed sweep.
	fn read_values(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error>;
	/// Close and reopen the link.
	fn reconnect(&mut self) -> Result<(), Error>;
}

impl<V: Vna + ?Sized> Vna for &mut V {
	fn datapoints(&self) -> u32 {
		(**self).datapoints()
	}
	fn set_datapoints(&mut self, points: u32) -> Result<(), Error> {
		(**self).set_datapoints(points)
	}
	fn validate_input(&self) -> bool {
		(**self).validate_input()
	}
	fn is_connected(&self) -> bool {
		(**self).is_connected()
	}
	fn set_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		(**self).set_sweep(start, stop)
	}
	fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		(**self).reset_sweep(start, stop)
	}
	fn read_frequencies(&mut self) -> Result<Vec<u64>, Error> {
		(**self).read_frequencies()
	}
	fn read_values(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error> {
		(**self).read_values(channel)
	}
	fn reconnect(&mut self) -> Result<(), Error> {
		(**self).reconnect()
	}
}

/// A session with a connected instrument.
#[derive(Debug)]
pub struct Device<B: Backend> {
	transport: Transport<B>,
	/// How long the V2 takes to answer an identity register read.
	settle: Duration,
	session: Session,
	/// Both channels of the last sweep, for instruments that return them in
	/// one round trip.
	cache: Vec<(RawSample, RawSample)>,
}

impl<B: Backend> Device<B> {
	/// Identify the instrument on `transport` and start a session with the
	/// default options.
	pub fn connect(transport: Transport<B>) -> Result<Self, Error> {
		DeviceOptions::new().connect(transport)
	}

	/// The session state.
	pub fn session(&self) -> &Session {
		&self.session
	}

	/// The underlying transport.
	pub fn transport(&self) -> &Transport<B> {
		&self.transport
	}

	/// Change the base pause between protocol steps.
	pub fn set_wait(&mut self, wait: Duration) {
		warn_short_wait(wait);
		self.session.wait = wait;
	}

	/// Enable or disable the plausibility check on read samples.
	pub fn set_validate_input(&mut self, validate: bool) {
		self.session.validate_input = validate;
	}

	/// Run a line command and collect its output.
	fn exec(&self, command: &str) -> Result<Vec<String>, Error> {
		Ok(line::exec_collect(&self.transport, command, self.session.timing())?)
	}

	fn unsupported(&self, feature: &'static str) -> Error {
		UnsupportedFeatureError::new(feature, self.session.name()).into()
	}

	fn require_line(&self, operation: &'static str) -> Result<(), Error> {
		match self.session.capabilities.dialect {
			Dialect::Line => Ok(()),
			Dialect::Binary => Err(self.unsupported(operation)),
		}
	}

	fn start_line(&mut self) -> Result<(), Error> {
		self.session.version = self.read_version()?;
		self.read_features()?;
		// The current bandwidth cannot be read back, so start at the fastest.
		if self.session.has(Feature::Bandwidth) {
			if let Some(&highest) = self.bandwidths()?.last() {
				self.set_bandwidth(highest)?;
			}
		}
		log::debug!("setting initial start, stop");
		let (start, stop) = self.running_frequencies();
		self.session.start = start;
		self.session.stop = stop;
		Ok(())
	}

	fn read_version(&self) -> Result<Version, Error> {
		let lines = self.exec("version")?;
		log::debug!("version: {lines:?}");
		match lines.first() {
			Some(first) => Ok(Version::parse(first)),
			None => Err(MalformedResponseError::new("a version line", "").into()),
		}
	}

	fn read_features(&mut self) -> Result<(), Error> {
		if self.session.capabilities.fixed_features.is_some() {
			return Ok(());
		}
		let help = self.exec("help")?.join(" ");
		let words: Vec<&str> = help.split_whitespace().collect();
		if words.contains(&"sn:") {
			self.session.features.insert(Feature::SerialNumber);
			self.session.serial_number = Some(self.exec("sn")?.join(" "));
		}
		if words.contains(&"bandwidth") {
			self.session.features.insert(Feature::Bandwidth);
			if self.exec("bandwidth")?.join(" ").contains("Hz)") {
				self.session.bandwidth_method = BandwidthMethod::Dislord;
			}
		}
		if self.session.valid_datapoints.len() > 1 {
			self.session.features.insert(Feature::CustomizableDatapoints);
		}
		if let SweepSelection::ByVersion { floor } = self.session.capabilities.sweep_selection {
			let unlocked = SweepForm::for_version(&self.session.version);
			if let Some(feature) = unlocked.and_then(SweepForm::feature) {
				log::debug!("using {feature}");
				self.session.features.insert(feature);
			}
			self.session.sweep_form = unlocked.map_or(floor, |form| form.max(floor));
		}
		Ok(())
	}

	/// The sweep the instrument is already running, or a fallback.
	fn running_frequencies(&self) -> (u64, u64) {
		let read = self.exec("frequencies").and_then(|lines| parse_frequencies(&lines));
		match read {
			Ok(frequencies) if !frequencies.is_empty() => {
				(frequencies[0], frequencies[frequencies.len() - 1])
			}
			Ok(_) => FALLBACK_RANGE,
			Err(e) => {
				log::warn!("{e} reading frequencies");
				log::info!("falling back to generic");
				FALLBACK_RANGE
			}
		}
	}

	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn start_binary(&mut self) -> Result<(), Error> {
		let [major, minor] = binary::read_register_pair(
			&self.transport,
			register::FW_MAJOR,
			register::FW_MINOR,
			self.settle,
		)?;
		let version = Version::new(major.into(), 0, minor.into());
		log::debug!("read_version: {version}");
		if major == 0xFF {
			return Err(FirmwareUpdateModeError.into());
		}
		self.session.version = version;

		let [variant, revision] = binary::read_register_pair(
			&self.transport,
			register::DEVICE_VARIANT,
			register::HARDWARE_REVISION,
			self.settle,
		)?;
		let board = Version::new(variant.into(), 0, revision.into());
		log::debug!("read_board_revision: {board}");
		let session = &mut self.session;
		session.features.insert(Feature::CustomizableDatapoints);
		session.features.insert(Feature::MultiDataPoints);
		session.max_frequency = if board >= Version::new(2, 0, 4) {
			4_400_000_000
		} else {
			3_000_000_000
		};
		session.board_revision = Some(board);
		if session.version <= Version::new(1, 0, 1) {
			log::debug!("hack for s21 oddity in first sweeppoint");
			session.features.insert(Feature::S21Hack);
			session.valid_datapoints = variant::V2_HACK_POINTS;
		}
		if session.version >= Version::new(1, 0, 2) {
			session.features.insert(Feature::SetTxPowerPartial);
			session.features.insert(Feature::SetAverage);
		}

		{
			let mut exchange = self.transport.lock()?;
			binary::reset_protocol(&mut exchange)?;
		}
		thread::sleep(self.session.wait);

		let (start, step) = V2_INITIAL_SWEEP;
		self.session.start = start;
		self.session.step = step;
		self.session.stop = start + (step * f64::from(self.session.datapoints - 1)) as u64;
		self.program()
	}

	/// Write the session's sweep to the V2's registers.
	#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	fn program(&self) -> Result<(), Error> {
		let points = u16::try_from(self.session.datapoints).map_err(|_| {
			UnsupportedDatapointsError::new(self.session.datapoints, self.session.valid_datapoints)
		})?;
		let program = SweepProgram::new(
			self.session.start,
			self.session.step as u64,
			points,
			self.session.has(Feature::S21Hack),
		);
		binary::program_sweep(&self.transport, &program, self.session.wait)?;
		Ok(())
	}

	/// Set the number of points per sweep, which must be one of
	/// [`Session::valid_datapoints`].
	pub fn set_datapoints(&mut self, points: u32) -> Result<(), Error> {
		if !self.session.valid_datapoints.contains(&points) {
			return Err(UnsupportedDatapointsError::new(points, self.session.valid_datapoints).into());
		}
		self.session.datapoints = points;
		Ok(())
	}

	/// The IF bandwidths the instrument offers, in Hz, ascending.
	pub fn bandwidths(&self) -> Result<Vec<u32>, Error> {
		log::debug!("get bandwidths");
		self.require_line("Bandwidth")?;
		if self.session.bandwidth_method == BandwidthMethod::Dislord {
			return Ok(DISLORD_BANDWIDTHS.iter().map(|&(nominal, _)| nominal).collect());
		}
		let usage = self.exec("bandwidth")?.join(" ");
		parse_bandwidths(&usage)
	}

	/// Set the IF bandwidth, in Hz.
	pub fn set_bandwidth(&mut self, bandwidth: u32) -> Result<(), Error> {
		self.require_line("Bandwidth")?;
		let value = self.session.bandwidth_method.encode(bandwidth)?;
		let command = format!("bandwidth {value}");
		let result = self.exec(&command)?.join(" ");
		if self.session.bandwidth_method == BandwidthMethod::Ttrftech && !result.is_empty() {
			return Err(CommandRejectedError::new(command, result).into());
		}
		self.session.bandwidth = bandwidth;
		Ok(())
	}

	/// Program a sweep from `start` to `stop` Hz over the session's datapoints.
	pub fn set_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		match self.session.capabilities.dialect {
			Dialect::Line => self.set_line_sweep(start, stop),
			Dialect::Binary => self.set_binary_sweep(start, stop),
		}
	}

	fn set_line_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		self.session.start = start;
		self.session.stop = stop;
		let points = self.session.datapoints;
		let caps = self.session.capabilities;
		if caps.program_with_scan {
			self.exec(&format!("scan {start} {stop} {points}"))?;
		} else {
			match self.session.sweep_form {
				SweepForm::Sweep => {
					self.exec(&format!("sweep {start} {stop} {points}"))?;
				}
				SweepForm::Scan => {
					self.exec(&format!("scan {start} {stop} {points}"))?;
				}
				// The range is sent along with every masked read.
				SweepForm::ScanMask => {}
			}
		}
		if caps.trigger_after_sweep {
			self.exec("trigger auto")?;
		}
		Ok(())
	}

	#[allow(clippy::cast_precision_loss)]
	fn set_binary_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		if stop < start {
			return Err(InvalidSweepError::new(format!("stop {stop} Hz is below start {start} Hz")).into());
		}
		let intervals = f64::from(self.session.datapoints.saturating_sub(1).max(1));
		let step = (stop - start) as f64 / intervals;
		self.session.stop = stop;
		if start == self.session.start && step.to_bits() == self.session.step.to_bits() {
			return Ok(());
		}
		self.session.start = start;
		self.session.step = step;
		log::info!("NanoVNA-V2: set sweep start {start} step {step}");
		self.program()
	}

	/// Leave the instrument sweeping `start` to `stop` Hz on its own, for
	/// manual use once a segmented acquisition is over.
	pub fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		match self.session.capabilities.reset {
			ResetSweep::Ignore => Ok(()),
			ResetSweep::SweepAndResume => {
				let points = self.session.datapoints;
				self.exec(&format!("sweep {start} {stop} {points}"))?;
				self.exec("resume")?;
				Ok(())
			}
			ResetSweep::Reprogram => self.set_sweep(start, stop),
		}
	}

	/// The frequencies of the programmed sweep, in Hz.
	#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
	pub fn read_frequencies(&mut self) -> Result<Vec<u64>, Error> {
		log::debug!("read frequencies: {:?}", self.session.sweep_form);
		let session = &self.session;
		match session.capabilities.dialect {
			Dialect::Binary => Ok((0..session.datapoints)
				.map(|i| (session.start as f64 + f64::from(i) * session.step) as u64)
				.collect()),
			Dialect::Line if session.sweep_form == SweepForm::ScanMask => {
				let (start, stop) = (session.start, session.stop);
				let lines = self.exec(&format!("scan {start} {stop} {} 0b001", session.datapoints))?;
				parse_frequencies(&lines)
			}
			Dialect::Line => parse_frequencies(&self.exec("frequencies")?),
		}
	}

	/// The samples of one channel of the programmed sweep.
	///
	/// Instruments that return both channels at once are only read when the
	/// reflection channel is requested; the through channel is then served
	/// from that same read.
	pub fn read_values(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error> {
		log::debug!("reading {}", channel.command());
		let session = &self.session;
		let values = match (session.capabilities.dialect, session.capabilities.encoding) {
			(Dialect::Binary, _) => {
				if channel == Channel::Reflection {
					self.cache = binary::read_sweep(
						&self.transport,
						session.datapoints as usize,
						session.has(Feature::S21Hack),
						session.timing().pause(),
					)?;
				}
				self.cached(channel)
			}
			(Dialect::Line, Encoding::Decibel) => {
				if channel == Channel::Reflection {
					self.cache = self
						.exec(Channel::Reflection.command())?
						.iter()
						.map(|line| {
							let level = decibel_to_linear(line);
							(level, level)
						})
						.collect();
				}
				self.cached(channel)
			}
			(Dialect::Line, Encoding::Complex) if session.sweep_form == SweepForm::ScanMask => {
				if channel == Channel::Reflection {
					let (start, stop) = (session.start, session.stop);
					let command = format!("scan {start} {stop} {} 0b110", session.datapoints);
					self.cache = self
						.exec(&command)?
						.iter()
						.map(|line| parse_sample_pair(line))
						.collect::<Result<_, _>>()?;
				}
				self.cached(channel)
			}
			(Dialect::Line, Encoding::Complex) => self
				.exec(channel.command())?
				.iter()
				.map(|line| parse_sample(line).map_err(Into::into))
				.collect::<Result<_, Error>>()?,
		};
		log::debug!("done reading {} ({} values)", channel.command(), values.len());
		Ok(values)
	}

	fn cached(&self, channel: Channel) -> Vec<RawSample> {
		self.cache
			.iter()
			.map(|&(s11, s21)| match channel {
				Channel::Reflection => s11,
				Channel::Through => s21,
			})
			.collect()
	}

	/// A description of the firmware.
	pub fn read_firmware(&self) -> Result<String, Error> {
		match self.session.capabilities.dialect {
			Dialect::Line => {
				let result = self.exec("info")?.join("\n");
				log::debug!("result:\n{result}");
				Ok(result)
			}
			Dialect::Binary => {
				let board = self.session.board_revision.clone().unwrap_or_default();
				Ok(format!("HW: {board}\nFW: {}", self.session.version))
			}
		}
	}

	/// The serial number, if the instrument reports one.
	pub fn serial_number(&self) -> Option<&str> {
		self.session.serial_number()
	}

	/// The calibration the instrument itself holds, as it reports it.
	pub fn calibration_info(&self) -> Result<String, Error> {
		match self.session.capabilities.dialect {
			Dialect::Line => Ok(self.exec("cal")?.join(" ")),
			Dialect::Binary => Ok("Unknown".to_string()),
		}
	}

	/// A summary of the session, including the instrument's banner.
	pub fn info(&self) -> Result<Info, Error> {
		let banner = match self.session.capabilities.dialect {
			Dialect::Line => detect::read_banner(&self.transport, self.session.wait)?,
			Dialect::Binary => String::new(),
		};
		let session = &self.session;
		Ok(Info {
			name: session.name(),
			serial_number: session.serial_number.clone(),
			version: session.version.clone(),
			features: session.features.clone(),
			bandwidth_method: session.bandwidth_method,
			bandwidth: session.bandwidth,
			valid_datapoints: session.valid_datapoints,
			points_min: session.capabilities.points_min,
			interface: self.transport.name().to_string(),
			banner,
		})
	}

	/// Select the output power over [`Session::tx_power_range`].
	pub fn set_tx_power(&mut self, power: TxPower) -> Result<(), Error> {
		if !self.session.has(Feature::SetTxPowerPartial) {
			return Err(self.unsupported(Feature::SetTxPowerPartial.name()));
		}
		binary::set_tx_power(&self.transport, power)?;
		Ok(())
	}

	/// Capture the instrument's screen.
	pub fn capture_screenshot(&mut self) -> Result<Screenshot, Error> {
		self.require_line(Feature::Screenshots.name())?;
		let Some(screen) = self.session.capabilities.screen else {
			return Err(self.unsupported(Feature::Screenshots.name()));
		};
		let expected = screen.pixels() * 2;
		let mut exchange = self.transport.lock()?;
		exchange.drain()?;
		exchange.write(b"capture\r")?;
		// The echoed command.
		exchange.read_line()?;
		let bytes = exchange.timeout_guard(Some(CAPTURE_TIMEOUT))?.read(expected)?;
		if bytes.len() != expected {
			return Err(io::Error::new(
				io::ErrorKind::TimedOut,
				format!("screen capture returned {} of {expected} bytes", bytes.len()),
			)
			.into());
		}
		Ok(Screenshot::from_rgb565(screen, &bytes))
	}

	/// Close the link.
	pub fn disconnect(&self) -> Result<(), Error> {
		log::info!("disconnect {}", self.transport.name());
		Ok(self.transport.close()?)
	}

	/// Close the link, wait, and open it again.
	pub fn reconnect(&self) -> Result<(), Error> {
		Ok(self.transport.reconnect(self.session.wait)?)
	}

	/// Whether the link is open.
	pub fn is_connected(&self) -> bool {
		self.transport.is_open()
	}

	/// Consume the device, returning the transport.
	pub fn into_transport(self) -> Transport<B> {
		self.transport
	}
}

impl<B: Backend> Vna for Device<B> {
	fn datapoints(&self) -> u32 {
		self.session.datapoints
	}
	fn set_datapoints(&mut self, points: u32) -> Result<(), Error> {
		Device::set_datapoints(self, points)
	}
	fn validate_input(&self) -> bool {
		self.session.validate_input
	}
	fn is_connected(&self) -> bool {
		Device::is_connected(self)
	}
	fn set_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		Device::set_sweep(self, start, stop)
	}
	fn reset_sweep(&mut self, start: u64, stop: u64) -> Result<(), Error> {
		Device::reset_sweep(self, start, stop)
	}
	fn read_frequencies(&mut self) -> Result<Vec<u64>, Error> {
		Device::read_frequencies(self)
	}
	fn read_values(&mut self, channel: Channel) -> Result<Vec<RawSample>, Error> {
		Device::read_values(self, channel)
	}
	fn reconnect(&mut self) -> Result<(), Error> {
		Device::reconnect(self)
	}
}

/// Parse `bandwidth` usage such as `usage: bandwidth {10|30|100|300|1000}`.
fn parse_bandwidths(usage: &str) -> Result<Vec<u32>, Error> {
	let Some((_, options)) = usage.split_once(" {") else {
		return Ok(vec![1000]);
	};
	let options = options.split('}').next().unwrap_or(options);
	let mut bandwidths = options
		.split('|')
		.map(|option| {
			option
				.trim()
				.parse()
				.map_err(|_| MalformedResponseError::new("a bandwidth", option))
		})
		.collect::<Result<Vec<u32>, _>>()?;
	bandwidths.sort_unstable();
	Ok(bandwidths)
}

fn parse_frequencies(lines: &[String]) -> Result<Vec<u64>, Error> {
	lines
		.iter()
		.map(|line| {
			line.trim()
				.parse()
				.map_err(|_| MalformedResponseError::new("a frequency", line.as_str()).into())
		})
		.collect()
}

fn parse_floats<const N: usize>(line: &str, expected: &'static str) -> Result<[f64; N], MalformedResponseError> {
	let mut values = [0.0; N];
	let mut fields = line.split_whitespace();
	for value in &mut values {
		*value = fields
			.next()
			.and_then(|field| field.parse().ok())
			.ok_or_else(|| MalformedResponseError::new(expected, line))?;
	}
	if fields.next().is_some() {
		return Err(MalformedResponseError::new(expected, line));
	}
	Ok(values)
}

/// Parse a `"<re> <im>"` line.
fn parse_sample(line: &str) -> Result<RawSample, MalformedResponseError> {
	let [re, im] = parse_floats(line, "<re> <im>")?;
	Ok(RawSample::new(re, im))
}

/// Parse a `"<re0> <im0> <re1> <im1>"` scan-mask line.
fn parse_sample_pair(line: &str) -> Result<(RawSample, RawSample), MalformedResponseError> {
	let [re0, im0, re1, im1] = parse_floats(line, "<re0> <im0> <re1> <im1>")?;
	Ok((RawSample::new(re0, im0), RawSample::new(re1, im1)))
}

/// Convert a level in dB to a linear magnitude. Unreadable levels are zero.
fn decibel_to_linear(line: &str) -> RawSample {
	let magnitude = line
		.trim()
		.parse::<f64>()
		.map_or(0.0, |db| 10f64.powf(db / 20.0));
	RawSample::new(magnitude, 0.0)
}
