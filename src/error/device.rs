//! Error types raised above the wire protocols: device sessions, calibration
//! and acquisition.

/// The requested bandwidth is not one the device (or its bandwidth method) supports.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct UnsupportedBandwidthError(u32);

impl UnsupportedBandwidthError {
    /// Create a new error.
    pub(crate) const fn new(bandwidth: u32) -> Self {
        UnsupportedBandwidthError(bandwidth)
    }

    /// The rejected bandwidth, in Hz.
    pub fn bandwidth(&self) -> u32 {
        self.0
    }
}

impl_error_display! {
    UnsupportedBandwidthError,
    self => "unsupported bandwidth: {} Hz", self.0
}

/// The requested number of datapoints is not valid for the device.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct UnsupportedDatapointsError {
    requested: u32,
    valid: Box<[u32]>,
}

impl UnsupportedDatapointsError {
    /// Create a new error.
    pub(crate) fn new(requested: u32, valid: &[u32]) -> Self {
        UnsupportedDatapointsError {
            requested,
            valid: Box::from(valid),
        }
    }

    /// The datapoint counts the device accepts.
    pub fn valid(&self) -> &[u32] {
        &self.valid
    }
}

impl_error_display! {
    UnsupportedDatapointsError,
    self => "unsupported datapoint count {} (valid: {:?})", self.requested, self.valid
}

/// Samples kept arriving outside the plausible range (or unparsable) after
/// every re-read and a reconnect.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct DataValidationError {
    channel: &'static str,
    attempts: u32,
}

impl DataValidationError {
    /// Create a new error.
    pub(crate) const fn new(channel: &'static str, attempts: u32) -> Self {
        DataValidationError { channel, attempts }
    }

    /// The number of reads attempted.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

impl_error_display! {
    DataValidationError,
    self => "failed reading {} {} times: data outside expected valid ranges or in an unexpected format",
    self.channel,
    self.attempts
}

/// A calibration was used before it was computed, or it is structurally invalid.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CalibrationStateError(Box<str>);

impl CalibrationStateError {
    /// Create a new error.
    pub fn new<S: Into<String>>(reason: S) -> Self {
        CalibrationStateError(reason.into().into_boxed_str())
    }
}

impl_error_display! {
    CalibrationStateError,
    self => "calibration unavailable: {}", self.0
}

/// Every read of a segment failed, so the run has nothing to publish.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct NoValidDataError {
    start: u64,
    stop: u64,
}

impl NoValidDataError {
    /// Create a new error.
    pub(crate) const fn new(start: u64, stop: u64) -> Self {
        NoValidDataError { start, stop }
    }
}

impl_error_display! {
    NoValidDataError,
    self => "no valid data during sweep of {} Hz to {} Hz", self.start, self.stop
}

/// The operation needs a capability the connected device does not have.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct UnsupportedFeatureError {
    feature: &'static str,
    device: &'static str,
}

impl UnsupportedFeatureError {
    /// Create a new error.
    pub(crate) const fn new(feature: &'static str, device: &'static str) -> Self {
        UnsupportedFeatureError { feature, device }
    }

    /// The name of the missing capability.
    pub fn feature(&self) -> &str {
        self.feature
    }
}

impl_error_display! {
    UnsupportedFeatureError,
    self => "{} does not support {}", self.device, self.feature
}

/// A sweep description that cannot be acquired.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct InvalidSweepError(Box<str>);

impl InvalidSweepError {
    /// Create a new error.
    pub(crate) fn new<S: Into<String>>(reason: S) -> Self {
        InvalidSweepError(reason.into().into_boxed_str())
    }
}

impl_error_display! {
    InvalidSweepError,
    self => "invalid sweep: {}", self.0
}
