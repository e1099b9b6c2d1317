//! The crate-wide error type.

use super::*;

error_enum! {
    /// Any error returned by this library.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum Error {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        PortClosed(PortClosedError),
        LockPoisoned(LockPoisonedError),
        ProtocolTimeout(ProtocolTimeoutError),
        MalformedResponse(MalformedResponseError),
        CommandRejected(CommandRejectedError),
        FifoShortRead(FifoShortReadError),
        IdentityDetection(IdentityDetectionError),
        FirmwareUpdateMode(FirmwareUpdateModeError),
        UnsupportedBandwidth(UnsupportedBandwidthError),
        UnsupportedDatapoints(UnsupportedDatapointsError),
        DataValidation(DataValidationError),
        CalibrationState(CalibrationStateError),
        NoValidData(NoValidDataError),
        UnsupportedFeature(UnsupportedFeatureError),
        InvalidSweep(InvalidSweepError),
        Csv(csv::Error),
    }

    impl From<TransportError> {
        SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
        Io => Io,
        PortClosed => PortClosed,
        LockPoisoned => LockPoisoned,
    }

    impl From<LineError> {
        SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
        Io => Io,
        PortClosed => PortClosed,
        LockPoisoned => LockPoisoned,
        ProtocolTimeout => ProtocolTimeout,
        MalformedResponse => MalformedResponse,
        CommandRejected => CommandRejected,
    }

    impl From<BinaryError> {
        SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
        Io => Io,
        PortClosed => PortClosed,
        LockPoisoned => LockPoisoned,
        FifoShortRead => FifoShortRead,
        IdentityDetection => IdentityDetection,
    }
}
impl_is_timeout! { Error, ProtocolTimeout, FifoShortRead }
impl_from_serialport_error! { Error }

impl Error {
    /// Whether the error only spoils the current command, so that the
    /// acquisition may abandon the sample and try again.
    pub fn is_recoverable(&self) -> bool {
        self.is_timeout()
    }
}
