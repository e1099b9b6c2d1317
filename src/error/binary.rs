//! Error types for the binary register/FIFO protocol.

use super::{
    IdentityDetectionError, LockPoisonedError, PortClosedError,
    SerialDeviceInUseOrDisconnectedError, TransportError,
};

/// A FIFO batch was still short after the supplemental read.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FifoShortReadError {
    expected: usize,
    received: usize,
}

impl FifoShortReadError {
    /// Create a new error.
    pub(crate) const fn new(expected: usize, received: usize) -> Self {
        FifoShortReadError { expected, received }
    }

    /// The number of bytes requested.
    pub fn expected(&self) -> usize {
        self.expected
    }

    /// The number of bytes actually received.
    pub fn received(&self) -> usize {
        self.received
    }
}

impl_error_display! {
    FifoShortReadError,
    self => "expected {} FIFO bytes, got {}", self.expected, self.received
}

/// The device reported the firmware-update (DFU) major version.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct FirmwareUpdateModeError;

impl_error_display! {
    FirmwareUpdateModeError,
    self => "the device is in firmware update (DFU) mode"
}

error_enum! {
    /// Any error returned by the [`binary`](crate::binary) module.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum BinaryError {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        PortClosed(PortClosedError),
        LockPoisoned(LockPoisonedError),
        FifoShortRead(FifoShortReadError),
        IdentityDetection(IdentityDetectionError),
    }

    impl From<TransportError> {
        SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
        Io => Io,
        PortClosed => PortClosed,
        LockPoisoned => LockPoisoned,
    }
}
impl_is_timeout! { BinaryError, FifoShortRead }
impl_from_serialport_error! { BinaryError }
