//! Error types for the text line protocol.

use super::{LockPoisonedError, PortClosedError, SerialDeviceInUseOrDisconnectedError, TransportError};

/// The device stopped answering a command before its prompt was received.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct ProtocolTimeoutError {
    command: Box<str>,
    retries: u32,
}

impl ProtocolTimeoutError {
    /// Create a new error.
    pub(crate) fn new<S: Into<String>>(command: S, retries: u32) -> Self {
        ProtocolTimeoutError {
            command: command.into().into_boxed_str(),
            retries,
        }
    }

    /// The command that went unanswered.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The number of empty reads performed before giving up.
    pub fn retries(&self) -> u32 {
        self.retries
    }
}

impl_error_display! {
    ProtocolTimeoutError,
    self => "too many retries ({}) waiting for the response to {:?}",
    self.retries,
    self.command
}

/// A response line could not be interpreted.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct MalformedResponseError {
    expected: &'static str,
    line: Box<str>,
}

impl MalformedResponseError {
    /// Create a new error.
    pub(crate) fn new<S: Into<String>>(expected: &'static str, line: S) -> Self {
        MalformedResponseError {
            expected,
            line: line.into().into_boxed_str(),
        }
    }

    /// The offending line.
    pub fn line(&self) -> &str {
        &self.line
    }
}

impl_error_display! {
    MalformedResponseError,
    self => "expected {} but received {:?}", self.expected, self.line
}

/// The device answered a setter command with an error message.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CommandRejectedError {
    command: Box<str>,
    message: Box<str>,
}

impl CommandRejectedError {
    /// Create a new error.
    pub(crate) fn new<C: Into<String>, M: Into<String>>(command: C, message: M) -> Self {
        CommandRejectedError {
            command: command.into().into_boxed_str(),
            message: message.into().into_boxed_str(),
        }
    }

    /// The device's message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl_error_display! {
    CommandRejectedError,
    self => "the device rejected {:?}: {}", self.command, self.message
}

error_enum! {
    /// Any error returned by the [`line`](crate::line) module.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum LineError {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        PortClosed(PortClosedError),
        LockPoisoned(LockPoisonedError),
        ProtocolTimeout(ProtocolTimeoutError),
        MalformedResponse(MalformedResponseError),
        CommandRejected(CommandRejectedError),
    }

    impl From<TransportError> {
        SerialDeviceInUseOrDisconnected => SerialDeviceInUseOrDisconnected,
        Io => Io,
        PortClosed => PortClosed,
        LockPoisoned => LockPoisoned,
    }
}
impl_is_timeout! { LineError, ProtocolTimeout }
impl_from_serialport_error! { LineError }

#[cfg(test)]
mod test {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(LineError: From<TransportError>, Send, Sync);
    assert_impl_all!(TransportError: TryFrom<LineError>);

    #[test]
    fn protocol_timeout_display() {
        let err = LineError::from(ProtocolTimeoutError::new("data 0", 41));
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "too many retries (41) waiting for the response to \"data 0\""
        );
    }
}
