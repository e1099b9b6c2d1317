//! Error types.
//!
//! Each error is represented by a unique type that implements [`std::error::Error`].
//! However, most APIs return more than one kind of error and so will return one
//! of the higher level [enums](#enums), such as [`TransportError`], [`LineError`],
//! [`BinaryError`], or [`Error`]. The error types are convertible to the
//! higher level enums, allowing them to be used with `?`:
//!
//! ```
//! use nanovna::error::{Error, LineError};
//!
//! fn foo() -> Result<(), LineError> {
//!     // ...
//! # unimplemented!();
//! }
//!
//! fn bar() -> Result<(), Error> {
//!     foo()?;
//!     // ...
//! # Ok(())
//! }
//! ```
//!
//! Going the other way, [`TryFrom`] recovers a concrete error from an enum:
//!
//! ```
//! # use nanovna::error::{Error, ProtocolTimeoutError};
//! # fn wrapper(error: Error) {
//! if let Ok(timeout) = ProtocolTimeoutError::try_from(error) {
//!     println!("gave up after {} empty reads", timeout.retries());
//! }
//! # }
//! ```

/// Implement Error and Display traits for the specified type.
///
/// After the type define the format string and any arguments it should
/// reference after `self =>` (to abide by macro hygiene rules).
macro_rules! impl_error_display {
    (
        $name:path,
        $self:ident =>
        $display:literal
        $(,
            $($arg:expr),+
        )?
        $(,)?
    ) => {
        impl std::error::Error for $name {}

        impl std::fmt::Display for $name {
            fn fmt(&$self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(
                    f,
                    $display
                    $(,
                        $($arg),+
                    )?
                )
            }
        }
    };
}

/// Implement `is_timeout()` for an error enum.
///
/// Besides an io error of kind `TimedOut`, any of the listed variants count as
/// a timeout.
macro_rules! impl_is_timeout {
    ($name:ident $(, $variant:ident)* $(,)?) => {
        impl $name {
            /// A convenience function for determining if the error is due to the
            /// device not answering in time.
            pub fn is_timeout(&self) -> bool {
                match self {
                    $name::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
                    $(
                        $name::$variant(_) => true,
                    )*
                    #[allow(unreachable_patterns)]
                    _ => false,
                }
            }
        }
    };
}

macro_rules! impl_from_serialport_error {
    ($name:ident) => {
        impl From<serialport::Error> for $name {
            fn from(other: serialport::Error) -> Self {
                use std::io;

                match other.kind() {
                    serialport::ErrorKind::NoDevice => $name::SerialDeviceInUseOrDisconnected(
                        SerialDeviceInUseOrDisconnectedError(other.description.into_boxed_str()),
                    ),
                    serialport::ErrorKind::InvalidInput => $name::Io(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        other.description,
                    )),
                    serialport::ErrorKind::Unknown => {
                        $name::Io(io::Error::new(io::ErrorKind::Other, other.description))
                    }
                    serialport::ErrorKind::Io(kind) => {
                        $name::Io(io::Error::new(kind, other.description))
                    }
                }
            }
        }
    };
}

/// Define error enums that contain concrete error types (not other error enums).
///
/// From and TryFrom traits will be implemented for the enum and it's underlying
/// errors. The enum's Display implementation will defer to the underlying errors'
/// Display implementations.
///
/// Simple implementations of From and TryFrom with other error enums can be
/// added by appending a succinct impl block, which assumes that:
///   * it is being implemented for this error enum,
///   * each variant has a single tuple value, and can be converted to the value
///     in this enum with its own From implementation.
///
/// ```compile_fail
/// # // This fails to compile because the macro is not exported.
/// error_enum!{
///     // This defines the enum and From/TryFrom between ThisError and A and B.
///     #[non_exhaustive]
///     pub enum ThisError {
///         VariantA(A),
///         VariantB(B),
///         // ...
///     }
///
///     // This implements a simple From/TryFrom between ThisError and OtherType.
///     impl From<OtherType> {
///         FromVariantA => VariantA,
///         // ...
///     }
/// }
/// ```
macro_rules! error_enum {
    (
        $(#[$attr:meta])*
        pub enum $name:ident {
            $(
                $variant:ident($inner:path)
            ),+
            $(,)?
        }
        // Additional information for From/TryFrom impl blocks.
        $(
            impl From<$from_t:ident>
            {
                $($from_variant:ident => $to_variant:ident),+
                $(,)?
            }
        )*
    ) => {
        // Define the error enum itself
        $(
            #[$attr]
        )*
        #[allow(missing_docs)]
        pub enum $name {
            $(
                $variant($inner)
            ),+
        }

        impl std::error::Error for $name {}

        // Defer the display to the inner error type
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        $name::$variant(e) => e.fmt(f)
                    ),+
                }
            }
        }

        // Allow the enum to be convertible from an infallible error
        impl From<std::convert::Infallible> for $name {
            fn from(_: std::convert::Infallible) -> Self {
                unreachable!();
            }
        }

        // Conversions with underlying errors
        $(
            impl From<$inner> for $name {
                fn from(other: $inner) -> Self {
                    $name::$variant(other)
                }
            }

            impl TryFrom<$name> for $inner {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $name::$variant(value) => Ok(value),
                        #[allow(unreachable_patterns)]
                        value => Err(value)
                    }
                }
            }
        )+

        // Conversions from other enum errors
        $(
            impl From<$from_t> for $name {
                fn from(other: $from_t) -> Self {
                    match other {
                        $($from_t::$from_variant(e) => $name::$to_variant(From::from(e))),+
                    }
                }
            }

            impl TryFrom<$name> for $from_t {
                type Error = $name;
                fn try_from(other: $name) -> Result<Self, Self::Error> {
                    match other {
                        $(
                            $name::$to_variant(e) => Ok($from_t::$from_variant(From::from(e)))
                        ),+
                        ,
                        #[allow(unreachable_patterns)]
                        _ => Err(other)
                    }
                }

            }
        )*
    };
}

mod binary;
pub use binary::*;

mod line;
pub use line::*;

mod device;
pub use device::*;

mod all;
pub use all::*;

/// The specified device is either disconnected or already in use by another process.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SerialDeviceInUseOrDisconnectedError(Box<str>);

impl SerialDeviceInUseOrDisconnectedError {
    /// Create a new error with the given description.
    pub(crate) fn new<S: Into<String>>(description: S) -> Self {
        SerialDeviceInUseOrDisconnectedError(description.into().into_boxed_str())
    }
}

impl_error_display! {
    SerialDeviceInUseOrDisconnectedError,
    self =>
    "the specified device is either disconnected or already in use by another process: {}", self.0
}

/// The port was used while closed.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct PortClosedError(Box<str>);

impl PortClosedError {
    /// Create a new error for the named port.
    pub(crate) fn new<S: Into<String>>(name: S) -> Self {
        PortClosedError(name.into().into_boxed_str())
    }
}

impl_error_display! {
    PortClosedError,
    self => "the port {} is not open", self.0
}

/// A thread panicked while it held the transport or data lock.
///
/// The protected state may be half-updated, so the lock is not reused.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LockPoisonedError(&'static str);

impl LockPoisonedError {
    /// Create a new error naming the poisoned resource.
    pub(crate) const fn new(resource: &'static str) -> Self {
        LockPoisonedError(resource)
    }
}

impl_error_display! {
    LockPoisonedError,
    self => "the {} lock is poisoned", self.0
}

/// No recognizable firmware identity was received from the device.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct IdentityDetectionError(Box<[u8]>);

impl IdentityDetectionError {
    /// Create a new error holding whatever the device did respond with.
    pub(crate) fn new<R: AsRef<[u8]>>(response: R) -> Self {
        IdentityDetectionError(Box::from(response.as_ref()))
    }

    /// Get the raw bytes the device answered with, if any.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl_error_display! {
    IdentityDetectionError,
    self => "no recognizable device identity; the device responded with {:?}",
    String::from_utf8_lossy(&self.0)
}

error_enum! {
    /// Any error returned by the [`transport`](crate::transport) module.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum TransportError {
        SerialDeviceInUseOrDisconnected(SerialDeviceInUseOrDisconnectedError),
        Io(std::io::Error),
        PortClosed(PortClosedError),
        LockPoisoned(LockPoisonedError),
    }
}
impl_is_timeout! { TransportError }
impl_from_serialport_error! { TransportError }

#[cfg(test)]
mod test {
    use super::*;
    use static_assertions::assert_impl_all;

    assert_impl_all!(TransportError: From<std::io::Error>, From<serialport::Error>, Send, Sync);
    assert_impl_all!(PortClosedError: TryFrom<TransportError>);

    #[test]
    fn io_timeout_is_timeout() {
        let err: TransportError =
            std::io::Error::new(std::io::ErrorKind::TimedOut, "Simulated timeout error").into();
        assert!(err.is_timeout());
        let err: TransportError = PortClosedError::new("/dev/null").into();
        assert!(!err.is_timeout());
        assert_eq!(err.to_string(), "the port /dev/null is not open");
    }
}
