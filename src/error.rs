// SPDX-License-Identifier: Apache-2.0
#[cfg(feature = "std")]
extern crate std;

use core::fmt;

/// Errors that don't involve the bus or the power rails.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LibraryError {
    /// The requested media-bus code has no entry in the mode catalog.
    UnsupportedFormat(u32),

    /// A control value lies outside its currently advertised range.
    ///
    /// The range carried here is the advertised one at the time of the
    /// request; for exposure it may have been narrowed by an earlier
    /// vertical-blank change.
    ControlOutOfRange { value: u32, min: u32, max: u32 },

    /// The chip ID register read back an unexpected value at attach time.
    ChipIdMismatch { expected: u8, found: u8 },
}

impl fmt::Display for LibraryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LibraryError::UnsupportedFormat(code) => {
                write!(f, "unsupported media-bus format code {:#06X}", code)
            }
            LibraryError::ControlOutOfRange { value, min, max } => {
                write!(f, "control value {} outside [{}, {}]", value, min, max)
            }
            LibraryError::ChipIdMismatch { expected, found } => {
                write!(
                    f,
                    "chip ID mismatch: expected {:#04X}, found {:#04X}",
                    expected, found
                )
            }
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for LibraryError {}

/// All the ways a driver operation can fail.
///
/// `CommE` is the bus implementation's error type and `PowerE` the
/// [`PowerControl`][crate::PowerControl] implementation's. Keeping the
/// generics on the error types instead of the whole bus keeps signatures
/// usable with bus implementations that don't implement `Debug` themselves.
#[derive(Clone, Copy, Eq, PartialEq)]
pub enum Error<CommE, PowerE> {
    /// The bus transfer did not complete.
    I2c(CommE),

    /// The external power/clock/reset sequencer failed.
    Power(PowerE),

    /// Errors originating from within this library.
    Library(LibraryError),
}

impl<CommE, PowerE> fmt::Debug for Error<CommE, PowerE>
where
    CommE: fmt::Debug,
    PowerE: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(comm_error) => f.debug_tuple("Error::I2c").field(comm_error).finish(),
            Error::Power(power_error) => f.debug_tuple("Error::Power").field(power_error).finish(),
            Error::Library(err) => f.debug_tuple("Error::Library").field(err).finish(),
        }
    }
}

impl<CommE, PowerE> fmt::Display for Error<CommE, PowerE>
where
    CommE: fmt::Debug,
    PowerE: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(comm_error) => write!(f, "I2C error: {:?}", comm_error),
            Error::Power(power_error) => write!(f, "power sequencing error: {:?}", power_error),
            Error::Library(err) => write!(f, "{}", err),
        }
    }
}

#[cfg(feature = "std")]
impl<CommE, PowerE> std::error::Error for Error<CommE, PowerE>
where
    CommE: fmt::Debug,
    PowerE: fmt::Debug,
{
}

impl<CommE, PowerE> From<LibraryError> for Error<CommE, PowerE> {
    fn from(lib_err: LibraryError) -> Self {
        Self::Library(lib_err)
    }
}
