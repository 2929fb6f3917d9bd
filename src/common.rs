// SPDX-License-Identifier: Apache-2.0
//! Shared types and chip-level constants for the IMX294.

use core::fmt;

use crate::register::RegOp;

/// External clock (INCK) frequency this driver is written against.
///
/// All timing conversions in [`crate::timing`] assume the 24 MHz input clock
/// configuration from the datasheet; supplying a different clock produces
/// timing the conversion formulas do not describe.
pub const XCLK_FREQ: u32 = 24_000_000;

/// Width of the full pixel array, including dummy and optical black columns.
pub const NATIVE_WIDTH: u32 = 3792;

/// Height of the full pixel array.
pub const NATIVE_HEIGHT: u32 = 2840;

/// Left edge of the active pixel array within the native array.
pub const PIXEL_ARRAY_LEFT: u32 = 40;

/// Top edge of the active pixel array within the native array.
pub const PIXEL_ARRAY_TOP: u32 = 26;

/// Width of the active pixel array.
pub const PIXEL_ARRAY_WIDTH: u32 = 3840;

/// Height of the active pixel array.
pub const PIXEL_ARRAY_HEIGHT: u32 = 2160;

/// Width in pixels of the embedded metadata line the sensor emits.
pub const EMBEDDED_LINE_WIDTH: u32 = 16384;

/// Number of embedded metadata lines per frame.
pub const NUM_EMBEDDED_LINES: u32 = 1;

/// Media-bus code of the embedded metadata stream
/// (`MEDIA_BUS_FMT_SENSOR_DATA`).
pub const SENSOR_DATA_FORMAT_CODE: u32 = 0x7002;

/// Descriptor of the embedded metadata stream.
///
/// The metadata line is negotiated identically regardless of the active
/// readout mode, so it is a single constant rather than a per-mode value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MetadataFormat {
    pub width: u32,
    pub height: u32,
    pub code: u32,
}

/// The fixed embedded metadata stream descriptor.
pub const EMBEDDED_METADATA: MetadataFormat = MetadataFormat {
    width: EMBEDDED_LINE_WIDTH,
    height: NUM_EMBEDDED_LINES,
    code: SENSOR_DATA_FORMAT_CODE,
};

/// Marker newtype for 16-bit register addresses on the sensor's control bus.
#[derive(Clone, Copy, Eq, PartialEq, PartialOrd, Ord)]
pub struct Address(u16);

impl Address {
    /// Wrap the given address in an `Address`.
    ///
    /// This function is intended to be used in const contexts; elsewhere the
    /// [`From`][core::convert::From] implementations are probably easier to
    /// use.
    pub const fn new(address: u16) -> Self {
        Self(address)
    }

    pub(crate) fn as_bytes(&self) -> [u8; 2] {
        self.0.to_be_bytes()
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#06X})", self.0)
    }
}

impl From<u16> for Address {
    fn from(raw_address: u16) -> Self {
        Self::new(raw_address)
    }
}

impl From<Address> for u16 {
    fn from(address: Address) -> Self {
        address.0
    }
}

/// A rectangle within the native pixel array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Rect {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// The active pixel array as a rectangle within the native array.
pub const ACTIVE_ARRAY: Rect = Rect {
    left: PIXEL_ARRAY_LEFT,
    top: PIXEL_ARRAY_TOP,
    width: PIXEL_ARRAY_WIDTH,
    height: PIXEL_ARRAY_HEIGHT,
};

/// Power, clock and reset sequencing for the sensor module.
///
/// The driver only calls these at streaming-state transitions (and once
/// during attach, to identify the chip). Implementations must be
/// side-effect-complete when they return: after `power_on` the sensor has to
/// be out of reset, clocked, and past its start-up settle time, ready to
/// accept bus traffic. Both operations are assumed idempotent.
pub trait PowerControl {
    type Error;

    fn power_on(&mut self) -> Result<(), Self::Error>;

    fn power_off(&mut self) -> Result<(), Self::Error>;
}

/// The sensor variants this driver knows how to program.
///
/// Resolved once at attach time into a [`CompatibleConfig`]; the driver
/// never dispatches on the variant again afterwards.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SensorVariant {
    Imx294,
}

/// Per-variant configuration resolved from a [`SensorVariant`].
#[derive(Debug)]
pub struct CompatibleConfig {
    /// Value the chip ID register is expected to read back.
    pub chip_id: u8,

    /// Extra registers written right after the common program on stream
    /// start. Empty for the plain IMX294.
    pub extra_regs: &'static [RegOp],
}

static IMX294_CONFIG: CompatibleConfig = CompatibleConfig {
    chip_id: 0x00,
    extra_regs: &[],
};

impl SensorVariant {
    pub(crate) fn config(self) -> &'static CompatibleConfig {
        match self {
            SensorVariant::Imx294 => &IMX294_CONFIG,
        }
    }
}
