// SPDX-License-Identifier: Apache-2.0
//! A pure-Rust control-plane driver for the Sony IMX294 CMOS image sensor.
//!
//! The IMX294 is a 10.7 MP rolling-shutter sensor programmed over a
//! register-oriented control bus. This crate covers the control plane only:
//! the catalog of readout modes, the HMAX/VMAX/SHR timing algebra that turns
//! exposure and blanking requests into register values, and the streaming
//! state machine with its power-sequencing contract. Pixel data leaves the
//! sensor over MIPI CSI-2 and never passes through here.
//!
//! The bus is abstracted over the [`embedded-hal`][embedded-hal] blocking
//! I²C traits, and power/clock/reset sequencing over the [`PowerControl`]
//! trait, so the driver runs anywhere those are implemented. The crate is
//! `no_std` compatible.
//!
//! [embedded-hal]: https://docs.rs/embedded-hal/0.2/embedded_hal/blocking/i2c/index.html
//!
//! # Usage
//! ```ignore
//! use imx294::{Imx294, SensorVariant};
//!
//! let mut sensor = Imx294::new(i2c_bus, 0x1A, power, delay, SensorVariant::Imx294)?;
//! // Negotiate the 4096x2160 mode in 12-bit SRGGB.
//! let format = sensor.set_format(0x3012, 4096, 2160)?;
//! // Exposure limits derive from the frame timing; ask before setting.
//! let range = sensor.exposure_range();
//! sensor.set_exposure(range.default)?;
//! sensor.start_streaming()?;
//! ```
//!
//! # Timing model
//! The sensor exposes its frame timing through three registers: HMAX (line
//! length), VMAX (frame length) and SHR (a shutter row count that counts
//! down from the frame length). Upstream consumers deal in blanking
//! intervals and exposure instead; the conversions live in [`timing`] and
//! are exact integer reproductions of the datasheet formulas. Because the
//! legal exposure window depends on the frame length, every vertical-blank
//! change re-derives the advertised exposure range and re-clamps the held
//! exposure value before anything is written to the device.
//!
//! # Power and streaming
//! Registers are volatile: the common init program is rewritten once per
//! power cycle, tracked by the driver. Control values set while the sensor
//! is powered down are retained and replayed on the next streaming start,
//! in timing-first order. See [`Imx294`] for the state machine details.

#![no_std]

pub mod common;
pub mod control;
pub mod driver;
pub mod error;
pub mod mode;
pub mod register;
#[cfg(test)]
mod test;
pub mod timing;

pub use common::{
    Address, MetadataFormat, PowerControl, Rect, SensorVariant, ACTIVE_ARRAY, EMBEDDED_METADATA,
    XCLK_FREQ,
};
pub use control::ControlRange;
pub use driver::{FrameFormat, Imx294};
pub use error::{Error, LibraryError};
pub use mode::{modes_for_code, nearest_mode, FormatCode, Mode};
pub use register::RegOp;
