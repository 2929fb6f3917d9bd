// SPDX-License-Identifier: Apache-2.0

use embedded_hal::blocking::delay::DelayMs;
use embedded_hal::blocking::i2c;
use paste::paste;

use crate::common::{
    Address, CompatibleConfig, MetadataFormat, PowerControl, Rect, SensorVariant, ACTIVE_ARRAY,
    EMBEDDED_METADATA, NATIVE_HEIGHT, NATIVE_WIDTH,
};
use crate::control::{ControlId, ControlRange, Controls, REPLAY_ORDER};
use crate::error::{Error, LibraryError};
use crate::mode::{modes_for_code, nearest_mode, FormatCode, Mode, MODES_12BIT};
use crate::register::{self, RegOp, HMAX_MAX, VMAX_MAX};
use crate::timing;

/// The frame-rate sub-divider. Kept as a formal parameter through the timing
/// engine, but no supported mode drives it past zero.
const SVR: u64 = 0;

/// DRY macro for the per-control getter pairs on `Imx294`.
///
/// Every control exposes its currently held value and its currently
/// advertised range; the range is re-derived from the active mode and frame
/// timing, so it can change after a mode or vertical-blank update.
macro_rules! control_accessors {
    { $field:ident, $value_doc:literal, $range_doc:literal } => {
        paste! {
            #[doc = $value_doc]
            pub fn $field(&self) -> u32 {
                self.controls.$field.value()
            }

            #[doc = $range_doc]
            pub fn [<$field _range>](&self) -> ControlRange {
                self.controls.$field.range()
            }
        }
    };
}

/// Result of a format negotiation: the geometry and encoding the sensor will
/// actually produce for a requested size.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FrameFormat {
    pub width: u32,
    pub height: u32,
    pub code: FormatCode,
    pub crop: Rect,
}

/// Control-plane driver for the IMX294.
///
/// Owns the register bus, the power sequencer, and every piece of mutable
/// device state; all mutation goes through `&mut self`, which is the
/// serialization domain. The driver tracks the sensor's register-observable
/// timing (HMAX/VMAX), the externally held control values, and the streaming
/// state machine:
///
/// * **Idle**: power may be on or off; no mode-specific register state is
///   programmed.
/// * **Streaming**: the sensor is producing frames; the common program has
///   been written this power cycle and the current mode and controls have
///   been pushed.
///
/// Control updates while the sensor is powered down are retained and
/// replayed on the next streaming start; they are not errors.
pub struct Imx294<I2C, PWR, D> {
    /// The control bus the sensor is accessible on.
    bus: I2C,

    /// The sensor's bus device address.
    address: u8,

    /// External power/clock/reset sequencing.
    power: PWR,

    /// Executes the settle pauses embedded in register programs.
    delay: D,

    /// Variant configuration resolved at attach time.
    config: &'static CompatibleConfig,

    /// The active readout mode.
    mode: &'static Mode,

    /// The negotiated pixel encoding.
    fmt_code: FormatCode,

    /// Current line length, in internal clock units.
    hmax: u16,

    /// Current frame length, in lines.
    vmax: u32,

    /// Externally held control values and advertised ranges.
    controls: Controls,

    streaming: bool,

    /// Whether the rails/clock are currently up.
    powered: bool,

    /// Whether the common program has been written this power cycle.
    common_regs_written: bool,

    /// Streaming intent preserved across suspend/resume.
    resume_streaming: bool,
}

impl<I2C, PWR, D, CommE> Imx294<I2C, PWR, D>
where
    I2C: i2c::Write<Error = CommE> + i2c::WriteRead<Error = CommE>,
    PWR: PowerControl,
    D: DelayMs<u8>,
{
    /// Attach to a sensor at the given bus address.
    ///
    /// Powers the module up, verifies the chip ID, selects the default
    /// format (the 4096x2160 mode in `SGBRG12`), and powers back down. A
    /// transport error or ID mismatch here is fatal to the attach; the
    /// caller must retry the whole call.
    pub fn new(
        bus: I2C,
        address: u8,
        power: PWR,
        delay: D,
        variant: SensorVariant,
    ) -> Result<Self, Error<CommE, PWR::Error>> {
        let mut sensor = Self {
            bus,
            address,
            power,
            delay,
            config: variant.config(),
            mode: &MODES_12BIT[0],
            fmt_code: FormatCode::Sgbrg12,
            hmax: MODES_12BIT[0].default_hmax as u16,
            vmax: MODES_12BIT[0].default_vmax as u32,
            controls: Controls::new(),
            streaming: false,
            powered: false,
            common_regs_written: false,
            resume_streaming: false,
        };
        sensor.power_up()?;
        if let Err(error) = sensor.identify() {
            let _ = sensor.power_down();
            return Err(error);
        }
        sensor.set_framing_limits();
        sensor.power_down()?;
        Ok(sensor)
    }

    /// Verify the chip ID register against the variant's expected value.
    fn identify(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        let found = self.read_reg(register::CHIP_ID, 1)? as u8;
        if found != self.config.chip_id {
            return Err(LibraryError::ChipIdMismatch {
                expected: self.config.chip_id,
                found,
            }
            .into());
        }
        Ok(())
    }

    /// Negotiate the frame format.
    ///
    /// `code` is a raw media-bus code; unknown codes are rejected with
    /// [`LibraryError::UnsupportedFormat`]. The nearest catalog mode is
    /// selected and, if it differs from the active one, the frame timing
    /// and all blanking/exposure ranges are reset to the new mode's
    /// defaults.
    pub fn set_format(
        &mut self,
        code: u32,
        width: u32,
        height: u32,
    ) -> Result<FrameFormat, Error<CommE, PWR::Error>> {
        let code = FormatCode::from_raw(code)?;
        let mode = nearest_mode(modes_for_code(code), width, height);
        if !core::ptr::eq(mode, self.mode) {
            self.mode = mode;
            self.set_framing_limits();
        }
        self.fmt_code = code;
        Ok(FrameFormat {
            width: mode.width,
            height: mode.height,
            code,
            crop: mode.crop,
        })
    }

    /// Reset frame timing and control ranges to the active mode's defaults.
    fn set_framing_limits(&mut self) {
        let mode = self.mode;
        self.vmax = mode.default_vmax as u32;
        self.hmax = mode.default_hmax as u16;

        let rate = timing::pixel_rate(mode);
        let default_hblank = timing::default_hblank(mode, rate) as u32;
        self.controls
            .hblank
            .modify_range(ControlRange::new(0, u32::from(HMAX_MAX), default_hblank));
        self.controls.hblank.set(default_hblank);

        let height = u64::from(mode.height);
        let default_vblank = (mode.default_vmax * mode.vmax_scale - height) as u32;
        self.controls.vblank.modify_range(ControlRange::new(
            (mode.min_vmax * mode.vmax_scale - height) as u32,
            (u64::from(VMAX_MAX) * mode.vmax_scale - height) as u32,
            default_vblank,
        ));
        self.controls.vblank.set(default_vblank);

        // The new frame timing moves the legal exposure window.
        self.refresh_exposure_range();
    }

    /// Re-derive the exposure bounds from the current HMAX/VMAX and clamp
    /// the held exposure into them.
    ///
    /// The advertised default follows the clamped current value, not the
    /// power-on default.
    fn refresh_exposure_range(&mut self) {
        let (min_exposure, max_exposure) = timing::exposure_bounds(
            u64::from(self.hmax),
            u64::from(self.vmax),
            self.mode.min_shr,
            SVR,
            self.mode.integration_offset,
        );
        let min = min_exposure as u32;
        let max = max_exposure as u32;
        let current = self.controls.exposure.value().clamp(min, max);
        self.controls
            .exposure
            .modify_range(ControlRange::new(min, max, current));
    }

    /// Set the vertical blanking interval.
    ///
    /// The frame length and the exposure limits it implies are re-derived
    /// (and the held exposure clamped) before anything reaches the device,
    /// so a subsequent exposure write can never race a stale range.
    pub fn set_vblank(&mut self, vblank: u32) -> Result<(), Error<CommE, PWR::Error>> {
        self.controls.vblank.check(vblank)?;
        self.controls.vblank.set(vblank);
        self.vmax = timing::vmax_from_vblank(self.mode, u64::from(vblank))
            .min(u64::from(VMAX_MAX)) as u32;
        self.refresh_exposure_range();
        if !self.powered {
            return Ok(());
        }
        self.apply_vblank()
    }

    /// Set the horizontal blanking interval.
    pub fn set_hblank(&mut self, hblank: u32) -> Result<(), Error<CommE, PWR::Error>> {
        self.controls.hblank.check(hblank)?;
        self.controls.hblank.set(hblank);
        let rate = timing::pixel_rate(self.mode);
        self.hmax = timing::hmax_from_hblank(self.mode, u64::from(hblank), rate)
            .min(u64::from(HMAX_MAX)) as u16;
        if !self.powered {
            return Ok(());
        }
        self.apply_hblank()
    }

    /// Set the exposure, in line-time units.
    pub fn set_exposure(&mut self, exposure: u32) -> Result<(), Error<CommE, PWR::Error>> {
        self.controls.exposure.check(exposure)?;
        self.controls.exposure.set(exposure);
        if !self.powered {
            return Ok(());
        }
        self.apply_exposure()
    }

    /// Set the analogue gain, in register units.
    pub fn set_analogue_gain(&mut self, gain: u32) -> Result<(), Error<CommE, PWR::Error>> {
        self.controls.analogue_gain.check(gain)?;
        self.controls.analogue_gain.set(gain);
        if !self.powered {
            return Ok(());
        }
        self.apply_analogue_gain()
    }

    fn apply_control(&mut self, id: ControlId) -> Result<(), Error<CommE, PWR::Error>> {
        match id {
            ControlId::Vblank => self.apply_vblank(),
            ControlId::Hblank => self.apply_hblank(),
            ControlId::Exposure => self.apply_exposure(),
            ControlId::AnalogueGain => self.apply_analogue_gain(),
        }
    }

    fn apply_vblank(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        // The PSSLVS group is 16 bits wide even though VMAX is not.
        let vblk = (u64::from(self.vmax) - self.mode.min_vmax).min(0xFFFF) as u16;
        #[cfg(feature = "defmt")]
        defmt::debug!("VMAX {} vblk {}", self.vmax, vblk);
        self.write_reg_3byte(register::VMAX, self.vmax)?;
        self.write_reg_2byte(register::PSSLVS1, vblk)?;
        self.write_reg_2byte(register::PSSLVS2, vblk)?;
        self.write_reg_2byte(register::PSSLVS3, vblk)?;
        self.write_reg_2byte(register::PSSLVS4, vblk.saturating_sub(5))?;
        self.write_reg_2byte(register::PSSLVS0, vblk)
    }

    fn apply_hblank(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        #[cfg(feature = "defmt")]
        defmt::debug!("HMAX {}", self.hmax);
        // Both horizontal counters must always mirror the line length.
        self.write_reg_2byte(register::HMAX, self.hmax)?;
        self.write_reg_2byte(register::HCOUNT1, self.hmax)?;
        self.write_reg_2byte(register::HCOUNT2, self.hmax)
    }

    fn apply_exposure(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        let shr = timing::shr_from_exposure(
            u64::from(self.controls.exposure.value()),
            u64::from(self.hmax),
            u64::from(self.vmax),
            SVR,
            self.mode.integration_offset,
        )
        .min(0xFFFF) as u16;
        #[cfg(feature = "defmt")]
        defmt::debug!("exposure {} SHR {}", self.controls.exposure.value(), shr);
        self.write_reg_2byte(register::SHR, shr)
    }

    fn apply_analogue_gain(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        self.write_reg_2byte(register::ANALOG_GAIN, self.controls.analogue_gain.value() as u16)
    }

    /// Transition Idle → Streaming.
    ///
    /// Powers the module up if needed, writes the common program once per
    /// power cycle, then the mode program, then replays every held control.
    /// On failure the sensor stays Idle with power left up; the caller
    /// decides whether to retry or power down.
    pub fn start_streaming(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        if self.streaming {
            return Ok(());
        }
        self.power_up()?;
        if !self.common_regs_written {
            self.write_program(register::COMMON_REGS)?;
            self.write_program(self.config.extra_regs)?;
            self.common_regs_written = true;
        }
        self.write_program(self.mode.registers)?;
        for id in REPLAY_ORDER {
            self.apply_control(id)?;
        }
        self.streaming = true;
        #[cfg(feature = "defmt")]
        defmt::debug!("streaming started");
        Ok(())
    }

    /// Transition Streaming → Idle and power the module down.
    ///
    /// The standby write is best-effort; its failure does not keep the
    /// sensor in the Streaming state.
    pub fn stop_streaming(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        if !self.streaming {
            return Ok(());
        }
        if let Err(_error) = self.write_reg_1byte(register::MODE_SELECT, register::MODE_STANDBY) {
            // Not fatal; the sensor is about to lose power anyway.
            #[cfg(feature = "defmt")]
            defmt::warn!("standby write failed");
        }
        self.streaming = false;
        self.power_down()
    }

    /// Record an externally observed loss of power.
    ///
    /// No bus access happens here (the rails are already down). Registers
    /// are volatile, so the common program is marked for rewrite and any
    /// active streaming state is abandoned.
    pub fn power_lost(&mut self) {
        self.streaming = false;
        self.powered = false;
        self.common_regs_written = false;
    }

    /// Stop streaming ahead of a system suspend, remembering the intent.
    pub fn suspend(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        self.resume_streaming = self.streaming;
        if self.streaming {
            self.stop_streaming()?;
        }
        Ok(())
    }

    /// Restart streaming after [`suspend`][Self::suspend] if it was active.
    pub fn resume(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        if !self.resume_streaming {
            return Ok(());
        }
        self.resume_streaming = false;
        self.start_streaming()
    }

    fn power_up(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        if !self.powered {
            self.power.power_on().map_err(Error::Power)?;
            self.powered = true;
        }
        Ok(())
    }

    fn power_down(&mut self) -> Result<(), Error<CommE, PWR::Error>> {
        // Flags are cleared regardless of the sequencer's result: after a
        // power_off attempt the register contents can no longer be trusted.
        self.powered = false;
        self.common_regs_written = false;
        self.power.power_off().map_err(Error::Power)
    }

    /// Whether the sensor is currently in the Streaming state.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// The active readout mode.
    pub fn mode(&self) -> &'static Mode {
        self.mode
    }

    /// The negotiated pixel encoding.
    pub fn format_code(&self) -> FormatCode {
        self.fmt_code
    }

    /// Analog crop rectangle of the active mode.
    pub fn crop(&self) -> Rect {
        self.mode.crop
    }

    /// Pixel rate of the active mode, in pixels per second.
    pub fn pixel_rate(&self) -> u64 {
        timing::pixel_rate(self.mode)
    }

    /// Descriptor of the embedded metadata stream, identical for all modes.
    pub fn embedded_metadata_format(&self) -> MetadataFormat {
        EMBEDDED_METADATA
    }

    /// Full native pixel-array size, as `(width, height)`.
    pub fn native_size(&self) -> (u32, u32) {
        (NATIVE_WIDTH, NATIVE_HEIGHT)
    }

    /// The active pixel array, for crop-bounds negotiation.
    pub fn active_array(&self) -> Rect {
        ACTIVE_ARRAY
    }

    /// Current line length, in internal clock units.
    pub fn hmax(&self) -> u16 {
        self.hmax
    }

    /// Current frame length, in lines.
    pub fn vmax(&self) -> u32 {
        self.vmax
    }

    control_accessors! {
        exposure,
        "Currently held exposure value, in line-time units.",
        "Currently advertised exposure range; narrows and widens with the frame timing."
    }
    control_accessors! {
        analogue_gain,
        "Currently held analogue gain, in register units.",
        "Advertised analogue gain range."
    }
    control_accessors! {
        vblank,
        "Currently held vertical blanking interval, in output lines.",
        "Advertised vertical blank range for the active mode."
    }
    control_accessors! {
        hblank,
        "Currently held horizontal blanking interval, in pixels.",
        "Advertised horizontal blank range for the active mode."
    }

    /// Execute a register program, pausing in-line at each settle delay.
    fn write_program(&mut self, program: &'static [RegOp]) -> Result<(), Error<CommE, PWR::Error>> {
        for op in program {
            match *op {
                RegOp::Write { address, value } => self.write_reg_1byte(address, value)?,
                RegOp::Delay { millis } => self.delay.delay_ms(millis),
            }
        }
        Ok(())
    }

    /// Read a register value of 1 to 4 bytes, big-endian.
    fn read_reg(&mut self, address: Address, len: usize) -> Result<u32, Error<CommE, PWR::Error>> {
        debug_assert!((1..=4).contains(&len));
        let mut buf = [0u8; 4];
        self.bus
            .write_read(self.address, &address.as_bytes(), &mut buf[4 - len..])
            .map_err(Error::I2c)?;
        Ok(u32::from_be_bytes(buf))
    }

    fn write_reg_1byte(&mut self, address: Address, value: u8) -> Result<(), Error<CommE, PWR::Error>> {
        let a = address.as_bytes();
        self.bus
            .write(self.address, &[a[0], a[1], value])
            .map_err(Error::I2c)
    }

    /// Multi-byte register values go out little-endian after the big-endian
    /// address, in one transfer.
    fn write_reg_2byte(&mut self, address: Address, value: u16) -> Result<(), Error<CommE, PWR::Error>> {
        let a = address.as_bytes();
        let v = value.to_le_bytes();
        self.bus
            .write(self.address, &[a[0], a[1], v[0], v[1]])
            .map_err(Error::I2c)
    }

    fn write_reg_3byte(&mut self, address: Address, value: u32) -> Result<(), Error<CommE, PWR::Error>> {
        let a = address.as_bytes();
        let v = value.to_le_bytes();
        self.bus
            .write(self.address, &[a[0], a[1], v[0], v[1], v[2]])
            .map_err(Error::I2c)
    }
}
