// SPDX-License-Identifier: Apache-2.0
//! The catalog of supported readout modes.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::common::Rect;
use crate::error::LibraryError;
use crate::register::{
    RegOp, MODE_0_14BIT_REGS, MODE_0_REGS, MODE_1A_REGS, MODE_1B_REGS, MODE_1_REGS,
};

/// Media-bus pixel encodings the sensor can be negotiated to.
///
/// The raw values are the Linux `MEDIA_BUS_FMT_*` codes for the four Bayer
/// orders at each supported bit depth. An unknown raw code fails conversion
/// and surfaces as [`LibraryError::UnsupportedFormat`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum FormatCode {
    Sbggr12 = 0x3008,
    Sgbrg12 = 0x3010,
    Sgrbg12 = 0x3011,
    Srggb12 = 0x3012,
    Sbggr14 = 0x3019,
    Sgbrg14 = 0x301A,
    Sgrbg14 = 0x301B,
    Srggb14 = 0x301C,
}

impl FormatCode {
    /// Map a raw media-bus code onto a supported encoding.
    pub fn from_raw(code: u32) -> Result<Self, LibraryError> {
        Self::try_from(code).map_err(|_| LibraryError::UnsupportedFormat(code))
    }

    /// Bits per sample for this encoding.
    pub fn bit_depth(self) -> u8 {
        match self {
            FormatCode::Sbggr12
            | FormatCode::Sgbrg12
            | FormatCode::Sgrbg12
            | FormatCode::Srggb12 => 12,
            FormatCode::Sbggr14
            | FormatCode::Sgbrg14
            | FormatCode::Sgrbg14
            | FormatCode::Srggb14 => 14,
        }
    }
}

/// One fixed readout configuration: output geometry, the timing constants
/// the conversions in [`crate::timing`] work from, and the register program
/// that selects it.
#[derive(Debug)]
pub struct Mode {
    /// Output frame width, crop padding included.
    pub width: u32,

    /// Output frame height, crop padding included.
    pub height: u32,

    /// Shortest legal line length, in internal clock units.
    pub min_hmax: u64,

    /// Shortest legal frame length, in lines.
    pub min_vmax: u64,

    pub default_hmax: u64,

    pub default_vmax: u64,

    /// Divisor between output lines and internal frame-length lines.
    pub vmax_scale: u64,

    /// Shutter row count floor.
    pub min_shr: u64,

    /// Mode-specific constant added in the exposure conversion.
    pub integration_offset: u64,

    /// Analog crop rectangle within the native array.
    pub crop: Rect,

    /// Register program selecting this mode.
    pub registers: &'static [RegOp],
}

/// Modes available in the 12-bit encodings, best match first.
pub static MODES_12BIT: [Mode; 4] = [
    // 4096x2160 readout (mode 1)
    Mode {
        width: 4144,
        height: 2184,
        min_hmax: 1122,
        min_vmax: 1111,
        default_hmax: 1200,
        default_vmax: 2500,
        vmax_scale: 2,
        min_shr: 5,
        integration_offset: 256,
        crop: Rect {
            left: 36,
            top: 20,
            width: 4096,
            height: 2160,
        },
        registers: MODE_1_REGS,
    },
    // 4096x2160 low-noise readout (mode 1A)
    Mode {
        width: 4176,
        height: 2184,
        min_hmax: 1192,
        min_vmax: 1111,
        default_hmax: 1200,
        default_vmax: 2500,
        vmax_scale: 2,
        min_shr: 5,
        integration_offset: 361,
        crop: Rect {
            left: 36,
            top: 20,
            width: 4096,
            height: 2160,
        },
        registers: MODE_1A_REGS,
    },
    // 3840x2160 readout (mode 1B)
    Mode {
        width: 3872,
        height: 2180,
        min_hmax: 1055,
        min_vmax: 1111,
        default_hmax: 1200,
        default_vmax: 2500,
        vmax_scale: 2,
        min_shr: 5,
        integration_offset: 256,
        crop: Rect {
            left: 20,
            top: 20,
            width: 3840,
            height: 2160,
        },
        registers: MODE_1B_REGS,
    },
    // 3704x2778 readout (mode 0)
    Mode {
        width: 3792,
        height: 2840,
        min_hmax: 1024,
        min_vmax: 1444,
        default_hmax: 1875,
        default_vmax: 1600,
        vmax_scale: 2,
        min_shr: 5,
        integration_offset: 551,
        crop: Rect {
            left: 40,
            top: 24,
            width: 3704,
            height: 2778,
        },
        registers: MODE_0_REGS,
    },
];

/// Modes available in the 14-bit encodings.
pub static MODES_14BIT: [Mode; 1] = [
    // 3704x2778 readout (mode 0)
    Mode {
        width: 3792,
        height: 2840,
        min_hmax: 1730,
        min_vmax: 1444,
        default_hmax: 1875,
        default_vmax: 1600,
        vmax_scale: 2,
        min_shr: 5,
        integration_offset: 551,
        crop: Rect {
            left: 40,
            top: 24,
            width: 3704,
            height: 2778,
        },
        registers: MODE_0_14BIT_REGS,
    },
];

/// Modes supported for the given pixel encoding.
pub fn modes_for_code(code: FormatCode) -> &'static [Mode] {
    match code.bit_depth() {
        14 => &MODES_14BIT,
        _ => &MODES_12BIT,
    }
}

/// The catalog entry closest to the requested frame size.
///
/// Distance is the sum of squared differences on width and height; ties go
/// to the earlier catalog entry.
pub fn nearest_mode(modes: &'static [Mode], width: u32, height: u32) -> &'static Mode {
    let distance = |mode: &Mode| {
        let dw = i64::from(mode.width) - i64::from(width);
        let dh = i64::from(mode.height) - i64::from(height);
        dw * dw + dh * dh
    };
    let mut best = &modes[0];
    for mode in &modes[1..] {
        if distance(mode) < distance(best) {
            best = mode;
        }
    }
    best
}
