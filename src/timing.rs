// SPDX-License-Identifier: Apache-2.0
//! The HMAX/VMAX/SHR timing algebra.
//!
//! Everything in here is fixed-point integer math taken from the datasheet's
//! integration-time formula:
//!
//! ```text
//! integration time [s] = ((VMAX * (SVR + 1) - SHR) * HMAX + offset) / 72e6
//! ```
//!
//! with the exposure control defined as that integration time expressed in
//! HMAX units. All division truncates toward zero, and the multiply-before-
//! divide ordering is load-bearing: reordering changes the rounding and with
//! it the register values the sensor ends up with. `svr` (the frame-rate
//! sub-divider) is carried as a parameter throughout but is always 0 in this
//! driver.

use crate::mode::Mode;

/// Internal pixel clock the timing formulas are scaled against, in Hz.
const INTERNAL_CLOCK: u64 = 72_000_000;

/// Convert a shutter row count into the exposure control value.
///
/// Clamped to the unsigned 32-bit range the exposure control is carried in.
pub fn exposure_from_shr(hmax: u64, vmax: u64, shr: u64, svr: u64, offset: u64) -> u64 {
    let numerator = (vmax * (svr + 1) - shr) * hmax + offset;
    (numerator / hmax).min(u32::MAX as u64)
}

/// Convert an exposure control value into the shutter row count.
///
/// Inverse of [`exposure_from_shr`] up to the one-count slack its truncating
/// division introduces for offsets that are not a multiple of HMAX.
pub fn shr_from_exposure(exposure: u64, hmax: u64, vmax: u64, svr: u64, offset: u64) -> u64 {
    let rows = (exposure * hmax - offset) / hmax;
    vmax * (svr + 1) - rows
}

/// Legal exposure bounds for the given timing, as `(min, max)`.
///
/// SHR counts down from the frame length, so the largest usable SHR yields
/// the shortest exposure and the smallest SHR the longest. The SHR register
/// is 16 bits wide, which caps the large-frame end of the range.
pub fn exposure_bounds(hmax: u64, vmax: u64, min_shr: u64, svr: u64, offset: u64) -> (u64, u64) {
    let max_shr = ((svr + 1) * vmax - 4).min(0xFFFF);
    let min_exposure = exposure_from_shr(hmax, vmax, max_shr, svr, offset);
    let max_exposure = exposure_from_shr(hmax, vmax, min_shr, svr, offset);
    (min_exposure, max_exposure)
}

/// Frame length for a requested vertical blanking interval.
///
/// The externally advertised vertical blank is in output lines; VMAX is in
/// internal lines, which differ by the mode's scale divisor.
pub fn vmax_from_vblank(mode: &Mode, vblank: u64) -> u64 {
    (mode.height as u64 + vblank) / mode.vmax_scale
}

/// Pixel rate for a mode, in pixels per second.
///
/// Defined by the mode running at its minimum line length: `width * 72e6 /
/// min_HMAX`.
pub fn pixel_rate(mode: &Mode) -> u64 {
    mode.width as u64 * INTERNAL_CLOCK / mode.min_hmax
}

/// Line length for a requested horizontal blanking interval.
pub fn hmax_from_hblank(mode: &Mode, hblank: u64, pixel_rate: u64) -> u64 {
    (mode.width as u64 + hblank) * INTERNAL_CLOCK / pixel_rate
}

/// Smallest horizontal blank that [`hmax_from_hblank`] maps back to the
/// mode's default HMAX.
///
/// This is the one place that rounds up: truncating here would land one
/// clock short of `default_HMAX` whenever the pixel rate doesn't divide
/// evenly, and the advertised default must survive a round trip through the
/// horizontal-blank control unchanged.
pub(crate) fn default_hblank(mode: &Mode, pixel_rate: u64) -> u64 {
    let line = mode.default_hmax * pixel_rate;
    let line = line / INTERNAL_CLOCK + u64::from(line % INTERNAL_CLOCK != 0);
    line - mode.width as u64
}

#[cfg(test)]
mod test {
    extern crate std;

    use super::*;
    use crate::mode::{MODES_12BIT, MODES_14BIT};

    #[test]
    fn exposure_follows_frame_headroom() {
        // Worked example at the 4096x2160 mode defaults: HMAX 1200,
        // VMAX 2500, SHR floor 5, offset 256.
        let (min, max) = exposure_bounds(1200, 2500, 5, 0, 256);
        assert_eq!(min, 4);
        assert_eq!(max, 2495);
        // The documented default exposure has to be usable out of the box.
        assert!(min <= 1000 && 1000 <= max);
    }

    #[test]
    fn max_shr_clamps_to_register_width() {
        // A frame long enough that VMAX - 4 no longer fits in the 16-bit
        // SHR register. The short-exposure end must come from SHR = 0xFFFF,
        // not from a wrapped row count.
        let (min, max) = exposure_bounds(1200, 70_000, 5, 0, 256);
        assert_eq!(min, exposure_from_shr(1200, 70_000, 0xFFFF, 0, 256));
        assert_eq!(min, 70_000 - 0xFFFF);
        assert_eq!(max, 70_000 - 5);
    }

    #[test]
    fn exposure_clamps_to_u32() {
        let exposure = exposure_from_shr(1, 1 << 40, 0, 0, 0);
        assert_eq!(exposure, u32::MAX as u64);
    }

    #[test]
    fn shr_round_trip() {
        // The truncating division in shr_from_exposure costs at most one
        // row whenever HMAX doesn't divide the offset; with offset 0 the
        // round trip is exact.
        for &(hmax, vmax, offset) in &[
            (1024u64, 1444u64, 551u64),
            (1122, 1111, 256),
            (1200, 2500, 256),
            (1200, 2500, 361),
            (1875, 1600, 551),
            (1200, 2500, 0),
        ] {
            let max_shr = (vmax - 4).min(0xFFFF);
            for shr in (5..max_shr).step_by(97) {
                let exposure = exposure_from_shr(hmax, vmax, shr, 0, offset);
                let back = shr_from_exposure(exposure, hmax, vmax, 0, offset);
                if offset % hmax == 0 {
                    assert_eq!(back, shr, "hmax={} vmax={} shr={}", hmax, vmax, shr);
                } else {
                    assert!(
                        back == shr || back == shr + 1,
                        "hmax={} vmax={} shr={} back={}",
                        hmax,
                        vmax,
                        shr,
                        back
                    );
                }
            }
        }
    }

    #[test]
    fn vblank_monotonically_lengthens_frame() {
        let mode = &MODES_12BIT[0];
        let mut previous = vmax_from_vblank(mode, 38);
        // Stepping by the scale divisor keeps the truncating division from
        // flattening consecutive samples.
        for vblank in (38 + mode.vmax_scale..3000).step_by(mode.vmax_scale as usize) {
            let vmax = vmax_from_vblank(mode, vblank);
            assert!(vmax > previous, "vblank={}", vblank);
            let (_, max_at_prev) =
                exposure_bounds(1200, previous, mode.min_shr, 0, mode.integration_offset);
            let (_, max_here) =
                exposure_bounds(1200, vmax, mode.min_shr, 0, mode.integration_offset);
            assert!(max_here > max_at_prev);
            previous = vmax;
        }
    }

    #[test]
    fn bounds_ordered_for_every_mode() {
        for mode in MODES_12BIT.iter().chain(MODES_14BIT.iter()) {
            let (min, max) = exposure_bounds(
                mode.default_hmax,
                mode.default_vmax,
                mode.min_shr,
                0,
                mode.integration_offset,
            );
            assert!(min <= max, "mode {}x{}", mode.width, mode.height);
        }
    }

    #[test]
    fn default_hblank_round_trips_to_default_hmax() {
        for mode in MODES_12BIT.iter().chain(MODES_14BIT.iter()) {
            let rate = pixel_rate(mode);
            let hblank = default_hblank(mode, rate);
            assert_eq!(
                hmax_from_hblank(mode, hblank, rate),
                mode.default_hmax,
                "mode {}x{}",
                mode.width,
                mode.height
            );
            // And it's the smallest such hblank.
            assert!(hmax_from_hblank(mode, hblank - 1, rate) < mode.default_hmax);
        }
    }

    #[test]
    fn zero_hblank_runs_at_minimum_line_length() {
        let mode = &MODES_12BIT[0];
        let rate = pixel_rate(mode);
        assert_eq!(hmax_from_hblank(mode, 0, rate), mode.min_hmax);
    }
}
