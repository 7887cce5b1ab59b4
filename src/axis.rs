//! Axis shaping for sticks, triggers and pointer motion
//!
//! Pure numeric transforms with no I/O. Raw samples arrive as signed 16-bit
//! stick values or 10-bit trigger values and leave as kernel axis values or
//! relative pointer deltas.

use crate::uinput::codes::{STICK_MAX, STICK_MIN, TRIGGER_MAX, TRIGGER_MIN};

/// Deadzone applied to pointer samples before the response curve
pub const MOUSE_DEADZONE: f64 = 0.12;

/// Gamma of the pointer response curve; > 1 damps small movements
pub const MOUSE_CURVE_GAMMA: f64 = 1.6;

/// Bounds for the trigger inner/outer deadzone percentages
pub const TRIGGER_DEADZONE_MIN_PCT: i32 = 2;
pub const TRIGGER_DEADZONE_MAX_PCT: i32 = 15;

/// Reads two little-endian signed words `(x, y)` from the start of a sample.
/// Returns `None` when fewer than 4 bytes are available.
pub fn decode_sample(bytes: &[u8]) -> Option<(i16, i16)> {
    match bytes {
        [x0, x1, y0, y1, ..] => Some((
            i16::from_le_bytes([*x0, *x1]),
            i16::from_le_bytes([*y0, *y1]),
        )),
        _ => None,
    }
}

/// Clamps a stick value into the signed 16-bit axis range
pub fn clamp_stick(raw: i32) -> i32 {
    raw.clamp(STICK_MIN, STICK_MAX)
}

/// Maps a raw stick value to [-1.0, 1.0]
///
/// Negative values divide by 32768 and non-negative ones by 32767, so both
/// ends of the asymmetric i16 range land exactly on ±1.0.
pub fn to_unit_interval(raw: i16) -> f64 {
    if raw < 0 {
        f64::from(raw) / 32768.0
    } else {
        f64::from(raw) / 32767.0
    }
}

/// Collapses |v| < dz to zero and rescales the rest so ±1.0 stays ±1.0
pub fn apply_deadzone(v: f64, dz: f64) -> f64 {
    if v > -dz && v < dz {
        return 0.0;
    }
    if v > 0.0 {
        (v - dz) / (1.0 - dz)
    } else {
        (v + dz) / (1.0 - dz)
    }
}

/// Sign-preserving power curve
pub fn apply_response_curve(v: f64, gamma: f64) -> f64 {
    if v == 0.0 {
        return 0.0;
    }
    let sign = if v < 0.0 { -1.0 } else { 1.0 };
    sign * v.abs().powf(gamma)
}

/// Applies inner (`min_pct`) and outer (`max_pct`) deadzones to a trigger value
///
/// Both percentages are clamped to 2..=15. Values at or below the inner
/// threshold read as released, values at or above the outer threshold as
/// fully pressed, and the band in between is stretched over 0..=1023. When
/// the thresholds leave no band the trigger behaves as a switch.
pub fn map_trigger_deadzone(v: i32, min_pct: i32, max_pct: i32) -> i32 {
    let v = v.clamp(TRIGGER_MIN, TRIGGER_MAX);
    let min_pct = min_pct.clamp(TRIGGER_DEADZONE_MIN_PCT, TRIGGER_DEADZONE_MAX_PCT);
    let max_pct = max_pct.clamp(TRIGGER_DEADZONE_MIN_PCT, TRIGGER_DEADZONE_MAX_PCT);

    let in_min = (TRIGGER_MAX * min_pct) / 100;
    let in_max = TRIGGER_MAX - (TRIGGER_MAX * max_pct) / 100;

    if in_max <= in_min {
        return if v <= in_min { TRIGGER_MIN } else { TRIGGER_MAX };
    }
    if v <= in_min {
        return TRIGGER_MIN;
    }
    if v >= in_max {
        return TRIGGER_MAX;
    }

    let out = ((v - in_min) * TRIGGER_MAX) / (in_max - in_min);
    out.clamp(TRIGGER_MIN, TRIGGER_MAX)
}

/// Pointer shaping parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointerShaping {
    pub deadzone: f64,
    pub curve_gamma: f64,
}

impl Default for PointerShaping {
    fn default() -> Self {
        Self {
            deadzone: MOUSE_DEADZONE,
            curve_gamma: MOUSE_CURVE_GAMMA,
        }
    }
}

/// Relative motion for one pointer sample; `None` on an axis that sits in the deadzone
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MouseDelta {
    pub dx: Option<i32>,
    pub dy: Option<i32>,
}

/// Turns a stick sample into relative pointer motion
///
/// unit → deadzone → curve → × sensitivity, truncated toward zero.
/// `invert_y` flips the vertical delta only.
pub fn mouse_delta(
    x: i16,
    y: i16,
    shaping: PointerShaping,
    sensitivity_x: u8,
    sensitivity_y: u8,
    invert_y: bool,
) -> MouseDelta {
    let shape = |raw: i16| {
        let unit = apply_deadzone(to_unit_interval(raw), shaping.deadzone);
        apply_response_curve(unit, shaping.curve_gamma)
    };
    let ux = shape(x);
    let uy = shape(y);

    let dx = (ux * f64::from(sensitivity_x)) as i32;
    let mut dy = (uy * f64::from(sensitivity_y)) as i32;
    if invert_y {
        dy = -dy;
    }

    MouseDelta {
        dx: (ux != 0.0).then_some(dx),
        dy: (uy != 0.0).then_some(dy),
    }
}
