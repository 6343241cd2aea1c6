//! HID usage constants and the fixed axis-name table.
//!
//! Only the Generic Desktop usages a joystick or gamepad is expected to carry
//! are named here. Everything else is decoded by (usage page, usage) number
//! and left to the consumer.

/// Generic Desktop usage page.
pub const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;

/// Top-level application usage for joysticks.
pub const USAGE_JOYSTICK: u16 = 0x04;
/// Top-level application usage for gamepads.
pub const USAGE_GAMEPAD: u16 = 0x05;

pub const USAGE_X: u16 = 0x30;
pub const USAGE_Y: u16 = 0x31;
pub const USAGE_Z: u16 = 0x32;
pub const USAGE_RX: u16 = 0x33;
pub const USAGE_RY: u16 = 0x34;
pub const USAGE_RZ: u16 = 0x35;
pub const USAGE_SLIDER: u16 = 0x36;
pub const USAGE_DIAL: u16 = 0x37;
pub const USAGE_WHEEL: u16 = 0x38;
pub const USAGE_HAT: u16 = 0x39;

/// Stable name for a Generic Desktop axis usage, or `None` for usages the
/// logger does not treat as axes.
///
/// Exactly ten usages are named (`x` through `hat`). Values on other pages or
/// outside this table are ignored by the report decoder.
pub fn axis_name(usage: u16) -> Option<&'static str> {
    let name = match usage {
        USAGE_X => "x",
        USAGE_Y => "y",
        USAGE_Z => "z",
        USAGE_RX => "rx",
        USAGE_RY => "ry",
        USAGE_RZ => "rz",
        USAGE_SLIDER => "slider",
        USAGE_DIAL => "dial",
        USAGE_WHEEL => "wheel",
        USAGE_HAT => "hat",
        _ => return None,
    };
    Some(name)
}
