//! Capability tables and the opaque report-descriptor interface.
//!
//! A device describes its input report layout through a capability descriptor
//! obtained once per device session. The descriptor itself stays opaque: the
//! decoding core only ever talks to it through [`ReportDescriptor`], so the
//! same decode path runs against the in-tree packed blob format
//! ([`crate::packed::PackedDescriptor`]), synthetic tables in tests, or the
//! platform HID parser on Windows.

use thiserror::Error;

/// A capability's usage coverage: one usage, or a contiguous range.
///
/// Ranges are kept unexpanded here. Button ranges can be large, and only the
/// usages actually asserted in a report are ever materialized; value ranges
/// are expanded lazily by the report decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityUsage {
    Single(u16),
    Range(u16, u16),
}

impl CapabilityUsage {
    /// Number of usages covered. A single usage counts as 1; an inverted
    /// range (hardware garbage) counts as 0.
    pub fn span(&self) -> usize {
        match *self {
            CapabilityUsage::Single(_) => 1,
            CapabilityUsage::Range(min, max) => {
                if min <= max {
                    (max - min) as usize + 1
                } else {
                    0
                }
            }
        }
    }

    /// Iterate the concrete usage ids covered.
    pub fn iter(&self) -> impl Iterator<Item = u16> {
        let (min, max) = match *self {
            CapabilityUsage::Single(u) => (u, u),
            CapabilityUsage::Range(min, max) => (min, max),
        };
        min..=max
    }

    /// Whether `usage` falls inside this capability.
    pub fn contains(&self, usage: u16) -> bool {
        match *self {
            CapabilityUsage::Single(u) => u == usage,
            CapabilityUsage::Range(min, max) => (min..=max).contains(&usage),
        }
    }
}

/// One axis-like input field described by the capability descriptor.
///
/// `logical_min > logical_max` or `logical_min == logical_max` are possible
/// on real hardware; the normalizer treats an empty span as "no normalization
/// possible" and still reports the raw value.
#[derive(Clone, Debug)]
pub struct ValueCap {
    pub usage_page: u16,
    pub usage: CapabilityUsage,
    pub link_collection: u16,
    pub logical_min: i32,
    pub logical_max: i32,
    /// First bit of this field within the report, counting LSB-first.
    pub bit_offset: u16,
    /// Field width in bits. Range capabilities describe `span()` consecutive
    /// fields of this width starting at `bit_offset`.
    pub bit_size: u8,
}

/// One button (or contiguous range of buttons) described by the descriptor.
#[derive(Clone, Debug)]
pub struct ButtonCap {
    pub usage_page: u16,
    pub usage: CapabilityUsage,
    pub link_collection: u16,
    /// Bit of the first covered usage within the report; range buttons occupy
    /// consecutive bits.
    pub bit_offset: u16,
}

/// Global descriptor properties, mirroring the device-level capability header.
#[derive(Clone, Copy, Debug, Default)]
pub struct CapsSummary {
    /// Top-level application usage page (e.g. Generic Desktop).
    pub usage_page: u16,
    /// Top-level application usage (e.g. Joystick, Gamepad).
    pub usage: u16,
    /// Declared input report length in bytes.
    pub input_report_len: u16,
    /// Declared count of input value capabilities.
    pub value_cap_count: u16,
    /// Declared count of input button capabilities.
    pub button_cap_count: u16,
}

/// Parsed capability tables for the input report type.
#[derive(Clone, Debug, Default)]
pub struct DeviceCaps {
    pub summary: CapsSummary,
    pub value_caps: Vec<ValueCap>,
    pub button_caps: Vec<ButtonCap>,
}

/// Capability descriptor parse/query failure.
///
/// These never escape past the device layer: a device whose descriptor cannot
/// be parsed is still tracked, it just decodes to empty axes and buttons.
#[derive(Debug, Error)]
pub enum CapsError {
    #[error("capability descriptor truncated: {got} bytes, need at least {need}")]
    Truncated { got: usize, need: usize },

    #[error("capability descriptor has unrecognized magic {0:#010x}")]
    BadMagic(u32),

    #[error("capability descriptor declares unsupported version {0}")]
    BadVersion(u16),

    #[error("capability query failed with status {0:#010x}")]
    QueryFailed(u32),
}

/// Opaque capability descriptor for one device session.
///
/// Implementations own whatever platform- or format-specific state they need;
/// callers only see the three queries below. All three are total: a usage that
/// is not present, a truncated report, or an internal failure comes back as
/// `None`/empty, never as a panic.
pub trait ReportDescriptor {
    /// Parse the capability tables for the input report type.
    ///
    /// Tables are truncated to the capabilities actually retrievable, which
    /// may be fewer than the counts the descriptor header declares.
    fn caps(&self) -> Result<DeviceCaps, CapsError>;

    /// Raw integer value of `(usage_page, usage)` in `report`, or `None` if
    /// the usage is absent from the capability set or its field lies beyond
    /// the end of `report`.
    fn usage_value(&self, report: &[u8], usage_page: u16, usage: u16) -> Option<i64>;

    /// Usage ids currently asserted on `usage_page` within `link_collection`,
    /// at most `max` of them. Empty on failure; an unpressed button and a
    /// failed query both come back empty.
    fn usages_on(
        &self,
        report: &[u8],
        usage_page: u16,
        link_collection: u16,
        max: usize,
    ) -> Vec<u16>;
}
