//! Packed capability descriptor blobs.
//!
//! [`PackedDescriptor`] is the in-tree [`ReportDescriptor`] implementation: a
//! compact little-endian blob holding the device's capability header followed
//! by fixed-size value- and button-capability records. The blob is the unit a
//! [`RawInputSource`](crate::source::RawInputSource) hands over per device and
//! is immutable for the device's lifetime.
//!
//! ## Layout
//!
//! ```text
//! header (16 bytes):
//!   0..4   magic "JCAP"
//!   4..6   version (currently 1)
//!   6..8   top-level usage page
//!   8..10  top-level usage
//!   10..12 input report length (bytes)
//!   12..14 value cap count
//!   14..16 button cap count
//! value caps   (20 bytes each): page, flags, bit size, usage min/max,
//!                               link collection, bit offset, logical min/max
//! button caps  (12 bytes each): page, flags, usage min/max,
//!                               link collection, bit offset
//! ```
//!
//! Declared counts are a promise, not a guarantee: parsing reads as many whole
//! records as the blob actually contains and truncates each table to that.
//! Bits are addressed LSB-first within bytes, the HID wire convention.

use log::warn;

use crate::caps::{
    ButtonCap, CapabilityUsage, CapsError, CapsSummary, DeviceCaps, ReportDescriptor, ValueCap,
};

const MAGIC: &[u8; 4] = b"JCAP";
const VERSION: u16 = 1;

const HEADER_LEN: usize = 16;
const VALUE_CAP_LEN: usize = 20;
const BUTTON_CAP_LEN: usize = 12;

const FLAG_RANGE: u8 = 0x01;

/// A parsed, query-ready capability descriptor blob.
///
/// Construction validates the header and resolves every capability record
/// once; the raw blob is kept only as the canonical owned form. Queries never
/// re-interpret record bytes.
pub struct PackedDescriptor {
    blob: Vec<u8>,
    summary: CapsSummary,
    value_caps: Vec<ValueCap>,
    button_caps: Vec<ButtonCap>,
}

impl PackedDescriptor {
    /// Parse a descriptor blob.
    ///
    /// Fails only on a malformed header (too short, wrong magic, unknown
    /// version). Truncated capability tables are not an error; the tables are
    /// shortened to the records actually present.
    pub fn from_bytes(blob: Vec<u8>) -> Result<Self, CapsError> {
        if blob.len() < HEADER_LEN {
            return Err(CapsError::Truncated {
                got: blob.len(),
                need: HEADER_LEN,
            });
        }
        if &blob[0..4] != MAGIC {
            return Err(CapsError::BadMagic(u32::from_le_bytes(
                blob[0..4].try_into().unwrap(),
            )));
        }
        let version = read_u16(&blob, 4);
        if version != VERSION {
            return Err(CapsError::BadVersion(version));
        }

        let summary = CapsSummary {
            usage_page: read_u16(&blob, 6),
            usage: read_u16(&blob, 8),
            input_report_len: read_u16(&blob, 10),
            value_cap_count: read_u16(&blob, 12),
            button_cap_count: read_u16(&blob, 14),
        };

        let mut value_caps = Vec::with_capacity(summary.value_cap_count as usize);
        for i in 0..summary.value_cap_count as usize {
            let at = HEADER_LEN + i * VALUE_CAP_LEN;
            let Some(rec) = blob.get(at..at + VALUE_CAP_LEN) else {
                break;
            };
            value_caps.push(ValueCap {
                usage_page: read_u16(rec, 0),
                usage: read_usage(rec[2], read_u16(rec, 4), read_u16(rec, 6)),
                bit_size: rec[3],
                link_collection: read_u16(rec, 8),
                bit_offset: read_u16(rec, 10),
                logical_min: read_i32(rec, 12),
                logical_max: read_i32(rec, 16),
            });
        }
        if value_caps.len() < summary.value_cap_count as usize {
            warn!(
                "descriptor declares {} value caps, blob holds {}",
                summary.value_cap_count,
                value_caps.len()
            );
        }

        // Button records sit at a fixed offset derived from the declared
        // value-cap count, so a short value table does not shift them.
        let buttons_at = HEADER_LEN + summary.value_cap_count as usize * VALUE_CAP_LEN;
        let mut button_caps = Vec::with_capacity(summary.button_cap_count as usize);
        for i in 0..summary.button_cap_count as usize {
            let at = buttons_at + i * BUTTON_CAP_LEN;
            let Some(rec) = blob.get(at..at + BUTTON_CAP_LEN) else {
                break;
            };
            button_caps.push(ButtonCap {
                usage_page: read_u16(rec, 0),
                usage: read_usage(rec[2], read_u16(rec, 4), read_u16(rec, 6)),
                link_collection: read_u16(rec, 8),
                bit_offset: read_u16(rec, 10),
            });
        }
        if button_caps.len() < summary.button_cap_count as usize {
            warn!(
                "descriptor declares {} button caps, blob holds {}",
                summary.button_cap_count,
                button_caps.len()
            );
        }

        Ok(Self {
            blob,
            summary,
            value_caps,
            button_caps,
        })
    }

    /// The raw blob this descriptor was parsed from.
    pub fn as_bytes(&self) -> &[u8] {
        &self.blob
    }
}

impl ReportDescriptor for PackedDescriptor {
    fn caps(&self) -> Result<DeviceCaps, CapsError> {
        Ok(DeviceCaps {
            summary: self.summary,
            value_caps: self.value_caps.clone(),
            button_caps: self.button_caps.clone(),
        })
    }

    fn usage_value(&self, report: &[u8], usage_page: u16, usage: u16) -> Option<i64> {
        let cap = self
            .value_caps
            .iter()
            .find(|c| c.usage_page == usage_page && c.usage.contains(usage))?;

        // A range cap packs span() consecutive fields of bit_size each, one
        // per usage, starting at the range minimum.
        let index = match cap.usage {
            CapabilityUsage::Single(_) => 0usize,
            CapabilityUsage::Range(min, _) => (usage - min) as usize,
        };
        let bit = cap.bit_offset as usize + index * cap.bit_size as usize;
        let raw = read_bits(report, bit, cap.bit_size as usize)?;

        if cap.logical_min < 0 {
            Some(sign_extend(raw, cap.bit_size))
        } else {
            Some(raw as i64)
        }
    }

    fn usages_on(
        &self,
        report: &[u8],
        usage_page: u16,
        link_collection: u16,
        max: usize,
    ) -> Vec<u16> {
        let mut on = Vec::new();
        for cap in &self.button_caps {
            if cap.usage_page != usage_page || cap.link_collection != link_collection {
                continue;
            }
            let first = match cap.usage {
                CapabilityUsage::Single(u) => u,
                CapabilityUsage::Range(min, _) => min,
            };
            for i in 0..cap.usage.span() {
                if on.len() >= max {
                    return on;
                }
                let bit = cap.bit_offset as usize + i;
                if read_bits(report, bit, 1) == Some(1) {
                    on.push(first + i as u16);
                }
            }
        }
        on
    }
}

/// Assembles descriptor blobs, mainly for synthetic devices and tests.
#[derive(Default)]
pub struct DescriptorBuilder {
    usage_page: u16,
    usage: u16,
    input_report_len: u16,
    value_caps: Vec<ValueCap>,
    button_caps: Vec<ButtonCap>,
}

impl DescriptorBuilder {
    pub fn new(usage_page: u16, usage: u16, input_report_len: u16) -> Self {
        Self {
            usage_page,
            usage,
            input_report_len,
            ..Default::default()
        }
    }

    pub fn value(mut self, cap: ValueCap) -> Self {
        self.value_caps.push(cap);
        self
    }

    pub fn button(mut self, cap: ButtonCap) -> Self {
        self.button_caps.push(cap);
        self
    }

    /// Serialize to the packed blob form.
    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::with_capacity(
            HEADER_LEN
                + self.value_caps.len() * VALUE_CAP_LEN
                + self.button_caps.len() * BUTTON_CAP_LEN,
        );
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&VERSION.to_le_bytes());
        out.extend_from_slice(&self.usage_page.to_le_bytes());
        out.extend_from_slice(&self.usage.to_le_bytes());
        out.extend_from_slice(&self.input_report_len.to_le_bytes());
        out.extend_from_slice(&(self.value_caps.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.button_caps.len() as u16).to_le_bytes());

        for cap in &self.value_caps {
            let (flags, min, max) = encode_usage(cap.usage);
            out.extend_from_slice(&cap.usage_page.to_le_bytes());
            out.push(flags);
            out.push(cap.bit_size);
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&cap.link_collection.to_le_bytes());
            out.extend_from_slice(&cap.bit_offset.to_le_bytes());
            out.extend_from_slice(&cap.logical_min.to_le_bytes());
            out.extend_from_slice(&cap.logical_max.to_le_bytes());
        }
        for cap in &self.button_caps {
            let (flags, min, max) = encode_usage(cap.usage);
            out.extend_from_slice(&cap.usage_page.to_le_bytes());
            out.push(flags);
            out.push(0);
            out.extend_from_slice(&min.to_le_bytes());
            out.extend_from_slice(&max.to_le_bytes());
            out.extend_from_slice(&cap.link_collection.to_le_bytes());
            out.extend_from_slice(&cap.bit_offset.to_le_bytes());
        }
        out
    }
}

fn encode_usage(usage: CapabilityUsage) -> (u8, u16, u16) {
    match usage {
        CapabilityUsage::Single(u) => (0, u, u),
        CapabilityUsage::Range(min, max) => (FLAG_RANGE, min, max),
    }
}

fn read_usage(flags: u8, min: u16, max: u16) -> CapabilityUsage {
    if flags & FLAG_RANGE != 0 {
        CapabilityUsage::Range(min, max)
    } else {
        CapabilityUsage::Single(min)
    }
}

fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes(buf[at..at + 2].try_into().unwrap())
}

fn read_i32(buf: &[u8], at: usize) -> i32 {
    i32::from_le_bytes(buf[at..at + 4].try_into().unwrap())
}

/// Read `size` bits LSB-first starting at absolute bit `at`.
///
/// Returns `None` when the field would run past the end of `report` (short
/// read, truncated trailing report) or when `size` is out of the 1..=64
/// window a sane descriptor can declare.
fn read_bits(report: &[u8], at: usize, size: usize) -> Option<u64> {
    if size == 0 || size > 64 {
        return None;
    }
    let last_byte = (at + size - 1) / 8;
    if last_byte >= report.len() {
        return None;
    }
    let mut value = 0u64;
    for i in 0..size {
        let bit = at + i;
        if (report[bit / 8] >> (bit % 8)) & 1 != 0 {
            value |= 1 << i;
        }
    }
    Some(value)
}

/// Interpret the low `size` bits of `raw` as a two's-complement integer.
fn sign_extend(raw: u64, size: u8) -> i64 {
    if size == 0 || size >= 64 {
        return raw as i64;
    }
    let shift = 64 - size as u32;
    ((raw << shift) as i64) >> shift
}
