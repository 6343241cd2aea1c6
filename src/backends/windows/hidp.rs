#![cfg(target_os = "windows")]

//! HIDP-backed capability descriptor.
//!
//! Wraps the preparsed-data blob obtained from Raw Input
//! (`RIDI_PREPARSEDDATA`) behind the [`ReportDescriptor`] interface. The blob
//! is never interpreted directly: every query goes through the platform HID
//! parser (`HidP_*`), which is the owner of its layout.

use core::mem::MaybeUninit;

use windows_sys::Win32::Devices::HumanInterfaceDevice::{
    HidP_GetButtonCaps, HidP_GetCaps, HidP_GetUsageValue, HidP_GetUsages, HidP_GetValueCaps,
    HidP_Input, HIDP_BUTTON_CAPS, HIDP_CAPS, HIDP_STATUS_SUCCESS, HIDP_VALUE_CAPS,
    PHIDP_PREPARSED_DATA,
};
use windows_sys::Win32::Foundation::NTSTATUS;

use crate::caps::{
    ButtonCap, CapabilityUsage, CapsError, CapsSummary, DeviceCaps, ReportDescriptor, ValueCap,
};

/// Capability descriptor backed by Windows preparsed data.
///
/// Owns the preparsed blob for the device session; capability tables are
/// resolved once at construction so per-report queries don't re-enumerate.
pub struct HidpDescriptor {
    blob: Vec<u8>,
    caps: DeviceCaps,
}

impl HidpDescriptor {
    /// Wrap a preparsed-data blob.
    ///
    /// Fails when `HidP_GetCaps` rejects the blob; partial or failed
    /// value/button cap retrieval degrades to shorter (possibly empty)
    /// tables instead, matching the "device with no decodable controls"
    /// policy.
    pub fn new(blob: Vec<u8>) -> Result<Self, CapsError> {
        let ppd = blob.as_ptr() as PHIDP_PREPARSED_DATA;

        let mut caps = MaybeUninit::<HIDP_CAPS>::uninit();
        let status = unsafe { HidP_GetCaps(ppd, caps.as_mut_ptr()) };
        if status != HIDP_STATUS_SUCCESS {
            return Err(CapsError::QueryFailed(status as u32));
        }
        let caps = unsafe { caps.assume_init() };

        let summary = CapsSummary {
            usage_page: caps.UsagePage,
            usage: caps.Usage,
            input_report_len: caps.InputReportByteLength,
            value_cap_count: caps.NumberInputValueCaps,
            button_cap_count: caps.NumberInputButtonCaps,
        };

        let value_caps = fetch_value_caps(ppd, caps.NumberInputValueCaps);
        let button_caps = fetch_button_caps(ppd, caps.NumberInputButtonCaps);

        Ok(Self {
            blob,
            caps: DeviceCaps {
                summary,
                value_caps,
                button_caps,
            },
        })
    }

    fn ppd(&self) -> PHIDP_PREPARSED_DATA {
        self.blob.as_ptr() as PHIDP_PREPARSED_DATA
    }
}

impl ReportDescriptor for HidpDescriptor {
    fn caps(&self) -> Result<DeviceCaps, CapsError> {
        Ok(self.caps.clone())
    }

    fn usage_value(&self, report: &[u8], usage_page: u16, usage: u16) -> Option<i64> {
        if report.is_empty() {
            return None;
        }
        // HidP takes a mutable report pointer even for reads.
        let mut buf = report.to_vec();
        let mut value: u32 = 0;
        let status: NTSTATUS = unsafe {
            HidP_GetUsageValue(
                HidP_Input,
                usage_page,
                0,
                usage,
                &mut value,
                self.ppd(),
                buf.as_mut_ptr(),
                buf.len() as u32,
            )
        };
        if status != HIDP_STATUS_SUCCESS {
            return None;
        }

        // HidP_GetUsageValue hands back the raw bit pattern zero-extended;
        // re-sign it from the owning capability's field width.
        let cap = self
            .caps
            .value_caps
            .iter()
            .find(|c| c.usage_page == usage_page && c.usage.contains(usage));
        match cap {
            Some(cap) if cap.logical_min < 0 && cap.bit_size > 0 && cap.bit_size < 32 => {
                let shift = 32 - cap.bit_size as u32;
                Some((((value << shift) as i32) >> shift) as i64)
            }
            Some(cap) if cap.logical_min < 0 && cap.bit_size == 32 => Some(value as i32 as i64),
            _ => Some(value as i64),
        }
    }

    fn usages_on(
        &self,
        report: &[u8],
        usage_page: u16,
        link_collection: u16,
        max: usize,
    ) -> Vec<u16> {
        if report.is_empty() || max == 0 {
            return Vec::new();
        }
        let mut buf = report.to_vec();
        let mut usages = vec![0u16; max];
        let mut count = usages.len() as u32;
        let status: NTSTATUS = unsafe {
            HidP_GetUsages(
                HidP_Input,
                usage_page,
                link_collection,
                usages.as_mut_ptr(),
                &mut count,
                self.ppd(),
                buf.as_mut_ptr(),
                buf.len() as u32,
            )
        };
        if status != HIDP_STATUS_SUCCESS {
            return Vec::new();
        }
        usages.truncate(count as usize);
        usages
    }
}

/// Retrieve input value caps, truncated to what HIDP actually returns.
fn fetch_value_caps(ppd: PHIDP_PREPARSED_DATA, declared: u16) -> Vec<ValueCap> {
    if declared == 0 {
        return Vec::new();
    }
    let mut raw: Vec<HIDP_VALUE_CAPS> = vec![unsafe { core::mem::zeroed() }; declared as usize];
    let mut count = declared;
    let status = unsafe { HidP_GetValueCaps(HidP_Input, raw.as_mut_ptr(), &mut count, ppd) };
    if status != HIDP_STATUS_SUCCESS {
        return Vec::new();
    }
    raw.truncate(count as usize);

    raw.iter()
        .map(|c| {
            let (usage, data_index) = unsafe {
                if c.IsRange != 0 {
                    let r = c.Anonymous.Range;
                    (CapabilityUsage::Range(r.UsageMin, r.UsageMax), r.DataIndexMin)
                } else {
                    let nr = c.Anonymous.NotRange;
                    (CapabilityUsage::Single(nr.Usage), nr.DataIndex)
                }
            };
            ValueCap {
                usage_page: c.UsagePage,
                usage,
                link_collection: c.LinkCollection,
                logical_min: c.LogicalMin,
                logical_max: c.LogicalMax,
                // HIDP addresses fields by data index, not bit position;
                // the locator is only meaningful to this descriptor.
                bit_offset: data_index,
                bit_size: c.BitSize.min(u8::MAX as u16) as u8,
            }
        })
        .collect()
}

/// Retrieve input button caps, truncated to what HIDP actually returns.
fn fetch_button_caps(ppd: PHIDP_PREPARSED_DATA, declared: u16) -> Vec<ButtonCap> {
    if declared == 0 {
        return Vec::new();
    }
    let mut raw: Vec<HIDP_BUTTON_CAPS> = vec![unsafe { core::mem::zeroed() }; declared as usize];
    let mut count = declared;
    let status = unsafe { HidP_GetButtonCaps(HidP_Input, raw.as_mut_ptr(), &mut count, ppd) };
    if status != HIDP_STATUS_SUCCESS {
        return Vec::new();
    }
    raw.truncate(count as usize);

    raw.iter()
        .map(|c| {
            let (usage, data_index) = unsafe {
                if c.IsRange != 0 {
                    let r = c.Anonymous.Range;
                    (CapabilityUsage::Range(r.UsageMin, r.UsageMax), r.DataIndexMin)
                } else {
                    let nr = c.Anonymous.NotRange;
                    (CapabilityUsage::Single(nr.Usage), nr.DataIndex)
                }
            };
            ButtonCap {
                usage_page: c.UsagePage,
                usage,
                link_collection: c.LinkCollection,
                bit_offset: data_index,
            }
        })
        .collect()
}
