//! Report decoding: normalization, batch segmentation, and the per-report
//! axis/button decode.
//!
//! Everything in this module is pure and total. Decode failures surface as
//! absent values or empty collections, never as errors; one malformed report
//! must never stop the reports after it.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::caps::{ButtonCap, ReportDescriptor, ValueCap};
use crate::usages::{axis_name, USAGE_PAGE_GENERIC_DESKTOP};

/// One decoded axis sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct AxisReading {
    /// Raw field value as extracted from the report.
    pub raw: i64,
    /// Unit-scaled value, or `None` when the logical range is degenerate.
    pub norm: Option<f64>,
    /// Device-declared logical minimum.
    pub min: i32,
    /// Device-declared logical maximum.
    pub max: i32,
}

/// Decoded view of a single input report.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DecodedReport {
    /// Named axis readings, keyed by the fixed Generic Desktop axis names.
    pub axes: BTreeMap<&'static str, AxisReading>,
    /// Pressed button usage ids, ascending, deduplicated.
    pub buttons: Vec<u16>,
}

/// Scale a raw value into a unit range using its logical bounds.
///
/// - `None` when `logical_max == logical_min` (nothing to scale by).
/// - `[-1, 1]` when `logical_min < 0` (signed, center-at-zero ranges).
/// - `[0, 1]` otherwise.
///
/// Out-of-range raw values from misbehaving hardware pass through as
/// out-of-range floats; callers that need clamping do it themselves.
pub fn normalize(value: i64, logical_min: i32, logical_max: i32) -> Option<f64> {
    if logical_max == logical_min {
        return None;
    }
    let span = (logical_max as f64) - (logical_min as f64);
    let unit = (value as f64 - logical_min as f64) / span;
    if logical_min < 0 {
        Some(unit * 2.0 - 1.0)
    } else {
        Some(unit)
    }
}

/// Split a batched blob into `count` report slices of `report_size` bytes.
///
/// A trailing slice that would run past the end of `blob` (short read) is
/// dropped, not padded.
pub fn split_reports(blob: &[u8], report_size: u32, count: u32) -> Vec<&[u8]> {
    let size = report_size as usize;
    if size == 0 {
        return Vec::new();
    }
    let mut reports = Vec::with_capacity(count as usize);
    for idx in 0..count as usize {
        let start = idx * size;
        let end = start + size;
        if end <= blob.len() {
            reports.push(&blob[start..end]);
        }
    }
    reports
}

/// Decode one report into named axes and a sorted pressed-button set.
///
/// Axes come from Generic Desktop value capabilities whose usages appear in
/// the fixed ten-name table; when two capabilities map the same name, the
/// later one wins. Buttons are gathered across all button capabilities and
/// deduplicated, so overlapping ranges cannot produce a usage twice.
pub fn decode_report(
    descriptor: &dyn ReportDescriptor,
    value_caps: &[ValueCap],
    button_caps: &[ButtonCap],
    report: &[u8],
) -> DecodedReport {
    let mut axes = BTreeMap::new();
    for cap in value_caps {
        if cap.usage_page != USAGE_PAGE_GENERIC_DESKTOP {
            continue;
        }
        for usage in cap.usage.iter() {
            let Some(name) = axis_name(usage) else {
                continue;
            };
            let Some(raw) = descriptor.usage_value(report, cap.usage_page, usage) else {
                continue;
            };
            axes.insert(
                name,
                AxisReading {
                    raw,
                    norm: normalize(raw, cap.logical_min, cap.logical_max),
                    min: cap.logical_min,
                    max: cap.logical_max,
                },
            );
        }
    }

    let mut pressed = BTreeSet::new();
    for cap in button_caps {
        let span = cap.usage.span();
        if span == 0 {
            continue;
        }
        pressed.extend(descriptor.usages_on(
            report,
            cap.usage_page,
            cap.link_collection,
            span,
        ));
    }

    DecodedReport {
        axes,
        buttons: pressed.into_iter().collect(),
    }
}
