//! The externally-consumable event record.
//!
//! One [`EventRecord`] is produced per decoded report and handed straight to
//! the sink; nothing is retained. Field declaration order below is the wire
//! order for both the JSONL and CSV outputs, so it is part of the output
//! contract — do not reorder.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::decode::DecodedReport;
use crate::device::DeviceState;

#[derive(Clone, Debug, Serialize)]
pub struct EventRecord {
    /// Capture time, ISO-8601 in UTC.
    pub timestamp_iso: String,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_epoch_ms: i64,
    /// Device handle as lowercase `0x…` hex; stable within one run.
    pub device_handle: String,
    pub device_name: String,
    pub usage_page: Option<u16>,
    pub usage: Option<u16>,
    /// Report length in bytes.
    pub report_size: usize,
    /// Raw report bytes, lowercase hex.
    pub report_hex: String,
    #[serde(flatten)]
    pub decoded: DecodedReport,
}

impl EventRecord {
    /// Build a record for one report decoded against `device`, stamped `at`.
    ///
    /// Identity fields are copied out of the device state so the record owns
    /// everything it carries.
    pub fn new(
        device: &DeviceState,
        report: &[u8],
        decoded: DecodedReport,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            timestamp_iso: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            timestamp_epoch_ms: at.timestamp_millis(),
            device_handle: format!("{:#x}", device.handle),
            device_name: device.name.clone(),
            usage_page: device.identity.map(|id| id.usage_page),
            usage: device.identity.map(|id| id.usage),
            report_size: report.len(),
            report_hex: hex_lower(report),
            decoded,
        }
    }

    /// One-line human summary for `--print` echo mode.
    pub fn summary(&self) -> String {
        let axes: Vec<String> = self
            .decoded
            .axes
            .iter()
            .map(|(name, reading)| match reading.norm {
                Some(norm) => format!("{name}={norm:.4}"),
                None => format!("{name}={}", reading.raw),
            })
            .collect();
        format!(
            "{} {} {}B axes=[{}] buttons={:?}",
            self.timestamp_epoch_ms,
            self.device_handle,
            self.report_size,
            axes.join(" "),
            self.decoded.buttons
        )
    }
}

fn hex_lower(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        out.push_str(&format!("{b:02x}"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DeviceEntry, DeviceHandle, DeviceIdentity, InputBatch, RawInputSource};
    use chrono::TimeZone;

    struct NamedSource;

    impl RawInputSource for NamedSource {
        fn devices(&self) -> Vec<DeviceEntry> {
            Vec::new()
        }

        fn device_name(&self, _handle: DeviceHandle) -> String {
            "Test Pad".into()
        }

        fn device_identity(&self, _handle: DeviceHandle) -> Option<DeviceIdentity> {
            Some(DeviceIdentity {
                vendor_id: 0x044F,
                product_id: 0xB10A,
                usage_page: 0x01,
                usage: 0x04,
            })
        }

        fn descriptor(
            &self,
            _handle: DeviceHandle,
        ) -> Option<Box<dyn crate::caps::ReportDescriptor>> {
            None
        }

        fn next_batch(&mut self) -> Option<InputBatch> {
            None
        }
    }

    #[test]
    fn record_fields_and_hex() {
        let device = DeviceState::resolve(0xABCD, &NamedSource);
        let at = Utc.with_ymd_and_hms(2024, 5, 17, 12, 30, 45).unwrap();
        let record = EventRecord::new(&device, &[0x01, 0xFE, 0x00], DecodedReport::default(), at);

        assert_eq!(record.device_handle, "0xabcd");
        assert_eq!(record.device_name, "Test Pad");
        assert_eq!(record.usage_page, Some(0x01));
        assert_eq!(record.usage, Some(0x04));
        assert_eq!(record.report_size, 3);
        assert_eq!(record.report_hex, "01fe00");
        assert_eq!(record.timestamp_iso, "2024-05-17T12:30:45.000Z");
        assert_eq!(record.timestamp_epoch_ms, at.timestamp_millis());
    }

    #[test]
    fn json_field_order_matches_contract() {
        let device = DeviceState::resolve(0x1, &NamedSource);
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = EventRecord::new(&device, &[0xAA], DecodedReport::default(), at);
        let json = serde_json::to_string(&record).unwrap();

        let order = [
            "timestamp_iso",
            "timestamp_epoch_ms",
            "device_handle",
            "device_name",
            "usage_page",
            "usage",
            "report_size",
            "report_hex",
            "axes",
            "buttons",
        ];
        let mut last = 0;
        for key in order {
            let at = json
                .find(&format!("\"{key}\""))
                .unwrap_or_else(|| panic!("missing field {key}"));
            assert!(at >= last, "field {key} out of order");
            last = at;
        }
    }
}
