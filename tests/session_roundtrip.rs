//! End-to-end: a scripted raw-input source driven through a full logging
//! session into both output formats.

use joylog::caps::{ButtonCap, CapabilityUsage, ReportDescriptor, ValueCap};
use joylog::packed::{DescriptorBuilder, PackedDescriptor};
use joylog::source::{DeviceEntry, DeviceHandle, DeviceIdentity, InputBatch, RawInputSource};
use joylog::usages::USAGE_PAGE_GENERIC_DESKTOP;
use joylog::writer::{EventWriter, OutputFormat};
use joylog::LogSession;

const STICK: DeviceHandle = 0x1A2B;
const PAD: DeviceHandle = 0x3C4D;

/// Two devices: a joystick with signed 16-bit X/Y plus 8 buttons, and a
/// gamepad that the name filter is expected to reject.
struct TwoDeviceSource {
    batches: Vec<InputBatch>,
    stick_blob: Vec<u8>,
}

impl TwoDeviceSource {
    fn new(batches: Vec<InputBatch>) -> Self {
        let stick_blob = DescriptorBuilder::new(USAGE_PAGE_GENERIC_DESKTOP, 0x04, 5)
            .value(ValueCap {
                usage_page: USAGE_PAGE_GENERIC_DESKTOP,
                usage: CapabilityUsage::Single(0x30),
                link_collection: 0,
                logical_min: -32768,
                logical_max: 32767,
                bit_offset: 0,
                bit_size: 16,
            })
            .value(ValueCap {
                usage_page: USAGE_PAGE_GENERIC_DESKTOP,
                usage: CapabilityUsage::Single(0x31),
                link_collection: 0,
                logical_min: -32768,
                logical_max: 32767,
                bit_offset: 16,
                bit_size: 16,
            })
            .button(ButtonCap {
                usage_page: 0x09,
                usage: CapabilityUsage::Range(1, 8),
                link_collection: 0,
                bit_offset: 32,
            })
            .build();
        Self {
            batches,
            stick_blob,
        }
    }
}

impl RawInputSource for TwoDeviceSource {
    fn devices(&self) -> Vec<DeviceEntry> {
        vec![
            DeviceEntry {
                handle: STICK,
                name: self.device_name(STICK),
                identity: self.device_identity(STICK),
            },
            DeviceEntry {
                handle: PAD,
                name: self.device_name(PAD),
                identity: self.device_identity(PAD),
            },
        ]
    }

    fn device_name(&self, handle: DeviceHandle) -> String {
        match handle {
            STICK => "Thrustmaster T.16000M".into(),
            PAD => "Logitech Gamepad F310".into(),
            _ => String::new(),
        }
    }

    fn device_identity(&self, handle: DeviceHandle) -> Option<DeviceIdentity> {
        match handle {
            STICK => Some(DeviceIdentity {
                vendor_id: 0x044F,
                product_id: 0xB10A,
                usage_page: 0x01,
                usage: 0x04,
            }),
            PAD => Some(DeviceIdentity {
                vendor_id: 0x046D,
                product_id: 0xC216,
                usage_page: 0x01,
                usage: 0x05,
            }),
            _ => None,
        }
    }

    fn descriptor(&self, handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>> {
        if handle != STICK {
            return None;
        }
        PackedDescriptor::from_bytes(self.stick_blob.clone())
            .ok()
            .map(|d| Box::new(d) as Box<dyn ReportDescriptor>)
    }

    fn next_batch(&mut self) -> Option<InputBatch> {
        if self.batches.is_empty() {
            None
        } else {
            Some(self.batches.remove(0))
        }
    }
}

fn stick_report(x: i16, y: i16, buttons: u8) -> Vec<u8> {
    let mut report = Vec::with_capacity(5);
    report.extend_from_slice(&x.to_le_bytes());
    report.extend_from_slice(&y.to_le_bytes());
    report.push(buttons);
    report
}

#[test]
fn jsonl_session_decodes_and_filters() {
    let mut first = stick_report(0, 16384, 0b0000_0011);
    first.extend(stick_report(-32768, 32767, 0));
    let batches = vec![
        InputBatch {
            handle: STICK,
            data: first,
            report_size: 5,
            report_count: 2,
        },
        // The gamepad is filtered out by name; nothing may be emitted.
        InputBatch {
            handle: PAD,
            data: vec![0xFF; 5],
            report_size: 5,
            report_count: 1,
        },
    ];
    let mut source = TwoDeviceSource::new(batches);

    let writer = EventWriter::new(Vec::new(), OutputFormat::Jsonl).unwrap();
    let mut session = LogSession::new(writer, Some("thrustmaster"), false);
    session.run(&mut source).unwrap();
    assert_eq!(session.records_written(), 2);

    let out = String::from_utf8(session.finish().unwrap().into_inner()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);

    let rec: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(rec["device_handle"], "0x1a2b");
    assert_eq!(rec["device_name"], "Thrustmaster T.16000M");
    assert_eq!(rec["usage_page"], 1);
    assert_eq!(rec["usage"], 4);
    assert_eq!(rec["report_size"], 5);
    assert_eq!(rec["report_hex"], "0000004003");
    assert_eq!(rec["axes"]["x"]["raw"], 0);
    assert_eq!(rec["axes"]["y"]["raw"], 16384);
    assert_eq!(rec["buttons"], serde_json::json!([1, 2]));

    let rec: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
    assert_eq!(rec["axes"]["x"]["raw"], -32768);
    assert_eq!(rec["axes"]["x"]["norm"], -1.0);
    assert_eq!(rec["axes"]["y"]["raw"], 32767);
    assert_eq!(rec["axes"]["y"]["norm"], 1.0);
    assert_eq!(rec["buttons"], serde_json::json!([]));
}

#[test]
fn csv_session_writes_header_and_rows() {
    let batches = vec![InputBatch {
        handle: STICK,
        data: stick_report(100, -100, 0b1000_0000),
        report_size: 5,
        report_count: 1,
    }];
    let mut source = TwoDeviceSource::new(batches);

    let writer = EventWriter::new(Vec::new(), OutputFormat::Csv).unwrap();
    let mut session = LogSession::new(writer, None, false);
    session.run(&mut source).unwrap();

    let out = String::from_utf8(session.finish().unwrap().into_inner()).unwrap();
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("timestamp_iso,timestamp_epoch_ms,device_handle,"));
    assert!(lines[1].contains("0x1a2b"));
    assert!(lines[1].contains("Thrustmaster T.16000M"));
    // Button 8 pressed; a single-element JSON array needs no CSV quoting.
    assert!(lines[1].ends_with(",[8]"));
}

#[test]
fn device_without_descriptor_still_logs_raw_reports() {
    let batches = vec![InputBatch {
        handle: PAD,
        data: vec![0xAB, 0xCD],
        report_size: 2,
        report_count: 1,
    }];
    let mut source = TwoDeviceSource::new(batches);

    let writer = EventWriter::new(Vec::new(), OutputFormat::Jsonl).unwrap();
    let mut session = LogSession::new(writer, None, false);
    session.run(&mut source).unwrap();

    let out = String::from_utf8(session.finish().unwrap().into_inner()).unwrap();
    let rec: serde_json::Value = serde_json::from_str(out.lines().next().unwrap()).unwrap();
    assert_eq!(rec["report_hex"], "abcd");
    assert_eq!(rec["axes"], serde_json::json!({}));
    assert_eq!(rec["buttons"], serde_json::json!([]));
}
