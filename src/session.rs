//! The logging session: batches in, records out.
//!
//! Single-threaded and event-driven. Each hardware batch is segmented, every
//! contained report is decoded against the (cached) device state, and one
//! record per report goes to the sink before the next batch is taken. The
//! only blocking point is the source's wait for the next batch; stopping is
//! cooperative — the session ends when the source reports end-of-stream.

use chrono::Utc;
use log::{debug, info};

use crate::decode::split_reports;
use crate::device::DeviceRegistry;
use crate::record::EventRecord;
use crate::source::{InputBatch, RawInputSource};
use crate::writer::{EventSink, WriterError};

pub struct LogSession<S: EventSink> {
    registry: DeviceRegistry,
    sink: S,
    echo: bool,
    records_written: u64,
}

impl<S: EventSink> LogSession<S> {
    /// `filter` restricts logging to devices whose name contains it
    /// (case-insensitive); `echo` prints a one-line summary per record.
    pub fn new(sink: S, filter: Option<&str>, echo: bool) -> Self {
        Self {
            registry: DeviceRegistry::new(filter),
            sink,
            echo,
            records_written: 0,
        }
    }

    /// Drain `source` until end-of-stream.
    ///
    /// Sink errors (disk full, closed pipe) are the only way out besides
    /// end-of-stream; decode problems never abort the session.
    pub fn run(&mut self, source: &mut dyn RawInputSource) -> Result<(), WriterError> {
        info!("session started");
        while let Some(batch) = source.next_batch() {
            self.handle_batch(source, &batch)?;
        }
        self.sink.flush()?;
        info!(
            "session finished: {} records from {} device(s)",
            self.records_written,
            self.registry.admitted()
        );
        Ok(())
    }

    /// Decode and persist every report contained in one hardware batch.
    ///
    /// Batches from filtered-out devices are dropped whole; a batch whose
    /// trailing report is short logs the partial tail away silently.
    pub fn handle_batch(
        &mut self,
        source: &dyn RawInputSource,
        batch: &InputBatch,
    ) -> Result<(), WriterError> {
        let Some(device) = self.registry.get_or_resolve(batch.handle, source) else {
            return Ok(());
        };

        let reports = split_reports(&batch.data, batch.report_size, batch.report_count);
        if reports.is_empty() {
            debug!(
                "device {:#x}: batch of {} bytes yielded no complete report",
                batch.handle,
                batch.data.len()
            );
            return Ok(());
        }

        let at = Utc::now();
        for report in reports {
            let decoded = device.decode(report);
            let record = EventRecord::new(device, report, decoded, at);
            if self.echo {
                println!("{}", record.summary());
            }
            self.sink.write(&record)?;
            self.records_written += 1;
        }
        Ok(())
    }

    /// Records persisted so far.
    pub fn records_written(&self) -> u64 {
        self.records_written
    }

    /// Flush and hand back the sink.
    pub fn finish(mut self) -> Result<S, WriterError> {
        self.sink.flush()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::{ButtonCap, CapabilityUsage, ReportDescriptor, ValueCap};
    use crate::packed::{DescriptorBuilder, PackedDescriptor};
    use crate::source::{DeviceEntry, DeviceHandle, DeviceIdentity};
    use crate::usages::USAGE_PAGE_GENERIC_DESKTOP;

    /// In-memory sink capturing every record.
    #[derive(Default)]
    struct CaptureSink(Vec<EventRecord>);

    impl EventSink for CaptureSink {
        fn write(&mut self, record: &EventRecord) -> Result<(), WriterError> {
            self.0.push(record.clone());
            Ok(())
        }
    }

    /// Scripted source: one device, a fixed queue of batches.
    struct ScriptedSource {
        name: String,
        blob: Vec<u8>,
        batches: Vec<InputBatch>,
    }

    impl ScriptedSource {
        fn gamepad(batches: Vec<InputBatch>) -> Self {
            let blob = DescriptorBuilder::new(USAGE_PAGE_GENERIC_DESKTOP, 0x05, 3)
                .value(ValueCap {
                    usage_page: USAGE_PAGE_GENERIC_DESKTOP,
                    usage: CapabilityUsage::Single(0x30),
                    link_collection: 0,
                    logical_min: 0,
                    logical_max: 255,
                    bit_offset: 0,
                    bit_size: 8,
                })
                .button(ButtonCap {
                    usage_page: 0x09,
                    usage: CapabilityUsage::Range(1, 8),
                    link_collection: 0,
                    bit_offset: 8,
                })
                .build();
            Self {
                name: "Scripted Gamepad".into(),
                blob,
                batches,
            }
        }
    }

    impl RawInputSource for ScriptedSource {
        fn devices(&self) -> Vec<DeviceEntry> {
            vec![DeviceEntry {
                handle: 0x77,
                name: self.name.clone(),
                identity: self.device_identity(0x77),
            }]
        }

        fn device_name(&self, _handle: DeviceHandle) -> String {
            self.name.clone()
        }

        fn device_identity(&self, _handle: DeviceHandle) -> Option<DeviceIdentity> {
            Some(DeviceIdentity {
                vendor_id: 1,
                product_id: 2,
                usage_page: 0x01,
                usage: 0x05,
            })
        }

        fn descriptor(&self, _handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>> {
            PackedDescriptor::from_bytes(self.blob.clone())
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

    fn batch(data: Vec<u8>, report_size: u32, report_count: u32) -> InputBatch {
        InputBatch {
            handle: 0x77,
            data,
            report_size,
            report_count,
        }
    }

    #[test]
    fn one_record_per_contained_report() {
        let mut source = ScriptedSource::gamepad(vec![
            batch(vec![0x10, 0b0000_0001, 0, 0x20, 0b0000_0100, 0], 3, 2),
            batch(vec![0x30, 0, 0], 3, 1),
        ]);
        let mut session = LogSession::new(CaptureSink::default(), None, false);
        session.run(&mut source).unwrap();

        let records = session.finish().unwrap().0;
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].decoded.axes["x"].raw, 0x10);
        assert_eq!(records[0].decoded.buttons, vec![1]);
        assert_eq!(records[1].decoded.axes["x"].raw, 0x20);
        assert_eq!(records[1].decoded.buttons, vec![3]);
        assert_eq!(records[2].decoded.axes["x"].raw, 0x30);
        assert!(records[2].decoded.buttons.is_empty());
        assert_eq!(records[0].device_handle, "0x77");
        assert_eq!(records[0].report_hex, "100100");
    }

    #[test]
    fn short_trailing_report_is_dropped() {
        let mut source = ScriptedSource::gamepad(vec![batch(vec![1, 0, 0, 2, 0], 3, 2)]);
        let mut session = LogSession::new(CaptureSink::default(), None, false);
        session.run(&mut source).unwrap();
        let records = session.finish().unwrap().0;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].decoded.axes["x"].raw, 1);
    }

    #[test]
    fn filtered_device_produces_no_records() {
        let mut source = ScriptedSource::gamepad(vec![
            batch(vec![1, 0, 0], 3, 1),
            batch(vec![2, 0, 0], 3, 1),
        ]);
        let mut session = LogSession::new(CaptureSink::default(), Some("Thrustmaster"), false);
        session.run(&mut source).unwrap();
        assert_eq!(session.records_written(), 0);
        assert!(session.finish().unwrap().0.is_empty());
    }
}
