//! Per-device decode state and the handle-keyed device cache.
//!
//! A [`DeviceState`] is built once, the first time a handle produces input,
//! and is never mutated afterwards: name, identity, descriptor, and parsed
//! capability tables are all fixed for the device session. The
//! [`DeviceRegistry`] owns every state for the process lifetime; nothing is
//! evicted, which is fine for a single-run logging tool.

use std::collections::HashMap;

use log::{debug, warn};

use crate::caps::{ButtonCap, ReportDescriptor, ValueCap};
use crate::decode::{decode_report, DecodedReport};
use crate::source::{DeviceHandle, DeviceIdentity, RawInputSource};

/// Everything the decoder needs to know about one device, resolved once.
pub struct DeviceState {
    pub handle: DeviceHandle,
    pub name: String,
    pub identity: Option<DeviceIdentity>,
    descriptor: Option<Box<dyn ReportDescriptor>>,
    value_caps: Vec<ValueCap>,
    button_caps: Vec<ButtonCap>,
}

impl DeviceState {
    /// Resolve a device's metadata and capability tables through `source`.
    ///
    /// Best-effort: a failed name or identity query leaves the field empty,
    /// and a missing or unparseable descriptor leaves the capability tables
    /// empty, in which case every report from this device decodes to empty
    /// axes and buttons rather than erroring.
    pub fn resolve(handle: DeviceHandle, source: &dyn RawInputSource) -> Self {
        let name = source.device_name(handle);
        let identity = source.device_identity(handle);
        let descriptor = source.descriptor(handle);

        let (value_caps, button_caps) = match descriptor.as_deref().map(|d| d.caps()) {
            Some(Ok(caps)) => (caps.value_caps, caps.button_caps),
            Some(Err(err)) => {
                warn!("device {handle:#x} ({name:?}): capability parse failed: {err}");
                (Vec::new(), Vec::new())
            }
            None => {
                warn!("device {handle:#x} ({name:?}): no capability descriptor");
                (Vec::new(), Vec::new())
            }
        };

        Self {
            handle,
            name,
            identity,
            descriptor,
            value_caps,
            button_caps,
        }
    }

    /// Decode one input report against this device's capability tables.
    ///
    /// A device without a usable descriptor yields an empty decode.
    pub fn decode(&self, report: &[u8]) -> DecodedReport {
        match self.descriptor.as_deref() {
            Some(descriptor) => {
                decode_report(descriptor, &self.value_caps, &self.button_caps, report)
            }
            None => DecodedReport::default(),
        }
    }

    pub fn value_caps(&self) -> &[ValueCap] {
        &self.value_caps
    }

    pub fn button_caps(&self) -> &[ButtonCap] {
        &self.button_caps
    }
}

enum CacheSlot {
    Admitted(DeviceState),
    Filtered,
}

/// Handle-keyed device cache with an optional one-time name filter.
///
/// The filter is a case-insensitive substring match on the display name,
/// evaluated exactly once when a handle is first seen. A rejected handle is
/// remembered so its events are dropped without re-querying the platform.
/// If the platform ever reuses a handle value for a different physical device
/// within one run, the stale state would be served; that limitation is
/// accepted for a single-run tool.
pub struct DeviceRegistry {
    filter: Option<String>,
    cache: HashMap<DeviceHandle, CacheSlot>,
}

impl DeviceRegistry {
    /// `filter` is matched case-insensitively as a substring of the device
    /// display name; `None` admits every device.
    pub fn new(filter: Option<&str>) -> Self {
        Self {
            filter: filter.map(|f| f.to_lowercase()),
            cache: HashMap::new(),
        }
    }

    /// Look up the state for `handle`, resolving it on first sight.
    ///
    /// Returns `None` for handles rejected by the name filter, now or at any
    /// earlier point in the run.
    pub fn get_or_resolve(
        &mut self,
        handle: DeviceHandle,
        source: &dyn RawInputSource,
    ) -> Option<&DeviceState> {
        if !self.cache.contains_key(&handle) {
            let state = DeviceState::resolve(handle, source);
            let slot = if self.matches(&state.name) {
                debug!("device {handle:#x} admitted: {:?}", state.name);
                CacheSlot::Admitted(state)
            } else {
                debug!(
                    "device {handle:#x} rejected by filter {:?}: {:?}",
                    self.filter, state.name
                );
                CacheSlot::Filtered
            };
            self.cache.insert(handle, slot);
        }

        match self.cache.get(&handle) {
            Some(CacheSlot::Admitted(state)) => Some(state),
            _ => None,
        }
    }

    /// Number of admitted devices seen so far.
    pub fn admitted(&self) -> usize {
        self.cache
            .values()
            .filter(|slot| matches!(slot, CacheSlot::Admitted(_)))
            .count()
    }

    fn matches(&self, name: &str) -> bool {
        match &self.filter {
            Some(filter) => name.to_lowercase().contains(filter),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caps::CapsError;
    use crate::source::{DeviceEntry, InputBatch};
    use std::cell::Cell;

    /// Source with one fixed device and a query counter.
    struct CountingSource {
        name: String,
        queries: Cell<usize>,
    }

    impl RawInputSource for CountingSource {
        fn devices(&self) -> Vec<DeviceEntry> {
            Vec::new()
        }

        fn device_name(&self, _handle: DeviceHandle) -> String {
            self.queries.set(self.queries.get() + 1);
            self.name.clone()
        }

        fn device_identity(&self, _handle: DeviceHandle) -> Option<DeviceIdentity> {
            None
        }

        fn descriptor(&self, _handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>> {
            None
        }

        fn next_batch(&mut self) -> Option<InputBatch> {
            None
        }
    }

    #[test]
    fn filter_mismatch_drops_device_and_checks_once() {
        let source = CountingSource {
            name: "Logitech Gamepad".into(),
            queries: Cell::new(0),
        };
        let mut registry = DeviceRegistry::new(Some("Thrustmaster"));

        assert!(registry.get_or_resolve(0x10, &source).is_none());
        assert!(registry.get_or_resolve(0x10, &source).is_none());
        assert!(registry.get_or_resolve(0x10, &source).is_none());
        // Resolved exactly once, rejection remembered.
        assert_eq!(source.queries.get(), 1);
        assert_eq!(registry.admitted(), 0);
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let source = CountingSource {
            name: "Thrustmaster T.16000M".into(),
            queries: Cell::new(0),
        };
        let mut registry = DeviceRegistry::new(Some("thrustMASTER"));
        assert!(registry.get_or_resolve(0x20, &source).is_some());
        assert_eq!(registry.admitted(), 1);
    }

    #[test]
    fn cache_hit_does_not_requery() {
        let source = CountingSource {
            name: "Pad".into(),
            queries: Cell::new(0),
        };
        let mut registry = DeviceRegistry::new(None);
        for _ in 0..5 {
            assert!(registry.get_or_resolve(0x30, &source).is_some());
        }
        assert_eq!(source.queries.get(), 1);
    }

    #[test]
    fn missing_descriptor_decodes_empty() {
        let source = CountingSource {
            name: "Pad".into(),
            queries: Cell::new(0),
        };
        let state = DeviceState::resolve(0x40, &source);
        let decoded = state.decode(&[0xFF; 8]);
        assert!(decoded.axes.is_empty());
        assert!(decoded.buttons.is_empty());
    }

    /// Descriptor whose capability parse always fails.
    struct BrokenDescriptor;

    impl ReportDescriptor for BrokenDescriptor {
        fn caps(&self) -> Result<crate::caps::DeviceCaps, CapsError> {
            Err(CapsError::QueryFailed(0xC011_0000))
        }

        fn usage_value(&self, _report: &[u8], _page: u16, _usage: u16) -> Option<i64> {
            None
        }

        fn usages_on(&self, _report: &[u8], _page: u16, _lc: u16, _max: usize) -> Vec<u16> {
            Vec::new()
        }
    }

    struct BrokenCapsSource;

    impl RawInputSource for BrokenCapsSource {
        fn devices(&self) -> Vec<DeviceEntry> {
            Vec::new()
        }

        fn device_name(&self, _handle: DeviceHandle) -> String {
            "Haunted Stick".into()
        }

        fn device_identity(&self, _handle: DeviceHandle) -> Option<DeviceIdentity> {
            None
        }

        fn descriptor(&self, _handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>> {
            Some(Box::new(BrokenDescriptor))
        }

        fn next_batch(&mut self) -> Option<InputBatch> {
            None
        }
    }

    #[test]
    fn caps_failure_still_caches_device_with_empty_tables() {
        let mut registry = DeviceRegistry::new(None);
        let state = registry.get_or_resolve(0x50, &BrokenCapsSource).unwrap();
        assert_eq!(state.name, "Haunted Stick");
        assert!(state.value_caps().is_empty());
        assert!(state.button_caps().is_empty());
        assert!(state.decode(&[1, 2, 3]).axes.is_empty());
    }
}
