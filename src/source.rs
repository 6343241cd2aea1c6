//! The platform boundary: where raw input batches and device metadata come
//! from.
//!
//! The decoding core never touches an OS API directly. Everything it needs —
//! enumeration, device names, identity, capability descriptors, and the
//! blocking stream of input batches — comes through [`RawInputSource`], so a
//! session can run against the Windows Raw Input backend, a replay file, or a
//! scripted source in tests without changing a line of decode logic.

use crate::caps::ReportDescriptor;

/// Stable, opaque identity of a device handle.
///
/// On Windows this is the numeric value of the raw input `HANDLE`. It is
/// compared and formatted, never dereferenced.
pub type DeviceHandle = u64;

/// Vendor/product identity plus the device's top-level HID usage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u32,
    pub product_id: u32,
    pub usage_page: u16,
    pub usage: u16,
}

/// One enumerated device, as reported by [`RawInputSource::devices`].
#[derive(Clone, Debug)]
pub struct DeviceEntry {
    pub handle: DeviceHandle,
    pub name: String,
    pub identity: Option<DeviceIdentity>,
}

/// One hardware notification: a contiguous blob of `report_count` input
/// reports of `report_size` bytes each, from a single device.
#[derive(Clone, Debug)]
pub struct InputBatch {
    pub handle: DeviceHandle,
    pub data: Vec<u8>,
    pub report_size: u32,
    pub report_count: u32,
}

/// Abstract raw-input provider.
///
/// Metadata queries are best-effort: a name query that fails yields an empty
/// string, identity and descriptor queries yield `None`. The session treats
/// all of those as a device with degraded, still-loggable fields.
pub trait RawInputSource {
    /// Enumerate currently connected HID input devices.
    fn devices(&self) -> Vec<DeviceEntry>;

    /// Display name for a device handle (empty when unavailable).
    fn device_name(&self, handle: DeviceHandle) -> String;

    /// Vendor/product identity for a device handle.
    fn device_identity(&self, handle: DeviceHandle) -> Option<DeviceIdentity>;

    /// Capability descriptor for a device handle, parsed once per session.
    fn descriptor(&self, handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>>;

    /// Block until the next input batch arrives. `None` means the stream has
    /// ended and the session should wind down.
    fn next_batch(&mut self) -> Option<InputBatch>;
}
