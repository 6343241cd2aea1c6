//! joylog — descriptor-driven HID input report decoding and logging.
//!
//! Game controllers emit fixed-size, bit-packed input reports whose layout is
//! described by a per-device capability descriptor rather than fixed at
//! compile time. This crate parses such descriptors into capability tables,
//! extracts and normalizes axis values, expands pressed-button sets, and logs
//! one record per report to CSV or JSON-lines.
//!
//! The decoding core is platform-agnostic: it talks to the OS only through
//! [`source::RawInputSource`] and to descriptors only through
//! [`caps::ReportDescriptor`]. The Windows Raw Input backend lives in
//! [`backends::windows`]; tests drive the same core with synthetic
//! descriptors built by [`packed::DescriptorBuilder`].

pub mod backends;
pub mod caps;
pub mod config;
pub mod decode;
pub mod device;
pub mod packed;
pub mod record;
pub mod session;
pub mod source;
pub mod usages;
pub mod writer;

pub use caps::*;
pub use decode::*;
pub use device::*;
pub use record::*;
pub use session::*;
pub use source::*;
pub use writer::*;
