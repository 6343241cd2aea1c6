#![cfg(target_os = "windows")]

//! Windows Raw Input backend.
//!
//! - **`raw_input`** — registers a message-only window for joystick/gamepad
//!   usages and pumps `WM_INPUT` into [`InputBatch`](crate::source::InputBatch)es.
//! - **`hidp`** — wraps the platform preparsed data blob behind the
//!   [`ReportDescriptor`](crate::caps::ReportDescriptor) interface using the
//!   HIDP parser APIs.
//!
//! Most callers only need [`WinRawInputSource`] plus the platform-agnostic
//! session in [`crate::session`].

pub mod hidp;
pub mod raw_input;

pub use raw_input::WinRawInputSource;
