//! Platform backends.
//!
//! Implementations of [`RawInputSource`](crate::source::RawInputSource) for
//! platform-specific input delivery. Only Windows has one today; on other
//! platforms the decoding core, writers, and CLI still build, and sessions
//! run against replay or synthetic sources.

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;
