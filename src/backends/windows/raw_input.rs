#![cfg(target_os = "windows")]

//! Raw Input message pump and device queries.
//!
//! [`WinRawInputSource`] owns a hidden message-only window registered for the
//! Generic Desktop joystick (0x04) and gamepad (0x05) application usages with
//! `RIDEV_INPUTSINK`, so input arrives even while unfocused. `WM_INPUT`
//! payloads of type `RIM_TYPEHID` become [`InputBatch`]es; everything else is
//! dispatched and ignored.
//!
//! Handles are exposed as plain `u64` identities. They are never
//! dereferenced, only compared, formatted, and passed back to the Raw Input
//! query APIs.

use core::ffi::c_void;
use core::mem::size_of;

use log::{debug, warn};
use thiserror::Error;

use windows_sys::Win32::Foundation::{GetLastError, HANDLE, LPARAM, LRESULT, WPARAM};
use windows_sys::Win32::System::LibraryLoader::GetModuleHandleW;
use windows_sys::Win32::UI::Input::{
    GetRawInputData, GetRawInputDeviceInfoW, GetRawInputDeviceList, RegisterRawInputDevices,
    HRAWINPUT, RAWHID, RAWINPUTDEVICE, RAWINPUTDEVICELIST, RAWINPUTHEADER, RIDEV_INPUTSINK,
    RIDI_DEVICEINFO, RIDI_DEVICENAME, RIDI_PREPARSEDDATA, RID_DEVICE_INFO, RID_INPUT,
    RIM_TYPEHID,
};
use windows_sys::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DefWindowProcW, DestroyWindow, DispatchMessageW, GetMessageW,
    RegisterClassW, TranslateMessage, HWND_MESSAGE, MSG, WM_INPUT, WNDCLASSW,
};

use crate::backends::windows::hidp::HidpDescriptor;
use crate::caps::ReportDescriptor;
use crate::source::{DeviceEntry, DeviceHandle, DeviceIdentity, InputBatch, RawInputSource};
use crate::usages::{USAGE_GAMEPAD, USAGE_JOYSTICK, USAGE_PAGE_GENERIC_DESKTOP};

const WINDOW_CLASS: &str = "JoylogRawInputWindow";

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("{call} failed (win32 error {code})")]
    Win32 { call: &'static str, code: u32 },
}

fn last_error(call: &'static str) -> BackendError {
    BackendError::Win32 {
        call,
        code: unsafe { GetLastError() },
    }
}

/// Blocking Raw Input source for joysticks and gamepads.
pub struct WinRawInputSource {
    hwnd: windows_sys::Win32::Foundation::HWND,
}

impl WinRawInputSource {
    /// Create the message-only window and register for joystick/gamepad
    /// raw input.
    pub fn new() -> Result<Self, BackendError> {
        let hwnd = create_message_window()?;
        register_raw_input(hwnd)?;
        Ok(Self { hwnd })
    }

    fn query_info(&self, handle: DeviceHandle, command: u32) -> Option<Vec<u8>> {
        unsafe {
            let hdev = handle as usize as HANDLE;
            let mut size: u32 = 0;
            let r0 = GetRawInputDeviceInfoW(hdev, command, core::ptr::null_mut(), &mut size);
            if r0 == u32::MAX || size == 0 {
                return None;
            }
            // RIDI_DEVICENAME sizes in WCHARs, the others in bytes.
            let byte_len = if command == RIDI_DEVICENAME {
                size as usize * 2
            } else {
                size as usize
            };
            let mut buf = vec![0u8; byte_len];
            let r1 =
                GetRawInputDeviceInfoW(hdev, command, buf.as_mut_ptr() as *mut c_void, &mut size);
            if r1 == u32::MAX {
                return None;
            }
            Some(buf)
        }
    }
}

impl Drop for WinRawInputSource {
    fn drop(&mut self) {
        unsafe {
            DestroyWindow(self.hwnd);
        }
    }
}

impl RawInputSource for WinRawInputSource {
    fn devices(&self) -> Vec<DeviceEntry> {
        let mut entries = Vec::new();
        unsafe {
            let mut count: u32 = 0;
            let r = GetRawInputDeviceList(
                core::ptr::null_mut(),
                &mut count,
                size_of::<RAWINPUTDEVICELIST>() as u32,
            );
            if r == u32::MAX || count == 0 {
                return entries;
            }
            let mut list: Vec<RAWINPUTDEVICELIST> = vec![core::mem::zeroed(); count as usize];
            let r = GetRawInputDeviceList(
                list.as_mut_ptr(),
                &mut count,
                size_of::<RAWINPUTDEVICELIST>() as u32,
            );
            if r == u32::MAX {
                return entries;
            }
            list.truncate(count as usize);

            for item in list {
                if item.dwType != RIM_TYPEHID {
                    continue;
                }
                let handle = item.hDevice as usize as DeviceHandle;
                entries.push(DeviceEntry {
                    handle,
                    name: self.device_name(handle),
                    identity: self.device_identity(handle),
                });
            }
        }
        entries
    }

    fn device_name(&self, handle: DeviceHandle) -> String {
        let Some(buf) = self.query_info(handle, RIDI_DEVICENAME) else {
            return String::new();
        };
        let wide: Vec<u16> = buf
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&w| w != 0)
            .collect();
        String::from_utf16_lossy(&wide)
    }

    fn device_identity(&self, handle: DeviceHandle) -> Option<DeviceIdentity> {
        let buf = self.query_info(handle, RIDI_DEVICEINFO)?;
        if buf.len() < size_of::<RID_DEVICE_INFO>() {
            return None;
        }
        let info: RID_DEVICE_INFO =
            unsafe { core::ptr::read_unaligned(buf.as_ptr() as *const RID_DEVICE_INFO) };
        if info.dwType != RIM_TYPEHID {
            return None;
        }
        let hid = unsafe { info.Anonymous.hid };
        Some(DeviceIdentity {
            vendor_id: hid.dwVendorId,
            product_id: hid.dwProductId,
            usage_page: hid.usUsagePage,
            usage: hid.usUsage,
        })
    }

    fn descriptor(&self, handle: DeviceHandle) -> Option<Box<dyn ReportDescriptor>> {
        let blob = self.query_info(handle, RIDI_PREPARSEDDATA)?;
        match HidpDescriptor::new(blob) {
            Ok(descriptor) => Some(Box::new(descriptor)),
            Err(err) => {
                warn!("device {handle:#x}: preparsed data rejected: {err}");
                None
            }
        }
    }

    /// Pump messages until a HID `WM_INPUT` arrives or the loop quits.
    fn next_batch(&mut self) -> Option<InputBatch> {
        unsafe {
            let mut msg: MSG = core::mem::zeroed();
            loop {
                let ret = GetMessageW(&mut msg, core::ptr::null_mut(), 0, 0);
                if ret == 0 || ret == -1 {
                    return None;
                }
                if msg.message == WM_INPUT {
                    if let Some(batch) = read_wm_input(msg.lParam) {
                        return Some(batch);
                    }
                    continue;
                }
                TranslateMessage(&msg);
                DispatchMessageW(&msg);
            }
        }
    }
}

/// Read and segment a `WM_INPUT` payload into an [`InputBatch`].
///
/// Non-HID packets (keyboard/mouse sneaking through) and malformed buffers
/// yield `None`.
fn read_wm_input(lparam: LPARAM) -> Option<InputBatch> {
    unsafe {
        let mut size: u32 = 0;
        let r0 = GetRawInputData(
            lparam as HRAWINPUT,
            RID_INPUT,
            core::ptr::null_mut(),
            &mut size,
            size_of::<RAWINPUTHEADER>() as u32,
        );
        if r0 == u32::MAX || size == 0 {
            return None;
        }

        let mut buf = vec![0u8; size as usize];
        let r1 = GetRawInputData(
            lparam as HRAWINPUT,
            RID_INPUT,
            buf.as_mut_ptr() as *mut c_void,
            &mut size,
            size_of::<RAWINPUTHEADER>() as u32,
        );
        if r1 == u32::MAX {
            return None;
        }

        let hdr_sz = size_of::<RAWINPUTHEADER>();
        if buf.len() < hdr_sz + size_of::<RAWHID>() {
            return None;
        }
        let hdr: RAWINPUTHEADER = core::ptr::read_unaligned(buf.as_ptr() as *const RAWINPUTHEADER);
        if hdr.dwType != RIM_TYPEHID {
            return None;
        }

        let hid: RAWHID = core::ptr::read_unaligned(buf.as_ptr().add(hdr_sz) as *const RAWHID);
        // Report bytes start right after the two RAWHID length fields.
        let data_at = hdr_sz + 8;
        let total = (hid.dwSizeHid as usize).saturating_mul(hid.dwCount as usize);
        let end = data_at.saturating_add(total).min(buf.len());
        if data_at >= end {
            return None;
        }

        debug!(
            "WM_INPUT: device {:#x}, {} report(s) of {} byte(s)",
            hdr.hDevice as usize, hid.dwCount, hid.dwSizeHid
        );
        Some(InputBatch {
            handle: hdr.hDevice as usize as DeviceHandle,
            data: buf[data_at..end].to_vec(),
            report_size: hid.dwSizeHid,
            report_count: hid.dwCount,
        })
    }
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(core::iter::once(0)).collect()
}

fn create_message_window() -> Result<windows_sys::Win32::Foundation::HWND, BackendError> {
    unsafe {
        let hinstance = GetModuleHandleW(core::ptr::null());
        let class_name = wide(WINDOW_CLASS);

        let mut class: WNDCLASSW = core::mem::zeroed();
        class.lpfnWndProc = Some(default_wnd_proc);
        class.hInstance = hinstance;
        class.lpszClassName = class_name.as_ptr();
        // Re-registering an existing class fails; that's fine, the class is
        // process-global.
        RegisterClassW(&class);

        let hwnd = CreateWindowExW(
            0,
            class_name.as_ptr(),
            class_name.as_ptr(),
            0,
            0,
            0,
            0,
            0,
            HWND_MESSAGE,
            core::ptr::null_mut(),
            hinstance,
            core::ptr::null(),
        );
        if hwnd.is_null() {
            return Err(last_error("CreateWindowExW"));
        }
        Ok(hwnd)
    }
}

unsafe extern "system" fn default_wnd_proc(
    hwnd: windows_sys::Win32::Foundation::HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    DefWindowProcW(hwnd, msg, wparam, lparam)
}

fn register_raw_input(
    hwnd: windows_sys::Win32::Foundation::HWND,
) -> Result<(), BackendError> {
    let devices = [
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_JOYSTICK,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
        RAWINPUTDEVICE {
            usUsagePage: USAGE_PAGE_GENERIC_DESKTOP,
            usUsage: USAGE_GAMEPAD,
            dwFlags: RIDEV_INPUTSINK,
            hwndTarget: hwnd,
        },
    ];
    let ok = unsafe {
        RegisterRawInputDevices(
            devices.as_ptr(),
            devices.len() as u32,
            size_of::<RAWINPUTDEVICE>() as u32,
        )
    };
    if ok == 0 {
        return Err(last_error("RegisterRawInputDevices"));
    }
    Ok(())
}
