use windows::core::PWSTR;
use windows::Win32::System::Com::{CoInitializeEx, CoTaskMemFree, CoUninitialize, COINIT_MULTITHREADED};

/// Joins the multithreaded apartment for the current thread's scope.
///
/// If the thread already lives in another apartment, COM is usable as is and
/// nothing is undone on drop.
pub(crate) struct ComGuard {
    owned: bool,
}

impl ComGuard {
    pub(crate) fn enter() -> Self {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr.is_err() {
            log::debug!("CoInitializeEx returned {:?}; using existing apartment", hr);
        }
        Self { owned: hr.is_ok() }
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        if self.owned {
            unsafe {
                CoUninitialize();
            }
        }
    }
}

/// Copy a COM-allocated wide string (e.g. from `IMMDevice::GetId`) and free it.
///
/// # Safety
/// `value` must be null or a NUL-terminated string allocated with the COM task
/// allocator that the caller owns.
pub(crate) unsafe fn take_co_string(value: PWSTR) -> Option<String> {
    if value.is_null() {
        return None;
    }
    let text = value.to_string().ok();
    CoTaskMemFree(Some(value.0 as *const _));
    text
}
