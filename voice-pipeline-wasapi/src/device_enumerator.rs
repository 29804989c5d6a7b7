//! Windows audio endpoint enumeration via the MMDevice API.

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use voice_pipeline_core::models::device::Device;
use voice_pipeline_core::models::error::DeviceEnumerationError;

use crate::com::take_co_string;

/// Lists active capture and render endpoints.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> Result<Self, DeviceEnumerationError> {
        let enumerator: IMMDeviceEnumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(|e| DeviceEnumerationError(format!("failed to create enumerator: {}", e)))?;
        Ok(Self { enumerator })
    }

    /// Capture endpoints first, then render endpoints, each in platform order.
    pub fn list_devices(&self) -> Result<Vec<Device>, DeviceEnumerationError> {
        let mut devices = self.list(eCapture)?;
        devices.extend(self.list(eRender)?);
        Ok(devices)
    }

    fn list(&self, data_flow: EDataFlow) -> Result<Vec<Device>, DeviceEnumerationError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow, DEVICE_STATE_ACTIVE)
                .map_err(|e| DeviceEnumerationError(format!("EnumAudioEndpoints failed: {}", e)))?;
            let count = collection
                .GetCount()
                .map_err(|e| DeviceEnumerationError(format!("GetCount failed: {}", e)))?;

            let mut devices = Vec::with_capacity(count as usize);
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(id) = device.GetId().ok().and_then(|id| take_co_string(id)) else {
                    continue;
                };
                let name = friendly_name(&device).unwrap_or_else(|| format!("Audio device {}", i + 1));
                devices.push(if data_flow == eCapture {
                    Device::capture(id, name)
                } else {
                    Device::render(id, name)
                });
            }
            Ok(devices)
        }
    }
}

/// Read PKEY_Device_FriendlyName from the device's property store.
fn friendly_name(device: &IMMDevice) -> Option<String> {
    unsafe {
        let store = device.OpenPropertyStore(STGM_READ).ok()?;
        let value = store.GetValue(&PKEY_Device_FriendlyName).ok()?;
        let name = value.to_string();
        (!name.is_empty()).then_some(name)
    }
}
