use crate::models::device::{Device, Direction};
use crate::models::error::DeviceEnumerationError;
use crate::traits::capture_backend::CaptureBackend;

/// Known capture and render endpoints plus the user's explicit selection.
///
/// Without an explicit selection (or when the selected device is absent) the
/// first device the platform enumerated is used.
#[derive(Debug, Clone, Default)]
pub struct DeviceCatalog {
    capture: Vec<Device>,
    render: Vec<Device>,
    selected_capture: Option<String>,
    selected_render: Option<String>,
}

impl DeviceCatalog {
    /// Re-enumerate through `backend`. Returns `false` if the previous catalog was kept.
    pub fn refresh(&mut self, backend: &dyn CaptureBackend) -> bool {
        self.update(backend.enumerate_devices())
    }

    /// Replace the catalog with an enumeration result.
    ///
    /// A failed enumeration is logged and leaves the catalog untouched.
    pub fn update(&mut self, result: Result<Vec<Device>, DeviceEnumerationError>) -> bool {
        let devices = match result {
            Ok(devices) => devices,
            Err(e) => {
                log::warn!("Keeping previous device catalog: {}", e);
                return false;
            }
        };
        let (capture, render): (Vec<Device>, Vec<Device>) =
            devices.into_iter().partition(|d| d.direction == Direction::Capture);
        log::debug!(
            "Device catalog refreshed: {} capture, {} render",
            capture.len(),
            render.len()
        );
        self.capture = capture;
        self.render = render;
        true
    }

    pub fn capture_devices(&self) -> &[Device] {
        &self.capture
    }

    pub fn render_devices(&self) -> &[Device] {
        &self.render
    }

    /// Explicitly chosen capture device id, present or not.
    pub fn selected_capture(&self) -> Option<&str> {
        self.selected_capture.as_deref()
    }

    pub fn selected_render(&self) -> Option<&str> {
        self.selected_render.as_deref()
    }

    pub fn effective_capture(&self) -> Option<&Device> {
        effective(&self.capture, self.selected_capture.as_deref())
    }

    pub fn effective_render(&self) -> Option<&Device> {
        effective(&self.render, self.selected_render.as_deref())
    }

    /// Select a capture device. No-op (returns `false`) if `id` is unknown or already selected.
    pub fn select_capture(&mut self, id: &str) -> bool {
        select(&self.capture, &mut self.selected_capture, id)
    }

    pub fn select_render(&mut self, id: &str) -> bool {
        select(&self.render, &mut self.selected_render, id)
    }

    /// Reinstate persisted selections. They are kept even if the devices are
    /// currently absent, so a device plugged back in is picked up again.
    pub fn restore_selection(&mut self, capture: Option<String>, render: Option<String>) {
        self.selected_capture = capture;
        self.selected_render = render;
    }
}

fn effective<'a>(devices: &'a [Device], selected: Option<&str>) -> Option<&'a Device> {
    selected
        .and_then(|id| devices.iter().find(|d| d.id == id))
        .or_else(|| devices.first())
}

fn select(devices: &[Device], selected: &mut Option<String>, id: &str) -> bool {
    if selected.as_deref() == Some(id) || !devices.iter().any(|d| d.id == id) {
        return false;
    }
    *selected = Some(id.to_string());
    true
}
