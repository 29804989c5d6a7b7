use serde::{Deserialize, Serialize};

/// Direction of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Capture,
    Render,
}

/// A physical audio endpoint as reported by the platform.
///
/// Immutable once observed. A fresh enumeration replaces the whole catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub id: String,
    pub direction: Direction,
    pub display_name: String,
}

impl Device {
    pub fn capture(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Capture,
            display_name: display_name.into(),
        }
    }

    pub fn render(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            direction: Direction::Render,
            display_name: display_name.into(),
        }
    }
}

/// Format actually delivered by an open capture, i.e. the raw input of the effect graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Interleaved samples per second.
    pub fn samples_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize
    }
}
