use serde::{Deserialize, Serialize};

/// What kind of surface is being captured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum CaptureTarget {
    /// A single browser tab.
    Tab {
        /// Host-assigned tab id.
        tab_id: u64,
    },
    /// An application window.
    Window,
    /// A whole display.
    Screen,
    /// A rectangle within a tab.
    Region {
        /// Host-assigned tab id.
        tab_id: u64,
        /// Left edge in CSS pixels.
        x: u32,
        /// Top edge in CSS pixels.
        y: u32,
        /// Width in CSS pixels.
        width: u32,
        /// Height in CSS pixels.
        height: u32,
    },
}

/// Opaque reference to a capture target, as returned by the platform picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDescriptor {
    /// Stream id handed out by the picker.
    pub source_id: String,
    /// Kind of surface the id refers to.
    pub target: CaptureTarget,
}

impl SourceDescriptor {
    /// Creates a descriptor for `source_id`.
    pub fn new(source_id: impl Into<String>, target: CaptureTarget) -> Self {
        Self {
            source_id: source_id.into(),
            target,
        }
    }
}
