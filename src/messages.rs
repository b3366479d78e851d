//! Everything that crosses the controller boundary
//!
//! Page events come from the host page, controller messages from the rest of
//! the extension. Host requests go the other way and are drained by the host.

use serde::{Deserialize, Serialize};

use crate::hover::Node;
use crate::surface::{HistoryDirection, Point};

/// Buttons and handles on the panel chrome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelControl {
    Back,
    Forward,
    OpenInNewTab,
    TogglePin,
    Hide,
    Resize { width_px: u32 },
}

impl PanelControl {
    pub fn history_direction(self) -> Option<HistoryDirection> {
        match self {
            Self::Back => Some(HistoryDirection::Back),
            Self::Forward => Some(HistoryDirection::Forward),
            _ => None,
        }
    }
}

/// Input from the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PageEvent {
    PointerMove { at: Point },
    /// `path` starts at the event target and walks up through its ancestors
    PointerOver { path: Vec<Node> },
    PointerOut { node: Node },
    IconEnter,
    IconLeave,
    PanelEnter,
    PanelLeave,
    PanelControl { control: PanelControl },
    /// Completion of a [`HostRequest::ResolveShortUrl`]; `None` when resolution failed
    ShortUrlResolved { original: String, resolved: Option<String> },
}

/// Runtime message from the rest of the extension
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControllerMessage {
    SettingsChanged,
    UpdatePreviewEnabled { enabled: bool },
    UpdateKeepPreviewFrameOpen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MessageResponse {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Work the controller needs the host to do asynchronously
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request", rename_all = "snake_case")]
pub enum HostRequest {
    /// Answer with [`PageEvent::ShortUrlResolved`]
    ResolveShortUrl { url: String },
    /// Tell the other tabs to re-read the persisted lock
    BroadcastLockChanged { locked: bool },
}
