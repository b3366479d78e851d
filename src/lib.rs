//! Hover link preview engine
//!
//! Hovering a link shows a small icon near the cursor; hovering the icon opens
//! a floating panel with the link target. Everything here is the state
//! machinery behind that: timers on a virtual clock, URL identity tracking
//! across fast pointer movement, lock handling and the side effects on the
//! host page, which go through [`surface::PreviewSurface`].

pub mod constants;
pub mod context;
pub mod controller;
pub mod embed;
pub mod frame;
pub mod frame_headers;
pub mod hover;
pub mod icon;
pub mod layout;
pub mod logging;
pub mod messages;
pub mod settings;
pub mod simulate;
pub mod surface;
pub mod timer;

pub use controller::PageController;
pub use messages::{ControllerMessage, HostRequest, MessageResponse, PageEvent, PanelControl};
pub use settings::{MemoryStore, Settings, SettingsStore};
pub use surface::{PreviewSurface, RecordingSurface};
