//! Settings for the preview engine
//!
//! This module provides two layers:
//! - **snapshot**: the typed, read-only [`Settings`] view consumed by the state machines
//! - **store**: the key/value persistence behind it ([`SettingsStore`])

pub mod snapshot;
pub mod store;

// Re-export commonly used types
pub use snapshot::{IconSize, SettingKey, Settings};
pub use store::{JsonFileStore, MemoryStore, RawSettings, SettingsStore, StoreError};
