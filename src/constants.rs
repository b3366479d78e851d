//! Application-wide constants
//!
//! This module contains all magic numbers and string literals used throughout
//! the application, providing a single source of truth for constant values.

/// Default timer delays in milliseconds
pub mod timing {
    /// Hover time before the affordance icon appears
    pub const ICON_DISPLAY_DELAY_MS: u64 = 200;

    /// How long a visible icon stays up before it hides itself
    pub const ICON_DISPLAY_TIME_MS: u64 = 2000;

    /// Icon hover time before the preview panel opens
    pub const FRAME_DISPLAY_DELAY_MS: u64 = 500;

    /// How long the panel stays up after the pointer leaves it
    pub const FRAME_DISPLAY_TIME_MS: u64 = 2000;

    /// Debounce for reloading a displayed panel with a newly hovered link
    pub const FRAME_UPDATE_TIME_MS: u64 = 500;
}

/// Icon geometry
pub mod icon {
    /// Default horizontal offset from the cursor
    pub const DEFAULT_OFFSET_X: i32 = -30;

    /// Default vertical offset from the cursor
    pub const DEFAULT_OFFSET_Y: i32 = -30;

    pub const SMALL_PX: u32 = 16;
    pub const MEDIUM_PX: u32 = 24;
    pub const LARGE_PX: u32 = 32;

    /// Hit-region polygons, one per size category
    pub const SMALL_HIT_REGION: &[(u32, u32)] = &[(1, 6), (1, 9), (7, 15), (15, 9), (15, 5), (9, 2)];
    pub const MEDIUM_HIT_REGION: &[(u32, u32)] = &[(1, 7), (1, 11), (9, 19), (20, 11), (20, 7), (11, 2)];
    pub const LARGE_HIT_REGION: &[(u32, u32)] = &[(1, 11), (1, 17), (14, 29), (30, 17), (30, 10), (17, 3)];
}

/// Preview panel geometry
pub mod panel {
    /// Content loaded into the panel when it is hidden
    pub const BLANK_PAGE: &str = "about:blank";

    /// Default panel width
    pub const DEFAULT_WIDTH_PX: u32 = 800;

    /// Default margin reserved on the page while the panel is shown
    pub const DEFAULT_RIGHT_MARGIN_PX: u32 = 800;

    /// Default per-domain margin target overrides ("domain,selector")
    pub const DEFAULT_MARGIN_SELECTORS: &[&str] = &["youtube.com,#content", "x.com,#react-root"];
}

/// Link filtering defaults
pub mod links {
    /// Substrings that exclude a link from previewing
    pub const DEFAULT_URL_FILTERS: &[&str] = &[".zip", ".pdf"];

    /// Hosts whose links are expanded before previewing
    pub const DEFAULT_SHORTENER_DOMAINS: &[&str] = &["t.co", "bit.ly", "tinyurl.com", "goo.gl", "ow.ly"];

    /// An unanswered short URL resolution is asked again after this long
    pub const RESOLVE_TIMEOUT_MS: u64 = 5000;

    /// Schemes the panel can navigate to
    pub const NAVIGABLE_SCHEMES: &[&str] = &["http", "https"];
}

/// Embeddable player URLs
pub mod embed {
    pub const YOUTUBE_EMBED_PREFIX: &str = "https://www.youtube.com/embed/";
    pub const AUTOPLAY_QUERY: &str = "?autoplay=1";
}

/// Validation limits for loaded settings
pub mod validation {
    pub const MAX_DELAY_MS: u64 = 60_000;
    pub const MIN_WIDTH_PX: u32 = 100;
    pub const MAX_WIDTH_PX: u32 = 4096;
    pub const MAX_WIDTH_PERCENT: f64 = 100.0;
    pub const MAX_ICON_OFFSET: i32 = 500;
}

/// Settings file location
pub mod config {
    /// Directory under the user config dir
    pub const APP_DIR: &str = "link-preview";

    /// Settings document filename
    pub const FILENAME: &str = "settings.json";
}
