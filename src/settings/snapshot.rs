//! Typed settings snapshot
//!
//! Built wholesale from the raw key/value document on every change
//! notification. The underlying store may round-trip values as strings, so
//! every field is coerced from whatever JSON shape it arrives in, falling back
//! to its default when the value cannot be interpreted.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::constants::{icon, links, panel, timing, validation};
use crate::settings::store::RawSettings;

/// Icon size category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconSize {
    #[default]
    Small,
    Medium,
    Large,
}

impl IconSize {
    fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "small" => Some(Self::Small),
            "medium" => Some(Self::Medium),
            "large" => Some(Self::Large),
            _ => None,
        }
    }

    /// Rendered edge length in pixels
    pub fn pixels(self) -> u32 {
        match self {
            Self::Small => icon::SMALL_PX,
            Self::Medium => icon::MEDIUM_PX,
            Self::Large => icon::LARGE_PX,
        }
    }

    /// Polygon that receives pointer events, in icon-local pixels
    pub fn hit_region(self) -> &'static [(u32, u32)] {
        match self {
            Self::Small => icon::SMALL_HIT_REGION,
            Self::Medium => icon::MEDIUM_HIT_REGION,
            Self::Large => icon::LARGE_HIT_REGION,
        }
    }
}

/// Storage key of every known setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    IconDisplayDelay,
    IconDisplayTime,
    IconDisplayOffsetX,
    IconDisplayOffsetY,
    IconSize,
    FrameDisplayDelay,
    FrameDisplayTime,
    FrameUpdateTime,
    BodyRightMarginWidthPx,
    PreviewWidthPx,
    PreviewWidthPercent,
    IgnoreXFrameOptions,
    IgnoreContentSecurityPolicy,
    DebugMode,
    UrlFilterList,
    ShortenedUrlDomains,
    KeepPreviewFrameOpen,
    PreviewEnabled,
    CustomMarginSelectors,
    YoutubeAutoplay,
}

impl SettingKey {
    pub const ALL: [SettingKey; 20] = [
        Self::IconDisplayDelay,
        Self::IconDisplayTime,
        Self::IconDisplayOffsetX,
        Self::IconDisplayOffsetY,
        Self::IconSize,
        Self::FrameDisplayDelay,
        Self::FrameDisplayTime,
        Self::FrameUpdateTime,
        Self::BodyRightMarginWidthPx,
        Self::PreviewWidthPx,
        Self::PreviewWidthPercent,
        Self::IgnoreXFrameOptions,
        Self::IgnoreContentSecurityPolicy,
        Self::DebugMode,
        Self::UrlFilterList,
        Self::ShortenedUrlDomains,
        Self::KeepPreviewFrameOpen,
        Self::PreviewEnabled,
        Self::CustomMarginSelectors,
        Self::YoutubeAutoplay,
    ];

    /// Key for a storage name such as `"iconDisplayDelay"`
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::IconDisplayDelay => "iconDisplayDelay",
            Self::IconDisplayTime => "iconDisplayTime",
            Self::IconDisplayOffsetX => "iconDisplayOffsetX",
            Self::IconDisplayOffsetY => "iconDisplayOffsetY",
            Self::IconSize => "iconSize",
            Self::FrameDisplayDelay => "frameDisplayDelay",
            Self::FrameDisplayTime => "frameDisplayTime",
            Self::FrameUpdateTime => "frameUpdateTime",
            Self::BodyRightMarginWidthPx => "bodyRightMarginWidthPx",
            Self::PreviewWidthPx => "previewWidthPx",
            Self::PreviewWidthPercent => "previewWidthPercent",
            Self::IgnoreXFrameOptions => "ignoreXFrameOptions",
            Self::IgnoreContentSecurityPolicy => "ignoreContentSecurityPolicy",
            Self::DebugMode => "debugMode",
            Self::UrlFilterList => "urlFilterList",
            Self::ShortenedUrlDomains => "shortenedUrlDomains",
            Self::KeepPreviewFrameOpen => "keepPreviewFrameOpen",
            Self::PreviewEnabled => "previewEnabled",
            Self::CustomMarginSelectors => "customMarginSelectors",
            Self::YoutubeAutoplay => "youtubeAutoplay",
        }
    }
}

/// Read-only view of the user configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub icon_display_delay: u64,
    pub icon_display_time: u64,
    pub icon_display_offset_x: i32,
    pub icon_display_offset_y: i32,
    pub icon_size: IconSize,
    pub frame_display_delay: u64,
    pub frame_display_time: u64,
    pub frame_update_time: u64,
    pub body_right_margin_width_px: u32,
    pub preview_width_px: u32,
    /// Panel width as a share of the viewport; 0 means "use `preview_width_px`"
    pub preview_width_percent: f64,
    pub ignore_x_frame_options: bool,
    pub ignore_content_security_policy: bool,
    pub debug_mode: bool,
    pub url_filter_list: Vec<String>,
    pub shortened_url_domains: Vec<String>,
    pub keep_preview_frame_open: bool,
    pub preview_enabled: bool,
    pub custom_margin_selectors: Vec<String>,
    pub youtube_autoplay: bool,
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            icon_display_delay: timing::ICON_DISPLAY_DELAY_MS,
            icon_display_time: timing::ICON_DISPLAY_TIME_MS,
            icon_display_offset_x: icon::DEFAULT_OFFSET_X,
            icon_display_offset_y: icon::DEFAULT_OFFSET_Y,
            icon_size: IconSize::Small,
            frame_display_delay: timing::FRAME_DISPLAY_DELAY_MS,
            frame_display_time: timing::FRAME_DISPLAY_TIME_MS,
            frame_update_time: timing::FRAME_UPDATE_TIME_MS,
            body_right_margin_width_px: panel::DEFAULT_RIGHT_MARGIN_PX,
            preview_width_px: panel::DEFAULT_WIDTH_PX,
            preview_width_percent: 0.0,
            ignore_x_frame_options: false,
            ignore_content_security_policy: false,
            debug_mode: false,
            url_filter_list: strings(links::DEFAULT_URL_FILTERS),
            shortened_url_domains: strings(links::DEFAULT_SHORTENER_DOMAINS),
            keep_preview_frame_open: false,
            preview_enabled: true,
            custom_margin_selectors: strings(panel::DEFAULT_MARGIN_SELECTORS),
            youtube_autoplay: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

fn coerce_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => Some(s.trim() == "true"),
        _ => None,
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

/// Lists arrive either as arrays or as newline-separated text; blank text means "use default"
fn coerce_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
        ),
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(
            s.split('\n')
                .map(|line| line.trim().to_string())
                .filter(|line| !line.is_empty())
                .collect(),
        ),
        _ => None,
    }
}

/// Look up `key` and coerce it, logging when a present value had to be discarded
fn read<T>(raw: &RawSettings, key: SettingKey, coerce: impl Fn(&Value) -> Option<T>) -> Option<T> {
    match raw.get(key.as_str()) {
        None | Some(Value::Null) => None,
        Some(value) => {
            let coerced = coerce(value);
            if coerced.is_none() {
                warn!(key = key.as_str(), value = %value, "Unusable setting value, using default");
            }
            coerced
        }
    }
}

fn to_u64(n: f64) -> u64 {
    if n <= 0.0 { 0 } else { n.round() as u64 }
}

fn to_u32(n: f64) -> u32 {
    n.round().clamp(0.0, u32::MAX as f64) as u32
}

fn to_i32(n: f64) -> i32 {
    n.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

impl Settings {
    /// Build a snapshot from the raw stored document
    pub fn from_raw(raw: &RawSettings) -> Self {
        let d = Self::default();
        let number = |key| read(raw, key, coerce_number);
        let boolean = |key| read(raw, key, coerce_bool);
        let list = |key| read(raw, key, coerce_list);

        let mut settings = Self {
            icon_display_delay: number(SettingKey::IconDisplayDelay).map(to_u64).unwrap_or(d.icon_display_delay),
            icon_display_time: number(SettingKey::IconDisplayTime).map(to_u64).unwrap_or(d.icon_display_time),
            icon_display_offset_x: number(SettingKey::IconDisplayOffsetX).map(to_i32).unwrap_or(d.icon_display_offset_x),
            icon_display_offset_y: number(SettingKey::IconDisplayOffsetY).map(to_i32).unwrap_or(d.icon_display_offset_y),
            icon_size: read(raw, SettingKey::IconSize, |v| v.as_str().and_then(IconSize::parse)).unwrap_or(d.icon_size),
            frame_display_delay: number(SettingKey::FrameDisplayDelay).map(to_u64).unwrap_or(d.frame_display_delay),
            frame_display_time: number(SettingKey::FrameDisplayTime).map(to_u64).unwrap_or(d.frame_display_time),
            frame_update_time: number(SettingKey::FrameUpdateTime).map(to_u64).unwrap_or(d.frame_update_time),
            body_right_margin_width_px: number(SettingKey::BodyRightMarginWidthPx)
                .map(to_u32)
                .unwrap_or(d.body_right_margin_width_px),
            preview_width_px: number(SettingKey::PreviewWidthPx).map(to_u32).unwrap_or(d.preview_width_px),
            preview_width_percent: number(SettingKey::PreviewWidthPercent).unwrap_or(d.preview_width_percent),
            ignore_x_frame_options: boolean(SettingKey::IgnoreXFrameOptions).unwrap_or(d.ignore_x_frame_options),
            ignore_content_security_policy: boolean(SettingKey::IgnoreContentSecurityPolicy)
                .unwrap_or(d.ignore_content_security_policy),
            debug_mode: boolean(SettingKey::DebugMode).unwrap_or(d.debug_mode),
            url_filter_list: list(SettingKey::UrlFilterList).unwrap_or(d.url_filter_list),
            shortened_url_domains: list(SettingKey::ShortenedUrlDomains).unwrap_or(d.shortened_url_domains),
            keep_preview_frame_open: boolean(SettingKey::KeepPreviewFrameOpen).unwrap_or(d.keep_preview_frame_open),
            preview_enabled: boolean(SettingKey::PreviewEnabled).unwrap_or(d.preview_enabled),
            custom_margin_selectors: list(SettingKey::CustomMarginSelectors).unwrap_or(d.custom_margin_selectors),
            youtube_autoplay: boolean(SettingKey::YoutubeAutoplay).unwrap_or(d.youtube_autoplay),
        };
        settings.validate_and_clamp();
        debug!(settings = ?settings, "Built settings snapshot");
        settings
    }

    /// Serialize back into the raw key/value layout
    pub fn to_raw(&self) -> RawSettings {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => RawSettings::new(),
        }
    }

    /// Clamp loaded values to safe ranges
    fn validate_and_clamp(&mut self) {
        use validation::*;

        for (name, delay) in [
            ("iconDisplayDelay", &mut self.icon_display_delay),
            ("iconDisplayTime", &mut self.icon_display_time),
            ("frameDisplayDelay", &mut self.frame_display_delay),
            ("frameDisplayTime", &mut self.frame_display_time),
            ("frameUpdateTime", &mut self.frame_update_time),
        ] {
            if *delay > MAX_DELAY_MS {
                warn!(key = name, value = *delay, max = MAX_DELAY_MS, "Delay exceeds maximum, clamping");
                *delay = MAX_DELAY_MS;
            }
        }

        if self.preview_width_px < MIN_WIDTH_PX || self.preview_width_px > MAX_WIDTH_PX {
            let clamped = self.preview_width_px.clamp(MIN_WIDTH_PX, MAX_WIDTH_PX);
            warn!(value = self.preview_width_px, using = clamped, "previewWidthPx out of range, clamping");
            self.preview_width_px = clamped;
        }

        if self.body_right_margin_width_px > MAX_WIDTH_PX {
            warn!(value = self.body_right_margin_width_px, max = MAX_WIDTH_PX, "bodyRightMarginWidthPx exceeds maximum, clamping");
            self.body_right_margin_width_px = MAX_WIDTH_PX;
        }

        if !(0.0..=MAX_WIDTH_PERCENT).contains(&self.preview_width_percent) {
            let clamped = self.preview_width_percent.clamp(0.0, MAX_WIDTH_PERCENT);
            warn!(value = self.preview_width_percent, using = clamped, "previewWidthPercent out of range, clamping");
            self.preview_width_percent = clamped;
        }

        for (name, offset) in [
            ("iconDisplayOffsetX", &mut self.icon_display_offset_x),
            ("iconDisplayOffsetY", &mut self.icon_display_offset_y),
        ] {
            if offset.abs() > MAX_ICON_OFFSET {
                let clamped = (*offset).clamp(-MAX_ICON_OFFSET, MAX_ICON_OFFSET);
                warn!(key = name, value = *offset, using = clamped, "Icon offset out of range, clamping");
                *offset = clamped;
            }
        }
    }

    pub fn icon_show_delay(&self) -> Duration {
        Duration::from_millis(self.icon_display_delay)
    }

    pub fn icon_hide_delay(&self) -> Duration {
        Duration::from_millis(self.icon_display_time)
    }

    pub fn frame_show_delay(&self) -> Duration {
        Duration::from_millis(self.frame_display_delay)
    }

    pub fn frame_hide_delay(&self) -> Duration {
        Duration::from_millis(self.frame_display_time)
    }

    pub fn frame_update_delay(&self) -> Duration {
        Duration::from_millis(self.frame_update_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawSettings {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_empty_document_gives_defaults() {
        let settings = Settings::from_raw(&RawSettings::new());
        assert_eq!(settings, Settings::default());
        assert!(settings.preview_enabled);
        assert_eq!(settings.url_filter_list, vec![".zip", ".pdf"]);
    }

    #[test]
    fn test_string_encoded_values_are_coerced() {
        let settings = Settings::from_raw(&raw(json!({
            "iconDisplayDelay": "350",
            "frameUpdateTime": "125.4",
            "debugMode": "true",
            "keepPreviewFrameOpen": "false",
            "iconDisplayOffsetX": "-12",
        })));

        assert_eq!(settings.icon_display_delay, 350);
        assert_eq!(settings.frame_update_time, 125);
        assert!(settings.debug_mode);
        assert!(!settings.keep_preview_frame_open);
        assert_eq!(settings.icon_display_offset_x, -12);
    }

    #[test]
    fn test_unparseable_number_falls_back_to_default() {
        let settings = Settings::from_raw(&raw(json!({ "frameDisplayDelay": "soon" })));
        assert_eq!(settings.frame_display_delay, timing::FRAME_DISPLAY_DELAY_MS);
    }

    #[test]
    fn test_newline_lists_and_blank_lists() {
        let settings = Settings::from_raw(&raw(json!({
            "urlFilterList": ".exe\n  \n.dmg \n",
            "customMarginSelectors": "   ",
        })));

        assert_eq!(settings.url_filter_list, vec![".exe", ".dmg"]);
        // Blank text means default
        assert_eq!(settings.custom_margin_selectors, strings(panel::DEFAULT_MARGIN_SELECTORS));
    }

    #[test]
    fn test_icon_size_unknown_falls_back_to_small() {
        let settings = Settings::from_raw(&raw(json!({ "iconSize": "huge" })));
        assert_eq!(settings.icon_size, IconSize::Small);

        let settings = Settings::from_raw(&raw(json!({ "iconSize": "large" })));
        assert_eq!(settings.icon_size, IconSize::Large);
        assert_eq!(settings.icon_size.pixels(), 32);
    }

    #[test]
    fn test_out_of_range_values_are_clamped() {
        let settings = Settings::from_raw(&raw(json!({
            "frameDisplayTime": 999_999,
            "previewWidthPx": 5,
            "previewWidthPercent": 140,
            "iconDisplayOffsetY": -9000,
        })));

        assert_eq!(settings.frame_display_time, validation::MAX_DELAY_MS);
        assert_eq!(settings.preview_width_px, validation::MIN_WIDTH_PX);
        assert_eq!(settings.preview_width_percent, 100.0);
        assert_eq!(settings.icon_display_offset_y, -validation::MAX_ICON_OFFSET);
    }

    #[test]
    fn test_to_raw_uses_storage_keys() {
        let raw = Settings::default().to_raw();
        for key in SettingKey::ALL {
            assert!(raw.contains_key(key.as_str()), "missing key {}", key.as_str());
        }
        assert_eq!(raw.len(), SettingKey::ALL.len());
    }

    #[test]
    fn test_raw_roundtrip_preserves_values() {
        let mut settings = Settings::default();
        settings.icon_size = IconSize::Medium;
        settings.youtube_autoplay = true;
        settings.preview_width_percent = 42.5;

        assert_eq!(Settings::from_raw(&settings.to_raw()), settings);
    }

    #[test]
    fn test_key_parse() {
        assert_eq!(SettingKey::parse("frameUpdateTime"), Some(SettingKey::FrameUpdateTime));
        assert_eq!(SettingKey::parse("frame_update_time"), None);
    }

    #[test]
    fn test_delays_as_durations() {
        let settings = Settings::default();
        assert_eq!(settings.icon_show_delay(), Duration::from_millis(200));
        assert_eq!(settings.frame_update_delay(), Duration::from_millis(500));
    }
}
