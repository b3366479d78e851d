//! Page side effects
//!
//! [`PreviewSurface`] is everything the state machines need from the host
//! page: placing the icon, loading and revealing the panel, reserving margin,
//! and a handful of read-only queries. [`RecordingSurface`] implements it in
//! memory and logs every call, which is what the tests and the simulator use.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::constants::panel::BLANK_PAGE;

/// Page coordinates in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Element that receives the reserved right margin
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum MarginTarget {
    Body,
    Selector(String),
}

/// Rendered icon description
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconSpec {
    pub size_px: u32,
    pub hit_region: Vec<(u32, u32)>,
    /// Outline the hit region (debug mode)
    pub debug_outline: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryDirection {
    Back,
    Forward,
}

/// Host page operations used by the preview engine
pub trait PreviewSurface {
    /// URL of the page being previewed from, used to resolve relative links
    fn page_url(&self) -> Option<&str>;
    fn scroll_offset(&self) -> Point;
    fn viewport_width(&self) -> u32;
    fn selector_exists(&self, selector: &str) -> bool;
    /// Location the panel has actually navigated to, if the host can tell
    fn panel_location(&self) -> Option<String>;

    fn register_listeners(&mut self);
    fn unregister_listeners(&mut self);

    /// Build (or rebuild) the icon element
    fn build_icon(&mut self, spec: &IconSpec);
    fn show_icon(&mut self, at: Point);
    fn hide_icon(&mut self);

    fn load_panel(&mut self, url: &str);
    fn reveal_panel(&mut self);
    fn collapse_panel(&mut self);
    fn set_panel_width(&mut self, px: u32);
    fn set_right_margin(&mut self, target: &MarginTarget, px: u32);
    fn set_pin_state(&mut self, locked: bool);
    fn navigate_panel(&mut self, direction: HistoryDirection);
    fn open_tab(&mut self, url: &str);
}

/// One recorded surface operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum SurfaceCall {
    RegisterListeners,
    UnregisterListeners,
    BuildIcon { spec: IconSpec },
    ShowIcon { at: Point },
    HideIcon,
    LoadPanel { url: String },
    RevealPanel,
    CollapsePanel,
    SetPanelWidth { px: u32 },
    SetRightMargin { target: MarginTarget, px: u32 },
    SetPinState { locked: bool },
    NavigatePanel { direction: HistoryDirection },
    OpenTab { url: String },
}

/// In-memory surface that records every call and tracks the resulting page state
#[derive(Debug, Default)]
pub struct RecordingSurface {
    page_url: Option<String>,
    scroll: Point,
    viewport_width: u32,
    selectors: HashSet<String>,
    calls: Vec<SurfaceCall>,

    pub listeners_registered: bool,
    pub icon: Option<IconSpec>,
    pub icon_visible: bool,
    pub icon_position: Option<Point>,
    pub panel_src: Option<String>,
    pub panel_visible: bool,
    pub panel_width: Option<u32>,
    pub margins: HashMap<MarginTarget, u32>,
    pub pinned: bool,
    pub opened_tabs: Vec<String>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self {
            viewport_width: 1920,
            ..Self::default()
        }
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn with_selectors<I, S>(mut self, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selectors = selectors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_viewport_width(mut self, width: u32) -> Self {
        self.viewport_width = width;
        self
    }

    pub fn set_scroll(&mut self, scroll: Point) {
        self.scroll = scroll;
    }

    pub fn calls(&self) -> &[SurfaceCall] {
        &self.calls
    }

    /// Drain recorded calls, keeping the tracked state
    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of times `url` was loaded into the panel
    pub fn load_count(&self, url: &str) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::LoadPanel { url: u } if u == url))
            .count()
    }

    pub fn margin(&self, target: &MarginTarget) -> u32 {
        self.margins.get(target).copied().unwrap_or(0)
    }

    fn record(&mut self, call: SurfaceCall) {
        debug!(call = ?call, "surface");
        self.calls.push(call);
    }
}

impl PreviewSurface for RecordingSurface {
    fn page_url(&self) -> Option<&str> {
        self.page_url.as_deref()
    }

    fn scroll_offset(&self) -> Point {
        self.scroll
    }

    fn viewport_width(&self) -> u32 {
        self.viewport_width
    }

    fn selector_exists(&self, selector: &str) -> bool {
        self.selectors.contains(selector)
    }

    fn panel_location(&self) -> Option<String> {
        self.panel_src.clone().filter(|src| src != BLANK_PAGE)
    }

    fn register_listeners(&mut self) {
        self.listeners_registered = true;
        self.record(SurfaceCall::RegisterListeners);
    }

    fn unregister_listeners(&mut self) {
        self.listeners_registered = false;
        self.record(SurfaceCall::UnregisterListeners);
    }

    fn build_icon(&mut self, spec: &IconSpec) {
        self.icon = Some(spec.clone());
        self.record(SurfaceCall::BuildIcon { spec: spec.clone() });
    }

    fn show_icon(&mut self, at: Point) {
        self.icon_visible = true;
        self.icon_position = Some(at);
        self.record(SurfaceCall::ShowIcon { at });
    }

    fn hide_icon(&mut self) {
        self.icon_visible = false;
        self.record(SurfaceCall::HideIcon);
    }

    fn load_panel(&mut self, url: &str) {
        self.panel_src = Some(url.to_string());
        self.record(SurfaceCall::LoadPanel { url: url.to_string() });
    }

    fn reveal_panel(&mut self) {
        self.panel_visible = true;
        self.record(SurfaceCall::RevealPanel);
    }

    fn collapse_panel(&mut self) {
        self.panel_visible = false;
        self.record(SurfaceCall::CollapsePanel);
    }

    fn set_panel_width(&mut self, px: u32) {
        self.panel_width = Some(px);
        self.record(SurfaceCall::SetPanelWidth { px });
    }

    fn set_right_margin(&mut self, target: &MarginTarget, px: u32) {
        self.margins.insert(target.clone(), px);
        self.record(SurfaceCall::SetRightMargin {
            target: target.clone(),
            px,
        });
    }

    fn set_pin_state(&mut self, locked: bool) {
        self.pinned = locked;
        self.record(SurfaceCall::SetPinState { locked });
    }

    fn navigate_panel(&mut self, direction: HistoryDirection) {
        self.record(SurfaceCall::NavigatePanel { direction });
    }

    fn open_tab(&mut self, url: &str) {
        self.opened_tabs.push(url.to_string());
        self.record(SurfaceCall::OpenTab { url: url.to_string() });
    }
}
