//! Preview affordance icon
//!
//! A small icon shown near the cursor after a link has been hovered for a
//! moment. Hovering the icon itself is what opens the preview panel.
//!
//! States: Hidden → (show timer) → Visible → (hide timer) → Hidden. The hide
//! timer may already be running while the icon is visible.

use tracing::debug;

use crate::context::PageContext;
use crate::surface::{IconSpec, Point};
use crate::timer::{earliest, Due, Timer};

/// Requests the icon makes of the preview panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconAction {
    ShowFrame(String),
    HideFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconTimer {
    Show,
    Hide,
}

#[derive(Debug)]
pub struct PreviewIcon {
    show_timer: Timer<()>,
    hide_timer: Timer<()>,
    url_for_preview: Option<String>,
    mouse_over_icon: bool,
    /// Last known cursor position, read when the delayed show fires
    mouse_position: Point,
    visible: bool,
}

fn icon_spec(ctx: &PageContext) -> IconSpec {
    let size = ctx.settings.icon_size;
    IconSpec {
        size_px: size.pixels(),
        hit_region: size.hit_region().to_vec(),
        debug_outline: ctx.settings.debug_mode,
    }
}

impl PreviewIcon {
    pub fn new(ctx: &mut PageContext) -> Self {
        let spec = icon_spec(ctx);
        ctx.surface.build_icon(&spec);
        Self {
            show_timer: Timer::new("icon_show", ctx.settings.icon_show_delay()),
            hide_timer: Timer::new("icon_hide", ctx.settings.icon_hide_delay()),
            url_for_preview: None,
            mouse_over_icon: false,
            mouse_position: Point::default(),
            visible: false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn url(&self) -> Option<&str> {
        self.url_for_preview.as_deref()
    }

    pub fn is_mouse_over(&self) -> bool {
        self.mouse_over_icon
    }

    pub fn mouse_position(&self) -> Point {
        self.mouse_position
    }

    pub fn is_show_pending(&self) -> bool {
        self.show_timer.is_armed()
    }

    pub fn is_hide_pending(&self) -> bool {
        self.hide_timer.is_armed()
    }

    pub fn track_pointer(&mut self, at: Point) {
        self.mouse_position = at;
    }

    /// Schedule the icon for `url`
    pub fn show(&mut self, url: &str, ctx: &mut PageContext) {
        if self.mouse_over_icon {
            debug!(url, "Pointer is over the icon, not rescheduling it");
            return;
        }

        // A stale icon for another link must not linger
        if self.url_for_preview.as_deref() != Some(url) {
            self.hide_timer.start(ctx.clock, ());
        }

        self.url_for_preview = Some(url.to_string());
        self.show_timer.start(ctx.clock, ());
        debug!(url, delay = ?self.show_timer.delay(), "Icon show scheduled");
    }

    pub fn next_due(&self) -> Option<(Due, IconTimer)> {
        earliest(
            self.show_timer.due().map(|d| (d, IconTimer::Show)),
            self.hide_timer.due().map(|d| (d, IconTimer::Hide)),
        )
    }

    /// Run the callback of `timer` if it is due
    pub fn fire(&mut self, timer: IconTimer, ctx: &mut PageContext) {
        let now = ctx.clock.now();
        match timer {
            IconTimer::Show => {
                if self.show_timer.take_due(now).is_some() {
                    self.reveal(ctx);
                }
            }
            IconTimer::Hide => {
                if self.hide_timer.take_due(now).is_some() {
                    self.conceal(ctx);
                }
            }
        }
    }

    fn reveal(&mut self, ctx: &mut PageContext) {
        let scroll = ctx.surface.scroll_offset();
        let at = Point::new(
            self.mouse_position.x + ctx.settings.icon_display_offset_x + scroll.x,
            self.mouse_position.y + ctx.settings.icon_display_offset_y + scroll.y,
        );
        ctx.surface.show_icon(at);
        self.visible = true;
        self.hide_timer.start(ctx.clock, ());
        debug!(url = ?self.url_for_preview, x = at.x, y = at.y, "Icon shown");
    }

    fn conceal(&mut self, ctx: &mut PageContext) {
        if self.visible {
            ctx.surface.hide_icon();
            debug!("Icon hidden");
        }
        self.visible = false;
    }

    pub fn on_mouse_enter(&mut self) -> Option<IconAction> {
        if !self.visible {
            return None;
        }
        self.mouse_over_icon = true;
        self.hide_timer.stop();
        self.url_for_preview.clone().map(IconAction::ShowFrame)
    }

    pub fn on_mouse_leave(&mut self, ctx: &mut PageContext) -> Option<IconAction> {
        if !self.mouse_over_icon {
            return None;
        }
        self.mouse_over_icon = false;
        self.hide_timer.start(ctx.clock, ());
        Some(IconAction::HideFrame)
    }

    /// Hide immediately and forget pending work (feature tear-down)
    pub fn hide_now(&mut self, ctx: &mut PageContext) {
        self.show_timer.stop();
        self.hide_timer.stop();
        self.mouse_over_icon = false;
        self.conceal(ctx);
    }

    /// Swap the rendered element for one matching the current size and debug settings.
    /// Timers, URL and visibility survive.
    pub fn rebuild(&mut self, ctx: &mut PageContext) {
        let spec = icon_spec(ctx);
        debug!(size_px = spec.size_px, debug_outline = spec.debug_outline, "Rebuilding icon");
        ctx.surface.build_icon(&spec);
    }

    pub fn apply_settings(&mut self, ctx: &mut PageContext) {
        self.show_timer.update_delay(ctx.settings.icon_show_delay());
        self.hide_timer.update_delay(ctx.settings.icon_hide_delay());
        self.rebuild(ctx);
    }
}
