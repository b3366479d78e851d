//! Floating preview panel
//!
//! Owns the hover bookkeeping ([`HoverState`]) and the three panel timers:
//! show (icon hovered), update (another link hovered while displayed) and
//! hide. A locked panel only goes away through the hide button or when the
//! feature is switched off.

use serde::Serialize;
use tracing::{debug, info};

use crate::constants::panel::BLANK_PAGE;
use crate::constants::validation::{MAX_WIDTH_PX, MIN_WIDTH_PX};
use crate::context::PageContext;
use crate::embed;
use crate::layout;
use crate::surface::{HistoryDirection, MarginTarget};
use crate::timer::{earliest, Due, Timer};

/// URL identity tracking across rapid pointer movement
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HoverState {
    /// Link under the pointer right now
    pub current_hovered_url: Option<String>,
    /// Argument of the show/update timer in flight
    pub pending_url: Option<String>,
    /// Pre-rewrite URL of what the panel shows; cleared when hidden
    pub preview_shown_url: Option<String>,
    /// Last link that was routed to the icon or the panel
    pub last_hovered_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameTimer {
    Show,
    Update,
    Hide,
}

#[derive(Debug)]
pub struct PreviewFrame {
    state: HoverState,
    displayed: bool,
    locked: bool,
    pointer_over_panel: bool,
    show_timer: Timer<String>,
    update_timer: Timer<String>,
    hide_timer: Timer<()>,
    /// Element that currently carries the reserved margin
    applied_margin: Option<MarginTarget>,
}

impl PreviewFrame {
    pub fn new(ctx: &mut PageContext) -> Self {
        let locked = ctx.settings.keep_preview_frame_open;
        let width = layout::panel_width(ctx.settings, ctx.surface.viewport_width());
        ctx.surface.set_panel_width(width);
        ctx.surface.set_pin_state(locked);

        Self {
            state: HoverState::default(),
            displayed: false,
            locked,
            pointer_over_panel: false,
            show_timer: Timer::new("frame_show", ctx.settings.frame_show_delay()),
            update_timer: Timer::new("frame_update", ctx.settings.frame_update_delay()),
            hide_timer: Timer::new("frame_hide", ctx.settings.frame_hide_delay()),
            applied_margin: None,
        }
    }

    pub fn is_displayed(&self) -> bool {
        self.displayed
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_pointer_over_panel(&self) -> bool {
        self.pointer_over_panel
    }

    pub fn is_hide_pending(&self) -> bool {
        self.hide_timer.is_armed()
    }

    pub fn is_show_pending(&self) -> bool {
        self.show_timer.is_armed()
    }

    pub fn is_update_pending(&self) -> bool {
        self.update_timer.is_armed()
    }

    pub fn hover_state(&self) -> &HoverState {
        &self.state
    }

    pub fn set_current_hovered(&mut self, url: Option<String>) {
        self.state.current_hovered_url = url;
    }

    /// A link was routed: it is both the current and the last hovered URL
    pub fn record_hover(&mut self, url: &str) {
        self.state.last_hovered_url = Some(url.to_string());
        self.state.current_hovered_url = Some(url.to_string());
    }

    pub fn next_due(&self) -> Option<(Due, FrameTimer)> {
        let first = earliest(
            self.show_timer.due().map(|d| (d, FrameTimer::Show)),
            self.update_timer.due().map(|d| (d, FrameTimer::Update)),
        );
        earliest(first, self.hide_timer.due().map(|d| (d, FrameTimer::Hide)))
    }

    pub fn fire(&mut self, timer: FrameTimer, ctx: &mut PageContext) {
        let now = ctx.clock.now();
        match timer {
            FrameTimer::Show => {
                if let Some(url) = self.show_timer.take_due(now) {
                    self.state.pending_url = None;
                    self.display(&url, ctx);
                }
            }
            FrameTimer::Update => {
                if let Some(url) = self.update_timer.take_due(now) {
                    self.state.pending_url = None;
                    self.run_update(&url, ctx);
                }
            }
            FrameTimer::Hide => {
                if self.hide_timer.take_due(now).is_some() {
                    self.conceal(ctx);
                }
            }
        }
    }

    /// Schedule the panel for `url`
    pub fn show(&mut self, url: &str, ctx: &mut PageContext) {
        self.state.pending_url = Some(url.to_string());
        self.show_timer.start(ctx.clock, url.to_string());
        self.hide_timer.stop();
        debug!(url, delay = ?self.show_timer.delay(), "Panel show scheduled");
    }

    /// Schedule a content switch while displayed
    pub fn update(&mut self, url: &str, ctx: &mut PageContext) {
        if self.state.preview_shown_url.as_deref() == Some(url) {
            debug!(url, "Panel already shows this URL");
            return;
        }
        self.hide_timer.stop();
        self.state.pending_url = Some(url.to_string());
        self.update_timer.start(ctx.clock, url.to_string());
        debug!(url, delay = ?self.update_timer.delay(), "Panel update scheduled");
    }

    /// Request the panel to go away, honouring the lock
    pub fn hide(&mut self, ctx: &mut PageContext) {
        if !ctx.settings.preview_enabled {
            self.hide_timer.stop();
            self.cancel_pending();
            self.conceal(ctx);
        } else if !self.locked {
            self.hide_timer.start(ctx.clock, ());
            self.cancel_pending();
            debug!(delay = ?self.hide_timer.delay(), "Panel hide scheduled");
        } else {
            debug!("Panel is locked, ignoring hide");
        }
    }

    fn cancel_pending(&mut self) {
        self.show_timer.stop();
        self.update_timer.stop();
        self.state.pending_url = None;
    }

    fn display(&mut self, url: &str, ctx: &mut PageContext) {
        self.apply_margin(ctx);
        self.displayed = true;

        let source = embed::panel_source(url, ctx.settings.youtube_autoplay);
        ctx.surface.load_panel(&source);
        self.state.preview_shown_url = Some(url.to_string());
        ctx.surface.reveal_panel();
        info!(url, source = %source, "Panel displayed");
    }

    fn run_update(&mut self, url: &str, ctx: &mut PageContext) {
        if self.pointer_over_panel {
            debug!(url, "Pointer is over the panel, dropping update");
            return;
        }

        if self.state.current_hovered_url.as_deref() == Some(url) {
            self.display(url, ctx);
        } else if let Some(current) = self.state.current_hovered_url.clone() {
            debug!(stale = url, current = %current, "Update is stale, chasing current link");
            self.update(&current, ctx);
        }

        self.hide(ctx);
    }

    fn conceal(&mut self, ctx: &mut PageContext) {
        self.displayed = false;
        ctx.surface.load_panel(BLANK_PAGE);
        ctx.surface.collapse_panel();
        if let Some(target) = self.applied_margin.take() {
            ctx.surface.set_right_margin(&target, 0);
        }
        self.state.preview_shown_url = None;
        debug!("Panel hidden");
    }

    fn apply_margin(&mut self, ctx: &mut PageContext) {
        let target = layout::margin_target(ctx.surface.page_url(), &ctx.settings.custom_margin_selectors, |s| {
            ctx.surface.selector_exists(s)
        });

        if let Some(previous) = self.applied_margin.take() {
            if previous != target {
                ctx.surface.set_right_margin(&previous, 0);
            }
        }
        ctx.surface.set_right_margin(&target, ctx.settings.body_right_margin_width_px);
        self.applied_margin = Some(target);
    }

    pub fn on_panel_enter(&mut self) {
        self.hide_timer.stop();
        self.pointer_over_panel = true;
    }

    pub fn on_panel_leave(&mut self, ctx: &mut PageContext) {
        self.pointer_over_panel = false;
        self.hide(ctx);
    }

    /// Flip the lock and return the new state for persisting.
    /// A hide already in flight still completes.
    pub fn toggle_lock(&mut self, ctx: &mut PageContext) -> bool {
        self.locked = !self.locked;
        ctx.surface.set_pin_state(self.locked);
        info!(locked = self.locked, "Panel lock toggled");
        self.locked
    }

    /// Lock state changed in another context
    pub fn set_locked(&mut self, locked: bool, ctx: &mut PageContext) {
        self.locked = locked;
        ctx.surface.set_pin_state(locked);
        debug!(locked, "Panel lock refreshed");
    }

    /// Hide button: immediate, ignores the lock
    pub fn close(&mut self, ctx: &mut PageContext) {
        self.hide_timer.stop();
        self.cancel_pending();
        self.conceal(ctx);
    }

    pub fn navigate(&mut self, direction: HistoryDirection, ctx: &mut PageContext) {
        ctx.surface.navigate_panel(direction);
    }

    pub fn open_in_new_tab(&mut self, ctx: &mut PageContext) {
        match ctx.surface.panel_location().or_else(|| self.state.preview_shown_url.clone()) {
            Some(url) => {
                info!(url = %url, "Opening panel URL in a new tab");
                ctx.surface.open_tab(&url);
            }
            None => debug!("Nothing loaded in the panel, not opening a tab"),
        }
    }

    /// Apply a user resize; returns the width as a share of the viewport
    pub fn resize(&mut self, width_px: u32, ctx: &mut PageContext) -> Option<f64> {
        let width = width_px.clamp(MIN_WIDTH_PX, MAX_WIDTH_PX);
        ctx.surface.set_panel_width(width);
        layout::width_percent(width, ctx.surface.viewport_width())
    }

    /// Push a new settings snapshot into the live panel without changing visibility
    pub fn apply_settings(&mut self, ctx: &mut PageContext) {
        self.show_timer.update_delay(ctx.settings.frame_show_delay());
        self.update_timer.update_delay(ctx.settings.frame_update_delay());
        self.hide_timer.update_delay(ctx.settings.frame_hide_delay());

        let width = layout::panel_width(ctx.settings, ctx.surface.viewport_width());
        ctx.surface.set_panel_width(width);
        if self.displayed {
            self.apply_margin(ctx);
        }
    }

    /// Feature switched off: hide immediately whatever the lock says
    pub fn teardown(&mut self, ctx: &mut PageContext) {
        self.hide_timer.stop();
        self.cancel_pending();
        self.pointer_over_panel = false;
        if self.displayed {
            self.conceal(ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use crate::surface::{PreviewSurface, RecordingSurface, SurfaceCall};
    use crate::timer::Clock;
    use std::time::Duration;

    const A: &str = "https://a.example/";
    const B: &str = "https://b.example/";
    const C: &str = "https://c.example/";

    struct Page {
        clock: Clock,
        settings: Settings,
        surface: RecordingSurface,
    }

    impl Page {
        fn new() -> Self {
            Self {
                clock: Clock::new(),
                settings: Settings::default(),
                surface: RecordingSurface::new().with_page_url("https://host.example/"),
            }
        }

        fn ctx(&mut self) -> PageContext<'_> {
            PageContext {
                clock: &mut self.clock,
                settings: &self.settings,
                surface: &mut self.surface,
            }
        }

        fn run_until(&mut self, frame: &mut PreviewFrame, ms: u64) {
            let until = Duration::from_millis(ms);
            while let Some((due, which)) = frame.next_due() {
                if due.at > until {
                    break;
                }
                self.clock.set(due.at);
                frame.fire(which, &mut self.ctx());
            }
            self.clock.set(until);
        }

        /// Frame displaying `url` at t=500
        fn displayed(url: &str) -> (Self, PreviewFrame) {
            let mut page = Self::new();
            let mut frame = PreviewFrame::new(&mut page.ctx());
            frame.record_hover(url);
            frame.show(url, &mut page.ctx());
            page.run_until(&mut frame, 500);
            assert!(frame.is_displayed());
            (page, frame)
        }
    }

    #[test]
    fn test_show_displays_after_delay_and_reserves_margin() {
        let (page, frame) = Page::displayed(A);
        assert_eq!(page.surface.panel_src.as_deref(), Some(A));
        assert!(page.surface.panel_visible);
        assert_eq!(page.surface.margin(&MarginTarget::Body), 800);
        assert_eq!(frame.hover_state().preview_shown_url.as_deref(), Some(A));
        assert_eq!(frame.hover_state().pending_url, None);
    }

    #[test]
    fn test_last_show_wins() {
        let mut page = Page::new();
        let mut frame = PreviewFrame::new(&mut page.ctx());
        frame.show(A, &mut page.ctx());
        page.run_until(&mut frame, 100);
        frame.show(B, &mut page.ctx());
        assert_eq!(frame.hover_state().pending_url.as_deref(), Some(B));

        page.run_until(&mut frame, 599);
        assert!(!frame.is_displayed());
        page.run_until(&mut frame, 600);
        assert_eq!(page.surface.load_count(A), 0);
        assert_eq!(page.surface.load_count(B), 1);
    }

    #[test]
    fn test_update_same_url_is_noop() {
        let (mut page, mut frame) = Page::displayed(A);
        page.surface.take_calls();
        frame.update(A, &mut page.ctx());
        assert!(!frame.is_update_pending());
        page.run_until(&mut frame, 5_000);
        assert!(page.surface.calls().is_empty());
    }

    #[test]
    fn test_update_to_hovered_url_switches_then_schedules_hide() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.record_hover(B);
        frame.update(B, &mut page.ctx());

        page.run_until(&mut frame, 1_000);
        assert_eq!(page.surface.panel_src.as_deref(), Some(B));
        assert!(frame.is_hide_pending());

        page.run_until(&mut frame, 3_000);
        assert!(!frame.is_displayed());
        assert_eq!(page.surface.panel_src.as_deref(), Some(BLANK_PAGE));
        assert_eq!(page.surface.margin(&MarginTarget::Body), 0);
        assert_eq!(frame.hover_state().preview_shown_url, None);
    }

    #[test]
    fn test_stale_update_chases_current_only_while_locked() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.toggle_lock(&mut page.ctx());
        frame.record_hover(B);
        frame.update(B, &mut page.ctx());
        frame.record_hover(C);

        // B fires while C is hovered: chase C instead
        page.run_until(&mut frame, 1_000);
        assert_eq!(page.surface.load_count(B), 0);
        assert_eq!(frame.hover_state().pending_url.as_deref(), Some(C));

        page.run_until(&mut frame, 1_500);
        assert_eq!(page.surface.panel_src.as_deref(), Some(C));
    }

    #[test]
    fn test_stale_update_when_unlocked_only_hides() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.record_hover(B);
        frame.update(B, &mut page.ctx());
        frame.record_hover(C);

        page.run_until(&mut frame, 1_000);
        assert!(!frame.is_update_pending());
        assert!(frame.is_hide_pending());
        page.run_until(&mut frame, 10_000);
        assert_eq!(page.surface.load_count(C), 0);
        assert!(!frame.is_displayed());
    }

    #[test]
    fn test_update_dropped_while_pointer_over_panel() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.record_hover(B);
        frame.update(B, &mut page.ctx());
        frame.on_panel_enter();

        page.run_until(&mut frame, 10_000);
        assert_eq!(page.surface.load_count(B), 0);
        assert!(frame.is_displayed());
    }

    #[test]
    fn test_locked_panel_ignores_hide() {
        let (mut page, mut frame) = Page::displayed(A);
        assert!(frame.toggle_lock(&mut page.ctx()));
        assert!(page.surface.pinned);

        frame.hide(&mut page.ctx());
        frame.on_panel_enter();
        frame.on_panel_leave(&mut page.ctx());
        page.run_until(&mut frame, 60_000);
        assert!(frame.is_displayed());
    }

    #[test]
    fn test_lock_does_not_cancel_inflight_hide() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.hide(&mut page.ctx());
        frame.toggle_lock(&mut page.ctx());

        page.run_until(&mut frame, 2_500);
        assert!(!frame.is_displayed());
        assert!(frame.is_locked());
    }

    #[test]
    fn test_panel_hover_cancels_hide() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.hide(&mut page.ctx());
        page.run_until(&mut frame, 1_000);
        frame.on_panel_enter();
        page.run_until(&mut frame, 10_000);
        assert!(frame.is_displayed());

        frame.on_panel_leave(&mut page.ctx());
        page.run_until(&mut frame, 12_000);
        assert!(!frame.is_displayed());
    }

    #[test]
    fn test_hide_cancels_pending_show() {
        let mut page = Page::new();
        let mut frame = PreviewFrame::new(&mut page.ctx());
        frame.show(A, &mut page.ctx());
        frame.hide(&mut page.ctx());
        assert_eq!(frame.hover_state().pending_url, None);
        page.run_until(&mut frame, 5_000);
        assert_eq!(page.surface.load_count(A), 0);
    }

    #[test]
    fn test_close_bypasses_lock() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.toggle_lock(&mut page.ctx());
        frame.close(&mut page.ctx());
        assert!(!frame.is_displayed());
        assert!(!page.surface.panel_visible);
    }

    #[test]
    fn test_hide_when_disabled_is_immediate() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.toggle_lock(&mut page.ctx());
        page.settings.preview_enabled = false;
        frame.hide(&mut page.ctx());
        assert!(!frame.is_displayed());
    }

    #[test]
    fn test_hide_when_disabled_drops_scheduled_hide() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.hide(&mut page.ctx());
        assert!(frame.is_hide_pending());

        page.settings.preview_enabled = false;
        frame.hide(&mut page.ctx());
        assert!(!frame.is_hide_pending());

        page.surface.take_calls();
        page.run_until(&mut frame, 10_000);
        assert!(page.surface.calls().is_empty());
    }

    #[test]
    fn test_margin_released_on_applied_target() {
        let mut page = Page::new();
        page.surface = RecordingSurface::new()
            .with_page_url("https://www.youtube.com/watch?v=1")
            .with_selectors(["#content"]);
        let mut frame = PreviewFrame::new(&mut page.ctx());
        frame.show(A, &mut page.ctx());
        page.run_until(&mut frame, 500);

        let target = MarginTarget::Selector("#content".to_string());
        assert_eq!(page.surface.margin(&target), 800);
        assert_eq!(page.surface.margin(&MarginTarget::Body), 0);

        frame.close(&mut page.ctx());
        assert_eq!(page.surface.margin(&target), 0);
    }

    #[test]
    fn test_video_links_load_embed_player() {
        let mut page = Page::new();
        page.settings.youtube_autoplay = true;
        let mut frame = PreviewFrame::new(&mut page.ctx());
        frame.show("https://youtu.be/XYZ", &mut page.ctx());
        page.run_until(&mut frame, 500);

        assert_eq!(page.surface.panel_src.as_deref(), Some("https://www.youtube.com/embed/XYZ?autoplay=1"));
        assert_eq!(frame.hover_state().preview_shown_url.as_deref(), Some("https://youtu.be/XYZ"));
    }

    #[test]
    fn test_manual_controls() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.navigate(HistoryDirection::Back, &mut page.ctx());
        frame.open_in_new_tab(&mut page.ctx());
        assert_eq!(page.surface.opened_tabs, vec![A.to_string()]);
        assert!(page.surface.calls().contains(&SurfaceCall::NavigatePanel {
            direction: HistoryDirection::Back
        }));

        assert_eq!(frame.resize(480, &mut page.ctx()), Some(25.0));
        assert_eq!(page.surface.panel_width, Some(480));
        frame.resize(10, &mut page.ctx());
        assert_eq!(page.surface.panel_width, Some(MIN_WIDTH_PX));
    }

    #[test]
    fn test_open_in_new_tab_without_content_does_nothing() {
        let mut page = Page::new();
        let mut frame = PreviewFrame::new(&mut page.ctx());
        frame.open_in_new_tab(&mut page.ctx());
        assert!(page.surface.opened_tabs.is_empty());
        assert_eq!(page.surface.panel_location(), None);
    }

    #[test]
    fn test_apply_settings_keeps_visibility() {
        let (mut page, mut frame) = Page::displayed(A);
        page.settings.preview_width_px = 600;
        page.settings.body_right_margin_width_px = 640;
        frame.apply_settings(&mut page.ctx());

        assert!(frame.is_displayed());
        assert_eq!(page.surface.panel_width, Some(600));
        assert_eq!(page.surface.margin(&MarginTarget::Body), 640);
    }

    #[test]
    fn test_teardown_hides_locked_panel() {
        let (mut page, mut frame) = Page::displayed(A);
        frame.toggle_lock(&mut page.ctx());
        frame.teardown(&mut page.ctx());
        assert!(!frame.is_displayed());
        assert_eq!(frame.next_due(), None);
    }
}
