//! Per-page controller
//!
//! Owns the clock, the settings snapshot, the surface and the preview
//! instances, and is the only thing the host talks to. Three entry points,
//! each running to completion: [`PageController::handle_event`],
//! [`PageController::handle_message`] and [`PageController::advance`].

use anyhow::{Context, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::context::PageContext;
use crate::frame::{FrameTimer, HoverState, PreviewFrame};
use crate::hover::HoverTracker;
use crate::icon::{IconAction, IconTimer, PreviewIcon};
use crate::messages::{ControllerMessage, HostRequest, MessageResponse, PageEvent, PanelControl};
use crate::settings::{SettingKey, Settings, SettingsStore};
use crate::surface::PreviewSurface;
use crate::timer::{earliest, Clock, Due};

/// Instances alive while the feature is enabled
#[derive(Debug)]
struct Preview {
    tracker: HoverTracker,
    icon: PreviewIcon,
    frame: PreviewFrame,
}

#[derive(Debug, Clone, Copy)]
enum Fired {
    Icon(IconTimer),
    Frame(FrameTimer),
}

fn load_settings(store: &impl SettingsStore) -> Result<Settings> {
    let raw = store.load().context("Failed to read settings store")?;
    Ok(Settings::from_raw(&raw))
}

pub struct PageController<S: PreviewSurface, St: SettingsStore> {
    clock: Clock,
    settings: Settings,
    store: St,
    surface: S,
    preview: Option<Preview>,
    requests: Vec<HostRequest>,
}

impl<S: PreviewSurface, St: SettingsStore> PageController<S, St> {
    pub fn new(surface: S, store: St) -> Self {
        let settings = load_settings(&store).unwrap_or_else(|e| {
            warn!(error = %format!("{e:#}"), "Using default settings");
            Settings::default()
        });

        let mut controller = Self {
            clock: Clock::new(),
            settings,
            store,
            surface,
            preview: None,
            requests: Vec::new(),
        };

        if controller.settings.preview_enabled {
            controller.enable();
        } else {
            info!("Link preview disabled");
        }
        controller
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn store(&self) -> &St {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut St {
        &mut self.store
    }

    pub fn is_enabled(&self) -> bool {
        self.preview.is_some()
    }

    pub fn is_panel_displayed(&self) -> bool {
        self.preview.as_ref().is_some_and(|p| p.frame.is_displayed())
    }

    pub fn is_icon_visible(&self) -> bool {
        self.preview.as_ref().is_some_and(|p| p.icon.is_visible())
    }

    pub fn is_locked(&self) -> bool {
        self.preview.as_ref().map_or(self.settings.keep_preview_frame_open, |p| p.frame.is_locked())
    }

    pub fn hover_state(&self) -> HoverState {
        self.preview.as_ref().map(|p| p.frame.hover_state().clone()).unwrap_or_default()
    }

    /// Drain requests for the host
    pub fn take_requests(&mut self) -> Vec<HostRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Deadline of the next timer, if any is armed
    pub fn next_deadline(&self) -> Option<Duration> {
        self.next_fired().map(|(due, _)| due.at)
    }

    fn next_fired(&self) -> Option<(Due, Fired)> {
        let preview = self.preview.as_ref()?;
        earliest(
            preview.icon.next_due().map(|(d, t)| (d, Fired::Icon(t))),
            preview.frame.next_due().map(|(d, t)| (d, Fired::Frame(t))),
        )
    }

    /// Run every timer due up to `until`, in deadline order, then move the clock to `until`
    pub fn advance(&mut self, until: Duration) {
        while let Some((due, fired)) = self.next_fired() {
            if due.at > until {
                break;
            }
            self.clock.set(due.at);

            let Self {
                clock,
                settings,
                surface,
                preview,
                ..
            } = self;
            let Some(p) = preview.as_mut() else { break };
            let mut ctx = PageContext { clock, settings, surface };
            match fired {
                Fired::Icon(timer) => p.icon.fire(timer, &mut ctx),
                Fired::Frame(timer) => p.frame.fire(timer, &mut ctx),
            }
        }
        self.clock.set(until);
    }

    pub fn advance_by(&mut self, delta: Duration) {
        self.advance(self.clock.now() + delta);
    }

    pub fn handle_event(&mut self, event: PageEvent) {
        let Self {
            clock,
            settings,
            surface,
            preview,
            requests,
            store,
        } = self;
        let Some(p) = preview.as_mut() else {
            debug!(event = ?event, "Preview disabled, ignoring event");
            return;
        };
        let mut ctx = PageContext { clock, settings, surface };

        match event {
            PageEvent::PointerMove { at } => p.icon.track_pointer(at),
            PageEvent::PointerOver { path } => {
                if let Some(request) = p.tracker.on_pointer_over(&path, &mut ctx, &mut p.frame, &mut p.icon) {
                    requests.push(request);
                }
            }
            PageEvent::PointerOut { node } => p.tracker.on_pointer_out(&node, &mut ctx, &mut p.frame),
            PageEvent::IconEnter => {
                if let Some(action) = p.icon.on_mouse_enter() {
                    run_icon_action(action, &mut ctx, &mut p.frame);
                }
            }
            PageEvent::IconLeave => {
                if let Some(action) = p.icon.on_mouse_leave(&mut ctx) {
                    run_icon_action(action, &mut ctx, &mut p.frame);
                }
            }
            PageEvent::PanelEnter => p.frame.on_panel_enter(),
            PageEvent::PanelLeave => p.frame.on_panel_leave(&mut ctx),
            PageEvent::PanelControl { control } => match control {
                PanelControl::Back | PanelControl::Forward => {
                    if let Some(direction) = control.history_direction() {
                        p.frame.navigate(direction, &mut ctx);
                    }
                }
                PanelControl::OpenInNewTab => p.frame.open_in_new_tab(&mut ctx),
                PanelControl::Hide => p.frame.close(&mut ctx),
                PanelControl::TogglePin => {
                    let locked = p.frame.toggle_lock(&mut ctx);
                    persist(store, SettingKey::KeepPreviewFrameOpen, Value::Bool(locked));
                    settings.keep_preview_frame_open = locked;
                    requests.push(HostRequest::BroadcastLockChanged { locked });
                }
                PanelControl::Resize { width_px } => {
                    if let Some(percent) = p.frame.resize(width_px, &mut ctx) {
                        persist(store, SettingKey::PreviewWidthPercent, Value::from(percent));
                        settings.preview_width_percent = percent;
                    }
                }
            },
            PageEvent::ShortUrlResolved { original, resolved } => {
                p.tracker
                    .on_short_url_resolved(&original, resolved.as_deref(), &mut ctx, &mut p.frame, &mut p.icon);
            }
        }
    }

    pub fn handle_message(&mut self, message: ControllerMessage) -> MessageResponse {
        debug!(message = ?message, "Handling message");
        match message {
            ControllerMessage::SettingsChanged => match load_settings(&self.store) {
                Ok(settings) => {
                    self.apply_settings(settings);
                    MessageResponse::ok()
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Keeping last known settings");
                    MessageResponse::failed(format!("{e:#}"))
                }
            },
            ControllerMessage::UpdatePreviewEnabled { enabled } => {
                // Persisted so a later reload does not undo it
                persist(&mut self.store, SettingKey::PreviewEnabled, Value::Bool(enabled));
                self.settings.preview_enabled = enabled;
                if enabled {
                    self.enable();
                } else {
                    self.disable();
                }
                MessageResponse::ok()
            }
            ControllerMessage::UpdateKeepPreviewFrameOpen => match load_settings(&self.store) {
                Ok(stored) => {
                    let locked = stored.keep_preview_frame_open;
                    self.settings.keep_preview_frame_open = locked;
                    let Self {
                        clock,
                        settings,
                        surface,
                        preview,
                        ..
                    } = self;
                    if let Some(p) = preview.as_mut() {
                        let mut ctx = PageContext { clock, settings, surface };
                        p.frame.set_locked(locked, &mut ctx);
                    }
                    MessageResponse::ok()
                }
                Err(e) => {
                    warn!(error = %format!("{e:#}"), "Could not re-read lock state");
                    MessageResponse::failed(format!("{e:#}"))
                }
            },
        }
    }

    fn apply_settings(&mut self, new: Settings) {
        let was_enabled = self.settings.preview_enabled;
        // The lock is only refreshed through its own message
        let locked = self.settings.keep_preview_frame_open;
        self.settings = new;
        self.settings.keep_preview_frame_open = locked;

        match (was_enabled, self.settings.preview_enabled) {
            (false, true) => self.enable(),
            (true, false) => self.disable(),
            _ => {
                let Self {
                    clock,
                    settings,
                    surface,
                    preview,
                    ..
                } = self;
                if let Some(p) = preview.as_mut() {
                    let mut ctx = PageContext { clock, settings, surface };
                    p.icon.apply_settings(&mut ctx);
                    p.frame.apply_settings(&mut ctx);
                    info!("Applied new settings");
                }
            }
        }
    }

    fn enable(&mut self) {
        if self.preview.is_some() {
            debug!("Preview already enabled");
            return;
        }

        let mut ctx = PageContext {
            clock: &mut self.clock,
            settings: &self.settings,
            surface: &mut self.surface,
        };
        ctx.surface.register_listeners();
        let icon = PreviewIcon::new(&mut ctx);
        let frame = PreviewFrame::new(&mut ctx);
        self.preview = Some(Preview {
            tracker: HoverTracker::new(),
            icon,
            frame,
        });
        info!("Link preview enabled");
    }

    fn disable(&mut self) {
        let Some(mut p) = self.preview.take() else {
            debug!("Preview already disabled");
            return;
        };

        let mut ctx = PageContext {
            clock: &mut self.clock,
            settings: &self.settings,
            surface: &mut self.surface,
        };
        p.icon.hide_now(&mut ctx);
        p.frame.teardown(&mut ctx);
        ctx.surface.unregister_listeners();
        info!("Link preview disabled");
    }
}

fn run_icon_action(action: IconAction, ctx: &mut PageContext, frame: &mut PreviewFrame) {
    match action {
        IconAction::ShowFrame(url) => frame.show(&url, ctx),
        IconAction::HideFrame => frame.hide(ctx),
    }
}

fn persist(store: &mut impl SettingsStore, key: SettingKey, value: Value) {
    if let Err(e) = store.save(key, value) {
        warn!(key = key.as_str(), error = %e, "Failed to persist setting, keeping in-memory value");
    }
}
