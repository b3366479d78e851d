//! Scripted sessions
//!
//! Replays a JSON script of timed page events and messages against a
//! [`RecordingSurface`] and an in-memory store, answering short URL
//! resolutions from the script, and records what happened after every step.

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::controller::PageController;
use crate::frame::HoverState;
use crate::frame_headers::{Header, HeaderRuleRegistry, RuleChange};
use crate::logging::LogHandle;
use crate::messages::{ControllerMessage, HostRequest, MessageResponse, PageEvent};
use crate::settings::{MemoryStore, RawSettings, SettingKey};
use crate::surface::{Point, RecordingSurface, SurfaceCall};

fn default_viewport_width() -> u32 {
    1920
}

/// One timed input. Exactly what is present happens, in field order.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Step {
    /// Absolute virtual time in milliseconds
    pub at_ms: u64,
    #[serde(default)]
    pub scroll: Option<Point>,
    /// Raw values written to the store as another context would
    #[serde(default)]
    pub store: Option<RawSettings>,
    #[serde(default)]
    pub event: Option<PageEvent>,
    #[serde(default)]
    pub message: Option<ControllerMessage>,
    /// Response headers to run through the header rules
    #[serde(default)]
    pub headers: Option<Vec<Header>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub page_url: Option<String>,
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,
    /// Selectors that match an element on the page
    #[serde(default)]
    pub selectors: Vec<String>,
    /// Initial stored settings
    #[serde(default)]
    pub settings: RawSettings,
    /// Answers to short URL resolution: `null` means the resolution fails,
    /// a missing entry means it never completes
    #[serde(default)]
    pub resolutions: HashMap<String, Option<String>>,
    #[serde(default)]
    pub resolve_delay_ms: u64,
    pub steps: Vec<Step>,
}

impl Script {
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&contents).with_context(|| format!("Failed to parse script {}", path.display()))
    }
}

/// Visible state after a step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub enabled: bool,
    pub icon_visible: bool,
    pub panel_displayed: bool,
    pub locked: bool,
    pub hover: HoverState,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub at_ms: u64,
    pub input: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<SurfaceCall>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requests: Vec<HostRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<MessageResponse>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rule_changes: Vec<RuleChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<Vec<Header>>,
    pub state: StateSnapshot,
}

struct InFlight {
    due: Duration,
    original: String,
    resolved: Option<String>,
}

pub struct Simulation<'a> {
    controller: PageController<RecordingSurface, MemoryStore>,
    header_rules: HeaderRuleRegistry,
    resolutions: HashMap<String, Option<String>>,
    resolve_delay: Duration,
    in_flight: Vec<InFlight>,
    log: Option<&'a LogHandle>,
    transcript: Vec<Entry>,
}

fn millis(d: Duration) -> u64 {
    d.as_millis().try_into().unwrap_or(u64::MAX)
}

impl<'a> Simulation<'a> {
    pub fn new(script: &Script, log: Option<&'a LogHandle>) -> Self {
        let mut surface = RecordingSurface::new()
            .with_viewport_width(script.viewport_width)
            .with_selectors(script.selectors.iter().cloned());
        if let Some(url) = &script.page_url {
            surface = surface.with_page_url(url.clone());
        }

        let controller = PageController::new(surface, MemoryStore::from_raw(script.settings.clone()));
        let mut header_rules = HeaderRuleRegistry::new();
        let rule_changes = header_rules.sync(controller.settings());
        if let Some(log) = log {
            log.set_debug(controller.settings().debug_mode);
        }

        let mut sim = Self {
            controller,
            header_rules,
            resolutions: script.resolutions.clone(),
            resolve_delay: Duration::from_millis(script.resolve_delay_ms),
            in_flight: Vec::new(),
            log,
            transcript: Vec::new(),
        };
        let mut entry = sim.entry("start".to_string());
        entry.rule_changes = rule_changes;
        sim.push(entry);
        sim
    }

    pub fn controller(&self) -> &PageController<RecordingSurface, MemoryStore> {
        &self.controller
    }

    pub fn transcript(&self) -> &[Entry] {
        &self.transcript
    }

    pub fn into_transcript(self) -> Vec<Entry> {
        self.transcript
    }

    pub fn run(script: &Script, log: Option<&'a LogHandle>) -> Result<Vec<Entry>> {
        let mut sim = Self::new(script, log);
        for step in &script.steps {
            sim.step(step)?;
        }
        Ok(sim.into_transcript())
    }

    pub fn step(&mut self, step: &Step) -> Result<()> {
        let at = Duration::from_millis(step.at_ms);
        ensure!(
            at >= self.controller.now(),
            "Step at {}ms is earlier than the current time {}ms",
            step.at_ms,
            millis(self.controller.now())
        );
        self.run_until(at);

        if let Some(scroll) = step.scroll {
            self.controller.surface_mut().set_scroll(scroll);
            let entry = self.entry(format!("scroll {},{}", scroll.x, scroll.y));
            self.push(entry);
        }

        if let Some(values) = &step.store {
            for (name, value) in values {
                match SettingKey::parse(name) {
                    Some(key) => self.controller.store_mut().set_external(key, value.clone()),
                    None => warn!(key = %name, "Ignoring unknown setting in script"),
                }
            }
            let entry = self.entry("store".to_string());
            self.push(entry);
        }

        if let Some(event) = &step.event {
            self.controller.handle_event(event.clone());
            let entry = self.entry(describe(event));
            self.push(entry);
        }

        if let Some(message) = &step.message {
            let response = self.controller.handle_message(message.clone());
            let mut entry = self.entry(describe(message));
            entry.response = Some(response);
            if matches!(message, ControllerMessage::SettingsChanged) {
                entry.rule_changes = self.header_rules.sync(self.controller.settings());
                if let Some(log) = self.log {
                    log.set_debug(self.controller.settings().debug_mode);
                }
            }
            self.push(entry);
        }

        if let Some(headers) = &step.headers {
            let mut entry = self.entry("response headers".to_string());
            entry.headers = Some(self.header_rules.filter(headers.clone()));
            self.push(entry);
        }

        Ok(())
    }

    /// Advance to `until`, delivering resolutions in deadline order between timer runs
    fn run_until(&mut self, until: Duration) {
        loop {
            let next = self
                .in_flight
                .iter()
                .enumerate()
                .filter(|(_, f)| f.due <= until)
                .min_by_key(|(_, f)| f.due)
                .map(|(i, _)| i);
            let Some(index) = next else { break };

            let done = self.in_flight.remove(index);
            self.controller.advance(done.due);
            self.flush_timers();

            debug!(original = %done.original, resolved = ?done.resolved, "Delivering resolution");
            let event = PageEvent::ShortUrlResolved {
                original: done.original,
                resolved: done.resolved,
            };
            self.controller.handle_event(event.clone());
            let entry = self.entry(describe(&event));
            self.push(entry);
        }

        self.controller.advance(until);
        self.flush_timers();
    }

    fn flush_timers(&mut self) {
        if !self.controller.surface().calls().is_empty() {
            let entry = self.entry("timers".to_string());
            self.push(entry);
        }
    }

    fn entry(&mut self, input: String) -> Entry {
        let calls = self.controller.surface_mut().take_calls();
        let requests = self.controller.take_requests();
        let hover = self.controller.hover_state();
        Entry {
            at_ms: millis(self.controller.now()),
            input,
            calls,
            requests,
            response: None,
            rule_changes: Vec::new(),
            headers: None,
            state: StateSnapshot {
                enabled: self.controller.is_enabled(),
                icon_visible: self.controller.is_icon_visible(),
                panel_displayed: self.controller.is_panel_displayed(),
                locked: self.controller.is_locked(),
                hover,
            },
        }
    }

    fn push(&mut self, entry: Entry) {
        for request in &entry.requests {
            match request {
                HostRequest::ResolveShortUrl { url } => match self.resolutions.get(url) {
                    Some(resolved) => self.in_flight.push(InFlight {
                        due: self.controller.now() + self.resolve_delay,
                        original: url.clone(),
                        resolved: resolved.clone(),
                    }),
                    None => debug!(url = %url, "No scripted resolution, leaving unanswered"),
                },
                HostRequest::BroadcastLockChanged { locked } => {
                    info!(locked, "Lock change broadcast to other tabs");
                }
            }
        }
        self.transcript.push(entry);
    }
}

fn describe(input: &impl Serialize) -> String {
    match serde_json::to_value(input) {
        Ok(Value::Object(map)) => map
            .iter()
            .map(|(k, v)| match v {
                Value::String(s) => format!("{k}={s}"),
                other => format!("{k}={other}"),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Ok(other) => other.to_string(),
        Err(_) => "?".to_string(),
    }
}
