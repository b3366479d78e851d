//! Response header rules that let pages render inside the panel
//!
//! Two independent rules, each switched by its own setting: drop
//! `X-Frame-Options`, drop `Content-Security-Policy`. The registry mirrors
//! which rules are currently installed on the host so settings changes only
//! add or remove what actually changed.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HeaderRule {
    XFrameOptions,
    ContentSecurityPolicy,
}

impl HeaderRule {
    pub const ALL: [HeaderRule; 2] = [Self::XFrameOptions, Self::ContentSecurityPolicy];

    /// Lower-case header name removed by this rule
    pub fn header(self) -> &'static str {
        match self {
            Self::XFrameOptions => "x-frame-options",
            Self::ContentSecurityPolicy => "content-security-policy",
        }
    }

    fn wanted(self, settings: &Settings) -> bool {
        match self {
            Self::XFrameOptions => settings.ignore_x_frame_options,
            Self::ContentSecurityPolicy => settings.ignore_content_security_policy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

impl Header {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Change to the installed rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "change", content = "rule", rename_all = "snake_case")]
pub enum RuleChange {
    Installed(HeaderRule),
    Removed(HeaderRule),
}

#[derive(Debug, Default)]
pub struct HeaderRuleRegistry {
    installed: Vec<HeaderRule>,
}

impl HeaderRuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_installed(&self, rule: HeaderRule) -> bool {
        self.installed.contains(&rule)
    }

    /// Bring the installed rules in line with `settings`
    pub fn sync(&mut self, settings: &Settings) -> Vec<RuleChange> {
        let mut changes = Vec::new();
        for rule in HeaderRule::ALL {
            match (rule.wanted(settings), self.is_installed(rule)) {
                (true, false) => {
                    self.installed.push(rule);
                    info!(header = rule.header(), "Stripping response header");
                    changes.push(RuleChange::Installed(rule));
                }
                (false, true) => {
                    self.installed.retain(|r| *r != rule);
                    info!(header = rule.header(), "No longer stripping response header");
                    changes.push(RuleChange::Removed(rule));
                }
                _ => {}
            }
        }
        changes
    }

    /// Apply every installed rule to a response's headers
    pub fn filter(&self, headers: Vec<Header>) -> Vec<Header> {
        if self.installed.is_empty() {
            return headers;
        }
        headers
            .into_iter()
            .filter(|h| {
                let keep = !self.installed.iter().any(|r| h.name.eq_ignore_ascii_case(r.header()));
                if !keep {
                    debug!(header = %h.name, "Dropped response header");
                }
                keep
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> Vec<Header> {
        vec![
            Header::new("Content-Type", "text/html"),
            Header::new("X-Frame-Options", "DENY"),
            Header::new("Content-Security-Policy", "frame-ancestors 'none'"),
        ]
    }

    #[test]
    fn test_nothing_installed_by_default() {
        let mut registry = HeaderRuleRegistry::new();
        assert!(registry.sync(&Settings::default()).is_empty());
        assert_eq!(registry.filter(response()), response());
    }

    #[test]
    fn test_rules_follow_settings() {
        let mut registry = HeaderRuleRegistry::new();
        let mut settings = Settings::default();
        settings.ignore_x_frame_options = true;

        assert_eq!(registry.sync(&settings), vec![RuleChange::Installed(HeaderRule::XFrameOptions)]);
        // Unchanged settings install nothing twice
        assert!(registry.sync(&settings).is_empty());

        let names: Vec<_> = registry.filter(response()).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["Content-Type", "Content-Security-Policy"]);

        settings.ignore_x_frame_options = false;
        settings.ignore_content_security_policy = true;
        assert_eq!(
            registry.sync(&settings),
            vec![
                RuleChange::Removed(HeaderRule::XFrameOptions),
                RuleChange::Installed(HeaderRule::ContentSecurityPolicy),
            ]
        );
        let names: Vec<_> = registry.filter(response()).into_iter().map(|h| h.name).collect();
        assert_eq!(names, vec!["Content-Type", "X-Frame-Options"]);
    }
}
