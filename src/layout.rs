//! Panel geometry and the margin reserved for it on the host page

use tracing::debug;
use url::Url;

use crate::constants::validation::{MAX_WIDTH_PERCENT, MAX_WIDTH_PX, MIN_WIDTH_PX};
use crate::settings::Settings;
use crate::surface::MarginTarget;

/// One `"domain,selector"` override entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarginOverride<'a> {
    pub domain: &'a str,
    pub selector: &'a str,
}

impl<'a> MarginOverride<'a> {
    pub fn parse(entry: &'a str) -> Option<Self> {
        let (domain, selector) = entry.split_once(',')?;
        let (domain, selector) = (domain.trim(), selector.trim());
        if domain.is_empty() || selector.is_empty() {
            return None;
        }
        Some(Self { domain, selector })
    }
}

pub fn page_hostname(page_url: Option<&str>) -> Option<String> {
    page_url
        .and_then(|u| Url::parse(u).ok())
        .and_then(|u| u.host_str().map(str::to_string))
}

/// Pick the element that receives the reserved margin.
///
/// The first override whose domain occurs in the page hostname and whose
/// selector matches an element wins; otherwise the body.
pub fn margin_target(
    page_url: Option<&str>,
    overrides: &[String],
    selector_exists: impl Fn(&str) -> bool,
) -> MarginTarget {
    let Some(hostname) = page_hostname(page_url) else {
        return MarginTarget::Body;
    };

    for entry in overrides {
        let Some(entry) = MarginOverride::parse(entry) else {
            debug!(entry = %entry, "Skipping malformed margin override");
            continue;
        };
        if !hostname.contains(entry.domain) {
            continue;
        }
        if selector_exists(entry.selector) {
            debug!(domain = entry.domain, selector = entry.selector, "Using margin override");
            return MarginTarget::Selector(entry.selector.to_string());
        }
        debug!(domain = entry.domain, selector = entry.selector, "Margin override matches no element");
    }

    MarginTarget::Body
}

/// Effective panel width in pixels
pub fn panel_width(settings: &Settings, viewport_width: u32) -> u32 {
    if settings.preview_width_percent > 0.0 && viewport_width > 0 {
        let px = (viewport_width as f64 * settings.preview_width_percent / 100.0).round() as u32;
        px.clamp(MIN_WIDTH_PX, MAX_WIDTH_PX)
    } else {
        settings.preview_width_px
    }
}

/// Width as a percentage of the viewport, for persisting a user resize
pub fn width_percent(width_px: u32, viewport_width: u32) -> Option<f64> {
    if viewport_width == 0 {
        return None;
    }
    let percent = width_px as f64 * 100.0 / viewport_width as f64;
    Some(percent.clamp(0.0, MAX_WIDTH_PERCENT))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides() -> Vec<String> {
        vec!["youtube.com,#content".to_string(), "x.com, #react-root ".to_string()]
    }

    #[test]
    fn test_override_applies_when_selector_matches() {
        let target = margin_target(Some("https://www.youtube.com/feed"), &overrides(), |s| s == "#content");
        assert_eq!(target, MarginTarget::Selector("#content".to_string()));
    }

    #[test]
    fn test_missing_override_element_falls_back_to_body() {
        let target = margin_target(Some("https://www.youtube.com/feed"), &overrides(), |_| false);
        assert_eq!(target, MarginTarget::Body);
    }

    #[test]
    fn test_selector_is_trimmed() {
        let target = margin_target(Some("https://x.com/home"), &overrides(), |s| s == "#react-root");
        assert_eq!(target, MarginTarget::Selector("#react-root".to_string()));
    }

    #[test]
    fn test_unrelated_domain_and_no_page_url_use_body() {
        assert_eq!(margin_target(Some("https://example.org"), &overrides(), |_| true), MarginTarget::Body);
        assert_eq!(margin_target(None, &overrides(), |_| true), MarginTarget::Body);
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let entries = vec!["no-comma".to_string(), ",#x".to_string(), "example.org,#main".to_string()];
        let target = margin_target(Some("https://example.org/a"), &entries, |_| true);
        assert_eq!(target, MarginTarget::Selector("#main".to_string()));
    }

    #[test]
    fn test_panel_width_prefers_percent() {
        let mut settings = Settings::default();
        assert_eq!(panel_width(&settings, 2000), 800);

        settings.preview_width_percent = 25.0;
        assert_eq!(panel_width(&settings, 2000), 500);
        // Tiny viewports never produce a sliver
        assert_eq!(panel_width(&settings, 200), MIN_WIDTH_PX);
    }

    #[test]
    fn test_width_percent() {
        assert_eq!(width_percent(480, 1920), Some(25.0));
        assert_eq!(width_percent(5000, 1000), Some(100.0));
        assert_eq!(width_percent(480, 0), None);
    }
}
