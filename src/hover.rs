//! Pointer-over handling: which link is under the pointer and where it goes
//!
//! Resolves an event path to the nearest anchor, validates and filters its
//! URL, sends shortener links out for resolution, then routes the link to the
//! icon (panel hidden) or to the panel (panel displayed).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

use crate::constants::links::{NAVIGABLE_SCHEMES, RESOLVE_TIMEOUT_MS};
use crate::context::PageContext;
use crate::frame::PreviewFrame;
use crate::icon::PreviewIcon;
use crate::messages::HostRequest;

/// One element of a pointer event path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
}

impl Node {
    pub fn element(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            href: None,
        }
    }

    pub fn anchor(href: impl Into<String>) -> Self {
        Self {
            tag: "a".to_string(),
            href: Some(href.into()),
        }
    }

    /// An `a` element with a non-empty href
    pub fn is_anchor(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a") && self.href.as_deref().is_some_and(|h| !h.trim().is_empty())
    }
}

/// Absolute http(s) URL for `href`, resolved against the page URL when relative
pub fn resolve_href(page_url: Option<&str>, href: &str) -> Option<String> {
    let href = href.trim();
    let url = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(page_url?).ok()?;
            base.join(href).ok()?
        }
        Err(_) => return None,
    };

    if NAVIGABLE_SCHEMES.contains(&url.scheme()) {
        Some(url.into())
    } else {
        None
    }
}

/// Substring match against the exclusion list
pub fn is_filtered(url: &str, filters: &[String]) -> bool {
    filters.iter().any(|f| !f.is_empty() && url.contains(f.as_str()))
}

/// Host is one of `domains` or a subdomain of one.
///
/// Stricter than a substring test on the hostname, so `ft.com` is not taken
/// for `t.co`.
pub fn is_shortened(url: &str, domains: &[String]) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_ascii_lowercase)) else {
        return false;
    };
    domains.iter().map(|d| d.trim().to_ascii_lowercase()).any(|d| {
        !d.is_empty() && (host == d || host.strip_suffix(d.as_str()).is_some_and(|rest| rest.ends_with('.')))
    })
}

#[derive(Debug, Default)]
pub struct HoverTracker {
    /// Short URL whose resolution is in flight and when it was asked for
    resolving: Option<(String, Duration)>,
}

impl HoverTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolving(&self) -> Option<&str> {
        self.resolving.as_ref().map(|(url, _)| url.as_str())
    }

    pub fn on_pointer_over(
        &mut self,
        path: &[Node],
        ctx: &mut PageContext,
        frame: &mut PreviewFrame,
        icon: &mut PreviewIcon,
    ) -> Option<HostRequest> {
        if !ctx.settings.preview_enabled {
            return None;
        }

        let Some(href) = path.iter().find(|n| n.is_anchor()).and_then(|n| n.href.as_deref()) else {
            frame.set_current_hovered(None);
            return None;
        };

        let Some(url) = resolve_href(ctx.surface.page_url(), href) else {
            debug!(href, "Not a navigable link");
            frame.set_current_hovered(None);
            return None;
        };

        if is_filtered(&url, &ctx.settings.url_filter_list) {
            debug!(url = %url, "Link excluded by filter");
            frame.set_current_hovered(None);
            return None;
        }

        if is_shortened(&url, &ctx.settings.shortened_url_domains) {
            frame.set_current_hovered(Some(url.clone()));
            let now = ctx.clock.now();
            let in_flight = self.resolving.as_ref().is_some_and(|(pending, asked_at)| {
                *pending == url && now.saturating_sub(*asked_at) < Duration::from_millis(RESOLVE_TIMEOUT_MS)
            });
            if in_flight {
                debug!(url = %url, "Resolution already in flight");
                return None;
            }
            debug!(url = %url, "Requesting short URL resolution");
            self.resolving = Some((url.clone(), now));
            return Some(HostRequest::ResolveShortUrl { url });
        }

        self.route(&url, ctx, frame, icon);
        None
    }

    pub fn on_short_url_resolved(
        &mut self,
        original: &str,
        resolved: Option<&str>,
        ctx: &mut PageContext,
        frame: &mut PreviewFrame,
        icon: &mut PreviewIcon,
    ) {
        if self.resolving() == Some(original) {
            self.resolving = None;
        }

        if frame.hover_state().current_hovered_url.as_deref() != Some(original) {
            debug!(original, "Discarding stale short URL resolution");
            return;
        }

        let url = match resolved.and_then(|r| resolve_href(None, r)) {
            Some(url) => url,
            None => {
                debug!(original, "Short URL resolution failed, using original");
                original.to_string()
            }
        };

        if is_filtered(&url, &ctx.settings.url_filter_list) {
            debug!(url = %url, "Resolved link excluded by filter");
            frame.set_current_hovered(None);
            return;
        }

        self.route(&url, ctx, frame, icon);
    }

    pub fn on_pointer_out(&mut self, node: &Node, ctx: &mut PageContext, frame: &mut PreviewFrame) {
        if !node.is_anchor() {
            return;
        }
        frame.set_current_hovered(None);
        if frame.is_displayed() {
            frame.hide(ctx);
        }
    }

    fn route(&mut self, url: &str, ctx: &mut PageContext, frame: &mut PreviewFrame, icon: &mut PreviewIcon) {
        if frame.hover_state().last_hovered_url.as_deref() == Some(url) && icon.is_visible() {
            debug!(url, "Icon already showing for this link");
            return;
        }

        frame.record_hover(url);
        if frame.is_displayed() {
            frame.update(url, ctx);
        } else {
            icon.show(url, ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_anchor_detection() {
        assert!(Node::anchor("https://a.example/").is_anchor());
        assert!(Node { tag: "A".into(), href: Some("/x".into()) }.is_anchor());
        assert!(!Node::anchor("  ").is_anchor());
        assert!(!Node::element("a").is_anchor());
        assert!(!Node { tag: "area".into(), href: Some("/x".into()) }.is_anchor());
    }

    #[test]
    fn test_resolve_href() {
        assert_eq!(resolve_href(None, "https://a.example"), Some("https://a.example/".to_string()));
        assert_eq!(
            resolve_href(Some("https://host.example/dir/page"), "other?q=1"),
            Some("https://host.example/dir/other?q=1".to_string())
        );
        assert_eq!(resolve_href(None, "/relative"), None);
        assert_eq!(resolve_href(None, "javascript:void(0)"), None);
        assert_eq!(resolve_href(None, "mailto:me@example.com"), None);
        assert_eq!(resolve_href(Some("https://host.example/"), "http://[::1"), None);
    }

    #[test]
    fn test_filters_are_substrings() {
        let filters = list(&[".zip", ".pdf"]);
        assert!(is_filtered("https://a.example/file.pdf", &filters));
        assert!(is_filtered("https://a.example/file.zip?dl=1", &filters));
        assert!(!is_filtered("https://a.example/file.html", &filters));
        assert!(!is_filtered("https://a.example/", &list(&[""])));
    }

    #[test]
    fn test_shortener_host_matching() {
        let domains = list(&["t.co", "bit.ly"]);
        assert!(is_shortened("https://t.co/abc", &domains));
        assert!(is_shortened("https://www.bit.ly/abc", &domains));
        assert!(is_shortened("https://T.CO/abc", &domains));
        assert!(!is_shortened("https://reddit.com/r/x", &domains));
        assert!(!is_shortened("https://nott.co/x", &domains));
        assert!(!is_shortened("https://example.com/t.co", &domains));
    }
}
