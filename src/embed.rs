//! Embeddable-player rewriting for video links
//!
//! Video watch pages refuse to render inside a frame, their player pages do
//! not. Only YouTube watch, short-link and live URLs are rewritten.

use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

use crate::constants::embed::{AUTOPLAY_QUERY, YOUTUBE_EMBED_PREFIX};

static YOUTUBE_EMBED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/embed/[^?]+").unwrap());
static YOUTUBE_WATCH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/watch\?v=([^&#]+)").unwrap());
static YOUTUBE_SHORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?(?:www\.)?youtu\.be/([^?#/]+)").unwrap());
static YOUTUBE_LIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:https?://)?(?:www\.)?youtube\.com/live/([\w-]+)").unwrap());

/// Outcome of the embed policy for one URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedRewrite {
    /// The URL was turned into a player URL
    Rewritten(String),
    /// The URL already points at a player
    AlreadyEmbeddable,
    /// Not a recognised video URL
    NotApplicable,
}

/// Apply the embed policy to `url`
pub fn rewrite(url: &str, autoplay: bool) -> EmbedRewrite {
    if YOUTUBE_EMBED.is_match(url) {
        debug!(url, "Already an embeddable YouTube URL");
        return EmbedRewrite::AlreadyEmbeddable;
    }

    let video_id = YOUTUBE_WATCH
        .captures(url)
        .or_else(|| YOUTUBE_SHORT.captures(url))
        .or_else(|| YOUTUBE_LIVE.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str());

    match video_id {
        Some(id) => {
            debug!(url, video_id = id, "Detected YouTube video");
            let query = if autoplay { AUTOPLAY_QUERY } else { "" };
            EmbedRewrite::Rewritten(format!("{YOUTUBE_EMBED_PREFIX}{id}{query}"))
        }
        None => EmbedRewrite::NotApplicable,
    }
}

/// URL to actually load into the panel
pub fn panel_source(url: &str, autoplay: bool) -> String {
    match rewrite(url, autoplay) {
        EmbedRewrite::Rewritten(embed) => embed,
        EmbedRewrite::AlreadyEmbeddable | EmbedRewrite::NotApplicable => url.to_string(),
    }
}
