//! Manifest URL templating and out-of-band segment metadata.
//!
//! Segment URLs in a manifest carry two literal tokens: one for the quality tier and
//! one for the host. Both are replaced independently, so the result does not depend
//! on substitution order.
//!
//! The media duration of a segment is encoded in its file name:
//! `<name>-<seconds>-<tier>.<ext>`, e.g. `intro-12.733333-720.mp4`.

use crate::abr::QualityTier;
use crate::error::{PlayerError, PlayerResult};

/// Substitute the tier and host tokens in a manifest URL.
///
/// Only the first occurrence of each token is replaced. Empty tokens are ignored.
pub fn parse_manifest_url(
    url: &str,
    tier: QualityTier,
    tier_tag: &str,
    host_tag: &str,
    host: &str,
) -> String {
    let url = replace_token(url, tier_tag, &tier.to_string());
    replace_token(&url, host_tag, host)
}

fn replace_token(input: &str, token: &str, value: &str) -> String {
    if token.is_empty() {
        return input.to_string();
    }
    input.replacen(token, value, 1)
}

/// Extract the media duration (seconds) from a resolved segment URL.
///
/// Takes the last path component, splits it on `-` and parses the second field.
pub fn segment_duration(url: &str) -> PlayerResult<f64> {
    let file_name = url
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .rsplit('/')
        .next()
        .unwrap_or_default();

    file_name
        .split('-')
        .nth(1)
        .and_then(|field| field.parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .ok_or_else(|| PlayerError::InvalidSegmentUrl(url.to_string()))
}
