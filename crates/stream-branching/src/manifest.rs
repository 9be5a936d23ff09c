//! Branching manifest model.
//!
//! A manifest is loaded once and shared read-only (`Arc<Manifest>`) for the lifetime
//! of a session. Chapter keys are case-insensitive: they are lowercased on load and
//! on lookup.
//!
//! Wire format (JSON): every top-level key except `codec`, `hostTag`,
//! `fileResolutionTag` and `calibration` is a chapter, and `intro` is required.
//!
//! ```json
//! {
//!   "codec": "video/mp4; codecs=\"avc1.640029\"",
//!   "hostTag": "{host}",
//!   "fileResolutionTag": "{resolution}",
//!   "calibration": { "url": "{host}/probe-0.5-{resolution}.mp4" },
//!   "intro": { "url": "{host}/intro-10-{resolution}.mp4", "at": 5, "options": ["Left"] },
//!   "left": { "url": "{host}/left-8-{resolution}.mp4" }
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{PlayerError, PlayerResult};

/// Key of the traversal root.
pub const INTRO_KEY: &str = "intro";

/// One entry of a decision point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterOption {
    /// Text shown to the viewer.
    pub label: String,
    /// Chapter key the option leads to.
    pub next: String,
}

impl ChapterOption {
    pub fn new(label: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            next: next.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawOption {
    /// Bare label; the chapter key is the label itself.
    Label(String),
    Explicit { label: String, next: String },
}

impl From<RawOption> for ChapterOption {
    fn from(raw: RawOption) -> Self {
        match raw {
            RawOption::Label(label) => ChapterOption::new(label.clone(), label),
            RawOption::Explicit { label, next } => ChapterOption::new(label, next),
        }
    }
}

/// Immutable description of one chapter.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawSegment")]
pub struct SegmentDescriptor {
    /// URL template (tier and host tokens not yet substituted).
    pub url: String,
    /// Decision point, in seconds relative to the start of this segment.
    pub at: Option<u32>,
    /// Ordered options offered at the decision point.
    pub options: Vec<ChapterOption>,
}

impl SegmentDescriptor {
    /// Whether this segment ends without a decision point.
    pub fn is_terminal(&self) -> bool {
        self.at.is_none()
    }
}

#[derive(Deserialize)]
struct RawSegment {
    url: String,
    #[serde(default)]
    at: Option<u32>,
    #[serde(default)]
    options: Vec<RawOption>,
}

impl From<RawSegment> for SegmentDescriptor {
    fn from(raw: RawSegment) -> Self {
        Self {
            url: raw.url,
            at: raw.at,
            options: raw.options.into_iter().map(ChapterOption::from).collect(),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawManifest {
    codec: String,
    host_tag: String,
    file_resolution_tag: String,
    calibration: RawSegment,
    #[serde(flatten)]
    chapters: HashMap<String, SegmentDescriptor>,
}

/// Read-only branching manifest.
#[derive(Debug, Clone)]
pub struct Manifest {
    codec: String,
    host_tag: String,
    tier_tag: String,
    calibration_url: String,
    chapters: HashMap<String, SegmentDescriptor>,
}

impl Manifest {
    /// Build a manifest from already-parsed parts.
    pub fn new(
        codec: impl Into<String>,
        host_tag: impl Into<String>,
        tier_tag: impl Into<String>,
        calibration_url: impl Into<String>,
        chapters: impl IntoIterator<Item = (String, SegmentDescriptor)>,
    ) -> PlayerResult<Self> {
        let mut normalized = HashMap::new();
        for (key, segment) in chapters {
            let lowered = key.to_lowercase();
            if normalized.insert(lowered, segment).is_some() {
                return Err(PlayerError::InvalidManifest(format!(
                    "chapter key `{key}` collides with another key"
                )));
            }
        }

        if !normalized.contains_key(INTRO_KEY) {
            return Err(PlayerError::InvalidManifest(format!(
                "missing `{INTRO_KEY}` chapter"
            )));
        }

        Ok(Self {
            codec: codec.into(),
            host_tag: host_tag.into(),
            tier_tag: tier_tag.into(),
            calibration_url: calibration_url.into(),
            chapters: normalized,
        })
    }

    /// Parse a JSON manifest document.
    pub fn from_json(json: &str) -> PlayerResult<Self> {
        let raw: RawManifest = serde_json::from_str(json)?;
        Self::new(
            raw.codec,
            raw.host_tag,
            raw.file_resolution_tag,
            raw.calibration.url,
            raw.chapters,
        )
    }

    pub fn codec(&self) -> &str {
        &self.codec
    }

    pub fn host_tag(&self) -> &str {
        &self.host_tag
    }

    /// Token replaced by the quality tier in URL templates.
    pub fn tier_tag(&self) -> &str {
        &self.tier_tag
    }

    /// URL template of the bandwidth probe resource.
    pub fn calibration_url(&self) -> &str {
        &self.calibration_url
    }

    /// The traversal root.
    pub fn intro(&self) -> &SegmentDescriptor {
        // Presence is checked in `Manifest::new`.
        &self.chapters[INTRO_KEY]
    }

    /// Case-insensitive chapter lookup.
    pub fn chapter(&self, key: &str) -> PlayerResult<&SegmentDescriptor> {
        self.chapters
            .get(&key.to_lowercase())
            .ok_or_else(|| PlayerError::UnknownChapterKey(key.to_string()))
    }

    /// Number of chapters, including `intro`.
    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}
