//! Core domain types for Folio.

use serde::{Deserialize, Serialize};

pub const FONT_SCALE_MIN: u16 = 50;
pub const FONT_SCALE_MAX: u16 = 300;
pub const FONT_SCALE_STEP: u16 = 10;

/// Canonical position pointer plus per-viewport display hints.
///
/// `position_id` is the only durable field; `page`/`total` are recomputed by
/// the reflow engine for the current viewport and must not be persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Locator {
    pub position_id: Option<String>,
    pub page: Option<u32>,
    pub total: Option<u32>,
    pub content_ref: Option<String>,
    pub spine_index: Option<usize>,
}

impl Locator {
    pub fn from_position(position_id: impl Into<String>) -> Self {
        Self {
            position_id: Some(position_id.into()),
            ..Self::default()
        }
    }

    pub fn is_blank(&self) -> bool {
        self.position_id.is_none() && self.content_ref.is_none()
    }

    pub fn progress_percent(&self) -> f32 {
        match (self.page, self.total) {
            (Some(page), Some(total)) if total > 0 => {
                (page.min(total) as f32 / total as f32) * 100.0
            }
            _ => 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub content_ref: String,
    pub label: String,
}

impl Chapter {
    pub fn new(content_ref: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            content_ref: content_ref.into().trim().to_string(),
            label: label.into().trim().to_string(),
        }
    }
}

/// Ordered chapter index built once per loaded document.
///
/// Not every content unit has an entry; lookups are exact-match and
/// best-effort by design.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TocIndex {
    chapters: Vec<Chapter>,
}

impl TocIndex {
    pub fn from_entries(entries: impl IntoIterator<Item = Chapter>) -> Self {
        let chapters = entries
            .into_iter()
            .map(|entry| Chapter::new(entry.content_ref, entry.label))
            .filter(|entry| !entry.content_ref.is_empty() && !entry.label.is_empty())
            .collect();
        Self { chapters }
    }

    pub fn label_for(&self, content_ref: &str) -> Option<&str> {
        self.chapters
            .iter()
            .find(|chapter| chapter.content_ref == content_ref)
            .map(|chapter| chapter.label.as_str())
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }
}

/// Ordered content-unit references defining natural reading order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpineIndex {
    refs: Vec<String>,
}

impl SpineIndex {
    pub fn from_refs(refs: impl IntoIterator<Item = String>) -> Self {
        let refs = refs
            .into_iter()
            .map(|content_ref| content_ref.trim().to_string())
            .filter(|content_ref| !content_ref.is_empty())
            .collect();
        Self { refs }
    }

    pub fn index_of(&self, content_ref: &str) -> Option<usize> {
        self.refs.iter().position(|r| r == content_ref)
    }

    pub fn contains(&self, content_ref: &str) -> bool {
        self.index_of(content_ref).is_some()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.refs.get(index).map(String::as_str)
    }

    pub fn refs(&self) -> &[String] {
        &self.refs
    }

    pub fn len(&self) -> usize {
        self.refs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.refs.is_empty()
    }
}

/// The externally observable reading state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadingState {
    pub locator: Locator,
    pub chapter_label: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Next => "next",
            Direction::Previous => "previous",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Light,
    Dark,
}

impl ColorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ColorMode::Light => "light",
            ColorMode::Dark => "dark",
        }
    }

    /// Name of the registered rendition theme this mode selects.
    pub fn theme_name(&self) -> &'static str {
        match self {
            ColorMode::Light => "default",
            ColorMode::Dark => "dark",
        }
    }

    pub fn toggled(&self) -> Self {
        match self {
            ColorMode::Light => ColorMode::Dark,
            ColorMode::Dark => ColorMode::Light,
        }
    }
}

impl Default for ColorMode {
    fn default() -> Self {
        ColorMode::Light
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ColorMode {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(ColorMode::Light),
            "dark" => Ok(ColorMode::Dark),
            _ => Err("unknown color mode"),
        }
    }
}

/// Font size as a percentage of the rendition default, clamped to a sane range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontScale(u16);

impl FontScale {
    pub fn new(percent: u16) -> Self {
        Self(percent.clamp(FONT_SCALE_MIN, FONT_SCALE_MAX))
    }

    pub fn percent(&self) -> u16 {
        self.0
    }

    pub fn step_up(&self) -> Self {
        Self::new(self.0.saturating_add(FONT_SCALE_STEP))
    }

    pub fn step_down(&self) -> Self {
        Self::new(self.0.saturating_sub(FONT_SCALE_STEP))
    }
}

impl Default for FontScale {
    fn default() -> Self {
        Self(100)
    }
}

impl std::fmt::Display for FontScale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Unreachable { uri: String },
    Malformed { uri: String, detail: String },
}

impl std::fmt::Display for LoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadError::Unreachable { uri } => {
                write!(f, "document unreachable: {uri}")
            }
            LoadError::Malformed { uri, detail } => {
                write!(f, "document unparseable: {uri}: {detail}")
            }
        }
    }
}

impl std::error::Error for LoadError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachError {
    Detached,
    ZeroSized,
}

impl std::fmt::Display for AttachError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttachError::Detached => write!(f, "viewport container is detached"),
            AttachError::ZeroSized => write!(f, "viewport container has zero size"),
        }
    }
}

impl std::error::Error for AttachError {}

/// Non-fatal navigation outcome: the request was dropped without touching state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationWarning {
    NotInSpine { content_ref: String },
    NotReady,
}

impl std::fmt::Display for NavigationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationWarning::NotInSpine { content_ref } => {
                write!(f, "navigation target not in spine: {content_ref}")
            }
            NavigationWarning::NotReady => {
                write!(f, "navigation ignored: session not ready")
            }
        }
    }
}

/// Engine-side fault during navigation; reported to the host, never raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationError {
    LocatorResolutionFailed { content_ref: String },
    AdvanceFailed { direction: Direction, detail: String },
    DisplayFailed { detail: String },
}

impl std::fmt::Display for NavigationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NavigationError::LocatorResolutionFailed { content_ref } => {
                write!(f, "could not resolve a locator for {content_ref}")
            }
            NavigationError::AdvanceFailed { direction, detail } => {
                write!(f, "{direction} failed: {detail}")
            }
            NavigationError::DisplayFailed { detail } => {
                write!(f, "display failed: {detail}")
            }
        }
    }
}

impl std::error::Error for NavigationError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelocationDecodeError {
    Malformed { detail: String },
    MissingPosition,
}

impl std::fmt::Display for RelocationDecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelocationDecodeError::Malformed { detail } => {
                write!(f, "malformed relocation event: {detail}")
            }
            RelocationDecodeError::MissingPosition => {
                write!(
                    f,
                    "relocation event carries neither position id nor content ref"
                )
            }
        }
    }
}

impl std::error::Error for RelocationDecodeError {}
