//! Boundary to the external reflow engine.
//!
//! Folio never typesets content itself; everything behind [`RenditionPort`]
//! is owned by an external reflow/pagination engine. This crate defines the
//! contract the rest of the workspace programs against, plus a deterministic
//! scripted engine used by tests and the demo host.

use std::sync::mpsc;

use folio_core::{
    AttachError, Chapter, Direction, FontScale, LoadError, Locator, NavigationError,
    RelocationDecodeError,
};
use serde::Deserialize;
use serde_json::Value;

pub mod scripted;

/// Opaque container handle supplied by the host UI once mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
    detached: bool,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            detached: false,
        }
    }

    pub fn mark_detached(&mut self) {
        self.detached = true;
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    pub fn ensure_attachable(&self) -> Result<(), AttachError> {
        if self.detached {
            return Err(AttachError::Detached);
        }
        if self.width == 0 || self.height == 0 {
            return Err(AttachError::ZeroSized);
        }
        Ok(())
    }
}

/// Colors a host registers under a theme name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeSpec {
    pub background: String,
    pub foreground: String,
}

impl ThemeSpec {
    pub fn dark() -> Self {
        Self {
            background: "#1a1a1a".to_string(),
            foreground: "#e8e8e8".to_string(),
        }
    }
}

impl Default for ThemeSpec {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            foreground: "#000000".to_string(),
        }
    }
}

/// Notification that the visible position changed, decoded from the engine's
/// camelCase wire payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RelocationEvent {
    pub position_id: Option<String>,
    pub page: Option<u32>,
    pub total: Option<u32>,
    pub content_ref: Option<String>,
    pub spine_index: Option<usize>,
}

impl RelocationEvent {
    /// An event that pins down neither a position id nor a content ref says
    /// nothing about where the reader is; it is undecodable by definition.
    pub fn from_wire(value: &Value) -> Result<Self, RelocationDecodeError> {
        if !value.is_object() {
            return Err(RelocationDecodeError::Malformed {
                detail: "payload is not an object".to_string(),
            });
        }
        let event: RelocationEvent = serde_json::from_value(value.clone()).map_err(|err| {
            RelocationDecodeError::Malformed {
                detail: err.to_string(),
            }
        })?;
        let has_position = event
            .position_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        let has_ref = event
            .content_ref
            .as_deref()
            .is_some_and(|r| !r.trim().is_empty());
        if !has_position && !has_ref {
            return Err(RelocationDecodeError::MissingPosition);
        }
        Ok(event)
    }

    pub fn into_locator(self) -> Locator {
        Locator {
            position_id: self.position_id,
            page: self.page,
            total: self.total,
            content_ref: self.content_ref,
            spine_index: self.spine_index,
        }
    }
}

/// Sending half of a relocation subscription; engines emit raw wire payloads.
#[derive(Debug, Clone)]
pub struct RelocationSink {
    tx: mpsc::Sender<Value>,
}

impl RelocationSink {
    pub fn emit(&self, payload: Value) {
        // A dropped subscriber just means nobody is listening anymore.
        let _ = self.tx.send(payload);
    }
}

/// Receiving half of a relocation subscription.
#[derive(Debug)]
pub struct RelocationStream {
    rx: mpsc::Receiver<Value>,
}

impl RelocationStream {
    pub fn try_next(&self) -> Option<Value> {
        self.rx.try_recv().ok()
    }
}

pub fn relocation_channel() -> (RelocationSink, RelocationStream) {
    let (tx, rx) = mpsc::channel();
    (RelocationSink { tx }, RelocationStream { rx })
}

/// The external reflow engine: turns a URI into a document handle.
pub trait ReflowEngine {
    type Doc: DocumentSource;

    fn open(&mut self, uri: &str) -> Result<Self::Doc, LoadError>;
}

/// A loaded document: spine, table of contents, default start position, and
/// the ability to render into a viewport.
pub trait DocumentSource {
    type Rendition: RenditionPort;

    fn spine_refs(&self) -> &[String];
    fn toc_entries(&self) -> &[Chapter];
    fn default_start(&self) -> Option<Locator>;
    fn attach(&mut self, viewport: &Viewport) -> Result<Self::Rendition, AttachError>;
}

/// A live rendition bound to a viewport.
///
/// `display(None)` means "use the engine's own default start position".
/// Navigation faults are returned, never panicked; position changes are
/// observed exclusively through the relocation subscription.
pub trait RenditionPort {
    fn display(&mut self, target: Option<&Locator>) -> Result<(), NavigationError>;
    fn advance(&mut self, direction: Direction) -> Result<(), NavigationError>;
    fn register_theme(&mut self, name: &str, spec: ThemeSpec);
    fn select_theme(&mut self, name: &str);
    fn set_font_scale(&mut self, scale: FontScale);
    fn resolve_position(&self, content_ref: &str) -> Option<String>;
    /// A fresh subscription supersedes any earlier one.
    fn subscribe(&mut self) -> RelocationStream;
    fn detach(&mut self);
}
