//! Deterministic manifest-driven reflow engine.
//!
//! Stands in for the external engine in tests and the demo host: each spine
//! unit paginates into a fixed page count, position ids use the engine's own
//! `<unit>@<page>` format, and every display/advance emits a camelCase wire
//! event on the relocation channel.

use std::collections::HashMap;

use folio_core::{
    AttachError, Chapter, Direction, FontScale, LoadError, Locator, NavigationError,
};
use log::debug;
use serde::Deserialize;
use serde_json::json;

use crate::{
    DocumentSource, ReflowEngine, RelocationSink, RelocationStream, RenditionPort, ThemeSpec,
    Viewport, relocation_channel,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub title: String,
    pub spine: Vec<ManifestUnit>,
    pub toc: Vec<Chapter>,
    pub default_start: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManifestUnit {
    pub content_ref: String,
    pub pages: u32,
}

impl ManifestUnit {
    pub fn new(content_ref: impl Into<String>, pages: u32) -> Self {
        Self {
            content_ref: content_ref.into(),
            pages,
        }
    }
}

pub fn position_id(content_ref: &str, page: u32) -> String {
    format!("{content_ref}@{page}")
}

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    library: HashMap<String, Manifest>,
    opens: usize,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_manifest(mut self, uri: impl Into<String>, manifest: Manifest) -> Self {
        self.insert_manifest(uri, manifest);
        self
    }

    pub fn insert_manifest(&mut self, uri: impl Into<String>, manifest: Manifest) {
        self.library.insert(uri.into(), manifest);
    }

    /// Number of documents opened so far; lets tests pin down idempotent load.
    pub fn open_count(&self) -> usize {
        self.opens
    }
}

impl ReflowEngine for ScriptedEngine {
    type Doc = ScriptedDocument;

    fn open(&mut self, uri: &str) -> Result<Self::Doc, LoadError> {
        self.opens += 1;
        let manifest = self
            .library
            .get(uri)
            .cloned()
            .ok_or_else(|| LoadError::Unreachable {
                uri: uri.to_string(),
            })?;
        if manifest.spine.is_empty() {
            return Err(LoadError::Malformed {
                uri: uri.to_string(),
                detail: "manifest has an empty spine".to_string(),
            });
        }
        Ok(ScriptedDocument::new(manifest))
    }
}

#[derive(Debug)]
pub struct ScriptedDocument {
    manifest: Manifest,
    spine_refs: Vec<String>,
}

impl ScriptedDocument {
    fn new(manifest: Manifest) -> Self {
        let spine_refs = manifest
            .spine
            .iter()
            .map(|unit| unit.content_ref.clone())
            .collect();
        Self {
            manifest,
            spine_refs,
        }
    }
}

impl DocumentSource for ScriptedDocument {
    type Rendition = ScriptedRendition;

    fn spine_refs(&self) -> &[String] {
        &self.spine_refs
    }

    fn toc_entries(&self) -> &[Chapter] {
        &self.manifest.toc
    }

    fn default_start(&self) -> Option<Locator> {
        self.manifest
            .default_start
            .as_deref()
            .map(Locator::from_position)
    }

    fn attach(&mut self, viewport: &Viewport) -> Result<Self::Rendition, AttachError> {
        viewport.ensure_attachable()?;
        Ok(ScriptedRendition::new(self.manifest.clone()))
    }
}

#[derive(Debug)]
pub struct ScriptedRendition {
    manifest: Manifest,
    position: Option<(usize, u32)>,
    sink: Option<RelocationSink>,
    themes: HashMap<String, ThemeSpec>,
    active_theme: String,
    font_scale: Option<FontScale>,
    displayed: Vec<Option<String>>,
    detached: bool,
}

impl ScriptedRendition {
    fn new(manifest: Manifest) -> Self {
        Self {
            manifest,
            position: None,
            sink: None,
            themes: HashMap::new(),
            active_theme: "default".to_string(),
            font_scale: None,
            displayed: Vec::new(),
            detached: false,
        }
    }

    pub fn active_theme(&self) -> &str {
        &self.active_theme
    }

    pub fn registered_theme(&self, name: &str) -> Option<&ThemeSpec> {
        self.themes.get(name.trim())
    }

    pub fn font_scale(&self) -> Option<FontScale> {
        self.font_scale
    }

    /// Requested position ids, one entry per `display` call.
    pub fn displayed_log(&self) -> &[Option<String>] {
        &self.displayed
    }

    pub fn current_position_id(&self) -> Option<String> {
        self.position
            .map(|(unit, page)| position_id(&self.manifest.spine[unit].content_ref, page))
    }

    pub fn is_detached(&self) -> bool {
        self.detached
    }

    fn unit_index(&self, content_ref: &str) -> Option<usize> {
        self.manifest
            .spine
            .iter()
            .position(|unit| unit.content_ref == content_ref)
    }

    fn parse_position(&self, id: &str) -> Option<(usize, u32)> {
        let (content_ref, page) = id.split_once('@')?;
        let unit = self.unit_index(content_ref)?;
        let page: u32 = page.parse().ok()?;
        (page < self.manifest.spine[unit].pages).then_some((unit, page))
    }

    fn start_position(&self) -> Option<(usize, u32)> {
        self.manifest
            .spine
            .iter()
            .position(|unit| unit.pages > 0)
            .map(|unit| (unit, 0))
    }

    fn default_position(&self) -> Option<(usize, u32)> {
        self.manifest
            .default_start
            .as_deref()
            .and_then(|id| self.parse_position(id))
            .or_else(|| self.start_position())
    }

    fn target_position(&self, target: Option<&Locator>) -> Option<(usize, u32)> {
        let Some(locator) = target else {
            return self.default_position();
        };
        locator
            .position_id
            .as_deref()
            .and_then(|id| self.parse_position(id))
            .or_else(|| {
                let unit = self.unit_index(locator.content_ref.as_deref()?)?;
                (self.manifest.spine[unit].pages > 0).then_some((unit, 0))
            })
            // Foreign position ids come from a different engine or a stale
            // save; fall back to the engine's own start.
            .or_else(|| self.default_position())
    }

    fn emit_relocation(&self) {
        let Some(sink) = &self.sink else {
            return;
        };
        let Some((unit, page)) = self.position else {
            return;
        };
        let entry = &self.manifest.spine[unit];
        sink.emit(json!({
            "positionId": position_id(&entry.content_ref, page),
            "page": page + 1,
            "total": entry.pages,
            "contentRef": entry.content_ref,
            "spineIndex": unit,
        }));
    }
}

impl RenditionPort for ScriptedRendition {
    fn display(&mut self, target: Option<&Locator>) -> Result<(), NavigationError> {
        if self.detached {
            return Err(NavigationError::DisplayFailed {
                detail: "rendition detached".to_string(),
            });
        }
        self.displayed
            .push(target.and_then(|locator| locator.position_id.clone()));

        let Some(position) = self.target_position(target) else {
            return Err(NavigationError::DisplayFailed {
                detail: "no displayable content".to_string(),
            });
        };
        self.position = Some(position);
        self.emit_relocation();
        Ok(())
    }

    fn advance(&mut self, direction: Direction) -> Result<(), NavigationError> {
        let fail = |detail: &str| NavigationError::AdvanceFailed {
            direction,
            detail: detail.to_string(),
        };
        if self.detached {
            return Err(fail("rendition detached"));
        }
        let Some((unit, page)) = self.position else {
            return Err(fail("nothing displayed yet"));
        };

        let next = match direction {
            Direction::Next => {
                if page + 1 < self.manifest.spine[unit].pages {
                    Some((unit, page + 1))
                } else {
                    self.manifest
                        .spine
                        .iter()
                        .enumerate()
                        .skip(unit + 1)
                        .find(|(_, entry)| entry.pages > 0)
                        .map(|(index, _)| (index, 0))
                }
            }
            Direction::Previous => {
                if page > 0 {
                    Some((unit, page - 1))
                } else {
                    self.manifest.spine[..unit]
                        .iter()
                        .enumerate()
                        .rev()
                        .find(|(_, entry)| entry.pages > 0)
                        .map(|(index, entry)| (index, entry.pages - 1))
                }
            }
        };

        let Some(next) = next else {
            return Err(match direction {
                Direction::Next => fail("end of content"),
                Direction::Previous => fail("start of content"),
            });
        };
        self.position = Some(next);
        self.emit_relocation();
        Ok(())
    }

    fn register_theme(&mut self, name: &str, spec: ThemeSpec) {
        self.themes.insert(name.trim().to_string(), spec);
    }

    fn select_theme(&mut self, name: &str) {
        let name = name.trim();
        if name != "default" && !self.themes.contains_key(name) {
            debug!("scripted rendition: selecting unregistered theme {name}");
        }
        self.active_theme = name.to_string();
    }

    fn set_font_scale(&mut self, scale: FontScale) {
        self.font_scale = Some(scale);
    }

    fn resolve_position(&self, content_ref: &str) -> Option<String> {
        let unit = self.unit_index(content_ref)?;
        (self.manifest.spine[unit].pages > 0).then(|| position_id(content_ref, 0))
    }

    fn subscribe(&mut self) -> RelocationStream {
        let (sink, stream) = relocation_channel();
        self.sink = Some(sink);
        stream
    }

    fn detach(&mut self) {
        self.detached = true;
        self.sink = None;
        self.position = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelocationEvent;

    fn manifest() -> Manifest {
        Manifest {
            title: "Fixture".to_string(),
            spine: vec![
                ManifestUnit::new("unitA", 3),
                ManifestUnit::new("unitB", 2),
                ManifestUnit::new("unitC", 2),
            ],
            toc: vec![Chapter::new("unitA", "Ch1"), Chapter::new("unitC", "Ch3")],
            default_start: None,
        }
    }

    fn rendition() -> ScriptedRendition {
        ScriptedRendition::new(manifest())
    }

    #[test]
    fn open_unknown_uri_is_unreachable() {
        let mut engine = ScriptedEngine::new();
        let err = engine.open("folio://missing").unwrap_err();
        assert!(matches!(err, LoadError::Unreachable { .. }));
        assert_eq!(engine.open_count(), 1);
    }

    #[test]
    fn open_empty_spine_is_malformed() {
        let mut engine = ScriptedEngine::new().with_manifest(
            "folio://empty",
            Manifest {
                spine: Vec::new(),
                ..Manifest::default()
            },
        );
        let err = engine.open("folio://empty").unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn attach_rejects_unusable_viewports() {
        let mut engine = ScriptedEngine::new().with_manifest("folio://doc", manifest());
        let mut doc = engine.open("folio://doc").unwrap();
        assert_eq!(
            doc.attach(&Viewport::new(0, 600)).unwrap_err(),
            AttachError::ZeroSized
        );
        let mut viewport = Viewport::new(800, 600);
        viewport.mark_detached();
        assert_eq!(doc.attach(&viewport).unwrap_err(), AttachError::Detached);
        assert!(doc.attach(&Viewport::new(800, 600)).is_ok());
    }

    #[test]
    fn display_without_target_starts_at_first_unit() {
        let mut rendition = rendition();
        rendition.display(None).unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitA@0"));
        assert_eq!(rendition.displayed_log(), [None]);
    }

    #[test]
    fn display_without_target_honors_manifest_default() {
        let mut rendition = ScriptedRendition::new(Manifest {
            default_start: Some("unitB@1".to_string()),
            ..manifest()
        });
        rendition.display(None).unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitB@1"));
    }

    #[test]
    fn display_foreign_position_falls_back_to_start() {
        let mut rendition = rendition();
        rendition
            .display(Some(&Locator::from_position("cfi-42")))
            .unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitA@0"));
        assert_eq!(rendition.displayed_log(), [Some("cfi-42".to_string())]);
    }

    #[test]
    fn display_resolves_content_ref_when_no_position_id() {
        let mut rendition = rendition();
        let locator = Locator {
            content_ref: Some("unitC".to_string()),
            ..Locator::default()
        };
        rendition.display(Some(&locator)).unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitC@0"));
    }

    #[test]
    fn display_emits_decodable_wire_event() {
        let mut rendition = rendition();
        let stream = rendition.subscribe();
        rendition
            .display(Some(&Locator::from_position("unitA@2")))
            .unwrap();

        let event = RelocationEvent::from_wire(&stream.try_next().unwrap()).unwrap();
        assert_eq!(event.position_id.as_deref(), Some("unitA@2"));
        assert_eq!(event.page, Some(3));
        assert_eq!(event.total, Some(3));
        assert_eq!(event.content_ref.as_deref(), Some("unitA"));
        assert_eq!(event.spine_index, Some(0));
    }

    #[test]
    fn advance_walks_across_units() {
        let mut rendition = rendition();
        rendition.display(None).unwrap();
        for _ in 0..3 {
            rendition.advance(Direction::Next).unwrap();
        }
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitB@0"));

        rendition.advance(Direction::Previous).unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitA@2"));
    }

    #[test]
    fn advance_skips_pageless_units() {
        let mut rendition = ScriptedRendition::new(Manifest {
            spine: vec![
                ManifestUnit::new("unitA", 1),
                ManifestUnit::new("cover-notes", 0),
                ManifestUnit::new("unitB", 1),
            ],
            ..Manifest::default()
        });
        rendition.display(None).unwrap();
        rendition.advance(Direction::Next).unwrap();
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitB@0"));
    }

    #[test]
    fn advance_fails_at_boundaries() {
        let mut rendition = rendition();
        rendition.display(None).unwrap();
        let err = rendition.advance(Direction::Previous).unwrap_err();
        assert_eq!(
            err,
            NavigationError::AdvanceFailed {
                direction: Direction::Previous,
                detail: "start of content".to_string(),
            }
        );

        for _ in 0..6 {
            rendition.advance(Direction::Next).unwrap();
        }
        let err = rendition.advance(Direction::Next).unwrap_err();
        assert!(matches!(
            err,
            NavigationError::AdvanceFailed {
                direction: Direction::Next,
                ..
            }
        ));
        assert_eq!(rendition.current_position_id().as_deref(), Some("unitC@1"));
    }

    #[test]
    fn advance_before_display_fails() {
        let mut rendition = rendition();
        let err = rendition.advance(Direction::Next).unwrap_err();
        assert!(matches!(err, NavigationError::AdvanceFailed { .. }));
    }

    #[test]
    fn resolve_position_requires_pages() {
        let rendition = ScriptedRendition::new(Manifest {
            spine: vec![ManifestUnit::new("unitA", 2), ManifestUnit::new("unitB", 0)],
            ..Manifest::default()
        });
        assert_eq!(
            rendition.resolve_position("unitA").as_deref(),
            Some("unitA@0")
        );
        assert_eq!(rendition.resolve_position("unitB"), None);
        assert_eq!(rendition.resolve_position("ghost"), None);
    }

    #[test]
    fn themes_and_font_scale_are_tracked() {
        let mut rendition = rendition();
        rendition.register_theme("dark", ThemeSpec::dark());
        assert_eq!(
            rendition.registered_theme("dark"),
            Some(&ThemeSpec::dark())
        );
        assert_eq!(rendition.active_theme(), "default");
        rendition.select_theme("dark");
        assert_eq!(rendition.active_theme(), "dark");

        assert_eq!(rendition.font_scale(), None);
        rendition.set_font_scale(FontScale::new(120));
        assert_eq!(rendition.font_scale(), Some(FontScale::new(120)));
    }

    #[test]
    fn detach_stops_navigation_and_events() {
        let mut rendition = rendition();
        let stream = rendition.subscribe();
        rendition.display(None).unwrap();
        assert!(stream.try_next().is_some());

        rendition.detach();
        assert!(rendition.is_detached());
        assert!(rendition.display(None).is_err());
        assert!(rendition.advance(Direction::Next).is_err());
        assert!(stream.try_next().is_none());
    }

    #[test]
    fn resubscribe_supersedes_old_stream() {
        let mut rendition = rendition();
        let old = rendition.subscribe();
        let new = rendition.subscribe();
        rendition.display(None).unwrap();
        assert!(old.try_next().is_none());
        assert!(new.try_next().is_some());
    }

    #[test]
    fn manifest_parses_from_json() {
        let raw = r#"{
            "title": "Sample",
            "spine": [
                { "content_ref": "unitA", "pages": 3 },
                { "content_ref": "unitB", "pages": 2 }
            ],
            "toc": [
                { "content_ref": "unitA", "label": "Ch1" }
            ],
            "default_start": "unitA@1"
        }"#;
        let manifest: Manifest = serde_json::from_str(raw).unwrap();
        assert_eq!(manifest.title, "Sample");
        assert_eq!(manifest.spine.len(), 2);
        assert_eq!(manifest.toc[0].label, "Ch1");
        assert_eq!(manifest.default_start.as_deref(), Some("unitA@1"));
    }
}
