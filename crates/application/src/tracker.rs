//! Current-location state machine.

use folio_core::{ReadingState, RelocationDecodeError, TocIndex};
use folio_engine::RelocationEvent;
use log::debug;
use serde_json::Value;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TrackerPhase {
    #[default]
    Unbound,
    AwaitingFirstRelocation,
    Tracking,
}

/// Folds relocation events into the externally observable [`ReadingState`].
///
/// The locator is replaced wholesale on every event. The chapter label is
/// sticky: it only changes when a TOC lookup for the event's content ref
/// succeeds, because many documents have spine units with no TOC entry and
/// the chapter must not flicker to unknown between pages of the same chapter.
#[derive(Debug, Default)]
pub struct LocationTracker {
    phase: TrackerPhase,
    state: ReadingState,
}

impl LocationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.phase
    }

    pub fn state(&self) -> &ReadingState {
        &self.state
    }

    /// Called when a rendition has attached and the first display was issued.
    pub fn mark_display_requested(&mut self) {
        if self.phase == TrackerPhase::Unbound {
            self.phase = TrackerPhase::AwaitingFirstRelocation;
        }
    }

    pub fn apply_wire(
        &mut self,
        payload: &Value,
        toc: &TocIndex,
    ) -> Result<(), RelocationDecodeError> {
        let event = RelocationEvent::from_wire(payload)?;
        self.apply(event, toc);
        Ok(())
    }

    pub fn apply(&mut self, event: RelocationEvent, toc: &TocIndex) {
        let locator = event.into_locator();
        if let Some(label) = locator
            .content_ref
            .as_deref()
            .and_then(|content_ref| toc.label_for(content_ref))
        {
            self.state.chapter_label = Some(label.to_string());
        }
        debug!(
            "relocated to {:?} (chapter {:?})",
            locator.position_id, self.state.chapter_label
        );
        self.state.locator = locator;
        self.phase = TrackerPhase::Tracking;
    }
}
