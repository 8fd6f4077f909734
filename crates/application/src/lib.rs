//! Reading-session orchestration for Folio.
//!
//! Joins the two independent readiness signals (document loaded, viewport
//! supplied) into a single rendition attach, tracks the current location via
//! the relocation stream, and exposes navigation controls that report faults
//! instead of raising them.

mod tracker;

pub use tracker::{LocationTracker, TrackerPhase};

use folio_core::{
    AttachError, ColorMode, Direction, FontScale, LoadError, Locator, NavigationError,
    NavigationWarning, ReadingState, SpineIndex, TocIndex,
};
use folio_engine::{
    DocumentSource, ReflowEngine, RelocationStream, RenditionPort, ThemeSpec, Viewport,
};
use log::{debug, warn};

pub type RenditionOf<E> = <<E as ReflowEngine>::Doc as DocumentSource>::Rendition;

enum SessionDoc<D> {
    Unloaded,
    Ready(D),
    Failed(LoadError),
}

/// Owns the loaded-document lifecycle: load once, expose spine/TOC once ready.
pub struct BookSession<E: ReflowEngine> {
    engine: E,
    uri: Option<String>,
    doc: SessionDoc<E::Doc>,
    spine: SpineIndex,
    toc: TocIndex,
}

impl<E: ReflowEngine> BookSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            uri: None,
            doc: SessionDoc::Unloaded,
            spine: SpineIndex::default(),
            toc: TocIndex::default(),
        }
    }

    /// Idempotent: the first call decides the outcome for the whole session.
    /// A repeat returns the cached result; a failed load is session-fatal.
    pub fn load(&mut self, uri: &str) -> Result<(), LoadError> {
        match &self.doc {
            SessionDoc::Ready(_) => {
                if self.uri.as_deref() != Some(uri) {
                    debug!("ignoring load of {uri}; session already owns a document");
                }
                return Ok(());
            }
            SessionDoc::Failed(err) => return Err(err.clone()),
            SessionDoc::Unloaded => {}
        }

        match self.engine.open(uri) {
            Ok(doc) => {
                self.spine = SpineIndex::from_refs(doc.spine_refs().to_vec());
                self.toc = TocIndex::from_entries(doc.toc_entries().to_vec());
                self.uri = Some(uri.to_string());
                self.doc = SessionDoc::Ready(doc);
                Ok(())
            }
            Err(err) => {
                self.uri = Some(uri.to_string());
                self.doc = SessionDoc::Failed(err.clone());
                Err(err)
            }
        }
    }

    pub fn ready(&self) -> bool {
        matches!(self.doc, SessionDoc::Ready(_))
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn spine(&self) -> Option<&SpineIndex> {
        self.ready().then_some(&self.spine)
    }

    pub fn toc(&self) -> Option<&TocIndex> {
        self.ready().then_some(&self.toc)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    fn doc_mut(&mut self) -> Option<&mut E::Doc> {
        match &mut self.doc {
            SessionDoc::Ready(doc) => Some(doc),
            _ => None,
        }
    }
}

/// Outcome of a navigation call. Faults are values to report, never panics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavReport {
    Applied,
    Skipped(NavigationWarning),
    Failed(NavigationError),
}

impl NavReport {
    pub fn is_applied(&self) -> bool {
        matches!(self, NavReport::Applied)
    }
}

/// The reading session a host interacts with.
///
/// Wires a [`BookSession`] to a rendition once both the document and the
/// viewport are available, keeps [`ReadingState`] current from the relocation
/// stream, and exposes the navigation controls.
pub struct ReaderSession<E: ReflowEngine> {
    book: BookSession<E>,
    viewport: Option<Viewport>,
    rendition: Option<RenditionOf<E>>,
    relocations: Option<RelocationStream>,
    tracker: LocationTracker,
    color_mode: ColorMode,
    restored: Option<Locator>,
}

impl<E: ReflowEngine> ReaderSession<E> {
    pub fn new(engine: E) -> Self {
        Self {
            book: BookSession::new(engine),
            viewport: None,
            rendition: None,
            relocations: None,
            tracker: LocationTracker::new(),
            color_mode: ColorMode::default(),
            restored: None,
        }
    }

    /// Supply a persisted position to resume from. The id is opaque and is
    /// only ever passed through to the engine's `display`.
    pub fn with_restored_position(mut self, position_id: impl Into<String>) -> Self {
        self.restored = Some(Locator::from_position(position_id));
        self
    }

    pub fn load(&mut self, uri: &str) -> Result<(), LoadError> {
        self.book.load(uri)?;
        self.maybe_attach();
        Ok(())
    }

    /// Supply (or replace) the viewport container. Attach happens here when
    /// the document is already loaded, otherwise as soon as it is. Replacing
    /// the viewport while attached remounts the rendition and restores the
    /// previously observed position.
    pub fn set_viewport(&mut self, viewport: Viewport) -> Result<(), AttachError> {
        if self.rendition.is_some() {
            self.teardown_rendition();
        }
        self.viewport = Some(viewport);
        if self.book.ready() {
            self.attach_now()
        } else {
            Ok(())
        }
    }

    pub fn ready(&self) -> bool {
        self.book.ready()
    }

    pub fn attached(&self) -> bool {
        self.rendition.is_some()
    }

    pub fn state(&self) -> &ReadingState {
        self.tracker.state()
    }

    pub fn phase(&self) -> TrackerPhase {
        self.tracker.phase()
    }

    pub fn book(&self) -> &BookSession<E> {
        &self.book
    }

    pub fn rendition(&self) -> Option<&RenditionOf<E>> {
        self.rendition.as_ref()
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.color_mode = mode;
        if let Some(rendition) = &mut self.rendition {
            rendition.select_theme(mode.theme_name());
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        self.color_mode
    }

    /// Drain pending relocation events into the tracker; returns how many
    /// were applied. Malformed payloads are dropped and logged, keeping the
    /// prior state.
    pub fn pump_relocations(&mut self) -> usize {
        let Some(stream) = &self.relocations else {
            return 0;
        };
        let Some(toc) = self.book.toc() else {
            return 0;
        };

        let mut applied = 0;
        while let Some(payload) = stream.try_next() {
            match self.tracker.apply_wire(&payload, toc) {
                Ok(()) => applied += 1,
                Err(err) => warn!("dropping relocation event: {err}"),
            }
        }
        applied
    }

    pub fn next(&mut self) -> NavReport {
        self.advance(Direction::Next)
    }

    pub fn previous(&mut self) -> NavReport {
        self.advance(Direction::Previous)
    }

    fn advance(&mut self, direction: Direction) -> NavReport {
        let Some(rendition) = &mut self.rendition else {
            debug!("{direction} ignored: no rendition attached");
            return NavReport::Skipped(NavigationWarning::NotReady);
        };
        match rendition.advance(direction) {
            Ok(()) => NavReport::Applied,
            Err(err) => {
                warn!("{err}");
                NavReport::Failed(err)
            }
        }
    }

    /// Navigate to a content unit. Unknown refs are a silent no-op: callers
    /// routinely probe hrefs that are not in every document's spine.
    pub fn go_to(&mut self, content_ref: &str) -> NavReport {
        let Some(spine) = self.book.spine() else {
            return NavReport::Skipped(NavigationWarning::NotReady);
        };
        if !spine.contains(content_ref) {
            debug!("go_to target not in spine: {content_ref}");
            return NavReport::Skipped(NavigationWarning::NotInSpine {
                content_ref: content_ref.to_string(),
            });
        }
        let Some(rendition) = &mut self.rendition else {
            return NavReport::Skipped(NavigationWarning::NotReady);
        };

        let Some(position) = rendition.resolve_position(content_ref) else {
            let err = NavigationError::LocatorResolutionFailed {
                content_ref: content_ref.to_string(),
            };
            warn!("{err}");
            return NavReport::Failed(err);
        };
        match rendition.display(Some(&Locator::from_position(position))) {
            Ok(()) => NavReport::Applied,
            Err(err) => {
                warn!("{err}");
                NavReport::Failed(err)
            }
        }
    }

    /// Pass-through; silently ignored until a rendition is attached.
    pub fn change_font_scale(&mut self, scale: FontScale) {
        match &mut self.rendition {
            Some(rendition) => rendition.set_font_scale(scale),
            None => debug!("font scale {scale} ignored: no rendition attached"),
        }
    }

    /// Best-effort chapter probe for hosts rendering a TOC drawer.
    pub fn chapter_label_for(&self, content_ref: &str) -> Option<&str> {
        self.book.toc()?.label_for(content_ref)
    }

    fn maybe_attach(&mut self) {
        if self.rendition.is_some() || self.viewport.is_none() || !self.book.ready() {
            return;
        }
        if let Err(err) = self.attach_now() {
            // Retryable: the host surfaces a fresh container via set_viewport.
            warn!("deferred attach failed: {err}");
        }
    }

    fn attach_now(&mut self) -> Result<(), AttachError> {
        let Some(viewport) = self.viewport else {
            return Err(AttachError::Detached);
        };
        let observed = self.tracker.state().locator.position_id.is_some();
        let remembered = observed.then(|| self.tracker.state().locator.clone());

        let Some(doc) = self.book.doc_mut() else {
            return Err(AttachError::Detached);
        };
        let mut rendition = doc.attach(&viewport)?;
        let stream = rendition.subscribe();

        rendition.register_theme(ColorMode::Dark.theme_name(), ThemeSpec::dark());
        rendition.select_theme(self.color_mode.theme_name());

        // First attach: explicit restored position > engine default > blank.
        // Remount: the position observed in this session wins; the restored
        // one is stale by then.
        let initial = match (remembered, &self.restored) {
            (Some(observed), _) => Some(observed),
            (None, Some(explicit)) => Some(explicit.clone()),
            (None, None) => doc.default_start(),
        };

        self.tracker.mark_display_requested();
        if let Err(err) = rendition.display(initial.as_ref()) {
            warn!("initial display failed: {err}");
        }

        self.relocations = Some(stream);
        self.rendition = Some(rendition);
        Ok(())
    }

    fn teardown_rendition(&mut self) {
        // Unsubscribe before detaching so nothing is delivered against a
        // disposed container.
        self.relocations = None;
        if let Some(mut rendition) = self.rendition.take() {
            rendition.detach();
        }
    }
}

impl<E: ReflowEngine> Drop for ReaderSession<E> {
    fn drop(&mut self) {
        self.teardown_rendition();
    }
}
