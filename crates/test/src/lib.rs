//! Test helpers and fixtures for Folio reading sessions.

use folio_application::ReaderSession;
use folio_core::Chapter;
use folio_engine::Viewport;
use folio_engine::scripted::{Manifest, ManifestUnit, ScriptedEngine};

pub const FIXTURE_URI: &str = "folio://fixture";

/// Spine `[unitA, unitB, unitC]` with TOC entries for unitA and unitC only;
/// unitB is the classic TOC gap the sticky-chapter rule exists for.
pub fn sample_manifest() -> Manifest {
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

pub fn usable_viewport() -> Viewport {
    Viewport::new(800, 600)
}

/// A session with the manifest loaded but no viewport supplied yet.
pub fn loaded_session(manifest: Manifest) -> ReaderSession<ScriptedEngine> {
    let engine = ScriptedEngine::new().with_manifest(FIXTURE_URI, manifest);
    let mut session = ReaderSession::new(engine);
    session
        .load(FIXTURE_URI)
        .expect("fixture manifest should load");
    session
}

/// A session attached to a viewport with the first relocation applied.
pub fn ready_session() -> ReaderSession<ScriptedEngine> {
    let mut session = loaded_session(sample_manifest());
    session
        .set_viewport(usable_viewport())
        .expect("fixture viewport should attach");
    session.pump_relocations();
    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_application::{NavReport, TrackerPhase};
    use folio_core::{Direction, NavigationError};

    #[test]
    fn fixtures_build_a_tracking_session() {
        let session = ready_session();
        assert!(session.ready());
        assert!(session.attached());
        assert_eq!(session.phase(), TrackerPhase::Tracking);
    }

    #[test]
    fn chapter_walk_across_the_spine() {
        let mut session = ready_session();
        assert_eq!(session.state().chapter_label.as_deref(), Some("Ch1"));

        // unitA has three pages; the third next lands on unitB, which has no
        // TOC entry, so the label must hold.
        for _ in 0..3 {
            assert!(session.next().is_applied());
        }
        session.pump_relocations();
        assert_eq!(
            session.state().locator.content_ref.as_deref(),
            Some("unitB")
        );
        assert_eq!(session.state().chapter_label.as_deref(), Some("Ch1"));

        for _ in 0..2 {
            assert!(session.next().is_applied());
        }
        session.pump_relocations();
        assert_eq!(
            session.state().locator.content_ref.as_deref(),
            Some("unitC")
        );
        assert_eq!(session.state().chapter_label.as_deref(), Some("Ch3"));
    }

    #[test]
    fn explicit_restored_position_wins_over_engine_default() {
        let manifest = Manifest {
            default_start: Some("unitA@1".to_string()),
            ..sample_manifest()
        };
        let engine = ScriptedEngine::new().with_manifest(FIXTURE_URI, manifest);
        let mut session = ReaderSession::new(engine).with_restored_position("cfi-42");
        session.load(FIXTURE_URI).unwrap();
        session.set_viewport(usable_viewport()).unwrap();

        let requested = session.rendition().unwrap().displayed_log()[0].clone();
        assert_eq!(requested.as_deref(), Some("cfi-42"));
    }

    #[test]
    fn engine_default_is_used_when_nothing_is_known() {
        let manifest = Manifest {
            default_start: Some("unitB@1".to_string()),
            ..sample_manifest()
        };
        let mut session = loaded_session(manifest);
        session.set_viewport(usable_viewport()).unwrap();

        let requested = session.rendition().unwrap().displayed_log()[0].clone();
        assert_eq!(requested.as_deref(), Some("unitB@1"));

        session.pump_relocations();
        assert_eq!(
            session.state().locator.position_id.as_deref(),
            Some("unitB@1")
        );
    }

    #[test]
    fn blank_display_renders_from_the_spine_start() {
        let mut session = loaded_session(sample_manifest());
        session.set_viewport(usable_viewport()).unwrap();

        assert_eq!(session.rendition().unwrap().displayed_log(), [None]);
        session.pump_relocations();
        assert_eq!(
            session.state().locator.position_id.as_deref(),
            Some("unitA@0")
        );
    }

    #[test]
    fn observed_position_beats_the_restored_one_on_remount() {
        let engine = ScriptedEngine::new().with_manifest(FIXTURE_URI, sample_manifest());
        let mut session = ReaderSession::new(engine).with_restored_position("cfi-7");
        session.load(FIXTURE_URI).unwrap();
        session.set_viewport(usable_viewport()).unwrap();
        session.pump_relocations();

        session.next();
        session.pump_relocations();
        let observed = session.state().locator.position_id.clone().unwrap();

        session.set_viewport(Viewport::new(1024, 768)).unwrap();
        let requested = session.rendition().unwrap().displayed_log()[0].clone();
        assert_eq!(requested, Some(observed));
    }

    #[test]
    fn displaying_the_same_position_twice_is_idempotent() {
        let mut session = ready_session();
        assert!(session.go_to("unitC").is_applied());
        session.pump_relocations();
        let once = session.state().clone();

        assert!(session.go_to("unitC").is_applied());
        session.pump_relocations();
        assert_eq!(session.state(), &once);
    }

    #[test]
    fn end_of_book_advance_is_reported_not_raised() {
        let mut session = ready_session();
        while session.next().is_applied() {}
        session.pump_relocations();
        let end = session.state().clone();
        assert_eq!(end.locator.position_id.as_deref(), Some("unitC@1"));

        let report = session.next();
        assert!(matches!(
            report,
            NavReport::Failed(NavigationError::AdvanceFailed {
                direction: Direction::Next,
                ..
            })
        ));
        session.pump_relocations();
        assert_eq!(session.state(), &end);
    }

    #[test]
    fn page_hints_drive_progress_display() {
        let mut session = ready_session();
        session.next();
        session.pump_relocations();
        let locator = &session.state().locator;
        assert_eq!(locator.page, Some(2));
        assert_eq!(locator.total, Some(3));
        assert!((locator.progress_percent() - 66.6).abs() < 1.0);
    }
}
