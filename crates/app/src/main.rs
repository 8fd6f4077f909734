use std::collections::HashMap;
use std::fs;
use std::io::{self, BufRead as _};
use std::path::Path;

use anyhow::Context as _;
use directories::ProjectDirs;
use folio_application::{NavReport, ReaderSession};
use folio_core::{Chapter, FontScale};
use folio_engine::Viewport;
use folio_engine::scripted::{Manifest, ManifestUnit, ScriptedEngine};

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let project_dirs =
        ProjectDirs::from("dev", "folio", "folio").context("resolve project dirs")?;
    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;
    let positions_path = config_dir.join("positions.json");
    let mut positions = load_positions(&positions_path);

    let (uri, manifest) = match std::env::args().nth(1) {
        Some(path) => {
            let raw = fs::read_to_string(&path).with_context(|| format!("read manifest {path}"))?;
            let manifest: Manifest =
                serde_json::from_str(&raw).with_context(|| format!("parse manifest {path}"))?;
            (format!("file://{path}"), manifest)
        }
        None => ("folio://sample".to_string(), sample_manifest()),
    };
    let title = if manifest.title.is_empty() {
        uri.clone()
    } else {
        manifest.title.clone()
    };

    let engine = ScriptedEngine::new().with_manifest(&uri, manifest);
    let mut session = ReaderSession::new(engine);
    if let Some(position) = positions.get(&uri) {
        session = session.with_restored_position(position);
    }
    session.load(&uri).with_context(|| format!("load {uri}"))?;
    session
        .set_viewport(Viewport::new(800, 600))
        .context("attach viewport")?;
    session.pump_relocations();

    println!("{title}");
    println!("n(ext) p(rev) g <ref> f+/f- t(heme) q(uit)");
    print_state(&session);

    let mut font = FontScale::default();
    for line in io::stdin().lock().lines() {
        let line = line.context("read intent")?;
        let Some(intent) = Intent::parse(&line) else {
            println!("? n(ext) p(rev) g <ref> f+/f- t(heme) q(uit)");
            continue;
        };
        match intent {
            Intent::Quit => break,
            Intent::Next => report(session.next()),
            Intent::Previous => report(session.previous()),
            Intent::GoTo(content_ref) => report(session.go_to(&content_ref)),
            Intent::FontUp => {
                font = font.step_up();
                session.change_font_scale(font);
                println!("font scale {font}");
            }
            Intent::FontDown => {
                font = font.step_down();
                session.change_font_scale(font);
                println!("font scale {font}");
            }
            Intent::ToggleTheme => {
                let mode = session.color_mode().toggled();
                session.set_color_mode(mode);
                println!("color mode {mode}");
            }
        }

        if session.pump_relocations() > 0 {
            print_state(&session);
            if let Some(position) = session.state().locator.position_id.clone()
                && positions.get(&uri) != Some(&position)
            {
                positions.insert(uri.clone(), position);
                save_positions(&positions_path, &positions)?;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Intent {
    Next,
    Previous,
    GoTo(String),
    FontUp,
    FontDown,
    ToggleTheme,
    Quit,
}

impl Intent {
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        match line {
            "n" | "next" => Some(Intent::Next),
            "p" | "prev" | "previous" => Some(Intent::Previous),
            "f+" | "f +" => Some(Intent::FontUp),
            "f-" | "f -" => Some(Intent::FontDown),
            "t" | "theme" => Some(Intent::ToggleTheme),
            "q" | "quit" => Some(Intent::Quit),
            _ => {
                let target = line.strip_prefix("g ")?.trim();
                (!target.is_empty()).then(|| Intent::GoTo(target.to_string()))
            }
        }
    }
}

fn report(report: NavReport) {
    match report {
        NavReport::Applied => {}
        NavReport::Skipped(warning) => println!("({warning})"),
        NavReport::Failed(err) => println!("error: {err}"),
    }
}

fn print_state(session: &ReaderSession<ScriptedEngine>) {
    let state = session.state();
    let position = state.locator.position_id.as_deref().unwrap_or("(unknown)");
    let chapter = state.chapter_label.as_deref().unwrap_or("-");
    match (state.locator.page, state.locator.total) {
        (Some(page), Some(total)) => println!(
            "{chapter} | {position} | page {page}/{total} ({:.0}%)",
            state.locator.progress_percent()
        ),
        _ => println!("{chapter} | {position}"),
    }
}

fn load_positions(path: &Path) -> HashMap<String, String> {
    let Ok(raw) = fs::read_to_string(path) else {
        return HashMap::new();
    };
    serde_json::from_str(&raw).unwrap_or_default()
}

fn save_positions(path: &Path, positions: &HashMap<String, String>) -> anyhow::Result<()> {
    let raw = serde_json::to_string(positions)?;
    fs::write(path, raw).with_context(|| format!("write positions to {}", path.display()))
}

fn sample_manifest() -> Manifest {
    Manifest {
        title: "The Wandering Isle".to_string(),
        spine: vec![
            ManifestUnit::new("cover.xhtml", 1),
            ManifestUnit::new("ch1.xhtml", 4),
            ManifestUnit::new("ch2.xhtml", 3),
            ManifestUnit::new("interlude.xhtml", 2),
            ManifestUnit::new("ch3.xhtml", 4),
        ],
        toc: vec![
            Chapter::new("ch1.xhtml", "I. The Harbor"),
            Chapter::new("ch2.xhtml", "II. The Crossing"),
            Chapter::new("ch3.xhtml", "III. Landfall"),
        ],
        default_start: Some("ch1.xhtml@0".to_string()),
    }
}
