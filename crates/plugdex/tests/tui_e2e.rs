//! End-to-end TUI flows against a scripted transport, rendered into a
//! ratatui `TestBackend`.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{backend::TestBackend, Terminal};

use plugdex::prefs::PrefsStore;
use plugdex::transport::testing::{CallRecord, ScriptedTransport};
use plugdex::tui::app::{App, Mode};
use plugdex::tui::ui;

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn new_app(transport: Arc<ScriptedTransport>) -> (App, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let app = App::new(transport, PrefsStore::at(dir.path().join("prefs.json")));
    (app, dir)
}

fn pump<F: FnMut(&App) -> bool>(app: &mut App, start: Instant, mut done: F) {
    let deadline = Instant::now() + Duration::from_secs(2);
    let mut offset = Duration::from_millis(600);
    while !done(app) {
        assert!(Instant::now() < deadline, "timed out pumping app");
        app.tick_at(start + offset);
        offset += Duration::from_millis(50);
        thread::sleep(Duration::from_millis(5));
    }
}

fn render(app: &App) -> String {
    let backend = TestBackend::new(100, 30);
    let mut terminal = Terminal::new(backend).unwrap();
    terminal.draw(|frame| ui::draw(frame, app)).unwrap();
    let buffer = terminal.backend().buffer();
    let mut text = String::new();
    for y in 0..buffer.area.height {
        for x in 0..buffer.area.width {
            text.push_str(buffer[(x, y)].symbol());
        }
        text.push('\n');
    }
    text
}

#[test]
fn search_then_browse_renders_page_counts() {
    let transport = Arc::new(ScriptedTransport::new());
    let (mut app, _dir) = new_app(Arc::clone(&transport));
    let t0 = Instant::now();
    pump(&mut app, t0, |a| a.controller.page().is_some());

    let screen = render(&app);
    assert!(screen.contains("page 1 of 3"), "missing page header:\n{screen}");
    assert!(screen.contains("alpha"));

    // Search focus, type, and let the debounce fire.
    app.handle_key_at(key(KeyCode::Char('/')), t0);
    for ch in "git".chars() {
        app.handle_key_at(key(KeyCode::Char(ch)), t0);
    }
    pump(&mut app, t0, |a| {
        !a.controller.is_loading() && a.controller.query().text == "git"
    });
    assert_eq!(
        transport.listing_calls().last().map(|q| q.text.clone()),
        Some("git".to_string())
    );

    let screen = render(&app);
    assert!(screen.contains("git"), "search text not rendered:\n{screen}");
}

#[test]
fn page_flip_renders_new_page_and_keeps_old_during_load() {
    let transport = Arc::new(ScriptedTransport::new());
    let (mut app, _dir) = new_app(Arc::clone(&transport));
    let t0 = Instant::now();
    pump(&mut app, t0, |a| a.controller.page().is_some());

    app.handle_key_at(key(KeyCode::Char('n')), t0 + Duration::from_secs(1));
    // Old page stays on screen while the new one loads.
    assert!(app.controller.page().is_some());

    pump(&mut app, t0, |a| {
        a.controller.page().is_some_and(|p| p.current_page == 2)
    });
    let screen = render(&app);
    assert!(screen.contains("page 2 of 3"), "missing page header:\n{screen}");
}

#[test]
fn open_detail_and_edit_tags_end_to_end() {
    let transport = Arc::new(ScriptedTransport::new());
    let (mut app, _dir) = new_app(Arc::clone(&transport));
    let t0 = Instant::now();
    pump(&mut app, t0, |a| a.controller.page().is_some());

    let t1 = t0 + Duration::from_secs(1);
    app.handle_key_at(key(KeyCode::Char('j')), t1);
    let slug = app.controller.selected_plugin().unwrap().slug.clone();
    app.handle_key_at(key(KeyCode::Enter), t1);
    assert_eq!(app.mode, Mode::Detail);

    pump(&mut app, t0, |a| {
        a.detail.as_ref().is_some_and(|v| v.detail.is_some())
    });
    let screen = render(&app);
    assert!(screen.contains("Vundle"), "install tabs missing:\n{screen}");
    assert!(screen.contains(&slug), "plugin name missing:\n{screen}");

    app.handle_key_at(key(KeyCode::Char('t')), t1);
    for ch in "git, fugitive".chars() {
        app.handle_key_at(key(KeyCode::Char(ch)), t1);
    }
    app.handle_key_at(key(KeyCode::Enter), t1);
    pump(&mut app, t0, |a| !a.mutations.is_busy());

    let expected = CallRecord::SetTags {
        slug,
        tags: vec!["git".into(), "fugitive".into()],
    };
    assert!(transport.calls().contains(&expected));

    app.handle_key_at(key(KeyCode::Esc), t1);
    assert_eq!(app.mode, Mode::Browse);
}

#[test]
fn visited_plugins_render_dimmed_marker() {
    let transport = Arc::new(ScriptedTransport::new());
    let (mut app, _dir) = new_app(Arc::clone(&transport));
    let t0 = Instant::now();
    pump(&mut app, t0, |a| a.controller.page().is_some());

    let t1 = t0 + Duration::from_secs(1);
    app.handle_key_at(key(KeyCode::Char('j')), t1);
    let slug = app.controller.selected_plugin().unwrap().slug.clone();
    app.handle_key_at(key(KeyCode::Enter), t1);
    app.handle_key_at(key(KeyCode::Esc), t1);

    assert!(app.prefs.is_visited(&slug));
    let screen = render(&app);
    assert!(screen.contains("Plugins"), "browse screen missing:\n{screen}");
}
