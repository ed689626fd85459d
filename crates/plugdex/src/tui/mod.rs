//! Terminal user interface for browsing the plugin catalog.

pub mod app;
pub mod event;
pub mod ui;

use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, prelude::*, Terminal};

use crate::prefs::PrefsStore;
use crate::transport::CatalogTransport;
use app::App;
use event::{Event, EventHandler};

const TICK_RATE: Duration = Duration::from_millis(100);

/// Run the TUI until the user quits.
pub async fn run(transport: Arc<dyn CatalogTransport>) -> Result<()> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(transport, PrefsStore::default_location());
    let mut events = EventHandler::new(TICK_RATE);

    let result = run_app(&mut terminal, &mut app, &mut events).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    events: &mut EventHandler,
) -> Result<()> {
    while app.running {
        terminal.draw(|frame| ui::draw(frame, app))?;

        match events.next().await {
            Event::Key(key) => app.handle_key(key),
            Event::Tick => app.tick(),
            Event::Resize(_, _) => {} // Ratatui handles resize
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::ScriptedTransport;
    use ratatui::backend::TestBackend;

    #[test]
    fn app_starts_in_browse_mode() {
        let transport = Arc::new(ScriptedTransport::new());
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(transport, PrefsStore::at(dir.path().join("prefs.json")));
        assert!(matches!(app.mode, app::Mode::Browse));
        assert!(app.running);
    }

    #[test]
    fn app_renders_without_panic() {
        let backend = TestBackend::new(80, 24);
        let mut terminal = Terminal::new(backend).unwrap();

        let transport = Arc::new(ScriptedTransport::new());
        let dir = tempfile::tempdir().unwrap();
        let app = App::new(transport, PrefsStore::at(dir.path().join("prefs.json")));

        terminal.draw(|frame| ui::draw(frame, &app)).unwrap();

        let buffer = terminal.backend().buffer();
        assert!(buffer.area.width == 80);
        assert!(buffer.area.height == 24);
    }
}
