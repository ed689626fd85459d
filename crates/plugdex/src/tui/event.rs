//! Terminal event source for the TUI.

use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;

/// Events delivered to the main loop.
#[derive(Debug)]
pub enum Event {
    /// Key press
    Key(KeyEvent),
    /// Periodic tick; drives timers and channel polling
    Tick,
    /// Terminal resize
    Resize(u16, u16),
}

/// Polls crossterm for input, emitting a tick when the poll times out.
pub struct EventHandler {
    tick_rate: Duration,
}

impl EventHandler {
    pub fn new(tick_rate: Duration) -> Self {
        Self { tick_rate }
    }

    /// Next event. Blocking reads run on the blocking pool so the async
    /// runtime stays responsive.
    pub async fn next(&self) -> Event {
        let tick_rate = self.tick_rate;
        tokio::task::spawn_blocking(move || {
            if event::poll(tick_rate).unwrap_or(false) {
                match event::read() {
                    Ok(CrosstermEvent::Key(key)) => Event::Key(key),
                    Ok(CrosstermEvent::Resize(w, h)) => Event::Resize(w, h),
                    _ => Event::Tick,
                }
            } else {
                Event::Tick
            }
        })
        .await
        .unwrap_or(Event::Tick)
    }
}
