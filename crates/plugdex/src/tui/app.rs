//! Application state and key handling for the TUI.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use plugdex_protocol::{
    dedup_tags, CategoryInfo, MutationPayload, PluginDetail, SubmitForm, SubmitOutcome,
    TransportError,
};
use tracing::{debug, warn};

use crate::controller::ResultController;
use crate::mutation::MutationQueue;
use crate::prefs::{InstallTab, Prefs, PrefsStore};
use crate::transport::{CancelToken, CatalogTransport};

/// Which screen is on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Browse,
    Detail,
    Submit,
}

/// State for the plugin detail screen.
pub struct DetailView {
    pub slug: String,
    pub detail: Option<PluginDetail>,
    pub error: Option<TransportError>,
    /// Tag edit buffer while the user is typing; `None` when not editing.
    pub editing_tags: Option<String>,
    pub scroll: u16,
    rx: Option<mpsc::Receiver<Result<PluginDetail, TransportError>>>,
    cancel: CancelToken,
}

impl DetailView {
    pub fn is_loading(&self) -> bool {
        self.rx.is_some()
    }
}

/// Fields of the plugin submission form, in focus order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitField {
    Name,
    GithubUrl,
    Tags,
}

impl SubmitField {
    const ORDER: [SubmitField; 3] = [SubmitField::Name, SubmitField::GithubUrl, SubmitField::Tags];

    fn next(self) -> Self {
        let at = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(at + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        let at = Self::ORDER.iter().position(|f| *f == self).unwrap_or(0);
        Self::ORDER[(at + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }
}

/// State for the submit-a-plugin screen.
pub struct SubmitView {
    pub name: String,
    pub github_url: String,
    pub tags: String,
    pub focus: SubmitField,
    pub status: Option<String>,
    rx: Option<mpsc::Receiver<Result<SubmitOutcome, TransportError>>>,
}

impl SubmitView {
    fn new() -> Self {
        Self {
            name: String::new(),
            github_url: String::new(),
            tags: String::new(),
            focus: SubmitField::Name,
            status: None,
            rx: None,
        }
    }

    pub fn is_sending(&self) -> bool {
        self.rx.is_some()
    }

    fn field_mut(&mut self) -> &mut String {
        match self.focus {
            SubmitField::Name => &mut self.name,
            SubmitField::GithubUrl => &mut self.github_url,
            SubmitField::Tags => &mut self.tags,
        }
    }
}

/// Top-level TUI state.
pub struct App {
    pub running: bool,
    pub mode: Mode,
    pub controller: ResultController,
    pub mutations: MutationQueue,
    pub prefs: Prefs,
    pub search_focused: bool,
    pub search_input: String,
    pub status: Option<String>,
    pub categories: Vec<CategoryInfo>,
    pub detail: Option<DetailView>,
    pub submit: Option<SubmitView>,
    transport: Arc<dyn CatalogTransport>,
    prefs_store: PrefsStore,
    categories_rx: Option<mpsc::Receiver<Result<Vec<CategoryInfo>, TransportError>>>,
}

impl App {
    pub fn new(transport: Arc<dyn CatalogTransport>, prefs_store: PrefsStore) -> Self {
        let prefs = prefs_store.load();
        let mut app = Self {
            running: true,
            mode: Mode::Browse,
            controller: ResultController::new(Arc::clone(&transport)),
            mutations: MutationQueue::new(Arc::clone(&transport)),
            prefs,
            search_focused: false,
            search_input: String::new(),
            status: None,
            categories: Vec::new(),
            detail: None,
            submit: None,
            transport,
            prefs_store,
            categories_rx: None,
        };
        let now = Instant::now();
        app.controller.refresh(now);
        app.fetch_categories();
        app
    }

    fn fetch_categories(&mut self) {
        let (tx, rx) = mpsc::sync_channel(1);
        let transport = Arc::clone(&self.transport);
        thread::spawn(move || {
            let _ = tx.send(transport.fetch_categories(&CancelToken::new()));
        });
        self.categories_rx = Some(rx);
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.handle_key_at(key, Instant::now());
    }

    pub fn handle_key_at(&mut self, key: KeyEvent, now: Instant) {
        if key.kind != KeyEventKind::Press {
            return;
        }
        match self.mode {
            Mode::Browse => self.handle_browse_key(key, now),
            Mode::Detail => self.handle_detail_key(key, now),
            Mode::Submit => self.handle_submit_key(key),
        }
    }

    fn handle_browse_key(&mut self, key: KeyEvent, now: Instant) {
        if self.search_focused {
            match key.code {
                KeyCode::Esc | KeyCode::Enter => self.search_focused = false,
                KeyCode::Backspace => {
                    self.search_input.pop();
                    let text = self.search_input.clone();
                    self.controller.set_query_text(text, now);
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    self.search_input.push(ch);
                    let text = self.search_input.clone();
                    self.controller.set_query_text(text, now);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('q') => self.quit(),
            KeyCode::Char('/') => {
                // Keyboard navigation must not fight with text entry.
                self.search_focused = true;
                self.controller.selection_mut().unselect();
            }
            KeyCode::Char('j') | KeyCode::Down => {
                self.controller.selection_mut().advance(1, now);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.controller.selection_mut().advance(-1, now);
            }
            KeyCode::Char('n') | KeyCode::Right => self.controller.next_page(now),
            KeyCode::Char('p') | KeyCode::Left => self.controller.prev_page(now),
            KeyCode::Char('r') => self.controller.refresh(now),
            KeyCode::Char('s') => {
                self.submit = Some(SubmitView::new());
                self.mode = Mode::Submit;
            }
            KeyCode::Enter | KeyCode::Char('o') => {
                if let Some(plugin) = self.controller.selected_plugin() {
                    let slug = plugin.slug.clone();
                    self.open_detail(slug);
                }
            }
            KeyCode::Esc => {
                self.controller.selection_mut().unselect();
            }
            _ => {}
        }
    }

    fn handle_detail_key(&mut self, key: KeyEvent, now: Instant) {
        let Some(view) = self.detail.as_mut() else {
            self.mode = Mode::Browse;
            return;
        };

        if let Some(buffer) = view.editing_tags.as_mut() {
            match key.code {
                KeyCode::Esc => view.editing_tags = None,
                KeyCode::Enter => {
                    let raw = view.editing_tags.take().unwrap_or_default();
                    self.commit_tags(&raw);
                }
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                    buffer.push(ch);
                }
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Esc | KeyCode::Char('q') => self.close_detail(),
            KeyCode::Char('j') | KeyCode::Down => {
                view.scroll = view.scroll.saturating_add(1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                view.scroll = view.scroll.saturating_sub(1);
            }
            KeyCode::Char('t') => {
                let current = view
                    .detail
                    .as_ref()
                    .map(|d| d.tags.join(", "))
                    .unwrap_or_default();
                view.editing_tags = Some(current);
            }
            KeyCode::Char('c') => self.cycle_category(),
            KeyCode::Char(ch) if ch.is_ascii_digit() => {
                if let Some(tab) = InstallTab::from_position(ch as u8 - b'0') {
                    self.set_install_tab(tab);
                }
            }
            KeyCode::Char('n') => {
                self.close_detail();
                self.controller.selection_mut().advance(1, now);
                if let Some(plugin) = self.controller.selected_plugin() {
                    let slug = plugin.slug.clone();
                    self.open_detail(slug);
                }
            }
            KeyCode::Char('p') => {
                self.close_detail();
                self.controller.selection_mut().advance(-1, now);
                if let Some(plugin) = self.controller.selected_plugin() {
                    let slug = plugin.slug.clone();
                    self.open_detail(slug);
                }
            }
            _ => {}
        }
    }

    fn handle_submit_key(&mut self, key: KeyEvent) {
        let Some(view) = self.submit.as_mut() else {
            self.mode = Mode::Browse;
            return;
        };
        match key.code {
            KeyCode::Esc => {
                self.submit = None;
                self.mode = Mode::Browse;
            }
            KeyCode::Tab | KeyCode::Down => view.focus = view.focus.next(),
            KeyCode::BackTab | KeyCode::Up => view.focus = view.focus.prev(),
            KeyCode::Backspace => {
                view.field_mut().pop();
            }
            KeyCode::Enter => self.send_submission(),
            KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                view.field_mut().push(ch);
            }
            _ => {}
        }
    }

    /// Open the detail screen for `slug` and start its fetch. Marks the
    /// plugin as visited.
    pub fn open_detail(&mut self, slug: String) {
        if self.prefs.mark_visited(&slug) {
            self.save_prefs();
        }
        let cancel = CancelToken::new();
        let (tx, rx) = mpsc::sync_channel(1);
        let transport = Arc::clone(&self.transport);
        let worker_slug = slug.clone();
        let worker_cancel = cancel.clone();
        thread::spawn(move || {
            let result = transport.fetch_plugin(&worker_slug, &worker_cancel);
            if !worker_cancel.is_cancelled() {
                let _ = tx.send(result);
            }
        });
        self.detail = Some(DetailView {
            slug,
            detail: None,
            error: None,
            editing_tags: None,
            scroll: 0,
            rx: Some(rx),
            cancel,
        });
        self.mode = Mode::Detail;
    }

    fn close_detail(&mut self) {
        if let Some(view) = self.detail.take() {
            view.cancel.cancel();
        }
        self.mode = Mode::Browse;
    }

    fn set_install_tab(&mut self, tab: InstallTab) {
        if self.prefs.install_tab != tab {
            self.prefs.install_tab = tab;
            self.save_prefs();
        }
    }

    /// Parse the tag edit buffer and queue the write. The local copy is
    /// updated right away; the queue preserves issue order per plugin.
    fn commit_tags(&mut self, raw: &str) {
        let Some(view) = self.detail.as_mut() else {
            return;
        };
        let entered: Vec<String> = raw
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let tags = dedup_tags(&entered);
        if let Some(detail) = view.detail.as_mut() {
            detail.tags = tags.clone();
        }
        self.mutations
            .enqueue(view.slug.clone(), MutationPayload::Tags { tags });
        self.status = Some("tags saved".into());
    }

    /// Step the plugin's category to the next one in the list and queue the
    /// write.
    fn cycle_category(&mut self) {
        if self.categories.is_empty() {
            self.status = Some("categories not loaded yet".into());
            return;
        }
        let Some(view) = self.detail.as_mut() else {
            return;
        };
        let Some(detail) = view.detail.as_mut() else {
            return;
        };
        let at = detail
            .category
            .as_deref()
            .and_then(|current| self.categories.iter().position(|c| c.id == current));
        let next = match at {
            Some(at) => (at + 1) % self.categories.len(),
            None => 0,
        };
        let category = &self.categories[next];
        detail.category = Some(category.id.clone());
        self.mutations.enqueue(
            view.slug.clone(),
            MutationPayload::Category {
                id: category.id.clone(),
            },
        );
        self.status = Some(format!("category set to {}", category.name));
    }

    fn send_submission(&mut self) {
        let Some(view) = self.submit.as_mut() else {
            return;
        };
        if view.rx.is_some() {
            return;
        }
        let entered: Vec<String> = view
            .tags
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        let form = SubmitForm {
            name: view.name.trim().to_string(),
            github_url: view.github_url.trim().to_string(),
            tags: dedup_tags(&entered),
        };
        if let Err(err) = form.validate() {
            view.status = Some(err.to_string());
            return;
        }
        let (tx, rx) = mpsc::sync_channel(1);
        let transport = Arc::clone(&self.transport);
        thread::spawn(move || {
            let _ = tx.send(transport.submit_plugin(&form));
        });
        view.rx = Some(rx);
        view.status = Some("submitting…".into());
    }

    pub fn tick(&mut self) {
        self.tick_at(Instant::now());
    }

    /// One turn of the event loop: timers, completions, channel polling.
    pub fn tick_at(&mut self, now: Instant) {
        self.controller.tick(now);

        for outcome in self.mutations.tick() {
            match outcome.result {
                Ok(()) => debug!(slug = %outcome.slug, "plugin write applied"),
                Err(err) => {
                    self.status = Some(format!("write to {} failed: {}", outcome.slug, err));
                }
            }
        }

        if let Some(rx) = self.categories_rx.as_ref() {
            match rx.try_recv() {
                Ok(Ok(categories)) => {
                    self.categories = categories;
                    self.categories_rx = None;
                }
                Ok(Err(err)) => {
                    warn!(error = %err, "failed to load categories");
                    self.categories_rx = None;
                }
                Err(mpsc::TryRecvError::Empty) => {}
                Err(mpsc::TryRecvError::Disconnected) => self.categories_rx = None,
            }
        }

        if let Some(view) = self.detail.as_mut() {
            if let Some(rx) = view.rx.as_ref() {
                match rx.try_recv() {
                    Ok(Ok(detail)) => {
                        // A stale fetch cannot land here: opening a different
                        // plugin replaces the whole view, dropping this
                        // receiver.
                        view.detail = Some(detail);
                        view.rx = None;
                    }
                    Ok(Err(err)) => {
                        view.error = Some(err);
                        view.rx = None;
                    }
                    Err(mpsc::TryRecvError::Empty) => {}
                    Err(mpsc::TryRecvError::Disconnected) => view.rx = None,
                }
            }
        }

        if let Some(view) = self.submit.as_mut() {
            if let Some(rx) = view.rx.as_ref() {
                match rx.try_recv() {
                    Ok(Ok(outcome)) => {
                        view.rx = None;
                        view.status = Some(if outcome.status {
                            "submitted, thanks!".to_string()
                        } else {
                            outcome
                                .message
                                .unwrap_or_else(|| "submission rejected".to_string())
                        });
                    }
                    Ok(Err(err)) => {
                        view.rx = None;
                        view.status = Some(format!("submission failed: {}", err));
                    }
                    Err(mpsc::TryRecvError::Empty) => {}
                    Err(mpsc::TryRecvError::Disconnected) => view.rx = None,
                }
            }
        }
    }

    fn save_prefs(&mut self) {
        if let Err(err) = self.prefs_store.save(&self.prefs) {
            warn!(error = %err, "failed to save preferences");
        }
    }

    pub fn quit(&mut self) {
        self.save_prefs();
        self.controller.shutdown();
        if let Some(view) = self.detail.take() {
            view.cancel.cancel();
        }
        self.running = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::testing::{CallRecord, ScriptedTransport};
    use std::time::Duration;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn test_app(transport: Arc<ScriptedTransport>) -> App {
        let dir = tempfile::tempdir().unwrap();
        let store = PrefsStore::at(dir.path().join("prefs.json"));
        App::new(transport, store)
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

    #[test]
    fn typing_in_search_debounces_into_one_fetch() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut app = test_app(Arc::clone(&transport));
        let t0 = Instant::now();
        pump(&mut app, t0, |a| a.controller.page().is_some());
        let initial_calls = transport.listing_calls().len();

        app.handle_key_at(key(KeyCode::Char('/')), t0);
        assert!(app.search_focused);
        app.handle_key_at(key(KeyCode::Char('g')), t0);
        app.handle_key_at(key(KeyCode::Char('i')), t0 + Duration::from_millis(50));
        app.handle_key_at(key(KeyCode::Char('t')), t0 + Duration::from_millis(100));

        pump(&mut app, t0, |a| a.controller.query().text == "git" && !a.controller.is_loading());
        assert_eq!(transport.listing_calls().len(), initial_calls + 1);
        assert_eq!(app.controller.query().page, 1);
    }

    #[test]
    fn enter_on_selection_opens_detail_and_marks_visited() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut app = test_app(Arc::clone(&transport));
        let t0 = Instant::now();
        pump(&mut app, t0, |a| a.controller.page().is_some());

        app.handle_key_at(key(KeyCode::Char('j')), t0 + Duration::from_millis(700));
        let slug = app.controller.selected_plugin().unwrap().slug.clone();
        app.handle_key_at(key(KeyCode::Enter), t0 + Duration::from_millis(700));

        assert_eq!(app.mode, Mode::Detail);
        assert!(app.prefs.is_visited(&slug));
        pump(&mut app, t0, |a| {
            a.detail.as_ref().is_some_and(|v| v.detail.is_some())
        });
        assert!(transport
            .calls()
            .contains(&CallRecord::FetchPlugin(slug.clone())));

        app.handle_key_at(key(KeyCode::Esc), t0 + Duration::from_secs(1));
        assert_eq!(app.mode, Mode::Browse);
    }

    #[test]
    fn committing_tag_edit_queues_a_write() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut app = test_app(Arc::clone(&transport));
        let t0 = Instant::now();
        pump(&mut app, t0, |a| a.controller.page().is_some());

        app.handle_key_at(key(KeyCode::Char('j')), t0 + Duration::from_millis(700));
        let slug = app.controller.selected_plugin().unwrap().slug.clone();
        app.handle_key_at(key(KeyCode::Enter), t0 + Duration::from_millis(700));
        pump(&mut app, t0, |a| {
            a.detail.as_ref().is_some_and(|v| v.detail.is_some())
        });

        let t1 = t0 + Duration::from_secs(1);
        app.handle_key_at(key(KeyCode::Char('t')), t1);
        for ch in "git, vcs, git".chars() {
            app.handle_key_at(key(KeyCode::Char(ch)), t1);
        }
        app.handle_key_at(key(KeyCode::Enter), t1);

        pump(&mut app, t0, |a| !a.mutations.is_busy());
        let expected = CallRecord::SetTags {
            slug,
            tags: vec!["git".into(), "vcs".into()],
        };
        assert!(transport.calls().contains(&expected));
    }

    #[test]
    fn install_tab_choice_persists() {
        let transport = Arc::new(ScriptedTransport::new());
        let dir = tempfile::tempdir().unwrap();
        let prefs_path = dir.path().join("prefs.json");
        let t0 = Instant::now();

        {
            let mut app = App::new(
                Arc::clone(&transport) as Arc<dyn CatalogTransport>,
                PrefsStore::at(&prefs_path),
            );
            pump(&mut app, t0, |a| a.controller.page().is_some());
            app.handle_key_at(key(KeyCode::Char('j')), t0 + Duration::from_millis(700));
            app.handle_key_at(key(KeyCode::Enter), t0 + Duration::from_millis(700));
            app.handle_key_at(key(KeyCode::Char('3')), t0 + Duration::from_millis(700));
            assert_eq!(app.prefs.install_tab, InstallTab::VimPlug);
        }

        let reloaded = PrefsStore::at(&prefs_path).load();
        assert_eq!(reloaded.install_tab, InstallTab::VimPlug);
    }

    #[test]
    fn submit_form_validates_before_sending() {
        let transport = Arc::new(ScriptedTransport::new());
        let mut app = test_app(Arc::clone(&transport));
        let t0 = Instant::now();
        pump(&mut app, t0, |a| a.controller.page().is_some());

        app.handle_key_at(key(KeyCode::Char('s')), t0);
        assert_eq!(app.mode, Mode::Submit);
        app.handle_key_at(key(KeyCode::Enter), t0);
        assert!(app.submit.as_ref().unwrap().status.is_some());
        assert!(!transport
            .calls()
            .iter()
            .any(|c| matches!(c, CallRecord::Submit(_))));

        for ch in "fugitive".chars() {
            app.handle_key_at(key(KeyCode::Char(ch)), t0);
        }
        app.handle_key_at(key(KeyCode::Tab), t0);
        for ch in "https://github.com/tpope/vim-fugitive".chars() {
            app.handle_key_at(key(KeyCode::Char(ch)), t0);
        }
        app.handle_key_at(key(KeyCode::Enter), t0);
        pump(&mut app, t0, |a| {
            a.submit.as_ref().is_some_and(|v| !v.is_sending())
        });
        assert!(transport
            .calls()
            .iter()
            .any(|c| matches!(c, CallRecord::Submit(_))));
    }
}
