use std::future::Future;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use nt_client::list::{execute, ListOutcome};
use nt_client::{
    ArticleDetailController, ArticleListController, Backend, ChatSession, DetailState,
    ReadingReporter,
};
use nt_core::reading::ReadingClock;
use nt_core::tags::suggestions as tag_suggestions;
use nt_core::{ArticleId, ArticleSummary, ClientConfig};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use super::input::{InputAction, TextInput};

/// Everything the event loop feeds into the app: terminal input, the redraw
/// tick, and results of spawned network work.
#[derive(Debug)]
pub enum AppEvent {
    Terminal(Event),
    Tick,
    ListLoaded(ListOutcome),
    TagsLoaded(Vec<String>),
    DetailLoaded(ArticleId),
    ArticleChanged(ArticleSummary),
    ChatChanged(ArticleId),
    Notice(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Editing {
    Search,
    AddTag,
    RemoveTag,
    Comments,
    Chat,
}

impl Editing {
    pub fn label(self) -> &'static str {
        match self {
            Editing::Search => "Search",
            Editing::AddTag => "Add tag",
            Editing::RemoveTag => "Remove tag",
            Editing::Comments => "Comments",
            Editing::Chat => "Ask",
        }
    }
}

/// Keeps the chat transcript pinned to its last line unless the reader
/// scrolled up.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChatViewport {
    offset: u16,
    detached: bool,
}

impl ChatViewport {
    pub fn scroll_to_bottom(&mut self) {
        self.detached = false;
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.detached = true;
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.offset = self.offset.saturating_add(lines);
    }

    /// First visible line for `content` lines shown in `height` rows.
    pub fn offset(&mut self, content: u16, height: u16) -> u16 {
        let bottom = content.saturating_sub(height);
        if !self.detached || self.offset >= bottom {
            self.detached = false;
            self.offset = bottom;
        }
        self.offset
    }
}

pub struct DetailPane {
    pub controller: ArticleDetailController,
    pub chat: ChatSession,
    pub reporter: Option<ReadingReporter>,
    pub chat_open: bool,
    pub scroll: u16,
    pub chat_view: ChatViewport,
}

pub struct App {
    backend: Backend,
    config: ClientConfig,
    tx: UnboundedSender<AppEvent>,
    pub list: ArticleListController,
    pub selected: usize,
    pub all_tags: Vec<String>,
    pub filter_open: bool,
    pub filter_cursor: usize,
    pub detail: Option<DetailPane>,
    pub editing: Option<(Editing, TextInput)>,
    pub notice: Option<String>,
    pub should_quit: bool,
}

impl App {
    pub fn new(backend: Backend, config: ClientConfig, tx: UnboundedSender<AppEvent>) -> Self {
        Self {
            backend,
            config,
            tx,
            list: ArticleListController::new(),
            selected: 0,
            all_tags: Vec::new(),
            filter_open: false,
            filter_cursor: 0,
            detail: None,
            editing: None,
            notice: None,
            should_quit: false,
        }
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    /// Kicks off the first list and tag loads.
    pub fn start(&mut self) {
        self.refresh_list();
        self.load_tags();
    }

    /// Takes the running reading reporter so the caller can flush it before exit.
    pub fn shutdown(&mut self) -> Option<ReadingReporter> {
        self.detail.take().and_then(|pane| pane.reporter)
    }

    pub fn handle(&mut self, event: AppEvent) {
        match event {
            AppEvent::Terminal(Event::Key(key)) if key.kind == KeyEventKind::Press => self.handle_key(key),
            AppEvent::Terminal(Event::FocusLost) => self.with_reporter(ReadingClock::pause),
            AppEvent::Terminal(Event::FocusGained) => self.with_reporter(ReadingClock::resume),
            AppEvent::Terminal(_) | AppEvent::Tick => {}
            AppEvent::ListLoaded(outcome) => {
                if self.list.apply(outcome) {
                    self.clamp_selection();
                }
            }
            AppEvent::TagsLoaded(tags) => self.all_tags = tags,
            AppEvent::DetailLoaded(id) => self.start_reading(id),
            AppEvent::ArticleChanged(article) => self.list.update_article(&article),
            AppEvent::ChatChanged(id) => {
                if let Some(pane) = self.detail.as_mut().filter(|p| p.chat.article_id() == id) {
                    pane.chat_view.scroll_to_bottom();
                }
            }
            AppEvent::Notice(message) => self.notice = Some(message),
        }
    }

    fn refresh_list(&mut self) {
        let query = self.list.query();
        if query.is_empty() {
            return;
        }
        let api = self.backend.articles.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let outcome = execute(api.as_ref(), query).await;
            let _ = tx.send(AppEvent::ListLoaded(outcome));
        });
    }

    fn load_tags(&self) {
        let api = self.backend.articles.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let tags = match api.tag_categories().await {
                Ok(categories) if !categories.all_tags().is_empty() => Ok(categories.all_tags()),
                _ => api.tags().await,
            };
            match tags {
                Ok(tags) => {
                    let _ = tx.send(AppEvent::TagsLoaded(tags));
                }
                Err(e) => warn!("failed to load tags: {}", e),
            }
        });
    }

    fn with_reporter(&self, f: fn(&mut ReadingClock)) {
        if let Some(reporter) = self.detail.as_ref().and_then(|pane| pane.reporter.as_ref()) {
            reporter.with_clock(f);
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.list.view().articles.len();
        self.selected = self.selected.min(len.saturating_sub(1));
    }

    fn move_selection(&mut self, delta: isize) {
        let len = self.list.view().articles.len();
        if len == 0 {
            return;
        }
        self.selected = self.selected.saturating_add_signed(delta).min(len - 1);
    }

    pub fn selected_id(&self) -> Option<ArticleId> {
        self.list.view().articles.get(self.selected).map(|a| a.id)
    }

    /// Tag completions for the tag being typed.
    pub fn suggestions(&self) -> Vec<String> {
        let (Some((kind, input)), Some(pane)) = (&self.editing, &self.detail) else {
            return Vec::new();
        };
        let current = pane.controller.article().map(|a| a.summary.tags).unwrap_or_default();
        let found = match kind {
            Editing::AddTag => tag_suggestions(input.value(), &self.all_tags, &current),
            Editing::RemoveTag => tag_suggestions(input.value(), &current, &[]),
            _ => Vec::new(),
        };
        found.into_iter().map(str::to_string).collect()
    }

    fn handle_key(&mut self, key: KeyEvent) {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            self.should_quit = true;
            return;
        }
        self.notice = None;

        if self.editing.is_some() {
            self.handle_editing_key(key);
        } else if self.detail.is_some() {
            self.handle_detail_key(key);
        } else if self.filter_open {
            self.handle_filter_key(key);
        } else {
            self.handle_list_key(key);
        }
    }

    fn handle_list_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
            KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
            KeyCode::Right | KeyCode::Char('n') => {
                self.list.next_page();
                self.selected = 0;
                self.refresh_list();
            }
            KeyCode::Left | KeyCode::Char('p') => {
                self.list.previous_page();
                self.selected = 0;
                self.refresh_list();
            }
            KeyCode::Char('/') => {
                self.editing = Some((Editing::Search, TextInput::new(self.list.search())));
            }
            KeyCode::Char('s') => {
                self.list.set_sort(self.list.sort_by().toggled());
                self.refresh_list();
            }
            KeyCode::Char('f') => {
                self.filter_open = true;
                self.filter_cursor = 0;
            }
            KeyCode::Char('r') => {
                self.list.reload();
                self.refresh_list();
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_id() {
                    self.open_article(id);
                }
            }
            _ => {}
        }
    }

    fn handle_filter_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc | KeyCode::Char('f') | KeyCode::Char('q') => self.filter_open = false,
            KeyCode::Down | KeyCode::Char('j') => {
                self.filter_cursor = (self.filter_cursor + 1).min(self.all_tags.len().saturating_sub(1));
            }
            KeyCode::Up | KeyCode::Char('k') => self.filter_cursor = self.filter_cursor.saturating_sub(1),
            KeyCode::Enter | KeyCode::Char(' ') => {
                if let Some(tag) = self.all_tags.get(self.filter_cursor).cloned() {
                    self.list.toggle_tag(&tag);
                    self.filters_changed();
                }
            }
            KeyCode::Char(c @ '1'..='5') => {
                self.list.set_min_rating(c as u8 - b'0');
                self.filters_changed();
            }
            KeyCode::Char('c') => {
                self.list.clear_filters();
                self.filters_changed();
            }
            _ => {}
        }
    }

    fn filters_changed(&mut self) {
        self.selected = 0;
        self.refresh_list();
    }

    fn open_article(&mut self, id: ArticleId) {
        let controller = ArticleDetailController::new(self.backend.articles.clone(), id);
        let chat = ChatSession::new(self.backend.chat.clone(), id, self.config.chat_model.clone());
        self.spawn_load(controller.clone());
        self.detail = Some(DetailPane {
            controller,
            chat,
            reporter: None,
            chat_open: false,
            scroll: 0,
            chat_view: ChatViewport::default(),
        });
    }

    fn close_article(&mut self) {
        self.editing = None;
        if let Some(reporter) = self.shutdown() {
            tokio::spawn(async move {
                let clock = reporter.shutdown().await;
                debug!("reading session closed after {}s", clock.session_seconds());
            });
        }
    }

    fn spawn_load(&self, controller: ArticleDetailController) {
        let tx = self.tx.clone();
        tokio::spawn(async move {
            controller.load().await;
            if let Some(id) = controller.id() {
                let _ = tx.send(AppEvent::DetailLoaded(id));
            }
        });
    }

    /// The reading clock starts once the article is on screen.
    fn start_reading(&mut self, id: ArticleId) {
        let api = self.backend.articles.clone();
        let Some(pane) = self.detail.as_mut() else {
            return;
        };
        if pane.controller.id() != Some(id) || pane.reporter.is_some() {
            return;
        }
        if let Some(article) = pane.controller.article() {
            let mut clock = ReadingClock::new(article.time_spent);
            clock.start();
            pane.reporter = Some(ReadingReporter::spawn(api, id, clock));
        }
    }

    /// Runs an edit on the open article, then reports its outcome.
    fn spawn_edit<F, Fut>(&self, action: F)
    where
        F: FnOnce(ArticleDetailController) -> Fut + Send + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        let Some(pane) = &self.detail else {
            return;
        };
        let detail = pane.controller.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let notice = action(detail.clone()).await;
            if let Some(article) = detail.article() {
                let _ = tx.send(AppEvent::ArticleChanged(article.summary));
            }
            let _ = tx.send(AppEvent::Notice(notice));
        });
    }

    fn spawn_chat<F, Fut>(&self, action: F)
    where
        F: FnOnce(ChatSession) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Some(pane) = &self.detail else {
            return;
        };
        let chat = pane.chat.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let id = chat.article_id();
            action(chat).await;
            let _ = tx.send(AppEvent::ChatChanged(id));
        });
    }

    fn handle_detail_key(&mut self, key: KeyEvent) {
        let Some(pane) = self.detail.as_mut() else {
            return;
        };
        match key.code {
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Backspace => self.close_article(),
            KeyCode::Down | KeyCode::Char('j') => pane.scroll = pane.scroll.saturating_add(1),
            KeyCode::Up | KeyCode::Char('k') => pane.scroll = pane.scroll.saturating_sub(1),
            KeyCode::PageDown => pane.scroll = pane.scroll.saturating_add(10),
            KeyCode::PageUp => pane.scroll = pane.scroll.saturating_sub(10),
            KeyCode::Char('[') => pane.chat_view.scroll_up(3),
            KeyCode::Char(']') => pane.chat_view.scroll_down(3),
            KeyCode::Char('r') => {
                if matches!(pane.controller.state(), DetailState::Failed(_)) {
                    let controller = pane.controller.clone();
                    self.spawn_load(controller);
                }
            }
            KeyCode::Char('t') => {
                if let Some(reporter) = &pane.reporter {
                    reporter.with_clock(ReadingClock::toggle);
                }
            }
            KeyCode::Char(c @ '1'..='5') => {
                let rating = c as u8 - b'0';
                self.spawn_edit(move |detail| async move {
                    match detail.rate(rating).await {
                        Ok(rating) => format!("Rated {} {}", rating, if rating == 1 { "star" } else { "stars" }),
                        Err(e) => format!("Rating failed: {}", e),
                    }
                });
            }
            KeyCode::Char('a') => self.editing = Some((Editing::AddTag, TextInput::default())),
            KeyCode::Char('x') => self.editing = Some((Editing::RemoveTag, TextInput::default())),
            KeyCode::Char('e') => {
                let comments = pane
                    .controller
                    .article()
                    .and_then(|a| a.summary.comments)
                    .unwrap_or_default();
                self.editing = Some((Editing::Comments, TextInput::new(comments)));
            }
            KeyCode::Char('c') => {
                pane.chat_open = !pane.chat_open;
                if pane.chat_open {
                    pane.chat_view.scroll_to_bottom();
                    self.spawn_chat(|chat| async move { chat.load_history().await });
                }
            }
            KeyCode::Char('i') | KeyCode::Enter if pane.chat_open => {
                self.editing = Some((Editing::Chat, TextInput::default()));
            }
            KeyCode::Char('C') if pane.chat_open => {
                self.spawn_chat(|chat| async move { chat.clear().await });
            }
            _ => {}
        }
    }

    fn handle_editing_key(&mut self, key: KeyEvent) {
        let completion = if key.code == KeyCode::Tab {
            self.suggestions().into_iter().next()
        } else {
            None
        };
        let Some((_, input)) = self.editing.as_mut() else {
            return;
        };
        if let Some(completion) = completion {
            *input = TextInput::new(completion);
            return;
        }

        match input.handle_key(key) {
            InputAction::Submit => {
                if let Some((kind, mut input)) = self.editing.take() {
                    self.submit(kind, input.take());
                }
            }
            InputAction::Cancel => self.editing = None,
            InputAction::Edited | InputAction::Moved | InputAction::Ignored => {}
        }
    }

    fn submit(&mut self, kind: Editing, value: String) {
        match kind {
            Editing::Search => {
                self.list.set_search(value.trim());
                self.selected = 0;
                self.refresh_list();
            }
            Editing::AddTag => self.spawn_edit(move |detail| async move {
                match detail.add_tag(&value).await {
                    Ok(tags) => format!("Tags: {}", tags.join(", ")),
                    Err(e) => format!("Could not add tag: {}", e),
                }
            }),
            Editing::RemoveTag => self.spawn_edit(move |detail| async move {
                match detail.remove_tag(value.trim()).await {
                    Ok(tags) => format!("Tags: {}", tags.join(", ")),
                    Err(e) => format!("Could not remove tag: {}", e),
                }
            }),
            Editing::Comments => self.spawn_edit(move |detail| async move {
                match detail.save_comments(&value).await {
                    Ok(_) => "Comments saved".to_string(),
                    Err(e) => format!("Could not save comments: {}", e),
                }
            }),
            Editing::Chat => {
                if let Some(pane) = self.detail.as_mut() {
                    pane.chat_view.scroll_to_bottom();
                }
                self.spawn_chat(move |chat| async move { chat.send_message(&value).await });
                self.editing = Some((Editing::Chat, TextInput::default()));
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use nt_client::InMemoryApi;
    use nt_core::reading::TimerStatus;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    pub(crate) fn test_app() -> (App, UnboundedReceiver<AppEvent>, Arc<InMemoryApi>) {
        let api = Arc::new(InMemoryApi::demo());
        let backend = Backend { articles: api.clone(), chat: api.clone() };
        let (tx, rx) = unbounded_channel();
        (App::new(backend, ClientConfig::default(), tx), rx, api)
    }

    pub(crate) async fn pump(app: &mut App, rx: &mut UnboundedReceiver<AppEvent>) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await {
            app.handle(event);
        }
    }

    pub(crate) fn press(app: &mut App, code: KeyCode) {
        app.handle(AppEvent::Terminal(Event::Key(KeyEvent::new(code, KeyModifiers::NONE))));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[tokio::test]
    async fn test_start_loads_list_and_tags() {
        let (mut app, mut rx, api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;

        assert_eq!(app.list.view().articles.len(), 6);
        assert_eq!(app.list.view().total_count, 6);
        assert!(app.all_tags.contains(&"climate".to_string()));
        assert_eq!(api.request_count("tag-categories"), 1);
    }

    #[tokio::test]
    async fn test_filter_panel_switches_to_filtered_mode() {
        let (mut app, mut rx, api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;

        press(&mut app, KeyCode::Char('f'));
        assert!(app.filter_open);
        let tag_index = app.all_tags.iter().position(|t| t == "tech").unwrap();
        for _ in 0..tag_index {
            press(&mut app, KeyCode::Down);
        }
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        let view = app.list.view();
        assert!(view.filtered);
        assert_eq!(view.articles.len(), 2);
        assert_eq!(api.request_count("filter"), 1);

        press(&mut app, KeyCode::Char('c'));
        pump(&mut app, &mut rx).await;
        assert!(!app.list.view().filtered);
    }

    #[tokio::test]
    async fn test_search_applies_on_enter() {
        let (mut app, mut rx, _api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;

        press(&mut app, KeyCode::Char('/'));
        type_text(&mut app, "telescope");
        assert_eq!(app.list.search(), "");
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        assert!(app.editing.is_none());
        let view = app.list.view();
        assert_eq!(view.articles.len(), 1);
        assert_eq!(view.articles[0].id, 6);
    }

    #[tokio::test]
    async fn test_detail_rating_timer_and_focus() {
        let (mut app, mut rx, api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;

        let id = app.selected_id().unwrap();
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        let pane = app.detail.as_ref().unwrap();
        assert!(pane.controller.article().is_some());
        let reporter = pane.reporter.as_ref().unwrap();
        assert_eq!(reporter.clock().status(), TimerStatus::Running);

        app.handle(AppEvent::Terminal(Event::FocusLost));
        let reporter = app.detail.as_ref().unwrap().reporter.as_ref().unwrap();
        assert_eq!(reporter.clock().status(), TimerStatus::Paused);
        app.handle(AppEvent::Terminal(Event::FocusGained));

        press(&mut app, KeyCode::Char('3'));
        pump(&mut app, &mut rx).await;
        assert_eq!(api.article_snapshot(id).await.unwrap().rating, Some(3));
        assert_eq!(app.notice.as_deref(), Some("Rated 3 stars"));
        assert!(app.list.view().articles.iter().any(|a| a.id == id && a.rating == Some(3)));

        press(&mut app, KeyCode::Esc);
        assert!(app.detail.is_none());
    }

    #[tokio::test]
    async fn test_tag_completion_and_add() {
        let (mut app, mut rx, api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;
        let id = app.detail.as_ref().unwrap().controller.id().unwrap();

        press(&mut app, KeyCode::Char('a'));
        type_text(&mut app, "clim");
        assert_eq!(app.suggestions(), vec!["climate".to_string()]);
        press(&mut app, KeyCode::Tab);
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        assert!(api.article_snapshot(id).await.unwrap().tags.contains(&"climate".to_string()));
    }

    #[tokio::test]
    async fn test_chat_panel_sends_questions() {
        let (mut app, mut rx, _api) = test_app();
        app.start();
        pump(&mut app, &mut rx).await;
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        press(&mut app, KeyCode::Char('c'));
        pump(&mut app, &mut rx).await;
        press(&mut app, KeyCode::Char('i'));
        type_text(&mut app, "Summary?");
        press(&mut app, KeyCode::Enter);
        pump(&mut app, &mut rx).await;

        let chat = &app.detail.as_ref().unwrap().chat;
        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "Summary?");
        assert!(matches!(app.editing, Some((Editing::Chat, _))));

        press(&mut app, KeyCode::Esc);
        press(&mut app, KeyCode::Char('C'));
        pump(&mut app, &mut rx).await;
        assert!(app.detail.as_ref().unwrap().chat.is_empty());
    }

    #[test]
    fn test_chat_viewport_follows_bottom() {
        let mut view = ChatViewport::default();
        assert_eq!(view.offset(30, 10), 20);

        view.scroll_up(5);
        assert_eq!(view.offset(30, 10), 15);
        assert_eq!(view.offset(40, 10), 15);

        view.scroll_to_bottom();
        assert_eq!(view.offset(40, 10), 30);
        assert_eq!(view.offset(5, 10), 0);
    }
}
