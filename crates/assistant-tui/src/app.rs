use ratatui::layout::Rect;
use tokio::sync::mpsc::UnboundedSender;
use futures_util::{Stream, StreamExt};
use assistant_core::segment::code_blocks;
use assistant_core::{ChatClient, ChatMessage, Config, ContextClient, ContextItem, Conversation, StreamEvent};

use crate::clipboard::copy_to_clipboard;
use crate::tui::AppEvent;
use crate::ui::{ChatView, FrameLayout};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusPane {
    Chat,
    Context,
}

/// What the render surface asks the coordinator to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    InputChanged(String),
    SendRequested,
}

/// Progress of the in-flight chat request
#[derive(Debug)]
pub enum StreamUpdate {
    Event(StreamEvent),
    /// The request never produced a body
    Failed(String),
    /// The response body ended
    Finished,
}

pub type ContextUpdate = Result<Vec<ContextItem>, String>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub focus: FocusPane,

    // Conversation state
    pub conversation: Conversation,
    pub input_text: String,
    pub input_cursor: usize, // cursor position in input_text (chars)
    pub chat_scroll: u16,
    pub follow_bottom: bool, // stick to the newest message after each render
    pub max_chat_scroll: u16,
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Retrieved context
    pub context_items: Vec<ContextItem>,
    pub context_selected: Option<usize>,
    pub show_context_panel: bool,
    pub document_view: Option<usize>, // index into context_items shown in the modal
    pub document_scroll: u16,

    pub status: Option<String>,

    // Panel areas for mouse hit-testing (updated after render)
    pub chat_area: Option<Rect>,

    chat_client: ChatClient,
    context_client: ContextClient,
    fetch_context: bool,
    events: UnboundedSender<AppEvent>,
}

impl App {
    pub fn new(config: &Config, events: UnboundedSender<AppEvent>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            focus: FocusPane::Chat,

            conversation: Conversation::new(),
            input_text: String::new(),
            input_cursor: 0,
            chat_scroll: 0,
            follow_bottom: true,
            max_chat_scroll: 0,
            animation_frame: 0,

            context_items: Vec::new(),
            context_selected: None,
            show_context_panel: false,
            document_view: None,
            document_scroll: 0,

            status: None,
            chat_area: None,

            chat_client: ChatClient::from_config(config),
            context_client: ContextClient::from_config(config),
            fetch_context: config.fetch_context,
            events,
        }
    }

    /// Snapshot of everything the render surface needs
    pub fn view(&self) -> ChatView<'_> {
        ChatView {
            messages: self.conversation.messages(),
            input_text: &self.input_text,
            input_cursor: self.input_cursor,
            is_loading: self.conversation.is_loading(),
            waiting_for_first_token: self.conversation.waiting_for_first_token(),
            input_mode: self.input_mode,
            focus: self.focus,
            chat_scroll: self.chat_scroll,
            follow_bottom: self.follow_bottom,
            animation_frame: self.animation_frame,
            context_items: &self.context_items,
            context_selected: self.context_selected,
            show_context_panel: self.show_context_panel,
            document: self
                .document_view
                .and_then(|i| self.context_items.get(i))
                .map(|item| (item, self.document_scroll)),
            status: self.status.as_deref(),
        }
    }

    /// Store what the last render pass measured
    pub fn record_layout(&mut self, layout: FrameLayout) {
        self.chat_area = Some(layout.chat_area);
        self.max_chat_scroll = layout.max_scroll;
        self.chat_scroll = layout.scroll;
    }

    pub fn apply_intent(&mut self, intent: Intent) {
        match intent {
            Intent::InputChanged(text) => {
                if self.conversation.is_loading() {
                    return;
                }
                self.input_text = text;
                self.input_cursor = self.input_cursor.min(self.input_text.chars().count());
            }
            Intent::SendRequested => self.send(),
        }
    }

    fn send(&mut self) {
        let Some(history) = self.conversation.begin_turn(&self.input_text) else {
            return;
        };
        let question = history.last().map(|m| m.content.clone()).unwrap_or_default();

        self.input_text.clear();
        self.input_cursor = 0;
        self.follow_bottom = true;
        self.status = None;

        self.spawn_chat(history);
        if self.fetch_context {
            self.spawn_context_query(question);
        }
    }

    fn spawn_chat(&self, history: Vec<ChatMessage>) {
        let client = self.chat_client.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            match client.stream(&history).await {
                Ok(events) => forward_stream(events, &tx).await,
                Err(e) => {
                    let _ = tx.send(AppEvent::Stream(StreamUpdate::Failed(format!("{:#}", e))));
                }
            }
        });
    }

    fn spawn_context_query(&self, question: String) {
        let client = self.context_client.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = client
                .query(&question)
                .await
                .map_err(|e| format!("{:#}", e));
            let _ = tx.send(AppEvent::Context(result));
        });
    }

    pub fn check_health(&self) {
        let client = self.chat_client.clone();
        let tx = self.events.clone();

        tokio::spawn(async move {
            let result = client.health().await.map_err(|e| format!("{:#}", e));
            let _ = tx.send(AppEvent::Health(result));
        });
    }

    pub fn apply_stream_update(&mut self, update: StreamUpdate) {
        match update {
            StreamUpdate::Event(event) => self.conversation.apply(event),
            StreamUpdate::Failed(reason) => {
                self.conversation.fail(&reason);
                self.status = Some("Request failed (see log)".to_string());
            }
            StreamUpdate::Finished => self.conversation.finish(),
        }
    }

    pub fn apply_context_update(&mut self, update: ContextUpdate) {
        match update {
            Ok(items) => {
                self.context_selected = if items.is_empty() { None } else { Some(0) };
                self.document_view = None;
                self.context_items = items;
            }
            Err(e) => tracing::error!(error = %e, "Error fetching context"),
        }
    }

    pub fn apply_health(&mut self, health: Result<assistant_core::Health, String>) {
        self.status = match health {
            Ok(h) if h.model_loaded => None,
            Ok(h) => Some(format!("Chat service {}: model not loaded", h.status)),
            Err(e) => {
                tracing::warn!(error = %e, "Chat service health check failed");
                Some("Chat service unreachable".to_string())
            }
        };
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.conversation.waiting_for_first_token() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    // Chat scrolling
    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_bottom = false;
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_chat_scroll);
        self.follow_bottom = self.chat_scroll >= self.max_chat_scroll;
    }

    pub fn scroll_to_top(&mut self) {
        self.chat_scroll = 0;
        self.follow_bottom = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.chat_scroll = self.max_chat_scroll;
        self.follow_bottom = true;
    }

    pub fn clear_conversation(&mut self) {
        if self.conversation.clear() {
            self.chat_scroll = 0;
            self.follow_bottom = true;
            self.status = None;
        }
    }

    // Context panel
    pub fn toggle_context_panel(&mut self) {
        self.show_context_panel = !self.show_context_panel;
        if !self.show_context_panel {
            self.focus = FocusPane::Chat;
        }
        if self.show_context_panel && self.context_selected.is_none() && !self.context_items.is_empty() {
            self.context_selected = Some(0);
        }
    }

    pub fn context_nav_down(&mut self) {
        let len = self.context_items.len();
        if len > 0 {
            let i = self.context_selected.unwrap_or(0);
            self.context_selected = Some((i + 1).min(len - 1));
        }
    }

    pub fn context_nav_up(&mut self) {
        if !self.context_items.is_empty() {
            let i = self.context_selected.unwrap_or(0);
            self.context_selected = Some(i.saturating_sub(1));
        }
    }

    pub fn open_document(&mut self) {
        if let Some(i) = self.context_selected.filter(|&i| i < self.context_items.len()) {
            self.document_view = Some(i);
            self.document_scroll = 0;
        }
    }

    pub fn close_document(&mut self) {
        self.document_view = None;
    }

    /// Copy a code block of the newest assistant message.
    /// `index` is zero-based; `None` picks the last block.
    pub fn copy_code_block(&mut self, index: Option<usize>) {
        let Some(message) = self.conversation.last_assistant() else {
            return;
        };
        let blocks = code_blocks(&message.content);
        let block = match index {
            Some(i) => blocks.get(i),
            None => blocks.last(),
        };
        let Some(block) = block else {
            return;
        };

        match copy_to_clipboard(&block.content) {
            Ok(()) => self.status = Some(format!("Copied {} block", block.language())),
            Err(e) => tracing::error!(error = %e, "Failed to copy code block"),
        }
    }
}

/// Forward decoded events to the event loop in order. Each turn ends
/// exactly once: by the stream's own `Done`, or by `Finished` when the body
/// broke off without one.
async fn forward_stream<S>(mut events: S, tx: &UnboundedSender<AppEvent>)
where
    S: Stream<Item = StreamEvent> + Unpin,
{
    while let Some(event) = events.next().await {
        let done = event == StreamEvent::Done;
        // Receiver gone means the UI shut down; let the request drop
        if tx.send(AppEvent::Stream(StreamUpdate::Event(event))).is_err() || done {
            return;
        }
    }
    let _ = tx.send(AppEvent::Stream(StreamUpdate::Finished));
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn unreachable_config() -> Config {
        let mut config = Config::new();
        // Nothing listens on port 9 (discard) locally
        config.chat_url = "http://127.0.0.1:9".to_string();
        config.fetch_context = false;
        config
    }

    fn item(source: &str) -> ContextItem {
        ContextItem {
            text: "passage".to_string(),
            source: source.to_string(),
            similarity: 0.6,
            relevance: assistant_core::Relevance::High,
            full_document: Some("full".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_appends_two_messages_before_response() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);

        app.apply_intent(Intent::InputChanged("What is Rust?".to_string()));
        app.apply_intent(Intent::SendRequested);

        let messages = app.conversation.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], ChatMessage::user("What is Rust?"));
        assert_eq!(messages[1], ChatMessage::assistant(""));
        assert!(app.input_text.is_empty());
        assert!(app.view().is_loading);
        assert!(app.view().waiting_for_first_token);

        // The request fails; loading clears and both messages stay
        match rx.recv().await {
            Some(AppEvent::Stream(update)) => app.apply_stream_update(update),
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(!app.conversation.is_loading());
        assert_eq!(app.conversation.len(), 2);
        assert!(app.status.is_some());
    }

    async fn forwarded(events: Vec<StreamEvent>) -> Vec<StreamUpdate> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        forward_stream(futures_util::stream::iter(events), &tx).await;
        drop(tx);

        let mut updates = Vec::new();
        while let Some(event) = rx.recv().await {
            match event {
                AppEvent::Stream(update) => updates.push(update),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        updates
    }

    #[tokio::test]
    async fn test_forward_ends_turn_once() {
        let updates = forwarded(vec![StreamEvent::Delta("a".to_string()), StreamEvent::Done]).await;
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[1], StreamUpdate::Event(StreamEvent::Done)));

        // A body that broke off has no Done, so Finished closes the turn
        let updates = forwarded(vec![StreamEvent::Error("reset".to_string())]).await;
        assert_eq!(updates.len(), 2);
        assert!(matches!(updates[1], StreamUpdate::Finished));
    }

    #[tokio::test]
    async fn test_next_turn_survives_previous_stream_end() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);

        app.apply_intent(Intent::InputChanged("one".to_string()));
        app.apply_intent(Intent::SendRequested);
        let first = forwarded(vec![StreamEvent::Delta("a".to_string()), StreamEvent::Done]).await;
        let mut first = first.into_iter();

        // Deliver the first turn up to its Done, then queue a new send
        for update in first.by_ref() {
            let done = matches!(update, StreamUpdate::Event(StreamEvent::Done));
            app.apply_stream_update(update);
            if done {
                break;
            }
        }
        app.apply_intent(Intent::InputChanged("two".to_string()));
        app.apply_intent(Intent::SendRequested);

        // Whatever the first stream still had queued lands after the send
        for update in first {
            app.apply_stream_update(update);
        }
        app.apply_stream_update(StreamUpdate::Event(StreamEvent::Delta("second reply".to_string())));

        assert!(app.conversation.is_loading());
        assert_eq!(
            app.conversation.last_assistant().map(|m| m.content.as_str()),
            Some("second reply")
        );
    }

    #[tokio::test]
    async fn test_input_ignored_while_loading() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);

        app.apply_intent(Intent::InputChanged("first".to_string()));
        app.apply_intent(Intent::SendRequested);
        app.apply_intent(Intent::InputChanged("second".to_string()));
        app.apply_intent(Intent::SendRequested);

        assert!(app.input_text.is_empty());
        assert_eq!(app.conversation.len(), 2);
    }

    #[tokio::test]
    async fn test_stream_updates_fill_placeholder() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);
        app.apply_intent(Intent::InputChanged("hi".to_string()));
        app.apply_intent(Intent::SendRequested);

        for part in ["Hel", "lo"] {
            app.apply_stream_update(StreamUpdate::Event(StreamEvent::Delta(part.to_string())));
        }
        assert!(!app.conversation.waiting_for_first_token());
        app.apply_stream_update(StreamUpdate::Finished);

        assert_eq!(app.conversation.messages()[1].content, "Hello");
        assert!(!app.conversation.is_loading());
    }

    #[test]
    fn test_context_update_selects_first_item() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);

        app.apply_context_update(Ok(vec![item("a.md"), item("b.md")]));
        assert_eq!(app.context_selected, Some(0));

        app.context_nav_down();
        app.context_nav_down();
        assert_eq!(app.context_selected, Some(1));

        app.open_document();
        assert_eq!(app.view().document.map(|(i, _)| i.source.as_str()), Some("b.md"));

        // A failed refresh keeps what is shown
        app.apply_context_update(Err("docstore down".to_string()));
        assert_eq!(app.context_items.len(), 2);
    }

    #[test]
    fn test_scrolling_releases_and_regains_bottom() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut app = App::new(&unreachable_config(), tx);
        app.max_chat_scroll = 10;
        app.chat_scroll = 10;

        app.scroll_up(3);
        assert_eq!(app.chat_scroll, 7);
        assert!(!app.follow_bottom);

        app.scroll_down(5);
        assert_eq!(app.chat_scroll, 10);
        assert!(app.follow_bottom);
    }
}
