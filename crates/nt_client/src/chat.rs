use std::sync::{Arc, Mutex, PoisonError};

use nt_core::logging::Logger;
use nt_core::{ArticleId, ChatApi, ChatMessage, ChatReply};

/// Shown as the assistant's answer when the chat service cannot be reached.
pub const CONNECTION_ERROR: &str = "Connection error with the AI service";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatStatus {
    Idle,
    LoadingHistory,
    Sending,
    /// A question was sent while the history was still loading.
    LoadingHistoryAndSending,
}

#[derive(Debug, Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    is_loading: bool,
    is_loading_history: bool,
}

/// Clears one of the loading flags when the request future completes or is dropped.
struct FlagGuard<'a> {
    state: &'a Mutex<ChatState>,
    flag: fn(&mut ChatState) -> &mut bool,
}

fn sending(state: &mut ChatState) -> &mut bool {
    &mut state.is_loading
}

fn loading_history(state: &mut ChatState) -> &mut bool {
    &mut state.is_loading_history
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *(self.flag)(&mut *state) = false;
    }
}

/// The AI conversation about one article.
///
/// Clones share the same transcript, so the reader view and the chat panel
/// stay in sync.
#[derive(Clone)]
pub struct ChatSession {
    api: Arc<dyn ChatApi>,
    article_id: ArticleId,
    model: String,
    state: Arc<Mutex<ChatState>>,
    logger: Logger,
}

impl ChatSession {
    pub fn new(api: Arc<dyn ChatApi>, article_id: ArticleId, model: impl Into<String>) -> Self {
        Self {
            api,
            article_id,
            model: model.into(),
            state: Arc::new(Mutex::new(ChatState::default())),
            logger: Logger::new().with_prefix("💬").with_prefix(format!("article {}", article_id)),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn article_id(&self) -> ArticleId {
        self.article_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut ChatState) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut *state)
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.with_state(|s| s.messages.clone())
    }

    pub fn len(&self) -> usize {
        self.with_state(|s| s.messages.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_loading(&self) -> bool {
        self.with_state(|s| s.is_loading)
    }

    pub fn is_loading_history(&self) -> bool {
        self.with_state(|s| s.is_loading_history)
    }

    pub fn status(&self) -> ChatStatus {
        self.with_state(|s| match (s.is_loading_history, s.is_loading) {
            (false, false) => ChatStatus::Idle,
            (true, false) => ChatStatus::LoadingHistory,
            (false, true) => ChatStatus::Sending,
            (true, true) => ChatStatus::LoadingHistoryAndSending,
        })
    }

    /// Loads the stored conversation once. Does nothing when messages are
    /// already present or a load is in flight.
    pub async fn load_history(&self) {
        let started = self.with_state(|s| {
            if !s.messages.is_empty() || s.is_loading_history {
                return false;
            }
            s.is_loading_history = true;
            true
        });
        if !started {
            return;
        }
        let _guard = FlagGuard { state: &self.state, flag: loading_history };

        match self.api.chat_history(self.article_id).await {
            Ok(history) => {
                self.logger.debug(&format!("loaded {} messages", history.len()));
                self.with_state(|s| {
                    // Questions asked while the history was loading stay after it.
                    let asked = std::mem::take(&mut s.messages);
                    s.messages = history;
                    s.messages.extend(asked);
                });
            }
            Err(e) => self.logger.error(&format!("failed to load chat history: {}", e)),
        }
    }

    /// Sends a question. Blank input and sends while another is in flight are ignored.
    pub async fn send_message(&self, text: &str) {
        if text.trim().is_empty() {
            return;
        }
        let started = self.with_state(|s| {
            if s.is_loading {
                return false;
            }
            s.is_loading = true;
            s.messages.push(ChatMessage::user(text));
            true
        });
        if !started {
            self.logger.debug("send ignored, a question is already in flight");
            return;
        }
        let _guard = FlagGuard { state: &self.state, flag: sending };

        let reply = match self.api.send_chat(self.article_id, text, &self.model).await {
            Ok(ChatReply::Answered { answer, model_used }) => {
                self.logger.debug(&format!(
                    "answered by {}",
                    model_used.as_deref().unwrap_or(&self.model)
                ));
                answer
            }
            Ok(ChatReply::Failed { error }) => {
                self.logger.warn(&format!("chat service error: {}", error));
                format!("Error: {}", error)
            }
            Err(e) => {
                self.logger.error(&format!("chat request failed: {}", e));
                CONNECTION_ERROR.to_string()
            }
        };
        self.with_state(|s| s.messages.push(ChatMessage::ai(reply)));
    }

    /// Deletes the stored conversation. The local transcript is emptied
    /// whatever the server says.
    pub async fn clear(&self) {
        if let Err(e) = self.api.clear_chat(self.article_id).await {
            self.logger.error(&format!("failed to clear chat history: {}", e));
        }
        self.with_state(|s| s.messages.clear());
    }
}
