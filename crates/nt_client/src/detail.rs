use std::sync::{Arc, Mutex, PoisonError};

use nt_core::tags::{with_tag, without_tag};
use nt_core::types::{parse_article_id, validate_rating};
use nt_core::{ArticleApi, ArticleDetail, ArticleId, Error, Result};
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum DetailState {
    Loading,
    Ready(ArticleDetail),
    NotFound(ArticleId),
    Failed(String),
    /// The id given by the user is not a number; nothing was requested.
    InvalidId(String),
}

impl DetailState {
    pub fn article(&self) -> Option<&ArticleDetail> {
        match self {
            DetailState::Ready(article) => Some(article),
            _ => None,
        }
    }
}

/// One article on screen, with its edits. Clones share state so edits can
/// run on spawned tasks.
#[derive(Clone)]
pub struct ArticleDetailController {
    api: Arc<dyn ArticleApi>,
    id: Option<ArticleId>,
    state: Arc<Mutex<DetailState>>,
}

impl ArticleDetailController {
    pub fn new(api: Arc<dyn ArticleApi>, id: ArticleId) -> Self {
        Self {
            api,
            id: Some(id),
            state: Arc::new(Mutex::new(DetailState::Loading)),
        }
    }

    /// From user input such as a command-line argument.
    pub fn from_raw(api: Arc<dyn ArticleApi>, raw: &str) -> Self {
        match parse_article_id(raw) {
            Ok(id) => Self::new(api, id),
            Err(_) => Self {
                api,
                id: None,
                state: Arc::new(Mutex::new(DetailState::InvalidId(raw.to_string()))),
            },
        }
    }

    pub fn id(&self) -> Option<ArticleId> {
        self.id
    }

    pub fn state(&self) -> DetailState {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn article(&self) -> Option<ArticleDetail> {
        self.state().article().cloned()
    }

    fn set_state(&self, state: DetailState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    fn update(&self, f: impl FnOnce(&mut ArticleDetail)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if let DetailState::Ready(article) = &mut *state {
            f(article);
        }
    }

    fn loaded_id(&self) -> Result<ArticleId> {
        match (self.id, self.state().article()) {
            (Some(id), Some(_)) => Ok(id),
            _ => Err(Error::InvalidInput("article is not loaded".to_string())),
        }
    }

    /// Fetches the article; also the retry action. An invalid id stays invalid.
    pub async fn load(&self) {
        let Some(id) = self.id else {
            return;
        };
        self.set_state(DetailState::Loading);

        let state = match self.api.article(id).await {
            Ok(article) => DetailState::Ready(article),
            Err(Error::NotFound(_)) => DetailState::NotFound(id),
            Err(e) => {
                warn!("failed to load article {}: {}", id, e);
                DetailState::Failed(e.to_string())
            }
        };
        self.set_state(state);
    }

    pub async fn rate(&self, rating: u8) -> Result<u8> {
        let id = self.loaded_id()?;
        let rating = self.api.set_rating(id, validate_rating(rating)?).await?;
        info!("rated article {} with {} stars", id, rating);
        self.update(|article| article.summary.rating = Some(rating));
        Ok(rating)
    }

    pub async fn save_comments(&self, comments: &str) -> Result<String> {
        let id = self.loaded_id()?;
        let saved = self.api.set_comments(id, comments).await?;
        self.update(|article| article.summary.comments = Some(saved.clone()));
        Ok(saved)
    }

    /// Adds a tag after normalizing it. An already present tag is not sent.
    pub async fn add_tag(&self, raw: &str) -> Result<Vec<String>> {
        let id = self.loaded_id()?;
        let current = self.article().map(|a| a.summary.tags).unwrap_or_default();
        match with_tag(&current, raw)? {
            Some(tags) => self.save_tags(id, &tags).await,
            None => Ok(current),
        }
    }

    pub async fn remove_tag(&self, tag: &str) -> Result<Vec<String>> {
        let id = self.loaded_id()?;
        let current = self.article().map(|a| a.summary.tags).unwrap_or_default();
        if !current.iter().any(|t| t == tag) {
            return Ok(current);
        }
        self.save_tags(id, &without_tag(&current, tag)).await
    }

    async fn save_tags(&self, id: ArticleId, tags: &[String]) -> Result<Vec<String>> {
        let saved = self.api.set_tags(id, tags).await?;
        self.update(|article| article.summary.tags = saved.clone());
        Ok(saved)
    }
}
