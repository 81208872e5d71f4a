use async_trait::async_trait;

use crate::types::{
    ArticleDetail, ArticleId, ArticleSummary, ChatMessage, ChatReply, FilterState,
    HealthStatus, TagCategories, TitlesPage, TitlesQuery,
};
use crate::Result;

/// Article listing, detail and the per-article mutations.
#[async_trait]
pub trait ArticleApi: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Total number of articles, unfiltered
    async fn article_count(&self) -> Result<u64>;

    /// One page of titles, sorted and searched by the server
    async fn titles(&self, query: &TitlesQuery) -> Result<TitlesPage>;

    /// A full article; `Error::NotFound` when the id is unknown
    async fn article(&self, id: ArticleId) -> Result<ArticleDetail>;

    /// Articles the AI pipeline has not processed yet
    async fn unprocessed_articles(&self) -> Result<Vec<ArticleDetail>>;

    /// Sets a 1-5 rating and returns the stored value
    async fn set_rating(&self, id: ArticleId, rating: u8) -> Result<u8>;

    /// Adds `seconds` to the article's reading time
    async fn add_reading_time(&self, id: ArticleId, seconds: u64) -> Result<()>;

    async fn set_comments(&self, id: ArticleId, comments: &str) -> Result<String>;

    /// Replaces the tags and returns the normalized list the server kept
    async fn set_tags(&self, id: ArticleId, tags: &[String]) -> Result<Vec<String>>;

    async fn tags(&self) -> Result<Vec<String>>;

    async fn tag_categories(&self) -> Result<TagCategories>;

    /// Every article matching the filter, unpaginated
    async fn filter_articles(&self, filter: &FilterState) -> Result<Vec<ArticleSummary>>;

    async fn health(&self) -> Result<HealthStatus>;
}

/// The per-article AI conversation.
#[async_trait]
pub trait ChatApi: Send + Sync {
    /// Stored conversation, oldest first
    async fn chat_history(&self, id: ArticleId) -> Result<Vec<ChatMessage>>;

    /// Asks a question. `Ok(ChatReply::Failed)` when the server answered with an error.
    async fn send_chat(&self, id: ArticleId, question: &str, model: &str) -> Result<ChatReply>;

    async fn clear_chat(&self, id: ArticleId) -> Result<()>;
}
