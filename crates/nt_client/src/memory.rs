use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use nt_core::search::fuzzy_match;
use nt_core::tags::normalize_tag;
use nt_core::types::validate_rating;
use nt_core::{
    ArticleApi, ArticleDetail, ArticleId, ArticleSummary, ChatApi, ChatMessage, ChatReply,
    Error, FilterState, HealthStatus, PaginationInfo, Result, SortBy, TagCategories,
    TitlesPage, TitlesQuery,
};
use tokio::sync::RwLock;

/// Words of the article echoed back by the canned chat answer.
const ANSWER_WORDS: usize = 20;

#[derive(Default)]
struct MemoryStore {
    articles: Vec<ArticleDetail>,
    conversations: HashMap<ArticleId, Vec<ChatMessage>>,
    next_message_id: u64,
}

impl MemoryStore {
    fn get(&self, id: ArticleId) -> Result<&ArticleDetail> {
        self.articles
            .iter()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))
    }

    fn get_mut(&mut self, id: ArticleId) -> Result<&mut ArticleDetail> {
        self.articles
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| Error::NotFound(format!("article {}", id)))
    }

    /// Newest first, undated last, insertion order otherwise.
    fn sorted(&self, sort_by: SortBy) -> Vec<&ArticleDetail> {
        let mut articles: Vec<&ArticleDetail> = self.articles.iter().collect();
        if sort_by == SortBy::Date {
            articles.sort_by(|a, b| b.date.cmp(&a.date).then(a.id.cmp(&b.id)));
        }
        articles
    }

    fn push_message(&mut self, id: ArticleId, mut message: ChatMessage) {
        self.next_message_id += 1;
        message.id = self.next_message_id.to_string();
        self.conversations.entry(id).or_default().push(message);
    }
}

/// A backend held in memory, for offline use and tests.
///
/// Records every call so tests can assert on what was requested, and can be
/// switched offline or made to fail on one operation.
#[derive(Default)]
pub struct InMemoryApi {
    store: RwLock<MemoryStore>,
    requests: Mutex<Vec<String>>,
    offline: Mutex<bool>,
    failing: Mutex<HashSet<String>>,
}

impl InMemoryApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_articles(articles: Vec<ArticleDetail>) -> Self {
        Self {
            store: RwLock::new(MemoryStore { articles, ..MemoryStore::default() }),
            ..Self::default()
        }
    }

    /// `count` undated articles titled `Article {id}`, tagged `tags`.
    pub fn with_generated(count: usize, tags: &[&str]) -> Self {
        let articles = (1..=count as u64)
            .map(|id| {
                let mut summary = ArticleSummary::new(id, format!("Article {}", id));
                summary.tags = tags.iter().map(|t| t.to_string()).collect();
                ArticleDetail { summary, content: String::new() }
            })
            .collect();
        Self::with_articles(articles)
    }

    /// A handful of markdown articles to browse without a server.
    pub fn demo() -> Self {
        let mut articles = vec![
            sample_article(1, "Chip makers race to build smaller transistors", &["tech", "economy"]),
            sample_article(2, "Heat waves strain the European power grid", &["climate", "europe"]),
            sample_article(3, "Open models close the gap with proprietary AI", &["tech", "ai"]),
            sample_article(4, "Central banks hold rates steady", &["economy"]),
            sample_article(5, "Coastal cities plan for rising seas", &["climate"]),
            sample_article(6, "New telescope images of a distant galaxy", &["science"]),
        ];
        articles[0].summary.rating = Some(4);
        articles[0].summary.has_been_pretreat = true;
        articles[2].summary.rating = Some(5);
        articles[2].summary.has_been_pretreat = true;
        articles[2].summary.comments = Some("Worth a second read".to_string());
        articles[3].summary.rating = Some(2);
        Self::with_articles(articles)
    }

    /// Every call made so far, as `op` or `op:arg`.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of calls to one operation.
    pub fn request_count(&self, op: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.split(':').next() == Some(op))
            .count()
    }

    pub fn clear_requests(&self) {
        if let Ok(mut requests) = self.requests.lock() {
            requests.clear();
        }
    }

    pub fn set_offline(&self, offline: bool) {
        if let Ok(mut flag) = self.offline.lock() {
            *flag = offline;
        }
    }

    /// Makes every later call to `op` fail as if the server were down.
    pub fn fail_on(&self, op: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(op.to_string());
        }
    }

    pub fn recover(&self, op: &str) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.remove(op);
        }
    }

    pub async fn article_snapshot(&self, id: ArticleId) -> Option<ArticleDetail> {
        self.store.read().await.get(id).ok().cloned()
    }

    pub async fn conversation(&self, id: ArticleId) -> Vec<ChatMessage> {
        self.store.read().await.conversations.get(&id).cloned().unwrap_or_default()
    }

    fn record(&self, op: &str, arg: Option<String>) -> Result<()> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(match arg {
                Some(arg) => format!("{}:{}", op, arg),
                None => op.to_string(),
            });
        }
        let offline = self.offline.lock().map(|f| *f).unwrap_or(false);
        let failing = self.failing.lock().map(|f| f.contains(op)).unwrap_or(false);
        if offline || failing {
            return Err(Error::Unavailable(format!("{} is not reachable", op)));
        }
        Ok(())
    }
}

fn sample_article(id: ArticleId, title: &str, tags: &[&str]) -> ArticleDetail {
    let mut summary = ArticleSummary::new(id, title);
    summary.url = format!("https://news.example.com/{}", id);
    summary.source = Some("example".to_string());
    summary.date = Some(format!("2025-06-{:02}", (id % 28) + 1));
    summary.tags = tags.iter().map(|t| t.to_string()).collect();
    ArticleDetail {
        summary,
        content: format!(
            "# {}\n\nThis is the body of article {}. It has **bold** text, a [link](https://news.example.com) and a list:\n\n- first point\n- second point\n\n> A quoted line.\n",
            title, id
        ),
    }
}

fn canned_answer(article: &ArticleDetail, question: &str) -> String {
    let excerpt: Vec<&str> = article.content.split_whitespace().take(ANSWER_WORDS).collect();
    format!("About \"{}\": {}", question.trim(), excerpt.join(" "))
}

#[async_trait]
impl ArticleApi for InMemoryApi {
    fn name(&self) -> &str {
        "memory"
    }

    async fn article_count(&self) -> Result<u64> {
        self.record("length", None)?;
        Ok(self.store.read().await.articles.len() as u64)
    }

    async fn titles(&self, query: &TitlesQuery) -> Result<TitlesPage> {
        self.record("titles", Some(format!("{}", query.page)))?;
        let store = self.store.read().await;
        let search = query.search.as_deref().unwrap_or("");
        let matching: Vec<ArticleSummary> = store
            .sorted(query.sort_by)
            .into_iter()
            .filter(|a| fuzzy_match(&a.title, search))
            .map(|a| a.summary.clone())
            .collect();

        let titles = nt_core::pagination::paginate(&matching, query.page, query.per_page).to_vec();
        Ok(TitlesPage {
            pagination: PaginationInfo {
                page: query.page,
                per_page: query.per_page,
                total: matching.len(),
                returned: titles.len(),
            },
            titles,
        })
    }

    async fn article(&self, id: ArticleId) -> Result<ArticleDetail> {
        self.record("article", Some(id.to_string()))?;
        self.store.read().await.get(id).cloned()
    }

    async fn unprocessed_articles(&self) -> Result<Vec<ArticleDetail>> {
        self.record("unpretreat", None)?;
        let store = self.store.read().await;
        Ok(store.articles.iter().filter(|a| !a.has_been_pretreat).cloned().collect())
    }

    async fn set_rating(&self, id: ArticleId, rating: u8) -> Result<u8> {
        self.record("rating", Some(id.to_string()))?;
        let rating = validate_rating(rating)?;
        let mut store = self.store.write().await;
        store.get_mut(id)?.summary.rating = Some(rating);
        Ok(rating)
    }

    async fn add_reading_time(&self, id: ArticleId, seconds: u64) -> Result<()> {
        // Nothing to add, so nothing is sent.
        if seconds == 0 {
            return Ok(());
        }
        self.record("reading-time", Some(format!("{}={}", id, seconds)))?;
        let mut store = self.store.write().await;
        store.get_mut(id)?.summary.time_spent += seconds;
        Ok(())
    }

    async fn set_comments(&self, id: ArticleId, comments: &str) -> Result<String> {
        self.record("comments", Some(id.to_string()))?;
        let mut store = self.store.write().await;
        store.get_mut(id)?.summary.comments = Some(comments.to_string());
        Ok(comments.to_string())
    }

    async fn set_tags(&self, id: ArticleId, tags: &[String]) -> Result<Vec<String>> {
        self.record("tags", Some(id.to_string()))?;
        let mut kept = Vec::new();
        for tag in tags.iter().filter(|t| !t.trim().is_empty()) {
            let tag = normalize_tag(tag)?;
            if !kept.contains(&tag) {
                kept.push(tag);
            }
        }
        let mut store = self.store.write().await;
        store.get_mut(id)?.summary.tags = kept.clone();
        Ok(kept)
    }

    async fn tags(&self) -> Result<Vec<String>> {
        self.record("all-tags", None)?;
        let store = self.store.read().await;
        let tags: BTreeSet<&String> = store.articles.iter().flat_map(|a| a.tags.iter()).collect();
        Ok(tags.into_iter().cloned().collect())
    }

    async fn tag_categories(&self) -> Result<TagCategories> {
        self.record("tag-categories", None)?;
        let store = self.store.read().await;
        let tags: BTreeSet<&String> = store.articles.iter().flat_map(|a| a.tags.iter()).collect();
        Ok(TagCategories {
            other_tags: tags.into_iter().cloned().collect(),
            ..TagCategories::default()
        })
    }

    async fn filter_articles(&self, filter: &FilterState) -> Result<Vec<ArticleSummary>> {
        self.record("filter", None)?;
        let store = self.store.read().await;
        Ok(store
            .sorted(SortBy::Date)
            .into_iter()
            .filter(|a| filter.matches(a))
            .map(|a| a.summary.clone())
            .collect())
    }

    async fn health(&self) -> Result<HealthStatus> {
        self.record("health", None)?;
        Ok(HealthStatus { status: "healthy".to_string(), service: Some("memory".to_string()) })
    }
}

#[async_trait]
impl ChatApi for InMemoryApi {
    async fn chat_history(&self, id: ArticleId) -> Result<Vec<ChatMessage>> {
        self.record("chat-history", Some(id.to_string()))?;
        Ok(self.conversation(id).await)
    }

    async fn send_chat(&self, id: ArticleId, question: &str, _model: &str) -> Result<ChatReply> {
        self.record("chat", Some(id.to_string()))?;
        let mut store = self.store.write().await;
        let answer = match store.get(id) {
            Ok(article) => canned_answer(article, question),
            Err(_) => return Ok(ChatReply::Failed { error: "Article not found".to_string() }),
        };
        store.push_message(id, ChatMessage::user(question));
        store.push_message(id, ChatMessage::ai(answer.clone()));
        Ok(ChatReply::Answered { answer, model_used: Some("memory".to_string()) })
    }

    async fn clear_chat(&self, id: ArticleId) -> Result<()> {
        self.record("chat-clear", Some(id.to_string()))?;
        self.store.write().await.conversations.remove(&id);
        Ok(())
    }
}
