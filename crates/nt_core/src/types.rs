use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::{Error, Result};

pub type ArticleId = u64;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// Parses an article id coming from user input (command line, prompt).
pub fn parse_article_id(raw: &str) -> Result<ArticleId> {
    raw.trim()
        .parse::<ArticleId>()
        .map_err(|_| Error::InvalidInput(format!("article id '{}' is not a number", raw.trim())))
}

pub fn validate_rating(rating: u8) -> Result<u8> {
    if (MIN_RATING..=MAX_RATING).contains(&rating) {
        Ok(rating)
    } else {
        Err(Error::InvalidInput(format!(
            "rating must be between {} and {}, got {}",
            MIN_RATING, MAX_RATING, rating
        )))
    }
}

/// Treats an explicit JSON `null` like a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// The list-level view of an article, as returned by `titles` and `articles/filter`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleSummary {
    pub id: ArticleId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_been_pretreat: bool,
    #[serde(default)]
    pub rating: Option<u8>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub time_spent: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl ArticleSummary {
    pub fn new(id: ArticleId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            url: String::new(),
            has_been_pretreat: false,
            rating: None,
            time_spent: 0,
            tags: Vec::new(),
            comments: None,
            source: None,
            date: None,
        }
    }

    /// Number of filled stars, clamped to the rating scale.
    pub fn stars(&self) -> u8 {
        self.rating.unwrap_or(0).min(MAX_RATING)
    }

    pub fn has_comments(&self) -> bool {
        self.comments.as_deref().is_some_and(|c| !c.trim().is_empty())
    }
}

/// A full article, with its markdown body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleDetail {
    #[serde(flatten)]
    pub summary: ArticleSummary,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
}

impl Deref for ArticleDetail {
    type Target = ArticleSummary;

    fn deref(&self) -> &Self::Target {
        &self.summary
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    /// Newest first, the server's default.
    #[default]
    Date,
    /// Insertion order.
    Order,
}

impl SortBy {
    pub fn toggled(self) -> Self {
        match self {
            SortBy::Date => SortBy::Order,
            SortBy::Order => SortBy::Date,
        }
    }
}

impl fmt::Display for SortBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortBy::Date => write!(f, "date"),
            SortBy::Order => write!(f, "order"),
        }
    }
}

impl FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "date" => Ok(SortBy::Date),
            "order" => Ok(SortBy::Order),
            other => Err(format!("Invalid sort order: {} (expected 'date' or 'order')", other)),
        }
    }
}

/// Body of the `titles` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitlesQuery {
    pub page: usize,
    pub per_page: usize,
    pub sort_by: SortBy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaginationInfo {
    #[serde(default)]
    pub page: usize,
    #[serde(default)]
    pub per_page: usize,
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub returned: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TitlesPage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub titles: Vec<ArticleSummary>,
    #[serde(default)]
    pub pagination: PaginationInfo,
}

/// Tag / minimum-rating filter. Tags have set semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FilterState {
    pub tags: BTreeSet<String>,
    pub min_rating: u8,
}

impl FilterState {
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.min_rating == 0
    }

    /// Number of active criteria, as shown next to the filter panel title.
    pub fn active_count(&self) -> usize {
        self.tags.len() + usize::from(self.min_rating > 0)
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        if !self.tags.remove(tag) {
            self.tags.insert(tag.to_string());
        }
    }

    /// Picking the current minimum again clears it.
    pub fn set_min_rating(&mut self, rating: u8) {
        let rating = rating.min(MAX_RATING);
        self.min_rating = if rating == self.min_rating { 0 } else { rating };
    }

    pub fn clear(&mut self) {
        self.tags.clear();
        self.min_rating = 0;
    }

    pub fn matches(&self, article: &ArticleSummary) -> bool {
        let tags_ok = self.tags.is_empty() || article.tags.iter().any(|t| self.tags.contains(t));
        let rating_ok = self.min_rating == 0 || article.rating.is_some_and(|r| r >= self.min_rating);
        tags_ok && rating_ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ChatRole::User, content)
    }

    pub fn ai(content: impl Into<String>) -> Self {
        Self::new(ChatRole::Ai, content)
    }
}

/// Outcome of a chat question that reached the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatReply {
    Answered { answer: String, model_used: Option<String> },
    Failed { error: String },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCategory {
    pub main_tag: String,
    #[serde(default)]
    pub sub_tags: Vec<String>,
    #[serde(default)]
    pub has_main: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagCategories {
    #[serde(default)]
    pub categories: BTreeMap<String, TagCategory>,
    #[serde(default)]
    pub basic_tags: Vec<String>,
    #[serde(default)]
    pub other_tags: Vec<String>,
}

impl TagCategories {
    /// Every tag mentioned by the taxonomy, without duplicates, in display order.
    pub fn all_tags(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut tags = Vec::new();
        let category_tags = self.categories.values().flat_map(|c| {
            c.has_main
                .then_some(&c.main_tag)
                .into_iter()
                .chain(c.sub_tags.iter())
        });
        for tag in category_tags.chain(&self.basic_tags).chain(&self.other_tags) {
            if seen.insert(tag.clone()) {
                tags.push(tag.clone());
            }
        }
        tags
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_article_id() {
        assert_eq!(parse_article_id("42").unwrap(), 42);
        assert_eq!(parse_article_id(" 7 ").unwrap(), 7);
        assert!(matches!(parse_article_id("abc"), Err(Error::InvalidInput(_))));
        assert!(matches!(parse_article_id("-1"), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_validate_rating() {
        assert_eq!(validate_rating(1).unwrap(), 1);
        assert_eq!(validate_rating(5).unwrap(), 5);
        assert!(validate_rating(0).is_err());
        assert!(validate_rating(6).is_err());
    }

    #[test]
    fn test_summary_tolerates_nulls_and_extra_fields() {
        let summary: ArticleSummary = serde_json::from_value(json!({
            "id": 3,
            "title": "Climate summit opens",
            "url": "https://example.com/a",
            "rating": null,
            "tags": null,
            "scraped_date": "2025-06-01",
            "comments": ""
        }))
        .unwrap();

        assert_eq!(summary.id, 3);
        assert!(summary.tags.is_empty());
        assert_eq!(summary.rating, None);
        assert_eq!(summary.time_spent, 0);
        assert!(!summary.has_comments());
    }

    #[test]
    fn test_detail_flattens_summary() {
        let detail: ArticleDetail = serde_json::from_value(json!({
            "id": 9,
            "title": "Markets",
            "content": "# Heading\n\nBody",
            "rating": 4,
            "tags": ["economy"]
        }))
        .unwrap();

        assert_eq!(detail.id, 9);
        assert_eq!(detail.stars(), 4);
        assert_eq!(detail.content, "# Heading\n\nBody");
    }

    #[test]
    fn test_titles_query_body() {
        let query = TitlesQuery { page: 2, per_page: 20, sort_by: SortBy::Date, search: None };
        assert_eq!(
            serde_json::to_value(&query).unwrap(),
            json!({"page": 2, "per_page": 20, "sort_by": "date"})
        );

        let query = TitlesQuery { search: Some("ai".to_string()), sort_by: SortBy::Order, ..query };
        assert_eq!(serde_json::to_value(&query).unwrap()["search"], "ai");
        assert_eq!(serde_json::to_value(&query).unwrap()["sort_by"], "order");
    }

    #[test]
    fn test_filter_state() {
        let mut filter = FilterState::default();
        assert!(filter.is_empty());

        filter.toggle_tag("tech");
        filter.toggle_tag("ai");
        assert_eq!(filter.active_count(), 2);
        filter.toggle_tag("tech");
        assert_eq!(filter.tags.iter().cloned().collect::<Vec<_>>(), vec!["ai".to_string()]);

        filter.set_min_rating(3);
        assert_eq!(filter.min_rating, 3);
        filter.set_min_rating(3);
        assert_eq!(filter.min_rating, 0);

        filter.set_min_rating(4);
        filter.clear();
        assert!(filter.is_empty());
    }

    #[test]
    fn test_filter_matches_any_tag_and_min_rating() {
        let mut article = ArticleSummary::new(1, "Chips");
        article.tags = vec!["tech".to_string(), "economy".to_string()];
        article.rating = Some(3);

        let mut filter = FilterState::default();
        filter.toggle_tag("tech");
        filter.toggle_tag("sport");
        assert!(filter.matches(&article));

        filter.set_min_rating(4);
        assert!(!filter.matches(&article));

        article.rating = None;
        filter.clear();
        filter.set_min_rating(1);
        assert!(!filter.matches(&article));
    }

    #[test]
    fn test_chat_message_ids_are_unique() {
        let a = ChatMessage::user("hello");
        let b = ChatMessage::ai("hi");
        assert_ne!(a.id, b.id);
        assert_eq!(serde_json::to_value(&a).unwrap()["type"], "user");
    }

    #[test]
    fn test_tag_categories_all_tags() {
        let categories: TagCategories = serde_json::from_value(json!({
            "categories": {
                "tech": {"main_tag": "tech", "sub_tags": ["ai", "chips"], "has_main": true},
                "world": {"main_tag": "world", "sub_tags": ["europe"], "has_main": false}
            },
            "basic_tags": ["ai", "urgent"],
            "other_tags": ["misc"]
        }))
        .unwrap();

        assert_eq!(
            categories.all_tags(),
            vec!["tech", "ai", "chips", "europe", "urgent", "misc"]
        );
    }

    #[test]
    fn test_sort_by_from_str() {
        assert_eq!("DATE".parse::<SortBy>().unwrap(), SortBy::Date);
        assert_eq!("order".parse::<SortBy>().unwrap(), SortBy::Order);
        assert!("title".parse::<SortBy>().is_err());
        assert_eq!(SortBy::Date.toggled(), SortBy::Order);
    }
}
