pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod pagination;
pub mod reading;
pub mod search;
pub mod tags;
pub mod types;

pub use api::{ArticleApi, ChatApi};
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use types::{
    ArticleDetail, ArticleId, ArticleSummary, ChatMessage, ChatReply, ChatRole, FilterState,
    HealthStatus, PaginationInfo, SortBy, TagCategories, TagCategory, TitlesPage, TitlesQuery,
};

pub mod prelude {
    pub use crate::api::{ArticleApi, ChatApi};
    pub use crate::config::ClientConfig;
    pub use crate::pagination::{Pagination, ARTICLES_PER_PAGE};
    pub use crate::types::*;
    pub use crate::{Error, Result};
}
