use std::sync::Arc;

use nt_core::{ArticleApi, ChatApi, ClientConfig, Error, Result};
use tracing::info;

pub mod chat;
pub mod detail;
pub mod http;
pub mod list;
pub mod memory;
pub mod reading;
mod schema;

pub use chat::{ChatSession, ChatStatus, CONNECTION_ERROR};
pub use detail::{ArticleDetailController, DetailState};
pub use http::HttpNewsApi;
pub use list::{ArticleListController, ListOutcome, ListQuery, ListView};
pub use memory::InMemoryApi;
pub use reading::ReadingReporter;

pub const BACKENDS: &[&str] = &["http", "memory"];

/// Both halves of a backend, usually the same object.
#[derive(Clone)]
pub struct Backend {
    pub articles: Arc<dyn ArticleApi>,
    pub chat: Arc<dyn ChatApi>,
}

impl Backend {
    pub fn new<T: ArticleApi + ChatApi + 'static>(api: T) -> Self {
        let api = Arc::new(api);
        Self {
            articles: api.clone(),
            chat: api,
        }
    }

    pub fn name(&self) -> &str {
        self.articles.name()
    }
}

/// Builds the backend named on the command line.
pub fn create_backend(name: &str, config: &ClientConfig) -> Result<Backend> {
    let backend = match name {
        "http" => Backend::new(HttpNewsApi::new(config)?),
        "memory" => Backend::new(InMemoryApi::demo()),
        other => {
            return Err(Error::InvalidInput(format!(
                "unknown backend '{}' (available: {})",
                other,
                BACKENDS.join(", ")
            )))
        }
    };
    info!("🔌 Using {} backend", backend.name());
    Ok(backend)
}

pub mod prelude {
    pub use crate::{
        create_backend, ArticleDetailController, ArticleListController, Backend, ChatSession,
        DetailState, HttpNewsApi, InMemoryApi, ReadingReporter,
    };
    pub use nt_core::prelude::*;
}
