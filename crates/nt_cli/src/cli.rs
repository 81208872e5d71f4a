use std::path::PathBuf;

use clap::{Parser, Subcommand};
use nt_client::{ArticleDetailController, ArticleListController, Backend, ChatSession, DetailState, ListView};
use nt_core::reading::format_duration;
use nt_core::tags::{popular_tags, with_tag, without_tag};
use nt_core::types::{parse_article_id, validate_rating, MAX_RATING};
use nt_core::{ArticleSummary, ChatRole, ClientConfig, Error, FilterState, SortBy};
use tracing::{info, Level};

use crate::reader::markdown;

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal reader for the news backend", long_about = None)]
pub struct Cli {
    /// Base URL of the backend API
    #[arg(long, env = "NT_API_URL")]
    pub api_url: Option<String>,
    /// Available backends: http (default), memory
    #[arg(long, default_value = "http")]
    pub backend: String,
    /// Request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Extra attempts for read requests
    #[arg(long)]
    pub retries: Option<u32>,
    /// Model used by the article chat
    #[arg(long)]
    pub model: Option<String>,
    #[arg(long, default_value = "info")]
    pub log_level: Level,
    /// Write logs to this file (the reader logs nowhere otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Layers the flags over the environment defaults.
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::from_env();
        if let Some(url) = &self.api_url {
            config = config.with_api_url(url.clone());
        }
        if let Some(secs) = self.timeout {
            config.timeout = std::time::Duration::from_secs(secs);
        }
        if let Some(retries) = self.retries {
            config.retries = retries;
        }
        if let Some(model) = &self.model {
            config.chat_model = model.clone();
        }
        config.log_level = self.log_level;
        config
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Interactive reader (default)
    Tui,
    /// One page of articles
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// date or order
        #[arg(long, default_value = "date")]
        sort: SortBy,
        #[arg(long)]
        search: Option<String>,
        /// Only articles with one of these tags
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long, default_value_t = 0)]
        min_rating: u8,
    },
    /// An article rendered as text
    Show { id: String },
    Rate { id: String, rating: u8 },
    Comment { id: String, text: String },
    /// Adds tags to an article, or removes them with --remove
    Tag {
        id: String,
        tags: Vec<String>,
        #[arg(long)]
        remove: bool,
    },
    /// Every known tag
    Tags {
        #[arg(long)]
        categories: bool,
    },
    /// Articles waiting for AI processing
    Unprocessed,
    Health,
    /// Asks a question about an article, or prints the conversation
    Chat {
        id: String,
        question: Option<String>,
        #[arg(long)]
        clear: bool,
    },
}

fn article_line(article: &ArticleSummary) -> String {
    let mut line = format!(
        "{:>5}  {}{}  {}",
        article.id,
        "★".repeat(article.stars() as usize),
        "☆".repeat((MAX_RATING - article.stars()) as usize),
        article.title
    );
    if !article.tags.is_empty() {
        line.push_str(&format!("  #{}", article.tags.join(" #")));
    }
    if article.time_spent > 0 {
        line.push_str(&format!("  ({})", format_duration(article.time_spent)));
    }
    line
}

/// The printed form of one list page.
fn list_lines(view: &ListView<'_>) -> Vec<String> {
    let mut lines = vec![format!(
        "{} articles{}",
        view.total_count,
        if view.filtered { " (filtered)" } else { "" }
    )];
    lines.extend(view.articles.iter().map(|article| article_line(article)));
    if view.articles.is_empty() {
        lines.push("No articles found.".to_string());
    }
    let pagination = &view.pagination;
    lines.push(format!(
        "{} · page {}/{}",
        pagination.summary(),
        pagination.current_page,
        pagination.total_pages().max(1)
    ));
    lines
}

pub async fn execute(command: Commands, backend: &Backend, config: &ClientConfig) -> anyhow::Result<()> {
    match command {
        Commands::Tui => return crate::reader::run(backend.clone(), config.clone()).await,
        Commands::List { page, sort, search, tags, min_rating } => {
            let mut list = ArticleListController::new();
            list.set_sort(sort);
            if let Some(search) = search {
                list.set_search(search.trim());
            }
            let mut filters = FilterState::default();
            for tag in &tags {
                filters.toggle_tag(tag);
            }
            filters.set_min_rating(min_rating);
            if !filters.is_empty() {
                list.set_filters(filters);
            }
            list.set_page(page);
            list.refresh(backend.articles.as_ref()).await;

            let view = list.view();
            match view.error {
                Some(error) if view.articles.is_empty() => anyhow::bail!("failed to load articles: {}", error),
                Some(error) => eprintln!("Warning: {}", error),
                None => {}
            }
            for line in list_lines(&view) {
                println!("{}", line);
            }
        }
        Commands::Show { id } => {
            let detail = ArticleDetailController::from_raw(backend.articles.clone(), &id);
            detail.load().await;
            match detail.state() {
                DetailState::Ready(article) => {
                    println!("{}", article.title);
                    let meta: Vec<&str> = [article.source.as_deref(), article.date.as_deref(), Some(article.url.as_str())]
                        .into_iter()
                        .flatten()
                        .filter(|s| !s.is_empty())
                        .collect();
                    println!("{}", meta.join(" · "));
                    println!("{}", article_line(&article));
                    if let Some(comments) = article.comments.as_deref().filter(|c| !c.trim().is_empty()) {
                        println!("Comments: {}", comments);
                    }
                    println!();
                    println!("{}", markdown::plain_text(&markdown::render(&article.content)));
                }
                DetailState::InvalidId(raw) => {
                    return Err(Error::InvalidInput(format!("invalid article id: {}", raw)).into())
                }
                DetailState::NotFound(id) => anyhow::bail!("article {} not found", id),
                DetailState::Failed(error) => anyhow::bail!("failed to load article: {}", error),
                DetailState::Loading => {}
            }
        }
        Commands::Rate { id, rating } => {
            let id = parse_article_id(&id)?;
            let stored = backend.articles.set_rating(id, validate_rating(rating)?).await?;
            println!("Article {} rated {}", id, stored);
        }
        Commands::Comment { id, text } => {
            let id = parse_article_id(&id)?;
            let stored = backend.articles.set_comments(id, &text).await?;
            println!("Comments of article {}: {}", id, stored);
        }
        Commands::Tag { id, tags, remove } => {
            let id = parse_article_id(&id)?;
            let article = backend.articles.article(id).await?;
            let mut current = article.summary.tags;
            for tag in &tags {
                current = if remove {
                    without_tag(&current, tag.trim())
                } else {
                    with_tag(&current, tag)?.unwrap_or(current)
                };
            }
            let stored = backend.articles.set_tags(id, &current).await?;
            println!("Tags of article {}: {}", id, stored.join(", "));
        }
        Commands::Tags { categories } => {
            if categories {
                let taxonomy = backend.articles.tag_categories().await?;
                for (name, category) in &taxonomy.categories {
                    println!("{}: {}", name, category.sub_tags.join(", "));
                }
                if !taxonomy.basic_tags.is_empty() {
                    println!("basic: {}", taxonomy.basic_tags.join(", "));
                }
                if !taxonomy.other_tags.is_empty() {
                    println!("other: {}", taxonomy.other_tags.join(", "));
                }
            } else {
                let tags = backend.articles.tags().await?;
                println!("Popular: {}", popular_tags(&tags).join(", "));
                for tag in &tags {
                    println!("{}", tag);
                }
            }
        }
        Commands::Unprocessed => {
            let articles = backend.articles.unprocessed_articles().await?;
            info!("📋 {} unprocessed articles", articles.len());
            for article in &articles {
                println!("{}", article_line(article));
            }
        }
        Commands::Health => {
            let health = backend.articles.health().await?;
            println!("{} ({})", health.status, health.service.as_deref().unwrap_or(backend.name()));
        }
        Commands::Chat { id, question, clear } => {
            let id = parse_article_id(&id)?;
            let chat = ChatSession::new(backend.chat.clone(), id, config.chat_model.clone());
            if clear {
                chat.clear().await;
                println!("Conversation about article {} cleared", id);
                return Ok(());
            }
            match question {
                Some(question) => {
                    chat.send_message(&question).await;
                    if let Some(answer) = chat.messages().last().filter(|m| m.role == ChatRole::Ai) {
                        println!("{}", answer.content);
                    }
                }
                None => {
                    chat.load_history().await;
                    for message in chat.messages() {
                        let who = match message.role {
                            ChatRole::User => "You",
                            ChatRole::Ai => "AI",
                        };
                        println!("{}: {}\n", who, message.content);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nt_client::InMemoryApi;

    fn memory_backend() -> Backend {
        Backend::new(InMemoryApi::demo())
    }

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::parse_from([
            "nt", "--api-url", "http://news.local/api", "--timeout", "3", "--model", "llama", "list", "--tag",
            "ai", "--tag", "tech", "--sort", "order",
        ]);
        let config = cli.client_config();
        assert_eq!(config.api_url, "http://news.local/api");
        assert_eq!(config.timeout, std::time::Duration::from_secs(3));
        assert_eq!(config.chat_model, "llama");
        match cli.command {
            Some(Commands::List { tags, sort, page, .. }) => {
                assert_eq!(tags, vec!["ai", "tech"]);
                assert_eq!(sort, SortBy::Order);
                assert_eq!(page, 1);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_no_subcommand_means_reader() {
        let cli = Cli::parse_from(["nt"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.backend, "http");
        assert_eq!(cli.log_level, Level::INFO);
    }

    #[test]
    fn test_article_line() {
        let mut article = ArticleSummary::new(12, "Budget vote");
        article.rating = Some(2);
        article.tags = vec!["economy".to_string()];
        article.time_spent = 75;
        assert_eq!(article_line(&article), "   12  ★★☆☆☆  Budget vote  #economy  (1m 15s)");
    }

    #[tokio::test]
    async fn test_list_survives_count_failure() {
        let api = std::sync::Arc::new(InMemoryApi::demo());
        api.fail_on("length");
        let backend = Backend { articles: api.clone(), chat: api.clone() };
        let config = ClientConfig::default();

        let list = Commands::List { page: 1, sort: SortBy::Date, search: None, tags: vec![], min_rating: 0 };
        execute(list, &backend, &config).await.unwrap();

        let mut controller = ArticleListController::new();
        controller.refresh(api.as_ref()).await;
        let view = controller.view();
        assert!(view.error.is_some());
        let lines = list_lines(&view);
        assert_eq!(lines[0], "0 articles");
        assert!(lines[1].contains("New telescope images of a distant galaxy"));
        assert_eq!(lines.len(), 8);

        api.fail_on("titles");
        let list = Commands::List { page: 1, sort: SortBy::Date, search: None, tags: vec![], min_rating: 0 };
        let err = execute(list, &backend, &config).await.unwrap_err();
        assert!(err.to_string().starts_with("failed to load articles"));
    }

    #[tokio::test]
    async fn test_invalid_id_is_input_error() {
        let backend = memory_backend();
        let config = ClientConfig::default();
        let err = execute(Commands::Show { id: "abc".to_string() }, &backend, &config).await.unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::InvalidInput(_))));

        let err = execute(Commands::Show { id: "404".to_string() }, &backend, &config).await.unwrap_err();
        assert_eq!(err.to_string(), "article 404 not found");
    }

    #[tokio::test]
    async fn test_tag_and_rate_commands() {
        let api = std::sync::Arc::new(InMemoryApi::demo());
        let backend = Backend { articles: api.clone(), chat: api.clone() };
        let config = ClientConfig::default();

        let add = Commands::Tag { id: "5".to_string(), tags: vec!["Oceans".to_string()], remove: false };
        execute(add, &backend, &config).await.unwrap();
        assert_eq!(api.article_snapshot(5).await.unwrap().tags, vec!["climate", "oceans"]);

        let remove = Commands::Tag { id: "5".to_string(), tags: vec!["climate".to_string()], remove: true };
        execute(remove, &backend, &config).await.unwrap();
        assert_eq!(api.article_snapshot(5).await.unwrap().tags, vec!["oceans"]);

        let rate = Commands::Rate { id: "5".to_string(), rating: 9 };
        assert!(execute(rate, &backend, &config).await.is_err());
        assert_eq!(api.request_count("rating"), 0);
    }
}
