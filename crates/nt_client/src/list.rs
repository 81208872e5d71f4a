//! Reconciles the server-paginated title list with the server-filtered,
//! locally paginated one.
//!
//! Fetching is split from state so callers can run the network part on a
//! task: [`ArticleListController::query`] says what is missing,
//! [`execute`] fetches it and [`ArticleListController::apply`] folds the
//! result back in. Each part of an outcome is checked on its own: the count
//! is always kept, titles only while their query is still the current one
//! and filtered articles only while their filter is still active. A request
//! that is already on its way is not issued a second time.

use futures::join;
use nt_core::pagination::{paginate, Pagination, ARTICLES_PER_PAGE};
use nt_core::search::fuzzy_match;
use nt_core::{ArticleApi, ArticleSummary, FilterState, Result, SortBy, TitlesPage, TitlesQuery};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum ListSource {
    Titles(TitlesQuery),
    Filtered(FilterState),
}

/// What the list needs from the server right now.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub generation: u64,
    pub count: bool,
    pub source: Option<ListSource>,
}

impl ListQuery {
    pub fn is_empty(&self) -> bool {
        !self.count && self.source.is_none()
    }
}

#[derive(Debug)]
pub enum SourceOutcome {
    Titles(TitlesQuery, Result<TitlesPage>),
    Filtered(FilterState, Result<Vec<ArticleSummary>>),
}

#[derive(Debug)]
pub struct ListOutcome {
    pub generation: u64,
    pub count: Option<Result<u64>>,
    pub source: Option<SourceOutcome>,
}

/// Runs the requests of a query concurrently.
pub async fn execute(api: &dyn ArticleApi, query: ListQuery) -> ListOutcome {
    let ListQuery { generation, count, source } = query;

    let count = async move {
        if count {
            Some(api.article_count().await)
        } else {
            None
        }
    };
    let source = async move {
        match source {
            Some(ListSource::Titles(query)) => {
                let page = api.titles(&query).await;
                Some(SourceOutcome::Titles(query, page))
            }
            Some(ListSource::Filtered(filter)) => {
                let articles = api.filter_articles(&filter).await;
                Some(SourceOutcome::Filtered(filter, articles))
            }
            None => None,
        }
    };

    let (count, source) = join!(count, source);
    ListOutcome { generation, count, source }
}

/// What a list screen renders.
#[derive(Debug, Clone)]
pub struct ListView<'a> {
    pub articles: Vec<&'a ArticleSummary>,
    /// Items in the active mode, drives pagination.
    pub total: usize,
    /// Unfiltered article count for the header, 0 until known.
    pub total_count: u64,
    pub pagination: Pagination,
    pub filtered: bool,
    pub loading: bool,
    pub error: Option<&'a str>,
}

#[derive(Debug)]
pub struct ArticleListController {
    page: usize,
    search: String,
    sort_by: SortBy,
    filters: FilterState,

    total_count: Option<u64>,
    count_stale: bool,
    titles: Option<TitlesPage>,
    titles_for: Option<TitlesQuery>,
    filtered_all: Vec<ArticleSummary>,
    filtered_for: Option<FilterState>,

    generation: u64,
    count_pending: bool,
    titles_pending: Option<TitlesQuery>,
    filter_pending: Option<FilterState>,
    error: Option<String>,
}

impl Default for ArticleListController {
    fn default() -> Self {
        Self::new()
    }
}

impl ArticleListController {
    pub fn new() -> Self {
        Self {
            page: 1,
            search: String::new(),
            sort_by: SortBy::default(),
            filters: FilterState::default(),
            total_count: None,
            count_stale: true,
            titles: None,
            titles_for: None,
            filtered_all: Vec::new(),
            filtered_for: None,
            generation: 0,
            count_pending: false,
            titles_pending: None,
            filter_pending: None,
            error: None,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn sort_by(&self) -> SortBy {
        self.sort_by
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn show_filtered(&self) -> bool {
        !self.filters.tags.is_empty() || self.filters.min_rating > 0
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn touch(&mut self) {
        self.generation += 1;
    }

    fn titles_query(&self) -> TitlesQuery {
        let search = self.search.trim();
        TitlesQuery {
            page: self.page,
            per_page: ARTICLES_PER_PAGE,
            sort_by: self.sort_by,
            search: (!search.is_empty()).then(|| search.to_string()),
        }
    }

    fn in_flight(&self) -> bool {
        self.count_pending || self.titles_pending.is_some() || self.filter_pending.is_some()
    }

    /// The requests still needed for the current state, leaving out those
    /// already in flight. Marks them as pending.
    pub fn query(&mut self) -> ListQuery {
        let source = if self.show_filtered() {
            let needed = self.filtered_for.as_ref() != Some(&self.filters)
                && self.filter_pending.as_ref() != Some(&self.filters);
            needed.then(|| {
                self.filter_pending = Some(self.filters.clone());
                ListSource::Filtered(self.filters.clone())
            })
        } else {
            let query = self.titles_query();
            let needed =
                self.titles_for.as_ref() != Some(&query) && self.titles_pending.as_ref() != Some(&query);
            needed.then(|| {
                self.titles_pending = Some(query.clone());
                ListSource::Titles(query)
            })
        };

        let count = self.count_stale && !self.count_pending;
        self.count_pending |= count;
        ListQuery {
            generation: self.generation,
            count,
            source,
        }
    }

    /// Folds fetched data back in. Returns false when nothing in the outcome
    /// still matches the current state.
    pub fn apply(&mut self, outcome: ListOutcome) -> bool {
        let ListOutcome { generation, count, source } = outcome;

        let source = match source {
            Some(SourceOutcome::Titles(query, result)) => {
                if self.titles_pending.as_ref() == Some(&query) {
                    self.titles_pending = None;
                }
                let current = query == self.titles_query();
                current.then_some(SourceOutcome::Titles(query, result))
            }
            Some(SourceOutcome::Filtered(filter, result)) => {
                if self.filter_pending.as_ref() == Some(&filter) {
                    self.filter_pending = None;
                }
                let current = filter == self.filters;
                current.then_some(SourceOutcome::Filtered(filter, result))
            }
            None => None,
        };

        if count.is_none() && source.is_none() {
            debug!(
                "dropping list outcome of generation {} (now {})",
                generation, self.generation
            );
            return false;
        }
        self.error = None;

        if let Some(count) = count {
            self.count_stale = false;
            self.count_pending = false;
            match count {
                Ok(count) => self.total_count = Some(count),
                Err(e) => self.fail("article count", e),
            }
        }

        match source {
            Some(SourceOutcome::Titles(query, Ok(page))) => {
                self.titles = Some(page);
                self.titles_for = Some(query);
            }
            Some(SourceOutcome::Titles(_, Err(e))) => self.fail("titles", e),
            Some(SourceOutcome::Filtered(filter, Ok(articles))) => {
                self.filtered_all = articles;
                self.filtered_for = Some(filter);
            }
            Some(SourceOutcome::Filtered(_, Err(e))) => self.fail("filtered articles", e),
            None => {}
        }
        true
    }

    fn fail(&mut self, what: &str, error: nt_core::Error) {
        warn!("failed to load {}: {}", what, error);
        self.error = Some(format!("Failed to load {}: {}", what, error));
    }

    /// Fetches whatever the current state is missing.
    pub async fn refresh(&mut self, api: &dyn ArticleApi) {
        let query = self.query();
        if query.is_empty() {
            return;
        }
        let outcome = execute(api, query).await;
        self.apply(outcome);
    }

    pub fn set_page(&mut self, page: usize) {
        let page = page.max(1);
        if page != self.page {
            self.page = page;
            self.touch();
        }
    }

    pub fn next_page(&mut self) {
        if self.view().pagination.has_next() {
            self.set_page(self.page + 1);
        }
    }

    pub fn previous_page(&mut self) {
        if self.page > 1 {
            self.set_page(self.page - 1);
        }
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        let search = search.into();
        if search != self.search {
            self.search = search;
            self.page = 1;
            self.touch();
        }
    }

    /// Keeps the current page.
    pub fn set_sort(&mut self, sort_by: SortBy) {
        if sort_by != self.sort_by {
            self.sort_by = sort_by;
            self.touch();
        }
    }

    pub fn set_filters(&mut self, filters: FilterState) {
        self.filters = filters;
        self.page = 1;
        self.touch();
    }

    pub fn toggle_tag(&mut self, tag: &str) {
        let mut filters = self.filters.clone();
        filters.toggle_tag(tag);
        self.set_filters(filters);
    }

    pub fn set_min_rating(&mut self, rating: u8) {
        let mut filters = self.filters.clone();
        filters.set_min_rating(rating);
        self.set_filters(filters);
    }

    pub fn clear_filters(&mut self) {
        self.set_filters(FilterState::default());
    }

    /// Forgets everything fetched, including the count.
    pub fn reload(&mut self) {
        self.count_stale = true;
        self.count_pending = false;
        self.titles_for = None;
        self.titles_pending = None;
        self.filtered_for = None;
        self.filter_pending = None;
        self.error = None;
        self.touch();
    }

    /// Replaces one article in the cached lists, after a rating or tag edit.
    pub fn update_article(&mut self, article: &ArticleSummary) {
        let cached = self
            .titles
            .iter_mut()
            .flat_map(|page| page.titles.iter_mut())
            .chain(self.filtered_all.iter_mut());
        for entry in cached.filter(|a| a.id == article.id) {
            *entry = article.clone();
        }
    }

    pub fn view(&self) -> ListView<'_> {
        let (articles, total) = if self.show_filtered() {
            let cached: &[ArticleSummary] = if self.filtered_for.as_ref() == Some(&self.filters) {
                &self.filtered_all
            } else {
                &[]
            };
            let matching: Vec<&ArticleSummary> = cached
                .iter()
                .filter(|a| fuzzy_match(&a.title, &self.search))
                .collect();
            let total = matching.len();
            (paginate(&matching, self.page, ARTICLES_PER_PAGE).to_vec(), total)
        } else {
            match &self.titles {
                Some(page) => (page.titles.iter().collect(), page.pagination.total),
                None => (Vec::new(), 0),
            }
        };

        ListView {
            articles,
            total,
            total_count: self.total_count.unwrap_or(0),
            pagination: Pagination::new(self.page, total, ARTICLES_PER_PAGE),
            filtered: self.show_filtered(),
            loading: self.in_flight(),
            error: self.error.as_deref(),
        }
    }
}
