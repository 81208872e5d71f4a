use nt_client::{DetailState, ListView};
use nt_core::pagination::{PageItem, Pagination};
use nt_core::reading::{format_duration, ReadingClock, TimerStatus};
use nt_core::tags::popular_tags;
use nt_core::types::MAX_RATING;
use nt_core::{ArticleDetail, ArticleSummary, ChatRole};
use tui::backend::Backend;
use tui::layout::{Constraint, Direction, Layout, Rect};
use tui::style::{Color, Modifier, Style};
use tui::text::{Span, Spans};
use tui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use tui::Frame;

use super::app::{App, DetailPane, Editing};
use super::markdown;

const LIST_HELP: &str = "↑↓ select  ⏎ open  ←→ page  / search  s sort  f filters  r reload  q quit";
const DETAIL_HELP: &str = "esc back  1-5 rate  t timer  a/x tag  e comments  c chat  ↑↓ scroll";
const CHAT_HELP: &str = "i ask  C clear  [ ] scroll";

pub fn draw<B: Backend>(frame: &mut Frame<B>, app: &mut App) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1), Constraint::Length(1)])
        .split(area);

    if app.detail.is_some() {
        draw_detail(frame, app, chunks[0]);
    } else {
        draw_list(frame, app, chunks[0]);
        if app.filter_open {
            draw_filters(frame, app, area);
        }
    }
    draw_input(frame, app, chunks[1]);
    draw_status(frame, app, chunks[2]);
}

fn stars(article: &ArticleSummary) -> String {
    let filled = article.stars() as usize;
    format!("{}{}", "★".repeat(filled), "☆".repeat(MAX_RATING as usize - filled))
}

fn article_item(article: &ArticleSummary) -> ListItem<'static> {
    let marker = if article.has_been_pretreat { "✓ " } else { "· " };
    let title = Spans::from(vec![
        Span::styled(marker, Style::default().fg(Color::Green)),
        Span::styled(article.title.clone(), Style::default().add_modifier(Modifier::BOLD)),
    ]);

    let mut meta = vec![
        Span::raw("  "),
        Span::styled(stars(article), Style::default().fg(Color::Yellow)),
    ];
    if let Some(date) = &article.date {
        meta.push(Span::styled(format!("  {}", date), Style::default().fg(Color::DarkGray)));
    }
    if article.time_spent > 0 {
        meta.push(Span::raw(format!("  ⏱ {}", format_duration(article.time_spent))));
    }
    if !article.tags.is_empty() {
        meta.push(Span::styled(
            format!("  #{}", article.tags.join(" #")),
            Style::default().fg(Color::Cyan),
        ));
    }
    if article.has_comments() {
        meta.push(Span::raw("  💬"));
    }
    ListItem::new(vec![title, Spans::from(meta)])
}

fn pagination_bar(pagination: &Pagination) -> Spans<'static> {
    let dim = Style::default().fg(Color::DarkGray);
    let nav = |enabled: bool, label: &'static str| {
        Span::styled(label, if enabled { Style::default() } else { dim })
    };

    let mut spans = vec![nav(pagination.has_previous(), "‹ Prev "), Span::raw(" ")];
    for item in pagination.page_items() {
        match item {
            PageItem::Page(n) if n == pagination.current_page => spans.push(Span::styled(
                format!("[{}] ", n),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )),
            PageItem::Page(n) => spans.push(Span::raw(format!("{} ", n))),
            PageItem::Gap => spans.push(Span::styled("… ", dim)),
        }
    }
    spans.push(Span::raw(" "));
    spans.push(nav(pagination.has_next(), "Next ›"));
    spans.push(Span::styled(format!("   {}", pagination.summary()), dim));
    Spans::from(spans)
}

fn list_header(app: &App, view: &ListView<'_>) -> Vec<Spans<'static>> {
    let mut title = vec![
        Span::styled("📰 News", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(format!("  {} articles", view.total_count)),
        Span::styled(
            format!("  sort: {}  backend: {}", app.list.sort_by(), app.backend_name()),
            Style::default().fg(Color::DarkGray),
        ),
    ];
    if view.loading {
        title.push(Span::styled("  loading…", Style::default().fg(Color::Yellow)));
    }

    let mut lines = vec![Spans::from(title)];
    if let Some(error) = view.error.filter(|_| !view.articles.is_empty()) {
        lines.push(Spans::from(Span::styled(
            format!("⚠ {}  (press r to retry)", error),
            Style::default().fg(Color::Red),
        )));
    }
    if !app.list.search().is_empty() {
        lines.push(Spans::from(format!("🔍 \"{}\"", app.list.search())));
    }
    let filters = app.list.filters();
    if !filters.is_empty() {
        let mut parts: Vec<String> = filters.tags.iter().map(|t| format!("#{}", t)).collect();
        if filters.min_rating > 0 {
            parts.push(format!("≥ {}★", filters.min_rating));
        }
        lines.push(Spans::from(Span::styled(
            format!("Filters ({}): {}", filters.active_count(), parts.join(" ")),
            Style::default().fg(Color::Magenta),
        )));
    }
    lines
}

fn draw_list<B: Backend>(frame: &mut Frame<B>, app: &App, area: Rect) {
    let view = app.list.view();
    let header = list_header(app, &view);
    let footer_height = if view.pagination.is_needed() { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(header.len() as u16),
            Constraint::Min(1),
            Constraint::Length(footer_height),
        ])
        .split(area);

    frame.render_widget(Paragraph::new(header), chunks[0]);

    let block = Block::default().borders(Borders::ALL);
    if let Some(error) = view.error.filter(|_| view.articles.is_empty()) {
        let message = vec![
            Spans::from(Span::styled(
                format!("Failed to load articles: {}", error),
                Style::default().fg(Color::Red),
            )),
            Spans::from("Press r to retry."),
        ];
        frame.render_widget(Paragraph::new(message).block(block).wrap(Wrap { trim: true }), chunks[1]);
    } else if view.articles.is_empty() {
        let message = if view.loading { "Loading articles…" } else { "No articles found." };
        frame.render_widget(Paragraph::new(message).block(block), chunks[1]);
    } else {
        let items: Vec<ListItem> = view.articles.iter().map(|a| article_item(a)).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol("▌");
        let mut state = ListState::default();
        state.select(Some(app.selected));
        frame.render_stateful_widget(list, chunks[1], &mut state);
    }

    if view.pagination.is_needed() {
        frame.render_widget(Paragraph::new(pagination_bar(&view.pagination)), chunks[2]);
    }
}

/// A rectangle of `percent_x` by `percent_y` centered in `area`.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}

fn draw_filters<B: Backend>(frame: &mut Frame<B>, app: &App, area: Rect) {
    let area = centered_rect(60, 70, area);
    frame.render_widget(Clear, area);

    let filters = app.list.filters();
    let rating = if filters.min_rating > 0 {
        format!("Minimum rating: {}★", filters.min_rating)
    } else {
        "Minimum rating: any".to_string()
    };
    let mut lines = vec![
        Spans::from(Span::styled(rating, Style::default().fg(Color::Yellow))),
        Spans::from(Span::styled(
            format!("Popular: {}", popular_tags(&app.all_tags).join(", ")),
            Style::default().fg(Color::DarkGray),
        )),
        Spans::default(),
    ];
    if app.all_tags.is_empty() {
        lines.push(Spans::from("No tags yet."));
    }
    for (i, tag) in app.all_tags.iter().enumerate() {
        let checked = if filters.tags.contains(tag) { "[x]" } else { "[ ]" };
        let style = if i == app.filter_cursor {
            Style::default().bg(Color::DarkGray)
        } else {
            Style::default()
        };
        lines.push(Spans::from(Span::styled(format!("{} {}", checked, tag), style)));
    }

    let visible = area.height.saturating_sub(2) as usize;
    let scroll = (app.filter_cursor + 3 + 1).saturating_sub(visible) as u16;
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Filters: ⏎ toggle  1-5 rating  c clear  esc close ");
    frame.render_widget(Paragraph::new(lines).block(block).scroll((scroll, 0)), area);
}

fn detail_header(article: &ArticleDetail) -> Vec<Spans<'static>> {
    let dim = Style::default().fg(Color::DarkGray);
    let mut lines = vec![Spans::from(Span::styled(
        article.title.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];

    let mut meta = Vec::new();
    if let Some(source) = &article.source {
        meta.push(source.clone());
    }
    if let Some(date) = &article.date {
        meta.push(date.clone());
    }
    if !article.url.is_empty() {
        meta.push(article.url.clone());
    }
    if !meta.is_empty() {
        lines.push(Spans::from(Span::styled(meta.join(" · "), dim)));
    }

    let tags = if article.tags.is_empty() {
        "no tags".to_string()
    } else {
        format!("#{}", article.tags.join(" #"))
    };
    lines.push(Spans::from(vec![
        Span::styled(stars(article), Style::default().fg(Color::Yellow)),
        Span::raw("  "),
        Span::styled(tags, Style::default().fg(Color::Cyan)),
    ]));
    if let Some(comments) = article.comments.as_deref().filter(|c| !c.trim().is_empty()) {
        lines.push(Spans::from(format!("💬 {}", comments)));
    }
    lines
}

fn draw_detail<B: Backend>(frame: &mut Frame<B>, app: &mut App, area: Rect) {
    let Some(pane) = app.detail.as_mut() else {
        return;
    };
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let body = match pane.controller.state() {
        DetailState::Loading => vec![Spans::from("Loading article…")],
        DetailState::NotFound(id) => vec![Spans::from(Span::styled(
            format!("Article {} not found.", id),
            Style::default().fg(Color::Red),
        ))],
        DetailState::InvalidId(raw) => vec![Spans::from(Span::styled(
            format!("Invalid article id: {}", raw),
            Style::default().fg(Color::Red),
        ))],
        DetailState::Failed(error) => vec![
            Spans::from(Span::styled(
                format!("Failed to load article: {}", error),
                Style::default().fg(Color::Red),
            )),
            Spans::from("Press r to retry."),
        ],
        DetailState::Ready(article) => {
            let mut lines = detail_header(&article);
            lines.push(Spans::default());
            lines.extend(markdown::render(&article.content));
            lines
        }
    };
    let article = Paragraph::new(body)
        .block(Block::default().borders(Borders::ALL))
        .wrap(Wrap { trim: false })
        .scroll((pane.scroll, 0));
    frame.render_widget(article, columns[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints(if pane.chat_open {
            vec![Constraint::Length(5), Constraint::Min(3)]
        } else {
            vec![Constraint::Length(5), Constraint::Min(0)]
        })
        .split(columns[1]);
    frame.render_widget(timer_panel(pane.reporter.as_ref().map(|r| r.clock())), side[0]);
    if pane.chat_open {
        draw_chat(frame, pane, side[1]);
    }
}

fn timer_panel(clock: Option<ReadingClock>) -> Paragraph<'static> {
    let block = Block::default().borders(Borders::ALL).title(" Reading ");
    let Some(clock) = clock else {
        return Paragraph::new("Not started").block(block);
    };
    let (label, color) = match clock.status() {
        TimerStatus::Running => ("● reading", Color::Green),
        TimerStatus::Paused => ("‖ paused", Color::Yellow),
        TimerStatus::Stopped => ("■ stopped", Color::DarkGray),
    };
    Paragraph::new(vec![
        Spans::from(Span::styled(label, Style::default().fg(color))),
        Spans::from(format!("session {}", format_duration(clock.session_seconds()))),
        Spans::from(format!("total   {}", format_duration(clock.total_seconds()))),
    ])
    .block(block)
}

fn draw_chat<B: Backend>(frame: &mut Frame<B>, pane: &mut DetailPane, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Chat · {} ", pane.chat.model()));
    let inner = block.inner(area);
    let width = inner.width.max(1) as usize;

    let mut lines = Vec::new();
    if pane.chat.is_loading_history() {
        lines.push(Spans::from(Span::styled("Loading history…", Style::default().fg(Color::DarkGray))));
    }
    for message in pane.chat.messages() {
        let (who, color) = match message.role {
            ChatRole::User => ("You", Color::Cyan),
            ChatRole::Ai => ("AI", Color::Green),
        };
        lines.push(Spans::from(Span::styled(
            format!("{}:", who),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        for line in message.content.lines() {
            lines.push(Spans::from(line.to_string()));
        }
        lines.push(Spans::default());
    }
    if pane.chat.is_loading() {
        lines.push(Spans::from(Span::styled("AI is thinking…", Style::default().fg(Color::Yellow))));
    }
    if lines.is_empty() {
        lines.push(Spans::from(Span::styled(
            format!("Ask a question about this article. {}", CHAT_HELP),
            Style::default().fg(Color::DarkGray),
        )));
    }

    let wrapped: usize = lines.iter().map(|l| l.width().max(1).div_ceil(width)).sum();
    let offset = pane.chat_view.offset(wrapped.min(u16::MAX as usize) as u16, inner.height);
    let chat = Paragraph::new(lines)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((offset, 0));
    frame.render_widget(chat, area);
}

fn draw_input<B: Backend>(frame: &mut Frame<B>, app: &App, area: Rect) {
    let Some((kind, input)) = &app.editing else {
        let help = match &app.detail {
            Some(pane) if pane.chat_open => format!("{}  {}", DETAIL_HELP, CHAT_HELP),
            Some(_) => DETAIL_HELP.to_string(),
            None => LIST_HELP.to_string(),
        };
        frame.render_widget(
            Paragraph::new(Span::styled(help, Style::default().fg(Color::DarkGray))),
            area,
        );
        return;
    };

    let prompt = format!("{}: ", kind.label());
    let mut spans = vec![
        Span::styled(prompt.clone(), Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)),
        Span::raw(input.value().to_string()),
    ];
    if matches!(kind, Editing::AddTag | Editing::RemoveTag) {
        let suggestions = app.suggestions();
        if !suggestions.is_empty() {
            spans.push(Span::styled(
                format!("   tab: {}", suggestions.join(" | ")),
                Style::default().fg(Color::DarkGray),
            ));
        }
    }
    frame.render_widget(Paragraph::new(Spans::from(spans)), area);

    let cursor_x = area.x + (prompt.chars().count() + input.cursor()) as u16;
    frame.set_cursor(cursor_x.min(area.right().saturating_sub(1)), area.y);
}

fn draw_status<B: Backend>(frame: &mut Frame<B>, app: &App, area: Rect) {
    let status = match (&app.notice, &app.detail) {
        (Some(notice), _) => Span::styled(notice.clone(), Style::default().fg(Color::Yellow)),
        (None, Some(pane)) if pane.chat.is_loading() => {
            Span::styled("Waiting for the AI…", Style::default().fg(Color::DarkGray))
        }
        _ => Span::raw(""),
    };
    frame.render_widget(Paragraph::new(status), area);
}
