//! The full-screen reader.

mod app;
mod input;
pub mod markdown;
mod render;

use std::io::{self, Stdout};
use std::time::Duration;

use crossterm::event::{DisableFocusChange, EnableFocusChange, EventStream};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use futures::StreamExt;
use nt_client::Backend;
use nt_core::ClientConfig;
use tokio::sync::mpsc;
use tracing::{debug, info};
use tui::backend::CrosstermBackend;
use tui::Terminal;

use app::{App, AppEvent};

const TICK_RATE: Duration = Duration::from_millis(250);

type CrosstermTerminal = Terminal<CrosstermBackend<Stdout>>;

fn setup_terminal() -> io::Result<CrosstermTerminal> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableFocusChange)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
    terminal.clear()?;

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableFocusChange, LeaveAlternateScreen);
        original_hook(panic_info);
    }));
    Ok(terminal)
}

fn restore_terminal(terminal: &mut CrosstermTerminal) -> io::Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), DisableFocusChange, LeaveAlternateScreen)?;
    terminal.show_cursor()
}

/// Runs the reader until the user quits, then flushes any unreported reading time.
pub async fn run(backend: Backend, config: ClientConfig) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut app = App::new(backend, config, tx);
    app.start();

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut app, rx).await;
    restore_terminal(&mut terminal)?;

    if let Some(reporter) = app.shutdown() {
        let clock = reporter.shutdown().await;
        debug!("final reading session: {}s", clock.session_seconds());
    }
    info!("👋 Reader closed");
    result
}

async fn event_loop(
    terminal: &mut CrosstermTerminal,
    app: &mut App,
    mut rx: mpsc::UnboundedReceiver<AppEvent>,
) -> anyhow::Result<()> {
    let mut events = EventStream::new();
    let mut tick = tokio::time::interval(TICK_RATE);

    loop {
        terminal.draw(|frame| render::draw(frame, app))?;

        let event = tokio::select! {
            Some(event) = events.next() => AppEvent::Terminal(event?),
            Some(event) = rx.recv() => event,
            _ = tick.tick() => AppEvent::Tick,
        };
        app.handle(event);

        if app.should_quit {
            return Ok(());
        }
    }
}
