use std::io;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Layout},
    Terminal,
};
use tracing::{error, info};

use depviz::app::{App, View};
use depviz::data::project;
use depviz::engine::GraphEngine;
use depviz::export::Export;
use depviz::settings::{Overrides, Settings};
use depviz::source::{
    status_channel, ConnectionStatus, DataSource, FileSource, HttpSource, SpanReplaySource,
    StreamSource, WebSocketSource,
};
use depviz::ui::{self, Theme, TuiGraph};
use depviz::{events, logging};

/// Screen row of the first table row: header, tabs, block border, column header.
const CONTENT_START_ROW: u16 = 4;

#[derive(Parser, Debug)]
#[command(name = "depviz")]
#[command(about = "Live service-dependency graph with health classification")]
struct Args {
    /// Path to a graph snapshot JSON file
    #[arg(short, long, default_value = "graph.json", conflicts_with_all = ["connect", "url", "ws", "spans"])]
    file: PathBuf,

    /// Connect to a TCP endpoint streaming newline-delimited snapshots (host:port)
    #[arg(short, long, conflicts_with_all = ["url", "ws", "spans"])]
    connect: Option<String>,

    /// Poll a collector over HTTP (GET <url>/graph?window_sec=N)
    #[arg(short, long, conflicts_with_all = ["connect", "ws", "spans"])]
    url: Option<String>,

    /// Receive pushed snapshots over WebSocket
    #[arg(long, conflicts_with_all = ["connect", "url", "spans"])]
    ws: Option<String>,

    /// Replay a newline-delimited span export file
    #[arg(long, conflicts_with_all = ["connect", "url", "ws"])]
    spans: Option<PathBuf>,

    /// Settings file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Observation window in seconds
    #[arg(short, long)]
    window: Option<u64>,

    /// Refresh interval (e.g., "2s", "500ms")
    #[arg(short, long)]
    refresh: Option<String>,

    /// Log file path
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Log level or filter directives (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Export the --file snapshot to a JSON file and exit
    #[arg(short, long, conflicts_with_all = ["connect", "url", "ws", "spans"])]
    export: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = Overrides {
        window_sec: args.window,
        refresh: args.refresh.clone(),
        log_level: args.log_level.clone(),
        log_file: args.log_file.clone(),
    };
    let settings = Settings::load(args.config.as_deref(), &overrides)?;
    logging::init(&settings.log)?;
    info!(?settings, "starting");

    // Handle export mode (non-interactive)
    if let Some(ref export_path) = args.export {
        return export_to_file(&args.file, export_path);
    }

    let refresh = settings.refresh_interval()?;

    if let Some(ref addr) = args.connect {
        return run_with_tcp(addr, &settings);
    }
    if let Some(ref url) = args.url {
        let rt = tokio::runtime::Runtime::new()?;
        let (sink, status) = status_channel(ConnectionStatus::Disconnected);
        let source = rt.block_on(async {
            HttpSource::spawn(url, settings.window_sec, refresh, sink)
                .with_context(|| format!("failed to start HTTP polling of {}", url))
        })?;
        // Snapshots arrive in the background; the UI only needs to drain them
        return run_tui(Box::new(source), status, &settings, Duration::from_millis(100));
    }
    if let Some(ref url) = args.ws {
        let rt = tokio::runtime::Runtime::new()?;
        let (sink, status) = status_channel(ConnectionStatus::Disconnected);
        let backoff = settings.reconnect_backoff()?;
        let source =
            rt.block_on(async { WebSocketSource::spawn(url, settings.window_sec, backoff, sink) });
        return run_tui(Box::new(source), status, &settings, Duration::from_millis(100));
    }

    let (_sink, status) = status_channel(ConnectionStatus::Connected);
    let source: Box<dyn DataSource> = match args.spans {
        Some(ref path) => Box::new(SpanReplaySource::new(path, settings.window_sec)),
        None => Box::new(FileSource::new(&args.file)),
    };
    run_tui(source, status, &settings, refresh)
}

/// Run with a TCP stream data source
fn run_with_tcp(addr: &str, settings: &Settings) -> Result<()> {
    let rt = tokio::runtime::Runtime::new()?;

    let source = rt.block_on(async {
        use tokio::net::TcpStream;

        println!("Connecting to {}...", addr);
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                println!("Connected!");
                Ok(StreamSource::spawn(stream, addr))
            }
            Err(e) => Err(anyhow::anyhow!("Failed to connect to {}: {}", addr, e)),
        }
    })?;

    let (_sink, status) = status_channel(ConnectionStatus::Connected);
    run_tui(Box::new(source), status, settings, Duration::from_millis(100))
}

/// Run the TUI with the given data source
fn run_tui(
    source: Box<dyn DataSource>,
    status: tokio::sync::watch::Receiver<ConnectionStatus>,
    settings: &Settings,
    refresh_interval: Duration,
) -> Result<()> {
    let engine = GraphEngine::with_layout(
        TuiGraph::new(),
        settings.layout.policy,
        settings.layout_directive(),
    );

    // Detect the background before raw mode takes over the terminal
    let theme = Theme::auto_detect();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Restore the terminal before the panic message is printed
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic);
    }));

    let mut app = App::new(source, engine, status, settings.window_sec, theme);
    app.reload_data();

    let result = run_app(&mut terminal, &mut app, refresh_interval);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(ref e) = result {
        error!(error = %e, "terminal loop failed");
    }
    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    refresh_interval: Duration,
) -> Result<()> {
    let mut last_refresh = Instant::now();

    // Minimum terminal size for usable display
    const MIN_WIDTH: u16 = 60;
    const MIN_HEIGHT: u16 = 12;

    while app.running {
        terminal.draw(|frame| {
            let area = frame.area();

            if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
                let msg = format!(
                    "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
                    area.width, area.height, MIN_WIDTH, MIN_HEIGHT
                );
                let paragraph = ratatui::widgets::Paragraph::new(msg)
                    .alignment(ratatui::layout::Alignment::Center)
                    .style(ratatui::style::Style::default().fg(ratatui::style::Color::Yellow));
                let centered = ratatui::layout::Rect::new(0, area.height / 2 - 2, area.width, 5);
                frame.render_widget(paragraph, centered);
                return;
            }

            let chunks = Layout::vertical([
                Constraint::Length(1), // Header bar
                Constraint::Length(1), // Tabs
                Constraint::Min(8),    // Content
                Constraint::Length(1), // Status bar
            ])
            .split(area);

            ui::common::render_header(frame, app, chunks[0]);
            ui::common::render_tabs(frame, app, chunks[1]);

            match app.current_view {
                View::Services => ui::services::render(frame, app, chunks[2]),
                View::Dependencies => ui::dependencies::render(frame, app, chunks[2]),
                View::Flow => ui::flow::render(frame, app, chunks[2]),
            }

            ui::common::render_status_bar(frame, app, chunks[3]);

            if app.detail_visible() {
                ui::detail::render_overlay(frame, app, area);
            }
            if app.show_help {
                ui::common::render_help(frame, app, area);
            }
        })?;

        if let Some(event) = events::poll_event(Duration::from_millis(100))? {
            match event {
                Event::Key(key) => events::handle_key_event(app, key),
                Event::Mouse(mouse) => events::handle_mouse_event(app, mouse, CONTENT_START_ROW),
                // Terminal will redraw on next iteration
                Event::Resize(_, _) => {}
                _ => {}
            }
        }

        if last_refresh.elapsed() >= refresh_interval {
            app.reload_data();
            last_refresh = Instant::now();
        }
    }

    Ok(())
}

/// Load one snapshot, project it and write the export.
fn export_to_file(snapshot_path: &Path, export_path: &Path) -> Result<()> {
    let snapshot = FileSource::new(snapshot_path)
        .load()
        .with_context(|| format!("failed to load {}", snapshot_path.display()))?;
    let elements = project(&snapshot);
    Export::build(&elements).write(export_path)?;

    info!(elements = elements.len(), path = %export_path.display(), "exported graph");
    println!("Exported graph to: {}", export_path.display());
    Ok(())
}
