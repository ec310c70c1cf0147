/// Ftui terminal dashboard
///
/// Polls one or more freqtrade bots through their REST APIs and renders open and closed
/// trades, profit summaries, tag breakdowns and candle charts. All fetching happens on
/// background tasks; the render loop only reads the shared snapshot cache.
use std::{
    error::Error,
    fs::File,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};

use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ftui_data::{
    SchedulerConfig, SnapshotCache,
    config::{Config, ServerConfig},
    scheduler::Scheduler,
    source::registry::SourceSet,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing::{info, warn};

mod app;
mod ui;

use app::{App, Control};

/// Upper bound on how long the loop blocks waiting for input.
const MAX_POLL: Duration = Duration::from_millis(250);

#[derive(Debug, Parser)]
#[command(name = "ftui", version, about = "Terminal dashboard for freqtrade bots")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long, env = "FTUI_CONFIG", default_value = "ftui.toml")]
    config: PathBuf,

    /// Log file; the terminal is in raw mode so logs never go to stdout.
    #[arg(long, default_value = "ftui.log")]
    log_file: PathBuf,

    /// Additional server as NAME:HOST:PORT:USER:PASS. May be repeated.
    #[arg(short, long = "server", value_name = "NAME:HOST:PORT:USER:PASS")]
    servers: Vec<ServerConfig>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_file)?;

    let config = load_config(&cli)?;
    let timeout = config.refresh.timeout();

    let (sources, failures) = SourceSet::register(&config.servers, timeout).await;
    for failure in &failures {
        eprintln!("excluding {}: {}", failure.server, failure.error);
    }
    if sources.is_empty() {
        return Err("no configured server passed its connectivity check".into());
    }
    info!(sources = sources.len(), excluded = failures.len(), "sources registered");

    let scheduler = Scheduler::new(
        Arc::new(sources),
        Arc::new(SnapshotCache::new()),
        SchedulerConfig::from(&config),
    );
    let loops = scheduler.start();

    // Setup panic hook to restore terminal on crash
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, DisableMouseCapture);
        original_hook(panic_info);
    }));

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(scheduler, config.display, Instant::now());
    let result = run(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    for handle in loops {
        handle.abort();
    }
    info!("shutdown");
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<(), Box<dyn Error>> {
    loop {
        let now = Instant::now();
        if app.tick(now) {
            terminal.draw(|f| ui::render(f, app))?;
        }

        let timeout = app.until_next(Instant::now()).unwrap_or(MAX_POLL).min(MAX_POLL);
        if event::poll(timeout)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if app.handle_key(key, Instant::now()) == Control::Quit {
                        break;
                    }
                }
                Event::Resize(_, _) => app.mark_dirty(),
                _ => {}
            }
        }
    }
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config, Box<dyn Error>> {
    let config = if cli.config.exists() {
        Config::load(&cli.config)?
    } else {
        if cli.servers.is_empty() {
            return Err(format!("config file {} not found and no --server given", cli.config.display()).into());
        }
        warn!(path = %cli.config.display(), "config file not found, using defaults");
        Config::default()
    };

    let config = cli
        .servers
        .iter()
        .cloned()
        .fold(config, Config::with_server)
        .with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

fn init_logging(path: &Path) -> Result<(), Box<dyn Error>> {
    let file = File::create(path)?;
    tracing_subscriber::fmt()
        // Filter messages based on the INFO level
        .with_env_filter(
            tracing_subscriber::filter::EnvFilter::builder()
                .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        // Log file, no colours
        .with_ansi(false)
        .with_writer(Arc::new(file))
        // Install this Tracing subscriber as global default
        .init();
    Ok(())
}
