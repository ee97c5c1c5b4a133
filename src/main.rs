mod ui;

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    tty::IsTty,
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::{
    error::Error,
    fs::{self, File, OpenOptions},
    io::{self, stdin, Read},
    panic::{self, AssertUnwindSafe},
    path::{Path, PathBuf},
    rc::Rc,
    sync::Mutex,
    time::{Duration, Instant},
};
use tracing::error;
use tracing_subscriber::EnvFilter;

use rote::{
    app::App,
    app_dirs::AppDirs,
    bus::EventBus,
    catalog::{Catalog, CatalogError},
    config::{Config, ConfigStore, FileConfigStore},
    runtime::{CrosstermEventSource, FixedTicker, RoteEvent, Runner},
    stats::{write_csv, Summary},
    store::{SnippetId, SnippetStore, SqliteStore},
    transfer,
    util::{minutes, round2},
};

/// terminal typing drills for memorizing code templates
#[derive(Parser, Debug)]
#[clap(
    version,
    about,
    long_about = "Type code snippets from memory, one keystroke at a time. Wrong keys are simply ignored; finishing a snippet records the practice time."
)]
pub struct Cli {
    /// snippet database to use instead of the default location
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// skip the completion animation
    #[clap(long, global = true)]
    no_celebrate: bool,

    #[clap(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// practice snippets in the terminal ui (default)
    Practice,
    /// add a snippet, reading the code from --file or stdin
    Add {
        #[clap(short, long)]
        title: String,
        #[clap(short, long)]
        file: Option<PathBuf>,
    },
    /// change the title and/or code of a snippet
    Edit {
        id: SnippetId,
        #[clap(short, long)]
        title: Option<String>,
        #[clap(short, long)]
        file: Option<PathBuf>,
    },
    /// delete a snippet
    Rm { id: SnippetId },
    /// list snippets with their practice counters
    List,
    /// show practice totals
    Stats {
        /// write the per-snippet table as csv
        #[clap(long)]
        csv: bool,
    },
    /// write every snippet as json
    Export {
        /// output file; stdout when omitted
        #[clap(short, long)]
        out: Option<PathBuf>,
    },
    /// add every snippet from a json export
    Import { file: PathBuf },
    /// print the config file location and the settings in effect
    Config {
        /// write the file, filling in defaults for missing settings
        #[clap(long)]
        init: bool,
    },
}

impl Cli {
    /// File config with command line overrides applied
    fn config(&self) -> Config {
        let mut config = FileConfigStore::new().load();
        if let Some(db) = &self.db {
            config.db_path = Some(db.clone());
        }
        if self.no_celebrate {
            config.celebrate = false;
        }
        config
    }
}

/// Log to a file; the terminal belongs to the ui
fn init_logging() {
    let Some(path) = AppDirs::log_path() else {
        return;
    };
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&path) else {
        return;
    };

    let filter = EnvFilter::try_from_env("ROTE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
}

fn read_code(file: Option<&Path>) -> io::Result<String> {
    match file {
        Some(path) => fs::read_to_string(path),
        None => {
            let mut code = String::new();
            stdin().read_to_string(&mut code)?;
            Ok(code)
        }
    }
}

fn show_config(init: bool, config: &Config) -> Result<(), Box<dyn Error>> {
    let file = FileConfigStore::new();
    if init {
        file.save(&file.load())?;
        eprintln!("wrote {}", file.path().display());
    }
    println!("{}", file.path().display());
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut cli = Cli::parse();
    init_logging();

    let config = cli.config();
    let command = cli.command.take().unwrap_or(Command::Practice);
    let store = match command {
        Command::Config { init } => return show_config(init, &config),
        _ => Rc::new(SqliteStore::open(config.resolve_db_path())?),
    };

    match command {
        Command::Practice => practice(store, config)?,
        Command::Add { title, file } => {
            let code = read_code(file.as_deref())?;
            let id = Catalog::new(store, EventBus::new()).add(&title, &code)?;
            println!("added snippet {id}");
        }
        Command::Edit { id, title, file } => {
            let current = store.get(id)?.ok_or(CatalogError::NotFound(id))?;
            let title = title.unwrap_or(current.title);
            let code = match file {
                Some(path) => fs::read_to_string(path)?,
                None => current.code,
            };
            Catalog::new(store, EventBus::new()).edit(id, &title, &code)?;
            println!("updated snippet {id}");
        }
        Command::Rm { id } => {
            Catalog::new(store, EventBus::new()).remove(id)?;
            println!("removed snippet {id}");
        }
        Command::List => {
            for snippet in store.get_all()? {
                println!(
                    "{:>4}  {:<50}  {:>4} tests  {:>8.2} min",
                    snippet.id,
                    snippet.title,
                    snippet.test_count,
                    round2(minutes(snippet.elapsed))
                );
            }
        }
        Command::Stats { csv } => {
            let summary = Summary::from_snippets(&store.get_all()?);
            if csv {
                write_csv(&summary, io::stdout().lock())?;
            } else {
                for row in &summary.rows {
                    println!("{:<50}  {:>4}  {:>8.2}", row.title, row.count, row.minutes());
                }
                println!(
                    "total: {} tests, {:.2} min",
                    summary.total_tests,
                    summary.total_minutes()
                );
            }
        }
        Command::Export { out } => match out {
            Some(path) => {
                let count = transfer::export(store.as_ref(), File::create(&path)?)?;
                eprintln!("exported {count} snippets to {}", path.display());
            }
            None => {
                let count = transfer::export(store.as_ref(), io::stdout().lock())?;
                eprintln!("exported {count} snippets");
            }
        },
        Command::Import { file } => {
            let count = transfer::import(store.as_ref(), &EventBus::new(), File::open(&file)?)?;
            println!("imported {count} snippets");
        }
        Command::Config { .. } => {}
    }

    Ok(())
}

fn practice(store: Rc<SqliteStore>, config: Config) -> Result<(), Box<dyn Error>> {
    if !stdin().is_tty() {
        let mut cmd = Cli::command();
        cmd.error(ErrorKind::Io, "stdin must be a tty").exit();
    }

    let refresh = config.refresh();
    let mut app = App::new(store, config)?;

    enable_raw_mode()?;

    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // the alternate screen hides stderr, so panics go to the log
    let default_hook = panic::take_hook();
    panic::set_hook(Box::new(|info| error!(%info, "panic in terminal ui")));
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        start_tui(&mut terminal, &mut app, refresh)
    }));
    panic::set_hook(default_hook);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    match result {
        Ok(result) => result,
        Err(payload) => {
            match AppDirs::log_path() {
                Some(path) => eprintln!("rote crashed; details are in {}", path.display()),
                None => eprintln!("rote crashed"),
            }
            panic::resume_unwind(payload)
        }
    }
}

fn start_tui<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    refresh: Duration,
) -> Result<(), Box<dyn Error>> {
    let size = terminal.size()?;
    app.set_viewport(size.width, size.height);

    let runner = Runner::new(CrosstermEventSource::new(), FixedTicker::new(refresh));

    while !app.should_quit {
        terminal.draw(|f| ui::draw(f, app))?;

        let outcome = match runner.step() {
            RoteEvent::Key(key) => app.handle_key(key),
            RoteEvent::Resize(width, height) => {
                app.set_viewport(width, height);
                Ok(())
            }
            RoteEvent::Tick => app.on_tick(Instant::now()),
        };

        // keep the ui alive; the failed action is simply not applied
        if let Err(e) = outcome {
            error!(error = %e, "snippet store failure");
            app.notice = Some(e.to_string());
        }
    }

    Ok(())
}
