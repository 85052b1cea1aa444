use clap::Parser;
use color_eyre::Result;
use crossterm::event::{DisableMouseCapture, EnableMouseCapture, Event};
use crossterm::execute;
use gridlist::persistence::{FileStore, PreferenceStore, StorageKeys};
use gridlist::{logging, App, AppConfig, AppEvent, Args, CacheManager, ConfigManager};
use ratatui::DefaultTerminal;
use std::sync::mpsc::channel;
use std::time::Duration;

fn render(terminal: &mut DefaultTerminal, app: &mut App) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(app, frame.area()))?;
    Ok(())
}

fn run(mut terminal: DefaultTerminal, args: &Args, config: AppConfig) -> Result<()> {
    let (tx, rx) = channel::<AppEvent>();
    let poll_interval = Duration::from_millis(config.display.event_poll_interval_ms);
    let manager = ConfigManager::new(gridlist::APP_NAME)?;
    let view = args.view_name().unwrap_or_else(|| "default".to_string());
    let mut app = App::new(config, manager, view);
    if args.debug {
        app.enable_debug();
    }
    render(&mut terminal, &mut app)?;
    if let Some(path) = &args.path {
        tx.send(AppEvent::Open(path.clone(), args.format))?;
    }

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                Event::Key(key) => tx.send(AppEvent::Key(key))?,
                Event::Mouse(mouse) => tx.send(AppEvent::Mouse(mouse))?,
                Event::Resize(cols, rows) => tx.send(AppEvent::Resize(cols, rows))?,
                _ => {}
            }
        }
        tx.send(AppEvent::Tick)?;

        let mut updated = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                AppEvent::Exit => return Ok(()),
                AppEvent::Crash(msg) => return Err(color_eyre::eyre::eyre!(msg)),
                AppEvent::Tick => {
                    if let Some(next) = app.event(&AppEvent::Tick) {
                        tx.send(next)?;
                        updated = true;
                    }
                }
                event => {
                    if let Some(next) = app.event(&event) {
                        tx.send(next)?;
                    }
                    updated = true;
                }
            }
        }

        if updated {
            render(&mut terminal, &mut app)?;
        }
    }
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        let manager = ConfigManager::new(gridlist::APP_NAME)?;
        match manager.write_default_config(args.force) {
            Ok(path) => {
                println!("Configuration written to {}", path.display());
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error generating config: {}", e);
                std::process::exit(1);
            }
        }
    }

    if args.clear_cache {
        match CacheManager::new(gridlist::APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    if args.clear_preferences {
        let manager = ConfigManager::new(gridlist::APP_NAME)?;
        let store = FileStore::new(&manager);
        let result = match args.view_name() {
            Some(view) => {
                let keys = StorageKeys::for_view(&view);
                [keys.order, keys.visibility, keys.widths]
                    .iter()
                    .try_for_each(|key| store.remove(key))
                    .map(|()| format!("Preferences for view '{}' cleared", view))
            }
            None => store
                .clear_all()
                .map(|()| "All preferences cleared".to_string()),
        };
        match result {
            Ok(message) => {
                println!("{}", message);
                return Ok(Some(()));
            }
            Err(e) => {
                eprintln!("Error clearing preferences: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

/// Config file layered over defaults, then command-line overrides.
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(gridlist::APP_NAME)?;
    if let Some(page_size) = args.page_size {
        config.display.page_size = page_size;
    }
    if let Some(debounce_ms) = args.debounce_ms {
        config.search.debounce_ms = debounce_ms;
    }
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = load_config(&args)?;

    let filter = logging::build_filter(
        &config.logging.level,
        args.log_level.as_deref(),
        args.debug,
    )?;
    let cache = CacheManager::new(gridlist::APP_NAME)?;
    if let Err(e) = logging::init(&cache, filter) {
        eprintln!("Logging disabled: {}", e);
    }

    let terminal = ratatui::init();
    execute!(std::io::stdout(), EnableMouseCapture)?;
    let result = run(terminal, &args, config);
    let _ = execute!(std::io::stdout(), DisableMouseCapture);
    ratatui::restore();
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
