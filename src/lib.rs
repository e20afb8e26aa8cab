pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notification;
pub mod settings;
pub mod storage;
pub mod theme;
pub mod trash;
pub use error::{AppError, AppResult};

use clap::Parser;

/// Entrypoint used by the `campusdesk` binary.
pub fn run() -> AppResult<()> {
    let cli = cli::Cli::parse();
    logging::init();
    tracing::info!("starting campusdesk");

    let mut config = config::load_app_config();
    if let Some(dir) = cli.data_dir {
        config.data_dir = Some(dir);
    }

    let mut app = app::App::bootstrap(&config, cli.headless);
    let stdout = std::io::stdout();
    app.execute(cli.command, &mut stdout.lock())?;
    Ok(())
}
