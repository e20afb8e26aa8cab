use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::theme::ThemeMode;

#[derive(Parser, Debug)]
#[command(
    name = "campusdesk",
    about = "Campus dashboard theme preference, trash bin, and settings"
)]
pub struct Cli {
    /// Directory for locally persisted preferences.
    #[arg(long, env = "CAMPUSDESK_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Skip GTK: no system color-scheme tracking and log-only notices.
    #[arg(long)]
    pub headless: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    Theme(ThemeCommand),
    Trash(TrashCommand),
    Settings(SettingsCommand),
}

#[derive(Args, Debug)]
pub struct ThemeCommand {
    #[command(subcommand)]
    pub command: ThemeSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ThemeSubcommand {
    Get,
    Set { mode: ThemeMode },
}

#[derive(Args, Debug)]
pub struct TrashCommand {
    #[command(subcommand)]
    pub command: TrashSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum TrashSubcommand {
    List,
    Add {
        #[arg(value_name = "TYPE")]
        kind: String,
        name: String,
        #[arg(long)]
        details: Option<String>,
        #[arg(long)]
        id: Option<String>,
    },
    Remove {
        id: String,
    },
    /// Drops the local entry; the deleted record is not recreated on the server.
    Restore {
        id: String,
    },
    Clear,
}

#[derive(Args, Debug)]
pub struct SettingsCommand {
    #[command(subcommand)]
    pub command: SettingsSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum SettingsSubcommand {
    Show,
    Set {
        section: String,
        field: String,
        /// JSON literal, or a bare string.
        value: String,
    },
}
