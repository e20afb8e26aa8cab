use std::io::Write;
use std::rc::Rc;
use std::sync::Arc;

use serde_json::Value;

use crate::api::{HttpSettingsBackend, UnavailableBackend};
use crate::cli::{
    Command, SettingsCommand, SettingsSubcommand, ThemeCommand, ThemeSubcommand, TrashCommand,
    TrashSubcommand,
};
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::notification::{DesktopNotifier, LogNotifier, Notifier};
use crate::settings::{PushMode, SettingsBackend, SettingsSynchronizer};
use crate::storage::{FileStore, KeyValueStore, MemoryStore, StorageResult};
use crate::theme::gtk::GtkColorScheme;
use crate::theme::{ColorSchemeSource, ManualColorScheme, NoopMarker, PreferenceStore, RootMarker};
use crate::trash::{SoftDeleteBuffer, TrashRecord};

/// Process-wide services, constructed once and handed to each consumer.
pub struct App {
    preferences: PreferenceStore,
    trash: SoftDeleteBuffer,
    notifier: Rc<dyn Notifier>,
    backend: Arc<dyn SettingsBackend>,
}

impl App {
    pub fn new(
        store: Rc<dyn KeyValueStore>,
        scheme: Rc<dyn ColorSchemeSource>,
        marker: Box<dyn RootMarker>,
        notifier: Rc<dyn Notifier>,
        backend: Arc<dyn SettingsBackend>,
    ) -> Self {
        let preferences = PreferenceStore::open(Rc::clone(&store), scheme, marker);
        let trash = SoftDeleteBuffer::open(store);
        Self {
            preferences,
            trash,
            notifier,
            backend,
        }
    }

    /// Wires the production services. Missing storage or a bad backend
    /// configuration degrade the affected commands instead of failing here.
    pub fn bootstrap(config: &AppConfig, headless: bool) -> Self {
        let store = open_store(match config.data_dir.as_ref() {
            Some(dir) => Ok(FileStore::with_root(dir.clone())),
            None => FileStore::with_default_root(),
        });
        let backend: Arc<dyn SettingsBackend> = match HttpSettingsBackend::from_config(config) {
            Ok(backend) => Arc::new(backend),
            Err(err) => {
                tracing::warn!(%err, "settings backend unavailable; settings will use defaults");
                Arc::new(UnavailableBackend::new(err.to_string()))
            }
        };

        let gtk = if headless {
            None
        } else {
            GtkColorScheme::connect()
        };
        match gtk {
            Some(scheme) => {
                let marker = scheme.root_marker();
                Self::new(
                    store,
                    Rc::new(scheme),
                    Box::new(marker),
                    Rc::new(DesktopNotifier),
                    backend,
                )
            }
            None => Self::new(
                store,
                Rc::new(ManualColorScheme::new(false)),
                Box::new(NoopMarker),
                Rc::new(LogNotifier),
                backend,
            ),
        }
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn trash(&self) -> &SoftDeleteBuffer {
        &self.trash
    }

    pub fn trash_mut(&mut self) -> &mut SoftDeleteBuffer {
        &mut self.trash
    }

    pub fn settings_synchronizer(&self) -> SettingsSynchronizer {
        SettingsSynchronizer::new(
            Arc::clone(&self.backend),
            self.preferences.clone(),
            Rc::clone(&self.notifier),
        )
    }

    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> AppResult<()> {
        match command {
            Command::Theme(ThemeCommand { command }) => self.run_theme(command, out),
            Command::Trash(TrashCommand { command }) => self.run_trash(command, out),
            Command::Settings(SettingsCommand { command }) => self.run_settings(command, out),
        }
    }

    fn run_theme<W: Write>(&mut self, command: ThemeSubcommand, out: &mut W) -> AppResult<()> {
        if let ThemeSubcommand::Set { mode } = command {
            self.preferences.set_theme(mode);
        }
        let appearance = if self.preferences.is_dark() {
            "dark"
        } else {
            "light"
        };
        writeln!(out, "{} ({appearance})", self.preferences.theme())?;
        Ok(())
    }

    fn run_trash<W: Write>(&mut self, command: TrashSubcommand, out: &mut W) -> AppResult<()> {
        match command {
            TrashSubcommand::List => {
                serde_json::to_writer_pretty(&mut *out, self.trash.items())?;
                writeln!(out)?;
            }
            TrashSubcommand::Add {
                kind,
                name,
                details,
                id,
            } => {
                let mut record = TrashRecord::new(kind).with_field("name", name);
                if let Some(details) = details {
                    record = record.with_field("details", details);
                }
                if let Some(id) = id {
                    record = record.with_id(id);
                }
                let item = self.trash.add(record);
                writeln!(out, "{}", item.id)?;
            }
            TrashSubcommand::Remove { id } => {
                self.trash.remove(&id);
            }
            TrashSubcommand::Restore { id } => {
                if self.trash.restore(&id).is_none() {
                    return Err(AppError::TrashEntryNotFound(id));
                }
                tracing::info!(%id, "restored trash entry locally; server record unchanged");
            }
            TrashSubcommand::Clear => self.trash.clear(),
        }
        Ok(())
    }

    fn run_settings<W: Write>(
        &mut self,
        command: SettingsSubcommand,
        out: &mut W,
    ) -> AppResult<()> {
        let mut synchronizer = self
            .settings_synchronizer()
            .with_push_mode(PushMode::Background);
        synchronizer.load();
        if let SettingsSubcommand::Set {
            section,
            field,
            value,
        } = command
        {
            let value = serde_json::from_str(&value).unwrap_or(Value::String(value));
            synchronizer.update_field(&section, &field, &value)?;
        }
        let written = serde_json::to_writer_pretty(&mut *out, synchronizer.settings())
            .map_err(AppError::from)
            .and_then(|()| writeln!(out).map_err(AppError::from));
        synchronizer.wait_pending();
        written
    }
}

fn open_store(root: StorageResult<FileStore>) -> Rc<dyn KeyValueStore> {
    match root {
        Ok(store) => Rc::new(store),
        Err(err) => {
            tracing::warn!(%err, "no durable storage; preferences last for this run only");
            Rc::new(MemoryStore::new())
        }
    }
}
