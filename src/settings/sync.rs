//! Keeps the in-memory settings document and the backend copy in step.
//!
//! Edits are applied locally first and unconditionally; the full document is
//! then pushed. A failed push raises a notice and leaves the local value in
//! place.

use std::rc::Rc;
use std::sync::{mpsc, Arc};

use serde_json::Value;

use super::{SettingChange, SettingsDocument, SettingsResult, SettingsSection};
use crate::api::{ApiError, ApiResult};
use crate::notification::Notifier;
use crate::theme::{PreferenceStore, ThemeMode};

const LOAD_FAILED: &str = "Failed to load settings";
const UPDATE_FAILED: &str = "Failed to update settings";
const UPDATED: &str = "Settings updated";

/// Remote copy of record for the settings document.
pub trait SettingsBackend: Send + Sync {
    /// Returns the stored `settings_data`, which may be partial or absent.
    fn fetch(&self) -> ApiResult<Option<Value>>;
    /// Replaces the stored document.
    fn push(&self, settings: &SettingsDocument) -> ApiResult<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PushMode {
    /// Push before `update` returns.
    #[default]
    Inline,
    /// Push on a worker thread; outcomes are drained by `poll_push_results`.
    Background,
}

pub struct SettingsSynchronizer {
    backend: Arc<dyn SettingsBackend>,
    preferences: PreferenceStore,
    notifier: Rc<dyn Notifier>,
    settings: SettingsDocument,
    push_mode: PushMode,
    worker: Option<PushWorker>,
    in_flight: usize,
}

/// Single background thread; snapshots are pushed in the order they were queued.
struct PushWorker {
    jobs: mpsc::Sender<SettingsDocument>,
    results: mpsc::Receiver<ApiResult<()>>,
}

impl PushWorker {
    fn spawn(backend: Arc<dyn SettingsBackend>) -> Self {
        let (jobs, queued) = mpsc::channel::<SettingsDocument>();
        let (done, results) = mpsc::channel();
        std::thread::spawn(move || {
            for snapshot in queued {
                if done.send(backend.push(&snapshot)).is_err() {
                    break;
                }
            }
        });
        Self { jobs, results }
    }
}

impl SettingsSynchronizer {
    pub fn new(
        backend: Arc<dyn SettingsBackend>,
        preferences: PreferenceStore,
        notifier: Rc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            preferences,
            notifier,
            settings: SettingsDocument::default(),
            push_mode: PushMode::default(),
            worker: None,
            in_flight: 0,
        }
    }

    #[must_use]
    pub fn with_push_mode(mut self, push_mode: PushMode) -> Self {
        self.push_mode = push_mode;
        self
    }

    pub fn settings(&self) -> &SettingsDocument {
        &self.settings
    }

    /// Fetches the remote document and merges it onto the defaults.
    ///
    /// The local theme changes only when the remote carries a valid one.
    /// On failure the defaults are kept and a notice is raised; there is no retry.
    pub fn load(&mut self) -> SettingsDocument {
        let document = match self.backend.fetch() {
            Ok(remote) => {
                let mut document = remote
                    .as_ref()
                    .map(SettingsDocument::from_partial)
                    .unwrap_or_default();
                match remote.as_ref().and_then(remote_theme) {
                    Some(theme) if theme != self.preferences.theme() => {
                        tracing::debug!(theme = %theme, "applying theme from remote settings");
                        self.preferences.set_theme(theme);
                    }
                    Some(_) => {}
                    None => document.appearance.theme = self.preferences.theme(),
                }
                document
            }
            Err(err) => {
                tracing::warn!(%err, "failed to load settings; using defaults");
                self.notifier.failure(LOAD_FAILED);
                SettingsDocument::default()
            }
        };
        self.settings = document.clone();
        document
    }

    /// Validates and applies a wire-level edit, then pushes the whole document.
    ///
    /// Validation failures return before anything is changed or sent.
    pub fn update_field(&mut self, section: &str, field: &str, value: &Value) -> SettingsResult<()> {
        let change = SettingChange::parse(section, field, value)?;
        self.update(change);
        Ok(())
    }

    pub fn update(&mut self, change: SettingChange) {
        if let SettingChange::Theme(mode) = change {
            self.preferences.set_theme(mode);
        }
        tracing::debug!(?change, "applying settings change");
        self.settings.apply(change);
        self.push();
    }

    pub fn pending_pushes(&self) -> usize {
        self.in_flight
    }

    /// Reports finished background pushes; returns how many completed.
    pub fn poll_push_results(&mut self) -> usize {
        let mut finished = Vec::new();
        while self.in_flight > finished.len() {
            let Some(worker) = self.worker.as_ref() else {
                break;
            };
            match worker.results.try_recv() {
                Ok(outcome) => finished.push(outcome),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.worker = None;
                    break;
                }
            }
        }
        if self.worker.is_none() {
            finished.resize_with(self.in_flight, || Err(worker_lost()));
        }
        let count = finished.len();
        self.in_flight -= count;
        for outcome in finished {
            self.report_push(outcome);
        }
        count
    }

    /// Blocks until every background push has finished and reports each.
    pub fn wait_pending(&mut self) {
        while self.in_flight > 0 {
            let outcome = match self.worker.as_ref().map(|worker| worker.results.recv()) {
                Some(Ok(outcome)) => outcome,
                Some(Err(_)) => {
                    self.worker = None;
                    Err(worker_lost())
                }
                None => Err(worker_lost()),
            };
            self.in_flight -= 1;
            self.report_push(outcome);
        }
    }

    fn push(&mut self) {
        let snapshot = self.settings.clone();
        match self.push_mode {
            PushMode::Inline => {
                let outcome = self.backend.push(&snapshot);
                self.report_push(outcome);
            }
            PushMode::Background => {
                let backend = &self.backend;
                let worker = self
                    .worker
                    .get_or_insert_with(|| PushWorker::spawn(Arc::clone(backend)));
                if worker.jobs.send(snapshot).is_ok() {
                    self.in_flight += 1;
                } else {
                    self.worker = None;
                    self.report_push(Err(worker_lost()));
                }
            }
        }
    }

    fn report_push(&self, outcome: ApiResult<()>) {
        match outcome {
            Ok(()) => self.notifier.success(UPDATED),
            Err(err) => {
                tracing::warn!(%err, "failed to push settings; keeping local value");
                self.notifier.failure(UPDATE_FAILED);
            }
        }
    }
}

fn remote_theme(remote: &Value) -> Option<ThemeMode> {
    let raw = remote.pointer("/appearance/theme")?;
    match SettingChange::parse_in(SettingsSection::Appearance, "theme", raw) {
        Ok(SettingChange::Theme(theme)) => Some(theme),
        _ => None,
    }
}

fn worker_lost() -> ApiError {
    ApiError::Unavailable("settings push worker exited without a result".to_string())
}
