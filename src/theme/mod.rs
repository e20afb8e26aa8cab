//! Theme preference: the persisted `light|dark|system` mode and its resolved
//! dark flag.
//!
//! `PreferenceStore` is a cheap clonable handle; every clone sees the same
//! state. The resolved `is_dark` flag is a projection of the mode and is
//! never persisted on its own.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::{load_json, KeyValueStore};

pub mod gtk;

pub(crate) const THEME_KEY: &str = "theme";
pub(crate) const LEGACY_DARK_MODE_KEY: &str = "darkMode";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    #[default]
    System,
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// Resolves the mode against the current system preference.
    pub const fn resolve(self, system_prefers_dark: bool) -> bool {
        match self {
            Self::Light => false,
            Self::Dark => true,
            Self::System => system_prefers_dark,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown theme mode: {0:?}")]
pub struct ThemeError(pub String);

impl FromStr for ThemeMode {
    type Err = ThemeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(ThemeError(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// OS or toolkit color-scheme signal.
pub trait ColorSchemeSource {
    fn prefers_dark(&self) -> bool;
    fn subscribe(&self, on_change: Box<dyn Fn(bool)>) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

/// Visual root marker used for style selection.
pub trait RootMarker {
    fn apply(&self, is_dark: bool);
}

#[derive(Debug, Default)]
pub struct NoopMarker;

impl RootMarker for NoopMarker {
    fn apply(&self, _is_dark: bool) {}
}

type SchemeListener = Rc<dyn Fn(bool)>;

/// Color-scheme source driven by the caller.
#[derive(Default)]
pub struct ManualColorScheme {
    prefers_dark: Cell<bool>,
    next_id: Cell<u64>,
    listeners: RefCell<Vec<(SubscriptionId, SchemeListener)>>,
}

impl ManualColorScheme {
    pub fn new(prefers_dark: bool) -> Self {
        Self {
            prefers_dark: Cell::new(prefers_dark),
            ..Self::default()
        }
    }

    /// Changes the signal and notifies subscribers if the value changed.
    pub fn set_prefers_dark(&self, prefers_dark: bool) {
        if self.prefers_dark.replace(prefers_dark) == prefers_dark {
            return;
        }
        let listeners: Vec<SchemeListener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(prefers_dark);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }
}

impl ColorSchemeSource for ManualColorScheme {
    fn prefers_dark(&self) -> bool {
        self.prefers_dark.get()
    }

    fn subscribe(&self, on_change: Box<dyn Fn(bool)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::from(on_change)));
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners
            .borrow_mut()
            .retain(|(listener_id, _)| *listener_id != id);
    }
}

type ThemeObserver = Rc<dyn Fn(ThemeMode, bool)>;

struct ThemeState {
    mode: ThemeMode,
    is_dark: bool,
    system_subscription: Option<SubscriptionId>,
}

struct Inner {
    storage: Rc<dyn KeyValueStore>,
    scheme: Rc<dyn ColorSchemeSource>,
    marker: Box<dyn RootMarker>,
    state: RefCell<ThemeState>,
    observers: RefCell<Vec<ThemeObserver>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(id) = self.state.get_mut().system_subscription.take() {
            self.scheme.unsubscribe(id);
        }
    }
}

#[derive(Clone)]
pub struct PreferenceStore {
    inner: Rc<Inner>,
}

impl PreferenceStore {
    /// Loads the persisted mode and applies it once.
    pub fn open(
        storage: Rc<dyn KeyValueStore>,
        scheme: Rc<dyn ColorSchemeSource>,
        marker: Box<dyn RootMarker>,
    ) -> Self {
        let mode = load_persisted_mode(storage.as_ref());
        let is_dark = mode.resolve(scheme.prefers_dark());
        let store = Self {
            inner: Rc::new(Inner {
                storage,
                scheme,
                marker,
                state: RefCell::new(ThemeState {
                    mode,
                    is_dark,
                    system_subscription: None,
                }),
                observers: RefCell::new(Vec::new()),
            }),
        };
        tracing::info!(mode = %mode, is_dark, "loaded theme preference");
        store.inner.marker.apply(is_dark);
        store.sync_system_listener(mode);
        store
    }

    pub fn theme(&self) -> ThemeMode {
        self.inner.state.borrow().mode
    }

    pub fn is_dark(&self) -> bool {
        self.inner.state.borrow().is_dark
    }

    /// Persists `mode`, re-resolves the dark flag and updates the root marker.
    pub fn set_theme(&self, mode: ThemeMode) {
        if let Err(err) = self.inner.storage.set(THEME_KEY, mode.as_str()) {
            tracing::warn!(?err, mode = %mode, "failed to persist theme; keeping in-memory value");
        }

        let is_dark = mode.resolve(self.inner.scheme.prefers_dark());
        {
            let mut state = self.inner.state.borrow_mut();
            state.mode = mode;
            state.is_dark = is_dark;
        }
        tracing::debug!(mode = %mode, is_dark, "theme applied");

        self.inner.marker.apply(is_dark);
        self.sync_system_listener(mode);
        self.notify_observers(mode, is_dark);
    }

    /// Registers a callback run after every applied change.
    pub fn subscribe_changes(&self, observer: impl Fn(ThemeMode, bool) + 'static) {
        self.inner.observers.borrow_mut().push(Rc::new(observer));
    }

    fn sync_system_listener(&self, mode: ThemeMode) {
        let active = self.inner.state.borrow().system_subscription;
        match (mode, active) {
            (ThemeMode::System, None) => {
                let weak = Rc::downgrade(&self.inner);
                let id = self
                    .inner
                    .scheme
                    .subscribe(Box::new(move |prefers_dark| {
                        on_system_scheme_changed(&weak, prefers_dark);
                    }));
                self.inner.state.borrow_mut().system_subscription = Some(id);
            }
            (ThemeMode::Light | ThemeMode::Dark, Some(id)) => {
                self.inner.scheme.unsubscribe(id);
                self.inner.state.borrow_mut().system_subscription = None;
            }
            _ => {}
        }
    }

    fn notify_observers(&self, mode: ThemeMode, is_dark: bool) {
        notify_observers(&self.inner, mode, is_dark);
    }
}

fn on_system_scheme_changed(inner: &Weak<Inner>, prefers_dark: bool) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let changed = {
        let Ok(mut state) = inner.state.try_borrow_mut() else {
            tracing::warn!("theme state busy; dropping system scheme change");
            return;
        };
        if state.mode != ThemeMode::System || state.is_dark == prefers_dark {
            None
        } else {
            state.is_dark = prefers_dark;
            Some(state.mode)
        }
    };
    if let Some(mode) = changed {
        tracing::debug!(is_dark = prefers_dark, "system color scheme changed");
        inner.marker.apply(prefers_dark);
        notify_observers(&inner, mode, prefers_dark);
    }
}

fn notify_observers(inner: &Inner, mode: ThemeMode, is_dark: bool) {
    let observers: Vec<ThemeObserver> = inner.observers.borrow().iter().cloned().collect();
    for observer in observers {
        observer(mode, is_dark);
    }
}

fn load_persisted_mode(storage: &dyn KeyValueStore) -> ThemeMode {
    match storage.get(THEME_KEY) {
        Ok(Some(raw)) => raw.parse().unwrap_or_else(|err| {
            tracing::warn!(?err, "unrecognised persisted theme; using system");
            ThemeMode::System
        }),
        Ok(None) => migrate_legacy_dark_mode(storage).unwrap_or_default(),
        Err(err) => {
            tracing::warn!(?err, "failed to read theme preference; using system");
            ThemeMode::System
        }
    }
}

/// Folds the old boolean dark-mode flag into the enumerated theme key.
fn migrate_legacy_dark_mode(storage: &dyn KeyValueStore) -> Option<ThemeMode> {
    let legacy = match load_json::<bool>(storage, LEGACY_DARK_MODE_KEY) {
        Ok(value) => value?,
        Err(err) => {
            tracing::warn!(?err, "discarding unreadable legacy dark mode flag");
            if let Err(err) = storage.remove(LEGACY_DARK_MODE_KEY) {
                tracing::warn!(?err, "failed to remove legacy dark mode flag");
            }
            return None;
        }
    };
    let mode = if legacy {
        ThemeMode::Dark
    } else {
        ThemeMode::Light
    };
    match storage.set(THEME_KEY, mode.as_str()) {
        Ok(()) => {
            if let Err(err) = storage.remove(LEGACY_DARK_MODE_KEY) {
                tracing::warn!(?err, "failed to remove legacy dark mode flag");
            }
            tracing::info!(mode = %mode, "migrated legacy dark mode flag");
        }
        Err(err) => tracing::warn!(?err, "failed to persist migrated theme"),
    }
    Some(mode)
}
