use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use gtk4::glib::SignalHandlerId;
use gtk4::prelude::ObjectExt;

use super::{ColorSchemeSource, RootMarker, SubscriptionId};

const COLOR_SCHEME_PROPERTY: &str = "gtk-interface-color-scheme";
const THEME_NAME_PROPERTY: &str = "gtk-theme-name";
// GTK_INTERFACE_COLOR_SCHEME_DARK / _LIGHT
const COLOR_SCHEME_DARK: i32 = 2;
const COLOR_SCHEME_LIGHT: i32 = 3;

/// Color-scheme signal backed by the default `GtkSettings`.
pub struct GtkColorScheme {
    settings: gtk4::Settings,
    next_id: Cell<u64>,
    handlers: RefCell<HashMap<SubscriptionId, Vec<SignalHandlerId>>>,
}

impl GtkColorScheme {
    /// Returns `None` when GTK cannot initialise (no display).
    pub fn connect() -> Option<Self> {
        if let Err(err) = gtk4::init() {
            tracing::warn!(%err, "gtk unavailable; system color scheme not tracked");
            return None;
        }
        let settings = gtk4::Settings::default()?;
        Some(Self {
            settings,
            next_id: Cell::new(0),
            handlers: RefCell::new(HashMap::new()),
        })
    }

    pub fn root_marker(&self) -> GtkRootMarker {
        GtkRootMarker {
            settings: self.settings.clone(),
        }
    }
}

impl ColorSchemeSource for GtkColorScheme {
    fn prefers_dark(&self) -> bool {
        system_prefers_dark(&self.settings)
    }

    fn subscribe(&self, on_change: Box<dyn Fn(bool)>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let on_change: Rc<dyn Fn(bool)> = Rc::from(on_change);
        let handlers = watched_properties(&self.settings)
            .into_iter()
            .map(|property| {
                let on_change = Rc::clone(&on_change);
                self.settings
                    .connect_notify_local(Some(property), move |settings, _| {
                        on_change(system_prefers_dark(settings));
                    })
            })
            .collect();
        self.handlers.borrow_mut().insert(id, handlers);
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let Some(handlers) = self.handlers.borrow_mut().remove(&id) else {
            return;
        };
        for handler in handlers {
            self.settings.disconnect(handler);
        }
    }
}

impl Drop for GtkColorScheme {
    fn drop(&mut self) {
        for (_, handlers) in self.handlers.get_mut().drain() {
            for handler in handlers {
                self.settings.disconnect(handler);
            }
        }
    }
}

/// Marks the application as dark through the GTK prefer-dark flag.
pub struct GtkRootMarker {
    settings: gtk4::Settings,
}

impl RootMarker for GtkRootMarker {
    fn apply(&self, is_dark: bool) {
        #[allow(deprecated)]
        self.settings.set_gtk_application_prefer_dark_theme(is_dark);
    }
}

fn has_property(settings: &gtk4::Settings, name: &str) -> bool {
    settings
        .list_properties()
        .iter()
        .any(|prop| prop.name() == name)
}

fn watched_properties(settings: &gtk4::Settings) -> Vec<&'static str> {
    let mut properties = vec![THEME_NAME_PROPERTY];
    if has_property(settings, COLOR_SCHEME_PROPERTY) {
        properties.push(COLOR_SCHEME_PROPERTY);
    }
    properties
}

// The prefer-dark flag is written by `GtkRootMarker`, so it is not read back here.
fn system_prefers_dark(settings: &gtk4::Settings) -> bool {
    if has_property(settings, COLOR_SCHEME_PROPERTY) {
        let color_scheme = settings.property_value(COLOR_SCHEME_PROPERTY);
        if let Ok(raw_scheme) = color_scheme.get::<i32>() {
            match raw_scheme {
                COLOR_SCHEME_DARK => return true,
                COLOR_SCHEME_LIGHT => return false,
                _ => {}
            }
        }
    }

    settings
        .gtk_theme_name()
        .and_then(|name| dark_from_theme_name(name.as_str()))
        .unwrap_or(false)
}

fn dark_from_theme_name(theme_name: &str) -> Option<bool> {
    let normalized = theme_name.trim().to_ascii_lowercase();
    if normalized.is_empty() {
        return None;
    }
    if normalized.contains("dark") {
        return Some(true);
    }
    if normalized.contains("light") {
        return Some(false);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::dark_from_theme_name;

    #[test]
    fn theme_name_hints_resolve_dark_and_light() {
        assert_eq!(dark_from_theme_name("Adwaita-dark"), Some(true));
        assert_eq!(dark_from_theme_name(" Breeze-Light "), Some(false));
        assert_eq!(dark_from_theme_name("Adwaita"), None);
        assert_eq!(dark_from_theme_name(""), None);
    }
}
