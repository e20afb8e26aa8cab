use std::path::{Path, PathBuf};

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConfigPathError {
    MissingHomeDirectory,
}

pub(crate) const APP_DIR: &str = "campusdesk";
const APP_CONFIG_FILE: &str = "config.json";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

const API_URL_ENV: &str = "CAMPUSDESK_API_URL";
const TOKEN_ENV: &str = "CAMPUSDESK_TOKEN";

/// Application-level settings from `config.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    #[serde(default)]
    pub auth_token: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            auth_token: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: None,
        }
    }
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl AppConfig {
    fn apply_env_overrides(mut self, api_url: Option<String>, token: Option<String>) -> Self {
        if let Some(url) = api_url.filter(|value| !value.trim().is_empty()) {
            self.api_base_url = url;
        }
        if let Some(token) = token.filter(|value| !value.trim().is_empty()) {
            self.auth_token = Some(token);
        }
        self
    }
}

pub fn load_app_config() -> AppConfig {
    let (xdg_config_home, home) = config_env_dirs();
    load_app_config_with(xdg_config_home.as_deref(), home.as_deref()).apply_env_overrides(
        std::env::var(API_URL_ENV).ok(),
        std::env::var(TOKEN_ENV).ok(),
    )
}

fn load_app_config_with(xdg_config_home: Option<&Path>, home: Option<&Path>) -> AppConfig {
    let path = match app_config_path(APP_DIR, APP_CONFIG_FILE, xdg_config_home, home) {
        Ok(p) => p,
        Err(_) => return AppConfig::default(),
    };
    if !path.exists() {
        return AppConfig::default();
    }
    match std::fs::read_to_string(&path) {
        Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(?err, ?path, "failed to parse config.json; using defaults");
            AppConfig::default()
        }),
        Err(err) => {
            tracing::warn!(?err, ?path, "failed to read config.json; using defaults");
            AppConfig::default()
        }
    }
}

pub(crate) fn config_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn data_env_dirs() -> (Option<PathBuf>, Option<PathBuf>) {
    (
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )
}

pub(crate) fn app_config_path(
    app_dir: &str,
    file_name: &str,
    xdg_config_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_config_home, home, ".config")?;
    path.push(app_dir);
    path.push(file_name);
    Ok(path)
}

/// Directory holding the durable key-value store.
pub(crate) fn app_data_dir(
    app_dir: &str,
    xdg_data_home: Option<&Path>,
    home: Option<&Path>,
) -> Result<PathBuf, ConfigPathError> {
    let mut path = xdg_root(xdg_data_home, home, ".local/share")?;
    path.push(app_dir);
    Ok(path)
}

fn xdg_root(
    xdg_home: Option<&Path>,
    home: Option<&Path>,
    home_fallback: &str,
) -> Result<PathBuf, ConfigPathError> {
    if let Some(xdg) = xdg_home.filter(|path| !path.as_os_str().is_empty()) {
        return Ok(xdg.to_path_buf());
    }

    let home = home.ok_or(ConfigPathError::MissingHomeDirectory)?;
    Ok(home.join(home_fallback))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_temp_root<F: FnOnce(&Path)>(f: F) {
        let mut root = std::env::temp_dir();
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        root.push(format!("campusdesk-config-{}-{nanos}", std::process::id()));
        std::fs::create_dir_all(&root).unwrap();
        f(&root);
        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn app_config_path_prefers_xdg_config_home() {
        let path = app_config_path(
            "campusdesk",
            "config.json",
            Some(Path::new("/tmp/config-root")),
            Some(Path::new("/tmp/home")),
        )
        .expect("path should resolve");

        assert_eq!(
            path,
            PathBuf::from("/tmp/config-root/campusdesk/config.json")
        );
    }

    #[test]
    fn app_config_path_falls_back_to_home_dot_config() {
        let path = app_config_path("campusdesk", "config.json", None, Some(Path::new("/tmp/home")))
            .expect("path should resolve");

        assert_eq!(path, PathBuf::from("/tmp/home/.config/campusdesk/config.json"));
    }

    #[test]
    fn app_config_path_errors_when_home_missing_and_xdg_unset() {
        let error = app_config_path("campusdesk", "config.json", None, None).unwrap_err();
        assert_eq!(error, ConfigPathError::MissingHomeDirectory);
    }

    #[test]
    fn app_data_dir_falls_back_to_local_share() {
        let path = app_data_dir("campusdesk", Some(Path::new("")), Some(Path::new("/tmp/home")))
            .expect("path should resolve");
        assert_eq!(path, PathBuf::from("/tmp/home/.local/share/campusdesk"));
    }

    #[test]
    fn missing_config_file_yields_defaults() {
        with_temp_root(|root| {
            let config = load_app_config_with(Some(root), None);
            assert_eq!(config.api_base_url, "http://localhost:8000");
            assert_eq!(config.request_timeout_secs, 10);
            assert!(config.auth_token.is_none());
            assert!(config.data_dir.is_none());
        });
    }

    #[test]
    fn partial_config_file_keeps_remaining_defaults() {
        with_temp_root(|root| {
            let dir = root.join("campusdesk");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(
                dir.join("config.json"),
                r#"{ "auth_token": "abc123", "request_timeout_secs": 3 }"#,
            )
            .unwrap();

            let config = load_app_config_with(Some(root), None);
            assert_eq!(config.auth_token.as_deref(), Some("abc123"));
            assert_eq!(config.request_timeout_secs, 3);
            assert_eq!(config.api_base_url, "http://localhost:8000");
        });
    }

    #[test]
    fn unparseable_config_file_yields_defaults() {
        with_temp_root(|root| {
            let dir = root.join("campusdesk");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("config.json"), "{ nope").unwrap();

            let config = load_app_config_with(Some(root), None);
            assert_eq!(config.api_base_url, "http://localhost:8000");
        });
    }

    #[test]
    fn env_overrides_replace_file_values_but_ignore_blank() {
        let config = AppConfig::default().apply_env_overrides(
            Some("https://school.example".to_string()),
            Some("   ".to_string()),
        );
        assert_eq!(config.api_base_url, "https://school.example");
        assert!(config.auth_token.is_none());
    }
}
