//! User settings document, its hard-coded defaults, and validated edits.
//!
//! Remote documents are partial: they are merged onto the defaults one field
//! at a time, so a missing section or field always keeps its default.

use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::theme::ThemeMode;

pub mod sync;

pub use sync::{PushMode, SettingsBackend, SettingsSynchronizer};

pub const SESSION_TIMEOUT_MINUTES: RangeInclusive<u32> = 15..=480;
pub const PASSWORD_EXPIRY_DAYS: RangeInclusive<u32> = 30..=365;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("unknown settings section: {0}")]
    UnknownSection(String),
    #[error("unknown field {field} in section {section}")]
    UnknownField {
        section: SettingsSection,
        field: String,
    },
    #[error("invalid value for {section}.{field}: expected {expected}")]
    InvalidValue {
        section: SettingsSection,
        field: &'static str,
        expected: &'static str,
    },
    #[error("{section}.{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        section: SettingsSection,
        field: &'static str,
        value: u64,
        min: u32,
        max: u32,
    },
}

pub type SettingsResult<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    Notifications,
    Privacy,
    Appearance,
    Security,
}

impl SettingsSection {
    pub const ALL: [Self; 4] = [
        Self::Notifications,
        Self::Privacy,
        Self::Appearance,
        Self::Security,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Notifications => "notifications",
            Self::Privacy => "privacy",
            Self::Appearance => "appearance",
            Self::Security => "security",
        }
    }
}

impl fmt::Display for SettingsSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingsSection {
    type Err = SettingsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|section| section.as_str() == value)
            .ok_or_else(|| SettingsError::UnknownSection(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProfileVisibility {
    #[default]
    Public,
    Private,
    Friends,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "MM/DD/YYYY")]
    MonthDayYear,
    #[serde(rename = "DD/MM/YYYY")]
    DayMonthYear,
    #[serde(rename = "YYYY-MM-DD")]
    YearMonthDay,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationSettings {
    pub email_notifications: bool,
    pub push_notifications: bool,
    pub sms_notifications: bool,
    pub marketing_emails: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            email_notifications: true,
            push_notifications: true,
            sms_notifications: false,
            marketing_emails: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivacySettings {
    pub profile_visibility: ProfileVisibility,
    pub data_sharing: bool,
    pub analytics: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            profile_visibility: ProfileVisibility::Public,
            data_sharing: false,
            analytics: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceSettings {
    pub theme: ThemeMode,
    pub language: Language,
    pub timezone: String,
    pub date_format: DateFormat,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            theme: ThemeMode::System,
            language: Language::En,
            timezone: "UTC".to_string(),
            date_format: DateFormat::MonthDayYear,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecuritySettings {
    pub two_factor_auth: bool,
    pub session_timeout: u32,
    pub password_expiry: u32,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            two_factor_auth: false,
            session_timeout: 30,
            password_expiry: 90,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsDocument {
    pub notifications: NotificationSettings,
    pub privacy: PrivacySettings,
    pub appearance: AppearanceSettings,
    pub security: SecuritySettings,
}

/// A single validated edit to one settings field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    EmailNotifications(bool),
    PushNotifications(bool),
    SmsNotifications(bool),
    MarketingEmails(bool),
    ProfileVisibility(ProfileVisibility),
    DataSharing(bool),
    Analytics(bool),
    Theme(ThemeMode),
    Language(Language),
    Timezone(String),
    DateFormat(DateFormat),
    TwoFactorAuth(bool),
    SessionTimeout(u32),
    PasswordExpiry(u32),
}

impl SettingChange {
    /// Validates a wire-level `(section, field, value)` edit.
    pub fn parse(section: &str, field: &str, value: &Value) -> SettingsResult<Self> {
        let section: SettingsSection = section.parse()?;
        Self::parse_in(section, field, value)
    }

    fn parse_in(section: SettingsSection, field: &str, value: &Value) -> SettingsResult<Self> {
        use SettingsSection::*;

        let change = match (section, field) {
            (Notifications, "emailNotifications") => {
                Self::EmailNotifications(parse_bool(section, "emailNotifications", value)?)
            }
            (Notifications, "pushNotifications") => {
                Self::PushNotifications(parse_bool(section, "pushNotifications", value)?)
            }
            (Notifications, "smsNotifications") => {
                Self::SmsNotifications(parse_bool(section, "smsNotifications", value)?)
            }
            (Notifications, "marketingEmails") => {
                Self::MarketingEmails(parse_bool(section, "marketingEmails", value)?)
            }
            (Privacy, "profileVisibility") => Self::ProfileVisibility(parse_enum(
                section,
                "profileVisibility",
                "public, private or friends",
                value,
            )?),
            (Privacy, "dataSharing") => {
                Self::DataSharing(parse_bool(section, "dataSharing", value)?)
            }
            (Privacy, "analytics") => Self::Analytics(parse_bool(section, "analytics", value)?),
            (Appearance, "theme") => {
                Self::Theme(parse_enum(section, "theme", "light, dark or system", value)?)
            }
            (Appearance, "language") => {
                Self::Language(parse_enum(section, "language", "en, es, fr or de", value)?)
            }
            (Appearance, "timezone") => Self::Timezone(parse_timezone(section, value)?),
            (Appearance, "dateFormat") => Self::DateFormat(parse_enum(
                section,
                "dateFormat",
                "MM/DD/YYYY, DD/MM/YYYY or YYYY-MM-DD",
                value,
            )?),
            (Security, "twoFactorAuth") => {
                Self::TwoFactorAuth(parse_bool(section, "twoFactorAuth", value)?)
            }
            (Security, "sessionTimeout") => Self::SessionTimeout(parse_bounded(
                section,
                "sessionTimeout",
                &SESSION_TIMEOUT_MINUTES,
                value,
            )?),
            (Security, "passwordExpiry") => Self::PasswordExpiry(parse_bounded(
                section,
                "passwordExpiry",
                &PASSWORD_EXPIRY_DAYS,
                value,
            )?),
            _ => {
                return Err(SettingsError::UnknownField {
                    section,
                    field: field.to_string(),
                })
            }
        };
        Ok(change)
    }
}

impl SettingsDocument {
    pub fn apply(&mut self, change: SettingChange) {
        match change {
            SettingChange::EmailNotifications(v) => self.notifications.email_notifications = v,
            SettingChange::PushNotifications(v) => self.notifications.push_notifications = v,
            SettingChange::SmsNotifications(v) => self.notifications.sms_notifications = v,
            SettingChange::MarketingEmails(v) => self.notifications.marketing_emails = v,
            SettingChange::ProfileVisibility(v) => self.privacy.profile_visibility = v,
            SettingChange::DataSharing(v) => self.privacy.data_sharing = v,
            SettingChange::Analytics(v) => self.privacy.analytics = v,
            SettingChange::Theme(v) => self.appearance.theme = v,
            SettingChange::Language(v) => self.appearance.language = v,
            SettingChange::Timezone(v) => self.appearance.timezone = v,
            SettingChange::DateFormat(v) => self.appearance.date_format = v,
            SettingChange::TwoFactorAuth(v) => self.security.two_factor_auth = v,
            SettingChange::SessionTimeout(v) => self.security.session_timeout = v,
            SettingChange::PasswordExpiry(v) => self.security.password_expiry = v,
        }
    }

    /// Merges a partial remote document onto the defaults, field by field.
    pub fn from_partial(remote: &Value) -> Self {
        let mut document = Self::default();
        document.merge_partial(remote);
        document
    }

    /// Overlays every recognised, valid field of `remote`.
    ///
    /// Invalid fields keep their current value; unknown sections and fields
    /// are ignored.
    pub fn merge_partial(&mut self, remote: &Value) {
        let Some(sections) = remote.as_object() else {
            if !remote.is_null() {
                tracing::warn!("ignoring non-object settings document");
            }
            return;
        };

        for section in SettingsSection::ALL {
            let Some(fields) = sections.get(section.as_str()) else {
                continue;
            };
            let Some(fields) = fields.as_object() else {
                tracing::warn!(%section, "ignoring non-object settings section");
                continue;
            };
            for (field, value) in fields {
                match SettingChange::parse_in(section, field, value) {
                    Ok(change) => self.apply(change),
                    Err(SettingsError::UnknownField { .. }) => {
                        tracing::debug!(%section, %field, "ignoring unknown settings field");
                    }
                    Err(err) => {
                        tracing::warn!(%err, "ignoring invalid remote settings value");
                    }
                }
            }
        }
    }
}

fn parse_bool(section: SettingsSection, field: &'static str, value: &Value) -> SettingsResult<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::String(raw) if raw == "true" => Ok(true),
        Value::String(raw) if raw == "false" => Ok(false),
        _ => Err(SettingsError::InvalidValue {
            section,
            field,
            expected: "a boolean",
        }),
    }
}

fn parse_enum<T: serde::de::DeserializeOwned>(
    section: SettingsSection,
    field: &'static str,
    expected: &'static str,
    value: &Value,
) -> SettingsResult<T> {
    T::deserialize(value).map_err(|_| SettingsError::InvalidValue {
        section,
        field,
        expected,
    })
}

fn parse_bounded(
    section: SettingsSection,
    field: &'static str,
    bounds: &RangeInclusive<u32>,
    value: &Value,
) -> SettingsResult<u32> {
    let raw = match value {
        Value::Number(number) => number.as_u64(),
        Value::String(raw) => raw.trim().parse::<u64>().ok(),
        _ => None,
    }
    .ok_or(SettingsError::InvalidValue {
        section,
        field,
        expected: "a whole number",
    })?;

    u32::try_from(raw)
        .ok()
        .filter(|minutes| bounds.contains(minutes))
        .ok_or(SettingsError::OutOfRange {
            section,
            field,
            value: raw,
            min: *bounds.start(),
            max: *bounds.end(),
        })
}

fn parse_timezone(section: SettingsSection, value: &Value) -> SettingsResult<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|zone| !zone.is_empty())
        .map(str::to_string)
        .ok_or(SettingsError::InvalidValue {
            section,
            field: "timezone",
            expected: "a non-empty timezone name",
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_match_dashboard_defaults() {
        let document = SettingsDocument::default();
        assert_eq!(
            serde_json::to_value(&document).unwrap(),
            json!({
                "notifications": {
                    "emailNotifications": true,
                    "pushNotifications": true,
                    "smsNotifications": false,
                    "marketingEmails": false
                },
                "privacy": {
                    "profileVisibility": "public",
                    "dataSharing": false,
                    "analytics": true
                },
                "appearance": {
                    "theme": "system",
                    "language": "en",
                    "timezone": "UTC",
                    "dateFormat": "MM/DD/YYYY"
                },
                "security": {
                    "twoFactorAuth": false,
                    "sessionTimeout": 30,
                    "passwordExpiry": 90
                }
            })
        );
    }

    #[test]
    fn partial_theme_only_document_keeps_other_defaults() {
        let merged = SettingsDocument::from_partial(&json!({ "appearance": { "theme": "dark" } }));

        let mut expected = SettingsDocument::default();
        expected.appearance.theme = ThemeMode::Dark;
        assert_eq!(merged, expected);
    }

    #[test]
    fn merge_is_field_by_field_not_section_replace() {
        let merged = SettingsDocument::from_partial(&json!({
            "notifications": { "smsNotifications": true },
            "security": { "sessionTimeout": 120, "passwordExpiry": "180" }
        }));

        assert!(merged.notifications.sms_notifications);
        assert!(merged.notifications.email_notifications);
        assert!(merged.notifications.push_notifications);
        assert_eq!(merged.security.session_timeout, 120);
        assert_eq!(merged.security.password_expiry, 180);
        assert!(!merged.security.two_factor_auth);
    }

    #[test]
    fn invalid_and_unknown_remote_values_keep_defaults() {
        let merged = SettingsDocument::from_partial(&json!({
            "appearance": { "theme": "sepia", "language": "fr", "fontSize": 14 },
            "security": { "sessionTimeout": 5 },
            "privacy": "locked",
            "profile": { "phone": "555" }
        }));

        let mut expected = SettingsDocument::default();
        expected.appearance.language = Language::Fr;
        assert_eq!(merged, expected);
    }

    #[test]
    fn null_or_non_object_remote_yields_defaults() {
        assert_eq!(
            SettingsDocument::from_partial(&Value::Null),
            SettingsDocument::default()
        );
        assert_eq!(
            SettingsDocument::from_partial(&json!([1, 2, 3])),
            SettingsDocument::default()
        );
    }

    #[test]
    fn parse_accepts_wire_values() {
        assert_eq!(
            SettingChange::parse("security", "sessionTimeout", &json!(60)),
            Ok(SettingChange::SessionTimeout(60))
        );
        assert_eq!(
            SettingChange::parse("appearance", "dateFormat", &json!("YYYY-MM-DD")),
            Ok(SettingChange::DateFormat(DateFormat::YearMonthDay))
        );
        assert_eq!(
            SettingChange::parse("privacy", "profileVisibility", &json!("friends")),
            Ok(SettingChange::ProfileVisibility(ProfileVisibility::Friends))
        );
        assert_eq!(
            SettingChange::parse("appearance", "timezone", &json!(" Europe/Oslo ")),
            Ok(SettingChange::Timezone("Europe/Oslo".to_string()))
        );
        assert_eq!(
            SettingChange::parse("notifications", "marketingEmails", &json!("true")),
            Ok(SettingChange::MarketingEmails(true))
        );
    }

    #[test]
    fn parse_rejects_invalid_edits() {
        assert_eq!(
            SettingChange::parse("billing", "plan", &json!("pro")),
            Err(SettingsError::UnknownSection("billing".to_string()))
        );
        assert!(matches!(
            SettingChange::parse("security", "pin", &json!(1234)),
            Err(SettingsError::UnknownField { .. })
        ));
        assert!(matches!(
            SettingChange::parse("security", "sessionTimeout", &json!(1000)),
            Err(SettingsError::OutOfRange { value: 1000, min: 15, max: 480, .. })
        ));
        assert!(matches!(
            SettingChange::parse("security", "passwordExpiry", &json!(-5)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SettingChange::parse("appearance", "theme", &json!(true)),
            Err(SettingsError::InvalidValue { .. })
        ));
        assert!(matches!(
            SettingChange::parse("appearance", "timezone", &json!("  ")),
            Err(SettingsError::InvalidValue { .. })
        ));
    }

    #[test]
    fn apply_updates_only_the_named_field() {
        let mut document = SettingsDocument::default();
        document.apply(SettingChange::TwoFactorAuth(true));
        document.apply(SettingChange::Language(Language::De));

        let mut expected = SettingsDocument::default();
        expected.security.two_factor_auth = true;
        expected.appearance.language = Language::De;
        assert_eq!(document, expected);
    }
}
