//! Transient user-visible notices.

const APP_NAME: &str = "Campus Desk";

pub trait Notifier {
    fn success(&self, message: &str);
    fn failure(&self, message: &str);
}

/// Desktop notification bubbles.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl Notifier for DesktopNotifier {
    fn success(&self, message: &str) {
        send(message);
    }

    fn failure(&self, message: &str) {
        tracing::warn!(notice = message, "failure notice");
        send(message);
    }
}

/// Notices written to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        tracing::info!(notice = message, "notice");
    }

    fn failure(&self, message: &str) {
        tracing::warn!(notice = message, "failure notice");
    }
}

pub fn send(body: impl Into<String>) {
    let body = body.into();
    if let Err(err) = notify_rust::Notification::new()
        .appname(APP_NAME)
        .summary(APP_NAME)
        .body(&body)
        .show()
    {
        tracing::warn!("system notification failed: {err}");
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Failure,
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: std::cell::RefCell<Vec<(NoticeLevel, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn count(&self, level: NoticeLevel) -> usize {
        self.notices
            .borrow()
            .iter()
            .filter(|(recorded, _)| *recorded == level)
            .count()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices
            .borrow()
            .iter()
            .map(|(_, message)| message.clone())
            .collect()
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.notices
            .borrow_mut()
            .push((NoticeLevel::Success, message.to_string()));
    }

    fn failure(&self, message: &str) {
        self.notices
            .borrow_mut()
            .push((NoticeLevel::Failure, message.to_string()));
    }
}
