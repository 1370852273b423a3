use crate::notify::{Notification, NotificationConfig, NotificationId, NotificationKind, ToastRenderer};
use tracing::debug;

/// Prints toasts to stderr so they do not mix with command output.
#[derive(Clone, Copy, Debug, Default)]
pub struct TerminalRenderer;

#[must_use]
pub fn toast_line(notification: &Notification) -> String {
    match notification.title.as_deref() {
        Some(title) => format!(
            "{} {}: {}",
            notification.kind.icon(),
            title,
            notification.message
        ),
        None => format!("{} {}", notification.kind.icon(), notification.message),
    }
}

impl ToastRenderer for TerminalRenderer {
    fn mount(&self, notification: &Notification, _config: &NotificationConfig) {
        if notification.kind == NotificationKind::Loading {
            debug!("{}", notification.message);
        } else {
            eprintln!("{}", toast_line(notification));
        }
    }

    fn update(&self, _notification: &Notification) {}

    fn unmount(&self, _id: NotificationId) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Phase;
    use std::time::Duration;

    #[test]
    fn line_includes_title_when_present() {
        let mut notification = Notification {
            id: NotificationId(1),
            message: "Verifique sua conexão.".to_string(),
            kind: NotificationKind::Error,
            title: Some("Erro de Conexão".to_string()),
            duration: Duration::from_secs(5),
            persistent: false,
            phase: Phase::Visible,
        };
        assert_eq!(
            toast_line(&notification),
            "✕ Erro de Conexão: Verifique sua conexão."
        );

        notification.title = None;
        notification.kind = NotificationKind::Success;
        assert_eq!(toast_line(&notification), "✓ Verifique sua conexão.");
    }
}
