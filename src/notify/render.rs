//! Toast presentation: the renderer seam and the HTML the browser container
//! would receive.

use super::{Notification, NotificationConfig, NotificationId, NotificationKind, Phase, Position};
use tracing::{debug, error, info, warn};

/// Id of the element that holds every toast.
pub const CONTAINER_ID: &str = "multibpo-notifications";

pub trait ToastRenderer: Send + Sync {
    fn mount(&self, notification: &Notification, config: &NotificationConfig);

    /// Called on every phase change of a mounted toast.
    fn update(&self, notification: &Notification);

    fn unmount(&self, id: NotificationId);
}

/// Writes toasts to the tracing log, which is where a terminal shows them.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogRenderer;

impl ToastRenderer for LogRenderer {
    fn mount(&self, notification: &Notification, _config: &NotificationConfig) {
        let title = notification.title.as_deref().unwrap_or_default();
        match notification.kind {
            NotificationKind::Error => {
                error!(id = %notification.id, title, "{}", notification.message);
            }
            NotificationKind::Warning => {
                warn!(id = %notification.id, title, "{}", notification.message);
            }
            NotificationKind::Success | NotificationKind::Info | NotificationKind::Loading => {
                info!(id = %notification.id, title, kind = notification.kind.as_str(), "{}", notification.message);
            }
        }
    }

    fn update(&self, notification: &Notification) {
        debug!(id = %notification.id, phase = ?notification.phase, "toast updated");
    }

    fn unmount(&self, id: NotificationId) {
        debug!(%id, "toast removed");
    }
}

#[must_use]
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[must_use]
pub const fn position_classes(position: Position) -> &'static str {
    match position {
        Position::TopRight => "fixed top-4 right-4",
        Position::TopLeft => "fixed top-4 left-4",
        Position::TopCenter => "fixed top-4 left-1/2 -translate-x-1/2",
        Position::BottomRight => "fixed bottom-4 right-4",
        Position::BottomLeft => "fixed bottom-4 left-4",
        Position::BottomCenter => "fixed bottom-4 left-1/2 -translate-x-1/2",
    }
}

#[must_use]
pub fn container_markup(position: Position) -> String {
    format!(
        r#"<div id="{CONTAINER_ID}" class="{} z-50 flex flex-col gap-2"></div>"#,
        position_classes(position)
    )
}

const fn phase_classes(phase: Phase) -> &'static str {
    match phase {
        Phase::Entering => "opacity-0 translate-x-full",
        Phase::Visible | Phase::Paused => "opacity-100 translate-x-0",
        Phase::Exiting => "opacity-0 translate-x-full",
    }
}

/// Markup of one toast. Message and title are escaped.
#[must_use]
pub fn toast_markup(notification: &Notification, config: &NotificationConfig) -> String {
    let kind = notification.kind;
    let title = notification
        .title
        .as_deref()
        .map(|title| format!(r#"<p class="font-semibold">{}</p>"#, escape_html(title)))
        .unwrap_or_default();

    let progress = if config.show_progress && !notification.is_persistent() {
        format!(
            r#"<div class="notification-progress h-1 {}" style="animation-duration: {}ms"></div>"#,
            kind.accent_class(),
            notification.duration.as_millis()
        )
    } else {
        String::new()
    };

    format!(
        concat!(
            r#"<div id="{id}" class="notification notification-{kind} {colors} {phase} "#,
            r#"transition-all duration-{anim}" role="alert">"#,
            r#"<span class="notification-icon">{icon}</span>"#,
            r#"<div class="notification-body">{title}<p>{message}</p></div>"#,
            r#"<button class="notification-close" aria-label="Fechar">&times;</button>"#,
            "{progress}</div>"
        ),
        id = notification.id,
        kind = kind.as_str(),
        colors = kind.color_classes(),
        phase = phase_classes(notification.phase),
        anim = config.animation_duration.as_millis(),
        icon = kind.icon(),
        title = title,
        message = escape_html(&notification.message),
        progress = progress,
    )
}
