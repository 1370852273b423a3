//! Toast notification center.
//!
//! Each toast moves through `Entering -> Visible -> (Paused) -> Exiting` and
//! is then removed. Timers are Tokio tasks holding a weak handle on the
//! center, so dropping the last [`NotificationCenter`] clone cancels them.

mod render;

pub use self::render::{
    container_markup, escape_html, position_classes, toast_markup, LogRenderer, ToastRenderer,
    CONTAINER_ID,
};

use std::{
    collections::BTreeMap,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
    time::Duration,
};
use tokio::{
    runtime::Handle,
    task::JoinHandle,
    time::{sleep, Instant},
};
use tracing::debug;

const ERROR_DURATION: Duration = Duration::from_millis(7_000);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "notification_{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
    Loading,
}

impl NotificationKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Loading => "loading",
        }
    }

    #[must_use]
    pub const fn icon(self) -> &'static str {
        match self {
            Self::Success => "✓",
            Self::Error => "✕",
            Self::Warning => "⚠",
            Self::Info => "ℹ",
            Self::Loading => "⟳",
        }
    }

    #[must_use]
    pub const fn color_classes(self) -> &'static str {
        match self {
            Self::Success => "bg-green-50 border-green-500 text-green-800",
            Self::Error => "bg-red-50 border-red-500 text-red-800",
            Self::Warning => "bg-yellow-50 border-yellow-500 text-yellow-800",
            Self::Info => "bg-blue-50 border-blue-500 text-blue-800",
            Self::Loading => "bg-gray-50 border-gray-400 text-gray-800",
        }
    }

    #[must_use]
    pub const fn accent_class(self) -> &'static str {
        match self {
            Self::Success => "bg-green-500",
            Self::Error => "bg-red-500",
            Self::Warning => "bg-yellow-500",
            Self::Info => "bg-blue-500",
            Self::Loading => "bg-gray-400",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Position {
    #[default]
    TopRight,
    TopLeft,
    TopCenter,
    BottomRight,
    BottomLeft,
    BottomCenter,
}

impl Position {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TopRight => "top-right",
            Self::TopLeft => "top-left",
            Self::TopCenter => "top-center",
            Self::BottomRight => "bottom-right",
            Self::BottomLeft => "bottom-left",
            Self::BottomCenter => "bottom-center",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Entering,
    Visible,
    Paused,
    Exiting,
}

#[derive(Clone, Debug)]
pub struct NotificationConfig {
    pub duration: Duration,
    pub max_notifications: usize,
    pub animation_duration: Duration,
    pub pause_on_hover: bool,
    pub show_progress: bool,
    pub position: Position,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_millis(5_000),
            max_notifications: 5,
            animation_duration: Duration::from_millis(300),
            pause_on_hover: true,
            show_progress: true,
            position: Position::TopRight,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ShowOptions {
    pub title: Option<String>,
    /// Falls back to the configured duration. Zero means persistent.
    pub duration: Option<Duration>,
    pub persistent: bool,
}

impl ShowOptions {
    #[must_use]
    pub fn duration(duration: Duration) -> Self {
        Self {
            duration: Some(duration),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn titled(title: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub message: String,
    pub kind: NotificationKind,
    pub title: Option<String>,
    pub duration: Duration,
    pub persistent: bool,
    pub phase: Phase,
}

impl Notification {
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent || self.duration.is_zero()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationStats {
    pub active: usize,
    pub max: usize,
    pub position: Position,
    pub total_shown: u64,
}

struct Entry {
    notification: Notification,
    timer: Option<JoinHandle<()>>,
    /// Countdown left when the timer was last armed.
    remaining: Duration,
    armed_at: Instant,
    /// Bumped on every re-arm so a stale timer cannot dismiss.
    generation: u64,
}

impl Entry {
    fn stop_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

struct State {
    config: NotificationConfig,
    entries: BTreeMap<NotificationId, Entry>,
    next_id: u64,
    total_shown: u64,
}

impl State {
    fn active_count(&self) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.notification.phase != Phase::Exiting)
            .count()
    }

    fn oldest_active(&self) -> Option<NotificationId> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.notification.phase != Phase::Exiting)
            .map(|(id, _)| *id)
    }
}

struct Inner {
    state: Mutex<State>,
    renderer: Arc<dyn ToastRenderer>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        for entry in state.entries.values_mut() {
            entry.stop_timer();
        }
    }
}

#[derive(Clone)]
pub struct NotificationCenter {
    inner: Arc<Inner>,
}

impl NotificationCenter {
    #[must_use]
    pub fn new(config: NotificationConfig, renderer: Arc<dyn ToastRenderer>) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(State {
                    config,
                    entries: BTreeMap::new(),
                    next_id: 0,
                    total_shown: 0,
                }),
                renderer,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn weak(&self) -> Weak<Inner> {
        Arc::downgrade(&self.inner)
    }

    fn upgrade(weak: &Weak<Inner>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }

    /// Shows a toast. When the stack is full the oldest visible toast is
    /// removed first.
    pub fn show(&self, message: &str, kind: NotificationKind, options: ShowOptions) -> NotificationId {
        let (evicted, notification, config) = {
            let mut state = self.state();

            let mut evicted = Vec::new();
            while state.active_count() >= state.config.max_notifications.max(1) {
                let Some(oldest) = state.oldest_active() else {
                    break;
                };
                if let Some(mut entry) = state.entries.remove(&oldest) {
                    entry.stop_timer();
                }
                evicted.push(oldest);
            }

            state.next_id += 1;
            state.total_shown += 1;
            let id = NotificationId(state.next_id);

            let duration = match (kind, options.duration) {
                (NotificationKind::Loading, None) => Duration::ZERO,
                (_, Some(duration)) => duration,
                (_, None) => state.config.duration,
            };
            let notification = Notification {
                id,
                message: message.to_string(),
                kind,
                title: options.title,
                duration,
                persistent: options.persistent || kind == NotificationKind::Loading,
                phase: Phase::Entering,
            };

            state.entries.insert(
                id,
                Entry {
                    notification: notification.clone(),
                    timer: None,
                    remaining: duration,
                    armed_at: Instant::now(),
                    generation: 0,
                },
            );
            (evicted, notification, state.config.clone())
        };

        for id in evicted {
            debug!(%id, "toast evicted, stack full");
            self.inner.renderer.unmount(id);
        }

        let id = notification.id;
        self.inner.renderer.mount(&notification, &config);
        self.set_phase(id, Phase::Visible);

        if !notification.is_persistent() {
            self.arm_timer(id);
        }
        id
    }

    pub fn success(&self, message: &str, options: ShowOptions) -> NotificationId {
        self.show(message, NotificationKind::Success, options)
    }

    /// Errors stay longer than the default unless a duration is given.
    pub fn error(&self, message: &str, mut options: ShowOptions) -> NotificationId {
        options.duration = options.duration.or(Some(ERROR_DURATION));
        self.show(message, NotificationKind::Error, options)
    }

    pub fn warning(&self, message: &str, options: ShowOptions) -> NotificationId {
        self.show(message, NotificationKind::Warning, options)
    }

    pub fn info(&self, message: &str, options: ShowOptions) -> NotificationId {
        self.show(message, NotificationKind::Info, options)
    }

    /// A persistent toast for in-flight work; dismiss it explicitly.
    pub fn loading(&self, message: &str) -> NotificationId {
        self.show(message, NotificationKind::Loading, ShowOptions::default())
    }

    fn set_phase(&self, id: NotificationId, phase: Phase) -> Option<Notification> {
        let notification = {
            let mut state = self.state();
            let entry = state.entries.get_mut(&id)?;
            entry.notification.phase = phase;
            entry.notification.clone()
        };
        self.inner.renderer.update(&notification);
        Some(notification)
    }

    /// Starts the countdown with whatever time is left. Needs a Tokio runtime;
    /// without one the toast simply stays until dismissed.
    fn arm_timer(&self, id: NotificationId) {
        let Ok(handle) = Handle::try_current() else {
            debug!(%id, "no runtime, toast will not auto-dismiss");
            return;
        };

        let mut state = self.state();
        let Some(entry) = state.entries.get_mut(&id) else {
            return;
        };

        entry.stop_timer();
        entry.generation += 1;
        entry.armed_at = Instant::now();

        let generation = entry.generation;
        let remaining = entry.remaining;
        let weak = self.weak();
        entry.timer = Some(handle.spawn(async move {
            sleep(remaining).await;
            if let Some(center) = Self::upgrade(&weak) {
                center.expire(id, generation);
            }
        }));
    }

    fn expire(&self, id: NotificationId, generation: u64) {
        let current = {
            let mut state = self.state();
            match state.entries.get_mut(&id) {
                Some(entry)
                    if entry.generation == generation
                        && entry.notification.phase == Phase::Visible =>
                {
                    // This task is the timer; drop the handle without aborting.
                    entry.timer = None;
                    true
                }
                _ => false,
            }
        };
        if current {
            self.dismiss(id);
        }
    }

    /// Plays the exit animation, then removes the toast. Returns `false` for
    /// unknown ids.
    pub fn dismiss(&self, id: NotificationId) -> bool {
        let animation = {
            let mut state = self.state();
            let animation = state.config.animation_duration;
            let Some(entry) = state.entries.get_mut(&id) else {
                return false;
            };
            if entry.notification.phase == Phase::Exiting {
                return true;
            }
            entry.stop_timer();
            animation
        };

        self.set_phase(id, Phase::Exiting);

        match Handle::try_current() {
            Ok(handle) if !animation.is_zero() => {
                let weak = self.weak();
                handle.spawn(async move {
                    sleep(animation).await;
                    if let Some(center) = Self::upgrade(&weak) {
                        center.dismiss_now(id);
                    }
                });
            }
            _ => {
                self.dismiss_now(id);
            }
        }
        true
    }

    /// Removes a toast immediately, skipping the exit animation.
    pub fn dismiss_now(&self, id: NotificationId) -> bool {
        let Some(mut entry) = self.state().entries.remove(&id) else {
            return false;
        };
        entry.stop_timer();
        self.inner.renderer.unmount(id);
        true
    }

    /// Removes every toast at once.
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.state().entries);
        for (id, mut entry) in entries {
            entry.stop_timer();
            self.inner.renderer.unmount(id);
        }
    }

    /// Pointer entered the toast: freeze the countdown.
    pub fn hover_start(&self, id: NotificationId) -> bool {
        let notification = {
            let mut state = self.state();
            if !state.config.pause_on_hover {
                return false;
            }
            let Some(entry) = state.entries.get_mut(&id) else {
                return false;
            };
            if entry.notification.phase != Phase::Visible || entry.notification.is_persistent() {
                return false;
            }

            entry.stop_timer();
            entry.generation += 1;
            entry.remaining = entry.remaining.saturating_sub(entry.armed_at.elapsed());
            entry.notification.phase = Phase::Paused;
            entry.notification.clone()
        };
        self.inner.renderer.update(&notification);
        true
    }

    /// Pointer left the toast: resume with the time that was left.
    pub fn hover_end(&self, id: NotificationId) -> bool {
        let remaining = {
            let state = self.state();
            match state.entries.get(&id) {
                Some(entry) if entry.notification.phase == Phase::Paused => entry.remaining,
                _ => return false,
            }
        };

        self.set_phase(id, Phase::Visible);
        if remaining.is_zero() {
            self.dismiss(id);
        } else {
            self.arm_timer(id);
        }
        true
    }

    #[must_use]
    pub fn get(&self, id: NotificationId) -> Option<Notification> {
        self.state()
            .entries
            .get(&id)
            .map(|entry| entry.notification.clone())
    }

    /// Every toast still on screen, oldest first, including exiting ones.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.state()
            .entries
            .values()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.state().active_count()
    }

    #[must_use]
    pub fn stats(&self) -> NotificationStats {
        let state = self.state();
        NotificationStats {
            active: state.active_count(),
            max: state.config.max_notifications,
            position: state.config.position,
            total_shown: state.total_shown,
        }
    }

    #[must_use]
    pub fn config(&self) -> NotificationConfig {
        self.state().config.clone()
    }

    pub fn update_config(&self, update: impl FnOnce(&mut NotificationConfig)) {
        update(&mut self.state().config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Recorder {
        fn events(&self) -> Vec<String> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        fn push(&self, event: String) {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(event);
        }
    }

    impl ToastRenderer for Recorder {
        fn mount(&self, notification: &Notification, _config: &NotificationConfig) {
            self.push(format!("mount {}", notification.id));
        }

        fn update(&self, notification: &Notification) {
            self.push(format!("{:?} {}", notification.phase, notification.id));
        }

        fn unmount(&self, id: NotificationId) {
            self.push(format!("unmount {id}"));
        }
    }

    fn center(max: usize) -> (Arc<Recorder>, NotificationCenter) {
        let recorder = Arc::new(Recorder::default());
        let config = NotificationConfig {
            max_notifications: max,
            ..NotificationConfig::default()
        };
        (recorder.clone(), NotificationCenter::new(config, recorder))
    }

    fn ms(millis: u64) -> Duration {
        Duration::from_millis(millis)
    }

    #[test]
    fn capacity_evicts_oldest_first() {
        let (recorder, center) = center(3);
        let ids: Vec<_> = (0..4)
            .map(|n| center.info(&format!("msg {n}"), ShowOptions::default()))
            .collect();

        assert_eq!(center.active_count(), 3);
        assert!(center.get(ids[0]).is_none());
        for id in &ids[1..] {
            assert!(center.get(*id).is_some());
        }
        assert!(recorder.events().contains(&format!("unmount {}", ids[0])));
        assert_eq!(center.stats().total_shown, 4);
    }

    #[test]
    fn toasts_become_visible_after_mount() {
        let (recorder, center) = center(5);
        let id = center.success("ok", ShowOptions::default());

        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Visible));
        assert_eq!(
            recorder.events(),
            vec![format!("mount {id}"), format!("Visible {id}")]
        );
    }

    #[test]
    fn loading_and_zero_duration_are_persistent() {
        let (_, center) = center(5);
        let loading = center.loading("Carregando...");
        let pinned = center.info("fixo", ShowOptions::duration(Duration::ZERO));

        assert!(center.get(loading).is_some_and(|n| n.is_persistent()));
        assert!(center.get(pinned).is_some_and(|n| n.is_persistent()));
    }

    #[test]
    fn error_uses_longer_default() {
        let (_, center) = center(5);
        let id = center.error("falhou", ShowOptions::default());
        assert_eq!(center.get(id).map(|n| n.duration), Some(ERROR_DURATION));

        let custom = center.error("falhou", ShowOptions::duration(ms(1_000)));
        assert_eq!(center.get(custom).map(|n| n.duration), Some(ms(1_000)));
    }

    #[test]
    fn dismiss_without_runtime_removes_immediately() {
        let (_, center) = center(5);
        let id = center.info("x", ShowOptions::default());

        assert!(center.dismiss(id));
        assert!(center.get(id).is_none());
        assert!(!center.dismiss(id));
        assert!(!center.dismiss_now(id));
    }

    #[test]
    fn clear_removes_everything() {
        let (recorder, center) = center(5);
        center.info("a", ShowOptions::default());
        center.loading("b");

        center.clear();
        assert_eq!(center.active_count(), 0);
        assert_eq!(
            recorder
                .events()
                .iter()
                .filter(|e| e.starts_with("unmount"))
                .count(),
            2
        );
    }

    #[tokio::test(start_paused = true)]
    async fn auto_dismiss_then_exit_animation() {
        let (_, center) = center(5);
        let id = center.info("x", ShowOptions::duration(ms(1_000)));

        sleep(ms(990)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Visible));

        sleep(ms(20)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Exiting));
        assert_eq!(center.active_count(), 0);

        sleep(ms(300)).await;
        assert!(center.get(id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn persistent_toast_never_expires() {
        let (_, center) = center(5);
        let id = center.loading("Enviando...");

        sleep(Duration::from_secs(3_600)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Visible));
    }

    #[tokio::test(start_paused = true)]
    async fn hover_pauses_remaining_time() {
        let (_, center) = center(5);
        let id = center.info("x", ShowOptions::duration(ms(5_000)));

        sleep(ms(2_000)).await;
        assert!(center.hover_start(id));
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Paused));

        sleep(ms(10_000)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Paused));

        assert!(center.hover_end(id));
        sleep(ms(2_900)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Visible));

        sleep(ms(200)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Exiting));
    }

    #[tokio::test(start_paused = true)]
    async fn hover_is_ignored_when_disabled() {
        let (_, center) = center(5);
        center.update_config(|config| config.pause_on_hover = false);
        let id = center.info("x", ShowOptions::duration(ms(1_000)));

        assert!(!center.hover_start(id));
        assert!(!center.hover_end(id));
        sleep(ms(1_010)).await;
        assert_eq!(center.get(id).map(|n| n.phase), Some(Phase::Exiting));
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_cancels_timer_of_removed_toast() {
        let (_, center) = center(1);
        let first = center.info("a", ShowOptions::duration(ms(500)));
        let second = center.info("b", ShowOptions::duration(ms(5_000)));

        sleep(ms(600)).await;
        assert!(center.get(first).is_none());
        assert_eq!(center.get(second).map(|n| n.phase), Some(Phase::Visible));
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_center_stops_timers() {
        let (recorder, center) = center(5);
        center.info("x", ShowOptions::duration(ms(100)));
        drop(center);

        sleep(ms(1_000)).await;
        assert!(!recorder.events().iter().any(|e| e.starts_with("Exiting")));
    }
}
