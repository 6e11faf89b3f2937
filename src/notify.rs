use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

const MAX_TOASTS: usize = 4;
const TOAST_LIFETIME_TICKS: u64 = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: String,
    pub level: ToastLevel,
    pub message: String,
    pub expires_at_tick: u64,
}

/// Sink for user-facing notifications.
pub trait Notifier {
    fn info(&mut self, id: &str, message: &str);
    fn error(&mut self, id: &str, message: &str);
}

/// Bounded toast stack rendered in the corner of the screen.
///
/// A toast posted with an id already on screen replaces it.
#[derive(Debug, Default)]
pub struct ToastQueue {
    toasts: VecDeque<Toast>,
    now_tick: u64,
}

impl ToastQueue {
    pub fn push(&mut self, id: &str, level: ToastLevel, message: &str) {
        self.toasts.retain(|toast| toast.id != id);
        self.toasts.push_back(Toast {
            id: id.to_string(),
            level,
            message: message.to_string(),
            expires_at_tick: self.now_tick.saturating_add(TOAST_LIFETIME_TICKS),
        });
        while self.toasts.len() > MAX_TOASTS {
            self.toasts.pop_front();
        }
    }

    pub fn on_tick(&mut self, tick: u64) {
        self.now_tick = tick;
        self.toasts.retain(|toast| toast.expires_at_tick > tick);
    }

    pub fn dismiss_all(&mut self) {
        self.toasts.clear();
    }

    pub fn toasts(&self) -> impl Iterator<Item = &Toast> {
        self.toasts.iter()
    }

    pub fn len(&self) -> usize {
        self.toasts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toasts.is_empty()
    }
}

impl Notifier for ToastQueue {
    fn info(&mut self, id: &str, message: &str) {
        self.push(id, ToastLevel::Info, message);
    }

    fn error(&mut self, id: &str, message: &str) {
        tracing::warn!(toast_id = id, "{message}");
        self.push(id, ToastLevel::Error, message);
    }
}

/// Shared handle so the gate and the app can post into the same queue.
#[derive(Debug, Clone, Default)]
pub struct SharedToasts(Rc<RefCell<ToastQueue>>);

impl SharedToasts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_tick(&self, tick: u64) {
        self.0.borrow_mut().on_tick(tick);
    }

    pub fn dismiss_all(&self) {
        self.0.borrow_mut().dismiss_all();
    }

    pub fn snapshot(&self) -> Vec<Toast> {
        self.0.borrow().toasts().cloned().collect()
    }
}

impl Notifier for SharedToasts {
    fn info(&mut self, id: &str, message: &str) {
        self.0.borrow_mut().info(id, message);
    }

    fn error(&mut self, id: &str, message: &str) {
        self.0.borrow_mut().error(id, message);
    }
}
