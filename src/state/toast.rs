use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub id: u64,
    pub level: ToastLevel,
    pub message: String,
    pub created: Instant,
    pub duration: Duration,
}

impl Toast {
    /// Fraction of the display time still left, from 1.0 down to 0.0.
    pub fn remaining(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.created);
        if self.duration.is_zero() || elapsed >= self.duration {
            return 0.0;
        }
        1.0 - elapsed.as_secs_f32() / self.duration.as_secs_f32()
    }

    fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created) >= self.duration
    }
}

/// Transient notifications; each dismisses itself after its duration.
#[derive(Debug, Clone)]
pub struct Toasts {
    items: Vec<Toast>,
    next_id: u64,
    duration: Duration,
}

impl Toasts {
    pub fn new(duration: Duration) -> Self {
        Self {
            items: Vec::new(),
            next_id: 0,
            duration,
        }
    }

    pub fn push(&mut self, level: ToastLevel, message: impl Into<String>) -> u64 {
        self.push_at(level, message, Instant::now())
    }

    fn push_at(&mut self, level: ToastLevel, message: impl Into<String>, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Toast {
            id,
            level,
            message: message.into(),
            created: now,
            duration: self.duration,
        });
        id
    }

    pub fn info(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Info, message)
    }

    pub fn success(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Success, message)
    }

    pub fn warning(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Warning, message)
    }

    pub fn error(&mut self, message: impl Into<String>) -> u64 {
        self.push(ToastLevel::Error, message)
    }

    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|toast| toast.id != id);
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|toast| !toast.expired(now));
    }

    pub fn iter(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Toast> {
        self.items.last()
    }
}
