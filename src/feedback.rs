use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct NoticeId(pub u64);

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum NoticeKind {
    #[default]
    Info,
    Warning,
    Error,
}

/// A message disclosed outside the form itself, e.g. a submission the domain
/// mapper refused.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Notice {
    pub id: Option<NoticeId>,
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

impl Notice {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: NoticeKind::Info,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn kind(mut self, value: NoticeKind) -> Self {
        self.kind = value;
        self
    }
}

pub trait NoticeSink: Send + Sync {
    fn push(&self, notice: Notice) -> NoticeId;
}

#[derive(Clone)]
pub struct NoticeQueue {
    next_id: Arc<AtomicU64>,
    max_visible: usize,
    entries: Arc<RwLock<VecDeque<Notice>>>,
}

impl Default for NoticeQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl NoticeQueue {
    pub fn new() -> Self {
        Self {
            next_id: Arc::new(AtomicU64::new(0)),
            max_visible: 5,
            entries: Arc::new(RwLock::new(VecDeque::new())),
        }
    }

    pub fn max_visible(mut self, value: usize) -> Self {
        self.max_visible = value.max(1);
        self
    }

    pub fn dismiss(&self, id: NoticeId) -> bool {
        let mut entries = self.write();
        if let Some(index) = entries.iter().position(|entry| entry.id == Some(id)) {
            entries.remove(index);
            return true;
        }
        false
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn entries(&self) -> Vec<Notice> {
        self.read().iter().cloned().collect()
    }

    fn read(&self) -> RwLockReadGuard<'_, VecDeque<Notice>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, VecDeque<Notice>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl NoticeSink for NoticeQueue {
    fn push(&self, mut notice: Notice) -> NoticeId {
        let id = NoticeId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        notice.id = Some(id);

        let mut entries = self.write();
        entries.push_back(notice);
        while entries.len() > self.max_visible {
            entries.pop_front();
        }
        id
    }
}
