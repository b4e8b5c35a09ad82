//! Badge notifier
//!
//! In-process publish/subscribe channel announcing newly earned badges,
//! used for one-shot celebratory effects. Owned by the engine instance
//! so tests can construct isolated engines; nothing here is persisted and
//! the subscriber list is rebuilt each process lifetime.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

use log::warn;

use crate::session_record::EarnedBadge;

pub type BadgeHandler = Arc<dyn Fn(&EarnedBadge) + Send + Sync + 'static>;

/// Handle returned by `subscribe`, used to unsubscribe later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

#[derive(Default)]
pub struct BadgeNotifier {
    subscribers: Mutex<Vec<(u64, BadgeHandler)>>,
    next_id: AtomicU64,
}

impl BadgeNotifier {
    pub fn new() -> Self {
        BadgeNotifier::default()
    }

    pub fn subscribe(&self, handler: BadgeHandler) -> SubscriberId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        match self.subscribers.lock() {
            Ok(mut subs) => subs.push((id, handler)),
            Err(_) => warn!("badge notifier lock poisoned; subscriber dropped"),
        }
        SubscriberId(id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.retain(|(sub_id, _)| *sub_id != id.0);
        }
    }

    /// Fire-and-forget announcement. Handlers run on a detached thread so
    /// a slow subscriber never blocks the publishing operation. No
    /// delivery guarantee across process restarts.
    pub fn publish(&self, badge: &EarnedBadge) {
        let handlers: Vec<BadgeHandler> = match self.subscribers.lock() {
            Ok(subs) => subs.iter().map(|(_, h)| Arc::clone(h)).collect(),
            Err(_) => {
                warn!("badge notifier lock poisoned; announcement dropped");
                return;
            }
        };
        if handlers.is_empty() {
            return;
        }
        let badge = badge.clone();
        thread::spawn(move || {
            for handler in handlers {
                handler(&badge);
            }
        });
    }
}
