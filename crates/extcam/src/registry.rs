// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Presence registry
//!
//! Maps logical ids to their last known [`PresenceState`] and forwards every
//! change to at most one [`NotificationSink`]. The map and the sink share one
//! lock, so a subscriber attaching mid-discovery sees the replay of current
//! entries followed by later changes, in order, with nothing lost or doubled.
//!
//! Notifications are delivered while that lock is held. A sink must not call
//! back into the registry or the provider from inside the callback.

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::device_id::LogicalDeviceId;

/// Presence of an external camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PresenceState {
    Present,
    NotPresent,
}

impl fmt::Display for PresenceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PresenceState::Present => write!(f, "PRESENT"),
            PresenceState::NotPresent => write!(f, "NOT_PRESENT"),
        }
    }
}

/// A single presence notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusChange {
    pub id: LogicalDeviceId,
    pub state: PresenceState,
}

/// Receiver of presence notifications.
pub trait NotificationSink: Send + Sync {
    fn device_status_changed(&self, id: &LogicalDeviceId, state: PresenceState);
}

impl<F> NotificationSink for F
where
    F: Fn(&LogicalDeviceId, PresenceState) + Send + Sync,
{
    fn device_status_changed(&self, id: &LogicalDeviceId, state: PresenceState) {
        self(id, state)
    }
}

/// Sink forwarding notifications into a channel.
///
/// Sends to a dropped receiver are ignored.
pub struct ChannelSink {
    tx: Sender<StatusChange>,
}

impl ChannelSink {
    pub fn new(tx: Sender<StatusChange>) -> Self {
        Self { tx }
    }
}

impl NotificationSink for ChannelSink {
    fn device_status_changed(&self, id: &LogicalDeviceId, state: PresenceState) {
        let _ = self.tx.send(StatusChange { id: *id, state });
    }
}

#[derive(Default)]
struct Inner {
    devices: HashMap<LogicalDeviceId, PresenceState>,
    sink: Option<Arc<dyn NotificationSink>>,
}

impl Inner {
    fn notify(&self, id: &LogicalDeviceId, state: PresenceState) {
        let Some(sink) = &self.sink else {
            return;
        };
        let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
            sink.device_status_changed(id, state)
        }));
        if delivered.is_err() {
            log::error!("subscriber panicked while handling {} {}", id, state);
        }
    }
}

/// Thread-safe map of logical id to presence state plus the current subscriber.
#[derive(Default)]
pub struct PresenceRegistry {
    inner: Mutex<Inner>,
}

impl fmt::Debug for PresenceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("PresenceRegistry")
            .field("devices", &inner.devices)
            .field("subscribed", &inner.sink.is_some())
            .finish()
    }
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark `id` present, notifying the subscriber if this is a change.
    ///
    /// Returns `false` when `id` was already present.
    pub fn record_present(&self, id: LogicalDeviceId) -> bool {
        let mut inner = self.lock();
        if inner.devices.get(&id) == Some(&PresenceState::Present) {
            log::debug!("{} already present", id);
            return false;
        }
        inner.devices.insert(id, PresenceState::Present);
        log::info!("{} is {}", id, PresenceState::Present);
        inner.notify(&id, PresenceState::Present);
        true
    }

    /// Remove `id`, notifying the subscriber.
    ///
    /// Returns `false` (and logs) when `id` was never recorded.
    pub fn record_absent(&self, id: LogicalDeviceId) -> bool {
        let mut inner = self.lock();
        if inner.devices.remove(&id).is_none() {
            log::warn!("{} removed but was never added", id);
            return false;
        }
        log::info!("{} is {}", id, PresenceState::NotPresent);
        inner.notify(&id, PresenceState::NotPresent);
        true
    }

    pub fn lookup(&self, id: &LogicalDeviceId) -> Option<PresenceState> {
        self.lock().devices.get(id).copied()
    }

    pub fn is_present(&self, id: &LogicalDeviceId) -> bool {
        self.lookup(id) == Some(PresenceState::Present)
    }

    /// All recorded entries, sorted by id.
    pub fn snapshot(&self) -> Vec<(LogicalDeviceId, PresenceState)> {
        let mut entries: Vec<_> = self
            .lock()
            .devices
            .iter()
            .map(|(id, state)| (*id, *state))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.lock().devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().devices.is_empty()
    }

    /// Install `sink` as the subscriber, replacing any previous one, and
    /// replay every current entry to it.
    pub fn attach(&self, sink: Arc<dyn NotificationSink>) {
        let mut inner = self.lock();
        inner.sink = Some(sink);
        let mut entries: Vec<_> = inner
            .devices
            .iter()
            .map(|(id, state)| (*id, *state))
            .collect();
        entries.sort();
        log::debug!("subscriber attached, replaying {} devices", entries.len());
        for (id, state) in entries {
            inner.notify(&id, state);
        }
    }

    /// Remove the subscriber. Returns whether one was attached.
    pub fn detach(&self) -> bool {
        self.lock().sink.take().is_some()
    }

    pub fn has_subscriber(&self) -> bool {
        self.lock().sink.is_some()
    }
}
