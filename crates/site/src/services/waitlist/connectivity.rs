//! Connectivity probe and background reachability monitor.
//!
//! [`ConnectivityProbe`] holds the current online flag and fans out
//! [`ConnectivityEvent`]s to subscribers, one per actual transition. Nothing
//! here decides what "online" means; the host feeds it, either directly via
//! [`ConnectivityProbe::set_online`] or through [`spawn_monitor`], which polls
//! the remote store's reachability.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::remote::RemoteStore;

const EVENT_CAPACITY: usize = 16;

/// A change in connectivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    Online,
    Offline,
}

impl ConnectivityEvent {
    const fn from_online(online: bool) -> Self {
        if online { Self::Online } else { Self::Offline }
    }
}

/// Shared online/offline state. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectivityProbe {
    inner: Arc<ProbeInner>,
}

struct ProbeInner {
    online: Mutex<bool>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl std::fmt::Debug for ConnectivityProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityProbe")
            .field("online", &self.is_online())
            .finish()
    }
}

impl ConnectivityProbe {
    #[must_use]
    pub fn new(initially_online: bool) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(ProbeInner {
                online: Mutex::new(initially_online),
                events,
            }),
        }
    }

    /// Point-in-time connectivity.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self
            .inner
            .online
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Record the current connectivity.
    ///
    /// Returns `true` when this was a transition (and an event was
    /// published); repeating the current state is a no-op.
    pub fn set_online(&self, online: bool) -> bool {
        let mut current = self
            .inner
            .online
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if *current == online {
            return false;
        }
        *current = online;

        if online {
            tracing::info!("Back online");
        } else {
            tracing::info!("Gone offline, will cache data locally");
        }

        // Published under the lock so subscribers see transitions in order.
        // No receivers is fine.
        let _ = self.inner.events.send(ConnectivityEvent::from_online(online));
        true
    }

    /// Subscribe to transitions that happen after this call.
    #[must_use]
    pub fn subscribe(&self) -> ConnectivityEvents {
        ConnectivityEvents {
            rx: self.inner.events.subscribe(),
            probe: Arc::downgrade(&self.inner),
            last: Some(ConnectivityEvent::from_online(self.is_online())),
        }
    }
}

/// Stream of connectivity transitions for one subscriber.
pub struct ConnectivityEvents {
    rx: broadcast::Receiver<ConnectivityEvent>,
    probe: Weak<ProbeInner>,
    last: Option<ConnectivityEvent>,
}

impl ConnectivityEvents {
    /// Wait for the next transition.
    ///
    /// Returns `None` once the probe has been dropped. A subscriber that
    /// falls too far behind resumes from the current state, without
    /// repeating the last event it already saw.
    pub async fn next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            let event = match self.rx.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Connectivity subscriber lagged");
                    let inner = self.probe.upgrade()?;
                    let online = ConnectivityProbe { inner }.is_online();
                    ConnectivityEvent::from_online(online)
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            };

            if self.last != Some(event) {
                self.last = Some(event);
                return Some(event);
            }
        }
    }
}

/// Poll `remote` every `interval` and feed the result into `probe`.
///
/// The first check runs immediately. The task runs until aborted.
pub fn spawn_monitor(
    probe: ConnectivityProbe,
    remote: Arc<dyn RemoteStore>,
    interval: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let reachable = remote.is_reachable().await;
            tracing::trace!(reachable, "Connectivity check");
            probe.set_online(reachable);
        }
    })
}
