//! Event system for async notification handling.
//!
//! The session actor dispatches everything that happens on the link (port
//! state changes, inbound bytes, telemetry, scheduler progress, errors with
//! no caller) to any number of subscribers.

use std::sync::Arc;

use bytes::Bytes;
use futures::Stream;
use tokio::sync::broadcast;

use crate::types::TelemetryStatus;

/// Event types that can be dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The port was opened.
    PortOpened,
    /// The port was closed.
    PortClosed,
    /// An error nobody was waiting for.
    Error {
        /// Human readable description.
        message: String,
        /// True if the error closed the port.
        fatal: bool,
    },
    /// Bytes arrived while not paused.
    DataReceived(Bytes),
    /// A telemetry frame was decoded.
    Telemetry(TelemetryStatus),
    /// A point-stream sample was written.
    SendProgress {
        /// One-based index of the sample.
        current: usize,
        /// Number of samples.
        total: usize,
        /// `current / total` in percent.
        percent: f64,
    },
    /// Every point-stream sample was attempted.
    SendCompleted,
    /// The point stream was stopped early.
    SendCancelled,
    /// Periodic sending started or was reconfigured.
    PeriodicStarted {
        /// Tick period.
        interval_ms: u32,
    },
    /// Periodic sending stopped.
    PeriodicStopped,
    /// A point stream started.
    PointStreamStarted {
        /// Number of samples.
        total: usize,
        /// Tick period.
        interval_ms: u32,
    },
}

/// Discriminant of an [`Event`], used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// [`Event::PortOpened`]
    PortOpened,
    /// [`Event::PortClosed`]
    PortClosed,
    /// [`Event::Error`]
    Error,
    /// [`Event::DataReceived`]
    DataReceived,
    /// [`Event::Telemetry`]
    Telemetry,
    /// [`Event::SendProgress`]
    SendProgress,
    /// [`Event::SendCompleted`]
    SendCompleted,
    /// [`Event::SendCancelled`]
    SendCancelled,
    /// [`Event::PeriodicStarted`]
    PeriodicStarted,
    /// [`Event::PeriodicStopped`]
    PeriodicStopped,
    /// [`Event::PointStreamStarted`]
    PointStreamStarted,
}

impl Event {
    /// Returns the kind of this event.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            Self::PortOpened => EventKind::PortOpened,
            Self::PortClosed => EventKind::PortClosed,
            Self::Error { .. } => EventKind::Error,
            Self::DataReceived(_) => EventKind::DataReceived,
            Self::Telemetry(_) => EventKind::Telemetry,
            Self::SendProgress { .. } => EventKind::SendProgress,
            Self::SendCompleted => EventKind::SendCompleted,
            Self::SendCancelled => EventKind::SendCancelled,
            Self::PeriodicStarted { .. } => EventKind::PeriodicStarted,
            Self::PeriodicStopped => EventKind::PeriodicStopped,
            Self::PointStreamStarted { .. } => EventKind::PointStreamStarted,
        }
    }
}

/// Subscription filter for specific event kinds.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Accepted kinds; `None` accepts everything.
    pub kinds: Option<Vec<EventKind>>,
}

impl EventFilter {
    /// Creates a filter for specific event kinds.
    #[must_use]
    pub const fn kinds(kinds: Vec<EventKind>) -> Self {
        Self { kinds: Some(kinds) }
    }

    /// Checks if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &Event) -> bool {
        self.kinds
            .as_ref()
            .is_none_or(|kinds| kinds.contains(&event.kind()))
    }
}

/// A subscription to events.
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
    filter: EventFilter,
}

impl Subscription {
    /// Receives the next matching event.
    ///
    /// Returns `None` once the dispatcher is gone. Events missed because
    /// the subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) if self.filter.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!("subscriber lagged, {} events skipped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turns the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Event> + Send {
        futures::stream::unfold(self, |mut sub| async move {
            let event = sub.recv().await?;
            Some((event, sub))
        })
    }
}

struct EventDispatcherInner {
    sender: broadcast::Sender<Event>,
}

/// Dispatches events to subscribers.
#[derive(Clone)]
pub struct EventDispatcher {
    inner: Arc<EventDispatcherInner>,
}

impl EventDispatcher {
    /// Creates a new event dispatcher buffering up to `capacity` events per
    /// subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(EventDispatcherInner { sender }),
        }
    }

    /// Dispatches an event to all subscribers.
    pub fn dispatch(&self, event: Event) {
        tracing::trace!("dispatching {:?}", event.kind());
        // No receivers is fine
        let _ = self.inner.sender.send(event);
    }

    /// Subscribes to events with an optional filter.
    #[must_use]
    pub fn subscribe(&self, filter: Option<EventFilter>) -> Subscription {
        Subscription {
            receiver: self.inner.sender.subscribe(),
            filter: filter.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_event_dispatch() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe(None);

        dispatcher.dispatch(Event::PortOpened);

        let event = tokio::time::timeout(Duration::from_millis(100), sub.recv())
            .await
            .unwrap();

        assert_eq!(event, Some(Event::PortOpened));
    }

    #[test]
    fn test_event_filter() {
        let filter = EventFilter::kinds(vec![EventKind::SendCompleted, EventKind::Error]);

        assert!(filter.matches(&Event::SendCompleted));
        assert!(filter.matches(&Event::Error {
            message: "test".into(),
            fatal: false,
        }));
        assert!(!filter.matches(&Event::PortOpened));
        assert!(EventFilter::default().matches(&Event::PortOpened));
    }

    #[tokio::test]
    async fn test_filtered_subscription() {
        let dispatcher = EventDispatcher::new(16);
        let mut sub = dispatcher.subscribe(Some(EventFilter::kinds(vec![EventKind::PortClosed])));

        dispatcher.dispatch(Event::PortOpened);
        dispatcher.dispatch(Event::DataReceived(Bytes::from_static(b"x")));
        dispatcher.dispatch(Event::PortClosed);

        assert_eq!(sub.recv().await, Some(Event::PortClosed));
    }

    #[tokio::test]
    async fn test_stream_ends_with_dispatcher() {
        let dispatcher = EventDispatcher::new(16);
        let stream = dispatcher.subscribe(None).into_stream();

        dispatcher.dispatch(Event::PeriodicStopped);
        dispatcher.dispatch(Event::SendCancelled);
        drop(dispatcher);

        let events: Vec<Event> = stream.collect().await;
        assert_eq!(events, vec![Event::PeriodicStopped, Event::SendCancelled]);
    }
}
