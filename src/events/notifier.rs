use std::{
    collections::HashMap,
    pin::Pin,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    task::{Context, Poll},
};

use futures_core::Stream;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};

use crate::{events::SessionEvent, store::SessionId};

const SESSION_CHANNEL_CAPACITY: usize = 256;

/// Session-scoped publish/subscribe feed.
///
/// Each session owns one broadcast channel from `open` until `close`; dropping
/// the sender on close ends every subscription after the buffered events drain.
#[derive(Debug, Clone, Default)]
pub struct EventNotifier {
    channels: Arc<Mutex<HashMap<SessionId, broadcast::Sender<SessionEvent>>>>,
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn channels(&self) -> MutexGuard<'_, HashMap<SessionId, broadcast::Sender<SessionEvent>>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn open(&self, session_id: &str) {
        self.channels()
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(SESSION_CHANNEL_CAPACITY).0);
    }

    /// Best-effort: events for a session nobody listens to are dropped.
    pub fn publish(&self, event: SessionEvent) {
        let sender = self.channels().get(event.session_id()).cloned();
        let Some(sender) = sender else {
            tracing::trace!(
                target: "events",
                session_id = event.session_id(),
                "event_dropped_channel_closed"
            );
            return;
        };
        let _ = sender.send(event);
    }

    /// Publishes the terminal event and releases the session's channel.
    pub fn complete(&self, event: SessionEvent) {
        let session_id = event.session_id().to_string();
        self.publish(event);
        self.close(&session_id);
    }

    pub fn close(&self, session_id: &str) {
        if self.channels().remove(session_id).is_some() {
            tracing::debug!(target: "events", session_id = session_id, "event_channel_closed");
        }
    }

    pub fn subscribe(&self, session_id: &str) -> EventSubscription {
        let receiver = self
            .channels()
            .get(session_id)
            .map(broadcast::Sender::subscribe);
        EventSubscription {
            session_id: session_id.to_string(),
            inner: receiver.map(BroadcastStream::new),
        }
    }
}

/// One observer's handle. Dropping it unsubscribes only this observer.
pub struct EventSubscription {
    session_id: SessionId,
    inner: Option<BroadcastStream<SessionEvent>>,
}

impl EventSubscription {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Stream for EventSubscription {
    type Item = SessionEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };
        loop {
            match Pin::new(&mut *inner).poll_next(cx) {
                Poll::Ready(Some(Ok(event))) => return Poll::Ready(Some(event)),
                Poll::Ready(Some(Err(BroadcastStreamRecvError::Lagged(skipped)))) => {
                    tracing::warn!(
                        target: "events",
                        session_id = %this.session_id,
                        skipped = skipped,
                        "event_subscriber_lagged"
                    );
                }
                Poll::Ready(None) => {
                    this.inner = None;
                    return Poll::Ready(None);
                }
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}
