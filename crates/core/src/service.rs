//! Background consumption of bus events on behalf of a domain service.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::EventBusError;
use crate::event::{Event, EventSubscription};

/// A spawned task feeding every event of one subscription to a handler,
/// one at a time, until [`Worker::stop`] is called or the bus closes.
pub struct Worker {
    name: &'static str,
    stop: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl Worker {
    pub fn spawn<H, Fut>(name: &'static str, mut subscription: EventSubscription, mut handler: H) -> Self
    where
        H: FnMut(Event) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let stop = Arc::new(Notify::new());
        let signal = Arc::clone(&stop);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = signal.notified() => {
                        debug!(service = name, "worker stopping");
                        return;
                    }
                    received = subscription.recv() => match received {
                        Ok(event) => handler(event).await,
                        Err(EventBusError::Lagged(count)) => {
                            warn!(service = name, count, "worker lagged, some events dropped");
                        }
                        Err(EventBusError::ChannelClosed) => {
                            debug!(service = name, "event bus closed, worker stopping");
                            return;
                        }
                        Err(error) => {
                            error!(service = name, %error, "worker subscription error");
                            return;
                        }
                    },
                }
            }
        });

        debug!(service = name, "worker started");
        Self { name, stop, handle }
    }

    /// Signal the task and wait for it to finish the event in progress.
    pub async fn stop(self) {
        // notify_one keeps a permit when the task is busy in its handler
        self.stop.notify_one();
        if let Err(error) = self.handle.await {
            warn!(service = self.name, %error, "worker ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::event::{BroadcastEventBus, EventBus, EventPayload, EventSource};
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn handler_sees_events_until_stopped() {
        let bus = BroadcastEventBus::default();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let worker = Worker::spawn("test", bus.subscribe("roster.*").unwrap(), move |event| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(event.name().to_string());
            }
        });

        bus.emit("roster.changed", EventSource::Xmpp, EventPayload::Empty);
        let name = tokio::time::timeout(Duration::from_millis(200), rx.recv())
            .await
            .expect("timed out");
        assert_eq!(name.as_deref(), Some("roster.changed"));

        worker.stop().await;
        bus.emit("roster.changed", EventSource::Xmpp, EventPayload::Empty);
        assert!(rx.recv().await.is_none(), "handler ran after stop");
    }

    #[tokio::test]
    async fn worker_ends_when_bus_closes() {
        let bus = BroadcastEventBus::default();
        let worker = Worker::spawn("test", bus.subscribe("roster.*").unwrap(), |_| async {});
        drop(bus);

        tokio::time::timeout(Duration::from_millis(200), async {
            while !worker.is_finished() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("worker still running");
    }
}
