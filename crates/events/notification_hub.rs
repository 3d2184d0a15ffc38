use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::entities::notifications::NotificationEntity;

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub enum NotificationEvent {
    Inserted(NotificationEntity),
    /// `notification_id` of `None` means the whole inbox was affected.
    MarkedRead {
        user_id: Uuid,
        notification_id: Option<Uuid>,
    },
    Deleted {
        user_id: Uuid,
        notification_id: Option<Uuid>,
    },
}

impl NotificationEvent {
    pub fn user_id(&self) -> Uuid {
        match self {
            NotificationEvent::Inserted(notification) => notification.user_id,
            NotificationEvent::MarkedRead { user_id, .. } => *user_id,
            NotificationEvent::Deleted { user_id, .. } => *user_id,
        }
    }
}

/// Fans notification changes out to per-user subscribers. Used to push
/// inbox updates to connected clients without polling.
#[derive(Default)]
pub struct NotificationHub {
    senders: Mutex<HashMap<Uuid, broadcast::Sender<NotificationEvent>>>,
}

/// Aborts the forwarding task when dropped.
pub struct SubscriptionHandle {
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(self) {
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers an event to the user's subscribers. A user with no live
    /// subscribers simply misses the event; the inbox endpoints remain the
    /// source of truth.
    pub fn publish(&self, event: NotificationEvent) {
        let user_id = event.user_id();
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(sender) = senders.get(&user_id) {
            if sender.send(event).is_err() {
                // Last receiver is gone, drop the channel.
                senders.remove(&user_id);
            }
        }
    }

    pub fn subscribe(&self, user_id: Uuid) -> broadcast::Receiver<NotificationEvent> {
        let mut senders = self
            .senders
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        senders
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Subscribes and forwards every event to `callback` on a background
    /// task. Dropping the returned handle ends the subscription.
    pub fn subscribe_with<F>(&self, user_id: Uuid, mut callback: F) -> SubscriptionHandle
    where
        F: FnMut(NotificationEvent) + Send + 'static,
    {
        let mut receiver = self.subscribe(user_id);

        let task = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => callback(event),
                    // Slow subscribers skip the missed events and keep going.
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        SubscriptionHandle { task }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::{Duration, timeout};

    fn notification_for(user_id: Uuid) -> NotificationEntity {
        NotificationEntity {
            id: Uuid::new_v4(),
            user_id,
            payload: json!({"type": "daily_reward", "credits": 5}),
            is_read: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn delivers_events_to_subscriber() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let mut receiver = hub.subscribe(user_id);

        hub.publish(NotificationEvent::Inserted(notification_for(user_id)));

        let event = timeout(Duration::from_secs(1), receiver.recv())
            .await
            .expect("event should arrive")
            .expect("channel should stay open");
        assert!(matches!(event, NotificationEvent::Inserted(_)));
        assert_eq!(event.user_id(), user_id);
    }

    #[tokio::test]
    async fn does_not_cross_users() {
        let hub = NotificationHub::new();
        let subscriber = Uuid::new_v4();
        let other = Uuid::new_v4();
        let mut receiver = hub.subscribe(subscriber);

        hub.publish(NotificationEvent::Inserted(notification_for(other)));

        let result = timeout(Duration::from_millis(100), receiver.recv()).await;
        assert!(result.is_err(), "subscriber must not see another user's events");
    }

    #[tokio::test]
    async fn callback_subscription_stops_after_unsubscribe() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let seen = Arc::new(AtomicUsize::new(0));

        let seen_in_callback = Arc::clone(&seen);
        let handle = hub.subscribe_with(user_id, move |_| {
            seen_in_callback.fetch_add(1, Ordering::SeqCst);
        });

        hub.publish(NotificationEvent::MarkedRead {
            user_id,
            notification_id: None,
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);

        handle.unsubscribe();
        tokio::time::sleep(Duration::from_millis(10)).await;

        hub.publish(NotificationEvent::Deleted {
            user_id,
            notification_id: None,
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn multiple_subscribers_share_one_channel() {
        let hub = NotificationHub::new();
        let user_id = Uuid::new_v4();
        let mut first = hub.subscribe(user_id);
        let mut second = hub.subscribe(user_id);

        hub.publish(NotificationEvent::Inserted(notification_for(user_id)));

        assert!(first.recv().await.is_ok());
        assert!(second.recv().await.is_ok());
    }
}
