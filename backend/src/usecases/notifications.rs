use std::sync::Arc;

use anyhow::Result;
use crates::{
    domain::{
        entities::notifications::NotificationEntity,
        repositories::notifications::NotificationRepository,
    },
    events::notification_hub::{NotificationEvent, NotificationHub},
};
use tracing::{error, info};
use uuid::Uuid;

pub struct NotificationsUseCase<N>
where
    N: NotificationRepository + Send + Sync + 'static,
{
    notification_repository: Arc<N>,
    notification_hub: Arc<NotificationHub>,
}

impl<N> NotificationsUseCase<N>
where
    N: NotificationRepository + Send + Sync + 'static,
{
    pub fn new(notification_repository: Arc<N>, notification_hub: Arc<NotificationHub>) -> Self {
        Self {
            notification_repository,
            notification_hub,
        }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<NotificationEntity>> {
        self.notification_repository
            .list_for_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "notifications: failed to list");
                err
            })
    }

    /// `notification_id` of `None` marks the whole inbox. Foreign or missing
    /// ids come back as 0 updated rows, never an error.
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Option<Uuid>) -> Result<usize> {
        let updated = match notification_id {
            Some(notification_id) => {
                self.notification_repository
                    .mark_read(user_id, notification_id)
                    .await
            }
            None => self.notification_repository.mark_all_read(user_id).await,
        }
        .map_err(|err| {
            error!(
                %user_id,
                notification_id = ?notification_id,
                db_error = ?err,
                "notifications: failed to mark read"
            );
            err
        })?;

        if updated > 0 {
            self.notification_hub.publish(NotificationEvent::MarkedRead {
                user_id,
                notification_id,
            });
        }

        info!(%user_id, updated, "notifications: marked read");
        Ok(updated)
    }

    pub async fn delete(&self, user_id: Uuid, notification_id: Option<Uuid>) -> Result<usize> {
        let deleted = match notification_id {
            Some(notification_id) => {
                self.notification_repository
                    .delete(user_id, notification_id)
                    .await
            }
            None => self.notification_repository.delete_all(user_id).await,
        }
        .map_err(|err| {
            error!(
                %user_id,
                notification_id = ?notification_id,
                db_error = ?err,
                "notifications: failed to delete"
            );
            err
        })?;

        if deleted > 0 {
            self.notification_hub.publish(NotificationEvent::Deleted {
                user_id,
                notification_id,
            });
        }

        info!(%user_id, deleted, "notifications: deleted");
        Ok(deleted)
    }
}
