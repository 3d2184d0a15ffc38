use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::notifications::{InsertNotificationEntity, NotificationEntity};

/// Every operation is scoped by `user_id`; an id belonging to another user
/// behaves exactly like a missing id (0 rows touched).
#[async_trait]
#[automock]
pub trait NotificationRepository {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<NotificationEntity>>;

    async fn insert(&self, entity: InsertNotificationEntity) -> Result<NotificationEntity>;

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<usize>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<usize>;

    async fn delete(&self, user_id: Uuid, notification_id: Uuid) -> Result<usize>;

    async fn delete_all(&self, user_id: Uuid) -> Result<usize>;
}
