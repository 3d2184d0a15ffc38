use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*, update};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::notifications},
};
use domain::{
    entities::notifications::{InsertNotificationEntity, NotificationEntity},
    repositories::notifications::NotificationRepository,
};

pub struct NotificationPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl NotificationPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NotificationRepository for NotificationPostgres {
    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<NotificationEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = notifications::table
            .filter(notifications::user_id.eq(user_id))
            .order(notifications::created_at.asc())
            .select(NotificationEntity::as_select())
            .load::<NotificationEntity>(&mut conn)?;

        Ok(results)
    }

    async fn insert(&self, entity: InsertNotificationEntity) -> Result<NotificationEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(notifications::table)
            .values(&entity)
            .returning(NotificationEntity::as_returning())
            .get_result::<NotificationEntity>(&mut conn)?;

        Ok(inserted)
    }

    async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        // Scoping by user_id keeps foreign ids indistinguishable from
        // missing ones.
        let updated = update(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            notifications::table
                .filter(notifications::user_id.eq(user_id))
                .filter(notifications::is_read.eq(false)),
        )
        .set((
            notifications::is_read.eq(true),
            notifications::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated)
    }

    async fn delete(&self, user_id: Uuid, notification_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(
            notifications::table
                .filter(notifications::id.eq(notification_id))
                .filter(notifications::user_id.eq(user_id)),
        )
        .execute(&mut conn)?;

        Ok(deleted)
    }

    async fn delete_all(&self, user_id: Uuid) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let deleted = delete(notifications::table.filter(notifications::user_id.eq(user_id)))
            .execute(&mut conn)?;

        Ok(deleted)
    }
}
