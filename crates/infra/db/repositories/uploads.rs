use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, delete, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::uploads},
};
use domain::{
    entities::uploads::{InsertUploadEntity, UploadEntity},
    repositories::uploads::UploadRepository,
};

pub struct UploadPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UploadPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UploadRepository for UploadPostgres {
    async fn insert(&self, entity: InsertUploadEntity) -> Result<UploadEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(uploads::table)
            .values(&entity)
            .returning(UploadEntity::as_returning())
            .get_result::<UploadEntity>(&mut conn)?;

        Ok(inserted)
    }

    async fn find_by_id(&self, upload_id: Uuid) -> Result<Option<UploadEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let found = uploads::table
            .filter(uploads::id.eq(upload_id))
            .select(UploadEntity::as_select())
            .first::<UploadEntity>(&mut conn)
            .optional()?;

        Ok(found)
    }

    async fn delete(&self, upload_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(uploads::table.filter(uploads::id.eq(upload_id))).execute(&mut conn)?;

        Ok(())
    }

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UploadEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let results = uploads::table
            .filter(uploads::user_id.eq(user_id))
            .order(uploads::created_at.asc())
            .select(UploadEntity::as_select())
            .load::<UploadEntity>(&mut conn)?;

        Ok(results)
    }
}
