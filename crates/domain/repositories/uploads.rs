use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::uploads::{InsertUploadEntity, UploadEntity};

#[async_trait]
#[automock]
pub trait UploadRepository {
    async fn insert(&self, entity: InsertUploadEntity) -> Result<UploadEntity>;

    async fn find_by_id(&self, upload_id: Uuid) -> Result<Option<UploadEntity>>;

    async fn delete(&self, upload_id: Uuid) -> Result<()>;

    async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<UploadEntity>>;
}
