use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::users::{UpsertUserEntity, UserEntity};

#[async_trait]
#[automock]
pub trait UserRepository {
    /// Insert on first sign-in, refresh display_name/last_login_at after.
    async fn upsert_on_sign_in(&self, entity: UpsertUserEntity) -> Result<()>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<UserEntity>>;
}
