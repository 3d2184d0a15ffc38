use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::credit_packages::CreditPackageEntity;

#[async_trait]
#[automock]
pub trait CreditPackageRepository {
    /// Active packages ordered by sort_order.
    async fn list_active(&self) -> Result<Vec<CreditPackageEntity>>;

    async fn find_active_by_id(&self, package_id: Uuid) -> Result<Option<CreditPackageEntity>>;
}
