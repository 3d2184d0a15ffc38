use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::daily_reward::{GrantAttempt, PurchaseCredit};

#[async_trait]
#[automock]
pub trait CreditLedgerRepository {
    /// Grants the daily reward for `grant_date` in one transaction: grant
    /// marker row, ledger entry, and the user-facing notification either all
    /// persist or none do. A (user_id, grant_date) collision means the day
    /// was already claimed and must come back as `AlreadyGranted`, not an
    /// error.
    async fn grant_daily_reward(
        &self,
        user_id: Uuid,
        grant_date: NaiveDate,
        amount: i32,
        notification_payload: serde_json::Value,
    ) -> Result<GrantAttempt>;

    /// Credits a completed purchase, deduplicated on `purchase_ref`.
    async fn credit_purchase(
        &self,
        user_id: Uuid,
        credits: i32,
        purchase_ref: &str,
        notification_payload: serde_json::Value,
    ) -> Result<PurchaseCredit>;

    /// SUM(amount) over the user's ledger rows; 0 for unknown users.
    async fn balance(&self, user_id: Uuid) -> Result<i64>;

    async fn last_daily_reward_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>>;

    /// Most recent grant dates, newest first.
    async fn recent_grant_dates(&self, user_id: Uuid, limit: i64) -> Result<Vec<NaiveDate>>;
}
