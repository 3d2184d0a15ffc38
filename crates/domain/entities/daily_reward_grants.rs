use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::daily_reward_grants;

/// One row per (user, calendar day). The composite primary key is what makes
/// the daily grant exactly-once under concurrent requests.
#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = daily_reward_grants)]
#[diesel(primary_key(user_id, grant_date))]
pub struct DailyRewardGrantEntity {
    pub user_id: Uuid,
    pub grant_date: NaiveDate,
    pub ledger_entry_id: Uuid,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = daily_reward_grants)]
pub struct InsertDailyRewardGrantEntity {
    pub user_id: Uuid,
    pub grant_date: NaiveDate,
    pub ledger_entry_id: Uuid,
}
