use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::{
    RunQueryDsl, dsl::sum, insert_into, prelude::*,
    result::{DatabaseErrorKind, Error as DieselError},
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{credit_ledger, daily_reward_grants, notifications},
    },
};
use domain::{
    entities::{
        credit_ledger::InsertCreditLedgerEntryEntity,
        daily_reward_grants::InsertDailyRewardGrantEntity,
        notifications::{InsertNotificationEntity, NotificationEntity},
    },
    repositories::credit_ledger::CreditLedgerRepository,
    value_objects::{
        daily_reward::{GrantAttempt, PurchaseCredit},
        enums::credit_reasons::CreditReason,
    },
};

pub struct CreditLedgerPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditLedgerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn is_unique_violation(err: &DieselError) -> bool {
    matches!(
        err,
        DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)
    )
}

fn user_balance(conn: &mut PgConnection, user_id: Uuid) -> Result<i64, DieselError> {
    let total = credit_ledger::table
        .filter(credit_ledger::user_id.eq(user_id))
        .select(sum(credit_ledger::amount))
        .first::<Option<i64>>(conn)?;

    Ok(total.unwrap_or(0))
}

#[async_trait]
impl CreditLedgerRepository for CreditLedgerPostgres {
    async fn grant_daily_reward(
        &self,
        user_id: Uuid,
        grant_date: NaiveDate,
        amount: i32,
        notification_payload: serde_json::Value,
    ) -> Result<GrantAttempt> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<GrantAttempt, DieselError, _>(|conn| {
            let ledger_entry_id = insert_into(credit_ledger::table)
                .values(&InsertCreditLedgerEntryEntity {
                    user_id,
                    amount,
                    reason: CreditReason::DailyReward.to_string(),
                    purchase_ref: None,
                })
                .returning(credit_ledger::id)
                .get_result::<Uuid>(conn)?;

            // The (user_id, grant_date) primary key settles concurrent
            // claims: the loser's ledger entry rolls back with the
            // transaction.
            let grant_insert = insert_into(daily_reward_grants::table)
                .values(&InsertDailyRewardGrantEntity {
                    user_id,
                    grant_date,
                    ledger_entry_id,
                })
                .execute(conn);

            if let Err(err) = grant_insert {
                if is_unique_violation(&err) {
                    return Err(DieselError::RollbackTransaction);
                }
                return Err(err);
            }

            let notification = insert_into(notifications::table)
                .values(&InsertNotificationEntity {
                    user_id,
                    payload: notification_payload.clone(),
                    is_read: false,
                })
                .returning(NotificationEntity::as_returning())
                .get_result::<NotificationEntity>(conn)?;

            let new_balance = user_balance(conn, user_id)?;

            Ok(GrantAttempt::Granted {
                credits: amount,
                new_balance,
                notification,
            })
        });

        match outcome {
            Ok(granted) => Ok(granted),
            Err(DieselError::RollbackTransaction) => Ok(GrantAttempt::AlreadyGranted),
            Err(err) => Err(err.into()),
        }
    }

    async fn credit_purchase(
        &self,
        user_id: Uuid,
        credits: i32,
        purchase_ref: &str,
        notification_payload: serde_json::Value,
    ) -> Result<PurchaseCredit> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<PurchaseCredit, DieselError, _>(|conn| {
            let ledger_insert = insert_into(credit_ledger::table)
                .values(&InsertCreditLedgerEntryEntity {
                    user_id,
                    amount: credits,
                    reason: CreditReason::Purchase.to_string(),
                    purchase_ref: Some(purchase_ref.to_string()),
                })
                .returning(credit_ledger::id)
                .get_result::<Uuid>(conn);

            let ledger_entry_id = match ledger_insert {
                Ok(id) => id,
                // Redelivered webhook: the ref is already credited.
                Err(err) if is_unique_violation(&err) => {
                    return Err(DieselError::RollbackTransaction);
                }
                Err(err) => return Err(err),
            };

            let notification = insert_into(notifications::table)
                .values(&InsertNotificationEntity {
                    user_id,
                    payload: notification_payload.clone(),
                    is_read: false,
                })
                .returning(NotificationEntity::as_returning())
                .get_result::<NotificationEntity>(conn)?;

            let new_balance = user_balance(conn, user_id)?;

            Ok(PurchaseCredit::Credited {
                ledger_entry_id,
                new_balance,
                notification,
            })
        });

        match outcome {
            Ok(credited) => Ok(credited),
            Err(DieselError::RollbackTransaction) => Ok(PurchaseCredit::DuplicateRef),
            Err(err) => Err(err.into()),
        }
    }

    async fn balance(&self, user_id: Uuid) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        Ok(user_balance(&mut conn, user_id)?)
    }

    async fn last_daily_reward_at(&self, user_id: Uuid) -> Result<Option<DateTime<Utc>>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let last = credit_ledger::table
            .filter(credit_ledger::user_id.eq(user_id))
            .filter(credit_ledger::reason.eq(CreditReason::DailyReward.to_string()))
            .order(credit_ledger::created_at.desc())
            .select(credit_ledger::created_at)
            .first::<DateTime<Utc>>(&mut conn)
            .optional()?;

        Ok(last)
    }

    async fn recent_grant_dates(&self, user_id: Uuid, limit: i64) -> Result<Vec<NaiveDate>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let dates = daily_reward_grants::table
            .filter(daily_reward_grants::user_id.eq(user_id))
            .order(daily_reward_grants::grant_date.desc())
            .limit(limit)
            .select(daily_reward_grants::grant_date)
            .load::<NaiveDate>(&mut conn)?;

        Ok(dates)
    }
}
