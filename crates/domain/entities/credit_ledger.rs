use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::credit_ledger;

/// Append-only balance change. Rows are never mutated or deleted; the
/// user's balance is always SUM(amount) over their rows.
#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = credit_ledger)]
pub struct CreditLedgerEntryEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: String,
    pub purchase_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = credit_ledger)]
pub struct InsertCreditLedgerEntryEntity {
    pub user_id: Uuid,
    pub amount: i32,
    pub reason: String,
    pub purchase_ref: Option<String>,
}
