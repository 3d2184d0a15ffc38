use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::credit_packages;

/// Purchasable credit bundle. Configured out-of-band; read-only here.
#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = credit_packages)]
pub struct CreditPackageEntity {
    pub id: Uuid,
    pub name: String,
    pub price_minor: i32,
    pub currency: String,
    pub credits: i32,
    pub stripe_price_id: Option<String>,
    pub is_active: bool,
    pub is_popular: bool,
    pub sort_order: i32,
    pub features: serde_json::Value,
}
