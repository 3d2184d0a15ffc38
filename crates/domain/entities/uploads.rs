use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::uploads;

#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = uploads)]
pub struct UploadEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub path: String,
    pub url: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = uploads)]
pub struct InsertUploadEntity {
    pub user_id: Uuid,
    pub path: String,
    pub url: String,
    pub media_type: String,
    pub size_bytes: i64,
}
