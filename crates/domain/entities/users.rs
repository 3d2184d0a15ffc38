use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::app_users;

#[derive(Debug, Clone, Serialize, Identifiable, Selectable, Queryable)]
#[diesel(table_name = app_users)]
pub struct UserEntity {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub preferred_locale: String,
    pub last_login_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row written on every successful sign-in; `id` is the identity-provider
/// subject and never changes after the first insert.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = app_users)]
pub struct UpsertUserEntity {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub preferred_locale: String,
    pub last_login_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
