use crate::{auth::AuthUser, usecases::notifications::NotificationsUseCase};
use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use crates::{
    domain::repositories::notifications::NotificationRepository,
    events::notification_hub::NotificationHub,
    infra::db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::notifications::NotificationPostgres,
    },
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadBody {
    id: Option<String>,
    mark_all: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteQuery {
    id: Option<String>,
    clear_all: Option<bool>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, notification_hub: Arc<NotificationHub>) -> Router {
    let notification_repository = NotificationPostgres::new(Arc::clone(&db_pool));
    let usecase = NotificationsUseCase::new(Arc::new(notification_repository), notification_hub);

    Router::new()
        .route("/", get(list).patch(mark_read).delete(delete))
        .with_state(Arc::new(usecase))
}

pub async fn list<N>(
    State(usecase): State<Arc<NotificationsUseCase<N>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    N: NotificationRepository + Send + Sync + 'static,
{
    match usecase.list(user_id).await {
        Ok(notifications) => Json(notifications).into_response(),
        Err(err) => {
            error!(%user_id, error = ?err, "notifications router: list failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load notifications".to_string(),
            )
                .into_response()
        }
    }
}

pub async fn mark_read<N>(
    State(usecase): State<Arc<NotificationsUseCase<N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Json(body): Json<MarkReadBody>,
) -> impl IntoResponse
where
    N: NotificationRepository + Send + Sync + 'static,
{
    let notification_id = match parse_target(body.id.as_deref(), body.mark_all) {
        Ok(target) => target,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    match usecase.mark_read(user_id, notification_id).await {
        Ok(updated) => Json(json!({ "updated": updated })).into_response(),
        Err(err) => {
            error!(%user_id, error = ?err, "notifications router: mark read failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to update notifications".to_string(),
            )
                .into_response()
        }
    }
}

pub async fn delete<N>(
    State(usecase): State<Arc<NotificationsUseCase<N>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<DeleteQuery>,
) -> impl IntoResponse
where
    N: NotificationRepository + Send + Sync + 'static,
{
    let notification_id = match parse_target(query.id.as_deref(), query.clear_all) {
        Ok(target) => target,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    match usecase.delete(user_id, notification_id).await {
        Ok(deleted) => Json(json!({ "deleted": deleted })).into_response(),
        Err(err) => {
            error!(%user_id, error = ?err, "notifications router: delete failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to delete notifications".to_string(),
            )
                .into_response()
        }
    }
}

/// `Ok(Some(id))` targets one notification, `Ok(None)` targets them all.
fn parse_target(id: Option<&str>, all_flag: Option<bool>) -> Result<Option<Uuid>, String> {
    match (id, all_flag) {
        (Some(raw_id), _) => Uuid::parse_str(raw_id)
            .map(Some)
            .map_err(|_| "id must be a valid UUID".to_string()),
        (None, Some(true)) => Ok(None),
        _ => Err("id or the all flag is required".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_requires_id_or_all_flag() {
        assert!(parse_target(None, None).is_err());
        assert!(parse_target(None, Some(false)).is_err());
        assert_eq!(parse_target(None, Some(true)), Ok(None));

        let id = Uuid::new_v4();
        assert_eq!(
            parse_target(Some(&id.to_string()), None),
            Ok(Some(id))
        );
        assert!(parse_target(Some("not-a-uuid"), None).is_err());
    }
}
