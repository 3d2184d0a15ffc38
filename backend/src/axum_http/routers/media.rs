use crate::{
    auth::AuthUser,
    usecases::media::{MediaError, MediaUseCase},
};
use axum::{
    Json, Router,
    extract::{Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};
use crates::{
    domain::repositories::{storage::MediaStorageClient, uploads::UploadRepository},
    infra::db::{
        postgres::postgres_connection::PgPoolSquad, repositories::uploads::UploadPostgres,
    },
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct DeleteMediaQuery {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMediaBody {
    id: Option<String>,
}

pub fn routes(db_pool: Arc<PgPoolSquad>, storage: Arc<dyn MediaStorageClient>) -> Router {
    let upload_repository = UploadPostgres::new(Arc::clone(&db_pool));
    let usecase = MediaUseCase::new(Arc::new(upload_repository), storage);

    Router::new()
        .route("/api/upload", post(upload))
        .route("/api/media", delete(delete_media))
        .route("/api/generations", get(list_generations))
        .with_state(Arc::new(usecase))
}

pub async fn upload<U>(
    State(usecase): State<Arc<MediaUseCase<U>>>,
    AuthUser { user_id, .. }: AuthUser,
    mut multipart: Multipart,
) -> impl IntoResponse
where
    U: UploadRepository + Send + Sync + 'static,
{
    let mut declared_type: Option<String> = None;
    let mut filename: Option<String> = None;
    let mut bytes: Option<Vec<u8>> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                return (
                    StatusCode::BAD_REQUEST,
                    format!("invalid multipart body: {err}"),
                )
                    .into_response();
            }
        };

        match field.name() {
            Some("type") => match field.text().await {
                Ok(value) => declared_type = Some(value),
                Err(err) => {
                    return (
                        StatusCode::BAD_REQUEST,
                        format!("invalid type field: {err}"),
                    )
                        .into_response();
                }
            },
            Some("file") => {
                filename = field.file_name().map(|name| name.to_string());
                match field.bytes().await {
                    Ok(data) => bytes = Some(data.to_vec()),
                    Err(err) => {
                        return (
                            StatusCode::BAD_REQUEST,
                            format!("invalid file field: {err}"),
                        )
                            .into_response();
                    }
                }
            }
            _ => {}
        }
    }

    let Some(bytes) = bytes else {
        return (StatusCode::BAD_REQUEST, "file field is required".to_string()).into_response();
    };
    let Some(declared_type) = declared_type else {
        return (StatusCode::BAD_REQUEST, "type field is required".to_string()).into_response();
    };
    let filename = filename.unwrap_or_else(|| "upload".to_string());

    match usecase.upload(user_id, &filename, &declared_type, bytes).await {
        Ok(upload) => Json(json!({
            "id": upload.id,
            "path": upload.path,
            "url": upload.url,
            "upload": upload,
        }))
        .into_response(),
        Err(err) => media_error_response(err, user_id),
    }
}

pub async fn delete_media<U>(
    State(usecase): State<Arc<MediaUseCase<U>>>,
    AuthUser { user_id, .. }: AuthUser,
    Query(query): Query<DeleteMediaQuery>,
    body: Option<Json<DeleteMediaBody>>,
) -> impl IntoResponse
where
    U: UploadRepository + Send + Sync + 'static,
{
    let body_id = body.and_then(|Json(body)| body.id);
    let upload_id = match requested_upload_id(query.id.as_deref(), body_id.as_deref()) {
        Ok(upload_id) => upload_id,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    match usecase.delete(user_id, upload_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => media_error_response(err, user_id),
    }
}

/// The id may arrive as `?id=` or as a JSON body `{id}`; the query wins
/// when both are present.
fn requested_upload_id(query_id: Option<&str>, body_id: Option<&str>) -> Result<Uuid, String> {
    let raw = query_id
        .or(body_id)
        .ok_or_else(|| "id is required".to_string())?;
    Uuid::parse_str(raw).map_err(|_| "id must be a valid UUID".to_string())
}

pub async fn list_generations<U>(
    State(usecase): State<Arc<MediaUseCase<U>>>,
    AuthUser { user_id, .. }: AuthUser,
) -> impl IntoResponse
where
    U: UploadRepository + Send + Sync + 'static,
{
    match usecase.list_for_user(user_id).await {
        Ok(uploads) => Json(uploads).into_response(),
        Err(err) => media_error_response(err, user_id),
    }
}

fn media_error_response(err: MediaError, user_id: Uuid) -> axum::response::Response {
    let status = err.status_code();
    let message = match &err {
        MediaError::InvalidMediaType(_)
        | MediaError::PayloadTooLarge { .. }
        | MediaError::NotFound
        | MediaError::Forbidden => err.to_string(),
        MediaError::UploadFailed(_) | MediaError::Internal(_) => {
            error!(%user_id, error = ?err, "media router: request failed");
            "Internal server error".to_string()
        }
    };

    (status, Json(json!({ "code": status.as_u16(), "message": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::{
        entities::uploads::UploadEntity,
        repositories::{storage::MockMediaStorageClient, uploads::MockUploadRepository},
    };

    #[test]
    fn upload_id_comes_from_query_or_body() {
        let id = Uuid::new_v4();
        let id_str = id.to_string();

        assert_eq!(requested_upload_id(Some(&id_str), None), Ok(id));
        assert_eq!(requested_upload_id(None, Some(&id_str)), Ok(id));

        // Query takes precedence when both are supplied.
        let other = Uuid::new_v4().to_string();
        assert_eq!(requested_upload_id(Some(&id_str), Some(&other)), Ok(id));

        assert_eq!(
            requested_upload_id(None, None),
            Err("id is required".to_string())
        );
        assert_eq!(
            requested_upload_id(None, Some("not-a-uuid")),
            Err("id must be a valid UUID".to_string())
        );
    }

    #[tokio::test]
    async fn delete_accepts_id_in_json_body() {
        let user_id = Uuid::new_v4();
        let upload_id = Uuid::new_v4();

        let mut repo = MockUploadRepository::new();
        repo.expect_find_by_id()
            .with(mockall::predicate::eq(upload_id))
            .times(1)
            .returning(move |id| {
                Box::pin(async move {
                    Ok(Some(UploadEntity {
                        id,
                        user_id,
                        path: format!("images/{user_id}/{id}.png"),
                        url: format!("https://cdn.example.com/{id}.png"),
                        media_type: "image".to_string(),
                        size_bytes: 1024,
                        created_at: Utc::now(),
                    }))
                })
            });
        repo.expect_delete()
            .with(mockall::predicate::eq(upload_id))
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let mut storage = MockMediaStorageClient::new();
        storage
            .expect_delete_object()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let usecase = Arc::new(MediaUseCase::new(Arc::new(repo), Arc::new(storage)));
        let response = delete_media(
            State(usecase),
            AuthUser {
                user_id,
                email: None,
                role: "authenticated".to_string(),
            },
            Query(DeleteMediaQuery { id: None }),
            Some(Json(DeleteMediaBody {
                id: Some(upload_id.to_string()),
            })),
        )
        .await
        .into_response();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }
}
