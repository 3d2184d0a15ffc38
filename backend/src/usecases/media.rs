use std::sync::Arc;

use crates::domain::{
    entities::uploads::{InsertUploadEntity, UploadEntity},
    repositories::{storage::MediaStorageClient, uploads::UploadRepository},
    value_objects::enums::media_types::MediaType,
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("invalid media type: {0}")]
    InvalidMediaType(String),
    #[error("{media_type} exceeds the {limit_bytes} byte limit")]
    PayloadTooLarge {
        media_type: MediaType,
        limit_bytes: u64,
    },
    #[error("upload not found")]
    NotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("failed to store media")]
    UploadFailed(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl MediaError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            // Size violations surface as 400 at the API edge.
            MediaError::InvalidMediaType(_) | MediaError::PayloadTooLarge { .. } => {
                StatusCode::BAD_REQUEST
            }
            MediaError::NotFound => StatusCode::NOT_FOUND,
            MediaError::Forbidden => StatusCode::FORBIDDEN,
            MediaError::UploadFailed(_) | MediaError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, MediaError>;

pub struct MediaUseCase<U>
where
    U: UploadRepository + Send + Sync + 'static,
{
    upload_repository: Arc<U>,
    storage: Arc<dyn MediaStorageClient>,
}

impl<U> MediaUseCase<U>
where
    U: UploadRepository + Send + Sync + 'static,
{
    pub fn new(upload_repository: Arc<U>, storage: Arc<dyn MediaStorageClient>) -> Self {
        Self {
            upload_repository,
            storage,
        }
    }

    pub async fn upload(
        &self,
        user_id: Uuid,
        filename: &str,
        declared_type: &str,
        bytes: Vec<u8>,
    ) -> UseCaseResult<UploadEntity> {
        // Both validations run before anything touches storage.
        let media_type = MediaType::from_str(declared_type).ok_or_else(|| {
            let err = MediaError::InvalidMediaType(declared_type.to_string());
            warn!(
                %user_id,
                declared_type,
                status = err.status_code().as_u16(),
                "media: rejected unsupported media type"
            );
            err
        })?;

        let size_bytes = bytes.len() as u64;
        if size_bytes > media_type.max_bytes() {
            let err = MediaError::PayloadTooLarge {
                media_type,
                limit_bytes: media_type.max_bytes(),
            };
            warn!(
                %user_id,
                media_type = %media_type,
                size_bytes,
                status = err.status_code().as_u16(),
                "media: rejected oversized upload"
            );
            return Err(err);
        }

        let extension = file_extension(filename);
        let object_key = format!(
            "{}/{}/{}.{}",
            user_id,
            media_type.as_str(),
            Uuid::new_v4(),
            extension
        );
        let content_type = content_type_for(media_type, &extension);

        info!(
            %user_id,
            media_type = %media_type,
            size_bytes,
            object_key,
            "media: uploading object"
        );

        self.storage
            .upload_media(&object_key, bytes, content_type)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    object_key,
                    error = ?err,
                    "media: storage upload failed"
                );
                MediaError::UploadFailed(err)
            })?;

        let url = self.storage.public_url(&object_key);
        let entity = InsertUploadEntity {
            user_id,
            path: object_key.clone(),
            url,
            media_type: media_type.as_str().to_string(),
            size_bytes: size_bytes as i64,
        };

        let upload = self.upload_repository.insert(entity).await.map_err(|err| {
            // The stored object is orphaned; cleanup is a manual policy, the
            // failure itself must still surface.
            error!(
                %user_id,
                object_key,
                db_error = ?err,
                "media: metadata insert failed after storage upload, object orphaned"
            );
            MediaError::Internal(err)
        })?;

        info!(%user_id, upload_id = %upload.id, "media: upload recorded");
        Ok(upload)
    }

    pub async fn delete(&self, user_id: Uuid, upload_id: Uuid) -> UseCaseResult<()> {
        let upload = self
            .upload_repository
            .find_by_id(upload_id)
            .await
            .map_err(|err| {
                error!(%user_id, %upload_id, db_error = ?err, "media: failed to load upload");
                MediaError::Internal(err)
            })?
            .ok_or_else(|| {
                let err = MediaError::NotFound;
                warn!(
                    %user_id,
                    %upload_id,
                    status = err.status_code().as_u16(),
                    "media: delete of unknown upload"
                );
                err
            })?;

        if upload.user_id != user_id {
            let err = MediaError::Forbidden;
            warn!(
                %user_id,
                %upload_id,
                owner_id = %upload.user_id,
                status = err.status_code().as_u16(),
                "media: delete of another user's upload"
            );
            return Err(err);
        }

        // The row is authoritative; the object deletion is best-effort.
        self.upload_repository.delete(upload_id).await.map_err(|err| {
            error!(%user_id, %upload_id, db_error = ?err, "media: failed to delete upload row");
            MediaError::Internal(err)
        })?;

        if let Err(err) = self.storage.delete_object(&upload.path).await {
            warn!(
                %user_id,
                %upload_id,
                object_key = upload.path,
                error = ?err,
                "media: object deletion failed, leaving orphan"
            );
        }

        info!(%user_id, %upload_id, "media: upload deleted");
        Ok(())
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> UseCaseResult<Vec<UploadEntity>> {
        self.upload_repository
            .list_for_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "media: failed to list uploads");
                MediaError::Internal(err)
            })
    }
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 8 && ext.chars().all(char::is_alphanumeric))
        .unwrap_or_else(|| "bin".to_string())
}

fn content_type_for(media_type: MediaType, extension: &str) -> &'static str {
    match (media_type, extension) {
        (MediaType::Image, "png") => "image/png",
        (MediaType::Image, "jpg" | "jpeg") => "image/jpeg",
        (MediaType::Image, "webp") => "image/webp",
        (MediaType::Image, "gif") => "image/gif",
        (MediaType::Image, _) => "application/octet-stream",
        (MediaType::Video, "mp4") => "video/mp4",
        (MediaType::Video, "webm") => "video/webm",
        (MediaType::Video, "mov") => "video/quicktime",
        (MediaType::Video, _) => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crates::domain::repositories::{
        storage::MockMediaStorageClient, uploads::MockUploadRepository,
    };

    const MIB: usize = 1024 * 1024;

    fn upload_entity(user_id: Uuid, path: &str) -> UploadEntity {
        UploadEntity {
            id: Uuid::new_v4(),
            user_id,
            path: path.to_string(),
            url: format!("https://cdn.example.com/{path}"),
            media_type: "image".to_string(),
            size_bytes: 1024,
            created_at: Utc::now(),
        }
    }

    fn accepting_storage() -> MockMediaStorageClient {
        let mut storage = MockMediaStorageClient::new();
        storage
            .expect_upload_media()
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        storage
            .expect_public_url()
            .returning(|key| format!("https://cdn.example.com/{key}"));
        storage
    }

    #[tokio::test]
    async fn five_mib_image_is_rejected_before_storage() {
        let mut storage = MockMediaStorageClient::new();
        storage.expect_upload_media().times(0);
        let mut repo = MockUploadRepository::new();
        repo.expect_insert().times(0);

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        let result = usecase
            .upload(Uuid::new_v4(), "photo.png", "image", vec![0u8; 5 * MIB])
            .await;

        assert!(matches!(result, Err(MediaError::PayloadTooLarge { .. })));
    }

    #[tokio::test]
    async fn five_mib_video_is_accepted() {
        let storage = accepting_storage();
        let mut repo = MockUploadRepository::new();
        repo.expect_insert().times(1).returning(|entity| {
            Box::pin(async move {
                Ok(UploadEntity {
                    id: Uuid::new_v4(),
                    user_id: entity.user_id,
                    path: entity.path,
                    url: entity.url,
                    media_type: entity.media_type,
                    size_bytes: entity.size_bytes,
                    created_at: Utc::now(),
                })
            })
        });

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        let upload = usecase
            .upload(Uuid::new_v4(), "clip.mp4", "video", vec![0u8; 5 * MIB])
            .await
            .expect("5 MiB video is under the 64 MiB ceiling");

        assert_eq!(upload.media_type, "video");
        assert_eq!(upload.size_bytes, (5 * MIB) as i64);
    }

    #[tokio::test]
    async fn unsupported_type_fails_before_any_storage_call() {
        let mut storage = MockMediaStorageClient::new();
        storage.expect_upload_media().times(0);
        let repo = MockUploadRepository::new();

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        let result = usecase
            .upload(Uuid::new_v4(), "track.mp3", "audio", vec![0u8; 1024])
            .await;

        assert!(matches!(result, Err(MediaError::InvalidMediaType(_))));
    }

    #[tokio::test]
    async fn object_key_is_namespaced_per_user_and_type() {
        let user_id = Uuid::new_v4();
        let mut storage = MockMediaStorageClient::new();
        let expected_prefix = format!("{}/image/", user_id);
        storage
            .expect_upload_media()
            .withf(move |key, _, content_type| {
                key.starts_with(&expected_prefix)
                    && key.ends_with(".png")
                    && content_type == "image/png"
            })
            .returning(|_, _, _| Box::pin(async { Ok(()) }));
        storage
            .expect_public_url()
            .returning(|key| format!("https://cdn.example.com/{key}"));

        let mut repo = MockUploadRepository::new();
        repo.expect_insert().returning(|entity| {
            Box::pin(async move {
                Ok(UploadEntity {
                    id: Uuid::new_v4(),
                    user_id: entity.user_id,
                    path: entity.path,
                    url: entity.url,
                    media_type: entity.media_type,
                    size_bytes: entity.size_bytes,
                    created_at: Utc::now(),
                })
            })
        });

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        usecase
            .upload(user_id, "photo.PNG", "image", vec![0u8; 1024])
            .await
            .expect("upload succeeds");
    }

    #[tokio::test]
    async fn delete_of_another_users_upload_is_forbidden() {
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();
        let upload = upload_entity(owner, "owner/image/a.png");
        let upload_id = upload.id;

        let mut repo = MockUploadRepository::new();
        repo.expect_find_by_id().returning(move |_| {
            let upload = upload.clone();
            Box::pin(async move { Ok(Some(upload)) })
        });
        repo.expect_delete().times(0);
        let mut storage = MockMediaStorageClient::new();
        storage.expect_delete_object().times(0);

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        let result = usecase.delete(intruder, upload_id).await;

        assert!(matches!(result, Err(MediaError::Forbidden)));
    }

    #[tokio::test]
    async fn delete_of_unknown_upload_is_not_found() {
        let mut repo = MockUploadRepository::new();
        repo.expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(None) }));
        let storage = MockMediaStorageClient::new();

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        let result = usecase.delete(Uuid::new_v4(), Uuid::new_v4()).await;

        assert!(matches!(result, Err(MediaError::NotFound)));
    }

    #[tokio::test]
    async fn row_deletion_survives_best_effort_object_failure() {
        let owner = Uuid::new_v4();
        let upload = upload_entity(owner, "owner/image/b.png");
        let upload_id = upload.id;

        let mut repo = MockUploadRepository::new();
        repo.expect_find_by_id().returning(move |_| {
            let upload = upload.clone();
            Box::pin(async move { Ok(Some(upload)) })
        });
        repo.expect_delete()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        let mut storage = MockMediaStorageClient::new();
        storage
            .expect_delete_object()
            .returning(|_| Box::pin(async { Err(anyhow::anyhow!("object store down")) }));

        let usecase = MediaUseCase::new(Arc::new(repo), Arc::new(storage));
        usecase
            .delete(owner, upload_id)
            .await
            .expect("row deletion is authoritative");
    }

    #[test]
    fn extension_parsing_handles_odd_filenames() {
        assert_eq!(file_extension("photo.png"), "png");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("noext"), "bin");
        assert_eq!(file_extension("trailingdot."), "bin");
        assert_eq!(file_extension("weird.p?g"), "bin");
    }
}
