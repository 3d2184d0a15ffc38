use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

#[async_trait]
#[automock]
pub trait MediaStorageClient: Send + Sync {
    async fn upload_media(
        &self,
        object_key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    async fn delete_object(&self, object_key: &str) -> Result<()>;

    /// Publicly reachable URL for a stored object key.
    fn public_url(&self, object_key: &str) -> String;
}
