use std::path::Path;

use async_trait::async_trait;
use google_cloud_storage::client::{
    google_cloud_auth::credentials::CredentialsFile, Client, ClientConfig,
};
use google_cloud_storage::http::buckets::get::GetBucketRequest;
use google_cloud_storage::http::buckets::insert::{
    BucketCreationConfig, InsertBucketParam, InsertBucketRequest,
};
use google_cloud_storage::http::objects::download::Range;
use google_cloud_storage::http::objects::get::GetObjectRequest;
use google_cloud_storage::http::objects::upload::{Media, UploadObjectRequest, UploadType};
use google_cloud_storage::http::Error as GcsError;
use tracing::debug;

use crate::cloud::ObjectStore;
use crate::error::StorageError;

/// Google Cloud Storage backend. Credentials are passed in explicitly; the
/// client never consults ambient environment configuration.
pub struct GcsStore {
    client: Client,
    project_id: String,
}

impl GcsStore {
    pub async fn new(credentials: &Path, project_id: &str) -> Result<Self, StorageError> {
        let creds = CredentialsFile::new_from_file(credentials.display().to_string())
            .await
            .map_err(|e| StorageError::Backend(format!("reading credentials: {e}")))?;
        let config = ClientConfig::default()
            .with_credentials(creds)
            .await
            .map_err(|e| StorageError::Backend(format!("authenticating to GCS: {e}")))?;
        Ok(Self {
            client: Client::new(config),
            project_id: project_id.to_string(),
        })
    }
}

fn is_not_found(err: &GcsError) -> bool {
    matches!(err, GcsError::Response(r) if r.code == 404)
}

#[async_trait]
impl ObjectStore for GcsStore {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool, StorageError> {
        let req = GetBucketRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        match self.client.get_bucket(&req).await {
            Ok(_) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(StorageError::Bucket(e.to_string())),
        }
    }

    async fn create_bucket(&self, bucket: &str, location: &str) -> Result<(), StorageError> {
        let req = InsertBucketRequest {
            name: bucket.to_string(),
            param: InsertBucketParam {
                project: self.project_id.clone(),
                ..Default::default()
            },
            bucket: BucketCreationConfig {
                location: location.to_string(),
                ..Default::default()
            },
        };
        self.client
            .insert_bucket(&req)
            .await
            .map_err(|e| StorageError::Bucket(e.to_string()))?;
        debug!(bucket, location, "bucket created");
        Ok(())
    }

    async fn upload(
        &self,
        bucket: &str,
        object: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        let mut media = Media::new(object.to_string());
        media.content_type = content_type.to_string().into();
        let req = UploadObjectRequest {
            bucket: bucket.to_string(),
            ..Default::default()
        };
        self.client
            .upload_object(&req, data, &UploadType::Simple(media))
            .await
            .map_err(|e| StorageError::Upload(e.to_string()))?;
        Ok(())
    }

    async fn download(&self, bucket: &str, object: &str) -> Result<Vec<u8>, StorageError> {
        let req = GetObjectRequest {
            bucket: bucket.to_string(),
            object: object.to_string(),
            ..Default::default()
        };
        match self.client.download_object(&req, &Range::default()).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if is_not_found(&e) => Err(StorageError::NotFound(object.to_string())),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }
}
