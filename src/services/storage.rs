use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use bytes::Bytes;

/// Progress callback: (cumulative bytes transferred, total bytes).
/// Invocations are guaranteed non-decreasing in the first argument.
pub type ProgressFn = dyn Fn(u64, u64) + Send + Sync;

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Uploads `data` under `key` and returns a retrieval URL. When a
    /// progress callback is given it is invoked with cumulative byte counts
    /// as the transfer advances; the final invocation of a successful upload
    /// reports the full size.
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<String>;

    async fn delete_object(&self, key: &str) -> Result<()>;

    async fn object_exists(&self, key: &str) -> Result<bool>;

    /// Best-effort removal of any interrupted multipart session under `key`.
    /// Called when a transfer future was dropped mid-flight and may have
    /// left parts behind on the backend.
    async fn abort_pending_upload(&self, key: &str) -> Result<()>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
    chunk_size: usize,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String, chunk_size: usize) -> Self {
        Self {
            client,
            bucket,
            chunk_size,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, key)
    }

    async fn abort_multipart(&self, key: &str, upload_id: &str) {
        if let Err(e) = self
            .client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
        {
            tracing::warn!(key = %key, "Failed to abort multipart upload: {}", e);
        }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn put_object(
        &self,
        key: &str,
        data: Bytes,
        content_type: &str,
        progress: Option<&ProgressFn>,
    ) -> Result<String> {
        let total = data.len() as u64;

        // Small bodies go up in one request; S3 multipart needs 5 MB parts.
        if data.len() <= self.chunk_size {
            self.client
                .put_object()
                .bucket(&self.bucket)
                .key(key)
                .content_type(content_type)
                .body(ByteStream::from(data))
                .send()
                .await?;

            if let Some(report) = progress {
                report(total, total);
            }
            return Ok(self.object_url(key));
        }

        let multipart_upload_res = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await?;

        let upload_id = multipart_upload_res
            .upload_id()
            .ok_or_else(|| anyhow::anyhow!("No upload ID"))?;

        let mut completed_parts = Vec::new();
        let mut transferred: u64 = 0;
        let mut part_number = 1;

        for chunk in data.chunks(self.chunk_size) {
            let upload_part_res = match self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .body(ByteStream::from(chunk.to_vec()))
                .part_number(part_number)
                .send()
                .await
            {
                Ok(res) => res,
                Err(e) => {
                    // Parts already uploaded keep accruing storage until
                    // the session is aborted.
                    self.abort_multipart(key, upload_id).await;
                    return Err(e.into());
                }
            };

            completed_parts.push(
                CompletedPart::builder()
                    .e_tag(upload_part_res.e_tag().unwrap_or_default())
                    .part_number(part_number)
                    .build(),
            );

            transferred += chunk.len() as u64;
            if let Some(report) = progress {
                report(transferred, total);
            }

            part_number += 1;
        }

        let completed_multipart_upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed_parts))
            .build();

        if let Err(e) = self
            .client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_multipart_upload)
            .send()
            .await
        {
            self.abort_multipart(key, upload_id).await;
            return Err(e.into());
        }

        Ok(self.object_url(key))
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn abort_pending_upload(&self, key: &str) -> Result<()> {
        let pending = self
            .client
            .list_multipart_uploads()
            .bucket(&self.bucket)
            .prefix(key)
            .send()
            .await?;

        for upload in pending.uploads() {
            if let (Some(upload_key), Some(upload_id)) = (upload.key(), upload.upload_id()) {
                self.abort_multipart(upload_key, upload_id).await;
            }
        }

        Ok(())
    }

    async fn object_exists(&self, key: &str) -> Result<bool> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await;

        match res {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_error = e.into_service_error();
                if service_error.is_not_found() {
                    Ok(false)
                } else {
                    Err(anyhow::anyhow!(service_error))
                }
            }
        }
    }
}
