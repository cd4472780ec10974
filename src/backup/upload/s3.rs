use crate::backup::destination::DestinationConfig;
use crate::backup::function_path;
use crate::backup::result_error::error::Error;
use crate::backup::result_error::result::Result;
use crate::backup::result_error::AddFunctionName;
use crate::backup::upload::{object_key, Uploader};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use function_name::named;
use std::path::Path;
use tokio::runtime::Handle;

/// Uploads archives with a single `PutObject` call.
#[derive(Clone)]
pub struct S3Uploader {
    runtime: Handle,
}

impl S3Uploader {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    async fn put_object(
        &self,
        local_path: &Path,
        key: &str,
        destination: &DestinationConfig,
    ) -> Result<()> {
        let sdk_config = destination.sdk_config().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(destination.endpoint_url().is_some())
            .build();
        let client = aws_sdk_s3::Client::from_conf(s3_config);

        let body = ByteStream::from_path(local_path)
            .await
            .map_err(|e| Error::aws(format!("Reading {:?} failed: {}", local_path, e)))?;

        let output = client
            .put_object()
            .bucket(destination.bucket())
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::aws(DisplayErrorContext(&e).to_string()))?;
        tracing::debug!("PutObject returned etag {:?}", output.e_tag());

        Ok(())
    }
}

impl Uploader for S3Uploader {
    #[named]
    fn upload(&self, local_path: &Path, destination: &DestinationConfig) -> Result<()> {
        let key = object_key(local_path)?;
        tracing::info!(
            "Uploading {:?} to s3://{}/{}",
            local_path,
            destination.bucket(),
            key
        );

        self.runtime
            .block_on(async {
                match destination.upload_timeout() {
                    Some(timeout) => tokio::time::timeout(
                        *timeout,
                        self.put_object(local_path, &key, destination),
                    )
                    .await
                    .unwrap_or_else(|_| Err(Error::timeout(*timeout))),
                    None => self.put_object(local_path, &key, destination).await,
                }
            })
            .add_fn_name(function_path!())
            .map_err(|e| Error::upload(destination.bucket().as_str(), key.as_str(), e))?;

        tracing::info!("Uploaded {:?} to {}", local_path, destination.bucket());
        Ok(())
    }
}
