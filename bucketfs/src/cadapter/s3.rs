//! S3 adapter: aws-sdk-s3 implementation with ranged reads, paged listing,
//! MD5-checked puts and multipart upload for large objects.
//!
//! Credentials and region come only from `S3Config`; the SDK's environment
//! and profile provider chain is never consulted.

use crate::cadapter::client::{ByteRange, ListPage, ObjectBackend, ObjectEntry, ObjectHead};
use crate::error::{Error, Result};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use bytes::Bytes;
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Static credentials handed to the client at construction.
#[derive(Debug, Clone, Default)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// S3 backend configuration options
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Bucket name
    pub bucket: String,
    /// Region, `us-east-1` when not specified
    pub region: Option<String>,
    /// Custom endpoint URL (e.g. for MinIO or rustfs)
    pub endpoint: Option<String>,
    /// Force path-style addressing (required by most S3-compatible services)
    pub force_path_style: bool,
    pub credentials: S3Credentials,
    /// Objects above this size go through multipart upload (default: 8MB)
    pub part_size: usize,
    /// Maximum concurrent part uploads (default: 4)
    pub max_concurrency: usize,
    /// Send Content-MD5 with every upload (default: true)
    pub enable_md5: bool,
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: None,
            endpoint: None,
            force_path_style: false,
            credentials: S3Credentials::default(),
            part_size: 8 * 1024 * 1024, // 8MB
            max_concurrency: 4,
            enable_md5: true,
        }
    }
}

#[derive(Clone)]
pub struct S3Backend {
    client: Client,
    config: S3Config,
}

impl S3Backend {
    pub fn with_config(config: S3Config) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::usage("bucket name cannot be empty"));
        }
        let creds = &config.credentials;
        if creds.access_key_id.is_empty() || creds.secret_access_key.is_empty() {
            return Err(Error::usage("S3 access key id and secret key are required"));
        }

        let credentials = Credentials::new(
            creds.access_key_id.clone(),
            creds.secret_access_key.clone(),
            creds.session_token.clone(),
            None,
            "bucketfs",
        );
        let region = config.region.clone().unwrap_or_else(|| "us-east-1".into());
        let mut builder = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region))
            .credentials_provider(credentials)
            .retry_config(RetryConfig::disabled())
            .force_path_style(config.force_path_style);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            config,
        })
    }

    fn md5_base64(data: &[u8]) -> String {
        let sum = md5::compute(data);
        B64.encode(sum.0)
    }

    async fn put_object_simple(&self, key: &str, data: Bytes) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(key);
        if self.config.enable_md5 {
            request = request.content_md5(Self::md5_base64(&data));
        }
        request
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn multipart_upload(&self, key: &str, data: Bytes) -> Result<()> {
        let create = self
            .client
            .create_multipart_upload()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        let upload_id = create
            .upload_id()
            .ok_or_else(|| Error::Decode("missing upload_id in create_multipart_upload".into()))?
            .to_string();

        match self.upload_parts(key, &upload_id, data).await {
            Ok(parts) => {
                let completed = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.config.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(completed)
                    .send()
                    .await
                    .map_err(classify)?;
                Ok(())
            }
            Err(e) => {
                if let Err(abort) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.config.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    warn!(key, "abort_multipart_upload failed: {}", DisplayErrorContext(&abort));
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        data: Bytes,
    ) -> Result<Vec<CompletedPart>> {
        let sem = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut parts = Vec::new();
        let mut idx = 0usize;
        let mut part_number = 1i32;

        while idx < data.len() {
            let end = (idx + self.config.part_size).min(data.len());
            let chunk = data.slice(idx..end);
            let sem = sem.clone();
            let pn = part_number;
            parts.push(async move {
                let _permit = sem.acquire().await.map_err(Error::transport)?;
                let mut request = self
                    .client
                    .upload_part()
                    .bucket(&self.config.bucket)
                    .key(key)
                    .upload_id(upload_id)
                    .part_number(pn);
                if self.config.enable_md5 {
                    request = request.content_md5(Self::md5_base64(&chunk));
                }
                let resp = request
                    .body(ByteStream::from(chunk))
                    .send()
                    .await
                    .map_err(classify)?;
                Ok::<_, Error>(
                    CompletedPart::builder()
                        .part_number(pn)
                        .set_e_tag(resp.e_tag().map(str::to_string))
                        .build(),
                )
            });
            idx = end;
            part_number += 1;
        }

        futures::future::try_join_all(parts).await
    }
}

/// Maps an SDK failure onto the crate taxonomy: 404 is `NotFound`, other
/// service responses keep their status and body, undecodable responses are
/// `Decode`, everything else is a transport failure.
fn classify<E>(err: SdkError<E, HttpResponse>) -> Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    if let SdkError::ServiceError(ctx) = &err {
        let raw = ctx.raw();
        let code = raw.status().as_u16();
        if code == 404 {
            return Error::NotFound;
        }
        let body = raw
            .body()
            .bytes()
            .map(|b| String::from_utf8_lossy(b).into_owned())
            .unwrap_or_default();
        return Error::BackendStatus { code, body };
    }
    if let SdkError::ResponseError(_) = &err {
        return Error::Decode(DisplayErrorContext(&err).to_string());
    }
    Error::transport(err)
}

fn to_system_time(t: Option<&DateTime>) -> Option<SystemTime> {
    t.cloned().and_then(|t| SystemTime::try_from(t).ok())
}

#[async_trait]
impl ObjectBackend for S3Backend {
    fn describe(&self) -> String {
        format!("s3://{}", self.config.bucket)
    }

    async fn get_object(&self, key: &str, range: Option<ByteRange>) -> Result<Bytes> {
        let mut request = self.client.get_object().bucket(&self.config.bucket).key(key);
        if let Some(range) = range {
            // Range is an explicit request parameter; a 206 reply is a plain success.
            request = request.range(range.to_header());
        }
        let resp = match request.send().await.map_err(classify) {
            Ok(resp) => resp,
            Err(Error::BackendStatus { code: 416, .. }) if range.is_some() => {
                debug!(key, ?range, "range starts past end of object");
                return Ok(Bytes::new());
            }
            Err(e) => return Err(e),
        };
        let body = resp.body.collect().await.map_err(Error::transport)?;
        Ok(body.into_bytes())
    }

    async fn head_object(&self, key: &str) -> Result<ObjectHead> {
        let resp = self
            .client
            .head_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(ObjectHead {
            size: resp.content_length().unwrap_or_default().max(0) as u64,
            last_modified: to_system_time(resp.last_modified()),
        })
    }

    async fn put_object(&self, key: &str, data: Bytes) -> Result<()> {
        // Small objects use a direct put; large objects use multipart upload.
        if data.len() <= self.config.part_size {
            return self.put_object_simple(key, data).await;
        }
        self.multipart_upload(key, data).await
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        // The SDK reads the response body to completion before returning.
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn list_objects(
        &self,
        prefix: &str,
        max_keys: usize,
        continuation: Option<String>,
    ) -> Result<ListPage> {
        let resp = self
            .client
            .list_objects_v2()
            .bucket(&self.config.bucket)
            .prefix(prefix)
            .max_keys(max_keys.clamp(1, 1000) as i32)
            .set_continuation_token(continuation)
            .send()
            .await
            .map_err(classify)?;

        let entries = resp
            .contents()
            .iter()
            .map(|obj| -> Result<ObjectEntry> {
                let key = obj
                    .key()
                    .ok_or_else(|| Error::Decode("listing entry without key".into()))?;
                Ok(ObjectEntry {
                    key: key.to_string(),
                    size: obj.size().unwrap_or_default().max(0) as u64,
                    last_modified: to_system_time(obj.last_modified()),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let next = if resp.is_truncated().unwrap_or(false) {
            match resp.next_continuation_token() {
                Some(token) => Some(token.to_string()),
                None => {
                    return Err(Error::Decode(
                        "truncated listing without continuation token".into(),
                    ));
                }
            }
        } else {
            None
        };
        Ok(ListPage { entries, next })
    }
}
