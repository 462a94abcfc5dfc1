//! Audit copy of every upload in object storage.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use aws_sdk_s3::{error::DisplayErrorContext, primitives::ByteStream, types::ObjectCannedAcl};
use chrono::{Datelike, Local, NaiveDateTime};
use log::info;

use crate::{Error, Result, Timer, UploadedImage};

/// A single object to store.
#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub public_read: bool,
}

/// Blob store with a put-object operation.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, object: PutObject) -> Result<()>;
}

/// Amazon S3.
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        S3Store { client }
    }

    /// Client configured from the environment (region, credentials), as
    /// provided by the Lambda runtime.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        S3Store::new(aws_sdk_s3::Client::new(&config))
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put_object(&self, object: PutObject) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .content_type(object.content_type)
            .body(ByteStream::from(object.body));

        if object.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await.map_err(|err| Error::Storage {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            reason: DisplayErrorContext(&err).to_string(),
        })?;

        Ok(())
    }
}

/// In-process store, keyed by `(bucket, key)`.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect();
        keys.sort();
        keys
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn put_object(&self, object: PutObject) -> Result<()> {
        self.objects
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((object.bucket, object.key), object.body);
        Ok(())
    }
}

/// `{year}/{month}/{day}/{HHMMSS}.{format}`; month and day are not padded.
pub fn archive_key(at: NaiveDateTime, format_name: &str) -> String {
    format!(
        "{}/{}/{}/{}.{}",
        at.year(),
        at.month(),
        at.day(),
        at.format("%H%M%S"),
        format_name
    )
}

/// Writes uploads, unmodified and publicly readable, into one bucket.
pub struct Archiver<S> {
    store: S,
    bucket: String,
}

impl<S: ObjectStore> Archiver<S> {
    pub fn new(store: S, bucket: impl Into<String>) -> Self {
        Archiver {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Archive under the current local time. Returns the object key.
    pub async fn archive(&self, upload: &UploadedImage) -> Result<String> {
        self.archive_at(upload, Local::now().naive_local()).await
    }

    pub async fn archive_at(&self, upload: &UploadedImage, at: NaiveDateTime) -> Result<String> {
        let mut t = Timer::new_start("Archiving image");

        let key = archive_key(at, &upload.format_name());

        self.store
            .put_object(PutObject {
                bucket: self.bucket.clone(),
                key: key.clone(),
                body: upload.bytes().to_vec(),
                content_type: upload.content_type(),
                public_read: true,
            })
            .await?;

        t.stop();
        info!("Archived upload to {}/{}", self.bucket, key);

        Ok(key)
    }
}
