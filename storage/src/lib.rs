use async_trait::async_trait;

use aws_credential_types::Credentials;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::Client;
use aws_smithy_types::timeout_config::TimeoutConfig;

use reportomat_common::config::StorageConfig;
use reportomat_types::{is_transient_status, Classified, ErrorCode};

/// The object store seam the core depends on, generalized from the
/// teacher's direct `self.s3` field (`server/src/main.rs`'s
/// `archive_store`/`archive_load`) into an injectable trait so the
/// report pipeline can run against a fake store in tests.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get_text(&self, key: &str) -> Result<String, Classified>;
    async fn put_text(&self, key: &str, body: String) -> Result<(), Classified>;
    async fn put_bytes(&self, key: &str, body: Vec<u8>) -> Result<(), Classified>;
    async fn delete(&self, key: &str) -> Result<(), Classified>;
}

/// S3-compatible object store client, configured with explicit
/// endpoint/region/credentials per §4.2/§6 rather than relying on the
/// ambient AWS credential chain -- most deployments of this crate point
/// at an S3-compatible store that isn't AWS itself.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub async fn connect(config: &StorageConfig) -> S3Store {
        let creds = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "reportomat-static",
        );

        let timeout_config = TimeoutConfig::builder()
            .operation_timeout(config.request_timeout)
            .build();

        let shared_config = aws_config::ConfigLoader::default()
            .region(Region::new(config.region.clone()))
            .credentials_provider(creds)
            .endpoint_url(config.endpoint.clone())
            .timeout_config(timeout_config)
            .load()
            .await;

        let s3_config = aws_sdk_s3::config::Builder::from(&shared_config)
            .force_path_style(true)
            .build();

        S3Store { client: Client::from_conf(s3_config), bucket: config.bucket.clone() }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn get_text(&self, key: &str) -> Result<String, Classified> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, ErrorCode::S3ReadFailed))?;

        let body = res
            .body
            .collect()
            .await
            .map_err(|e| Classified::new(ErrorCode::S3ReadFailed, true, e.to_string()))?
            .to_vec();

        String::from_utf8(body)
            .map_err(|e| Classified::fatal(ErrorCode::S3ReadFailed, e.to_string()))
    }

    async fn put_text(&self, key: &str, body: String) -> Result<(), Classified> {
        self.put_bytes(key, body.into_bytes()).await
    }

    async fn put_bytes(&self, key: &str, body: Vec<u8>) -> Result<(), Classified> {
        let len = body.len() as i64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_length(len)
            .body(body.into())
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, ErrorCode::S3PutFailed))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Classified> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(&e, ErrorCode::S3WriteFailed))?;
        Ok(())
    }
}

fn classify_sdk_error<E: std::fmt::Display>(
    err: &SdkError<E>,
    code: ErrorCode,
) -> Classified {
    let retriable = match err {
        SdkError::TimeoutError(_) => true,
        SdkError::DispatchFailure(_) => true,
        SdkError::ResponseError(e) => {
            is_transient_status(e.raw().status().as_u16())
        }
        SdkError::ServiceError(e) => is_transient_status(e.raw().status().as_u16()),
        _ => false,
    };
    Classified::new(code, retriable, err.to_string())
}

/// In-memory store used by the core's tests so the report pipeline can
/// be exercised without a running S3-compatible service.
#[cfg(any(test, feature = "testing"))]
pub mod fake {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeObjectStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
    }

    impl FakeObjectStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed_text(&self, key: &str, body: &str) {
            self.objects.lock().unwrap().insert(key.to_string(), body.as_bytes().to_vec());
        }

        pub fn contains(&self, key: &str) -> bool {
            self.objects.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl ObjectStore for FakeObjectStore {
        async fn get_text(&self, key: &str) -> Result<String, Classified> {
            let objects = self.objects.lock().unwrap();
            match objects.get(key) {
                Some(bytes) => String::from_utf8(bytes.clone())
                    .map_err(|e| Classified::fatal(ErrorCode::S3ReadFailed, e.to_string())),
                None => Err(Classified::fatal(
                    ErrorCode::S3ReadFailed,
                    format!("no such object: {key}"),
                )),
            }
        }

        async fn put_text(&self, key: &str, body: String) -> Result<(), Classified> {
            self.objects.lock().unwrap().insert(key.to_string(), body.into_bytes());
            Ok(())
        }

        async fn put_bytes(&self, key: &str, body: Vec<u8>) -> Result<(), Classified> {
            self.objects.lock().unwrap().insert(key.to_string(), body);
            Ok(())
        }

        async fn delete(&self, key: &str) -> Result<(), Classified> {
            self.objects.lock().unwrap().remove(key);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeObjectStore;
    use super::*;

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = FakeObjectStore::new();
        store.put_text("k", "hello".to_string()).await.unwrap();
        assert_eq!(store.get_text("k").await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn get_on_missing_key_fails() {
        let store = FakeObjectStore::new();
        let err = store.get_text("missing").await.unwrap_err();
        assert_eq!(err.code, ErrorCode::S3ReadFailed);
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let store = FakeObjectStore::new();
        store.put_text("k", "hello".to_string()).await.unwrap();
        store.delete("k").await.unwrap();
        assert!(!store.contains("k"));
        assert!(store.get_text("k").await.is_err());
    }
}
