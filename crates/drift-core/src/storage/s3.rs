//! S3 and S3-compatible backends.

use object_store::aws::AmazonS3Builder;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BackendConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider, url_with_key};

/// Bucket location parsed from an `s3://` or S3 HTTPS URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack).
    pub endpoint: Option<String>,
    pub region: Option<String>,
    pub bucket: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) async fn construct_s3(
        config: S3Config,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let context = BackendConfigSnafu { backend: "S3" };
        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());
        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(context)?, value.clone());
        }
        if let Some(region) = &config.region {
            builder = builder.with_region(region);
        }
        if let Some(endpoint) = &config.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_virtual_hosted_style_request(false)
                .with_allow_http(true);
        }

        let base = match &config.endpoint {
            Some(endpoint) => format!("s3::{endpoint}/{}", config.bucket),
            None => format!("s3://{}", config.bucket),
        };
        let canonical_url = url_with_key(base, config.key.as_ref());
        let object_store: Arc<dyn ObjectStore> = Arc::new(builder.build().context(context)?);

        Ok(Self {
            config: BackendConfig::S3(config),
            object_store,
            // S3 rejects multipart parts under 5 MiB (except the last one),
            // which rules out one part per source file.
            block_store: None,
            canonical_url,
        })
    }
}
