//! Google Cloud Storage backend.

use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::error::{BackendConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider, url_with_key};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) async fn construct_gcs(
        config: GcsConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let context = BackendConfigSnafu { backend: "GCS" };
        let mut builder = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(&config.bucket)
            .with_retry(RetryConfig::default());
        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(context)?, value.clone());
        }
        if let Ok(service_account_key) = std::env::var("GOOGLE_SERVICE_ACCOUNT_KEY") {
            debug!("Using GOOGLE_SERVICE_ACCOUNT_KEY for bucket {}", config.bucket);
            builder = builder.with_service_account_key(&service_account_key);
        }

        let canonical_url = url_with_key(format!("gs://{}", config.bucket), config.key.as_ref());
        let object_store: Arc<dyn ObjectStore> = Arc::new(builder.build().context(context)?);

        Ok(Self {
            config: BackendConfig::Gcs(config),
            object_store,
            // GCS multipart parts have a 5 MiB floor, so per-file blocks are
            // staged as objects and stitched at commit instead.
            block_store: None,
            canonical_url,
        })
    }
}
