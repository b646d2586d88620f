//! Azure Blob Storage backend. The only cloud backend with native block
//! staging.

use object_store::azure::MicrosoftAzureBuilder;
use object_store::multipart::MultipartStore;
use object_store::path::Path;
use object_store::{ObjectStore, RetryConfig};
use snafu::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{BackendConfigSnafu, StorageError};

use super::{BackendConfig, StorageProvider, url_with_key};

/// Storage account and container parsed from an `abfss://` or blob URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AzureConfig {
    pub account: String,
    pub container: String,
    pub key: Option<Path>,
}

impl StorageProvider {
    pub(super) async fn construct_azure(
        config: AzureConfig,
        options: HashMap<String, String>,
    ) -> Result<Self, StorageError> {
        let context = BackendConfigSnafu { backend: "Azure" };
        let mut builder = MicrosoftAzureBuilder::from_env()
            .with_account(&config.account)
            .with_container_name(&config.container)
            .with_retry(RetryConfig::default());
        for (key, value) in &options {
            builder = builder.with_config(key.parse().context(context)?, value.clone());
        }

        let base = format!(
            "https://{}.blob.core.windows.net/{}",
            config.account, config.container
        );
        let canonical_url = url_with_key(base, config.key.as_ref());

        let azure_store = Arc::new(builder.build().context(context)?);
        // Block blobs: Put Block stages a part of any size, Put Block List commits
        let block_store: Option<Arc<dyn MultipartStore>> = Some(azure_store.clone());
        let object_store: Arc<dyn ObjectStore> = azure_store;

        Ok(Self {
            config: BackendConfig::Azure(config),
            object_store,
            block_store,
            canonical_url,
        })
    }
}
