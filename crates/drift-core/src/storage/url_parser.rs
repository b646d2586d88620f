//! URL parsing for storage backends.
//!
//! Maps the URL forms accepted in config files (S3, GCS, Azure, local paths,
//! in-memory) onto a `BackendConfig`. Patterns are tried in a fixed order so
//! that the more specific HTTPS forms win over generic ones.

use object_store::path::Path;
use regex::{Captures, Regex};
use std::sync::LazyLock;

use crate::error::{InvalidUrlSnafu, StorageError};

use super::{AzureConfig, GcsConfig, LocalConfig, MemoryConfig, S3Config};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Backend {
    S3,
    Gcs,
    Azure,
    Local,
    Memory,
}

const PATTERNS: &[(Backend, &str)] = &[
    (
        Backend::S3,
        r"^https://s3\.(?P<region>[\w\-]+)\.amazonaws\.com/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
    ),
    (
        Backend::S3,
        r"^https://(?P<bucket>[a-z0-9\-\.]+)\.s3\.(?P<region>[\w\-]+)\.amazonaws\.com(/(?P<key>.+))?$",
    ),
    (
        Backend::S3,
        r"^[sS]3[aA]?::(?P<protocol>https?)://(?P<endpoint>[^:/]+):(?P<port>\d+)/(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
    ),
    (
        Backend::S3,
        r"^[sS]3[aA]?://(?P<bucket>[a-z0-9\-\.]+)(/(?P<key>.+))?$",
    ),
    (
        Backend::Gcs,
        r"^https://storage\.googleapis\.com/(?P<bucket>[a-z0-9\-_\.]+)(/(?P<key>.+))?$",
    ),
    (
        Backend::Gcs,
        r"^https://(?P<bucket>[a-z0-9\-_\.]+)\.storage\.googleapis\.com(/(?P<key>.+))?$",
    ),
    (
        Backend::Gcs,
        r"^[gG][sS]://(?P<bucket>[a-z0-9\-\._]+)(/(?P<key>.+))?$",
    ),
    (
        Backend::Azure,
        r"^abfss?://(?P<container>[a-z0-9\-]+)@(?P<account>[a-z0-9]+)\.dfs\.core\.windows\.net(/(?P<key>.+))?$",
    ),
    (
        Backend::Azure,
        r"^https://(?P<account>[a-z0-9]+)\.(blob|dfs)\.core\.windows\.net/(?P<container>[a-z0-9\-]+)(/(?P<key>.+))?$",
    ),
    (Backend::Memory, r"^memory://(?P<key>.*)$"),
    (Backend::Local, r"^file://(?P<path>.*)$"),
    (Backend::Local, r"^file:(?P<path>.*)$"),
    (Backend::Local, r"^(?P<path>/.*)$"),
];

static MATCHERS: LazyLock<Vec<(Backend, Regex)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .map(|(backend, pattern)| {
            (
                *backend,
                Regex::new(pattern).expect("storage URL pattern must compile"),
            )
        })
        .collect()
});

/// Backend configuration enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendConfig {
    S3(S3Config),
    Gcs(GcsConfig),
    Azure(AzureConfig),
    Local(LocalConfig),
    Memory(MemoryConfig),
}

impl BackendConfig {
    /// Parse a URL into a backend configuration.
    pub fn parse_url(url: &str) -> Result<Self, StorageError> {
        let Some((backend, caps)) = MATCHERS
            .iter()
            .find_map(|(backend, regex)| regex.captures(url).map(|caps| (*backend, caps)))
        else {
            return InvalidUrlSnafu { url }.fail();
        };

        let config = match backend {
            Backend::S3 => Self::from_s3_captures(&caps),
            Backend::Gcs => BackendConfig::Gcs(GcsConfig {
                bucket: group(&caps, "bucket"),
                key: key(&caps),
            }),
            Backend::Azure => BackendConfig::Azure(AzureConfig {
                account: group(&caps, "account"),
                container: group(&caps, "container"),
                key: key(&caps),
            }),
            Backend::Local => Self::from_local_path(&group(&caps, "path")),
            Backend::Memory => BackendConfig::Memory(MemoryConfig { key: key(&caps) }),
        };
        Ok(config)
    }

    fn from_s3_captures(caps: &Captures) -> Self {
        let region = std::env::var("AWS_DEFAULT_REGION")
            .ok()
            .or_else(|| caps.name("region").map(|m| m.as_str().to_string()));

        let endpoint = std::env::var("AWS_ENDPOINT").ok().or_else(|| {
            caps.name("endpoint").map(|host| {
                let protocol = caps.name("protocol").map_or("https", |p| p.as_str());
                let port = caps
                    .name("port")
                    .and_then(|p| p.as_str().parse::<u16>().ok())
                    .unwrap_or(443);
                format!("{protocol}://{}:{port}", host.as_str())
            })
        });

        BackendConfig::S3(S3Config {
            endpoint,
            region,
            bucket: group(caps, "bucket"),
            key: key(caps),
        })
    }

    fn from_local_path(path: &str) -> Self {
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        let path = match path.trim_end_matches('/') {
            "" => "/".to_string(),
            trimmed => trimmed.to_string(),
        };
        BackendConfig::Local(LocalConfig { path })
    }

    /// Key prefix that every relative path is qualified with.
    pub(crate) fn key(&self) -> Option<&Path> {
        match self {
            BackendConfig::S3(s3) => s3.key.as_ref(),
            BackendConfig::Gcs(gcs) => gcs.key.as_ref(),
            BackendConfig::Azure(azure) => azure.key.as_ref(),
            BackendConfig::Memory(memory) => memory.key.as_ref(),
            // The local store is rooted at the configured directory.
            BackendConfig::Local(_) => None,
        }
    }
}

fn group(caps: &Captures, name: &str) -> String {
    caps.name(name)
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn key(caps: &Captures) -> Option<Path> {
    caps.name("key")
        .map(|m| m.as_str().trim_matches('/'))
        .filter(|k| !k.is_empty())
        .map(Path::from)
}
