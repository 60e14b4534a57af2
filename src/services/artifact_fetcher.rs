//! Build artifact retrieval: metadata lookup, then an inline or external transfer.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DownloadError, NotFoundError, StoreError};
use crate::domain::models::{Artifact, BuildInfo, FileKind, StorageKind};
use crate::domain::ports::CoordinationStore;
use crate::infrastructure::store::paths;

/// Fetches compiled binaries for a build id
pub struct ArtifactFetcher {
    store: Arc<dyn CoordinationStore>,
    http: reqwest::Client,
    preference: Vec<FileKind>,
}

impl ArtifactFetcher {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        preference: Vec<FileKind>,
        download_timeout: Duration,
    ) -> Result<Self, DownloadError> {
        let http = reqwest::Client::builder()
            .timeout(download_timeout)
            .build()
            .map_err(|e| DownloadError::Transfer {
                url: String::new(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            store,
            http,
            preference,
        })
    }

    pub fn preference(&self) -> &[FileKind] {
        &self.preference
    }

    /// Look up the file metadata the agent published for `build_id`.
    pub async fn resolve(&self, build_id: &str) -> Result<BuildInfo, NotFoundError> {
        let path = paths::binary(build_id);
        let Some(mut value) = self.store.read(&path).await? else {
            return Err(NotFoundError::MissingBuild(build_id.to_string()));
        };

        // Inline payloads live under the same node; metadata parsing ignores them.
        if let Value::Object(map) = &mut value {
            map.shift_remove("payloads");
            map.entry("buildId")
                .or_insert_with(|| Value::String(build_id.to_string()));
        }

        serde_json::from_value(value).map_err(|e| {
            NotFoundError::Store(StoreError::Malformed {
                path,
                reason: e.to_string(),
            })
        })
    }

    /// Retrieve the bytes of one file of a build.
    #[instrument(skip(self))]
    pub async fn download(&self, build_id: &str, kind: FileKind) -> Result<Vec<u8>, DownloadError> {
        let info = self.resolve(build_id).await?;
        self.download_resolved(&info, kind).await
    }

    /// Retrieve the most preferred file kind the build provides.
    pub async fn fetch(&self, build_id: &str) -> Result<Artifact, DownloadError> {
        let info = self.resolve(build_id).await?;
        let kind = info
            .preferred_kind(&self.preference)
            .ok_or_else(|| NotFoundError::NoKnownKind {
                build_id: build_id.to_string(),
            })?;

        let bytes = self.download_resolved(&info, kind).await?;
        let filename = info
            .file(kind)
            .map(|f| f.filename.clone())
            .unwrap_or_else(|| format!("{build_id}.{kind}"));

        info!(build_id = %build_id, kind = %kind, size = bytes.len(), "artifact fetched");
        Ok(Artifact {
            build_id: build_id.to_string(),
            kind,
            filename,
            bytes,
        })
    }

    async fn download_resolved(
        &self,
        info: &BuildInfo,
        kind: FileKind,
    ) -> Result<Vec<u8>, DownloadError> {
        let entry = info.file(kind).ok_or_else(|| NotFoundError::MissingFile {
            build_id: info.build_id.clone(),
            kind,
        })?;

        match (info.storage_kind, entry.download_url.as_deref()) {
            (StorageKind::External, Some(url)) if !url.is_empty() => self.transfer(url).await,
            _ => self.read_inline(&info.build_id, kind).await,
        }
    }

    async fn transfer(&self, url: &str) -> Result<Vec<u8>, DownloadError> {
        debug!(url = %url, "downloading external artifact");
        let transfer_error = |e: reqwest::Error| DownloadError::Transfer {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let response = self.http.get(url).send().await.map_err(transfer_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await.map_err(transfer_error)?;
        Ok(bytes.to_vec())
    }

    async fn read_inline(&self, build_id: &str, kind: FileKind) -> Result<Vec<u8>, DownloadError> {
        let missing = || DownloadError::MissingPayload {
            build_id: build_id.to_string(),
            kind,
        };

        let value = self
            .store
            .read(&paths::payload(build_id, kind))
            .await
            .map_err(DownloadError::Store)?
            .ok_or_else(missing)?;
        let encoded = value.as_str().ok_or_else(missing)?;

        decode_payload(encoded).map_err(|e| DownloadError::Decode {
            build_id: build_id.to_string(),
            kind,
            reason: e.to_string(),
        })
    }
}

/// Decode a base64 payload, tolerating a `data:` URI prefix and line breaks.
fn decode_payload(encoded: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let body = match encoded.strip_prefix("data:") {
        Some(uri) => uri.split_once(',').map_or(uri, |(_, data)| data),
        None => encoded,
    };
    let compact: String = body.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD.decode(compact)
}
