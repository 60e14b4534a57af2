use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Identifier of a successful build (assigned by the agent)
pub type BuildId = String;

/// Firmware artifact kinds the orchestrator knows how to fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Bin,
    Hex,
    Elf,
}

impl FileKind {
    pub const ALL: [Self; 3] = [Self::Bin, Self::Hex, Self::Elf];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bin => "bin",
            Self::Hex => "hex",
            Self::Elf => "elf",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FileKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bin" => Ok(Self::Bin),
            "hex" => Ok(Self::Hex),
            "elf" => Ok(Self::Elf),
            _ => Err(anyhow::anyhow!("Invalid file kind: {s}")),
        }
    }
}

/// Where the artifact bytes live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    /// Base64 payload inside the coordination store
    #[serde(alias = "database")]
    Inline,
    /// Object storage, fetched by URL
    #[serde(alias = "storage")]
    External,
}

/// Per-file metadata under `binaries/{buildId}/files/{kind}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub filename: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

/// Build metadata record at `binaries/{buildId}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub build_id: BuildId,

    pub storage_kind: StorageKind,

    /// Keyed by file kind name; unknown kinds are carried but never fetched
    #[serde(default)]
    pub files: HashMap<String, FileEntry>,
}

impl BuildInfo {
    pub fn file(&self, kind: FileKind) -> Option<&FileEntry> {
        self.files.get(kind.as_str())
    }

    /// First kind from `preference` that this build provides
    pub fn preferred_kind(&self, preference: &[FileKind]) -> Option<FileKind> {
        preference.iter().copied().find(|kind| self.file(*kind).is_some())
    }
}

/// Downloaded firmware file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub build_id: BuildId,
    pub kind: FileKind,
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Metadata handed to the persistence layer to enrich a version-history entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinaryMeta {
    pub kind: FileKind,
    pub filename: String,
    pub size: u64,
}

/// Result of a completed job as reported to hooks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildResult {
    pub build_id: BuildId,
    pub binary_meta: BinaryMeta,
}

impl From<&Artifact> for BuildResult {
    fn from(artifact: &Artifact) -> Self {
        Self {
            build_id: artifact.build_id.clone(),
            binary_meta: BinaryMeta {
                kind: artifact.kind,
                filename: artifact.filename.clone(),
                size: artifact.bytes.len() as u64,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_info_parses_and_prefers() {
        let info: BuildInfo = serde_json::from_value(json!({
            "buildId": "B1",
            "storageKind": "inline",
            "files": {
                "elf": {"filename": "sketch.elf"},
                "hex": {"filename": "sketch.hex"},
                "map": {"filename": "sketch.map"}
            }
        }))
        .unwrap();

        assert_eq!(info.storage_kind, StorageKind::Inline);
        assert_eq!(
            info.preferred_kind(&[FileKind::Bin, FileKind::Hex, FileKind::Elf]),
            Some(FileKind::Hex)
        );
        assert_eq!(info.preferred_kind(&[FileKind::Elf]), Some(FileKind::Elf));
        assert_eq!(info.preferred_kind(&[FileKind::Bin]), None);
    }

    #[test]
    fn test_storage_kind_aliases() {
        let kind: StorageKind = serde_json::from_value(json!("storage")).unwrap();
        assert_eq!(kind, StorageKind::External);
    }

    #[test]
    fn test_build_result_from_artifact() {
        let artifact = Artifact {
            build_id: "B1".to_string(),
            kind: FileKind::Bin,
            filename: "fw.bin".to_string(),
            bytes: vec![1, 2, 3],
        };
        let result = BuildResult::from(&artifact);
        assert_eq!(result.binary_meta.size, 3);
        assert_eq!(result.binary_meta.kind, FileKind::Bin);
    }
}
