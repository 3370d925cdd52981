//! File and archive transfer payloads.
//!
//! Binary `content` travels as base64 text (standard alphabet, padded)
//! inside the JSON frame; the serde helpers below keep handlers working
//! in plain `Vec<u8>`.

use serde::{Deserialize, Serialize};

/// Default download chunk size (1 MiB), matching the controller's
/// chunked-transfer granularity.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

// ── base64 serde helpers ──────────────────────────────────────────

pub mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text).map_err(serde::de::Error::custom)
    }
}

pub mod b64_opt {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let text: Option<String> = Option::deserialize(deserializer)?;
        text.map(|t| STANDARD.decode(t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

// ── Upload ────────────────────────────────────────────────────────

/// `data` payload for the `upload` action.
///
/// With `offset` present, offset 0 truncates/creates and offset > 0
/// appends; the engine never reorders chunks, so the caller must send
/// them in offset order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadData {
    /// Target path on the agent host.
    pub path: String,

    /// File bytes (base64 on the wire).
    #[serde(default, with = "b64_opt", skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,

    /// Byte offset for chunked upload; absent means single-shot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,

    /// Total expected size, for progress reporting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_size: Option<u64>,
}

/// Result fields for `upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UploadResult {
    /// Cumulative size of the target file after this write.
    pub size: u64,

    /// Percent complete for chunked uploads (100 when `total_size` is
    /// absent or zero).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
}

// ── Download ──────────────────────────────────────────────────────

/// `data` payload for the `download` action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadData {
    /// Source path on the agent host.
    pub path: String,

    /// Byte offset to read from.
    #[serde(default)]
    pub offset: u64,

    /// Maximum bytes to return; absent means [`DEFAULT_CHUNK_SIZE`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<u64>,
}

/// Result fields for `download`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DownloadResult {
    /// The chunk's bytes (base64 on the wire).
    #[serde(with = "b64")]
    pub content: Vec<u8>,

    /// Offset this chunk was read from.
    pub offset: u64,

    /// Chunk size ceiling that was applied.
    pub chunk_size: u64,

    /// Total file size.
    pub total_size: u64,

    /// `true` when `offset + content.len() >= total_size`.
    pub eof: bool,
}

// ── Stat / List ───────────────────────────────────────────────────

/// `data` payload for path-only actions (`file_info`, `list_dir`,
/// `tar_download`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathData {
    pub path: String,
}

/// Result fields for `file_info` on an existing path.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatResult {
    /// Size in bytes (directory sizes are filesystem-reported).
    pub size: u64,

    pub is_dir: bool,

    pub is_file: bool,

    /// Last modification time as Unix seconds.
    pub mtime: u64,

    /// Unix permission bits (0 on platforms without them).
    pub mode: u32,
}

/// One immediate child of a listed directory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirEntry {
    pub name: String,
    pub size: u64,
    pub is_dir: bool,
    pub mtime: u64,
}

/// Result fields for `list_dir`. Entries come in filesystem order,
/// not sorted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListDirResult {
    pub items: Vec<DirEntry>,
}

// ── Archive ───────────────────────────────────────────────────────

/// `data` payload for `tar_upload`: a gzip-compressed tar stream to
/// extract into `path`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TarUploadData {
    /// Extraction target directory; created on demand.
    pub path: String,

    /// The archive bytes (base64 on the wire).
    #[serde(with = "b64")]
    pub content: Vec<u8>,
}

/// Result fields for `tar_upload`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TarResult {
    /// The directory the archive was extracted into.
    pub path: String,

    /// Compressed archive size in bytes.
    pub size: u64,
}

// ── Tests ─────────────────────────────────────────────────────────
