//! Typed payloads for each action.
//!
//! Every action's `data` object and result fields have a serde struct
//! here, so handlers never poke at raw JSON maps.

pub mod exec;
pub mod transfer;

pub use exec::{ExecuteData, ExecuteResult};
pub use transfer::{
    DirEntry, DownloadData, DownloadResult, ListDirResult, PathData, StatResult, TarResult,
    TarUploadData, UploadData, UploadResult, DEFAULT_CHUNK_SIZE,
};
