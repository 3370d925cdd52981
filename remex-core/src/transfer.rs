//! Transfer engine — chunked file read/write with offset/resume
//! semantics, path metadata, and whole-directory archive pack/unpack
//! through an external `tar` process.
//!
//! All operations are synchronous within a request/response cycle; a
//! large transfer is chunked by the caller via the upload/download
//! offset path. The engine never reorders or deduplicates chunks: the
//! resulting file equals the chunks written in offset order, and
//! sending chunks out of order is the caller's bug.

use std::io::SeekFrom;
use std::path::Path;
use std::process::Stdio;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use crate::error::AgentError;
use crate::protocol::transfer::{
    DirEntry, DownloadData, DownloadResult, ListDirResult, StatResult, TarResult, UploadData,
    UploadResult, DEFAULT_CHUNK_SIZE,
};

/// Filesystem and archive operations behind the transfer actions.
#[derive(Debug, Clone)]
pub struct TransferEngine {
    default_chunk_size: u64,
}

impl TransferEngine {
    pub fn new(default_chunk_size: u64) -> Self {
        Self { default_chunk_size }
    }

    // ── Upload ───────────────────────────────────────────────────

    /// Write file content, whole or at an offset.
    ///
    /// Offset 0 truncates/creates; offset > 0 appends. Parent
    /// directories are created on demand.
    pub async fn upload(&self, data: UploadData) -> Result<UploadResult, AgentError> {
        if data.content.is_none() && data.offset.is_none() {
            return Err(AgentError::InvalidRequest(
                "upload requires content or offset".to_string(),
            ));
        }

        let path = Path::new(&data.path);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = data.content.unwrap_or_default();

        match data.offset {
            Some(offset) => {
                let mut file = fs::OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(offset == 0)
                    .append(offset > 0)
                    .open(path)
                    .await?;
                file.write_all(&content).await?;
                file.flush().await?;

                let uploaded = fs::metadata(path).await?.len();
                let progress = match data.total_size {
                    Some(total) if total > 0 => (uploaded as f64 / total as f64) * 100.0,
                    _ => 100.0,
                };
                debug!(path = %data.path, uploaded, progress, "chunk written");
                Ok(UploadResult {
                    size: uploaded,
                    progress: Some(progress),
                })
            }
            None => {
                fs::write(path, &content).await?;
                Ok(UploadResult {
                    size: content.len() as u64,
                    progress: None,
                })
            }
        }
    }

    // ── Download ─────────────────────────────────────────────────

    /// Read at most `chunk_size` bytes starting at `offset`.
    pub async fn download(&self, data: DownloadData) -> Result<DownloadResult, AgentError> {
        let path = Path::new(&data.path);
        let meta = fs::metadata(path)
            .await
            .map_err(|_| AgentError::NotFound(data.path.clone()))?;
        let total_size = meta.len();
        let chunk_size = data.chunk_size.unwrap_or(self.default_chunk_size);

        let mut file = fs::File::open(path).await?;
        file.seek(SeekFrom::Start(data.offset)).await?;

        let mut content = Vec::new();
        file.take(chunk_size).read_to_end(&mut content).await?;

        let eof = data.offset + content.len() as u64 >= total_size;
        Ok(DownloadResult {
            content,
            offset: data.offset,
            chunk_size,
            total_size,
            eof,
        })
    }

    // ── Stat / List ──────────────────────────────────────────────

    /// Stat a path; `None` when it does not exist.
    ///
    /// The router turns `None` into `{success: false}` *data* rather
    /// than an error response — the one action with that shape.
    pub async fn stat(&self, path: &str) -> Result<Option<StatResult>, AgentError> {
        let meta = match fs::metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(StatResult {
            size: meta.len(),
            is_dir: meta.is_dir(),
            is_file: meta.is_file(),
            mtime: unix_mtime(&meta),
            mode: unix_mode(&meta),
        }))
    }

    /// List a directory's immediate children in filesystem order.
    pub async fn list(&self, path: &str) -> Result<ListDirResult, AgentError> {
        let meta = fs::metadata(path)
            .await
            .map_err(|_| AgentError::NotFound(path.to_string()))?;
        if !meta.is_dir() {
            return Err(AgentError::NotADirectory(path.to_string()));
        }

        let mut items = Vec::new();
        let mut entries = fs::read_dir(path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            match entry.metadata().await {
                Ok(meta) => items.push(DirEntry {
                    name,
                    size: meta.len(),
                    is_dir: meta.is_dir(),
                    mtime: unix_mtime(&meta),
                }),
                // Entry vanished between readdir and stat — skip it.
                Err(_) => continue,
            }
        }
        Ok(ListDirResult { items })
    }

    // ── Archive ──────────────────────────────────────────────────

    /// Extract a gzip-compressed tar stream into `path`.
    pub async fn tar_unpack(&self, path: &str, content: Vec<u8>) -> Result<TarResult, AgentError> {
        fs::create_dir_all(path).await?;

        let mut child = Command::new("tar")
            .args(["xzf", "-", "-C"])
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| AgentError::Archive("tar stdin unavailable".to_string()))?;
        let size = content.len() as u64;

        // Feed stdin while stderr is drained on the other side, or a
        // chatty failing extractor fills the pipe and wedges both ends.
        let feed = async move {
            let result = stdin.write_all(&content).await;
            drop(stdin);
            result
        };
        let (write_result, output) = tokio::join!(feed, child.wait_with_output());
        let output = output?;

        if !output.status.success() {
            return Err(AgentError::Archive(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        // A failing extractor may close the pipe early; stderr explains
        // that above. Any other write failure is a real one.
        if let Err(e) = write_result {
            if e.kind() != std::io::ErrorKind::BrokenPipe {
                return Err(e.into());
            }
        }

        Ok(TarResult {
            path: path.to_string(),
            size,
        })
    }

    /// Pack the directory at `path` into a gzip-compressed tar stream.
    ///
    /// Captures the archive fully before returning; stdout is the
    /// archive, stderr the diagnostic on failure.
    pub async fn tar_pack(&self, path: &str) -> Result<Vec<u8>, AgentError> {
        if fs::metadata(path).await.is_err() {
            return Err(AgentError::NotFound(path.to_string()));
        }

        let output = Command::new("tar")
            .args(["czf", "-", "-C"])
            .arg(path)
            .arg(".")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(AgentError::Archive(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        Ok(output.stdout)
    }
}

impl Default for TransferEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

// ── Helpers ───────────────────────────────────────────────────────

fn unix_mtime(meta: &std::fs::Metadata) -> u64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(unix)]
fn unix_mode(meta: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode()
}

#[cfg(not(unix))]
fn unix_mode(_meta: &std::fs::Metadata) -> u32 {
    0
}

// ── Tests ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn engine() -> TransferEngine {
        TransferEngine::default()
    }

    #[tokio::test]
    async fn single_shot_upload_then_download() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin").display().to_string();
        let payload = b"the quick brown fox".to_vec();

        let result = engine()
            .upload(UploadData {
                path: path.clone(),
                content: Some(payload.clone()),
                offset: None,
                total_size: None,
            })
            .await
            .unwrap();
        assert_eq!(result.size, payload.len() as u64);
        assert!(result.progress.is_none());

        let chunk = engine()
            .download(DownloadData {
                path,
                offset: 0,
                chunk_size: None,
            })
            .await
            .unwrap();
        assert_eq!(chunk.content, payload);
        assert!(chunk.eof);
    }

    #[tokio::test]
    async fn chunked_upload_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunks.bin").display().to_string();
        let c0 = vec![0xAA; 8];
        let c1 = vec![0xBB; 8];

        let first = engine()
            .upload(UploadData {
                path: path.clone(),
                content: Some(c0.clone()),
                offset: Some(0),
                total_size: Some(16),
            })
            .await
            .unwrap();
        assert_eq!(first.size, 8);
        assert_eq!(first.progress, Some(50.0));

        let second = engine()
            .upload(UploadData {
                path: path.clone(),
                content: Some(c1.clone()),
                offset: Some(8),
                total_size: Some(16),
            })
            .await
            .unwrap();
        assert_eq!(second.size, 16);
        assert_eq!(second.progress, Some(100.0));

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, [c0, c1].concat());
    }

    #[tokio::test]
    async fn chunked_upload_offset_zero_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trunc.bin").display().to_string();
        std::fs::write(&path, b"old contents that should vanish").unwrap();

        engine()
            .upload(UploadData {
                path: path.clone(),
                content: Some(b"new".to_vec()),
                offset: Some(0),
                total_size: None,
            })
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }

    #[tokio::test]
    async fn upload_without_content_or_offset_rejected() {
        let err = engine()
            .upload(UploadData {
                path: "/tmp/never-written".to_string(),
                content: None,
                offset: None,
                total_size: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn upload_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir
            .path()
            .join("a/b/c/deep.txt")
            .display()
            .to_string();
        engine()
            .upload(UploadData {
                path: path.clone(),
                content: Some(b"deep".to_vec()),
                offset: None,
                total_size: None,
            })
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"deep");
    }

    #[tokio::test]
    async fn download_missing_path_is_not_found() {
        let err = engine()
            .download(DownloadData {
                path: "/definitely/not/here".to_string(),
                offset: 0,
                chunk_size: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
    }

    #[tokio::test]
    async fn download_chunks_cover_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.bin").display().to_string();
        let payload: Vec<u8> = (0..100u8).collect();
        std::fs::write(&path, &payload).unwrap();

        let first = engine()
            .download(DownloadData {
                path: path.clone(),
                offset: 0,
                chunk_size: Some(64),
            })
            .await
            .unwrap();
        assert_eq!(first.content.len(), 64);
        assert!(!first.eof);
        assert_eq!(first.total_size, 100);

        let second = engine()
            .download(DownloadData {
                path,
                offset: 64,
                chunk_size: Some(64),
            })
            .await
            .unwrap();
        assert_eq!(second.content.len(), 36);
        assert!(second.eof);
        assert_eq!([first.content, second.content].concat(), payload);
    }

    #[tokio::test]
    async fn stat_missing_path_is_none() {
        assert!(engine().stat("/definitely/not/here").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn stat_reports_file_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"12345").unwrap();

        let stat = engine()
            .stat(&path.display().to_string())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stat.size, 5);
        assert!(stat.is_file);
        assert!(!stat.is_dir);
        assert!(stat.mtime > 0);
    }

    #[tokio::test]
    async fn list_on_file_is_not_a_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, b"x").unwrap();

        let err = engine()
            .list(&path.display().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::NotADirectory(_)));
    }

    #[tokio::test]
    async fn list_reports_children() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"aa").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = engine()
            .list(&dir.path().display().to_string())
            .await
            .unwrap();
        assert_eq!(listing.items.len(), 2);
        let file = listing.items.iter().find(|e| e.name == "a.txt").unwrap();
        assert_eq!(file.size, 2);
        assert!(!file.is_dir);
        assert!(listing.items.iter().any(|e| e.name == "sub" && e.is_dir));
    }

    #[tokio::test]
    async fn tar_roundtrip_reproduces_tree() {
        let src = tempfile::tempdir().unwrap();
        std::fs::write(src.path().join("one.txt"), b"first").unwrap();
        std::fs::create_dir(src.path().join("nested")).unwrap();
        std::fs::write(src.path().join("nested/two.txt"), b"second").unwrap();

        let archive = engine()
            .tar_pack(&src.path().display().to_string())
            .await
            .unwrap();
        assert!(!archive.is_empty());

        let dst = tempfile::tempdir().unwrap();
        let result = engine()
            .tar_unpack(&dst.path().display().to_string(), archive)
            .await
            .unwrap();
        assert!(result.size > 0);

        assert_eq!(std::fs::read(dst.path().join("one.txt")).unwrap(), b"first");
        assert_eq!(
            std::fs::read(dst.path().join("nested/two.txt")).unwrap(),
            b"second"
        );
    }

    #[tokio::test]
    async fn tar_pack_missing_path_is_not_found() {
        let err = engine().tar_pack("/definitely/not/here").await.unwrap_err();
        assert!(matches!(err, AgentError::NotFound(_)));
    }

    #[tokio::test]
    async fn tar_unpack_large_garbage_fails_without_wedging() {
        // The payload far exceeds the OS pipe buffer; the extractor
        // rejects it early while the engine is still writing. Both
        // sides must make progress and the error must carry stderr.
        let dst = tempfile::tempdir().unwrap();
        let garbage = vec![0x5Au8; 4 * 1024 * 1024];

        let err = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            engine().tar_unpack(&dst.path().display().to_string(), garbage),
        )
        .await
        .expect("tar_unpack wedged on oversized garbage input")
        .unwrap_err();
        assert!(matches!(err, AgentError::Archive(_)));
    }

    #[tokio::test]
    async fn tar_unpack_garbage_is_archive_error() {
        let dst = tempfile::tempdir().unwrap();
        let err = engine()
            .tar_unpack(
                &dst.path().display().to_string(),
                b"this is not a tarball".to_vec(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Archive(_)));
    }
}
