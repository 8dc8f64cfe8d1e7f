//! Audit log: append-only per-check log files with gzip rotation.
//!
//! Active logs live at `<base>/<id>.log`, one JSON line per probe. Rotation
//! compresses each active log into `<id>-<epoch-ms>.gz.b64` (gzip, then
//! base64) and empties the source.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::records::now_ms;

pub struct AuditLog {
    base_dir: PathBuf,
}

impl AuditLog {
    pub async fn open(base_dir: impl AsRef<Path>) -> Result<Self> {
        let base_dir = base_dir.as_ref().to_path_buf();
        fs::create_dir_all(&base_dir).await?;
        Ok(Self { base_dir })
    }

    fn log_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.log"))
    }

    fn archive_path(&self, id: &str) -> PathBuf {
        self.base_dir.join(format!("{id}.gz.b64"))
    }

    /// Append one line, creating the file if it does not exist yet.
    pub async fn append(&self, id: &str, line: &str) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(id))
            .await?;
        file.write_all(format!("{line}\n").as_bytes()).await?;
        Ok(())
    }

    /// Basenames of all active logs, plus archives when asked for.
    pub async fn list(&self, include_compressed: bool) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.base_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(id) = name.strip_suffix(".log") {
                names.push(id.to_string());
            } else if include_compressed {
                if let Some(id) = name.strip_suffix(".gz.b64") {
                    names.push(id.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Compress an active log into a new archive.
    ///
    /// The archive is written to a temp file and renamed into place, so a
    /// crash mid-rotation leaves either the full archive or none of it.
    pub async fn compress(&self, log_id: &str, dest_id: &str) -> Result<()> {
        let dest = self.archive_path(dest_id);
        if fs::try_exists(&dest).await? {
            return Err(Error::Conflict);
        }

        let contents =
            fs::read_to_string(self.log_path(log_id)).await.map_err(Error::from_io)?;
        if contents.trim().is_empty() {
            return Err(Error::Validation(format!("log {log_id} is empty")));
        }

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(contents.as_bytes())?;
        let encoded = BASE64.encode(encoder.finish()?);

        let tmp = dest.with_extension("b64.tmp");
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(encoded.as_bytes()).await?;
        file.sync_all().await?;
        fs::rename(&tmp, &dest).await?;
        Ok(())
    }

    /// Read an archive back into its original line content.
    pub async fn decompress(&self, id: &str) -> Result<String> {
        let encoded =
            fs::read_to_string(self.archive_path(id)).await.map_err(Error::from_io)?;
        let compressed = BASE64
            .decode(encoded.trim())
            .map_err(|err| Error::Validation(format!("archive {id} is not valid base64: {err}")))?;

        let mut decoder = GzDecoder::new(compressed.as_slice());
        let mut contents = String::new();
        decoder.read_to_string(&mut contents)?;
        Ok(contents)
    }

    /// Empty an active log, `NotFound` if it does not exist.
    pub async fn truncate(&self, id: &str) -> Result<()> {
        let file = fs::OpenOptions::new()
            .write(true)
            .open(self.log_path(id))
            .await
            .map_err(Error::from_io)?;
        file.set_len(0).await?;
        Ok(())
    }

    /// Rotate every active log: compress to a timestamped archive, then
    /// truncate the source. One failing file never aborts the pass.
    pub async fn rotate_all(&self) -> Result<usize> {
        let mut rotated = 0;
        for id in self.list(false).await? {
            let dest_id = format!("{id}-{}", now_ms());
            match self.compress(&id, &dest_id).await {
                Ok(()) => match self.truncate(&id).await {
                    Ok(()) => rotated += 1,
                    Err(err) => warn!(log = %id, "rotated but failed to truncate: {err}"),
                },
                Err(Error::Validation(_)) => debug!(log = %id, "skipping empty log"),
                Err(err) => warn!(log = %id, "failed to rotate: {err}"),
            }
        }
        Ok(rotated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_log() -> (tempfile::TempDir, AuditLog) {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::open(dir.path()).await.unwrap();
        (dir, log)
    }

    #[tokio::test]
    async fn appends_preserve_order() {
        let (dir, log) = open_log().await;
        for i in 0..5 {
            log.append("abc", &format!("line-{i}")).await.unwrap();
        }

        let contents = std::fs::read_to_string(dir.path().join("abc.log")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["line-0", "line-1", "line-2", "line-3", "line-4"]);
    }

    #[tokio::test]
    async fn concurrent_appends_to_different_logs_lose_nothing() {
        let (dir, log) = open_log().await;
        let log = std::sync::Arc::new(log);

        let mut handles = Vec::new();
        for check in 0..4 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    log.append(&format!("check-{check}"), &format!("entry-{i}")).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        for check in 0..4 {
            let contents =
                std::fs::read_to_string(dir.path().join(format!("check-{check}.log"))).unwrap();
            assert_eq!(contents.lines().count(), 25);
        }
    }

    #[tokio::test]
    async fn compress_then_decompress_round_trips() {
        let (_dir, log) = open_log().await;
        log.append("abc", "first").await.unwrap();
        log.append("abc", "second").await.unwrap();

        log.compress("abc", "abc-123").await.unwrap();
        let restored = log.decompress("abc-123").await.unwrap();
        assert_eq!(restored, "first\nsecond\n");
    }

    #[tokio::test]
    async fn compress_refuses_existing_archive_and_empty_source() {
        let (_dir, log) = open_log().await;
        log.append("abc", "entry").await.unwrap();
        log.compress("abc", "dest").await.unwrap();

        assert!(matches!(log.compress("abc", "dest").await.unwrap_err(), Error::Conflict));

        log.truncate("abc").await.unwrap();
        assert!(matches!(
            log.compress("abc", "other").await.unwrap_err(),
            Error::Validation(_)
        ));
    }

    #[tokio::test]
    async fn truncate_missing_log_is_not_found() {
        let (_dir, log) = open_log().await;
        assert!(matches!(log.truncate("nope").await.unwrap_err(), Error::NotFound));
    }

    #[tokio::test]
    async fn rotate_all_archives_and_empties_active_logs() {
        let (dir, log) = open_log().await;
        log.append("abc", "entry").await.unwrap();
        log.append("def", "entry").await.unwrap();

        let rotated = log.rotate_all().await.unwrap();
        assert_eq!(rotated, 2);

        // Sources are emptied, archives listed only when asked for.
        assert_eq!(std::fs::read_to_string(dir.path().join("abc.log")).unwrap(), "");
        let active = log.list(false).await.unwrap();
        assert_eq!(active.len(), 2);
        let with_archives = log.list(true).await.unwrap();
        assert_eq!(with_archives.len(), 4);

        // A second pass finds only empty logs and rotates nothing.
        assert_eq!(log.rotate_all().await.unwrap(), 0);
    }
}
