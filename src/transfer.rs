use std::path::Path;

use anyhow::{Context, Result};
use futures::StreamExt;
use tempfile::{NamedTempFile, TempPath};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};

use crate::config::TransferConfig;

/// A downloaded video on disk. The file is removed by [`TemporaryAsset::close`]
/// or, failing that, when the value is dropped.
#[derive(Debug)]
pub struct TemporaryAsset {
    path: TempPath,
}

impl TemporaryAsset {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file now, reporting any I/O error.
    pub fn close(self) -> std::io::Result<()> {
        self.path.close()
    }
}

/// Streams media into uniquely named temporary files
pub struct TransferManager {
    config: TransferConfig,
}

impl TransferManager {
    pub fn new(config: TransferConfig) -> Self {
        Self { config }
    }

    /// Download `url` into a fresh `.mp4` temp file.
    /// On error nothing is left on disk.
    pub async fn download(&self, http: &reqwest::Client, url: &str) -> Result<TemporaryAsset> {
        let (file, path) = self.create_temp_file()?.into_parts();
        debug!("Downloading {} to {}", url, path.display());

        // From here on, an early return drops `path` and removes the partial file
        let response = http
            .get(url)
            .timeout(self.config.timeout())
            .send()
            .await
            .context("Failed to request media")?
            .error_for_status()
            .context("Media server rejected the download")?;

        let mut writer =
            BufWriter::with_capacity(self.config.chunk_size, tokio::fs::File::from_std(file));
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Failed while streaming media")?;
            writer
                .write_all(&chunk)
                .await
                .with_context(|| format!("Failed to write to {}", path.display()))?;
            written += chunk.len() as u64;
        }

        writer
            .flush()
            .await
            .with_context(|| format!("Failed to flush {}", path.display()))?;
        drop(writer.into_inner().into_std().await);

        info!("Downloaded {} bytes to {}", written, path.display());
        Ok(TemporaryAsset { path })
    }

    fn create_temp_file(&self) -> Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("tiktok-").suffix(".mp4");
        match &self.config.temp_dir {
            Some(dir) => builder
                .tempfile_in(dir)
                .with_context(|| format!("Failed to create temp file in {}", dir.display())),
            None => builder.tempfile().context("Failed to create temp file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn manager_in(dir: &Path, chunk_size: usize) -> TransferManager {
        manager_with_timeout(dir, chunk_size, 5)
    }

    fn manager_with_timeout(dir: &Path, chunk_size: usize, timeout_secs: u64) -> TransferManager {
        TransferManager::new(TransferConfig {
            timeout_secs,
            chunk_size,
            temp_dir: Some(dir.to_path_buf()),
        })
    }

    /// Serve one response that promises 1 MB, sends 200 KB, then either
    /// hangs up or goes silent for `stall`.
    async fn serve_partial_body(stall: Option<Duration>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut request = [0u8; 4096];
            let _ = socket.read(&mut request).await;

            let head = "HTTP/1.1 200 OK\r\n\
                        Content-Type: video/mp4\r\n\
                        Content-Length: 1000000\r\n\r\n";
            if socket.write_all(head.as_bytes()).await.is_err() {
                return;
            }
            let _ = socket.write_all(&vec![7u8; 200_000]).await;
            let _ = socket.flush().await;

            if let Some(stall) = stall {
                tokio::time::sleep(stall).await;
            }
        });

        format!("http://{}/x.mp4", addr)
    }

    fn dir_entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).unwrap().count()
    }

    #[tokio::test]
    async fn test_download_writes_full_body() {
        let server = MockServer::start_async().await;
        let body: Vec<u8> = (0..300_000u32).map(|i| (i % 251) as u8).collect();
        let expected = body.clone();
        server
            .mock_async(move |when, then| {
                when.method(GET).path("/x.mp4");
                then.status(200).body(body.clone());
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path(), 128 * 1024);
        let asset = manager
            .download(&reqwest::Client::new(), &server.url("/x.mp4"))
            .await
            .unwrap();

        assert!(asset.path().starts_with(dir.path()));
        assert_eq!(asset.path().extension().and_then(|e| e.to_str()), Some("mp4"));
        assert_eq!(std::fs::read(asset.path()).unwrap(), expected);

        let path = asset.path().to_path_buf();
        asset.close().unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_small_chunks_still_write_everything() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/small.mp4");
                then.status(200).body("0123456789abcdefghij");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let asset = manager_in(dir.path(), 3)
            .download(&reqwest::Client::new(), &server.url("/small.mp4"))
            .await
            .unwrap();

        assert_eq!(std::fs::read(asset.path()).unwrap(), b"0123456789abcdefghij");
    }

    #[tokio::test]
    async fn test_error_status_leaves_no_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/gone.mp4");
                then.status(404).body("not found");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let result = manager_in(dir.path(), 1024)
            .download(&reqwest::Client::new(), &server.url("/gone.mp4"))
            .await;

        assert!(result.is_err());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_connection_failure_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = manager_in(dir.path(), 1024)
            .download(&reqwest::Client::new(), "http://127.0.0.1:1/x.mp4")
            .await;

        assert!(result.is_err());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_truncated_body_removes_partial_file() {
        let url = serve_partial_body(None).await;
        let dir = tempfile::tempdir().unwrap();

        let result = manager_in(dir.path(), 1024)
            .download(&reqwest::Client::new(), &url)
            .await;

        assert!(result.is_err());
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_stalled_body_times_out_and_removes_partial_file() {
        let url = serve_partial_body(Some(Duration::from_secs(10))).await;
        let dir = tempfile::tempdir().unwrap();

        let started = std::time::Instant::now();
        let result = manager_with_timeout(dir.path(), 1024, 1)
            .download(&reqwest::Client::new(), &url)
            .await;

        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_secs(8));
        assert_eq!(dir_entries(dir.path()), 0);
    }

    #[tokio::test]
    async fn test_missing_temp_dir_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = manager_in(&dir.path().join("missing"), 1024)
            .download(&reqwest::Client::new(), "http://127.0.0.1:1/x.mp4")
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_each_download_gets_its_own_file() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/x.mp4");
                then.status(200).body("video");
            })
            .await;

        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(dir.path(), 1024);
        let http = reqwest::Client::new();
        let first = manager.download(&http, &server.url("/x.mp4")).await.unwrap();
        let second = manager.download(&http, &server.url("/x.mp4")).await.unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(dir_entries(dir.path()), 2);

        drop(first);
        drop(second);
        assert_eq!(dir_entries(dir.path()), 0);
    }
}
