use crate::client::{Fetched, RemoteClient, TransferMode};
use crate::config::Config;
use crate::connection::client_for;
use crate::error::{Result, TransferError};
use crate::target::ConnectionTarget;
use futures::stream::{self, StreamExt};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::warn;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Builds a client for one target; swapped out in tests.
pub type Connector = dyn Fn(&ConnectionTarget) -> Box<dyn RemoteClient> + Send + Sync;

/// Downloads several remote files at once, each over its own connection.
pub struct ParallelDownloader {
    connector: Arc<Connector>,
    max_concurrent: usize,
    progress: MultiProgress,
}

impl ParallelDownloader {
    pub fn new(config: &Config) -> Self {
        let max_concurrent = config.parallel_downloads;
        let config = config.clone();
        Self::with_connector(
            Arc::new(move |target: &ConnectionTarget| client_for(target, &config)),
            max_concurrent,
        )
    }

    pub fn with_connector(connector: Arc<Connector>, max_concurrent: usize) -> Self {
        Self {
            connector,
            max_concurrent: max_concurrent.max(1),
            progress: MultiProgress::new(),
        }
    }

    /// Suppress progress bars.
    #[must_use]
    pub fn hidden(self) -> Self {
        self.progress.set_draw_target(ProgressDrawTarget::hidden());
        self
    }

    /// Fetch every `(target, local_path)` pair. Results come back in completion
    /// order; a failed item does not stop the others.
    pub async fn download_files(
        &self,
        files: Vec<(ConnectionTarget, PathBuf)>,
    ) -> Vec<(PathBuf, Result<u64>)> {
        stream::iter(files)
            .map(|(target, local_path)| {
                let pb = self.progress.add(ProgressBar::new_spinner());
                async move {
                    let result = self.download_single_file(&target, &local_path, &pb).await;
                    if let Err(e) = &result {
                        warn!("download of {} failed: {e}", target.remote_path);
                        pb.abandon_with_message(format!("✗ {}: {e}", target.remote_path));
                    }
                    (local_path, result)
                }
            })
            .buffer_unordered(self.max_concurrent)
            .collect()
            .await
    }

    async fn download_single_file(
        &self,
        target: &ConnectionTarget,
        local_path: &Path,
        progress_bar: &ProgressBar,
    ) -> Result<u64> {
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress_bar.set_style(style);
        progress_bar.enable_steady_tick(Duration::from_millis(120));

        let filename = target.remote_path.rsplit('/').next().unwrap_or("file");
        progress_bar.set_message(format!("Downloading {filename}"));

        let client = (self.connector)(target);
        let payload = match client
            .download(&target.remote_path, TransferMode::Binary)
            .await?
        {
            Fetched::Content(bytes) => bytes,
            Fetched::Empty => Vec::new(),
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(TransferError::io("creating local directory"))?;
        }
        tokio::fs::write(local_path, &payload)
            .await
            .map_err(TransferError::io("writing local file"))?;

        let size = payload.len() as u64;
        progress_bar.finish_with_message(format!(
            "✓ {filename} ({})",
            human_bytes::human_bytes(size as f64)
        ));
        Ok(size)
    }
}
