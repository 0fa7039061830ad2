pub mod ftp;
pub mod sftp;

use std::future::Future;

use async_trait::async_trait;
use tokio::time::{timeout_at, Instant};

use crate::error::{Result, TransferError};

/// `TYPE I` versus `TYPE A` on FTP; on every backend, text mode also implies
/// line-ending normalization of the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Binary,
    Text,
}

/// Download result. An empty remote file is a soft outcome, not a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched<T> {
    Content(T),
    Empty,
}

impl<T> Fetched<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Fetched<U> {
        match self {
            Fetched::Content(v) => Fetched::Content(f(v)),
            Fetched::Empty => Fetched::Empty,
        }
    }

    pub fn content(self) -> Option<T> {
        match self {
            Fetched::Content(v) => Some(v),
            Fetched::Empty => None,
        }
    }
}

/// Outcome of uploads and directory creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Created,
    /// The directory was already there; nothing changed.
    AlreadyExists,
    /// A regular file occupies the requested directory path.
    Conflict,
}

/// Operations every backend provides. Each call opens its own connection and
/// tears it down before returning.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn download(&self, path: &str, mode: TransferMode) -> Result<Fetched<Vec<u8>>>;
    async fn upload(&self, path: &str, payload: &[u8], mode: TransferMode) -> Result<Status>;
    async fn list(&self, path: &str) -> Result<Vec<String>>;
    async fn make_directory(&self, path: &str) -> Result<Status>;
}

/// Run `fut` against an absolute deadline, reporting `stage` on expiry.
pub(crate) async fn timed<F, T>(deadline: Instant, stage: &'static str, fut: F) -> Result<T>
where
    F: Future<Output = T>,
{
    timeout_at(deadline, fut)
        .await
        .map_err(|_| TransferError::Timeout(stage))
}
