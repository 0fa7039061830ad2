//! SFTP backend on `russh` + `russh-sftp`.
//!
//! None of the FTP command machinery applies here; each operation opens an
//! SSH session, authenticates with the URI password, runs the SFTP requests
//! and disconnects. The size bound and the deadline are the same as on FTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use russh::client::{self, Handle};
use russh::keys::{ssh_key, HashAlg};
use russh::Disconnect;
use russh_sftp::client::SftpSession;
use tokio::io::AsyncWriteExt;
use tokio::time::Instant;

use super::{timed, Fetched, RemoteClient, Status, TransferMode};
use crate::codec;
use crate::config::Config;
use crate::error::{Result, TransferError};
use crate::target::ConnectionTarget;

/// Host-key policy: pin to a configured fingerprint, or accept and log.
struct SshHandler {
    host: String,
    expected_fingerprint: Option<String>,
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();
        match &self.expected_fingerprint {
            Some(expected) => {
                let matched = fingerprints_match(expected, &fingerprint);
                if !matched {
                    warn!(
                        "sftp: host key for {} is {fingerprint}, expected {expected}",
                        self.host
                    );
                }
                Ok(matched)
            }
            None => {
                warn!(
                    "sftp: accepting unverified host key {fingerprint} for {}",
                    self.host
                );
                Ok(true)
            }
        }
    }
}

fn fingerprints_match(expected: &str, actual: &str) -> bool {
    let strip = |s: &str| {
        let s = s.trim();
        s.strip_prefix("SHA256:").unwrap_or(s).to_string()
    };
    strip(expected) == strip(actual)
}

struct SftpConn {
    sftp: SftpSession,
    session: Handle<SshHandler>,
    deadline: Instant,
}

impl SftpConn {
    async fn close(self) {
        drop(self.sftp);
        let _ = self
            .session
            .disconnect(Disconnect::ByApplication, "", "en")
            .await;
    }
}

pub struct SftpClient {
    host: String,
    port: u16,
    username: String,
    password: String,
    timeout: Duration,
    max_transfer_bytes: u64,
    host_fingerprint: Option<String>,
}

impl SftpClient {
    pub fn new(target: &ConnectionTarget, config: &Config) -> Self {
        Self {
            host: target.host.clone(),
            port: target.port,
            username: target.username.clone(),
            password: target.password.clone(),
            timeout: config.timeout(),
            max_transfer_bytes: config.max_transfer_bytes,
            host_fingerprint: config.sftp_host_fingerprint.clone(),
        }
    }

    async fn connect(&self) -> Result<SftpConn> {
        let deadline = Instant::now() + self.timeout;
        let config = Arc::new(client::Config::default());
        let handler = SshHandler {
            host: self.host.clone(),
            expected_fingerprint: self.host_fingerprint.clone(),
        };

        let addr = (self.host.as_str(), self.port);
        let mut session = timed(
            deadline,
            "connecting to ssh server",
            client::connect(config, addr, handler),
        )
        .await?
        .map_err(|e| delegate("ssh connect", e))?;
        debug!("sftp: ssh session established to {}:{}", self.host, self.port);

        let auth = timed(
            deadline,
            "authenticating",
            session.authenticate_password(self.username.as_str(), self.password.as_str()),
        )
        .await?
        .map_err(|e| delegate("ssh authenticate", e))?;
        if !auth.success() {
            return Err(TransferError::AuthFailed {
                stage: "ssh password",
                reply: format!("rejected for user '{}'", self.username),
            });
        }

        let channel = timed(deadline, "opening ssh channel", session.channel_open_session())
            .await?
            .map_err(|e| delegate("open channel", e))?;
        timed(deadline, "requesting sftp", channel.request_subsystem(true, "sftp"))
            .await?
            .map_err(|e| delegate("request sftp subsystem", e))?;
        let sftp = timed(deadline, "starting sftp", SftpSession::new(channel.into_stream()))
            .await?
            .map_err(|e| delegate("sftp init", e))?;

        Ok(SftpConn {
            sftp,
            session,
            deadline,
        })
    }

    /// Create `path` and any missing ancestors.
    async fn mkdir_all(conn: &SftpConn, path: &str) -> Result<()> {
        let mut current = String::new();
        if path.starts_with('/') {
            current.push('/');
        }
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.is_empty() && !current.ends_with('/') {
                current.push('/');
            }
            current.push_str(component);

            match timed(conn.deadline, "checking directory", conn.sftp.metadata(&current)).await? {
                Ok(meta) if meta.is_dir() => continue,
                Ok(_) => {
                    return Err(TransferError::Delegate(format!(
                        "{current} exists and is not a directory"
                    )))
                }
                Err(_) => {
                    debug!("sftp: creating directory {current}");
                    timed(conn.deadline, "creating directory", conn.sftp.create_dir(&current))
                        .await?
                        .map_err(|e| delegate("mkdir", e))?;
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteClient for SftpClient {
    async fn download(&self, path: &str, _mode: TransferMode) -> Result<Fetched<Vec<u8>>> {
        let conn = self.connect().await?;
        let file = timed(conn.deadline, "opening remote file", conn.sftp.open(path))
            .await?
            .map_err(|e| delegate("open", e))?;
        let payload = timed(
            conn.deadline,
            "reading remote file",
            codec::read_bounded(file, self.max_transfer_bytes),
        )
        .await??;
        conn.close().await;

        debug!("sftp: downloaded {} bytes from {path}", payload.len());
        if payload.is_empty() {
            return Ok(Fetched::Empty);
        }
        Ok(Fetched::Content(payload))
    }

    async fn upload(&self, path: &str, payload: &[u8], _mode: TransferMode) -> Result<Status> {
        let conn = self.connect().await?;
        if let Some((parent, _)) = path.rsplit_once('/') {
            if !parent.is_empty() {
                Self::mkdir_all(&conn, parent).await?;
            }
        }

        let mut file = timed(conn.deadline, "creating remote file", conn.sftp.create(path))
            .await?
            .map_err(|e| delegate("create", e))?;
        timed(conn.deadline, "writing remote file", async {
            file.write_all(payload).await?;
            file.shutdown().await
        })
        .await?
        .map_err(TransferError::io("writing remote file"))?;
        conn.close().await;

        debug!("sftp: uploaded {} bytes to {path}", payload.len());
        Ok(Status::Created)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let conn = self.connect().await?;
        let dir = if path.is_empty() { "." } else { path };
        let entries = timed(conn.deadline, "reading directory", conn.sftp.read_dir(dir))
            .await?
            .map_err(|e| delegate("readdir", e))?;
        let names = entries
            .map(|entry| entry.file_name())
            .filter(|name| name != "." && name != "..")
            .collect();
        conn.close().await;
        Ok(names)
    }

    async fn make_directory(&self, path: &str) -> Result<Status> {
        let conn = self.connect().await?;
        let status = match timed(conn.deadline, "checking path", conn.sftp.metadata(path)).await? {
            Ok(meta) if meta.is_dir() => Status::AlreadyExists,
            Ok(_) => Status::Conflict,
            Err(_) => {
                Self::mkdir_all(&conn, path).await?;
                Status::Created
            }
        };
        conn.close().await;
        Ok(status)
    }
}

fn delegate(stage: &str, err: impl std::fmt::Display) -> TransferError {
    TransferError::Delegate(format!("{stage}: {err}"))
}
