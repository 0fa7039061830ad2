mod command;
mod control;
mod listing;
mod passive;
mod reply;

pub use command::FtpCommand;
pub use control::{ControlChannel, ControlState};
pub use listing::parse_names;
pub use passive::{parse_pasv_reply, DataChannel};
pub use reply::Reply;

use async_trait::async_trait;
use log::debug;
use std::time::Duration;

use super::{Fetched, RemoteClient, Status, TransferMode};
use crate::config::Config;
use crate::error::{Result, TransferError};
use crate::target::ConnectionTarget;

/// Hand-driven FTP client. Every operation runs on a fresh control connection
/// and, where data moves, a fresh passive data connection.
pub struct FtpClient {
    addr: String,
    username: String,
    password: String,
    timeout: Duration,
    max_transfer_bytes: u64,
}

impl FtpClient {
    pub fn new(target: &ConnectionTarget, config: &Config) -> Self {
        Self {
            addr: target.address(),
            username: target.username.clone(),
            password: target.password.clone(),
            timeout: config.timeout(),
            max_transfer_bytes: config.max_transfer_bytes,
        }
    }

    async fn login(&self) -> Result<ControlChannel> {
        let mut control = ControlChannel::connect(&self.addr, self.timeout).await?;
        control.authenticate(&self.username, &self.password).await?;
        Ok(control)
    }

    /// Log in, select the transfer type and open the passive data connection.
    async fn prepare_transfer(&self, mode: TransferMode) -> Result<(ControlChannel, DataChannel)> {
        let mut control = self.login().await?;
        control.select_mode(mode).await?;
        let data_addr = control.request_passive().await?;
        let data = DataChannel::open(data_addr, self.timeout).await?;
        Ok((control, data))
    }

    /// Send a transfer command and wait for the 150 preliminary reply.
    async fn start_transfer(
        control: &mut ControlChannel,
        cmd: FtpCommand,
        path: &str,
    ) -> Result<()> {
        let arg = (!path.is_empty()).then_some(path);
        control.send_command(cmd, arg).await?;
        control.set_state(ControlState::AwaitingDataReply);
        let reply = control.read_reply().await?;
        if reply.code() != 150 {
            return Err(control::unexpected(cmd, &reply));
        }
        control.set_state(ControlState::Transferring);
        Ok(())
    }

    async fn retrieve(&self, cmd: FtpCommand, path: &str, mode: TransferMode) -> Result<Vec<u8>> {
        let (mut control, data) = self.prepare_transfer(mode).await?;
        Self::start_transfer(&mut control, cmd, path).await?;
        let payload = data.receive(self.max_transfer_bytes).await?;
        control.expect_completion(cmd).await?;
        control.quit().await;
        Ok(payload)
    }
}

#[async_trait]
impl RemoteClient for FtpClient {
    async fn download(&self, path: &str, mode: TransferMode) -> Result<Fetched<Vec<u8>>> {
        let payload = self.retrieve(FtpCommand::Retr, path, mode).await?;
        debug!("ftp: downloaded {} bytes from {path}", payload.len());
        if payload.is_empty() {
            return Ok(Fetched::Empty);
        }
        Ok(Fetched::Content(payload))
    }

    async fn upload(&self, path: &str, payload: &[u8], mode: TransferMode) -> Result<Status> {
        let (mut control, data) = self.prepare_transfer(mode).await?;
        Self::start_transfer(&mut control, FtpCommand::Stor, path).await?;
        // The server only sees EOF once the data connection is closed, and
        // sends 226 after that.
        data.send(payload).await?;
        control.expect_completion(FtpCommand::Stor).await?;
        control.quit().await;
        Ok(Status::Created)
    }

    async fn list(&self, path: &str) -> Result<Vec<String>> {
        let raw = self
            .retrieve(FtpCommand::List, path, TransferMode::Text)
            .await?;
        Ok(parse_names(&String::from_utf8_lossy(&raw)))
    }

    async fn make_directory(&self, path: &str) -> Result<Status> {
        let path = path.strip_prefix('/').unwrap_or(path);
        if path.is_empty() {
            return Err(TransferError::InputInvalid(
                "directory path is empty".to_string(),
            ));
        }

        let mut control = self.login().await?;

        let size = control.command(FtpCommand::Size, Some(path)).await?;
        if size.code() == 213 {
            debug!("ftp: {path} is a file");
            control.quit().await;
            return Ok(Status::Conflict);
        }

        let cwd = control.command(FtpCommand::Cwd, Some(path)).await?;
        if cwd.code() == 250 {
            debug!("ftp: {path} already exists");
            // Step back out; the reply is not waited for.
            let _ = control.send_command(FtpCommand::Cdup, None).await;
            control.quit().await;
            return Ok(Status::AlreadyExists);
        }

        control.expect(FtpCommand::Mkd, Some(path), 257).await?;
        control.quit().await;
        Ok(Status::Created)
    }
}
