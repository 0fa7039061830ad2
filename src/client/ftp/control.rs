use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, trace};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::time::Instant;

use super::command::FtpCommand;
use super::passive;
use super::reply::{is_final_line, parse_status_line, Reply};
use crate::client::{timed, TransferMode};
use crate::error::{ProtocolError, Result, TransferError};

const MAX_LINE_LEN: usize = 2048;
const MAX_REPLY_LINES: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlState {
    Connected,
    Authenticating,
    Ready,
    ModeSelected,
    AwaitingDataReply,
    Transferring,
    Closed,
}

/// The command connection of one FTP session.
///
/// A single deadline, fixed when the connection is dialed, bounds every
/// read and write made through this channel.
pub struct ControlChannel {
    stream: BufStream<TcpStream>,
    peer: SocketAddr,
    deadline: Instant,
    state: ControlState,
}

impl ControlChannel {
    /// Dial `addr` and consume the server greeting.
    pub async fn connect(addr: &str, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let stream = timed(deadline, "connecting to server", TcpStream::connect(addr))
            .await?
            .map_err(|source| TransferError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        let peer = stream
            .peer_addr()
            .map_err(|source| TransferError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        debug!("ftp: control connection established to {peer}");

        let mut channel = ControlChannel {
            stream: BufStream::new(stream),
            peer,
            deadline,
            state: ControlState::Connected,
        };
        channel.wait_greeting().await?;
        Ok(channel)
    }

    pub fn state(&self) -> ControlState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ControlState) {
        trace!("ftp: control state {:?} -> {:?}", self.state, state);
        self.state = state;
    }

    async fn wait_greeting(&mut self) -> Result<()> {
        loop {
            let reply = self.read_reply().await?;
            match reply.code() {
                120 => continue,
                220 => return Ok(()),
                _ => return Err(TransferError::Refused(reply.to_string())),
            }
        }
    }

    pub async fn authenticate(&mut self, user: &str, pass: &str) -> Result<()> {
        self.set_state(ControlState::Authenticating);

        let reply = self.command(FtpCommand::User, Some(user)).await?;
        if reply.code() != 331 {
            return Err(TransferError::AuthFailed {
                stage: "USER",
                reply: reply.to_string(),
            });
        }

        let reply = self.command(FtpCommand::Pass, Some(pass)).await?;
        if reply.code() != 230 {
            return Err(TransferError::AuthFailed {
                stage: "PASS",
                reply: reply.to_string(),
            });
        }

        self.set_state(ControlState::Ready);
        Ok(())
    }

    /// Send `TYPE I` or `TYPE A`. The reply is consumed but not checked.
    pub async fn select_mode(&mut self, mode: TransferMode) -> Result<()> {
        let reply = self.command(FtpCommand::Type(mode), None).await?;
        trace!("ftp: TYPE answered with {}", reply.code());
        self.set_state(ControlState::ModeSelected);
        Ok(())
    }

    /// Issue `PASV` and return the address of the data port the server opened.
    pub async fn request_passive(&mut self) -> Result<SocketAddr> {
        let reply = self.command(FtpCommand::Pasv, None).await?;
        if reply.code() != 227 {
            return Err(unexpected(FtpCommand::Pasv, &reply));
        }
        let advertised = passive::parse_pasv_reply(&reply.message())?;
        Ok(passive::resolve_data_addr(advertised, self.peer))
    }

    pub async fn command(&mut self, cmd: FtpCommand, arg: Option<&str>) -> Result<Reply> {
        self.send_command(cmd, arg).await?;
        self.read_reply().await
    }

    /// Send `cmd` and require the reply to carry `code`.
    pub async fn expect(&mut self, cmd: FtpCommand, arg: Option<&str>, code: u16) -> Result<Reply> {
        let reply = self.command(cmd, arg).await?;
        if reply.code() != code {
            return Err(unexpected(cmd, &reply));
        }
        Ok(reply)
    }

    /// Read the reply that follows a completed data transfer.
    pub async fn expect_completion(&mut self, cmd: FtpCommand) -> Result<Reply> {
        let reply = self.read_reply().await?;
        if reply.code() != 226 {
            return Err(unexpected(cmd, &reply));
        }
        self.set_state(ControlState::Ready);
        Ok(reply)
    }

    pub async fn send_command(&mut self, cmd: FtpCommand, arg: Option<&str>) -> Result<()> {
        if let Some(arg) = arg {
            if arg.contains(['\r', '\n']) {
                return Err(TransferError::InputInvalid(format!(
                    "argument to {cmd} contains a line break"
                )));
            }
        }
        match (cmd, arg) {
            (FtpCommand::Pass, Some(_)) => debug!("ftp: > PASS ****"),
            (_, Some(arg)) => debug!("ftp: > {cmd} {arg}"),
            (_, None) => debug!("ftp: > {cmd}"),
        }

        let line = cmd.line(arg);
        let stream = &mut self.stream;
        timed(self.deadline, "sending command", async {
            stream.write_all(&line).await?;
            stream.flush().await
        })
        .await?
        .map_err(TransferError::io("sending command"))
    }

    /// Read one complete reply, joining the lines of a multi-line reply.
    pub async fn read_reply(&mut self) -> Result<Reply> {
        let mut buf = Vec::with_capacity(128);
        self.read_line(&mut buf).await?;
        let first = String::from_utf8_lossy(&buf).into_owned();
        let status = parse_status_line(&first)?;
        let code = status.code;
        let mut lines = vec![status.text.to_string()];

        if status.multi_line {
            loop {
                if lines.len() >= MAX_REPLY_LINES {
                    return Err(ProtocolError::TooManyLines(MAX_REPLY_LINES).into());
                }
                self.read_line(&mut buf).await?;
                let line = String::from_utf8_lossy(&buf);
                if is_final_line(code, &line) {
                    let text = line.trim_end_matches(['\r', '\n']);
                    lines.push(text.get(4..).unwrap_or_default().to_string());
                    break;
                }
                lines.push(line.trim_end_matches(['\r', '\n']).to_string());
            }
        }

        let reply = Reply::new(code, lines);
        trace!("ftp: < {reply}");
        Ok(reply)
    }

    async fn read_line(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        buf.clear();
        let stream = &mut self.stream;
        let len = timed(self.deadline, "reading reply", async {
            stream
                .take(MAX_LINE_LEN as u64)
                .read_until(b'\n', buf)
                .await
        })
        .await?
        .map_err(TransferError::io("reading reply"))?;

        if len == 0 {
            return Err(ProtocolError::ConnectionClosed.into());
        }
        if buf.last() != Some(&b'\n') {
            if len >= MAX_LINE_LEN {
                return Err(ProtocolError::LineTooLong(MAX_LINE_LEN).into());
            }
            return Err(ProtocolError::ConnectionClosed.into());
        }
        Ok(())
    }

    /// Best-effort `QUIT`; the reply is not awaited.
    pub async fn quit(mut self) {
        let line = FtpCommand::Quit.line(None);
        debug!("ftp: > QUIT");
        let stream = &mut self.stream;
        let _ = timed(self.deadline, "sending QUIT", async {
            stream.write_all(&line).await?;
            stream.flush().await
        })
        .await;
        self.set_state(ControlState::Closed);
    }
}

pub(crate) fn unexpected(command: FtpCommand, reply: &Reply) -> TransferError {
    ProtocolError::UnexpectedReply {
        command,
        code: reply.code(),
        message: reply.message(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn serve(script: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            socket.write_all(script).await.unwrap();
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
        });
        addr
    }

    #[tokio::test]
    async fn test_multi_line_greeting_is_reassembled() {
        let addr = serve(b"220-Welcome\r\n to the server\r\n220 Ready\r\n331 Need password\r\n").await;
        let mut control = ControlChannel::connect(&addr, Duration::from_secs(5)).await.unwrap();
        assert_eq!(control.state(), ControlState::Connected);

        let reply = control.read_reply().await.unwrap();
        assert_eq!(reply.code(), 331);
        assert_eq!(reply.lines(), ["Need password"]);
    }

    #[tokio::test]
    async fn test_auth_states() {
        let addr = serve(b"220 Ready\r\n331 Need password\r\n230 Logged in\r\n").await;
        let mut control = ControlChannel::connect(&addr, Duration::from_secs(5)).await.unwrap();
        control.authenticate("bob", "secret").await.unwrap();
        assert_eq!(control.state(), ControlState::Ready);
    }

    #[tokio::test]
    async fn test_refused_greeting() {
        let addr = serve(b"421 Too many connections\r\n").await;
        let err = ControlChannel::connect(&addr, Duration::from_secs(5))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransferError::Refused(_)));
    }

    #[tokio::test]
    async fn test_closed_mid_reply() {
        let addr = serve(b"220 Ready\r\n331 Need pass").await;
        let mut control = ControlChannel::connect(&addr, Duration::from_secs(5)).await.unwrap();
        let err = control.read_reply().await.unwrap_err();
        assert!(matches!(
            err,
            TransferError::Protocol(ProtocolError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });
        let err = ControlChannel::connect(&addr, Duration::from_millis(200))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TransferError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_rejects_line_breaks_in_arguments() {
        let addr = serve(b"220 Ready\r\n").await;
        let mut control = ControlChannel::connect(&addr, Duration::from_secs(5)).await.unwrap();
        let err = control
            .send_command(FtpCommand::Retr, Some("a\r\nDELE b"))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::InputInvalid(_)));
    }
}
