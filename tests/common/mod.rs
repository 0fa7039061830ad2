//! Scripted in-process FTP server for driving the client engine end to end.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use ftp_bridge::Config;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;

pub const USER: &str = "alice";
pub const PASS: &str = "s3cret";

/// One exchange the server expects from the client, in order.
pub enum Step {
    /// Expect a command starting with the prefix and answer with the reply
    /// text. Reply lines are separated by `\n` and sent CRLF terminated.
    Reply(&'static str, &'static str),
    /// Expect a command starting with the prefix and never answer it.
    Ignore(&'static str),
    /// Expect `PASV`, open a data listener and announce it.
    Passive,
    /// Expect the command, answer 150, push the bytes over the data
    /// connection and close it, then answer with the final reply.
    SendData(&'static str, Vec<u8>, &'static str),
    /// Expect the command, answer 150, read the data connection to EOF, then
    /// answer with the final reply.
    ReceiveData(&'static str, &'static str),
    /// Expect the command, answer 150, accept the data connection and then go
    /// quiet until the client hangs up.
    StallData(&'static str),
}

/// What the client did during the session.
#[derive(Debug, Default)]
pub struct Transcript {
    /// Command lines without their CRLF, including any sent after the script ran out.
    pub commands: Vec<String>,
    /// Bytes the client pushed over data connections.
    pub received: Vec<u8>,
    /// Set when a command did not match the scripted prefix.
    pub mismatch: Option<String>,
}

pub struct MockFtpServer {
    pub addr: SocketAddr,
    handle: JoinHandle<Transcript>,
}

impl MockFtpServer {
    pub async fn start(greeting: &'static str, steps: Vec<Step>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve(stream, greeting, steps).await
        });
        Self { addr, handle }
    }

    /// Server that greets and accepts the standard credentials before running `steps`.
    pub async fn with_login(steps: Vec<Step>) -> Self {
        let mut script = login_steps();
        script.extend(steps);
        Self::start("220 mock ready", script).await
    }

    pub fn uri(&self, path: &str) -> String {
        format!("ftp://{USER}:{PASS}@{}{path}", self.addr)
    }

    pub async fn finish(self) -> Transcript {
        self.handle.await.unwrap()
    }
}

pub fn login_steps() -> Vec<Step> {
    vec![
        Step::Reply("USER", "331 Password required"),
        Step::Reply("PASS", "230 Logged in"),
    ]
}

pub fn test_config() -> Config {
    Config {
        timeout_secs: 5,
        ..Config::default()
    }
}

async fn serve(stream: TcpStream, greeting: &str, steps: Vec<Step>) -> Transcript {
    let mut control = BufReader::new(stream);
    let mut transcript = Transcript::default();
    let mut data_listener: Option<TcpListener> = None;

    let _ = send_reply(&mut control, greeting).await;

    for step in steps {
        let Some(line) = read_command(&mut control).await else {
            return transcript;
        };
        transcript.commands.push(line.clone());

        let expected = match &step {
            Step::Reply(prefix, _) | Step::Ignore(prefix) => *prefix,
            Step::Passive => "PASV",
            Step::SendData(prefix, _, _)
            | Step::ReceiveData(prefix, _)
            | Step::StallData(prefix) => *prefix,
        };
        if !line.starts_with(expected) {
            transcript.mismatch = Some(format!("expected {expected}, got {line}"));
            break;
        }

        match step {
            Step::Reply(_, reply) => {
                let _ = send_reply(&mut control, reply).await;
            }
            Step::Ignore(_) => {}
            Step::Passive => {
                let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                let port = listener.local_addr().unwrap().port();
                let reply = format!(
                    "227 Entering Passive Mode (127,0,0,1,{},{}).",
                    port >> 8,
                    port & 0xff
                );
                data_listener = Some(listener);
                let _ = send_reply(&mut control, &reply).await;
            }
            Step::SendData(_, payload, complete) => {
                let _ = send_reply(&mut control, "150 Opening data connection").await;
                if let Some(listener) = data_listener.take() {
                    if let Ok((mut data, _)) = listener.accept().await {
                        let _ = data.write_all(&payload).await;
                        let _ = data.shutdown().await;
                    }
                }
                let _ = send_reply(&mut control, complete).await;
            }
            Step::ReceiveData(_, complete) => {
                let _ = send_reply(&mut control, "150 Ready to receive").await;
                if let Some(listener) = data_listener.take() {
                    if let Ok((mut data, _)) = listener.accept().await {
                        let _ = data.read_to_end(&mut transcript.received).await;
                    }
                }
                let _ = send_reply(&mut control, complete).await;
            }
            Step::StallData(_) => {
                let _ = send_reply(&mut control, "150 Opening data connection").await;
                if let Some(listener) = data_listener.take() {
                    if let Ok((mut data, _)) = listener.accept().await {
                        let mut sink = Vec::new();
                        let _ = timeout(Duration::from_secs(10), data.read_to_end(&mut sink)).await;
                    }
                }
            }
        }
    }

    // Record whatever else the client sends (QUIT, or commands it should not have sent).
    while let Some(line) = read_command(&mut control).await {
        transcript.commands.push(line);
    }
    transcript
}

async fn read_command(control: &mut BufReader<TcpStream>) -> Option<String> {
    let mut line = String::new();
    match timeout(Duration::from_secs(2), control.read_line(&mut line)).await {
        Ok(Ok(n)) if n > 0 => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        _ => None,
    }
}

async fn send_reply(control: &mut BufReader<TcpStream>, reply: &str) -> std::io::Result<()> {
    let mut wire = String::new();
    for line in reply.split('\n') {
        wire.push_str(line);
        wire.push_str("\r\n");
    }
    control.get_mut().write_all(wire.as_bytes()).await
}
