use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::Instant;

use crate::client::timed;
use crate::codec;
use crate::error::{ProtocolError, Result, TransferError};

/// Extract `h1,h2,h3,h4,p1,p2` from a 227 reply.
pub fn parse_pasv_reply(text: &str) -> std::result::Result<SocketAddr, ProtocolError> {
    let malformed = || ProtocolError::MalformedPassive(text.trim_end().to_string());

    let start = text.find('(').ok_or_else(malformed)?;
    let end = text[start..].find(')').ok_or_else(malformed)? + start;

    let fields = text[start + 1..end]
        .split(',')
        .map(|f| f.trim().parse::<u8>())
        .collect::<std::result::Result<Vec<u8>, _>>()
        .map_err(|_| malformed())?;
    let &[h1, h2, h3, h4, p1, p2] = fields.as_slice() else {
        return Err(malformed());
    };

    let ip = IpAddr::V4(Ipv4Addr::new(h1, h2, h3, h4));
    let port = u16::from(p1) * 256 + u16::from(p2);
    Ok(SocketAddr::new(ip, port))
}

/// Servers behind NAT sometimes advertise 0.0.0.0; dial the control peer instead.
pub fn resolve_data_addr(advertised: SocketAddr, control_peer: SocketAddr) -> SocketAddr {
    if advertised.ip().is_unspecified() {
        SocketAddr::new(control_peer.ip(), advertised.port())
    } else {
        advertised
    }
}

/// One passive-mode data connection. Dropping it closes the socket.
pub struct DataChannel {
    stream: TcpStream,
    deadline: Instant,
}

impl DataChannel {
    pub async fn open(addr: SocketAddr, timeout: Duration) -> Result<Self> {
        let deadline = Instant::now() + timeout;
        let stream = timed(deadline, "opening data connection", TcpStream::connect(addr))
            .await?
            .map_err(|source| TransferError::ConnectFailed {
                addr: addr.to_string(),
                source,
            })?;
        debug!("ftp: data connection open to {addr}");
        Ok(DataChannel { stream, deadline })
    }

    /// Drain the channel until the server closes it, then close our side.
    pub async fn receive(mut self, limit: u64) -> Result<Vec<u8>> {
        let deadline = self.deadline;
        let data = timed(
            deadline,
            "receiving data",
            codec::read_bounded(&mut self.stream, limit),
        )
        .await??;
        debug!("ftp: received {} bytes, closing data connection", data.len());
        Ok(data)
    }

    /// Write the whole payload and close the channel, which marks EOF for the server.
    pub async fn send(mut self, payload: &[u8]) -> Result<()> {
        let deadline = self.deadline;
        let stream = &mut self.stream;
        timed(deadline, "sending data", async {
            stream.write_all(payload).await?;
            stream.shutdown().await
        })
        .await?
        .map_err(TransferError::io("sending data"))?;
        debug!("ftp: sent {} bytes, closing data connection", payload.len());
        Ok(())
    }
}
