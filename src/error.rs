use std::io;

use thiserror::Error;

use crate::client::ftp::FtpCommand;

/// Failure class of a transfer, independent of the backend that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InputInvalid,
    ConnectFailed,
    AuthFailed,
    ProtocolError,
    TooLarge,
    Timeout,
    DelegateFailure,
}

impl ErrorKind {
    /// Stable numeric code handed to host applications and used as exit status.
    pub const fn code(self) -> i32 {
        match self {
            Self::InputInvalid => 2,
            Self::ConnectFailed => 3,
            Self::AuthFailed => 4,
            Self::ProtocolError => 5,
            Self::TooLarge => 6,
            Self::Timeout => 7,
            Self::DelegateFailure => 8,
        }
    }
}

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("unexpected reply {code} to {command}: {message}")]
    UnexpectedReply {
        command: FtpCommand,
        code: u16,
        message: String,
    },
    #[error("malformed passive mode reply: {0}")]
    MalformedPassive(String),
    #[error("malformed reply line: {0:?}")]
    MalformedReply(String),
    #[error("invalid reply code {0}")]
    InvalidReplyCode(u16),
    #[error("reply line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("multi-line reply exceeds {0} lines")]
    TooManyLines(usize),
    #[error("control connection closed by server")]
    ConnectionClosed,
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("invalid input: {0}")]
    InputInvalid(String),
    #[error("failed to connect to {addr}: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("server refused connection: {0}")]
    Refused(String),
    #[error("authentication failed at {stage}: {reply}")]
    AuthFailed { stage: &'static str, reply: String },
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("transfer exceeds the limit of {limit} bytes")]
    TooLarge { limit: u64 },
    #[error("timed out while {0}")]
    Timeout(&'static str),
    #[error("i/o error while {stage}: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("sftp: {0}")]
    Delegate(String),
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InputInvalid(_) => ErrorKind::InputInvalid,
            Self::ConnectFailed { .. } | Self::Refused(_) | Self::Io { .. } => {
                ErrorKind::ConnectFailed
            }
            Self::AuthFailed { .. } => ErrorKind::AuthFailed,
            Self::Protocol(_) => ErrorKind::ProtocolError,
            Self::TooLarge { .. } => ErrorKind::TooLarge,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Delegate(_) => ErrorKind::DelegateFailure,
        }
    }

    pub(crate) fn io(stage: &'static str) -> impl FnOnce(io::Error) -> Self {
        move |source| Self::Io { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, TransferError>;
