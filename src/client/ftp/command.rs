use std::fmt;

use crate::client::TransferMode;

/// Control-channel commands issued by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FtpCommand {
    User,
    Pass,
    Type(TransferMode),
    Pasv,
    Retr,
    Stor,
    List,
    Mkd,
    Cwd,
    Cdup,
    Size,
    Quit,
}

impl FtpCommand {
    pub const fn verb(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Pass => "PASS",
            Self::Type(TransferMode::Binary) => "TYPE I",
            Self::Type(TransferMode::Text) => "TYPE A",
            Self::Pasv => "PASV",
            Self::Retr => "RETR",
            Self::Stor => "STOR",
            Self::List => "LIST",
            Self::Mkd => "MKD",
            Self::Cwd => "CWD",
            Self::Cdup => "CDUP",
            Self::Size => "SIZE",
            Self::Quit => "QUIT",
        }
    }

    /// Render the command line, CRLF terminated.
    pub(crate) fn line(self, arg: Option<&str>) -> Vec<u8> {
        let verb = self.verb();
        let arg_len = arg.map_or(0, |a| a.len() + 1);
        let mut buf = Vec::with_capacity(verb.len() + arg_len + 2);
        buf.extend_from_slice(verb.as_bytes());
        if let Some(arg) = arg {
            buf.push(b' ');
            buf.extend_from_slice(arg.as_bytes());
        }
        buf.extend_from_slice(b"\r\n");
        buf
    }
}

impl fmt::Display for FtpCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}
