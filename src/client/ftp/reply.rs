use std::fmt;

use crate::error::ProtocolError;

/// A complete server reply: numeric code plus the text of every line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: u16,
    lines: Vec<String>,
}

impl Reply {
    pub fn new(code: u16, lines: Vec<String>) -> Self {
        Reply { code, lines }
    }

    pub fn code(&self) -> u16 {
        self.code
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message())
    }
}

/// First line of a reply, split into code, continuation flag and text.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct StatusLine<'a> {
    pub(crate) code: u16,
    pub(crate) multi_line: bool,
    pub(crate) text: &'a str,
}

pub(crate) fn parse_status_line(line: &str) -> Result<StatusLine<'_>, ProtocolError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let bytes = line.as_bytes();
    if bytes.len() < 3 || !bytes[..3].iter().all(u8::is_ascii_digit) {
        return Err(ProtocolError::MalformedReply(line.to_string()));
    }
    let code = bytes[..3]
        .iter()
        .fold(0u16, |acc, d| acc * 10 + u16::from(d - b'0'));
    if !(100..600).contains(&code) {
        return Err(ProtocolError::InvalidReplyCode(code));
    }

    let (multi_line, text) = match bytes.get(3) {
        None => (false, ""),
        Some(b' ') => (false, &line[4..]),
        Some(b'-') => (true, &line[4..]),
        Some(_) => return Err(ProtocolError::MalformedReply(line.to_string())),
    };
    Ok(StatusLine {
        code,
        multi_line,
        text,
    })
}

/// Whether `line` terminates a multi-line reply opened with `code`.
pub(crate) fn is_final_line(code: u16, line: &str) -> bool {
    let line = line.trim_end_matches(['\r', '\n']);
    let prefix = code.to_string();
    line.strip_prefix(prefix.as_str())
        .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}
