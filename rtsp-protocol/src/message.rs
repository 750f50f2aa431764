//! RTSP Control Messages
//!
//! Requests are encoded as CRLF-terminated text lines ending in a blank line.
//! Responses are read from any buffered reader: a status line, `Name: value`
//! headers, a blank line, and an optional body sized by `Content-Length`.

use bytes::Bytes;
use std::fmt;
use std::io::{self, BufRead};
use thiserror::Error;

/// Protocol version written on every request line
pub const RTSP_VERSION: &str = "RTSP/1.0";

/// Status code of a successful response
pub const STATUS_OK: u16 = 200;

/// Line terminator for control requests
const CRLF: &str = "\r\n";

/// Largest response body accepted; control responses carry at most a short
/// SDP description
pub const MAX_BODY_SIZE: u32 = 64 * 1024;

/// Control method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Setup,
    Play,
    Pause,
    Teardown,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Setup => "SETUP",
            Method::Play => "PLAY",
            Method::Pause => "PAUSE",
            Method::Teardown => "TEARDOWN",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Malformed or unsuccessful control exchange
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Malformed status line: {0:?}")]
    MalformedStatusLine(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("Invalid {name} header value: {value:?}")]
    InvalidHeaderValue { name: &'static str, value: String },

    #[error("Server returned {code} {reason}")]
    Status { code: u16, reason: String },

    #[error("CSeq mismatch: sent {expected}, got {actual}")]
    CSeqMismatch { expected: u32, actual: u32 },

    #[error("Response to SETUP carried no session identifier")]
    MissingSession,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A single control request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub resource: String,
    pub cseq: u32,
    /// Local data-channel port advertised in the `Transport` header
    pub client_port: Option<u16>,
    pub session: Option<String>,
}

impl Request {
    pub fn new(method: Method, resource: impl Into<String>, cseq: u32) -> Self {
        Request {
            method,
            resource: resource.into(),
            cseq,
            client_port: None,
            session: None,
        }
    }

    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_port = Some(port);
        self
    }

    pub fn with_session(mut self, session: impl Into<String>) -> Self {
        self.session = Some(session.into());
        self
    }

    /// Encode to the wire text, blank-line terminated
    pub fn encode(&self) -> String {
        let mut out = format!(
            "{} {} {}{CRLF}CSeq: {}{CRLF}",
            self.method, self.resource, RTSP_VERSION, self.cseq
        );
        if let Some(port) = self.client_port {
            out.push_str(&format!("Transport: RTP/UDP; client_port= {}{CRLF}", port));
        }
        if let Some(session) = &self.session {
            out.push_str(&format!("Session: {}{CRLF}", session));
        }
        out.push_str(CRLF);
        out
    }
}

/// A parsed control response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub code: u16,
    pub reason: String,
    headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Response {
            code,
            reason: reason.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn is_success(&self) -> bool {
        self.code == STATUS_OK
    }

    /// Case-insensitive header lookup (first match)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Correlation number echoed by the server, if any
    pub fn cseq(&self) -> Result<Option<u32>, ProtocolError> {
        self.numeric_header("CSeq")
    }

    /// Session identifier with any `;timeout=` parameters removed
    pub fn session(&self) -> Option<&str> {
        self.header("Session")
            .map(|value| value.split(';').next().unwrap_or(value).trim())
            .filter(|id| !id.is_empty())
    }

    /// Turn a non-200 response into `ProtocolError::Status`
    pub fn ensure_success(self) -> Result<Self, ProtocolError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(ProtocolError::Status {
                code: self.code,
                reason: self.reason,
            })
        }
    }

    fn numeric_header(&self, name: &'static str) -> Result<Option<u32>, ProtocolError> {
        match self.header(name) {
            None => Ok(None),
            Some(value) => value
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| ProtocolError::InvalidHeaderValue {
                    name,
                    value: value.to_string(),
                }),
        }
    }

    /// Read one complete response
    ///
    /// Blocks until the blank line (and body, if announced) has arrived.
    /// End of stream before the status line is an I/O error.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self, ProtocolError> {
        let status = match read_line(reader, ProtocolError::MalformedStatusLine)? {
            Some(line) => line,
            None => {
                return Err(ProtocolError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "control connection closed",
                )))
            }
        };
        let (code, reason) = parse_status_line(&status)?;

        let mut response = Response::new(code, reason);
        loop {
            let line = read_line(reader, ProtocolError::MalformedHeader)?.ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "response headers truncated")
            })?;
            if line.is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ProtocolError::MalformedHeader(line.clone()))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(ProtocolError::MalformedHeader(line));
            }
            response.headers.push((name.to_string(), value.trim().to_string()));
        }

        if let Some(len) = response.numeric_header("Content-Length")? {
            if len > MAX_BODY_SIZE {
                return Err(ProtocolError::InvalidHeaderValue {
                    name: "Content-Length",
                    value: len.to_string(),
                });
            }
            let mut body = vec![0u8; len as usize];
            reader.read_exact(&mut body)?;
            response.body = Bytes::from(body);
        }

        Ok(response)
    }

    /// Encode to wire text (used by test servers and tooling)
    pub fn encode(&self) -> String {
        let mut out = format!("{} {} {}{CRLF}", RTSP_VERSION, self.code, self.reason);
        for (name, value) in &self.headers {
            out.push_str(&format!("{}: {}{CRLF}", name, value));
        }
        out.push_str(CRLF);
        out
    }
}

/// Read one line without its terminator; `None` at end of stream
///
/// A line that is not UTF-8 is malformed input, reported through `malformed`.
fn read_line<R: BufRead>(
    reader: &mut R,
    malformed: fn(String) -> ProtocolError,
) -> Result<Option<String>, ProtocolError> {
    let mut raw = Vec::new();
    if reader.read_until(b'\n', &mut raw)? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8(raw)
        .map_err(|e| malformed(String::from_utf8_lossy(e.as_bytes()).into_owned()))?;
    let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
    Ok(Some(trimmed.to_string()))
}

fn parse_status_line(line: &str) -> Result<(u16, String), ProtocolError> {
    let malformed = || ProtocolError::MalformedStatusLine(line.to_string());

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(malformed)?;
    if !version.starts_with("RTSP/") {
        return Err(malformed());
    }
    let code = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .filter(|code| (100..1000).contains(code))
        .ok_or_else(malformed)?;
    let reason = parts.next().unwrap_or("").trim().to_string();

    Ok((code, reason))
}
