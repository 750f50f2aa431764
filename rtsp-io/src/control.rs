//! RTSP control channel
//!
//! One TCP connection carrying strictly alternating request/response pairs.
//! Requests are never pipelined: the caller reads the matching response
//! before sending the next request. Response reads have no timeout.

use rtsp_protocol::message::{Method, ProtocolError, Request, Response};
use std::io::{self, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use thiserror::Error;
use tracing::debug;

/// Control channel errors
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("Failed to connect to {target}: {source}")]
    Connect {
        target: String,
        #[source]
        source: io::Error,
    },

    #[error("Control channel is closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Protocol error: {0}")]
    Protocol(ProtocolError),
}

impl From<ProtocolError> for ControlError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Io(e) => ControlError::Io(e),
            other => ControlError::Protocol(other),
        }
    }
}

struct Stream {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

/// Request/response channel to an RTSP server
pub struct ControlChannel {
    stream: Option<Stream>,
    peer: SocketAddr,
    last_cseq: u32,
}

impl ControlChannel {
    /// Connect to `host:port`
    pub fn open(host: &str, port: u16) -> Result<Self, ControlError> {
        let connect_err = |source: io::Error| ControlError::Connect {
            target: format!("{}:{}", host, port),
            source,
        };

        let writer = TcpStream::connect((host, port)).map_err(connect_err)?;
        let reader = writer.try_clone().map_err(connect_err)?;
        let peer = writer.peer_addr().map_err(connect_err)?;
        debug!(%peer, "control channel connected");

        Ok(ControlChannel {
            stream: Some(Stream {
                reader: BufReader::new(reader),
                writer,
            }),
            peer,
            last_cseq: 0,
        })
    }

    /// Build the next request, assigning it a fresh correlation number
    pub fn next_request(&mut self, method: Method, resource: &str) -> Request {
        self.last_cseq += 1;
        Request::new(method, resource, self.last_cseq)
    }

    /// Write one request
    pub fn send(&mut self, request: &Request) -> Result<(), ControlError> {
        let stream = self.stream.as_mut().ok_or(ControlError::Closed)?;
        let encoded = request.encode();
        debug!(method = %request.method, cseq = request.cseq, "sending request");

        stream.writer.write_all(encoded.as_bytes())?;
        stream.writer.flush()?;
        Ok(())
    }

    /// Block until one complete response has been read
    pub fn receive_response(&mut self) -> Result<Response, ControlError> {
        let stream = self.stream.as_mut().ok_or(ControlError::Closed)?;
        let response = Response::read_from(&mut stream.reader)?;
        debug!(code = response.code, reason = %response.reason, "received response");
        Ok(response)
    }

    /// Send `request` and read its response, checking the echoed CSeq
    pub fn exchange(&mut self, request: &Request) -> Result<Response, ControlError> {
        self.send(request)?;
        let response = self.receive_response()?;

        if let Some(cseq) = response.cseq()? {
            if cseq != request.cseq {
                return Err(ProtocolError::CSeqMismatch {
                    expected: request.cseq,
                    actual: cseq,
                }
                .into());
            }
        }
        Ok(response)
    }

    /// Release the connection; later calls are no-ops
    pub fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            // The peer may already be gone; nothing useful to do with the error.
            let _ = stream.writer.shutdown(Shutdown::Both);
            debug!(peer = %self.peer, "control channel closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpListener;
    use std::thread;

    /// Reads one request block and answers with `reply`
    fn serve_once(listener: TcpListener, reply: &'static str) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request = String::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request.push_str(&line);
                if line == "\r\n" {
                    break;
                }
            }
            let mut writer = stream;
            writer.write_all(reply.as_bytes()).unwrap();
            request
        })
    }

    fn listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[test]
    fn test_cseq_starts_at_one() {
        let (listener, port) = listener();
        let server = serve_once(listener, "RTSP/1.0 200 OK\r\nCSeq: 1\r\n\r\n");

        let mut channel = ControlChannel::open("127.0.0.1", port).unwrap();
        let request = channel.next_request(Method::Setup, "clip");
        assert_eq!(request.cseq, 1);

        let response = channel.exchange(&request).unwrap();
        assert!(response.is_success());
        assert!(server.join().unwrap().starts_with("SETUP clip RTSP/1.0\r\nCSeq: 1\r\n"));

        assert_eq!(channel.next_request(Method::Play, "clip").cseq, 2);
    }

    #[test]
    fn test_cseq_mismatch() {
        let (listener, port) = listener();
        let server = serve_once(listener, "RTSP/1.0 200 OK\r\nCSeq: 9\r\n\r\n");

        let mut channel = ControlChannel::open("127.0.0.1", port).unwrap();
        let request = channel.next_request(Method::Setup, "clip");
        let err = channel.exchange(&request).unwrap_err();

        assert!(matches!(
            err,
            ControlError::Protocol(ProtocolError::CSeqMismatch { expected: 1, actual: 9 })
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_peer_hangup_is_io_error() {
        let (listener, port) = listener();
        let server = serve_once(listener, "");

        let mut channel = ControlChannel::open("127.0.0.1", port).unwrap();
        let request = channel.next_request(Method::Setup, "clip");

        assert!(matches!(channel.exchange(&request), Err(ControlError::Io(_))));
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        let (listener, port) = listener();
        drop(listener);

        assert!(matches!(
            ControlChannel::open("127.0.0.1", port),
            Err(ControlError::Connect { .. })
        ));
    }

    #[test]
    fn test_close_idempotent() {
        let (listener, port) = listener();
        let _server = thread::spawn(move || listener.accept().map(|_| ()));

        let mut channel = ControlChannel::open("127.0.0.1", port).unwrap();
        channel.close();
        channel.close();

        assert!(!channel.is_open());
        let request = channel.next_request(Method::Play, "clip");
        assert!(matches!(channel.send(&request), Err(ControlError::Closed)));
    }
}
