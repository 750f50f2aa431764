//! Test harness shared by the integration tests
//!
//! An in-process RTSP server on a loopback `TcpListener` that records every
//! request it receives, a frame-collecting sink, and helpers for sending RTP
//! datagrams at a session's data port.

use bytes::Bytes;
use parking_lot::Mutex;
use rtsp::{DataFrame, FrameSink, StreamReport};
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

pub const TEST_SESSION_ID: &str = "123456";

/// One request as seen by the fake server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub resource: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn cseq(&self) -> Option<u32> {
        self.header("CSeq")?.trim().parse().ok()
    }

    /// Port advertised in `Transport: ...; client_port= N`
    pub fn client_port(&self) -> Option<u16> {
        let transport = self.header("Transport")?;
        let (_, rest) = transport.split_once("client_port=")?;
        let digits: String = rest
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
}

#[derive(Debug, Clone)]
struct Script {
    session_id: Option<String>,
    session_suffix: String,
    rejections: HashMap<String, (u16, String)>,
    cseq_offset: u32,
}

impl Default for Script {
    fn default() -> Self {
        Script {
            session_id: Some(TEST_SESSION_ID.to_string()),
            session_suffix: String::new(),
            rejections: HashMap::new(),
            cseq_offset: 0,
        }
    }
}

/// Scripted RTSP server accepting a single control connection
pub struct FakeServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    script: Arc<Mutex<Script>>,
    handle: Option<JoinHandle<()>>,
}

impl FakeServer {
    /// Answer every request with 200 and the test session id
    pub fn start() -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));
        let script = Arc::new(Mutex::new(Script::default()));

        let thread_requests = Arc::clone(&requests);
        let thread_script = Arc::clone(&script);
        let handle = thread::Builder::new()
            .name("fake-rtsp-server".to_string())
            .spawn(move || {
                if let Ok((stream, _)) = listener.accept() {
                    let _ = serve(stream, &thread_requests, &thread_script);
                }
            })?;

        Ok(FakeServer {
            addr,
            requests,
            script,
            handle: Some(handle),
        })
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Answer `method` with `code` until `accept` is called
    pub fn reject(&self, method: &str, code: u16, reason: &str) {
        self.script
            .lock()
            .rejections
            .insert(method.to_string(), (code, reason.to_string()));
    }

    pub fn accept(&self, method: &str) {
        self.script.lock().rejections.remove(method);
    }

    /// Omit the Session header from replies
    pub fn omit_session(&self) {
        self.script.lock().session_id = None;
    }

    /// Append parameters such as ";timeout=60" to the Session header
    pub fn session_suffix(&self, suffix: &str) {
        self.script.lock().session_suffix = suffix.to_string();
    }

    /// Echo a CSeq that differs from the request's by `offset`
    pub fn skew_cseq(&self, offset: u32) {
        self.script.lock().cseq_offset = offset;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    pub fn methods(&self) -> Vec<String> {
        self.requests.lock().iter().map(|r| r.method.clone()).collect()
    }

    /// Data port from the most recent SETUP
    pub fn client_port(&self) -> Option<u16> {
        self.requests
            .lock()
            .iter()
            .rev()
            .find(|r| r.method == "SETUP")
            .and_then(RecordedRequest::client_port)
    }

    pub fn data_target(&self) -> Option<SocketAddr> {
        self.client_port()
            .map(|port| SocketAddr::new(self.addr.ip(), port))
    }

    /// Wait for the client to hang up
    pub fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn serve(
    stream: TcpStream,
    requests: &Mutex<Vec<RecordedRequest>>,
    script: &Mutex<Script>,
) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut writer = stream;

    while let Some(request) = read_request(&mut reader)? {
        let reply = {
            let script = script.lock();
            build_reply(&request, &script)
        };
        requests.lock().push(request);
        writer.write_all(reply.as_bytes())?;
        writer.flush()?;
    }
    Ok(())
}

fn read_request<R: BufRead>(reader: &mut R) -> io::Result<Option<RecordedRequest>> {
    let mut line = String::new();
    loop {
        line.clear();
        if reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        if !line.trim().is_empty() {
            break;
        }
    }

    let mut parts = line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let resource = parts.next().unwrap_or_default().to_string();
    let version = parts.next().unwrap_or_default().to_string();

    let mut headers = Vec::new();
    loop {
        let mut header = String::new();
        if reader.read_line(&mut header)? == 0 {
            break;
        }
        let header = header.trim_end_matches(&['\r', '\n'][..]);
        if header.is_empty() {
            break;
        }
        if let Some((name, value)) = header.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }

    Ok(Some(RecordedRequest {
        method,
        resource,
        version,
        headers,
    }))
}

fn build_reply(request: &RecordedRequest, script: &Script) -> String {
    let cseq = request.cseq().unwrap_or(0) + script.cseq_offset;
    let (code, reason) = script
        .rejections
        .get(&request.method)
        .cloned()
        .unwrap_or((200, "OK".to_string()));

    let mut reply = format!("RTSP/1.0 {} {}\r\nCSeq: {}\r\n", code, reason, cseq);
    if let Some(id) = &script.session_id {
        reply.push_str(&format!("Session: {}{}\r\n", id, script.session_suffix));
    }
    reply.push_str("\r\n");
    reply
}

/// RTP datagram carrying `payload`
pub fn rtp_datagram(payload_type: u8, seq: u16, payload: &[u8]) -> Vec<u8> {
    DataFrame::new(
        payload_type,
        false,
        seq,
        u32::from(seq) * 3000,
        Bytes::copy_from_slice(payload),
    )
    .to_bytes()
    .to_vec()
}

/// Sends RTP datagrams to a session's data port
pub struct RtpSender {
    socket: UdpSocket,
    target: SocketAddr,
}

impl RtpSender {
    pub fn new(target: SocketAddr) -> io::Result<Self> {
        Ok(RtpSender {
            socket: UdpSocket::bind("127.0.0.1:0")?,
            target,
        })
    }

    pub fn send_raw(&self, datagram: &[u8]) -> io::Result<()> {
        self.socket.send_to(datagram, self.target)?;
        Ok(())
    }

    /// Send one MJPEG frame whose payload names its sequence number
    pub fn send_frame(&self, seq: u16) -> io::Result<()> {
        let payload = format!("frame-{}", seq);
        self.send_raw(&rtp_datagram(26, seq, payload.as_bytes()))
    }

    pub fn send_frames(&self, seqs: &[u16]) -> io::Result<()> {
        for &seq in seqs {
            self.send_frame(seq)?;
        }
        Ok(())
    }
}

#[derive(Default)]
struct Collected {
    frames: Vec<DataFrame>,
    reports: Vec<StreamReport>,
}

/// Sink that keeps every delivered frame and report
#[derive(Clone, Default)]
pub struct FrameCollector {
    inner: Arc<Mutex<Collected>>,
}

impl FrameCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sequences(&self) -> Vec<u16> {
        self.inner.lock().frames.iter().map(|f| f.sequence()).collect()
    }

    pub fn frames(&self) -> Vec<DataFrame> {
        self.inner.lock().frames.clone()
    }

    pub fn reports(&self) -> Vec<StreamReport> {
        self.inner.lock().reports.clone()
    }

    /// Poll until at least `count` frames have arrived
    pub fn wait_for_frames(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.inner.lock().frames.len() >= count)
    }

    pub fn wait_for_report(&self, timeout: Duration) -> Option<StreamReport> {
        if wait_until(timeout, || !self.inner.lock().reports.is_empty()) {
            self.inner.lock().reports.last().cloned()
        } else {
            None
        }
    }
}

impl FrameSink for FrameCollector {
    fn on_frame(&mut self, frame: DataFrame) {
        self.inner.lock().frames.push(frame);
    }

    fn on_stream_end(&mut self, report: &StreamReport) {
        self.inner.lock().reports.push(report.clone());
    }
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub fn wait_until<F: FnMut() -> bool>(timeout: Duration, mut condition: F) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}
