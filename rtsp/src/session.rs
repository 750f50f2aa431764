//! RTSP Session State Machine
//!
//! A `Session` owns one control connection and, while a stream is set up,
//! one UDP data socket. Control operations are serialized by a single
//! connection-wide lock; starting and stopping the receive loop happens while
//! that lock is held, and stopping blocks until the loop has exited, so the
//! reorder buffer and statistics can be reset without racing the loop.
//!
//! Expected lifecycle: open → setup → play → (pause → play)* → teardown →
//! close. Any other order fails with [`RtspError::InvalidState`] before
//! anything is sent.

use crate::config::SessionConfig;
use crate::error::RtspError;
use crate::pipeline::{FrameSink, Pipeline, SessionStats};
use crate::receiver::{Shared, StreamReceiver};
use parking_lot::Mutex;
use rtsp_io::{ControlChannel, DataSocket};
use rtsp_protocol::{ConnectionState, Method, ProtocolError, Request, Response, StreamReport};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

/// Resources that exist between a successful SETUP and TEARDOWN
struct StreamSetup {
    resource: String,
    session_id: String,
    socket: Arc<DataSocket>,
}

struct Inner {
    state: ConnectionState,
    control: ControlChannel,
    stream: Option<StreamSetup>,
    receiver: Option<StreamReceiver>,
}

impl Inner {
    fn check(&self, method: Method) -> Result<(), RtspError> {
        if self.state.allows(method) {
            Ok(())
        } else {
            Err(RtspError::InvalidState {
                operation: method,
                state: self.state,
            })
        }
    }

    fn stream(&self, method: Method) -> Result<&StreamSetup, RtspError> {
        self.stream.as_ref().ok_or(RtspError::InvalidState {
            operation: method,
            state: self.state,
        })
    }

    /// Request for an already set up stream
    fn stream_request(&mut self, method: Method) -> Result<Request, RtspError> {
        let stream = self.stream.as_ref().ok_or(RtspError::InvalidState {
            operation: method,
            state: self.state,
        })?;
        Ok(self
            .control
            .next_request(method, &stream.resource)
            .with_session(stream.session_id.clone()))
    }

    /// Send `request` and require a 200 response
    fn exchange(&mut self, request: &Request) -> Result<Response, RtspError> {
        let response = self.control.exchange(request)?;
        if !response.is_success() {
            warn!(
                method = %request.method,
                code = response.code,
                reason = %response.reason,
                "request rejected"
            );
        }
        Ok(response.ensure_success()?)
    }

    fn stop_receiver(&mut self) {
        if let Some(receiver) = self.receiver.take() {
            receiver.stop();
        }
    }
}

/// Client-side RTSP session
pub struct Session {
    inner: Mutex<Inner>,
    shared: Arc<Shared>,
    config: SessionConfig,
}

impl Session {
    /// Connect to an RTSP server with default settings
    ///
    /// No request is sent; the session starts in INIT.
    pub fn open<S>(host: &str, port: u16, sink: S) -> Result<Self, RtspError>
    where
        S: FrameSink + 'static,
    {
        Self::open_with(host, port, SessionConfig::default(), sink)
    }

    pub fn open_with<S>(
        host: &str,
        port: u16,
        config: SessionConfig,
        sink: S,
    ) -> Result<Self, RtspError>
    where
        S: FrameSink + 'static,
    {
        config.validate()?;
        let control = ControlChannel::open(host, port)?;
        info!(peer = %control.peer_addr(), "connected to RTSP server");

        let pipeline = Pipeline::new(config.reorder_depth, config.payload_type);
        Ok(Session {
            inner: Mutex::new(Inner {
                state: ConnectionState::Init,
                control,
                stream: None,
                receiver: None,
            }),
            shared: Arc::new(Shared::new(pipeline, Box::new(sink))),
            config,
        })
    }

    /// Set up `resource`, opening the data socket on an ephemeral port
    pub fn setup(&self, resource: &str) -> Result<(), RtspError> {
        let mut inner = self.inner.lock();
        inner.check(Method::Setup)?;

        let bind_addr = SocketAddr::new(self.config.data_bind_addr, 0);
        let socket =
            DataSocket::bind(bind_addr, self.config.recv_timeout).map_err(RtspError::data_socket)?;
        if let Some(size) = self.config.recv_buffer_size {
            socket
                .set_recv_buffer_size(size)
                .map_err(RtspError::data_socket)?;
        }
        let port = socket.local_port().map_err(RtspError::data_socket)?;

        let request = inner
            .control
            .next_request(Method::Setup, resource)
            .with_client_port(port);
        let response = inner.exchange(&request)?;
        let session_id = response
            .session()
            .ok_or(ProtocolError::MissingSession)?
            .to_string();

        info!(resource, session = %session_id, data_port = port, "stream set up");
        inner.stream = Some(StreamSetup {
            resource: resource.to_string(),
            session_id,
            socket: Arc::new(socket),
        });
        inner.state = ConnectionState::after(Method::Setup);
        Ok(())
    }

    /// Start playback and the receive loop
    pub fn play(&self) -> Result<(), RtspError> {
        let mut inner = self.inner.lock();
        inner.check(Method::Play)?;

        let request = inner.stream_request(Method::Play)?;
        inner.exchange(&request)?;

        let socket = Arc::clone(&inner.stream(Method::Play)?.socket);
        let receiver = StreamReceiver::start(socket, Arc::clone(&self.shared), &self.config)?;
        inner.receiver = Some(receiver);
        inner.state = ConnectionState::after(Method::Play);
        info!("playing");
        Ok(())
    }

    /// Pause playback; returns once the receive loop has stopped
    pub fn pause(&self) -> Result<(), RtspError> {
        let mut inner = self.inner.lock();
        inner.check(Method::Pause)?;

        let request = inner.stream_request(Method::Pause)?;
        inner.exchange(&request)?;

        inner.stop_receiver();
        inner.state = ConnectionState::after(Method::Pause);
        info!("paused");
        Ok(())
    }

    /// Tear the stream down, keeping the control connection open
    ///
    /// Closes the data socket and discards buffered frames and statistics.
    pub fn teardown(&self) -> Result<(), RtspError> {
        let mut inner = self.inner.lock();
        inner.check(Method::Teardown)?;

        let request = inner.stream_request(Method::Teardown)?;
        inner.exchange(&request)?;

        inner.stop_receiver();
        inner.stream = None;
        self.shared.pipeline.lock().reset();
        inner.state = ConnectionState::after(Method::Teardown);
        info!("torn down");
        Ok(())
    }

    /// Release every resource; always succeeds and may be called repeatedly
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ConnectionState::Closed {
            return;
        }

        inner.stop_receiver();
        inner.stream = None;
        inner.control.close();
        inner.state = ConnectionState::Closed;
        info!("session closed");
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    /// Session identifier assigned by the server at SETUP
    pub fn session_id(&self) -> Option<String> {
        self.inner.lock().stream.as_ref().map(|s| s.session_id.clone())
    }

    /// Resource named at SETUP
    pub fn resource(&self) -> Option<String> {
        self.inner.lock().stream.as_ref().map(|s| s.resource.clone())
    }

    /// Local UDP port of the data socket while a stream is set up
    pub fn data_port(&self) -> Option<u16> {
        let inner = self.inner.lock();
        let stream = inner.stream.as_ref()?;
        stream.socket.local_port().ok()
    }

    /// Whether the receive loop is currently reading packets
    pub fn is_receiving(&self) -> bool {
        self.inner
            .lock()
            .receiver
            .as_ref()
            .map_or(false, StreamReceiver::is_receiving)
    }

    pub fn stats(&self) -> SessionStats {
        self.shared.pipeline.lock().snapshot()
    }

    /// Report produced when the stream last went idle
    pub fn last_report(&self) -> Option<StreamReport> {
        self.shared.pipeline.lock().last_report().cloned()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}
