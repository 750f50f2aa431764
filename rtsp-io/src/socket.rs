//! UDP data socket
//!
//! Blocking datagram socket for the RTP data channel, bound to an ephemeral
//! port with a receive timeout so the reader can notice an idle stream.

use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;
use thiserror::Error;

/// Data socket errors
#[derive(Error, Debug)]
pub enum SocketError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Receive timed out")]
    Timeout,

    #[error("Invalid socket address")]
    InvalidAddress,
}

impl SocketError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, SocketError::Timeout)
    }
}

/// RTP data socket
pub struct DataSocket {
    inner: UdpSocket,
}

impl DataSocket {
    /// Bind to `addr` (port 0 picks an ephemeral port) with a receive timeout
    pub fn bind(addr: SocketAddr, read_timeout: Duration) -> Result<Self, SocketError> {
        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP))?;
        socket.bind(&addr.into())?;
        socket.set_read_timeout(Some(read_timeout))?;

        Ok(DataSocket {
            inner: socket.into(),
        })
    }

    /// Set the kernel receive buffer size
    pub fn set_recv_buffer_size(&self, size: usize) -> Result<(), SocketError> {
        socket2::SockRef::from(&self.inner).set_recv_buffer_size(size)?;
        Ok(())
    }

    /// Get the local address this socket is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, SocketError> {
        Ok(self.inner.local_addr()?)
    }

    /// Local port advertised to the server
    pub fn local_port(&self) -> Result<u16, SocketError> {
        let port = self.local_addr()?.port();
        if port == 0 {
            return Err(SocketError::InvalidAddress);
        }
        Ok(port)
    }

    /// Block for one datagram, up to the configured timeout
    pub fn recv(&self, buf: &mut [u8]) -> Result<usize, SocketError> {
        match self.inner.recv_from(buf) {
            Ok((n, _addr)) => Ok(n),
            // Unix reports an expired SO_RCVTIMEO as WouldBlock, Windows as TimedOut.
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                Err(SocketError::Timeout)
            }
            Err(e) => Err(SocketError::Io(e)),
        }
    }
}
