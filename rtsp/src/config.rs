//! Session configuration

use crate::error::RtspError;
use rtsp_protocol::{DEFAULT_LOW_WATERMARK, MJPEG_PAYLOAD_TYPE};
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Largest datagram the receive loop accepts
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 15000;

/// Data socket receive timeout; an idle stream this long is treated as ended
pub const DEFAULT_RECV_TIMEOUT: Duration = Duration::from_secs(1);

/// Minimum spacing between the starts of two receive-loop iterations
pub const DEFAULT_MIN_POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Arrival-rate sampling period
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_secs(1);

/// Engine tuning for one session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Local address for the data socket; the port is always ephemeral
    pub data_bind_addr: IpAddr,
    pub recv_timeout: Duration,
    pub min_poll_interval: Duration,
    pub sample_interval: Duration,
    /// Reorder buffer low-watermark
    pub reorder_depth: usize,
    pub max_datagram_size: usize,
    /// Only frames with this payload type are delivered
    pub payload_type: u8,
    /// Kernel receive buffer size for the data socket, if overridden
    pub recv_buffer_size: Option<usize>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            data_bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            recv_timeout: DEFAULT_RECV_TIMEOUT,
            min_poll_interval: DEFAULT_MIN_POLL_INTERVAL,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            reorder_depth: DEFAULT_LOW_WATERMARK,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            payload_type: MJPEG_PAYLOAD_TYPE,
            recv_buffer_size: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), RtspError> {
        if self.recv_timeout.is_zero() {
            return Err(RtspError::InvalidConfig("recv_timeout must be non-zero".into()));
        }
        if self.sample_interval.is_zero() {
            return Err(RtspError::InvalidConfig("sample_interval must be non-zero".into()));
        }
        if self.reorder_depth == 0 {
            return Err(RtspError::InvalidConfig("reorder_depth must be at least 1".into()));
        }
        if self.max_datagram_size < rtsp_protocol::HEADER_SIZE {
            return Err(RtspError::InvalidConfig(format!(
                "max_datagram_size must be at least {} bytes",
                rtsp_protocol::HEADER_SIZE
            )));
        }
        if self.payload_type > 0x7F {
            return Err(RtspError::InvalidConfig("payload_type is a 7-bit value".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.recv_timeout, Duration::from_secs(1));
        assert_eq!(config.min_poll_interval, Duration::from_millis(20));
        assert_eq!(config.reorder_depth, 15);
        assert_eq!(config.payload_type, 26);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let config = SessionConfig {
            recv_timeout: Duration::ZERO,
            ..SessionConfig::default()
        };
        assert!(matches!(config.validate(), Err(RtspError::InvalidConfig(_))));
    }

    #[test]
    fn test_rejects_tiny_datagram_limit() {
        let config = SessionConfig {
            max_datagram_size: 4,
            ..SessionConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
