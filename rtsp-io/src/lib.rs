//! RTSP I/O
//!
//! Transport wrappers for the RTSP client: the TCP control channel, the UDP
//! data socket, and timing utilities.

pub mod control;
pub mod socket;
pub mod time;

pub use control::{ControlChannel, ControlError};
pub use socket::{DataSocket, SocketError};
pub use time::Timer;
