//! RTSP Protocol Core
//!
//! Pure protocol pieces for an RTSP/RTP client: control message encoding and
//! parsing, RTP data packet parsing, the reorder buffer, loss and rate
//! statistics, and the session state model. Nothing here performs I/O.

pub mod buffer;
pub mod loss;
pub mod message;
pub mod packet;
pub mod state;

pub use buffer::{ReorderBuffer, DEFAULT_LOW_WATERMARK};
pub use loss::{StreamReport, StreamStats};
pub use message::{Method, ProtocolError, Request, Response, MAX_BODY_SIZE, RTSP_VERSION, STATUS_OK};
pub use packet::{DataFrame, PacketError, HEADER_SIZE, MJPEG_PAYLOAD_TYPE};
pub use state::ConnectionState;
