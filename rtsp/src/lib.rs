//! RTSP - streaming media client
//!
//! Drives one RTSP session per [`Session`]: SETUP, PLAY, PAUSE and TEARDOWN
//! over a TCP control connection, with RTP/MJPEG frames received on a UDP
//! data socket, reordered by sequence number and handed to a [`FrameSink`].
//!
//! ```no_run
//! use rtsp::{DataFrame, Session};
//!
//! # fn main() -> Result<(), rtsp::RtspError> {
//! let session = Session::open("127.0.0.1", 554, |frame: DataFrame| {
//!     println!("frame {} ({} bytes)", frame.sequence(), frame.payload().len());
//! })?;
//! session.setup("movie.Mjpeg")?;
//! session.play()?;
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! session.teardown()?;
//! session.close();
//! # Ok(())
//! # }
//! ```

pub use rtsp_io as io;
pub use rtsp_protocol as protocol;

pub mod config;
pub mod error;
mod pipeline;
mod receiver;
pub mod session;

pub use config::SessionConfig;
pub use error::RtspError;
pub use pipeline::{FrameSink, SessionStats};
pub use session::Session;

// Re-export commonly used types
pub use protocol::{ConnectionState, DataFrame, Method, StreamReport};
