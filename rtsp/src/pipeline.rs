//! Per-session data pipeline
//!
//! Datagram → parse → loss accounting → reorder buffer → consumer. One
//! pipeline belongs to exactly one session and is reset at TEARDOWN.

use rtsp_protocol::{DataFrame, ReorderBuffer, StreamReport, StreamStats};
use tracing::{info, trace, warn};

/// Consumer of delivered frames
///
/// Called from the receive loop thread, in ascending sequence order within
/// the reorder window. From inside these callbacks only `Session::stats` and
/// `Session::last_report` may be called on the owning session; every other
/// method takes the connection lock, which PAUSE, TEARDOWN and close hold
/// while waiting for this thread to exit.
pub trait FrameSink: Send {
    fn on_frame(&mut self, frame: DataFrame);

    /// Called once when the stream goes idle, after the buffer is drained
    fn on_stream_end(&mut self, _report: &StreamReport) {}
}

impl<F> FrameSink for F
where
    F: FnMut(DataFrame) + Send,
{
    fn on_frame(&mut self, frame: DataFrame) {
        self(frame)
    }
}

/// Point-in-time view of a session's statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub datagrams_received: u64,
    pub frames_parsed: u64,
    pub frames_delivered: u64,
    pub buffered: usize,
    pub lost: usize,
    pub out_of_order: u64,
    pub average_rate: u32,
    pub rate_samples: usize,
}

pub(crate) struct Pipeline {
    buffer: ReorderBuffer,
    stats: StreamStats,
    payload_type: u8,
    frames_delivered: u64,
    last_report: Option<StreamReport>,
}

impl Pipeline {
    pub(crate) fn new(reorder_depth: usize, payload_type: u8) -> Self {
        Pipeline {
            buffer: ReorderBuffer::new(reorder_depth),
            stats: StreamStats::new(),
            payload_type,
            frames_delivered: 0,
            last_report: None,
        }
    }

    /// Process one datagram; returns the frame released for delivery, if any
    pub(crate) fn on_datagram(&mut self, datagram: &[u8]) -> Option<DataFrame> {
        self.stats.record_arrival();

        let frame = match DataFrame::parse(datagram, self.payload_type) {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                trace!(len = datagram.len(), "ignoring datagram with other payload type");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "dropping unparseable datagram");
                return None;
            }
        };

        trace!(
            seq = frame.sequence(),
            expected = self.stats.expected_seq(),
            marker = frame.marker(),
            size = frame.size(),
            "frame received"
        );
        self.stats.record_sequence(frame.sequence());

        let released = self.buffer.push(frame);
        if released.is_some() {
            self.frames_delivered += 1;
        }
        released
    }

    /// Drain everything buffered and produce the end-of-stream report
    pub(crate) fn finish(&mut self) -> (Vec<DataFrame>, StreamReport) {
        let frames = self.buffer.drain();
        self.frames_delivered += frames.len() as u64;

        let report = self.stats.report();
        info!(
            average_fps = report.average_rate,
            lost = report.lost,
            out_of_order = report.out_of_order,
            lost_sequences = ?report.lost_sequences,
            drained = frames.len(),
            "stream ended"
        );
        self.last_report = Some(report.clone());
        (frames, report)
    }

    pub(crate) fn sample_rate(&mut self) {
        self.stats.sample_rate();
    }

    pub(crate) fn reset(&mut self) {
        self.buffer.clear();
        self.stats.reset();
        self.frames_delivered = 0;
        self.last_report = None;
    }

    pub(crate) fn last_report(&self) -> Option<&StreamReport> {
        self.last_report.as_ref()
    }

    pub(crate) fn snapshot(&self) -> SessionStats {
        SessionStats {
            datagrams_received: self.stats.datagrams_received(),
            frames_parsed: self.stats.frames_parsed(),
            frames_delivered: self.frames_delivered,
            buffered: self.buffer.len(),
            lost: self.stats.lost().len(),
            out_of_order: self.stats.out_of_order(),
            average_rate: self.stats.average_rate(),
            rate_samples: self.stats.per_interval_counts().len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn datagram(seq: u16, payload_type: u8) -> Vec<u8> {
        DataFrame::new(payload_type, false, seq, 0, Bytes::from_static(b"jpeg"))
            .to_bytes()
            .to_vec()
    }

    #[test]
    fn test_releases_after_watermark() {
        let mut pipeline = Pipeline::new(3, 26);
        assert!(pipeline.on_datagram(&datagram(1, 26)).is_none());
        assert!(pipeline.on_datagram(&datagram(0, 26)).is_none());

        let released = pipeline.on_datagram(&datagram(2, 26)).unwrap();
        assert_eq!(released.sequence(), 0);

        let stats = pipeline.snapshot();
        assert_eq!(stats.frames_parsed, 3);
        assert_eq!(stats.frames_delivered, 1);
        assert_eq!(stats.buffered, 2);
    }

    #[test]
    fn test_foreign_and_short_datagrams_count_as_arrivals_only() {
        let mut pipeline = Pipeline::new(15, 26);
        assert!(pipeline.on_datagram(&datagram(0, 96)).is_none());
        assert!(pipeline.on_datagram(&[0x80, 26]).is_none());

        let stats = pipeline.snapshot();
        assert_eq!(stats.datagrams_received, 2);
        assert_eq!(stats.frames_parsed, 0);
        assert_eq!(stats.buffered, 0);
    }

    #[test]
    fn test_finish_drains_in_order() {
        let mut pipeline = Pipeline::new(15, 26);
        for seq in [4, 0, 3, 1] {
            pipeline.on_datagram(&datagram(seq, 26));
        }

        let (frames, report) = pipeline.finish();
        let order: Vec<u16> = frames.iter().map(|f| f.sequence()).collect();
        assert_eq!(order, vec![0, 1, 3, 4]);
        // 0 and 1 were each flagged lost, then arrived late.
        assert_eq!(report.lost, 0);
        assert_eq!(report.out_of_order, 2);
        assert_eq!(pipeline.last_report(), Some(&report));
    }

    #[test]
    fn test_reset() {
        let mut pipeline = Pipeline::new(15, 26);
        pipeline.on_datagram(&datagram(5, 26));
        pipeline.sample_rate();
        pipeline.finish();

        pipeline.reset();
        assert_eq!(pipeline.snapshot(), SessionStats::default());
        assert!(pipeline.last_report().is_none());
    }
}
