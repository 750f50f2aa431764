//! Loss, reordering and frame-rate accounting for one stream
//!
//! Loss detection follows a simple expectation model: after sequence `s`
//! the next packet should be `s + 1`. A packet that arrives with a different
//! number marks the expected one as lost, unless it was already seen; a
//! packet that was previously marked lost is counted as out of order instead.
//!
//! Sequence numbers are compared by equality only. The expectation wraps from
//! 65535 to 0, but no ordering across the wrap point is attempted.

use std::collections::BTreeSet;
use std::fmt;

/// Per-stream statistics state
#[derive(Debug, Clone, Default)]
pub struct StreamStats {
    expected_seq: u16,
    seen: BTreeSet<u16>,
    lost: BTreeSet<u16>,
    out_of_order: u64,
    frames_parsed: u64,
    datagrams_received: u64,
    arrivals_this_interval: u32,
    per_interval_counts: Vec<u32>,
}

/// Summary produced when a stream ends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    /// Mean of the per-interval arrival counts, truncated
    pub average_rate: u32,
    /// Sequence numbers still believed lost
    pub lost: usize,
    /// Packets that arrived after being marked lost
    pub out_of_order: u64,
    pub lost_sequences: Vec<u16>,
}

impl fmt::Display for StreamReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Average FPS: {}, Lost packets: {}, Out-of-order packets: {}",
            self.average_rate, self.lost, self.out_of_order
        )
    }
}

impl StreamStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one datagram toward the current rate interval
    pub fn record_arrival(&mut self) {
        self.datagrams_received += 1;
        self.arrivals_this_interval = self.arrivals_this_interval.saturating_add(1);
    }

    /// Account for a parsed frame's sequence number
    pub fn record_sequence(&mut self, seq: u16) {
        self.frames_parsed += 1;

        if seq != self.expected_seq {
            if self.lost.remove(&seq) {
                self.out_of_order += 1;
            } else if !self.seen.contains(&self.expected_seq) {
                self.lost.insert(self.expected_seq);
            }
        }

        self.seen.insert(seq);
        self.expected_seq = seq.wrapping_add(1);
    }

    /// Close the current rate interval and start a new one
    pub fn sample_rate(&mut self) {
        self.per_interval_counts.push(self.arrivals_this_interval);
        self.arrivals_this_interval = 0;
    }

    /// Truncated mean of the sampled rates; zero when nothing was sampled
    pub fn average_rate(&self) -> u32 {
        if self.per_interval_counts.is_empty() {
            return 0;
        }
        let total: u64 = self.per_interval_counts.iter().map(|&c| c as u64).sum();
        (total / self.per_interval_counts.len() as u64) as u32
    }

    pub fn report(&self) -> StreamReport {
        StreamReport {
            average_rate: self.average_rate(),
            lost: self.lost.len(),
            out_of_order: self.out_of_order,
            lost_sequences: self.lost.iter().copied().collect(),
        }
    }

    /// Forget everything, as for a fresh session
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn expected_seq(&self) -> u16 {
        self.expected_seq
    }

    pub fn seen(&self) -> &BTreeSet<u16> {
        &self.seen
    }

    pub fn lost(&self) -> &BTreeSet<u16> {
        &self.lost
    }

    pub fn out_of_order(&self) -> u64 {
        self.out_of_order
    }

    pub fn frames_parsed(&self) -> u64 {
        self.frames_parsed
    }

    pub fn datagrams_received(&self) -> u64 {
        self.datagrams_received
    }

    pub fn per_interval_counts(&self) -> &[u32] {
        &self.per_interval_counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(stats: &mut StreamStats, seqs: &[u16]) {
        for &seq in seqs {
            stats.record_arrival();
            stats.record_sequence(seq);
        }
    }

    #[test]
    fn test_in_order_has_no_anomalies() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, 1, 2, 3]);

        assert!(stats.lost().is_empty());
        assert_eq!(stats.out_of_order(), 0);
        assert_eq!(stats.expected_seq(), 4);
    }

    #[test]
    fn test_swap_counts_out_of_order() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, 1, 3, 2, 4]);

        assert!(stats.lost().is_empty());
        assert_eq!(stats.out_of_order(), 1);
        assert_eq!(
            stats.seen().iter().copied().collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4]
        );
    }

    #[test]
    fn test_gap_marks_loss() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, 1, 4, 5]);

        // Only the first missing number is flagged by the expectation model.
        assert_eq!(stats.lost().iter().copied().collect::<Vec<_>>(), vec![2]);
        assert_eq!(stats.report().lost, 1);
    }

    #[test]
    fn test_late_duplicate_rewinds_expectation() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, 1, 2, 1]);

        // The duplicate 1 arrives while 3 is expected.
        assert_eq!(stats.lost().iter().copied().collect::<Vec<_>>(), vec![3]);
        assert_eq!(stats.expected_seq(), 2);

        feed(&mut stats, &[3]);
        assert!(stats.lost().is_empty());
        assert_eq!(stats.out_of_order(), 1);
    }

    #[test]
    fn test_first_packet_not_zero_marks_zero_lost() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[10, 11]);
        assert!(stats.lost().contains(&0));
    }

    #[test]
    fn test_expectation_wraps() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, u16::MAX]);
        assert_eq!(stats.expected_seq(), 0);
    }

    #[test]
    fn test_rate_average_truncates() {
        let mut stats = StreamStats::new();
        for count in [3, 4, 5] {
            for _ in 0..count {
                stats.record_arrival();
            }
            stats.sample_rate();
        }

        assert_eq!(stats.per_interval_counts(), &[3, 4, 5]);
        assert_eq!(stats.average_rate(), 4);

        stats.record_arrival();
        stats.sample_rate();
        // 13 / 4
        assert_eq!(stats.average_rate(), 3);
    }

    #[test]
    fn test_average_without_samples() {
        assert_eq!(StreamStats::new().average_rate(), 0);
    }

    #[test]
    fn test_reset() {
        let mut stats = StreamStats::new();
        feed(&mut stats, &[0, 2, 1]);
        stats.sample_rate();
        stats.reset();

        assert_eq!(stats.expected_seq(), 0);
        assert!(stats.seen().is_empty());
        assert!(stats.lost().is_empty());
        assert_eq!(stats.out_of_order(), 0);
        assert!(stats.per_interval_counts().is_empty());
        assert_eq!(stats.datagrams_received(), 0);
    }

    #[test]
    fn test_report_display() {
        let report = StreamReport {
            average_rate: 25,
            lost: 2,
            out_of_order: 1,
            lost_sequences: vec![4, 9],
        };
        assert_eq!(
            report.to_string(),
            "Average FPS: 25, Lost packets: 2, Out-of-order packets: 1"
        );
    }
}
