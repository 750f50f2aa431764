//! Statistics display and formatting

use rtsp::{SessionStats, StreamReport};
use std::io::Write;
use std::time::Duration;

/// Format bytes in human-readable form
pub fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Format duration in human-readable form
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}h {:02}m {:02}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {:02}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

/// Render a lost-sequence list, collapsing consecutive runs ("3-7, 12")
pub fn format_sequence_ranges(sequences: &[u16]) -> String {
    let mut parts = Vec::new();
    let mut iter = sequences.iter().copied().peekable();

    while let Some(start) = iter.next() {
        let mut end = start;
        while iter.peek() == Some(&end.wrapping_add(1)) && end != u16::MAX {
            end += 1;
            iter.next();
        }
        if start == end {
            parts.push(start.to_string());
        } else {
            parts.push(format!("{}-{}", start, end));
        }
    }

    if parts.is_empty() {
        "none".to_string()
    } else {
        parts.join(", ")
    }
}

/// Multi-line end-of-stream summary
pub fn format_report(report: &StreamReport, bytes_written: u64) -> String {
    let mut out = String::new();
    out.push_str("┌──────────────────────────────────────────┐\n");
    out.push_str("│ STREAM REPORT                            │\n");
    out.push_str("├──────────────────────────────────────────┤\n");
    out.push_str(&format!("│ Average FPS:   {}\n", report.average_rate));
    out.push_str(&format!("│ Lost packets:  {}\n", report.lost));
    out.push_str(&format!("│ Out-of-order:  {}\n", report.out_of_order));
    out.push_str(&format!(
        "│ Lost seqs:     {}\n",
        format_sequence_ranges(&report.lost_sequences)
    ));
    out.push_str(&format!("│ Written:       {}\n", format_bytes(bytes_written)));
    out.push_str("└──────────────────────────────────────────┘");
    out
}

/// One-line progress summary (for continuous updates)
pub fn format_compact_stats(stats: &SessionStats, bytes_written: u64, elapsed: Duration) -> String {
    format!(
        "[{:8}] Frames: {} | Buffered: {} | Lost: {} | OOO: {} | FPS: {} | Written: {}",
        format_duration(elapsed),
        stats.frames_delivered,
        stats.buffered,
        stats.lost,
        stats.out_of_order,
        stats.average_rate,
        format_bytes(bytes_written)
    )
}

/// Overwrite the current stderr line with compact stats
pub fn display_compact_stats(stats: &SessionStats, bytes_written: u64, elapsed: Duration) {
    let mut stderr = std::io::stderr();
    let _ = write!(
        stderr,
        "\r{}         ",
        format_compact_stats(stats, bytes_written, elapsed)
    );
    let _ = stderr.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(2048), "2.00 KB");
        assert_eq!(format_bytes(2 * 1024 * 1024), "2.00 MB");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
        assert_eq!(format_duration(Duration::from_secs(3661)), "1h 01m 01s");
    }

    #[test]
    fn test_sequence_ranges() {
        assert_eq!(format_sequence_ranges(&[]), "none");
        assert_eq!(format_sequence_ranges(&[4]), "4");
        assert_eq!(format_sequence_ranges(&[3, 4, 5, 7, 9, 10]), "3-5, 7, 9-10");
        assert_eq!(format_sequence_ranges(&[65534, 65535]), "65534-65535");
    }

    #[test]
    fn test_format_report() {
        let report = StreamReport {
            average_rate: 25,
            lost: 2,
            out_of_order: 1,
            lost_sequences: vec![10, 11],
        };
        let text = format_report(&report, 4096);

        assert!(text.contains("Average FPS:   25"));
        assert!(text.contains("Lost seqs:     10-11"));
        assert!(text.contains("4.00 KB"));
    }

    #[test]
    fn test_compact_stats() {
        let stats = SessionStats {
            frames_delivered: 120,
            average_rate: 24,
            ..SessionStats::default()
        };
        let line = format_compact_stats(&stats, 0, Duration::from_secs(5));
        assert!(line.contains("Frames: 120"));
        assert!(line.contains("FPS: 24"));
    }
}
