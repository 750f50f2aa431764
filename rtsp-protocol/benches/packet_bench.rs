use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use rtsp_protocol::buffer::ReorderBuffer;
use rtsp_protocol::loss::StreamStats;
use rtsp_protocol::message::{Method, Request, Response};
use rtsp_protocol::packet::DataFrame;
use std::io::Cursor;

fn bench_data_frame_parse(c: &mut Criterion) {
    let frame = DataFrame::new(26, true, 1000, 5000, Bytes::from(vec![0u8; 1400]));
    let bytes = frame.to_bytes();

    let mut group = c.benchmark_group("data_frame");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("parse", |b| {
        b.iter(|| {
            let frame = DataFrame::parse_mjpeg(black_box(&bytes)).unwrap();
            black_box(frame);
        });
    });
    group.finish();
}

fn bench_reorder_buffer(c: &mut Criterion) {
    // Pairs of swapped sequence numbers: 1, 0, 3, 2, ...
    let frames: Vec<DataFrame> = (0u16..1024)
        .map(|i| DataFrame::new(26, false, i ^ 1, i as u32, Bytes::new()))
        .collect();

    c.bench_function("reorder_buffer_push_1024", |b| {
        b.iter(|| {
            let mut buffer = ReorderBuffer::default();
            for frame in &frames {
                black_box(buffer.push(frame.clone()));
            }
            black_box(buffer.drain());
        });
    });
}

fn bench_stream_stats(c: &mut Criterion) {
    c.bench_function("stream_stats_record_1024", |b| {
        b.iter(|| {
            let mut stats = StreamStats::new();
            for i in 0u16..1024 {
                stats.record_arrival();
                stats.record_sequence(black_box(i ^ 1));
            }
            black_box(stats.report());
        });
    });
}

fn bench_control_messages(c: &mut Criterion) {
    let request = Request::new(Method::Play, "movie.Mjpeg", 42).with_session("123456");
    c.bench_function("request_encode", |b| {
        b.iter(|| black_box(black_box(&request).encode()));
    });

    let text = b"RTSP/1.0 200 OK\r\nCSeq: 42\r\nSession: 123456\r\n\r\n".to_vec();
    c.bench_function("response_parse", |b| {
        b.iter(|| {
            let response = Response::read_from(&mut Cursor::new(black_box(&text))).unwrap();
            black_box(response);
        });
    });
}

criterion_group!(
    benches,
    bench_data_frame_parse,
    bench_reorder_buffer,
    bench_stream_stats,
    bench_control_messages
);
criterion_main!(benches);
