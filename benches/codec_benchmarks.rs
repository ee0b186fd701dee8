//! Performance benchmarks for the telephony codec and Twilio message parsing
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use vox_gateway::core::audio::{decode_mulaw_to_pcm16, encode_pcm16_to_mulaw, mulaw_to_wav};
use vox_gateway::core::telephony::TwilioInbound;

/// One Twilio media frame is 20 ms of 8 kHz audio.
const FRAME_BYTES: usize = 160;

fn bench_mulaw_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("mulaw_decode");
    group.measurement_time(Duration::from_secs(5));

    for frames in [1usize, 50, 500] {
        let input: Vec<u8> = (0..FRAME_BYTES * frames).map(|i| (i % 256) as u8).collect();
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(frames), &input, |b, input| {
            b.iter(|| decode_mulaw_to_pcm16(black_box(input)));
        });
    }

    group.finish();
}

fn bench_mulaw_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("mulaw_encode");

    let samples: Vec<i16> = (0..FRAME_BYTES * 50)
        .map(|i| ((i as f32 * 0.05).sin() * 12_000.0) as i16)
        .collect();
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("one_second", |b| {
        b.iter(|| encode_pcm16_to_mulaw(black_box(&samples)));
    });

    group.finish();
}

fn bench_wav_framing(c: &mut Criterion) {
    let audio = vec![0x7Fu8; FRAME_BYTES * 500];
    c.bench_function("mulaw_to_wav_10s", |b| {
        b.iter(|| mulaw_to_wav(black_box(&audio)));
    });
}

fn bench_twilio_parsing(c: &mut Criterion) {
    let payload = "/".repeat(FRAME_BYTES * 4 / 3);
    let media = format!(
        r#"{{"event":"media","sequenceNumber":"42","media":{{"track":"inbound","chunk":"41","timestamp":"820","payload":"{payload}"}},"streamSid":"MZ00000000000000000000000000000000"}}"#
    );

    let mut group = c.benchmark_group("twilio_parsing");
    group.throughput(Throughput::Bytes(media.len() as u64));
    group.bench_function("media_frame", |b| {
        b.iter(|| TwilioInbound::parse(black_box(&media)));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_mulaw_decode,
    bench_mulaw_encode,
    bench_wav_framing,
    bench_twilio_parsing
);
criterion_main!(benches);
