//! Criterion benchmarks for the per-keystroke hot path.
//!
//! Every key-down intercepted by the global hook runs one translation and one
//! line-buffer feed *inside the OS input delivery path*, so both must stay in
//! the nanosecond range.
//!
//! Run with:
//! ```bash
//! cargo bench --package hidkey-core --bench line_buffer_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hidkey_core::keymap::windows_vk::{VK_DECIMAL, VK_RETURN};
use hidkey_core::{KeyTranslator, KeyboardState, LineBuffer, UsLayoutTranslator};

/// VK codes an instrument types for the reading `123.45` followed by Enter.
const READING_VKS: &[u8] = &[0x31, 0x32, 0x33, VK_DECIMAL, 0x34, 0x35, VK_RETURN];

fn bench_line_buffer_feed(c: &mut Criterion) {
    let mut group = c.benchmark_group("line_buffer");

    group.bench_function("feed_single_char", |b| {
        let mut buffer = LineBuffer::new();
        b.iter(|| {
            let out = buffer.feed(black_box('7'));
            buffer.reset();
            out
        })
    });

    for readings in [1usize, 10, 100] {
        let stream: String = "123.45\r\n".repeat(readings);
        group.bench_with_input(
            BenchmarkId::new("feed_readings", readings),
            &stream,
            |b, stream| {
                b.iter(|| {
                    let mut buffer = LineBuffer::new();
                    stream
                        .chars()
                        .filter_map(|ch| buffer.feed(black_box(ch)))
                        .count()
                })
            },
        );
    }

    group.finish();
}

fn bench_translate_and_feed(c: &mut Criterion) {
    let mut group = c.benchmark_group("keystroke_pipeline");
    let translator = UsLayoutTranslator::new();
    let state = KeyboardState::empty();

    group.bench_function("translate_single", |b| {
        b.iter(|| translator.translate(black_box(0x41), 0, &state))
    });

    group.bench_function("translate_and_feed_reading", |b| {
        b.iter(|| {
            let mut buffer = LineBuffer::new();
            READING_VKS
                .iter()
                .filter_map(|&vk| translator.translate(black_box(vk as u32), 0, &state))
                .filter_map(|ch| buffer.feed(ch))
                .count()
        })
    });

    group.finish();
}

criterion_group!(benches, bench_line_buffer_feed, bench_translate_and_feed);
criterion_main!(benches);
