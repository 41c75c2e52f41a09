//! Benchmarks for token stream decoding.

#![allow(clippy::unwrap_used, missing_docs)]

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use tds_testing::tokens::{Column, TokenBuilder, values};
use tds_wire::{ConversationState, DecodeOptions, TdsVersion, decode_tokens};

fn options() -> DecodeOptions {
    DecodeOptions {
        version_hint: Some(TdsVersion::V7_4),
        ..DecodeOptions::default()
    }
}

/// Benchmark a lone DONE token.
fn bench_done(c: &mut Criterion) {
    let pdu = TokenBuilder::wide().done(0x0010, 0xC1, 1).build();
    let options = options();

    c.bench_function("decode_done", |b| {
        b.iter(|| {
            let mut state = ConversationState::with_options(&options);
            black_box(decode_tokens(black_box(&pdu), &mut state, &options))
        })
    });
}

/// Benchmark result sets of increasing size.
fn bench_result_set(c: &mut Criterion) {
    let options = options();
    let mut group = c.benchmark_group("decode_result_set");

    for rows in [1usize, 100, 1000] {
        let mut builder = TokenBuilder::wide().col_metadata(&[
            Column::int("id"),
            Column::int_n("score", 8),
            Column::nvarchar("name", Some(50)),
        ]);
        for i in 0..rows {
            builder = builder.row(&[
                values::int(i as i32),
                values::int_n(Some(i as i64 * 3), 8),
                values::nvarchar(Some("benchmark row")),
            ]);
        }
        let pdu = builder.done(0x0010, 0xC1, rows as u64).build();

        group.throughput(Throughput::Bytes(pdu.len() as u64));
        group.bench_function(format!("{rows}_rows"), |b| {
            b.iter(|| {
                let mut state = ConversationState::with_options(&options);
                black_box(decode_tokens(black_box(&pdu), &mut state, &options))
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_done, bench_result_set);
criterion_main!(benches);
