use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;

use lobx_aggregator::market_data::adapters::LevelUpdate;
use lobx_aggregator::market_data::normaliser::quantize;
use lobx_aggregator::market_data::unified_book::ConsolidatedBook;
use lobx_aggregator::market_data::venue_book::{PriceLevel, VenueBook, VenueBookSnapshot};

// Four venues with overlapping 50-level books around 64000.
fn snapshots() -> Vec<VenueBookSnapshot> {
    ["binance", "okx", "bitget", "bybit"]
        .iter()
        .enumerate()
        .map(|(v, &venue)| {
            let mut book = VenueBook::new(venue, Decimal::new(1, 1));
            let offset = v as i64;
            book.apply_snapshot(&LevelUpdate::on_grid(
                (0..50).map(|i| PriceLevel::new(Decimal::new(640_000 - i - offset, 1), Decimal::ONE)).collect(),
                (0..50).map(|i| PriceLevel::new(Decimal::new(640_001 + i + offset, 1), Decimal::ONE)).collect(),
            ));
            book.snapshot()
        })
        .collect()
}

fn bench_merge(c: &mut Criterion) {
    let snaps = snapshots();
    c.bench_function("merge_4x50", |b| {
        b.iter(|| ConsolidatedBook::merge(black_box(&snaps)).to_update(100, 0))
    });
}

fn bench_quantize(c: &mut Criterion) {
    let tick = Decimal::new(1, 1);
    let price = Decimal::new(6_400_037, 2);
    c.bench_function("quantize_ask", |b| b.iter(|| quantize(black_box(price), tick, false)));
}

criterion_group!(benches, bench_merge, bench_quantize);
criterion_main!(benches);
