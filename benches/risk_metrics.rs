//! Benchmarks for the per-cycle risk computations

use capguard::money::Money;
use capguard::portfolio;
use capguard::position::{Position, PositionKey, Side};
use capguard::sizing;
use capguard::stops::StopLoss;
use chrono::Utc;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;

fn build_portfolio(count: i64) -> HashMap<PositionKey, Position> {
    (0..count)
        .map(|i| {
            let entry = Money::from(Decimal::new(100_00 + i, 2));
            let mut position = Position::open(
                PositionKey::new("binance", format!("AS{i}/USDT")),
                Side::Long,
                entry,
                dec!(2),
                Utc::now(),
                StopLoss::trailing(dec!(5), Side::Long, entry).unwrap(),
            );
            position.set_price(Money::from(Decimal::new(100_00 + i * 7 % 500 - 200, 2)));
            (position.key.clone(), position)
        })
        .collect()
}

fn benchmark_var_95(c: &mut Criterion) {
    let positions = build_portfolio(100);

    c.bench_function("var_95_100_positions", |b| {
        b.iter(|| portfolio::var_95(black_box(&positions)))
    });
}

fn benchmark_kelly_size(c: &mut Criterion) {
    c.bench_function("kelly_size", |b| {
        b.iter(|| {
            sizing::kelly_size(
                black_box(dec!(0.55)),
                black_box(Money::from(dec!(150))),
                black_box(Money::from(dec!(100))),
                black_box(Money::from(dec!(100000))),
                black_box(Money::from(dec!(1000))),
            )
        })
    });
}

criterion_group!(benches, benchmark_var_95, benchmark_kelly_size);
criterion_main!(benches);
