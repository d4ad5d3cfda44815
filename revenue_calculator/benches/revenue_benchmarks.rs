use chrono::{DateTime, Duration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use revenue_calculator::calculator::top_bottom_spread;
use revenue_calculator::{
    MarketData, RevenueAssumptions, RevenueCalculator, Sample, SeriesTable, StorageDuration,
    TimeSeries,
};

fn year_start() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2024-01-01T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn synthetic_price(i: i64) -> f64 {
    let hour = (i % 24) as f64;
    60.0 + 40.0 * (hour * std::f64::consts::PI / 12.0).sin() + (i % 7) as f64
}

fn hourly_year() -> TimeSeries {
    let start = year_start();
    TimeSeries::new(
        "price",
        (0..8784).map(|i| Sample {
            timestamp: start + Duration::hours(i),
            value: synthetic_price(i),
        }),
    )
}

fn quarter_hour_year(column: &str) -> SeriesTable {
    let start = year_start();
    let mut table = SeriesTable::new();
    for i in 0..(8784 * 4) {
        let ts = start + Duration::minutes(15 * i);
        table.insert(ts, column, synthetic_price(i / 4) * 1.3);
        table.insert(ts, "down_price", synthetic_price(i / 4) * 0.4);
    }
    table
}

fn benchmark_top_bottom_spread(c: &mut Criterion) {
    let day: Vec<f64> = (0..96).map(synthetic_price).collect();
    c.bench_function("top_bottom_spread_96", |b| {
        b.iter(|| black_box(top_bottom_spread(black_box(&day), 8)));
    });
}

fn benchmark_arbitrage_year(c: &mut Criterion) {
    let series = hourly_year();
    let calculator = RevenueCalculator::new(RevenueAssumptions::default());
    c.bench_function("arbitrage_revenue_year_4h", |b| {
        b.iter(|| black_box(calculator.arbitrage_revenue(&series, 2024, StorageDuration::FourHour)));
    });
}

fn benchmark_full_grid(c: &mut Criterion) {
    let data = MarketData {
        day_ahead: Some(hourly_year()),
        afrr: Some(quarter_hour_year("up_price")),
        imbalance: Some(quarter_hour_year("short")),
        ..Default::default()
    };
    let calculator = RevenueCalculator::new(RevenueAssumptions::default());
    c.bench_function("calculate_all_one_year", |b| {
        b.iter(|| black_box(calculator.calculate_all(&data, &[2024])));
    });
}

criterion_group!(
    benches,
    benchmark_top_bottom_spread,
    benchmark_arbitrage_year,
    benchmark_full_grid
);
criterion_main!(benches);
