use chrono::{DateTime, Duration, Utc};
use revenue_calculator::calculator::top_bottom_spread;
use revenue_calculator::{RevenueAssumptions, RevenueCalculator, Sample, StorageDuration};

fn main() {
    let calculator = RevenueCalculator::new(RevenueAssumptions::default());

    let base_time = DateTime::parse_from_rfc3339("2025-01-15T00:00:00Z")
        .unwrap()
        .with_timezone(&Utc);

    // Night trough, solar dip at noon, evening peak
    let day: Vec<Sample> = (0..24)
        .map(|hour| {
            let price = match hour {
                0..=4 => 45.0,
                11..=14 => 20.0,
                17..=20 => 180.0,
                _ => 90.0,
            };
            Sample {
                timestamp: base_time + Duration::hours(hour),
                value: price,
            }
        })
        .collect();
    let prices: Vec<f64> = day.iter().map(|s| s.value).collect();

    let assumptions = calculator.assumptions();
    println!("Single-day arbitrage, {}", base_time.date_naive());
    println!("==================================");
    println!(
        "Round-trip efficiency {:.0}%, capture rate {:.0}%",
        assumptions.round_trip_efficiency * 100.0,
        assumptions.capture_rate * 100.0
    );
    println!();

    for duration in StorageDuration::ALL {
        let spread = top_bottom_spread(&prices, duration.hours() as usize);
        let revenue = calculator.daily_arbitrage(&day, duration, Duration::hours(1));
        println!(
            "  {:<8} spread {:>7.1} EUR/MWh  revenue {:>7.2} EUR/MW",
            duration.label(),
            spread,
            revenue
        );
    }
}
