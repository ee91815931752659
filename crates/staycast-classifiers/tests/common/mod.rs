#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use staycast_classifiers::data_handling::{Dataset, FeatureSpec, Record, Schema};

pub fn booking_like_schema() -> Schema {
    Schema::new(vec![
        FeatureSpec::numeric("lead_time"),
        FeatureSpec::numeric("adr"),
        FeatureSpec::numeric("previous_cancellations"),
        FeatureSpec::categorical("hotel"),
        FeatureSpec::categorical("deposit_type"),
        FeatureSpec::boolean("is_repeated_guest"),
    ])
    .expect("valid schema")
}

/// Synthetic bookings where long lead times and non-refundable deposits
/// raise the cancellation odds.
pub fn synthetic_bookings(n: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let records: Vec<Record> = (0..n)
        .map(|_| {
            let lead_time: f64 = rng.gen_range(0.0..365.0);
            let adr: f64 = rng.gen_range(40.0..250.0);
            let prev: f64 = if rng.gen_bool(0.1) { rng.gen_range(1..4) as f64 } else { 0.0 };
            let hotel = if rng.gen_bool(0.6) { "City Hotel" } else { "Resort Hotel" };
            let deposit = match rng.gen_range(0..10) {
                0..=6 => "No Deposit",
                7..=8 => "Non Refund",
                _ => "Refundable",
            };
            let repeat = rng.gen_bool(0.05);
            let logit = -2.0 + lead_time / 90.0 + if deposit == "Non Refund" { 2.5 } else { 0.0 } + prev
                - if repeat { 1.0 } else { 0.0 };
            let p = 1.0 / (1.0 + (-logit).exp());
            Record::new(rng.gen_bool(p))
                .with("lead_time", lead_time.round())
                .with("adr", (adr * 100.0).round() / 100.0)
                .with("previous_cancellations", prev)
                .with("hotel", hotel)
                .with("deposit_type", deposit)
                .with("is_repeated_guest", repeat)
        })
        .collect();
    Dataset::from_records(booking_like_schema(), &records).expect("valid records")
}

/// Two features; label is `x1 > 0.5`.
pub fn separable(n: usize) -> Dataset {
    let schema = Schema::new(vec![FeatureSpec::numeric("x1"), FeatureSpec::numeric("x2")]).expect("valid schema");
    let records: Vec<Record> = (0..n)
        .map(|i| {
            let x1 = (i as f64 + 0.5) / n as f64;
            let x2 = ((i * 7) % n) as f64 / n as f64;
            Record::new(x1 > 0.5).with("x1", x1).with("x2", x2)
        })
        .collect();
    Dataset::from_records(schema, &records).expect("valid records")
}
