//! Turns raw booking rows into a modelling `Dataset`.
use chrono::{Datelike, Month, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::data_handling::{Dataset, FeatureSpec, Record, Schema};
use crate::error::Result;
use crate::io::bookings::{RawBooking, RawBookings};

/// Columns removed because they are only known after the stay resolves.
pub const LEAKAGE_COLUMNS: [&str; 3] = ["reservation_status", "reservation_status_date", "assigned_room_type"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleaningConfig {
    /// Rows with an average daily rate above this are dropped as outliers.
    pub max_adr: f64,
    pub drop_zero_nights: bool,
    pub drop_zero_guests: bool,
    pub drop_duplicates: bool,
}

impl Default for CleaningConfig {
    fn default() -> Self {
        Self {
            max_adr: 5000.0,
            drop_zero_nights: true,
            drop_zero_guests: true,
            drop_duplicates: true,
        }
    }
}

/// Row counts removed by each cleaning step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub input_rows: usize,
    pub rejected_missing: usize,
    pub invalid_date: usize,
    pub adr_outliers: usize,
    pub zero_nights: usize,
    pub zero_guests: usize,
    pub duplicates: usize,
    pub output_rows: usize,
}

/// Schema of the cleaned dataset, predictors in their canonical order.
pub fn booking_schema() -> Result<Schema> {
    let features = vec![
        FeatureSpec::categorical("hotel"),
        FeatureSpec::numeric("lead_time"),
        FeatureSpec::categorical("arrival_month"),
        FeatureSpec::numeric("arrival_date_week_number"),
        FeatureSpec::categorical("arrival_weekday"),
        FeatureSpec::numeric("stays_in_weekend_nights"),
        FeatureSpec::numeric("stays_in_week_nights"),
        FeatureSpec::numeric("total_nights"),
        FeatureSpec::numeric("adults"),
        FeatureSpec::numeric("children"),
        FeatureSpec::numeric("babies"),
        FeatureSpec::categorical("meal"),
        FeatureSpec::categorical("country"),
        FeatureSpec::categorical("market_segment"),
        FeatureSpec::categorical("distribution_channel"),
        FeatureSpec::boolean("is_repeated_guest"),
        FeatureSpec::numeric("previous_cancellations"),
        FeatureSpec::numeric("previous_bookings_not_canceled"),
        FeatureSpec::categorical("reserved_room_type"),
        FeatureSpec::numeric("booking_changes"),
        FeatureSpec::categorical("deposit_type"),
        FeatureSpec::categorical("agent"),
        FeatureSpec::boolean("has_agent"),
        FeatureSpec::boolean("has_company"),
        FeatureSpec::numeric("days_in_waiting_list"),
        FeatureSpec::categorical("customer_type"),
        FeatureSpec::numeric("adr"),
        FeatureSpec::numeric("required_car_parking_spaces"),
        FeatureSpec::numeric("total_of_special_requests"),
    ];
    Schema::new(features)
}

fn arrival_date(raw: &RawBooking) -> Option<(NaiveDate, Month)> {
    let month: Month = raw.arrival_date_month.parse().ok()?;
    let date = NaiveDate::from_ymd_opt(
        raw.arrival_date_year,
        month.number_from_month(),
        raw.arrival_date_day_of_month,
    )?;
    Some((date, month))
}

fn meal_plan(meal: Option<&str>) -> &str {
    match meal {
        None | Some("Undefined") => "SC",
        Some(m) => m,
    }
}

fn to_record(raw: &RawBooking, date: NaiveDate, month: Month) -> Record {
    let agent = raw.agent.as_deref().unwrap_or("none");
    Record::new(raw.is_canceled)
        .with("hotel", raw.hotel.as_str())
        .with("lead_time", raw.lead_time)
        .with("arrival_month", month.name())
        .with("arrival_date_week_number", raw.arrival_date_week_number)
        .with("arrival_weekday", date.weekday().to_string().as_str())
        .with("stays_in_weekend_nights", raw.stays_in_weekend_nights)
        .with("stays_in_week_nights", raw.stays_in_week_nights)
        .with("total_nights", raw.stays_in_weekend_nights + raw.stays_in_week_nights)
        .with("adults", raw.adults)
        .with("children", raw.children.unwrap_or(0.0))
        .with("babies", raw.babies)
        .with("meal", meal_plan(raw.meal.as_deref()))
        .with("country", raw.country.as_deref().unwrap_or("unknown"))
        .with("market_segment", raw.market_segment.as_str())
        .with("distribution_channel", raw.distribution_channel.as_str())
        .with("is_repeated_guest", raw.is_repeated_guest)
        .with("previous_cancellations", raw.previous_cancellations)
        .with("previous_bookings_not_canceled", raw.previous_bookings_not_canceled)
        .with("reserved_room_type", raw.reserved_room_type.as_str())
        .with("booking_changes", raw.booking_changes)
        .with("deposit_type", raw.deposit_type.as_str())
        .with("agent", agent)
        .with("has_agent", raw.agent.is_some())
        .with("has_company", raw.company.is_some())
        .with("days_in_waiting_list", raw.days_in_waiting_list)
        .with("customer_type", raw.customer_type.as_str())
        .with("adr", raw.adr)
        .with("required_car_parking_spaces", raw.required_car_parking_spaces)
        .with("total_of_special_requests", raw.total_of_special_requests)
}

/// Impute, filter, derive, and deduplicate raw bookings.
///
/// Steps run in a fixed order: invalid arrival dates, ADR outliers, stays
/// with zero nights, bookings with zero guests, then exact duplicates.
pub fn clean_bookings(raw: &RawBookings, cfg: &CleaningConfig) -> Result<(Dataset, CleaningReport)> {
    let mut report = CleaningReport {
        input_rows: raw.rows.len() + raw.rejected_missing,
        rejected_missing: raw.rejected_missing,
        ..Default::default()
    };

    let mut records = Vec::with_capacity(raw.rows.len());
    for row in &raw.rows {
        let Some((date, month)) = arrival_date(row) else {
            report.invalid_date += 1;
            continue;
        };
        if row.adr < 0.0 || row.adr > cfg.max_adr {
            report.adr_outliers += 1;
            continue;
        }
        if cfg.drop_zero_nights && row.stays_in_weekend_nights + row.stays_in_week_nights <= 0.0 {
            report.zero_nights += 1;
            continue;
        }
        let guests = row.adults + row.children.unwrap_or(0.0) + row.babies;
        if cfg.drop_zero_guests && guests <= 0.0 {
            report.zero_guests += 1;
            continue;
        }
        records.push(to_record(row, date, month));
    }

    let mut dataset = Dataset::from_records(booking_schema()?, &records)?;
    if cfg.drop_duplicates {
        let (deduped, removed) = dataset.dedup();
        dataset = deduped;
        report.duplicates = removed;
    }
    report.output_rows = dataset.n_rows();

    log::info!(
        "Cleaning kept {} of {} rows (missing: {}, bad date: {}, adr: {}, zero nights: {}, zero guests: {}, duplicates: {})",
        report.output_rows,
        report.input_rows,
        report.rejected_missing,
        report.invalid_date,
        report.adr_outliers,
        report.zero_nights,
        report.zero_guests,
        report.duplicates
    );
    log::debug!("Dropped leakage columns: {}", LEAKAGE_COLUMNS.join(", "));
    Ok((dataset, report))
}
