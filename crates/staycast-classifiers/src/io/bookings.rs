//! Reader for the raw hotel-bookings export.
//!
//! Cells reading `NA`, `NULL`, or empty are treated as missing. Optional
//! columns keep missing values as `None` for the cleaning stage to impute;
//! a missing value in any other column rejects the row.
use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use csv::StringRecord;

use crate::error::StaycastError;

/// Columns the reader requires in the header.
pub const REQUIRED_COLUMNS: [&str; 32] = [
    "hotel",
    "is_canceled",
    "lead_time",
    "arrival_date_year",
    "arrival_date_month",
    "arrival_date_week_number",
    "arrival_date_day_of_month",
    "stays_in_weekend_nights",
    "stays_in_week_nights",
    "adults",
    "children",
    "babies",
    "meal",
    "country",
    "market_segment",
    "distribution_channel",
    "is_repeated_guest",
    "previous_cancellations",
    "previous_bookings_not_canceled",
    "reserved_room_type",
    "assigned_room_type",
    "booking_changes",
    "deposit_type",
    "agent",
    "company",
    "days_in_waiting_list",
    "customer_type",
    "adr",
    "required_car_parking_spaces",
    "total_of_special_requests",
    "reservation_status",
    "reservation_status_date",
];

/// One parsed row of the raw export.
#[derive(Debug, Clone, PartialEq)]
pub struct RawBooking {
    pub hotel: String,
    pub is_canceled: bool,
    pub lead_time: f64,
    pub arrival_date_year: i32,
    pub arrival_date_month: String,
    pub arrival_date_week_number: f64,
    pub arrival_date_day_of_month: u32,
    pub stays_in_weekend_nights: f64,
    pub stays_in_week_nights: f64,
    pub adults: f64,
    pub children: Option<f64>,
    pub babies: f64,
    pub meal: Option<String>,
    pub country: Option<String>,
    pub market_segment: String,
    pub distribution_channel: String,
    pub is_repeated_guest: bool,
    pub previous_cancellations: f64,
    pub previous_bookings_not_canceled: f64,
    pub reserved_room_type: String,
    pub assigned_room_type: String,
    pub booking_changes: f64,
    pub deposit_type: String,
    pub agent: Option<String>,
    pub company: Option<String>,
    pub days_in_waiting_list: f64,
    pub customer_type: String,
    pub adr: f64,
    pub required_car_parking_spaces: f64,
    pub total_of_special_requests: f64,
    pub reservation_status: Option<String>,
    pub reservation_status_date: Option<String>,
}

/// Rows that parsed plus the count rejected for missing required values.
#[derive(Debug, Clone, Default)]
pub struct RawBookings {
    pub rows: Vec<RawBooking>,
    pub rejected_missing: usize,
}

fn is_missing(cell: &str) -> bool {
    let c = cell.trim();
    c.is_empty() || c.eq_ignore_ascii_case("na") || c.eq_ignore_ascii_case("null")
}

struct RowReader<'a> {
    columns: &'a HashMap<String, usize>,
    record: &'a StringRecord,
    row: usize,
}

/// A parsed cell, or the name of the column whose cell was missing.
enum Field<T> {
    Value(T),
    Missing(&'static str),
}

impl<'a> RowReader<'a> {
    fn raw(&self, name: &'static str) -> Option<&'a str> {
        self.columns
            .get(name)
            .and_then(|&i| self.record.get(i))
            .filter(|c| !is_missing(c))
            .map(str::trim)
    }

    fn text(&self, name: &'static str) -> Field<String> {
        match self.raw(name) {
            Some(v) => Field::Value(v.to_string()),
            None => Field::Missing(name),
        }
    }

    fn parse<T>(&self, name: &'static str) -> Result<Field<T>>
    where
        T: std::str::FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.raw(name) {
            Some(v) => {
                let parsed = v
                    .parse::<T>()
                    .with_context(|| format!("Invalid value '{}' for '{}' at row {}", v, name, self.row))?;
                Ok(Field::Value(parsed))
            }
            None => Ok(Field::Missing(name)),
        }
    }

    fn flag(&self, name: &'static str) -> Result<Field<bool>> {
        Ok(match self.parse::<i64>(name)? {
            Field::Value(v) => Field::Value(v != 0),
            Field::Missing(n) => Field::Missing(n),
        })
    }
}

macro_rules! required {
    ($field:expr) => {
        match $field {
            Field::Value(v) => v,
            Field::Missing(name) => {
                log::trace!("Rejecting row: missing '{}'", name);
                return Ok(None);
            }
        }
    };
}

fn optional<T>(field: Field<T>) -> Option<T> {
    match field {
        Field::Value(v) => Some(v),
        Field::Missing(_) => None,
    }
}

fn parse_row(r: &RowReader) -> Result<Option<RawBooking>> {
    Ok(Some(RawBooking {
        hotel: required!(r.text("hotel")),
        is_canceled: required!(r.flag("is_canceled")?),
        lead_time: required!(r.parse("lead_time")?),
        arrival_date_year: required!(r.parse("arrival_date_year")?),
        arrival_date_month: required!(r.text("arrival_date_month")),
        arrival_date_week_number: required!(r.parse("arrival_date_week_number")?),
        arrival_date_day_of_month: required!(r.parse("arrival_date_day_of_month")?),
        stays_in_weekend_nights: required!(r.parse("stays_in_weekend_nights")?),
        stays_in_week_nights: required!(r.parse("stays_in_week_nights")?),
        adults: required!(r.parse("adults")?),
        children: optional(r.parse("children")?),
        babies: required!(r.parse("babies")?),
        meal: optional(r.text("meal")),
        country: optional(r.text("country")),
        market_segment: required!(r.text("market_segment")),
        distribution_channel: required!(r.text("distribution_channel")),
        is_repeated_guest: required!(r.flag("is_repeated_guest")?),
        previous_cancellations: required!(r.parse("previous_cancellations")?),
        previous_bookings_not_canceled: required!(r.parse("previous_bookings_not_canceled")?),
        reserved_room_type: required!(r.text("reserved_room_type")),
        assigned_room_type: required!(r.text("assigned_room_type")),
        booking_changes: required!(r.parse("booking_changes")?),
        deposit_type: required!(r.text("deposit_type")),
        agent: optional(r.text("agent")),
        company: optional(r.text("company")),
        days_in_waiting_list: required!(r.parse("days_in_waiting_list")?),
        customer_type: required!(r.text("customer_type")),
        adr: required!(r.parse("adr")?),
        required_car_parking_spaces: required!(r.parse("required_car_parking_spaces")?),
        total_of_special_requests: required!(r.parse("total_of_special_requests")?),
        reservation_status: optional(r.text("reservation_status")),
        reservation_status_date: optional(r.text("reservation_status_date")),
    }))
}

/// Read the raw bookings CSV.
///
/// A header missing any of `REQUIRED_COLUMNS` fails with a `Schema` error.
pub fn read_raw_bookings<P: AsRef<Path>>(path: P) -> Result<RawBookings> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_path(&path)
        .with_context(|| format!("Failed to open bookings file: {}", path.as_ref().display()))?;

    let headers = reader.headers().context("Failed to read bookings header row")?.clone();
    let columns: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().to_string(), i))
        .collect();
    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|c| !columns.contains_key(*c))
        .collect();
    if !missing.is_empty() {
        return Err(anyhow!(StaycastError::schema(format!(
            "bookings file is missing required columns: {}",
            missing.join(", ")
        ))));
    }

    let mut out = RawBookings::default();
    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;
        let reader = RowReader { columns: &columns, record: &record, row: row_idx + 1 };
        match parse_row(&reader)? {
            Some(row) => out.rows.push(row),
            None => out.rejected_missing += 1,
        }
    }
    log::info!(
        "Read {} bookings from {} ({} rejected for missing values)",
        out.rows.len(),
        path.as_ref().display(),
        out.rejected_missing
    );
    if out.rows.is_empty() {
        log::warn!("No usable rows in {}", path.as_ref().display());
    }
    Ok(out)
}
