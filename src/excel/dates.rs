//! Excel serial date conversion (1900 date system)

use chrono::{Duration, NaiveDate, NaiveDateTime};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Day zero of the 1900 date system, accounting for the phantom 1900-02-29
fn epoch() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(1899, 12, 30)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .unwrap_or_default()
}

/// Convert an Excel serial number (days since the epoch, fraction = time of day)
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    epoch().checked_add_signed(Duration::milliseconds(millis))
}

/// Convert a date-time to an Excel serial number
pub fn to_excel_serial(datetime: &NaiveDateTime) -> f64 {
    let delta = *datetime - epoch();
    delta.num_milliseconds() as f64 / MILLIS_PER_DAY
}

/// Parse an ISO 8601 date or date-time as written by calamine for `DateTimeIso` cells
pub fn parse_iso_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
