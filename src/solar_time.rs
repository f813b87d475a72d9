//! True solar time correction and the mapping onto traditional time slots.

use chrono::{Datelike, Duration as ChronoDuration, NaiveDateTime, Timelike};
use tracing::debug;

use super::*;

/// Meridian of the civil clock the input is assumed to be kept on (UTC+8).
pub const STANDARD_MERIDIAN: f64 = 120.0;

const MINUTES_PER_DEGREE: f64 = 4.0;

/// Minutes local mean time runs ahead of the standard meridian clock.
pub fn longitude_correction_minutes(longitude: f64) -> f64 {
    (longitude - STANDARD_MERIDIAN) * MINUTES_PER_DEGREE
}

/// Approximate equation of time in minutes for a day of the year (1-366).
pub fn equation_of_time_minutes(day_of_year: u32) -> f64 {
    let b = (360.0 * (day_of_year as f64 - 81.0) / 365.0).to_radians();
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

/// Shifts a standard-clock time to true solar time at `longitude`.
///
/// The correction is the longitude offset from 120°E plus the equation of
/// time for the input's day of year, applied with millisecond resolution.
pub fn true_solar_time(date_time: NaiveDateTime, longitude: f64) -> Result<NaiveDateTime> {
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ZiweiError::InvalidLongitude(longitude));
    }

    let longitude_minutes = longitude_correction_minutes(longitude);
    let eot_minutes = equation_of_time_minutes(date_time.ordinal());
    let total_minutes = longitude_minutes + eot_minutes;

    let millis = (total_minutes * 60_000.0) as i64;
    let corrected = date_time
        .checked_add_signed(ChronoDuration::milliseconds(millis))
        .ok_or_else(|| ZiweiError::InvalidInput(format!("{} is out of range", date_time)))?;

    debug!(
        %date_time,
        longitude,
        longitude_minutes,
        eot_minutes,
        %corrected,
        "applied true solar time correction"
    );
    Ok(corrected)
}

/// Maps a clock time onto its slot. Hour 0 is the early 子 slot, hour 23
/// the late one; every other hour `h` lands in `(h + 1) / 2`.
pub fn time_slot_from(date_time: NaiveDateTime) -> TimeSlot {
    let slot = match date_time.hour() {
        0 => 0,
        23 => 12,
        hour => (hour + 1) / 2,
    };
    TimeSlot(slot as u8)
}
